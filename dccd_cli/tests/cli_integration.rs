use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Minimal config: everything defaults except what the test needs.
fn write_config(dir: &tempfile::TempDir, extra: &str) -> PathBuf {
    let toml = format!(
        r#"
[loop]
tick_hz = 1000
sensor_timeout_ms = 5

[simulator]
resistance_mohm = 1500
time_constant_ticks = 10
supply_mv = 12000
{extra}
"#
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["run", "--force", "50", "--ticks", "2000"], 0, "run complete", "stdout")]
#[case(&["run", "--force", "50", "--ticks", "2000"], 0, "mode compensated", "stdout")]
#[case(&["run"], 2, "required", "stderr")]
#[case(&["run", "--force", "150"], 2, "150", "stderr")]
#[case(&["run", "--force", "50", "--short-mohm", "10", "--fault-at", "1500", "--ticks", "20000"], 3, "locked down", "stderr")]
#[case(&["calibrate", "--open-load"], 1, "calibration failed", "stderr")]
#[case(&["calibrate"], 0, "1500 mOhm", "stdout")]
#[case(&["self-check"], 0, "self-check ok", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    let mut cmd = Command::cargo_bin("udccd").unwrap();
    cmd.arg("--log-level").arg("error").arg("--config").arg(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
#[case("[pid]\nkp = [3, 0]\n", "pid.kp divisor")]
#[case("[pwm]\nfull_scale = 1000\nmax_duty = 2000\n", "pwm.max_duty")]
#[case("[protection]\nretry_limit = \"many\"\n", "retry_limit")]
fn invalid_config_exits_with_config_code(#[case] extra: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, extra);

    let mut cmd = Command::cargo_bin("udccd").unwrap();
    cmd.arg("--config").arg(&cfg).arg("self-check");
    cmd.assert()
        .code(2)
        .stderr(predicate::str::contains("Configuration is invalid"))
        .stderr(predicate::str::contains(needle));
}

#[test]
fn missing_config_file_is_a_config_error() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("udccd").unwrap();
    cmd.arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("self-check");
    cmd.assert().code(2);
}

#[test]
fn calibrate_persists_and_run_reuses_the_store() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    let store = dir.path().join("calibration.toml");

    let mut cmd = Command::cargo_bin("udccd").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("calibrate")
        .arg("--store")
        .arg(&store);
    cmd.assert().success();
    let text = fs::read_to_string(&store).unwrap();
    assert!(text.contains("coil_resistance_mohm = 1500"), "{text}");

    // stored calibration skips the startup sequence, so a short run is enough
    let mut cmd = Command::cargo_bin("udccd").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("run")
        .arg("--force")
        .arg("50")
        .arg("--ticks")
        .arg("300")
        .arg("--store")
        .arg(&store);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("mode compensated"));
}

#[test]
fn profile_drives_force_and_supply() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    let csv = dir.path().join("profile.csv");
    let mut f = fs::File::create(&csv).unwrap();
    writeln!(f, "tick,force_pct,supply_mv").unwrap();
    writeln!(f, "0,50,12000").unwrap();
    writeln!(f, "1500,50,14000").unwrap();
    writeln!(f, "2000,0,").unwrap();

    let mut cmd = Command::cargo_bin("udccd").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("run")
        .arg("--profile")
        .arg(&csv)
        .arg("--ticks")
        .arg("2500");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("duty 0 "))
        .stdout(predicate::str::contains("supply 14000 mV"));
}

#[test]
fn profile_with_bad_header_is_reported() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    let csv = dir.path().join("profile.csv");
    fs::write(&csv, "tick,force,supply\n0,50,12000\n").unwrap();

    let mut cmd = Command::cargo_bin("udccd").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("run")
        .arg("--profile")
        .arg(&csv);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers"));
}
