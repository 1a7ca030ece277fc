use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use dccd_config::{ProfileRow, load_drive_profile_csv, load_persisted_calibration};
use tempfile::{TempDir, tempdir};

fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut f = File::create(&path).unwrap();
    f.write_all(body.as_bytes()).unwrap();
    path
}

#[test]
fn loads_rows_with_optional_supply() {
    let dir = tempdir().unwrap();
    let path = write(
        &dir,
        "p.csv",
        "tick,force_pct,supply_mv\n0,50,12000\n3000, 50 ,10500\n4000,80,\n",
    );
    let rows = load_drive_profile_csv(&path).unwrap();
    assert_eq!(
        rows,
        vec![
            ProfileRow {
                tick: 0,
                force_pct: 50,
                supply_mv: Some(12_000)
            },
            ProfileRow {
                tick: 3000,
                force_pct: 50,
                supply_mv: Some(10_500)
            },
            ProfileRow {
                tick: 4000,
                force_pct: 80,
                supply_mv: None
            },
        ]
    );
}

#[test]
fn rejects_wrong_headers() {
    let dir = tempdir().unwrap();
    let path = write(&dir, "p.csv", "tick,force\n0,50\n");
    let err = load_drive_profile_csv(&path).unwrap_err();
    assert!(format!("{err}").contains("tick,force_pct,supply_mv"));
}

#[test]
fn rejects_unordered_ticks() {
    let dir = tempdir().unwrap();
    let path = write(&dir, "p.csv", "tick,force_pct,supply_mv\n10,50,\n10,60,\n");
    let err = load_drive_profile_csv(&path).unwrap_err();
    assert!(format!("{err}").contains("strictly increasing"));
}

#[test]
fn rejects_force_above_hundred() {
    let dir = tempdir().unwrap();
    let path = write(&dir, "p.csv", "tick,force_pct,supply_mv\n0,150,\n");
    let err = load_drive_profile_csv(&path).unwrap_err();
    assert!(format!("{err}").contains("force_pct"));
}

#[test]
fn rejects_garbage_and_empty_files() {
    let dir = tempdir().unwrap();
    let bad = write(&dir, "bad.csv", "tick,force_pct,supply_mv\nabc,50,\n");
    assert!(
        format!("{}", load_drive_profile_csv(&bad).unwrap_err()).contains("invalid CSV row 2")
    );
    let empty = write(&dir, "empty.csv", "tick,force_pct,supply_mv\n");
    assert!(load_drive_profile_csv(&empty).is_err());
}

#[test]
fn persisted_calibration_round_trips_through_file() {
    let dir = tempdir().unwrap();
    let path = write(
        &dir,
        "cal.toml",
        "coil_resistance_mohm = 1500\nnominal_supply_mv = 12000\ntarget_lock_current_ma = 4400\nlock_voltage_ceiling_mv = 6600\n",
    );
    let cal = load_persisted_calibration(&path).unwrap();
    assert_eq!(cal.coil_resistance_mohm, 1500);
    assert_eq!(cal.lock_voltage_ceiling_mv, 6600);

    let zero = write(
        &dir,
        "zero.toml",
        "coil_resistance_mohm = 0\nnominal_supply_mv = 12000\ntarget_lock_current_ma = 4400\nlock_voltage_ceiling_mv = 0\n",
    );
    assert!(load_persisted_calibration(&zero).is_err());
}
