mod cli;
mod error_fmt;
mod logging;
mod run;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use dccd_core::error::ActuatorError;
use eyre::WrapErr;

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn config_error(msg: String) -> eyre::Report {
    eyre::Report::new(ActuatorError::Config(msg))
}

fn load_config(path: Option<&Path>) -> eyre::Result<dccd_config::Config> {
    let Some(path) = path else {
        return Ok(dccd_config::Config::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| config_error(format!("read {}: {e}", path.display())))?;
    let cfg = dccd_config::load_toml(&text)
        .map_err(|e| config_error(format!("parse {}: {e}", path.display())))?;
    cfg.validate().map_err(|e| config_error(format!("{e}")))?;
    Ok(cfg)
}

fn install_ctrlc() -> Arc<AtomicBool> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
        tracing::warn!(error = %e, "could not install Ctrl-C handler");
    }
    shutdown
}

fn dispatch(cli: Cli, cfg: &dccd_config::Config) -> eyre::Result<()> {
    match cli.cmd {
        Commands::Run {
            force,
            ticks,
            profile,
            store,
            report_every,
            realtime,
            faults,
        } => {
            let shutdown = install_ctrlc();
            run::run_sim(
                cfg,
                run::RunOpts {
                    force,
                    ticks,
                    profile: profile.as_deref(),
                    store: store.as_deref(),
                    report_every,
                    realtime,
                    faults,
                    json: cli.json,
                },
                shutdown,
            )
            .wrap_err("control loop")
        }
        Commands::Calibrate {
            store,
            max_ticks,
            faults,
        } => run::run_calibrate(cfg, store.as_deref(), max_ticks, &faults, cli.json),
        Commands::SelfCheck => run::self_check(cfg, cli.json),
    }
}

fn report(err: &eyre::Report) -> i32 {
    tracing::debug!(error = ?err, "command failed");
    if JSON_MODE.get().copied().unwrap_or(false) {
        println!("{}", format_error_json(err));
    } else {
        eprintln!("{}", humanize(err));
    }
    exit_code_for_error(err)
}

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let cfg = load_config(cli.config.as_deref());
    let logging = cfg.as_ref().map(|c| &c.logging).ok();
    logging::init_tracing(
        cli.json,
        &cli.log_level,
        logging.unwrap_or(&dccd_config::Logging::default()),
    );

    let result = cfg.and_then(|cfg| dispatch(cli, &cfg));
    let code = match result {
        Ok(()) => 0,
        Err(e) => report(&e),
    };
    std::process::exit(code);
}
