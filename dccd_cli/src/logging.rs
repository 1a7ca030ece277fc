//! Tracing subscriber setup: console layer plus optional rolling file.

use crate::cli::FILE_GUARD;
use dccd_config::Logging;
use tracing_subscriber::{EnvFilter, Layer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `--log-level`; `[logging] level` applies to the file
/// layer only. Safe to call once per process; later calls are ignored.
pub fn init_tracing(json: bool, level: &str, cfg: &Logging) {
    let console_filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_pretty = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter())
    });
    let console_json = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(false)
            .with_filter(console_filter())
    });

    let file_layer = cfg.file.as_deref().map(|path| {
        let path = std::path::Path::new(path);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "udccd.log".into(), |n| n.to_string_lossy().into_owned());
        let appender = match cfg.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let file_level = cfg.level.as_deref().unwrap_or("info");
        tracing_subscriber::fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(writer)
            .with_filter(EnvFilter::new(file_level))
    });

    let _ = tracing_subscriber::registry()
        .with(console_pretty)
        .with(console_json)
        .with(file_layer)
        .try_init();
}
