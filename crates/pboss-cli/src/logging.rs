use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use pboss_core::PbossPaths;

/// Filter directives, e.g. `PBOSS_LOG=pboss_session=debug`.
pub const LOG_ENV: &str = "PBOSS_LOG";

/// Install the global subscriber: a daily log file under the data dir, plus
/// stderr when asked. The returned guard flushes the file on drop.
pub fn init(paths: &PbossPaths, stderr: bool) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(e) = std::fs::create_dir_all(&paths.logs_dir) {
        eprintln!(
            "warning: cannot create log dir {}: {e}",
            paths.logs_dir.display()
        );
        return None;
    }
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&paths.logs_dir, "pboss.log"));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false);
    let stderr_layer = stderr.then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init();
    Some(guard)
}
