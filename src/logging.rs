use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::project_dirs;

/// Initialize file logging under the data dir. The returned guard must be
/// held until exit or buffered lines are lost.
///
/// Filter comes from `LACUNA_LOG`, then `RUST_LOG`, then `info,lacuna=debug`.
pub fn init() -> Option<WorkerGuard> {
  let logs_dir = project_dirs()?.data_local_dir().join("logs");
  std::fs::create_dir_all(&logs_dir).ok()?;

  let file_appender = tracing_appender::rolling::daily(&logs_dir, "lacuna.log");
  let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

  let env_filter = EnvFilter::try_from_env("LACUNA_LOG")
    .or_else(|_| EnvFilter::try_from_default_env())
    .unwrap_or_else(|_| EnvFilter::new("info,lacuna=debug"));

  tracing_subscriber::registry()
    .with(env_filter)
    .with(fmt::layer().with_writer(non_blocking).with_ansi(false).with_target(true).with_line_number(true))
    .try_init()
    .ok()?;

  Some(guard)
}
