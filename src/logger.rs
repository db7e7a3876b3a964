use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Writes records to stderr as GitHub workflow commands, so errors and
/// warnings surface as annotations on the run.
struct ActionsLogger;

static LOGGER: ActionsLogger = ActionsLogger;

/// Percent-encodes the characters the runner treats as command delimiters.
fn escape(message: &str) -> String {
  message
    .replace('%', "%25")
    .replace('\r', "%0D")
    .replace('\n', "%0A")
}

fn format_line(level: Level, message: &str) -> String {
  match level {
    Level::Error => format!("::error::{}", escape(message)),
    Level::Warn => format!("::warning::{}", escape(message)),
    Level::Info => message.to_string(),
    Level::Debug | Level::Trace => format!("::debug::{}", escape(message)),
  }
}

impl Log for ActionsLogger {
  fn enabled(&self, metadata: &Metadata) -> bool {
    metadata.level() <= log::max_level()
  }

  fn log(&self, record: &Record) {
    if self.enabled(record.metadata()) {
      eprintln!("{}", format_line(record.level(), &record.args().to_string()));
    }
  }

  fn flush(&self) {}
}

/// Installs the logger at `level`.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
  log::set_logger(&LOGGER)?;
  set_level(level);

  Ok(())
}

/// Changes the level of the installed logger. `RUNNER_DEBUG=1`, set when a run
/// is re-run with debug logging, raises it to `Debug`.
pub fn set_level(level: LevelFilter) {
  log::set_max_level(effective_level(level, std::env::var("RUNNER_DEBUG").ok().as_deref()));
}

fn effective_level(level: LevelFilter, runner_debug: Option<&str>) -> LevelFilter {
  if runner_debug == Some("1") {
    level.max(LevelFilter::Debug)
  } else {
    level
  }
}
