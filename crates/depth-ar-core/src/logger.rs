//! Logging setup shared by the binaries.
//!
//! [`init_with_level`] installs a small `log` backend that prefixes every
//! line with the seconds elapsed since installation. With the `tracing`
//! feature, [`init_tracing`] installs a `tracing-subscriber` instead; `log`
//! records from dependencies are forwarded into it.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

struct ElapsedLogger {
    max_level: LevelFilter,
    start: Instant,
}

impl ElapsedLogger {
    fn write_line(&self, record: &Record) -> std::io::Result<()> {
        let secs = self.start.elapsed().as_secs_f64();
        let mut out = std::io::stderr().lock();
        writeln!(
            out,
            "+{secs:.3}s {:<5} {}: {}",
            record.level(),
            record.target(),
            record.args()
        )
    }
}

impl Log for ElapsedLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            // A closed stderr is not worth failing a calibration over.
            let _ = self.write_line(record);
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static INSTALLED: OnceLock<ElapsedLogger> = OnceLock::new();

/// Install the stderr logger at `level`.
///
/// Only the first call installs anything; later calls return `Ok(())` and
/// keep the original level.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    let mut fresh = false;
    let logger = INSTALLED.get_or_init(|| {
        fresh = true;
        ElapsedLogger {
            max_level: level,
            start: Instant::now(),
        }
    });
    if fresh {
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Install a `tracing-subscriber` filtered by `RUST_LOG` (default `info`).
///
/// Closing spans are reported, which times the instrumented calibration and
/// hole-filling calls. `json` switches to one JSON object per line.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE);
    // Fails only when a global subscriber already exists.
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(tracing_subscriber::fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}
