//! Process-wide `tracing` setup for autopilot apps.
//!
//! Log lines go to stdout next to the protocol lines; parsers treat them as noise. The level is
//! `info` by default and `debug` with `--debug`. Without `--debug`, `AUTOPILOT_LOG` may carry a
//! full `EnvFilter` directive (e.g. `autopilot=trace,warn`).

use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "AUTOPILOT_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogOptions {
    pub debug: bool,
    pub colors: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            debug: false,
            colors: true,
        }
    }
}

fn build_filter(options: LogOptions) -> EnvFilter {
    if options.debug {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber. Returns `false` when one was already installed (the first
/// invocation in a process wins).
pub fn init(options: LogOptions) -> bool {
    fmt()
        .with_env_filter(build_filter(options))
        .with_ansi(options.colors)
        .with_target(options.debug)
        .with_writer(std::io::stdout)
        .try_init()
        .is_ok()
}
