use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Where diagnostics go and how much of them. Applied once, at startup.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub verbose: bool,
    /// Appended to, never truncated.
    pub path: PathBuf,
}

impl LogConfig {
    fn default_directive(&self) -> &'static str {
        if self.verbose {
            "annotate_dashboards=debug"
        } else {
            "annotate_dashboards=warn"
        }
    }

    /// `RUST_LOG` wins over the verbose flag when set.
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.default_directive()))
    }
}

/// Sends the same events to stdout and to the log file.
pub fn init(config: &LogConfig) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.path)
        .with_context(|| format!("opening log file {}", config.path.display()))?;

    tracing_subscriber::registry()
        .with(config.filter())
        .with(fmt::layer().with_writer(io::stdout))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()
        .context("installing log subscriber")?;

    tracing::info!(path = %config.path.display(), "log file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_selects_debug_for_this_crate() {
        let quiet = LogConfig {
            verbose: false,
            path: PathBuf::from("annotate-dashboards.log"),
        };
        let verbose = LogConfig {
            verbose: true,
            ..quiet.clone()
        };

        assert_eq!(quiet.default_directive(), "annotate_dashboards=warn");
        assert_eq!(verbose.default_directive(), "annotate_dashboards=debug");
    }
}
