//! Structured logging via tracing.

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Logging options.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            ansi: true,
        }
    }
}

impl LogConfig {
    pub fn from_verbose(verbose: bool) -> Self {
        Self {
            level: if verbose { Level::DEBUG } else { Level::INFO },
            ..Self::default()
        }
    }
}

/// Installs the global subscriber. Call once at startup.
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.level)
        .with_target(false)
        .with_ansi(config.ansi)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("failed to initialize logging: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_level() {
        assert_eq!(LogConfig::from_verbose(false).level, Level::INFO);
        assert_eq!(LogConfig::from_verbose(true).level, Level::DEBUG);
    }
}
