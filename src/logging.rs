use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::EngineError;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `cfg.level` when set. Installing twice
/// returns [`EngineError::Logging`] instead of panicking.
pub fn init_tracing(cfg: &LoggingConfig) -> Result<(), EngineError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cfg.level)
            .map_err(|e| EngineError::Logging(format!("invalid log level '{}': {e}", cfg.level)))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    let installed = match cfg.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    installed.map_err(|e| EngineError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_an_error_not_a_panic() {
        let cfg = LoggingConfig::default();
        // The first call may lose the race against other tests in this binary.
        let _ = init_tracing(&cfg);
        assert!(matches!(init_tracing(&cfg), Err(EngineError::Logging(_))));
    }

    #[test]
    fn bad_level_is_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let cfg = LoggingConfig {
            level: "matcher=notalevel".into(),
            ..Default::default()
        };
        assert!(matches!(
            init_tracing(&cfg),
            Err(EngineError::Logging(m)) if m.contains("invalid log level")
        ));
    }
}
