//! Tracing setup

use tracing_subscriber::EnvFilter;

use crate::{config::Config, error::Result};

/// Initialize JSON tracing output filtered by `config.log_level`
///
/// An unparsable level falls back to `info`. Calling this when a global
/// subscriber is already installed is not an error.
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(log_level = %config.log_level, "Tracing initialized");
    } else {
        tracing::debug!("Global tracing subscriber already installed");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice() {
        let config = Config {
            log_level: "not a directive [".to_string(),
            ..Config::default()
        };

        assert!(init_tracing(&config).is_ok());
        assert!(init_tracing(&Config::default()).is_ok());
    }
}
