//! Configuration error types.

use thiserror::Error;

/// Invalid or incomplete command-line configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No file specified")]
    NoFile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        assert_eq!(ConfigError::NoFile.to_string(), "No file specified");
    }
}
