use anyhow::{Result, anyhow};
use serde::Deserialize;
use std::env;
use tracing::{info, warn};

// Import logging macros
use crate::{log_system_event, log_validation};

/// Complete application configuration loaded from environment variables.
///
/// The `portal` and `features` sections replace the near-duplicate deployment
/// variants of this application: one binary, configured per deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub portal: PortalConfig,
    pub features: FeaturesConfig,
    pub logging: LoggingConfig,
}

/// Database connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// External session-verification portal configuration. When disabled, the API
/// is open and no token header is required.
#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
    pub enabled: bool,
    pub base_url: String,
}

/// Per-deployment feature toggles.
#[derive(Debug, Clone, Deserialize)]
pub struct FeaturesConfig {
    /// Whether `data_inicio` is a required field on creation.
    pub require_data_inicio: bool,
}

/// Logging system configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: String,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        log_system_event!(config, "Loading application configuration from environment variables");

        let config = Config {
            database: DatabaseConfig::from_env()?,
            server: ServerConfig::from_env()?,
            portal: PortalConfig::from_env()?,
            features: FeaturesConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        };

        log_system_event!(config, "Configuration loaded successfully");
        config.log_configuration_summary();

        Ok(config)
    }

    /// Log a summary of loaded configuration (without sensitive data)
    fn log_configuration_summary(&self) {
        info!(
            database_url_masked = %mask_sensitive_data(&self.database.url),
            server_address = %format!("{}:{}", self.server.host, self.server.port),
            portal_enabled = self.portal.enabled,
            require_data_inicio = self.features.require_data_inicio,
            log_level = %self.logging.level,
            "Configuration summary"
        );
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.database.url.contains("sqlite:") && !self.database.url.contains("postgres://") {
            return Err(anyhow!(
                "DATABASE_URL must start with 'sqlite:' or 'postgres://'"
            ));
        }

        if self.server.port == 0 {
            return Err(anyhow!("Server port must be greater than 0"));
        }

        if self.portal.enabled && !self.portal.base_url.starts_with("http") {
            return Err(anyhow!(
                "PORTAL_URL must be an http(s) URL when the session portal is enabled"
            ));
        }

        // The level may be a full env-filter directive list, not a bare level.
        let level = self.logging.level.to_lowercase();
        if !["trace", "debug", "info", "warn", "error"]
            .iter()
            .any(|known| level.contains(known))
        {
            warn!(
                "Invalid log level '{}', using 'info' as fallback",
                self.logging.level
            );
        }

        log_validation!(success, "configuration", "Configuration validation completed successfully");
        Ok(())
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        let url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:jornada_academica.db".to_string());

        Ok(DatabaseConfig { url })
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let port_str = env::var("PORT").unwrap_or_else(|_| "3000".to_string());

        let port = port_str.parse::<u16>().map_err(|_| {
            anyhow!(
                "Invalid PORT value: '{}'. Must be a number between 1-65535",
                port_str
            )
        })?;

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        Ok(ServerConfig { port, host })
    }
}

impl PortalConfig {
    fn from_env() -> Result<Self> {
        let enabled = env::var("PORTAL_ENABLED")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        let base_url =
            env::var("PORTAL_URL").unwrap_or_else(|_| "http://localhost:4000".to_string());

        Ok(PortalConfig { enabled, base_url })
    }
}

impl FeaturesConfig {
    fn from_env() -> Result<Self> {
        let require_data_inicio = env::var("REQUIRE_DATA_INICIO")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        Ok(FeaturesConfig {
            require_data_inicio,
        })
    }
}

impl LoggingConfig {
    fn from_env() -> Result<Self> {
        let level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info,jornada_academica=debug".to_string());

        let file_enabled = env::var("LOG_FILE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let console_enabled = env::var("LOG_CONSOLE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let log_directory = env::var("LOG_DIRECTORY").unwrap_or_else(|_| "logs".to_string());

        Ok(LoggingConfig {
            level,
            file_enabled,
            console_enabled,
            log_directory,
        })
    }
}

/// Mask sensitive data in configuration for safe logging
fn mask_sensitive_data(data: &str) -> String {
    if data.len() <= 8 {
        "*".repeat(data.len())
    } else {
        format!("{}***{}", &data[..4], &data[data.len() - 4..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_mask_sensitive_data() {
        assert_eq!(mask_sensitive_data("short"), "*****");
        assert_eq!(
            mask_sensitive_data("sqlite:jornada_academica.db"),
            "sqli***a.db"
        );
    }

    #[test]
    fn test_database_config_defaults() {
        // Clear environment variable to test default
        unsafe {
            env::remove_var("DATABASE_URL");
        }

        let config = DatabaseConfig::from_env().unwrap();
        assert_eq!(config.url, "sqlite:jornada_academica.db");
    }

    #[test]
    fn test_server_config_defaults() {
        unsafe {
            env::remove_var("PORT");
            env::remove_var("HOST");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn test_portal_disabled_by_default() {
        unsafe {
            env::remove_var("PORTAL_ENABLED");
            env::remove_var("PORTAL_URL");
        }

        let config = PortalConfig::from_env().unwrap();
        assert!(!config.enabled);
    }

    #[test]
    fn test_config_validation() {
        let config = Config {
            database: DatabaseConfig {
                url: "sqlite:test.db".to_string(),
            },
            server: ServerConfig {
                port: 3000,
                host: "0.0.0.0".to_string(),
            },
            portal: PortalConfig {
                enabled: false,
                base_url: String::new(),
            },
            features: FeaturesConfig {
                require_data_inicio: false,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_enabled: true,
                console_enabled: true,
                log_directory: "logs".to_string(),
            },
        };

        assert!(config.validate().is_ok());

        // Invalid port
        let mut invalid_config = config.clone();
        invalid_config.server.port = 0;
        assert!(invalid_config.validate().is_err());

        // Portal enabled without a usable URL
        let mut invalid_config = config.clone();
        invalid_config.portal.enabled = true;
        assert!(invalid_config.validate().is_err());

        let mut gated_config = config;
        gated_config.portal.enabled = true;
        gated_config.portal.base_url = "http://portal.example".to_string();
        assert!(gated_config.validate().is_ok());
    }

    #[test]
    fn test_invalid_port_parsing() {
        unsafe {
            env::set_var("PORT", "not-a-number");
        }
        let result = ServerConfig::from_env();
        assert!(result.is_err());

        unsafe {
            env::remove_var("PORT");
        }
    }
}
