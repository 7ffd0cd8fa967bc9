//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub routes: RoutesConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Public-facing URLs the gateways redirect to and call back against.
///
/// The notify endpoints must be reachable from the open internet, so the
/// base URL is the externally visible one, not the bind address.
#[derive(Debug, Clone)]
pub struct RoutesConfig {
    pub public_base_url: String,
    /// where the browser lands after a completed payment
    pub order_complete_path: String,
    /// where the browser lands after cancellation or a rejected handshake
    pub cancel_path: String,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            routes: RoutesConfig::from_env()?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.routes.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }
        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl RoutesConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(RoutesConfig {
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string()),
            order_complete_path: env::var("ORDER_COMPLETE_PATH")
                .unwrap_or_else(|_| "/profile/orders".to_string()),
            cancel_path: env::var("CANCEL_PATH").unwrap_or_else(|_| "/".to_string()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.public_base_url.starts_with("http://")
            && !self.public_base_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue(
                "PUBLIC_BASE_URL must be a valid URL".to_string(),
            ));
        }
        if !self.order_complete_path.starts_with('/') || !self.cancel_path.starts_with('/') {
            return Err(ConfigError::InvalidValue(
                "redirect paths must be absolute".to_string(),
            ));
        }
        Ok(())
    }

    /// Absolute URL for a callback route path.
    pub fn absolute(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_port_validation() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_absolute_url_joins_cleanly() {
        let routes = RoutesConfig {
            public_base_url: "https://shop.example.com/".to_string(),
            order_complete_path: "/profile/orders".to_string(),
            cancel_path: "/".to_string(),
        };
        assert_eq!(
            routes.absolute("/payments/notify/allpay"),
            "https://shop.example.com/payments/notify/allpay"
        );
    }

    #[test]
    fn test_routes_validation_rejects_bare_host() {
        let routes = RoutesConfig {
            public_base_url: "shop.example.com".to_string(),
            order_complete_path: "/orders".to_string(),
            cancel_path: "/".to_string(),
        };
        assert!(routes.validate().is_err());
    }
}
