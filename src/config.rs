// Server Configuration - environment overrides on top of a JSON config file
//
// Resolution order for every JWT setting: environment variable first, then
// the `JwtSettings` section of the config file. The signing secret has no
// default: without one the server refuses to start.

use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Development origins always present in the CORS allow-list.
pub const DEV_ORIGINS: [&str; 4] = [
    "https://localhost:7176",
    "http://localhost:5272",
    "https://localhost:5000",
    "http://localhost:5000",
];

const DEFAULT_CONFIG_FILE: &str = "catalog.config.json";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_PATH: &str = "games.db";

/// `JwtSettings` section of the config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct JwtSettingsFile {
    #[serde(rename = "SecretKey")]
    pub secret_key: Option<String>,
    #[serde(rename = "Issuer")]
    pub issuer: Option<String>,
    #[serde(rename = "Audience")]
    pub audience: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    #[serde(rename = "JwtSettings")]
    pub jwt_settings: JwtSettingsFile,
}

/// Values pulled from the environment. Collected in one place so config
/// resolution itself stays a pure function.
#[derive(Debug, Default)]
pub struct EnvOverrides {
    pub secret_key: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub client_url: Option<String>,
    pub port: Option<String>,
    pub db_path: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            secret_key: env::var("JWT_SECRET_KEY").ok(),
            issuer: env::var("JWT_ISSUER").ok(),
            audience: env::var("JWT_AUDIENCE").ok(),
            client_url: env::var("CLIENT_URL").ok(),
            port: env::var("PORT").ok(),
            db_path: env::var("DATABASE_PATH").ok(),
        }
    }
}

/// Token parameters shared by issuing and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtConfig {
    pub secret_key: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub jwt: JwtConfig,
    pub allowed_origins: Vec<String>,
    pub port: u16,
    pub db_path: String,
}

impl ServerConfig {
    /// Load configuration from the default config file location plus the
    /// process environment.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let file = if config_path.exists() {
            let raw = fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Invalid JSON in {}", config_path.display()))?
        } else {
            info!("config file {} not found, using environment only", config_path.display());
            ConfigFile::default()
        };

        Self::resolve(EnvOverrides::from_env(), file)
    }

    /// Pure resolution of env + file into a runnable config.
    pub fn resolve(env: EnvOverrides, file: ConfigFile) -> Result<Self> {
        let secret_key = match env.secret_key.or(file.jwt_settings.secret_key) {
            Some(secret) if !secret.is_empty() => secret,
            _ => bail!("JWT SecretKey not configured (set JWT_SECRET_KEY or the config file)"),
        };

        let issuer = env
            .issuer
            .or(file.jwt_settings.issuer)
            .unwrap_or_else(|| {
                warn!("JWT issuer not configured, using default");
                "game-catalog".to_string()
            });

        let audience = env
            .audience
            .or(file.jwt_settings.audience)
            .unwrap_or_else(|| {
                warn!("JWT audience not configured, using default");
                "game-catalog-client".to_string()
            });

        let mut allowed_origins: Vec<String> =
            DEV_ORIGINS.iter().map(|s| s.to_string()).collect();
        if let Some(client_url) = env.client_url.filter(|url| !url.is_empty()) {
            allowed_origins.push(client_url);
        }

        let port = match env.port {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("Invalid PORT value: {raw}"))?,
            None => DEFAULT_PORT,
        };

        let db_path = env.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

        Ok(Self {
            jwt: JwtConfig {
                secret_key,
                issuer,
                audience,
            },
            allowed_origins,
            port,
            db_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_with_secret() -> ConfigFile {
        ConfigFile {
            jwt_settings: JwtSettingsFile {
                secret_key: Some("file-secret".to_string()),
                issuer: Some("file-issuer".to_string()),
                audience: Some("file-audience".to_string()),
            },
        }
    }

    #[test]
    fn test_missing_secret_fails_fast() {
        let result = ServerConfig::resolve(EnvOverrides::default(), ConfigFile::default());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("SecretKey"));
    }

    #[test]
    fn test_empty_env_secret_does_not_count() {
        let env = EnvOverrides {
            secret_key: Some(String::new()),
            ..Default::default()
        };
        assert!(ServerConfig::resolve(env, ConfigFile::default()).is_err());
    }

    #[test]
    fn test_file_values_used_without_env() {
        let config = ServerConfig::resolve(EnvOverrides::default(), file_with_secret()).unwrap();

        assert_eq!(config.jwt.secret_key, "file-secret");
        assert_eq!(config.jwt.issuer, "file-issuer");
        assert_eq!(config.jwt.audience, "file-audience");
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_env_overrides_file() {
        let env = EnvOverrides {
            secret_key: Some("env-secret".to_string()),
            issuer: Some("env-issuer".to_string()),
            port: Some("8080".to_string()),
            ..Default::default()
        };
        let config = ServerConfig::resolve(env, file_with_secret()).unwrap();

        assert_eq!(config.jwt.secret_key, "env-secret");
        assert_eq!(config.jwt.issuer, "env-issuer");
        // Audience not overridden: falls back to the file.
        assert_eq!(config.jwt.audience, "file-audience");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_cors_allow_list_static_plus_client_url() {
        let base = ServerConfig::resolve(
            EnvOverrides {
                secret_key: Some("s".to_string()),
                ..Default::default()
            },
            ConfigFile::default(),
        )
        .unwrap();
        assert_eq!(base.allowed_origins.len(), DEV_ORIGINS.len());

        let with_client = ServerConfig::resolve(
            EnvOverrides {
                secret_key: Some("s".to_string()),
                client_url: Some("https://catalog.example.com".to_string()),
                ..Default::default()
            },
            ConfigFile::default(),
        )
        .unwrap();
        assert_eq!(with_client.allowed_origins.len(), DEV_ORIGINS.len() + 1);
        assert!(with_client
            .allowed_origins
            .contains(&"https://catalog.example.com".to_string()));

        // Empty CLIENT_URL is ignored, matching the startup wiring.
        let empty = ServerConfig::resolve(
            EnvOverrides {
                secret_key: Some("s".to_string()),
                client_url: Some(String::new()),
                ..Default::default()
            },
            ConfigFile::default(),
        )
        .unwrap();
        assert_eq!(empty.allowed_origins.len(), DEV_ORIGINS.len());
    }

    #[test]
    fn test_invalid_port_rejected() {
        let env = EnvOverrides {
            secret_key: Some("s".to_string()),
            port: Some("not-a-port".to_string()),
            ..Default::default()
        };
        assert!(ServerConfig::resolve(env, ConfigFile::default()).is_err());
    }

    #[test]
    fn test_config_file_json_shape() {
        let raw = r#"{
            "JwtSettings": {
                "SecretKey": "from-json",
                "Issuer": "catalog-api"
            }
        }"#;
        let file: ConfigFile = serde_json::from_str(raw).unwrap();

        assert_eq!(file.jwt_settings.secret_key.as_deref(), Some("from-json"));
        assert_eq!(file.jwt_settings.issuer.as_deref(), Some("catalog-api"));
        assert!(file.jwt_settings.audience.is_none());
    }
}
