//! Server configuration read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_BIND: &str = "0.0.0.0:3000";
const DEFAULT_MEDIA_ROOT: &str = "public/media";
const DEFAULT_PUBLIC_DIR: &str = "public";

/// Default upload size limit (20 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Runtime settings of the server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Directory holding stored attachments.
    pub media_root: PathBuf,
    /// Directory holding static files; `images/` under it serves missing-picture defaults.
    pub public_dir: PathBuf,
    /// Secret key of the `:hash` URL segment. Must stay server-side.
    pub hash_secret: String,
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Reads the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let database_url = required("DATABASE_URL")?;
        let hash_secret = required("MEDIADROP_HASH_SECRET")?;

        let bind = lookup("MEDIADROP_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = bind.parse().map_err(|_| ConfigError::Invalid {
            name: "MEDIADROP_BIND",
            value: bind.clone(),
        })?;

        let max_upload_bytes = match lookup("MEDIADROP_MAX_UPLOAD_BYTES") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "MEDIADROP_MAX_UPLOAD_BYTES",
                value,
            })?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            database_url,
            bind_addr,
            media_root: lookup("MEDIADROP_MEDIA_ROOT")
                .unwrap_or_else(|| DEFAULT_MEDIA_ROOT.to_string())
                .into(),
            public_dir: lookup("MEDIADROP_PUBLIC_DIR")
                .unwrap_or_else(|| DEFAULT_PUBLIC_DIR.to_string())
                .into(),
            hash_secret,
            max_upload_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/mediadrop"),
            ("MEDIADROP_HASH_SECRET", "tamtam"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:3000");
        assert_eq!(config.media_root, PathBuf::from("public/media"));
        assert_eq!(config.public_dir, PathBuf::from("public"));
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn test_missing_secret() {
        let err = ServerConfig::from_lookup(lookup_from(&[(
            "DATABASE_URL",
            "postgres://localhost/mediadrop",
        )]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("MEDIADROP_HASH_SECRET"));
    }

    #[test]
    fn test_blank_secret_is_missing() {
        let err = ServerConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/mediadrop"),
            ("MEDIADROP_HASH_SECRET", "  "),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("MEDIADROP_HASH_SECRET"));
    }

    #[test]
    fn test_invalid_bind() {
        let err = ServerConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/mediadrop"),
            ("MEDIADROP_HASH_SECRET", "tamtam"),
            ("MEDIADROP_BIND", "not-an-addr"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "MEDIADROP_BIND", .. }));
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/mediadrop"),
            ("MEDIADROP_HASH_SECRET", "tamtam"),
            ("MEDIADROP_BIND", "127.0.0.1:8080"),
            ("MEDIADROP_MEDIA_ROOT", "/srv/media"),
            ("MEDIADROP_MAX_UPLOAD_BYTES", "1024"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.media_root, PathBuf::from("/srv/media"));
        assert_eq!(config.max_upload_bytes, 1024);
    }
}
