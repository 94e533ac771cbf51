//! Server configuration loaded from the environment.

use std::io;
use std::str::FromStr;

/// Storage backend selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// PostgreSQL through `DATABASE_URL`.
    Postgres,
    /// Process-local tables that vanish on exit.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown BUILDMETA_STORE '{other}'")),
        }
    }
}

/// Settings needed to start the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Listen address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Maximum pooled database connections.
    pub pool_size: u32,
    /// Storage backend.
    pub store: StoreBackend,
    /// PostgreSQL connection string.
    pub database_url: Option<String>,
}

impl ServerConfig {
    /// Read `BUILDMETA_*` and `DATABASE_URL` from the process environment.
    #[cfg_attr(test, allow(dead_code))]
    pub fn from_env() -> io::Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> io::Result<Self> {
        let host = lookup("BUILDMETA_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_var(&lookup, "BUILDMETA_PORT", 8080)?;
        let pool_size = parse_var(&lookup, "BUILDMETA_POOL_SIZE", 10)?;
        let store = match lookup("BUILDMETA_STORE") {
            Some(value) => value.parse().map_err(invalid)?,
            None => StoreBackend::Postgres,
        };
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if store == StoreBackend::Postgres && database_url.is_none() {
            return Err(invalid(
                "DATABASE_URL must be set to a PostgreSQL connection string".to_string(),
            ));
        }
        if pool_size == 0 {
            return Err(invalid("BUILDMETA_POOL_SIZE must be positive".to_string()));
        }
        Ok(Self {
            host,
            port,
            pool_size,
            store,
            database_url,
        })
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> io::Result<T> {
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| invalid(format!("{name} must be a number, got '{raw}'"))),
        None => Ok(default),
    }
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> io::Result<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        ServerConfig::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_with_database_url() {
        let config = config(&[("DATABASE_URL", "postgres://localhost/meta")]).expect("config");
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.pool_size, 10);
        assert_eq!(config.store, StoreBackend::Postgres);
    }

    #[test]
    fn postgres_requires_database_url() {
        let err = config(&[]).expect_err("missing url");
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn memory_store_needs_no_database() {
        let config = config(&[
            ("BUILDMETA_STORE", "Memory"),
            ("BUILDMETA_HOST", "0.0.0.0"),
            ("BUILDMETA_PORT", "9000"),
        ])
        .expect("config");
        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = config(&[("BUILDMETA_STORE", "memory"), ("BUILDMETA_PORT", "http")])
            .expect_err("bad port");
        assert!(err.to_string().contains("BUILDMETA_PORT"));
        assert!(config(&[("BUILDMETA_STORE", "memory"), ("BUILDMETA_POOL_SIZE", "0")]).is_err());
        assert!(config(&[("BUILDMETA_STORE", "mysql")]).is_err());
    }
}
