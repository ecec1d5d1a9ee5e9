use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use autodel_module::ModuleConfig;
use autodel_store::StoreConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address for the command protocol.
    pub bind_addr: SocketAddr,
    /// Address for the HTTP admin endpoints; disabled when unset.
    pub admin_addr: Option<SocketAddr>,
    pub max_connections: usize,
    /// Longest accepted request line, in bytes.
    pub max_line_length: usize,
    /// How often expired keys are purged, in milliseconds.
    pub expiry_interval_ms: u64,
    /// Capacity of the queue in front of the engine.
    pub request_queue: usize,
    pub store: StoreConfig,
    pub module: ModuleConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 6390)),
            admin_addr: None,
            max_connections: 1024,
            max_line_length: 64 * 1024,
            expiry_interval_ms: 100,
            request_queue: 1024,
            store: StoreConfig::default(),
            module: ModuleConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read a TOML configuration file. Missing fields take their defaults.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn validate(&self) -> ServerResult<()> {
        if self.max_connections == 0 {
            return Err(ServerError::Config("max_connections must be at least 1".into()));
        }
        if self.max_line_length == 0 {
            return Err(ServerError::Config("max_line_length must be at least 1".into()));
        }
        if self.expiry_interval_ms == 0 {
            return Err(ServerError::Config("expiry_interval_ms must be at least 1".into()));
        }
        if self.request_queue == 0 {
            return Err(ServerError::Config("request_queue must be at least 1".into()));
        }
        if self.store.max_keys == Some(0) {
            return Err(ServerError::Config("store.max_keys must be at least 1".into()));
        }
        self.module.validate()?;
        Ok(())
    }

    pub fn expiry_interval(&self) -> Duration {
        Duration::from_millis(self.expiry_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:6390".parse::<SocketAddr>().unwrap());
        assert!(c.admin_addr.is_none());
        assert_eq!(c.max_connections, 1024);
        assert_eq!(c.expiry_interval(), Duration::from_millis(100));
        assert_eq!(c.module.command_name, "ax.associate_key");
        c.validate().unwrap();
    }

    #[test]
    fn toml_roundtrip() {
        let c = ServerConfig {
            admin_addr: Some("127.0.0.1:8080".parse().unwrap()),
            ..Default::default()
        };
        let text = c.to_toml().unwrap();
        let parsed = ServerConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, c);
    }

    #[test]
    fn load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
bind_addr = "0.0.0.0:7000"

[store]
max_keys = 100

[module]
command_name = "claim"
"#
        )
        .unwrap();

        let c = ServerConfig::load(file.path()).unwrap();
        assert_eq!(c.bind_addr.port(), 7000);
        assert_eq!(c.store.max_keys, Some(100));
        assert_eq!(c.module.command_name, "claim");
        assert_eq!(c.max_connections, 1024);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            ServerConfig::from_toml_str("max_connections = 0"),
            Err(ServerError::Config(_))
        ));
        assert!(matches!(
            ServerConfig::from_toml_str("[module]\ncommand_name = \"\""),
            Err(ServerError::Module(_))
        ));
        assert!(ServerConfig::from_toml_str("bind_addr = 5").is_err());
    }

    #[test]
    fn missing_file() {
        let err = ServerConfig::load(Path::new("/nonexistent/autodel.toml")).unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }
}
