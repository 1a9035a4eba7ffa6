//! Environment-only layered configuration, via `figment`'s `Env` provider (a crate the
//! teacher already depended on but never actually wired up).

use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn default_port() -> u16 {
    5000
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_control_loop_period_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub lb_port: u16,

    /// Required unless `in_memory` is set. Connection string for the document store.
    pub mongodb_uri: Option<String>,

    #[serde(default = "default_region")]
    pub aws_region: String,

    /// Target for the out-of-process `POST /trigger_rebuild` call a standalone
    /// control-loop deployment would make; unused by this binary's own in-process loop.
    pub lb_ip: Option<String>,

    #[serde(default)]
    pub in_memory: bool,

    #[serde(default = "default_control_loop_period_secs")]
    pub control_loop_period_secs: u64,

    /// JSON-encoded `[{name,address,port,instance_id}, ...]` consumed by the shipped
    /// `StaticDiscoverer`. A real deployment's cloud-backed discoverer wouldn't need this.
    pub static_backends: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            lb_port: default_port(),
            mongodb_uri: None,
            aws_region: default_region(),
            lb_ip: None,
            in_memory: false,
            control_loop_period_secs: default_control_loop_period_secs(),
            static_backends: None,
        }
    }
}

impl Config {
    /// Loads from environment variables (`LB_PORT`, `MONGODB_URI`, `AWS_REGION`,
    /// `LB_IP`, `IN_MEMORY`, `CONTROL_LOOP_PERIOD_SECS`), layered over defaults.
    pub fn from_env() -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Env::raw())
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        if config.mongodb_uri.is_none() && !config.in_memory {
            return Err(Error::Config(
                "MONGODB_URI is required unless running with --in-memory".to_string(),
            ));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_mongodb_uri_require_in_memory() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("IN_MEMORY", "true");
            let config = Config::from_env().unwrap();
            assert_eq!(config.lb_port, 5000);
            assert!(config.in_memory);
            Ok(())
        });
    }

    #[test]
    fn missing_mongodb_uri_without_in_memory_errors() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            assert!(Config::from_env().is_err());
            Ok(())
        });
    }

    #[test]
    fn env_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("MONGODB_URI", "mongodb://localhost:27017");
            jail.set_env("LB_PORT", "9000");
            let config = Config::from_env().unwrap();
            assert_eq!(config.lb_port, 9000);
            assert_eq!(config.mongodb_uri.as_deref(), Some("mongodb://localhost:27017"));
            Ok(())
        });
    }
}
