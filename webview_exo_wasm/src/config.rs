use crate::error::BridgeError;
use crate::protocol::{
    ControlId, DEFAULT_CLOSE_RETRIES, DEFAULT_CLOSE_RETRY_DELAY, DEFAULT_COOLDOWN,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const CONFIG_ENV: &str = "EXO_BRIDGE_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Suppression window between a snapshot and an apply. `0` turns it off.
    pub cooldown_ms: u64,
    pub close_retries: u32,
    pub close_retry_delay_ms: u64,
    pub selectors: BTreeMap<String, String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: DEFAULT_COOLDOWN.as_millis() as u64,
            close_retries: DEFAULT_CLOSE_RETRIES,
            close_retry_delay_ms: DEFAULT_CLOSE_RETRY_DELAY.as_millis() as u64,
            selectors: BTreeMap::new(),
        }
    }
}

impl BridgeConfig {
    pub fn from_json(text: &str) -> Result<Self, BridgeError> {
        let config: BridgeConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, BridgeError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    /// `Ok(None)` when the env var is unset.
    pub fn from_env() -> Result<Option<Self>, BridgeError> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim())).map(Some),
            _ => Ok(None),
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn close_retry_delay(&self) -> Duration {
        Duration::from_millis(self.close_retry_delay_ms)
    }

    fn validate(&self) -> Result<(), BridgeError> {
        for (name, selector) in &self.selectors {
            if ControlId::from_str(name).is_err() {
                return Err(BridgeError::Config(format!("unknown control in selectors: {name}")));
            }
            if selector.trim().is_empty() {
                return Err(BridgeError::Config(format!("empty selector for {name}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config = BridgeConfig::from_json("{}").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.cooldown(), Duration::from_secs(10));
        assert_eq!(config.close_retries, 4);
        assert_eq!(config.close_retry_delay(), Duration::from_millis(300));
    }

    #[test]
    fn selector_override_must_name_a_known_control() {
        let ok = BridgeConfig::from_json(r#"{"selectors": {"button_like": ".like"}}"#).unwrap();
        assert_eq!(ok.selectors["button_like"], ".like");

        let err = BridgeConfig::from_json(r#"{"selectors": {"button_rewind": ".rw"}}"#).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = BridgeConfig::from_json("{cooldown_ms:").unwrap_err();
        assert!(matches!(err, BridgeError::Parse(_)));
    }
}
