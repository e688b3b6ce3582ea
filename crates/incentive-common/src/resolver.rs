//! Activity configuration registry
//!
//! Resolves an `ActivityRewardConfig` by activity code. Configurations are
//! validated on the way in, so anything returned by `get_config` is
//! structurally sound.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, Result};
use crate::types::activity_config::ActivityRewardConfig;

/// Registry of validated activity configurations
#[derive(Debug, Default)]
pub struct ConfigRegistry {
    configs: RwLock<HashMap<String, Arc<ActivityRewardConfig>>>,
}

impl ConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object of `{ activity_code: config }`
    pub fn from_json_str(json: &str) -> Result<Self> {
        let parsed: BTreeMap<String, ActivityRewardConfig> =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let registry = Self::new();
        for (key, config) in parsed {
            registry.register(key, config)?;
        }
        info!(activities = registry.len(), "Loaded activity reward configurations");
        Ok(registry)
    }

    /// Load a JSON configuration document from disk
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Parse(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Validate and register a configuration, replacing any previous one
    pub fn register(&self, key: impl Into<String>, config: ActivityRewardConfig) -> Result<()> {
        let key = key.into();
        let violations = Self::validate(&config);
        if !violations.is_empty() {
            warn!(activity = %key, violations = violations.len(), "Rejected invalid reward configuration");
            return Err(ConfigError::Invalid { key, violations }.into());
        }

        debug!(activity = %key, "Registered reward configuration");
        self.configs.write().insert(key, Arc::new(config));
        Ok(())
    }

    /// Look up a configuration; there is no default fallback
    pub fn get_config(&self, key: &str) -> Result<Arc<ActivityRewardConfig>> {
        self.configs
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::NotFound(key.to_string()).into())
    }

    /// Structural checks, one message per violation
    pub fn validate(config: &ActivityRewardConfig) -> Vec<String> {
        config.validate()
    }

    /// Registered activity codes, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.configs.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.configs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IncentiveError;
    use crate::types::activity_config::RewardStrategy;

    const CONFIG_JSON: &str = r#"{
        "bj-2024-05": {
            "lucky_number": "5",
            "lucky_number_mode": "personal_sequence",
            "lucky_rewards": {
                "base": { "name": "接好运", "threshold": 0 },
                "high": { "name": "接好运万元以上", "threshold": 10000 }
            },
            "performance_limits": { "enable_cap": true, "single_contract_cap": 50000 },
            "tiered_rewards": {
                "min_contracts": 1,
                "tiers": [{ "name": "达标奖", "threshold": 80000 }]
            },
            "awards_mapping": { "接好运": 58, "接好运万元以上": 88, "达标奖": "200" }
        },
        "sh-broadcast": {
            "reward_calculation_strategy": { "type": "announcement_only" }
        }
    }"#;

    #[test]
    fn test_load_and_resolve() {
        let registry = ConfigRegistry::from_json_str(CONFIG_JSON).unwrap();
        assert_eq!(registry.keys(), vec!["bj-2024-05", "sh-broadcast"]);

        let config = registry.get_config("bj-2024-05").unwrap();
        assert_eq!(config.lucky_divisor(), Some(5));

        let broadcast = registry.get_config("sh-broadcast").unwrap();
        assert_eq!(
            broadcast.reward_calculation_strategy,
            RewardStrategy::AnnouncementOnly
        );
    }

    #[test]
    fn test_missing_config_is_an_error() {
        let registry = ConfigRegistry::new();
        let err = registry.get_config("nowhere").unwrap_err();
        assert!(matches!(
            err,
            IncentiveError::Config(ConfigError::NotFound(ref key)) if key == "nowhere"
        ));
    }

    #[test]
    fn test_invalid_config_rejected_at_load() {
        let json = r#"{ "bad": { "lucky_number": "7" } }"#;
        let err = ConfigRegistry::from_json_str(json).unwrap_err();
        assert!(matches!(err, IncentiveError::Config(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_malformed_json() {
        let err = ConfigRegistry::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, IncentiveError::Config(ConfigError::Parse(_))));
    }
}
