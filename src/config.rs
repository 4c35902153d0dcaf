//! Cache configuration.
//!
//! Defaults can be overridden from the environment:
//! - `MLP_CACHE_GROUP` (default `mlp`)
//! - `MLP_CACHE_LOCAL_CAPACITY` (default 1000, `0` disables the local layer)
//! - `MLP_CACHE_DEFAULT_TTL_SECS` (default 0, no expiration)
//! - `MLP_CACHE_GLOBAL_GROUPS` (comma separated)
//!
//! or loaded from YAML:
//!
//! ```yaml
//! default_group: mlp
//! local_capacity: 500
//! default_ttl_secs: 3600
//! global_groups: [site_relations, mlp_network]
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::DEFAULT_GROUP;
use crate::{Error, ErrorContext, Result};

pub const ENV_GROUP: &str = "MLP_CACHE_GROUP";
pub const ENV_LOCAL_CAPACITY: &str = "MLP_CACHE_LOCAL_CAPACITY";
pub const ENV_DEFAULT_TTL_SECS: &str = "MLP_CACHE_DEFAULT_TTL_SECS";
pub const ENV_GLOBAL_GROUPS: &str = "MLP_CACHE_GLOBAL_GROUPS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub default_group: String,
    pub local_capacity: usize,
    pub default_ttl_secs: u64,
    /// Groups shared by every site instead of partitioned per site.
    pub global_groups: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_group: DEFAULT_GROUP.to_string(),
            local_capacity: 1000,
            default_ttl_secs: 0,
            global_groups: vec!["site_relations".to_string(), "mlp_network".to_string()],
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.default_group = group.into();
        self
    }
    pub fn with_local_capacity(mut self, capacity: usize) -> Self {
        self.local_capacity = capacity;
        self
    }
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl_secs = ttl.as_secs();
        self
    }
    pub fn with_global_group(mut self, group: impl Into<String>) -> Self {
        self.global_groups.push(group.into());
        self
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env(|name| std::env::var(name).ok())
    }

    /// Applies overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(group) = lookup(ENV_GROUP).filter(|g| !g.trim().is_empty()) {
            self.default_group = group.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_LOCAL_CAPACITY) {
            self.local_capacity = parse_var(ENV_LOCAL_CAPACITY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_DEFAULT_TTL_SECS) {
            self.default_ttl_secs = parse_var(ENV_DEFAULT_TTL_SECS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_GLOBAL_GROUPS) {
            self.global_groups = raw
                .split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string)
                .collect();
        }
        self.validate()?;
        debug!(config = ?self, "Cache configuration resolved");
        Ok(self)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content).map_err(|e| match e {
            Error::Yaml(inner) => Error::configuration_with_context(
                inner.to_string(),
                ErrorContext::new()
                    .with_field_path(path.as_ref().display().to_string())
                    .with_source("config"),
            ),
            other => other,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_group.trim().is_empty() {
            return Err(Error::configuration_with_context(
                "default cache group must not be empty",
                ErrorContext::new().with_field_path("default_group").with_source("config"),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| {
        Error::configuration_with_context(
            format!("invalid value '{}'", raw),
            ErrorContext::new()
                .with_field_path(name)
                .with_details(e.to_string())
                .with_source("config"),
        )
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let cfg = CacheConfig::default();
        assert_eq!(cfg.default_group, "mlp");
        assert_eq!(cfg.local_capacity, 1000);
        assert_eq!(cfg.default_ttl(), Duration::ZERO);
        assert!(cfg.global_groups.contains(&"site_relations".to_string()));
    }

    #[test]
    fn env_overrides() {
        let cfg = CacheConfig::default()
            .apply_env(env(&[
                (ENV_GROUP, " translations "),
                (ENV_LOCAL_CAPACITY, "0"),
                (ENV_DEFAULT_TTL_SECS, "60"),
                (ENV_GLOBAL_GROUPS, "a, b,,"),
            ]))
            .expect("valid env");
        assert_eq!(cfg.default_group, "translations");
        assert_eq!(cfg.local_capacity, 0);
        assert_eq!(cfg.default_ttl(), Duration::from_secs(60));
        assert_eq!(cfg.global_groups, vec!["a", "b"]);
    }

    #[test]
    fn malformed_number_names_variable() {
        let err = CacheConfig::default()
            .apply_env(env(&[(ENV_LOCAL_CAPACITY, "lots")]))
            .expect_err("should reject");
        let ctx = err.context().expect("configuration errors carry context");
        assert_eq!(ctx.field_path.as_deref(), Some(ENV_LOCAL_CAPACITY));
    }

    #[test]
    fn blank_group_env_is_ignored() {
        let cfg = CacheConfig::default().apply_env(env(&[(ENV_GROUP, "  ")])).expect("valid env");
        assert_eq!(cfg.default_group, "mlp");
    }

    #[test]
    fn yaml_fills_missing_fields_with_defaults() {
        let cfg = CacheConfig::from_yaml_str("local_capacity: 5\n").expect("valid yaml");
        assert_eq!(cfg.local_capacity, 5);
        assert_eq!(cfg.default_group, "mlp");
    }

    #[test]
    fn yaml_rejects_empty_group() {
        assert!(CacheConfig::from_yaml_str("default_group: ''\n").is_err());
    }

    #[test]
    fn builder() {
        let cfg = CacheConfig::new()
            .with_group("x")
            .with_local_capacity(3)
            .with_default_ttl(Duration::from_secs(9))
            .with_global_group("shared");
        assert_eq!(cfg.default_group, "x");
        assert_eq!(cfg.local_capacity, 3);
        assert_eq!(cfg.default_ttl_secs, 9);
        assert_eq!(cfg.global_groups.last().map(String::as_str), Some("shared"));
    }
}
