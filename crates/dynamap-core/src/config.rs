//! Mapper configuration.
//!
//! Provides [`MapperConfig`], which controls table naming and the default
//! storage mode of registered models. Values can be loaded from environment
//! variables.

use std::env;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Mapper configuration.
///
/// # Examples
///
/// ```
/// use dynamap_core::config::MapperConfig;
///
/// let config = MapperConfig::builder().table_prefix("dev_".to_owned()).build();
/// assert_eq!(config.table_name("USERS"), "dev_USERS");
/// assert!(!config.compact_by_default);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase", default)]
pub struct MapperConfig {
    /// Prefix prepended to every resolved table name.
    #[builder(default)]
    pub table_prefix: String,

    /// Store models in compact form unless their options say otherwise.
    #[builder(default = false)]
    pub compact_by_default: bool,
}

impl MapperConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DYNAMAP_TABLE_PREFIX` | empty |
    /// | `DYNAMAP_COMPACT_DEFAULT` | `false` |
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            table_prefix: env::var("DYNAMAP_TABLE_PREFIX").unwrap_or_default(),
            compact_by_default: env_bool("DYNAMAP_COMPACT_DEFAULT", false),
        }
    }

    /// The physical table name for a logical one.
    #[must_use]
    pub fn table_name(&self, table: &str) -> String {
        format!("{}{table}", self.table_prefix)
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key).map_or(default, |v| {
        matches!(v.as_str(), "1" | "true" | "yes" | "TRUE" | "YES")
    })
}
