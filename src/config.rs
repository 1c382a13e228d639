//! Bridge configuration.
//!
//! [`BridgeConfig`] is the serializable part (timeout, database name, whether
//! to route the initial fragment) and can be loaded from TOML:
//!
//! ```toml
//! timeout_limit_ms = 6000
//! database_name = "finance"
//! load_initial_hash = true
//! ```
//!
//! [`ConfigureOptions`] adds the fragment handler, which cannot be
//! serialized, and is what [`crate::Bridge::configure`] takes.

use serde::{Deserialize, Serialize};
use std::rc::Rc;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_LIMIT_MS: u64 = 3000;
pub const DEFAULT_DATABASE_PATH: &str = "$";

/// Handler for fragment changes that are not script deliveries.
pub type HashHandler = Rc<dyn Fn(&str)>;

fn default_timeout_limit_ms() -> u64 {
    DEFAULT_TIMEOUT_LIMIT_MS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_timeout_limit_ms")]
    pub timeout_limit_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_name: Option<String>,
    #[serde(default)]
    pub load_initial_hash: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            timeout_limit_ms: DEFAULT_TIMEOUT_LIMIT_MS,
            database_name: None,
            load_initial_hash: false,
        }
    }
}

#[cfg(feature = "config")]
impl BridgeConfig {
    pub fn from_toml_str(raw: &str) -> crate::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_path(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

/// Options for [`crate::Bridge::configure`].
///
/// `None` keeps the current timeout and database name. The fragment handler
/// is always replaced, so configuring without one removes any earlier
/// handler.
#[derive(Clone, Default)]
pub struct ConfigureOptions {
    pub timeout_limit: Option<Duration>,
    pub database_name: Option<String>,
    pub on_hash_change: Option<HashHandler>,
    pub load_initial_hash: bool,
}

impl ConfigureOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout_limit(mut self, limit: Duration) -> Self {
        self.timeout_limit = Some(limit);
        self
    }

    pub fn database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = Some(name.into());
        self
    }

    pub fn on_hash_change(mut self, handler: impl Fn(&str) + 'static) -> Self {
        self.on_hash_change = Some(Rc::new(handler));
        self
    }

    pub fn load_initial_hash(mut self, load: bool) -> Self {
        self.load_initial_hash = load;
        self
    }
}

impl std::fmt::Debug for ConfigureOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigureOptions")
            .field("timeout_limit", &self.timeout_limit)
            .field("database_name", &self.database_name)
            .field("on_hash_change", &self.on_hash_change.is_some())
            .field("load_initial_hash", &self.load_initial_hash)
            .finish()
    }
}

impl From<BridgeConfig> for ConfigureOptions {
    fn from(config: BridgeConfig) -> Self {
        Self {
            timeout_limit: Some(Duration::from_millis(config.timeout_limit_ms)),
            database_name: config.database_name,
            on_hash_change: None,
            load_initial_hash: config.load_initial_hash,
        }
    }
}

/// Settings shared by the loader and the invoker.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub timeout_limit: Duration,
    pub database_name: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout_limit: Duration::from_millis(DEFAULT_TIMEOUT_LIMIT_MS),
            database_name: None,
        }
    }
}

/// Interior-mutable handle to [`Settings`], cloned into each component.
pub(crate) type SharedSettings = Rc<std::cell::RefCell<Settings>>;

pub(crate) fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
