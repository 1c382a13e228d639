//! Read-only snapshot of the page's own query parameters.
//!
//! The web viewer address usually carries `db` (the database name) and `wv`
//! (the web viewer object name); hosts may add more. The snapshot is taken
//! once and never changes afterward.

use crate::query::{self, ParamValue, QueryParams};
use once_cell::sync::OnceCell;
use std::sync::Arc;

static GLOBAL: OnceCell<Arc<UrlParams>> = OnceCell::new();

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParams {
    params: QueryParams,
}

impl UrlParams {
    /// Snapshot of the query part of `href` (between `?` and `#`).
    pub fn from_href(href: &str) -> Self {
        let without_fragment = href.split('#').next().unwrap_or_default();
        let search = match without_fragment.find('?') {
            Some(idx) => &without_fragment[idx..],
            None => "",
        };
        Self {
            params: query::decode(search),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }

    pub fn exists(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn all(&self) -> &QueryParams {
        &self.params
    }
}

/// Installs the process-wide snapshot. The first install wins; later calls
/// return the snapshot already in place.
pub fn init_global(params: Arc<UrlParams>) -> Arc<UrlParams> {
    GLOBAL.get_or_init(|| params).clone()
}

pub fn global() -> Option<Arc<UrlParams>> {
    GLOBAL.get().cloned()
}

/// Looks `key` up in the process-wide snapshot.
pub fn url_param(key: &str) -> Option<ParamValue> {
    GLOBAL.get().and_then(|p| p.get(key).cloned())
}

pub fn url_param_exists(key: &str) -> bool {
    GLOBAL.get().map(|p| p.exists(key)).unwrap_or(false)
}

/// Full process-wide snapshot; empty when none was installed yet.
pub fn url_params() -> QueryParams {
    GLOBAL.get().map(|p| p.all().clone()).unwrap_or_default()
}
