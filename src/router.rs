//! Fragment routing.
//!
//! The host talks back to the page by setting the address fragment. A
//! fragment of the form `getfile_<anything>_<filename>` asks the page to load
//! `<filename>` as a script; that script then delivers the result. Any other
//! fragment is handed to the user's handler.
//!
//! Web viewers ignore fragments that start with a digit, so hosts prefix
//! those with `_`. One leading `_` is stripped after decoding.

use crate::config::HashHandler;
use crate::error::Result;
use crate::loader::{LoadRequest, ScriptLoader};
use crate::platform::Platform;
use crate::query::decode_component;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

pub const GETFILE_PREFIX: &str = "getfile_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Load this file as a script.
    LoadFile(String),
    /// Pass the decoded fragment to the handler.
    Fragment(String),
}

/// Percent-decodes a raw fragment and strips one leading `_`.
pub fn decode_fragment(raw: &str) -> String {
    let decoded = decode_component(raw);
    match decoded.strip_prefix('_') {
        Some(rest) => rest.to_string(),
        None => decoded,
    }
}

/// Classifies a decoded fragment.
///
/// The file name is whatever follows the first `_` after the prefix. With no
/// such `_`, the whole fragment is the file name.
pub fn route(fragment: &str) -> Route {
    match fragment.strip_prefix(GETFILE_PREFIX) {
        Some(rest) => {
            let file = match rest.find('_') {
                Some(idx) => &rest[idx + 1..],
                None => fragment,
            };
            Route::LoadFile(file.to_string())
        }
        None => Route::Fragment(fragment.to_string()),
    }
}

pub struct HashRouter<P> {
    platform: Rc<P>,
    loader: ScriptLoader<P>,
    handler: Rc<RefCell<Option<HashHandler>>>,
}

impl<P> Clone for HashRouter<P> {
    fn clone(&self) -> Self {
        Self {
            platform: self.platform.clone(),
            loader: self.loader.clone(),
            handler: self.handler.clone(),
        }
    }
}

impl<P: Platform + 'static> HashRouter<P> {
    pub(crate) fn new(platform: Rc<P>, loader: ScriptLoader<P>) -> Self {
        Self {
            platform,
            loader,
            handler: Rc::new(RefCell::new(None)),
        }
    }

    /// Subscribes to fragment changes for the rest of the page's life.
    pub(crate) fn attach(&self) {
        let router = self.clone();
        self.platform
            .on_hash_change(Rc::new(move || router.handle_change()));
    }

    pub(crate) fn set_handler(&self, handler: Option<HashHandler>) {
        *self.handler.borrow_mut() = handler;
    }

    /// Routes the current fragment.
    pub fn handle_change(&self) -> Result<()> {
        let fragment = decode_fragment(&self.platform.hash());
        match route(&fragment) {
            Route::LoadFile(file) if file.is_empty() => {
                warn!(%fragment, "script delivery fragment names no file");
                Ok(())
            }
            Route::LoadFile(file) => {
                debug!(%file, "fragment requests script delivery");
                self.loader.load(LoadRequest::new(file)).map(|_| ())
            }
            Route::Fragment(fragment) => {
                let handler = self.handler.borrow().clone();
                if let Some(handler) = handler {
                    handler(&fragment);
                }
                Ok(())
            }
        }
    }
}
