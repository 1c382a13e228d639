//! Capabilities the bridge needs from the page it runs in.
//!
//! A browser binding implements these on top of the DOM; [`crate::sim`]
//! implements them over a virtual clock for tests. Everything runs on one
//! thread, so callbacks are plain boxed closures without `Send`.
//!
//! Tasks, load observers and hash listeners return [`crate::Result`]: an `Err`
//! is an unhandled failure (no failure callback was supplied) and must be
//! surfaced by the event loop that ran the callback.

use crate::error::Result;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptHandle(pub u64);

pub type Task = Box<dyn FnOnce() -> Result<()>>;
pub type LoadObserver = Box<dyn FnOnce(LoadOutcome) -> Result<()>>;
pub type HashListener = Rc<dyn Fn() -> Result<()>>;

/// Detail passed through from a successful script load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadEvent {
    pub src: String,
}

/// The two ways an injected script can settle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(LoadEvent),
    Errored,
}

pub trait Timers {
    /// Milliseconds since an arbitrary epoch; used for cache-busting tokens.
    fn now_ms(&self) -> u64;
    fn set_timeout(&self, delay: Duration, task: Task) -> TimerId;
    /// Unknown or already-fired ids are ignored.
    fn clear_timeout(&self, id: TimerId);
}

pub trait Document {
    /// Appends a script element for `src`. The observer is called at most
    /// once, when the element loads or errors.
    fn inject_script(&self, src: &str, observer: LoadObserver) -> Result<ScriptHandle>;
    fn is_attached(&self, handle: ScriptHandle) -> bool;
    fn detach_script(&self, handle: ScriptHandle);
    /// Activates a hidden link to `href` without navigating the page.
    fn click_link(&self, href: &str) -> Result<()>;
}

pub trait Location {
    fn href(&self) -> String;
    /// Replaces the page address.
    fn navigate(&self, href: &str);
    /// Registers `listener` for every later fragment change.
    fn on_hash_change(&self, listener: HashListener);

    /// Raw fragment without the leading `#`; empty when there is none.
    fn hash(&self) -> String {
        let href = self.href();
        match href.split_once('#') {
            Some((_, fragment)) => fragment.to_string(),
            None => String::new(),
        }
    }
}

/// Everything the bridge needs, in one bound.
pub trait Platform: Timers + Document + Location {}

impl<T: Timers + Document + Location + ?Sized> Platform for T {}
