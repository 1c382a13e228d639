//! Script loading by element injection.
//!
//! Each load settles exactly once: on the element's load event, its error
//! event, a synchronous injection failure, or the load timer, whichever comes
//! first. Settling cancels the timer and detaches the element before any
//! callback runs; signals arriving afterward are ignored.

use crate::config::{duration_ms, SharedSettings};
use crate::error::{BridgeError, FailureCallback, Result};
use crate::platform::{LoadEvent, LoadObserver, LoadOutcome, Platform, ScriptHandle, TimerId};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, trace, warn};

pub type LoadCallback = Box<dyn FnOnce(LoadEvent)>;

/// A script to load and what to do once it settles.
pub struct LoadRequest {
    pub file: String,
    /// Falls back to the configured timeout limit.
    pub timeout: Option<Duration>,
    on_success: Option<LoadCallback>,
    on_failure: Option<FailureCallback>,
}

impl LoadRequest {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            timeout: None,
            on_success: None,
            on_failure: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn on_success(mut self, f: impl FnOnce(LoadEvent) + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    /// Without a failure callback, a failed load is raised as an error.
    pub fn on_failure(mut self, f: impl FnOnce(BridgeError) + 'static) -> Self {
        self.on_failure = Some(Box::new(f));
        self
    }
}

impl From<&str> for LoadRequest {
    fn from(file: &str) -> Self {
        LoadRequest::new(file)
    }
}

impl From<String> for LoadRequest {
    fn from(file: String) -> Self {
        LoadRequest::new(file)
    }
}

impl std::fmt::Debug for LoadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadRequest")
            .field("file", &self.file)
            .field("timeout", &self.timeout)
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

enum Settlement {
    Loaded(LoadEvent),
    Errored,
    TimedOut,
}

impl From<LoadOutcome> for Settlement {
    fn from(outcome: LoadOutcome) -> Self {
        match outcome {
            LoadOutcome::Loaded(event) => Settlement::Loaded(event),
            LoadOutcome::Errored => Settlement::Errored,
        }
    }
}

struct LoadState {
    file: String,
    timeout_ms: u64,
    timer: Option<TimerId>,
    handle: Option<ScriptHandle>,
    settled: bool,
    on_success: Option<LoadCallback>,
    on_failure: Option<FailureCallback>,
}

pub struct ScriptLoader<P> {
    platform: Rc<P>,
    settings: SharedSettings,
}

impl<P> Clone for ScriptLoader<P> {
    fn clone(&self) -> Self {
        Self {
            platform: self.platform.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<P: Platform + 'static> ScriptLoader<P> {
    pub(crate) fn new(platform: Rc<P>, settings: SharedSettings) -> Self {
        Self { platform, settings }
    }

    /// Starts loading `request.file`. Returns `Ok(true)` once the load is
    /// under way; the outcome arrives through the request's callbacks.
    ///
    /// An injection failure settles the load immediately, so with no failure
    /// callback it comes back from this call as [`BridgeError::LoadFailure`].
    pub fn load(&self, request: impl Into<LoadRequest>) -> Result<bool> {
        let LoadRequest {
            file,
            timeout,
            on_success,
            on_failure,
        } = request.into();
        if file.is_empty() {
            return Err(BridgeError::MissingFile);
        }
        let timeout = timeout.unwrap_or_else(|| self.settings.borrow().timeout_limit);
        // Timestamp keeps the viewer from serving a cached copy.
        let src = format!("{}?{}", file, self.platform.now_ms());
        debug!(%src, timeout_ms = duration_ms(timeout), "loading script");

        let state = Rc::new(RefCell::new(LoadState {
            file,
            timeout_ms: duration_ms(timeout),
            timer: None,
            handle: None,
            settled: false,
            on_success,
            on_failure,
        }));

        let timer = {
            let platform = self.platform.clone();
            let state = state.clone();
            self.platform.set_timeout(
                timeout,
                Box::new(move || settle(&*platform, &state, Settlement::TimedOut)),
            )
        };
        state.borrow_mut().timer = Some(timer);

        let observer: LoadObserver = {
            let platform = self.platform.clone();
            let state = state.clone();
            Box::new(move |outcome| settle(&*platform, &state, outcome.into()))
        };

        match self.platform.inject_script(&src, observer) {
            Ok(handle) => {
                let settled = {
                    let mut s = state.borrow_mut();
                    if !s.settled {
                        s.handle = Some(handle);
                    }
                    s.settled
                };
                if settled && self.platform.is_attached(handle) {
                    self.platform.detach_script(handle);
                }
            }
            Err(err) => {
                warn!(%src, error = %err, "script injection failed");
                settle(&*self.platform, &state, Settlement::Errored)?;
            }
        }
        Ok(true)
    }
}

fn settle<P: Platform + ?Sized>(
    platform: &P,
    state: &RefCell<LoadState>,
    settlement: Settlement,
) -> Result<()> {
    let (file, timeout_ms, timer, handle, on_success, on_failure) = {
        let mut s = state.borrow_mut();
        if s.settled {
            trace!(file = %s.file, "ignoring signal for settled load");
            return Ok(());
        }
        s.settled = true;
        (
            std::mem::take(&mut s.file),
            s.timeout_ms,
            s.timer.take(),
            s.handle.take(),
            s.on_success.take(),
            s.on_failure.take(),
        )
    };

    if let Some(timer) = timer {
        platform.clear_timeout(timer);
    }
    if let Some(handle) = handle {
        if platform.is_attached(handle) {
            platform.detach_script(handle);
        }
    }

    let error = match settlement {
        Settlement::Loaded(event) => {
            debug!(%file, "script loaded");
            if let Some(cb) = on_success {
                cb(event);
            }
            return Ok(());
        }
        Settlement::Errored => BridgeError::LoadFailure { file },
        Settlement::TimedOut => BridgeError::LoadTimeout { file, timeout_ms },
    };

    debug!(error = %error, "script load failed");
    match on_failure {
        Some(cb) => {
            cb(error);
            Ok(())
        }
        None => Err(error),
    }
}
