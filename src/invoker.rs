//! Host script invocation.
//!
//! A host call is an `fmp://` URL:
//!
//! ```text
//! fmp://<path>/<db>?script=<script>[&param=<param>][&<key>=<value>]*
//! ```
//!
//! with every component encoded as in [`crate::query`]. The host intercepts
//! the URL when a hidden link to it is clicked, runs the script, and answers
//! by calling [`HostInvoker::deliver_result`] (directly, or from a script it
//! delivers through the fragment).
//!
//! Only one call awaits a response at a time. A call made while another is
//! pending is queued and dispatched, in order, once the pending one resolves.

use crate::config::{duration_ms, SharedSettings, DEFAULT_DATABASE_PATH};
use crate::error::{BridgeError, FailureCallback, Result};
use crate::params::UrlParams;
use crate::platform::{Platform, TimerId};
use crate::query::{self, encode_component, Variables};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

pub type SuccessCallback = Box<dyn FnOnce(Value)>;

/// Prefix added to page parameter names forwarded with `include_url_params`.
/// It goes out literally; only the name after it is percent-encoded.
pub const URL_PARAM_VARIABLE_PREFIX: &str = "$_";

/// Which host script to run and what to send it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub script: String,
    /// Falls back to the configured database name when unset or empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_name: Option<String>,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    /// Sent as `&key=value` pairs in insertion order.
    #[serde(default)]
    pub variables: Variables,
    /// Also forward every page query parameter as a `$_<name>` variable.
    #[serde(default)]
    pub include_url_params: bool,
}

fn default_database_path() -> String {
    DEFAULT_DATABASE_PATH.to_string()
}

impl InvocationRequest {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            database_name: None,
            database_path: default_database_path(),
            parameter: None,
            variables: Variables::new(),
            include_url_params: false,
        }
    }

    pub fn database(mut self, name: impl Into<String>) -> Self {
        self.database_name = Some(name.into());
        self
    }

    pub fn database_path(mut self, path: impl Into<String>) -> Self {
        self.database_path = path.into();
        self
    }

    pub fn parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = Some(parameter.into());
        self
    }

    pub fn variable(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn include_url_params(mut self, include: bool) -> Self {
        self.include_url_params = include;
        self
    }
}

/// Shorthand: just the script name.
impl From<&str> for InvocationRequest {
    fn from(script: &str) -> Self {
        InvocationRequest::new(script)
    }
}

impl From<String> for InvocationRequest {
    fn from(script: String) -> Self {
        InvocationRequest::new(script)
    }
}

/// Builds the host URL for `request`. Pure.
///
/// `fallback_database` is used when the request names no database;
/// `page_params` is only read when the request includes URL params.
pub fn compose_url(
    request: &InvocationRequest,
    fallback_database: Option<&str>,
    page_params: &UrlParams,
) -> Result<String> {
    if request.script.is_empty() {
        return Err(BridgeError::MissingScript);
    }
    let database = request
        .database_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .or(fallback_database)
        .unwrap_or_default();
    if database.is_empty() {
        return Err(BridgeError::MissingDatabase);
    }

    let mut url = format!(
        "fmp://{}/{}?script={}",
        request.database_path,
        encode_component(database),
        encode_component(&request.script)
    );
    if let Some(parameter) = &request.parameter {
        url.push_str("&param=");
        url.push_str(&encode_component(parameter));
    }
    url.push_str(&query::encode(&request.variables));
    if request.include_url_params {
        for (key, value) in page_params.all() {
            url.push('&');
            url.push_str(URL_PARAM_VARIABLE_PREFIX);
            url.push_str(&encode_component(key));
            url.push('=');
            url.push_str(&encode_component(&value.to_host_string()));
        }
    }
    Ok(url)
}

/// A request plus what to do with the host's answer.
///
/// A call with neither callback is fire-and-forget: it is dispatched but
/// never waits for a response.
pub struct HostCall {
    pub request: InvocationRequest,
    /// Falls back to the configured timeout limit.
    pub timeout: Option<Duration>,
    on_success: Option<SuccessCallback>,
    on_failure: Option<FailureCallback>,
}

impl HostCall {
    pub fn new(request: impl Into<InvocationRequest>) -> Self {
        Self {
            request: request.into(),
            timeout: None,
            on_success: None,
            on_failure: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn on_success(mut self, f: impl FnOnce(Value) + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    /// Without a failure callback, a timeout is raised as an error from the
    /// timer that detected it.
    pub fn on_failure(mut self, f: impl FnOnce(BridgeError) + 'static) -> Self {
        self.on_failure = Some(Box::new(f));
        self
    }

    pub fn expects_response(&self) -> bool {
        self.on_success.is_some() || self.on_failure.is_some()
    }
}

impl From<InvocationRequest> for HostCall {
    fn from(request: InvocationRequest) -> Self {
        HostCall::new(request)
    }
}

impl From<&str> for HostCall {
    fn from(script: &str) -> Self {
        HostCall::new(script)
    }
}

impl std::fmt::Debug for HostCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostCall")
            .field("request", &self.request)
            .field("timeout", &self.timeout)
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

/// What [`HostInvoker::invoke`] did with a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The URL was sent to the host.
    Sent(String),
    /// Another call is pending; the URL will be sent after it resolves.
    Queued(String),
}

impl Dispatch {
    pub fn url(&self) -> &str {
        match self {
            Dispatch::Sent(url) | Dispatch::Queued(url) => url,
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, Dispatch::Queued(_))
    }
}

struct PendingResponse {
    id: u64,
    timer: TimerId,
    deadline_ms: u64,
    timeout_ms: u64,
    on_success: Option<SuccessCallback>,
    on_failure: Option<FailureCallback>,
}

struct QueuedCall {
    url: String,
    call: HostCall,
}

#[derive(Default)]
struct InvokerState {
    active: Option<PendingResponse>,
    queue: VecDeque<QueuedCall>,
    next_id: u64,
}

pub struct HostInvoker<P> {
    platform: Rc<P>,
    settings: SharedSettings,
    page_params: Arc<UrlParams>,
    state: Rc<RefCell<InvokerState>>,
}

impl<P> Clone for HostInvoker<P> {
    fn clone(&self) -> Self {
        Self {
            platform: self.platform.clone(),
            settings: self.settings.clone(),
            page_params: self.page_params.clone(),
            state: self.state.clone(),
        }
    }
}

impl<P: Platform + 'static> HostInvoker<P> {
    pub(crate) fn new(platform: Rc<P>, settings: SharedSettings, page_params: Arc<UrlParams>) -> Self {
        Self {
            platform,
            settings,
            page_params,
            state: Rc::new(RefCell::new(InvokerState::default())),
        }
    }

    /// Host URL for `request`, using the configured database as fallback.
    pub fn build_url(&self, request: &InvocationRequest) -> Result<String> {
        let settings = self.settings.borrow();
        compose_url(request, settings.database_name.as_deref(), &self.page_params)
    }

    /// Sends `call` to the host, or queues it behind the pending call.
    ///
    /// Configuration errors are returned before anything is sent or queued.
    pub fn invoke(&self, call: impl Into<HostCall>) -> Result<Dispatch> {
        let call = call.into();
        let url = self.build_url(&call.request)?;

        // Strict FIFO: a call started from a resolution callback still waits
        // behind calls that were queued before it.
        let busy = {
            let state = self.state.borrow();
            state.active.is_some() || !state.queue.is_empty()
        };
        if busy {
            let mut state = self.state.borrow_mut();
            state.queue.push_back(QueuedCall {
                url: url.clone(),
                call,
            });
            debug!(%url, queued = state.queue.len(), "host call queued");
            return Ok(Dispatch::Queued(url));
        }

        self.send(&url)?;
        self.await_response(call);
        Ok(Dispatch::Sent(url))
    }

    /// Entry point for the host's answer. Resolves the pending call with
    /// `data`; without a pending call this does nothing.
    pub fn deliver_result(&self, data: Value) -> Result<()> {
        let pending = self.state.borrow_mut().active.take();
        let Some(pending) = pending else {
            debug!("result delivered with no pending host call");
            return Ok(());
        };
        self.platform.clear_timeout(pending.timer);
        debug!(id = pending.id, "host call resolved");
        if let Some(cb) = pending.on_success {
            cb(data);
        }
        self.advance_queue()
    }

    pub fn is_pending(&self) -> bool {
        self.state.borrow().active.is_some()
    }

    /// Deadline of the pending call on the platform clock.
    pub fn pending_deadline_ms(&self) -> Option<u64> {
        self.state.borrow().active.as_ref().map(|p| p.deadline_ms)
    }

    pub fn queued_len(&self) -> usize {
        self.state.borrow().queue.len()
    }

    fn send(&self, url: &str) -> Result<()> {
        let href = self.platform.href();
        self.platform.click_link(url)?;
        debug!(%url, "host call dispatched");

        // Some viewers stop reporting fragment changes after the link click;
        // reloading the unchanged address re-arms them.
        if href.contains('#') {
            let platform = self.platform.clone();
            self.platform.set_timeout(
                Duration::from_millis(1),
                Box::new(move || {
                    platform.navigate(&href);
                    Ok(())
                }),
            );
        }
        Ok(())
    }

    fn await_response(&self, call: HostCall) {
        if !call.expects_response() {
            return;
        }
        let timeout = call
            .timeout
            .unwrap_or_else(|| self.settings.borrow().timeout_limit);
        let id = {
            let mut state = self.state.borrow_mut();
            state.next_id += 1;
            state.next_id
        };
        let timer = {
            let invoker = self.clone();
            self.platform
                .set_timeout(timeout, Box::new(move || invoker.expire(id)))
        };
        let timeout_ms = duration_ms(timeout);
        self.state.borrow_mut().active = Some(PendingResponse {
            id,
            timer,
            deadline_ms: self.platform.now_ms().saturating_add(timeout_ms),
            timeout_ms,
            on_success: call.on_success,
            on_failure: call.on_failure,
        });
    }

    fn expire(&self, id: u64) -> Result<()> {
        let pending = {
            let mut state = self.state.borrow_mut();
            if state.active.as_ref().is_some_and(|p| p.id == id) {
                state.active.take()
            } else {
                None
            }
        };
        let Some(pending) = pending else {
            trace!(id, "stale response timer");
            return Ok(());
        };

        let error = BridgeError::ResponseTimeout {
            timeout_ms: pending.timeout_ms,
        };
        warn!(id, error = %error, "host call timed out");
        let outcome = match pending.on_failure {
            Some(cb) => {
                cb(error);
                Ok(())
            }
            None => Err(error),
        };
        let advanced = self.advance_queue();
        outcome.and(advanced)
    }

    /// Dispatches queued calls until one of them waits for a response.
    fn advance_queue(&self) -> Result<()> {
        let mut first_error = None;
        loop {
            let next = {
                let mut state = self.state.borrow_mut();
                if state.active.is_some() {
                    break;
                }
                state.queue.pop_front()
            };
            let Some(QueuedCall { url, mut call }) = next else {
                break;
            };
            match self.send(&url) {
                Ok(()) => self.await_response(call),
                Err(err) => {
                    warn!(%url, error = %err, "queued host call could not be dispatched");
                    match call.on_failure.take() {
                        Some(cb) => cb(err),
                        None => {
                            first_error.get_or_insert(err);
                        }
                    }
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
