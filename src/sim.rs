//! A deterministic page for driving the bridge without a browser.
//!
//! [`SimulatedPage`] implements [`crate::platform::Platform`] over a virtual clock. Timers run
//! only when the clock is advanced, scripts settle only when told to, and
//! every link click and navigation is recorded. A script is released once it
//! is detached and its load or error event has fired, so a long session does
//! not accumulate settled scripts.
//!
//! ```
//! use webviewer_bridge::sim::SimulatedPage;
//! use webviewer_bridge::{Bridge, HostCall};
//!
//! let page = SimulatedPage::shared("file:///viewer/index.html?db=finance");
//! let bridge = Bridge::new(page.clone());
//!
//! bridge.invoke(HostCall::new("get_message").on_success(|_| {})).unwrap();
//! assert_eq!(page.clicked_links(), ["fmp://$/finance?script=get_message"]);
//! bridge.deliver_result("hello".into()).unwrap();
//! assert!(!bridge.invoker().is_pending());
//! ```
//!
//! Errors returned from callbacks are collected the way a browser reports
//! uncaught exceptions: the remaining due work still runs, and the first
//! error comes back from the call that advanced the page.

use crate::error::{BridgeError, Result};
use crate::platform::{
    Document, HashListener, LoadEvent, LoadObserver, LoadOutcome, Location, ScriptHandle, Task,
    TimerId, Timers,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use tracing::trace;

/// Work a served script performs when it executes.
pub type ScriptBody = Box<dyn FnOnce() -> Result<()>>;

struct ScheduledTask {
    id: TimerId,
    due_at: u64,
    order: u64,
    task: Task,
}

struct InjectedScript {
    handle: ScriptHandle,
    src: String,
    attached: bool,
    observer: Option<LoadObserver>,
}

impl InjectedScript {
    fn file(&self) -> &str {
        self.src.split('?').next().unwrap_or_default()
    }
}

struct PageState {
    href: String,
    now_ms: u64,
    next_timer_id: u64,
    next_order: u64,
    tasks: Vec<ScheduledTask>,
    next_script_id: u64,
    scripts: Vec<InjectedScript>,
    served: HashMap<String, ScriptBody>,
    clicks: Vec<String>,
    navigations: Vec<String>,
    hash_listeners: Vec<HashListener>,
    document_ready: bool,
    links_blocked: bool,
}

pub struct SimulatedPage {
    state: RefCell<PageState>,
}

impl SimulatedPage {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            state: RefCell::new(PageState {
                href: href.into(),
                now_ms: 0,
                next_timer_id: 1,
                next_order: 0,
                tasks: Vec::new(),
                next_script_id: 1,
                scripts: Vec::new(),
                served: HashMap::new(),
                clicks: Vec::new(),
                navigations: Vec::new(),
                hash_listeners: Vec::new(),
                document_ready: true,
                links_blocked: false,
            }),
        }
    }

    pub fn shared(href: impl Into<String>) -> Rc<Self> {
        Rc::new(Self::new(href))
    }

    // ----- clock -----

    pub fn now(&self) -> u64 {
        self.state.borrow().now_ms
    }

    /// Moves the clock forward by `delta_ms`, running every timer that comes
    /// due on the way.
    pub fn advance_time(&self, delta_ms: u64) -> Result<()> {
        let target = self.now().saturating_add(delta_ms);
        self.advance_time_to(target)
    }

    pub fn advance_time_to(&self, target_ms: u64) -> Result<()> {
        let result = self.run_timers(Some(target_ms));
        let mut state = self.state.borrow_mut();
        state.now_ms = state.now_ms.max(target_ms);
        result.map(|_| ())
    }

    /// Runs timers already due without moving the clock.
    pub fn run_due_timers(&self) -> Result<usize> {
        let now = self.now();
        self.run_timers(Some(now))
    }

    /// Runs every timer, including ones scheduled while flushing, moving the
    /// clock to each one's due time.
    pub fn flush(&self) -> Result<usize> {
        self.run_timers(None)
    }

    pub fn pending_timers(&self) -> usize {
        self.state.borrow().tasks.len()
    }

    fn run_timers(&self, due_limit: Option<u64>) -> Result<usize> {
        let mut ran = 0usize;
        let mut first_error: Option<BridgeError> = None;
        loop {
            let task = {
                let mut state = self.state.borrow_mut();
                let next = state
                    .tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| due_limit.map_or(true, |limit| t.due_at <= limit))
                    .min_by_key(|(_, t)| (t.due_at, t.order))
                    .map(|(idx, _)| idx);
                let Some(idx) = next else {
                    break;
                };
                let task = state.tasks.remove(idx);
                if task.due_at > state.now_ms {
                    state.now_ms = task.due_at;
                }
                task
            };
            trace!(id = task.id.0, due_at = task.due_at, "[timer] run");
            ran += 1;
            if let Err(err) = (task.task)() {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(ran),
        }
    }

    // ----- scripts -----

    /// Registers what the script for `file` does when it runs. The body runs
    /// once, just before the load event of the next matching script.
    pub fn serve_script(&self, file: impl Into<String>, body: impl FnOnce() -> Result<()> + 'static) {
        self.state
            .borrow_mut()
            .served
            .insert(file.into(), Box::new(body));
    }

    /// Refuse script injection, as when the document head is unavailable.
    pub fn set_document_ready(&self, ready: bool) {
        self.state.borrow_mut().document_ready = ready;
    }

    /// Attached scripts, oldest first, as `(handle, src)`.
    pub fn attached_scripts(&self) -> Vec<(ScriptHandle, String)> {
        self.state
            .borrow()
            .scripts
            .iter()
            .filter(|s| s.attached)
            .map(|s| (s.handle, s.src.clone()))
            .collect()
    }

    /// Scripts the page still tracks, as `src`. A script is released once it
    /// is detached and its load or error event has fired.
    pub fn injected_sources(&self) -> Vec<String> {
        self.state
            .borrow()
            .scripts
            .iter()
            .map(|s| s.src.clone())
            .collect()
    }

    /// Most recently injected script whose address (minus the cache-busting
    /// token) is `file`.
    pub fn script_for(&self, file: &str) -> Option<ScriptHandle> {
        self.state
            .borrow()
            .scripts
            .iter()
            .rev()
            .find(|s| s.file() == file)
            .map(|s| s.handle)
    }

    /// Runs the script's served body, if any, then fires its load event.
    pub fn complete_script(&self, handle: ScriptHandle) -> Result<()> {
        let (src, body, observer) = {
            let mut state = self.state.borrow_mut();
            let Some(idx) = state.scripts.iter().position(|s| s.handle == handle) else {
                return Ok(());
            };
            let file = state.scripts[idx].file().to_string();
            let body = state.served.remove(&file);
            let script = &mut state.scripts[idx];
            (script.src.clone(), body, script.observer.take())
        };
        let ran = match body {
            Some(body) => body(),
            None => Ok(()),
        };
        let settled = match observer {
            Some(observer) => observer(LoadOutcome::Loaded(LoadEvent { src })),
            None => Ok(()),
        };
        self.release_settled_scripts();
        ran.and(settled)
    }

    /// Fires the script's error event.
    pub fn fail_script(&self, handle: ScriptHandle) -> Result<()> {
        let observer = {
            let mut state = self.state.borrow_mut();
            state
                .scripts
                .iter_mut()
                .find(|s| s.handle == handle)
                .and_then(|s| s.observer.take())
        };
        let settled = match observer {
            Some(observer) => observer(LoadOutcome::Errored),
            None => Ok(()),
        };
        self.release_settled_scripts();
        settled
    }

    /// Number of scripts the page still tracks.
    pub fn tracked_scripts(&self) -> usize {
        self.state.borrow().scripts.len()
    }

    fn release_settled_scripts(&self) {
        release_settled(&mut self.state.borrow_mut().scripts);
    }

    // ----- links and address -----

    /// Make link activation fail, as when the body element is missing.
    pub fn set_links_blocked(&self, blocked: bool) {
        self.state.borrow_mut().links_blocked = blocked;
    }

    pub fn clicked_links(&self) -> Vec<String> {
        self.state.borrow().clicks.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.borrow().navigations.clone()
    }

    /// Sets the fragment, as the host does, and notifies hash listeners
    /// immediately when it changed.
    pub fn set_hash(&self, fragment: &str) -> Result<()> {
        let changed = {
            let mut state = self.state.borrow_mut();
            let base = state.href.split('#').next().unwrap_or_default().to_string();
            let next = format!("{base}#{fragment}");
            let changed = next != state.href;
            state.href = next;
            changed
        };
        if changed {
            self.fire_hash_change()
        } else {
            Ok(())
        }
    }

    fn fire_hash_change(&self) -> Result<()> {
        let listeners = self.state.borrow().hash_listeners.clone();
        notify(&listeners)
    }
}

fn release_settled(scripts: &mut Vec<InjectedScript>) {
    scripts.retain(|s| s.attached || s.observer.is_some());
}

fn notify(listeners: &[HashListener]) -> Result<()> {
    let mut first_error = None;
    for listener in listeners {
        if let Err(err) = listener() {
            first_error.get_or_insert(err);
        }
    }
    first_error.map_or(Ok(()), Err)
}

impl Timers for SimulatedPage {
    fn now_ms(&self) -> u64 {
        self.now()
    }

    fn set_timeout(&self, delay: Duration, task: Task) -> TimerId {
        let mut state = self.state.borrow_mut();
        let id = TimerId(state.next_timer_id);
        state.next_timer_id += 1;
        let order = state.next_order;
        state.next_order += 1;
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        let due_at = state.now_ms.saturating_add(delay_ms);
        trace!(id = id.0, due_at, "[timer] schedule");
        state.tasks.push(ScheduledTask {
            id,
            due_at,
            order,
            task,
        });
        id
    }

    fn clear_timeout(&self, id: TimerId) {
        let mut state = self.state.borrow_mut();
        let before = state.tasks.len();
        state.tasks.retain(|t| t.id != id);
        trace!(id = id.0, removed = before - state.tasks.len(), "[timer] clear");
    }
}

impl Document for SimulatedPage {
    fn inject_script(&self, src: &str, observer: LoadObserver) -> Result<ScriptHandle> {
        let mut state = self.state.borrow_mut();
        if !state.document_ready {
            return Err(BridgeError::Platform("document head is not available".into()));
        }
        let handle = ScriptHandle(state.next_script_id);
        state.next_script_id += 1;
        state.scripts.push(InjectedScript {
            handle,
            src: src.to_string(),
            attached: true,
            observer: Some(observer),
        });
        Ok(handle)
    }

    fn is_attached(&self, handle: ScriptHandle) -> bool {
        self.state
            .borrow()
            .scripts
            .iter()
            .any(|s| s.handle == handle && s.attached)
    }

    fn detach_script(&self, handle: ScriptHandle) {
        let mut state = self.state.borrow_mut();
        if let Some(script) = state.scripts.iter_mut().find(|s| s.handle == handle) {
            script.attached = false;
        }
        release_settled(&mut state.scripts);
    }

    fn click_link(&self, href: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.links_blocked {
            return Err(BridgeError::Platform("page body is not available".into()));
        }
        state.clicks.push(href.to_string());
        Ok(())
    }
}

impl Location for SimulatedPage {
    fn href(&self) -> String {
        self.state.borrow().href.clone()
    }

    /// Records the navigation. A fragment change is reported to hash
    /// listeners on the next timer turn, as browsers do.
    fn navigate(&self, href: &str) {
        let fragment_changed = {
            let mut state = self.state.borrow_mut();
            state.navigations.push(href.to_string());
            let old_fragment = state.href.split_once('#').map(|(_, f)| f.to_string());
            let new_fragment = href.split_once('#').map(|(_, f)| f.to_string());
            state.href = href.to_string();
            old_fragment != new_fragment
        };
        if fragment_changed {
            // Re-enter through the timer queue so listener errors surface
            // from the call that advanced the page.
            let listeners = self.state.borrow().hash_listeners.clone();
            self.set_timeout(
                Duration::ZERO,
                Box::new(move || notify(&listeners)),
            );
        }
    }

    fn on_hash_change(&self, listener: HashListener) {
        self.state.borrow_mut().hash_listeners.push(listener);
    }
}
