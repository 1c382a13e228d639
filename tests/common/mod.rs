#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;
use webviewer_bridge::sim::SimulatedPage;
use webviewer_bridge::Bridge;

pub const PAGE: &str = "file:///viewer/index.html?db=theDB&fruit=apple&animal=zebra&isZoo";

static TRACING: Once = Once::new();

/// Route `tracing` output to the test harness (visible with --nocapture).
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "webviewer_bridge=debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

/// A bridge on a fresh simulated page at `href`.
pub fn bridge_at(href: &str) -> (Rc<SimulatedPage>, Bridge<SimulatedPage>) {
    init_tracing();
    let page = SimulatedPage::shared(href);
    let bridge = Bridge::new(page.clone());
    (page, bridge)
}

pub fn bridge() -> (Rc<SimulatedPage>, Bridge<SimulatedPage>) {
    bridge_at(PAGE)
}

/// Records every value a callback receives.
pub struct Recorder<T> {
    seen: Rc<RefCell<Vec<T>>>,
}

impl<T: 'static> Recorder<T> {
    pub fn new() -> Self {
        Self {
            seen: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn sink(&self) -> impl FnOnce(T) + 'static {
        let seen = self.seen.clone();
        move |value| seen.borrow_mut().push(value)
    }

    pub fn sink_fn(&self) -> impl Fn(T) + 'static {
        let seen = self.seen.clone();
        move |value| seen.borrow_mut().push(value)
    }

    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.seen.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.seen.borrow().len()
    }
}
