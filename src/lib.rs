//! # webviewer_bridge
//!
//! Page-side bridge for web pages that run inside a native host's **web
//! viewer**:
//!
//! - Run **host scripts** by dispatching `fmp://` URLs, with a parameter and
//!   named variables
//! - Receive the host's **answer** through a callback (or an awaitable future),
//!   with a timeout
//! - Load **host-generated scripts** when the host sets a `getfile_…` fragment
//! - Read the page's own **query parameters** (`db`, `wv`, …)
//!
//! ---
//!
//! ## How the round trip works
//!
//! 1. The page calls [`Bridge::invoke`]. The bridge builds
//!    `fmp://$/<db>?script=<name>[&param=…][&$var=…]` and activates a hidden
//!    link to it. The host intercepts the URL and runs the script.
//! 2. The host answers in one of two ways:
//!    - it calls [`Bridge::deliver_result`] directly, or
//!    - it writes a script file and sets the fragment to
//!      `getfile_<token>_<file>`; the bridge loads that file, and the file
//!      calls [`Bridge::deliver_result`] when it runs.
//! 3. Whichever happens first, the answer or the timeout, resolves the call.
//!    The loser is disarmed.
//!
//! Only one call waits for an answer at a time. Calls made meanwhile are
//! queued and sent in order.
//!
//! ### Most important gotchas
//!
//! - **The database name is required.** Pass it with
//!   [`ConfigureOptions::database_name`], put `db=<name>` in the web viewer
//!   address, or name it on the request. Otherwise every call fails with
//!   [`BridgeError::MissingDatabase`].
//! - **Unhandled failures are raised.** A load or call without a failure
//!   callback that fails returns the error from whatever event detected it
//!   (the platform's timer or load event), never silently.
//! - **Fragments starting with a digit** are ignored by some viewers; hosts
//!   escape them with a leading `_`, which the bridge strips.
//!
//! ---
//!
//! ## Crate layout
//!
//! - [`bridge`] — the [`Bridge`] facade.
//! - [`invoker`] — URL building, dispatch, pending-response tracking.
//! - [`loader`] — script injection with a timeout.
//! - [`router`] — fragment routing.
//! - [`query`] / [`params`] — query-string codec and the page parameter snapshot.
//! - [`platform`] — the capabilities the bridge needs from the page.
//! - [`sim`] — a deterministic page for tests and headless use.
//! - [`config`] — options and the TOML-loadable [`BridgeConfig`].
//! - [`namespace`] — the library-identity slot.
//!
//! ---
//!
//! ## Quick start
//!
//! ```
//! use webviewer_bridge::sim::SimulatedPage;
//! use webviewer_bridge::{Bridge, ConfigureOptions, HostCall, InvocationRequest};
//! use std::time::Duration;
//!
//! let page = SimulatedPage::shared("file:///viewer/index.html?wv=wv_1");
//! let bridge = Bridge::new(page.clone());
//! bridge
//!     .configure(
//!         ConfigureOptions::new()
//!             .database_name("finance")
//!             .timeout_limit(Duration::from_secs(6)),
//!     )
//!     .unwrap();
//!
//! let request = InvocationRequest::new("get_message")
//!     .parameter("inbox")
//!     .variable("$_wv", "wv_1");
//! let dispatch = bridge
//!     .invoke(HostCall::new(request).on_success(|data| assert_eq!(data, "hi")))
//!     .unwrap();
//! assert_eq!(
//!     dispatch.url(),
//!     "fmp://$/finance?script=get_message&param=inbox&%24_wv=wv_1"
//! );
//!
//! bridge.deliver_result("hi".into()).unwrap();
//! ```
//!
//! ## Awaiting an answer (feature `tokio`)
//!
//! ```no_run
//! # use webviewer_bridge::sim::SimulatedPage;
//! # use webviewer_bridge::Bridge;
//! # async fn run() -> Result<(), webviewer_bridge::BridgeError> {
//! let page = SimulatedPage::shared("file:///viewer/index.html?db=finance");
//! let bridge = Bridge::new(page);
//! let answer = bridge.call("get_message", None)?.await?;
//! # let _ = answer;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod invoker;
pub mod loader;
pub mod namespace;
pub mod params;
pub mod platform;
pub mod query;
pub mod router;
pub mod sim;

#[doc(inline)]
pub use bridge::Bridge;
#[doc(inline)]
pub use config::{BridgeConfig, ConfigureOptions};
#[doc(inline)]
pub use error::{BridgeError, Result};
#[doc(inline)]
pub use invoker::{Dispatch, HostCall, InvocationRequest};
#[doc(inline)]
pub use loader::LoadRequest;
#[doc(inline)]
pub use namespace::Namespace;
#[doc(inline)]
pub use params::{url_param, url_param_exists, url_params};
#[doc(inline)]
pub use query::ParamValue;
