//! The public face of the library: one [`Bridge`] per page.

use crate::config::{BridgeConfig, ConfigureOptions, Settings, SharedSettings};
use crate::error::Result;
use crate::invoker::{Dispatch, HostCall, HostInvoker, InvocationRequest};
use crate::loader::{LoadRequest, ScriptLoader};
use crate::params::{self, UrlParams};
use crate::platform::Platform;
use crate::query::{ParamValue, QueryParams};
use crate::router::HashRouter;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Query parameter the host uses to name the database.
pub const DATABASE_PARAM: &str = "db";

pub struct Bridge<P> {
    platform: Rc<P>,
    settings: SharedSettings,
    page_params: Arc<UrlParams>,
    loader: ScriptLoader<P>,
    router: HashRouter<P>,
    invoker: HostInvoker<P>,
}

impl<P: Platform + 'static> Bridge<P> {
    /// Attaches to `platform`: snapshots the page's query parameters, takes
    /// the database name from the `db` parameter, and starts routing fragment
    /// changes.
    pub fn new(platform: Rc<P>) -> Self {
        let page_params = Arc::new(UrlParams::from_href(&platform.href()));
        params::init_global(page_params.clone());

        let settings = Rc::new(RefCell::new(Settings {
            database_name: page_params
                .get(DATABASE_PARAM)
                .and_then(ParamValue::as_str)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            ..Settings::default()
        }));

        let loader = ScriptLoader::new(platform.clone(), settings.clone());
        let router = HashRouter::new(platform.clone(), loader.clone());
        let invoker = HostInvoker::new(platform.clone(), settings.clone(), page_params.clone());
        router.attach();
        debug!(params = page_params.all().len(), "bridge attached");

        Self {
            platform,
            settings,
            page_params,
            loader,
            router,
            invoker,
        }
    }

    pub fn with_config(platform: Rc<P>, config: BridgeConfig) -> Result<Self> {
        let bridge = Self::new(platform);
        bridge.configure(config.into())?;
        Ok(bridge)
    }

    /// Applies `options`. With `load_initial_hash`, the current fragment is
    /// routed right away; a failure from that is returned here.
    pub fn configure(&self, options: ConfigureOptions) -> Result<()> {
        {
            let mut settings = self.settings.borrow_mut();
            if let Some(limit) = options.timeout_limit.filter(|l| !l.is_zero()) {
                settings.timeout_limit = limit;
            }
            if let Some(name) = options.database_name.filter(|n| !n.is_empty()) {
                settings.database_name = Some(name);
            }
        }
        self.router.set_handler(options.on_hash_change);
        if options.load_initial_hash {
            self.router.handle_change()?;
        }
        Ok(())
    }

    pub fn timeout_limit(&self) -> Duration {
        self.settings.borrow().timeout_limit
    }

    pub fn database_name(&self) -> Option<String> {
        self.settings.borrow().database_name.clone()
    }

    pub fn build_url(&self, request: &InvocationRequest) -> Result<String> {
        self.invoker.build_url(request)
    }

    pub fn invoke(&self, call: impl Into<HostCall>) -> Result<Dispatch> {
        self.invoker.invoke(call)
    }

    /// Invokes `request` and waits for the host's answer.
    ///
    /// Configuration errors come back immediately; the returned future
    /// resolves with the delivered data or the timeout error.
    #[cfg(feature = "tokio")]
    pub fn call(
        &self,
        request: impl Into<InvocationRequest>,
        timeout: Option<Duration>,
    ) -> Result<impl std::future::Future<Output = Result<Value>>> {
        use crate::error::BridgeError;
        use tokio::sync::oneshot;

        let (tx, rx) = oneshot::channel::<Result<Value>>();
        let tx = Rc::new(RefCell::new(Some(tx)));
        let on_err = tx.clone();

        let mut call = HostCall::new(request)
            .on_success(move |data| {
                if let Some(tx) = tx.borrow_mut().take() {
                    let _ = tx.send(Ok(data));
                }
            })
            .on_failure(move |err| {
                if let Some(tx) = on_err.borrow_mut().take() {
                    let _ = tx.send(Err(err));
                }
            });
        call.timeout = timeout;
        self.invoker.invoke(call)?;

        Ok(async move { rx.await.unwrap_or(Err(BridgeError::Abandoned)) })
    }

    pub fn load_script(&self, request: impl Into<LoadRequest>) -> Result<bool> {
        self.loader.load(request)
    }

    /// Called by the host, directly or from a delivered script.
    pub fn deliver_result(&self, data: Value) -> Result<()> {
        self.invoker.deliver_result(data)
    }

    /// Routes the current fragment as if it had just changed.
    pub fn handle_hash_change(&self) -> Result<()> {
        self.router.handle_change()
    }

    pub fn query_param(&self, key: &str) -> Option<&ParamValue> {
        self.page_params.get(key)
    }

    pub fn query_param_exists(&self, key: &str) -> bool {
        self.page_params.exists(key)
    }

    pub fn query_params(&self) -> &QueryParams {
        self.page_params.all()
    }

    pub fn invoker(&self) -> &HostInvoker<P> {
        &self.invoker
    }

    pub fn loader(&self) -> &ScriptLoader<P> {
        &self.loader
    }

    pub fn platform(&self) -> &Rc<P> {
        &self.platform
    }
}

impl<P> Clone for Bridge<P> {
    fn clone(&self) -> Self {
        Self {
            platform: self.platform.clone(),
            settings: self.settings.clone(),
            page_params: self.page_params.clone(),
            loader: self.loader.clone(),
            router: self.router.clone(),
            invoker: self.invoker.clone(),
        }
    }
}
