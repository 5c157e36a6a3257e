//! Lifecycle listeners and the wrappers that notify them.
//!
//! Notification policy, identical on both wrappers: every listener runs,
//! each failure is logged where it happens, and the *first* failure is
//! raised only after the whole batch has run. Teardown notifications come
//! after the wrapped object is torn down, and the teardown itself runs
//! regardless of what listeners do.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use quiver_core::ServiceUrl;
use quiver_extension::Extensible;

use crate::error::RpcError;
use crate::invocation::{Invocation, RpcResult};
use crate::invoker::{Exporter, Invoker};

/// Observes export/unexport transitions of services.
pub trait ExporterListener: Send + Sync {
    /// A service was just exported.
    fn exported(&self, exporter: &dyn Exporter) -> Result<(), RpcError>;

    /// A service was just unexported. Infallible: unexport must not fail.
    fn unexported(&self, exporter: &dyn Exporter);
}

impl Extensible for dyn ExporterListener {
    const CAPABILITY: &'static str = "exporter.listener";
    const INTERFACE: &'static str = "ExporterListener";
}

/// Observes refer/destroy transitions of consumed services.
pub trait InvokerListener: Send + Sync {
    /// An invoker was just referred.
    fn referred(&self, invoker: &dyn Invoker) -> Result<(), RpcError>;

    /// An invoker was just destroyed.
    fn destroyed(&self, invoker: &dyn Invoker);
}

impl Extensible for dyn InvokerListener {
    const CAPABILITY: &'static str = "invoker.listener";
    const INTERFACE: &'static str = "InvokerListener";
}

/// Exporter decorator that feeds lifecycle events to listeners.
pub struct ListenerExporterWrapper {
    inner: Arc<dyn Exporter>,
    listeners: Vec<Arc<dyn ExporterListener>>,
    unexported: AtomicBool,
}

impl ListenerExporterWrapper {
    /// Wrap `inner` and fire every listener's `exported` callback.
    ///
    /// All listeners run even when one fails; the first failure is
    /// returned afterwards. On failure the wrapper is discarded but
    /// `inner` stays exported, exactly as if construction had thrown
    /// mid-way - callers unexport through their own handle.
    pub fn attach(
        inner: Arc<dyn Exporter>,
        listeners: Vec<Arc<dyn ExporterListener>>,
    ) -> Result<Arc<dyn Exporter>, RpcError> {
        let wrapper = Arc::new(Self {
            inner,
            listeners,
            unexported: AtomicBool::new(false),
        });
        let mut first_error = None;
        for listener in &wrapper.listeners {
            if let Err(error) = listener.exported(wrapper.as_ref()) {
                tracing::error!(%error, "exporter listener failed on export");
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(wrapper),
        }
    }
}

impl Exporter for ListenerExporterWrapper {
    fn invoker(&self) -> Arc<dyn Invoker> {
        self.inner.invoker()
    }

    fn unexport(&self) {
        if self.unexported.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.unexport();
        for listener in &self.listeners {
            listener.unexported(self);
        }
    }
}

/// Invoker decorator that feeds lifecycle events to listeners.
pub struct ListenerInvokerWrapper {
    inner: Arc<dyn Invoker>,
    listeners: Vec<Arc<dyn InvokerListener>>,
    destroyed: AtomicBool,
}

impl ListenerInvokerWrapper {
    /// Wrap `inner` and fire every listener's `referred` callback, with
    /// the same batch-then-raise policy as
    /// [`ListenerExporterWrapper::attach`].
    pub fn attach(
        inner: Arc<dyn Invoker>,
        listeners: Vec<Arc<dyn InvokerListener>>,
    ) -> Result<Arc<dyn Invoker>, RpcError> {
        let wrapper = Arc::new(Self {
            inner,
            listeners,
            destroyed: AtomicBool::new(false),
        });
        let mut first_error = None;
        for listener in &wrapper.listeners {
            if let Err(error) = listener.referred(wrapper.as_ref()) {
                tracing::error!(%error, "invoker listener failed on refer");
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(wrapper),
        }
    }
}

impl Invoker for ListenerInvokerWrapper {
    fn interface(&self) -> &str {
        self.inner.interface()
    }

    fn url(&self) -> &ServiceUrl {
        self.inner.url()
    }

    fn invoke(&self, invocation: &Invocation) -> Result<RpcResult, RpcError> {
        self.inner.invoke(invocation)
    }

    fn is_available(&self) -> bool {
        self.inner.is_available()
    }

    fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.destroy();
        for listener in &self.listeners {
            listener.destroyed(self);
        }
    }
}

impl fmt::Debug for ListenerExporterWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerExporterWrapper")
            .field("listeners", &self.listeners.len())
            .field("unexported", &self.unexported)
            .finish()
    }
}

impl fmt::Debug for ListenerInvokerWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerInvokerWrapper")
            .field("listeners", &self.listeners.len())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
