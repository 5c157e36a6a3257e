//! The in-process protocol: export and refer within one address space.
//!
//! Exported services live in a map shared by the protocol instance and
//! every exporter/invoker it hands out, keyed by the URL's service key.
//! Referred invokers look the key up per call, so a service exported
//! after the refer is still found.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use quiver_core::ServiceUrl;

use crate::error::RpcError;
use crate::invocation::{Invocation, RpcResult};
use crate::invoker::{Exporter, Invoker};
use crate::protocol::Protocol;

type ExporterMap = Arc<DashMap<String, Arc<dyn Exporter>>>;

/// Protocol for services consumed in the exporting process.
#[derive(Default)]
pub struct InjvmProtocol {
    exporters: ExporterMap,
}

impl InjvmProtocol {
    /// A protocol instance with an empty exporter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently exported services.
    pub fn exported_count(&self) -> usize {
        self.exporters.len()
    }
}

impl Protocol for InjvmProtocol {
    fn export(&self, invoker: Arc<dyn Invoker>) -> Result<Arc<dyn Exporter>, RpcError> {
        let key = invoker.url().service_key();
        tracing::info!(interface = invoker.interface(), key, "exporting in-process service");
        let exporter: Arc<dyn Exporter> = Arc::new(InjvmExporter {
            invoker,
            key: key.clone(),
            exporters: self.exporters.clone(),
            unexported: AtomicBool::new(false),
        });
        self.exporters.insert(key, exporter.clone());
        Ok(exporter)
    }

    fn refer(&self, interface: &str, url: &ServiceUrl) -> Result<Arc<dyn Invoker>, RpcError> {
        Ok(Arc::new(InjvmInvoker {
            interface: interface.to_owned(),
            url: url.clone(),
            exporters: self.exporters.clone(),
            destroyed: AtomicBool::new(false),
        }))
    }

    fn destroy(&self) {
        let keys: Vec<String> = self.exporters.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            if let Some((_, exporter)) = self.exporters.remove(&key) {
                exporter.unexport();
            }
        }
    }
}

struct InjvmExporter {
    invoker: Arc<dyn Invoker>,
    key: String,
    exporters: ExporterMap,
    unexported: AtomicBool,
}

impl Exporter for InjvmExporter {
    fn invoker(&self) -> Arc<dyn Invoker> {
        self.invoker.clone()
    }

    fn unexport(&self) {
        if self.unexported.swap(true, Ordering::SeqCst) {
            return;
        }
        self.exporters.remove(&self.key);
        tracing::info!(key = self.key, "unexported in-process service");
    }
}

struct InjvmInvoker {
    interface: String,
    url: ServiceUrl,
    exporters: ExporterMap,
    destroyed: AtomicBool,
}

impl Invoker for InjvmInvoker {
    fn interface(&self) -> &str {
        &self.interface
    }

    fn url(&self) -> &ServiceUrl {
        &self.url
    }

    fn invoke(&self, invocation: &Invocation) -> Result<RpcResult, RpcError> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(RpcError::Destroyed {
                interface: self.interface.clone(),
            });
        }
        let key = self.url.service_key();
        let exporter = self
            .exporters
            .get(&key)
            .map(|entry| entry.value().clone())
            .ok_or(RpcError::NoProvider { service: key })?;
        exporter.invoker().invoke(invocation)
    }

    fn is_available(&self) -> bool {
        !self.destroyed.load(Ordering::SeqCst)
            && self.exporters.contains_key(&self.url.service_key())
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

impl fmt::Debug for InjvmProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjvmProtocol")
            .field("exported", &self.exporters.len())
            .finish()
    }
}
