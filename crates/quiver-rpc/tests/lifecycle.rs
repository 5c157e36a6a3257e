//! Export/refer lifecycle through the full decorator stack: adaptive
//! protocol, filter wrapper, listener wrapper, in-process transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use quiver_core::ServiceUrl;
use quiver_extension::{ExtensionContext, ProviderCatalog};
use quiver_rpc::constants::{EXPORTER_LISTENER_KEY, INVOKER_LISTENER_KEY};
use quiver_rpc::{
    ECHO_METHOD, Exporter, ExporterListener, Invocation, Invoker, InvokerListener, Protocol,
    RpcError, RpcResult, bootstrap,
};
use serde_json::json;

struct Terminal {
    url: ServiceUrl,
    calls: AtomicUsize,
}

impl Invoker for Terminal {
    fn interface(&self) -> &str {
        "demo.EchoService"
    }

    fn url(&self) -> &ServiceUrl {
        &self.url
    }

    fn invoke(&self, _invocation: &Invocation) -> Result<RpcResult, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RpcResult::new(Some(json!("pong"))))
    }

    fn is_available(&self) -> bool {
        true
    }

    fn destroy(&self) {}
}

fn terminal(url: ServiceUrl) -> Arc<Terminal> {
    Arc::new(Terminal {
        url,
        calls: AtomicUsize::new(0),
    })
}

fn service_url() -> ServiceUrl {
    ServiceUrl::new("injvm", "localhost", Some(7070), "demo.EchoService")
}

#[test]
fn export_then_refer_round_trips_in_process() {
    let context = ExtensionContext::new();
    bootstrap::install_defaults(&context).unwrap();
    let protocols = context.registry::<dyn Protocol>().unwrap();
    let adaptive = protocols.adaptive().unwrap();

    let url = service_url();
    let service = terminal(url.clone());
    let exporter = adaptive.export(service.clone()).unwrap();

    let invoker = adaptive.refer("demo.EchoService", &url).unwrap();
    assert!(invoker.is_available());
    let result = invoker.invoke(&Invocation::new("ping")).unwrap();
    assert_eq!(result.value(), Some(&json!("pong")));
    assert_eq!(service.calls.load(Ordering::SeqCst), 1);

    // The provider-side chain answers echo probes without the service.
    let probe = Invocation::new(ECHO_METHOD).with_argument(json!("are-you-there"));
    let echoed = invoker.invoke(&probe).unwrap();
    assert_eq!(echoed.value(), Some(&json!("are-you-there")));
    assert_eq!(service.calls.load(Ordering::SeqCst), 1);

    exporter.unexport();
}

#[test]
fn unexport_is_idempotent_and_removes_the_service() {
    let context = ExtensionContext::new();
    bootstrap::install_defaults(&context).unwrap();
    let adaptive = context.registry::<dyn Protocol>().unwrap().adaptive().unwrap();

    let url = service_url();
    let exporter = adaptive.export(terminal(url.clone())).unwrap();
    let invoker = adaptive.refer("demo.EchoService", &url).unwrap();
    assert!(invoker.invoke(&Invocation::new("ping")).is_ok());

    exporter.unexport();
    exporter.unexport();

    assert!(!invoker.is_available());
    match invoker.invoke(&Invocation::new("ping")) {
        Err(RpcError::NoProvider { service }) => assert_eq!(service, "demo.EchoService:7070"),
        other => panic!("expected NoProvider, got {other:?}"),
    }
}

#[derive(Default)]
struct RecordingListener {
    events: Mutex<Vec<&'static str>>,
    fail_on_export: bool,
}

impl ExporterListener for RecordingListener {
    fn exported(&self, _exporter: &dyn Exporter) -> Result<(), RpcError> {
        self.events.lock().push("exported");
        if self.fail_on_export {
            return Err(RpcError::Listener("refusing this export".to_owned()));
        }
        Ok(())
    }

    fn unexported(&self, _exporter: &dyn Exporter) {
        self.events.lock().push("unexported");
    }
}

fn listener_context(
    failing: &Arc<RecordingListener>,
    succeeding: &Arc<RecordingListener>,
) -> Arc<ExtensionContext> {
    let context = ExtensionContext::new();
    context
        .install(bootstrap::protocol_catalog(), bootstrap::PROTOCOL_DESCRIPTORS)
        .unwrap();
    context
        .install(bootstrap::filter_catalog(), bootstrap::FILTER_DESCRIPTORS)
        .unwrap();
    let mut listeners = ProviderCatalog::<dyn ExporterListener>::new();
    let boom = failing.clone();
    listeners.plain("t::BoomListener", move |_| Ok(boom.clone()));
    let ok = succeeding.clone();
    listeners.plain("t::OkListener", move |_| Ok(ok.clone()));
    context
        .install(listeners, "boom=t::BoomListener\nok=t::OkListener\n")
        .unwrap();
    context
        .install(ProviderCatalog::<dyn InvokerListener>::new(), "")
        .unwrap();
    context
}

#[test]
fn all_listeners_run_before_the_first_export_error_is_raised() {
    let failing = Arc::new(RecordingListener {
        fail_on_export: true,
        ..RecordingListener::default()
    });
    let succeeding = Arc::new(RecordingListener::default());
    let context = listener_context(&failing, &succeeding);
    let adaptive = context.registry::<dyn Protocol>().unwrap().adaptive().unwrap();

    let url = service_url().with_parameter(EXPORTER_LISTENER_KEY, "boom,ok");
    let error = adaptive.export(terminal(url)).unwrap_err();

    assert!(matches!(error, RpcError::Listener(_)), "{error}");
    assert_eq!(*failing.events.lock(), vec!["exported"]);
    assert_eq!(*succeeding.events.lock(), vec!["exported"]);
}

#[test]
fn listeners_hear_unexport_after_the_service_is_gone() {
    let quiet = Arc::new(RecordingListener::default());
    let other = Arc::new(RecordingListener::default());
    let context = listener_context(&quiet, &other);
    let adaptive = context.registry::<dyn Protocol>().unwrap().adaptive().unwrap();

    let url = service_url().with_parameter(EXPORTER_LISTENER_KEY, "ok");
    let exporter = adaptive.export(terminal(url.clone())).unwrap();
    assert_eq!(*other.events.lock(), vec!["exported"]);

    let invoker = adaptive.refer("demo.EchoService", &url).unwrap();
    exporter.unexport();
    exporter.unexport();
    assert_eq!(*other.events.lock(), vec!["exported", "unexported"]);
    assert!(!invoker.is_available());
}

#[test]
fn registry_urls_bypass_filters_and_listeners() {
    let failing = Arc::new(RecordingListener {
        fail_on_export: true,
        ..RecordingListener::default()
    });
    let other = Arc::new(RecordingListener::default());
    let context = listener_context(&failing, &other);
    let registry = context.registry::<dyn Protocol>().unwrap();

    // A registry URL names the listeners explicitly, yet none must fire.
    let url = ServiceUrl::new("registry", "localhost", Some(2181), "demo.Registry")
        .with_parameter(EXPORTER_LISTENER_KEY, "boom,ok");
    let injvm = registry.get("injvm").unwrap();
    let exporter = injvm.export(terminal(url)).unwrap();

    assert!(failing.events.lock().is_empty());
    assert!(other.events.lock().is_empty());
    exporter.unexport();
}

struct ReferRecorder {
    events: Mutex<Vec<&'static str>>,
}

impl InvokerListener for ReferRecorder {
    fn referred(&self, _invoker: &dyn Invoker) -> Result<(), RpcError> {
        self.events.lock().push("referred");
        Ok(())
    }

    fn destroyed(&self, _invoker: &dyn Invoker) {
        self.events.lock().push("destroyed");
    }
}

#[test]
fn invoker_listeners_hear_refer_and_destroy_once() {
    let recorder = Arc::new(ReferRecorder {
        events: Mutex::new(Vec::new()),
    });
    let context = ExtensionContext::new();
    context
        .install(bootstrap::protocol_catalog(), bootstrap::PROTOCOL_DESCRIPTORS)
        .unwrap();
    context
        .install(bootstrap::filter_catalog(), bootstrap::FILTER_DESCRIPTORS)
        .unwrap();
    context
        .install(ProviderCatalog::<dyn ExporterListener>::new(), "")
        .unwrap();
    let mut listeners = ProviderCatalog::<dyn InvokerListener>::new();
    let handle = recorder.clone();
    listeners.plain("t::ReferRecorder", move |_| Ok(handle.clone()));
    context
        .install(listeners, "recorder=t::ReferRecorder\n")
        .unwrap();

    let adaptive = context.registry::<dyn Protocol>().unwrap().adaptive().unwrap();
    let url = service_url().with_parameter(INVOKER_LISTENER_KEY, "recorder");
    let invoker = adaptive.refer("demo.EchoService", &url).unwrap();
    assert_eq!(*recorder.events.lock(), vec!["referred"]);

    invoker.destroy();
    invoker.destroy();
    assert_eq!(*recorder.events.lock(), vec!["referred", "destroyed"]);
}
