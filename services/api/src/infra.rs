use metrics_exporter_prometheus::PrometheusHandle;
use signodrive::config::StorageBackend;
use signodrive::frappe::FrappeClient;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) frappe: Option<Arc<FrappeClient>>,
}

pub(crate) fn parse_storage(raw: &str) -> Result<StorageBackend, String> {
    raw.parse::<StorageBackend>().map_err(|err| err.to_string())
}

#[cfg(test)]
pub(crate) fn test_state(ready: bool, frappe: Option<FrappeClient>) -> AppState {
    let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
    AppState {
        readiness: Arc::new(AtomicBool::new(ready)),
        metrics: Arc::new(recorder.handle()),
        frappe: frappe.map(Arc::new),
    }
}
