use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounterVec;
use prometheus::IntGaugeVec;
use prometheus::Opts;
use prometheus::Registry;
use tracing::error;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref STORE_OPERATIONS_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("mini_cluster_store_operations", "Store operations per cluster and kind"),
        &["cluster_id", "op"]
    )
    .expect("metric can not be created");

    pub static ref TABLE_COUNT_METRIC: IntGaugeVec = IntGaugeVec::new(
        Opts::new("mini_cluster_tables", "Tables currently present per cluster"),
        &["cluster_id"]
    )
    .expect("metric can not be created");
}

/// Every `op` label value the store records.
pub(crate) const STORE_OPERATIONS: &[&str] = &[
    "create_namespace",
    "delete_namespace",
    "create_table",
    "delete_table",
    "truncate_table",
    "delete_table_data",
    "put",
    "get",
    "delete",
    "scan",
    "count_rows",
];

static REGISTER: Once = Once::new();

pub(crate) fn register_custom_metrics() {
    REGISTER.call_once(|| {
        REGISTRY
            .register(Box::new(STORE_OPERATIONS_METRIC.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(TABLE_COUNT_METRIC.clone()))
            .expect("collector can be registered");
    });
}

pub(crate) fn record_operation(
    cluster_id: &str,
    op: &str,
) {
    STORE_OPERATIONS_METRIC.with_label_values(&[cluster_id, op]).inc();
}

pub(crate) fn set_table_count(
    cluster_id: &str,
    count: usize,
) {
    TABLE_COUNT_METRIC.with_label_values(&[cluster_id]).set(count as i64);
}

/// Drops every series labelled with `cluster_id`.
pub(crate) fn remove_cluster(cluster_id: &str) {
    for &op in STORE_OPERATIONS {
        // Err only means the series was never recorded.
        let _ = STORE_OPERATIONS_METRIC.remove_label_values(&[cluster_id, op]);
    }
    let _ = TABLE_COUNT_METRIC.remove_label_values(&[cluster_id]);
}

/// Prometheus text exposition of every mini cluster in this process.
pub(crate) fn gather_text() -> String {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        error!("custom metrics could not be from_utf8'd: {}", e);
        String::default()
    })
}
