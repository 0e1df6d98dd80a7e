use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use super::metrics;
use super::Store;
use crate::Error;
use crate::Result;

/// Body of `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterStatus {
    pub cluster_id: String,
    pub role: String,
    pub running: bool,
    pub namespaces: usize,
    pub tables: usize,
}

impl ClusterStatus {
    fn of(
        store: &Store,
        role: &str,
    ) -> Self {
        let namespaces = store.list_namespaces().map(|n| n.len());
        let tables = store.list_tables().map(|t| t.len());
        Self {
            cluster_id: store.cluster_id().to_string(),
            role: role.to_string(),
            running: store.is_open() && namespaces.is_ok() && tables.is_ok(),
            namespaces: namespaces.unwrap_or_default(),
            tables: tables.unwrap_or_default(),
        }
    }
}

pub(crate) fn routes(
    store: Arc<Store>,
    role: &'static str,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let status = warp::path!("status")
        .and(warp::get())
        .map(move || warp::reply::json(&ClusterStatus::of(&store, role)));

    let metrics = warp::path!("metrics").and(warp::get()).map(|| {
        warp::reply::with_header(
            metrics::gather_text(),
            "content-type",
            "text/plain; version=0.0.4; charset=utf-8",
        )
    });

    status.or(metrics)
}

/// Binds an info server on `127.0.0.1:port` (`0` picks a free port). The
/// returned future serves until `shutdown` changes or closes.
pub(crate) fn bind(
    component: &'static str,
    port: u16,
    store: Arc<Store>,
    role: &'static str,
    mut shutdown: watch::Receiver<()>,
) -> Result<(SocketAddr, impl Future<Output = ()> + Send + 'static)> {
    warp::serve(routes(store, role))
        .try_bind_with_graceful_shutdown(([127, 0, 0, 1], port), async move {
            let _ = shutdown.changed().await;
        })
        .map_err(|e| Error::Startup {
            component,
            reason: format!("{role} info server failed to bind port {port}: {e}"),
        })
}
