use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use futures::SinkExt;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::codec::Framed;
use tokio_util::codec::LinesCodec;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::protocol::Request;
use super::protocol::Response;
use super::protocol::ERR_EXISTS;
use super::protocol::ERR_NO_NODE;

const MAX_LINE_LENGTH: usize = 64 * 1024;

/// In-memory registry behind the embedded coordination service.
///
/// Every accepted mutation is appended to a transaction log inside the
/// workspace; the log is never replayed.
pub(crate) struct CoordinationServer {
    registry: DashMap<String, String>,
    txn_log: PathBuf,
    connections: AtomicUsize,
}

impl CoordinationServer {
    pub(crate) fn new(txn_log: PathBuf) -> Self {
        Self {
            registry: DashMap::new(),
            txn_log,
            connections: AtomicUsize::new(0),
        }
    }

    /// Accepts connections until `shutdown` fires or its sender is dropped.
    pub(crate) async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        mut shutdown: watch::Receiver<()>,
    ) {
        let local = listener.local_addr().ok();
        info!(?local, "coordination service accepting connections");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!(?local, "coordination service shutting down");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let server = self.clone();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            server.handle_connection(stream, peer, shutdown).await;
                        });
                    }
                    Err(e) => warn!("failed to accept coordination connection: {}", e),
                }
            }
        }
    }

    async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        peer: SocketAddr,
        mut shutdown: watch::Receiver<()>,
    ) {
        self.connections.fetch_add(1, Ordering::SeqCst);
        debug!(%peer, "coordination client connected");
        let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                line = framed.next() => match line {
                    Some(Ok(line)) => {
                        let response = match line.parse::<Request>() {
                            Ok(request) => self.handle(request).await,
                            Err(e) => Response::Error(e.to_string()),
                        };
                        if let Err(e) = framed.send(response.to_string()).await {
                            warn!(%peer, "failed to write coordination response: {}", e);
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(%peer, "dropping coordination client: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }

        self.connections.fetch_sub(1, Ordering::SeqCst);
        debug!(%peer, "coordination client disconnected");
    }

    pub(crate) async fn handle(
        &self,
        request: Request,
    ) -> Response {
        let response = match &request {
            Request::Ruok => Response::Imok,
            Request::Stat => Response::Ok(format!(
                "nodes={} connections={}",
                self.registry.len(),
                self.connections.load(Ordering::SeqCst)
            )),
            Request::Create { path, data } => match self.registry.entry(path.clone()) {
                dashmap::mapref::entry::Entry::Occupied(_) => Response::Error(ERR_EXISTS.to_string()),
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(data.clone());
                    Response::Ok(String::new())
                }
            },
            Request::Set { path, data } => {
                self.registry.insert(path.clone(), data.clone());
                Response::Ok(String::new())
            }
            Request::Get { path } => match self.registry.get(path) {
                Some(data) => Response::Ok(data.value().clone()),
                None => Response::Error(ERR_NO_NODE.to_string()),
            },
            Request::Delete { path } => match self.registry.remove(path) {
                Some(_) => Response::Ok(String::new()),
                None => Response::Error(ERR_NO_NODE.to_string()),
            },
            Request::List { prefix } => {
                let mut paths: Vec<String> = self
                    .registry
                    .iter()
                    .filter(|e| e.key().starts_with(prefix.as_str()))
                    .map(|e| e.key().clone())
                    .collect();
                paths.sort();
                Response::Ok(paths.join(","))
            }
        };

        if request.is_mutation() && matches!(response, Response::Ok(_)) {
            self.append_txn(&request).await;
        }
        response
    }

    async fn append_txn(
        &self,
        request: &Request,
    ) {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.txn_log)
            .await;
        let result = match file {
            Ok(mut f) => {
                let line = format!("{request}\n");
                match f.write_all(line.as_bytes()).await {
                    Ok(()) => f.flush().await,
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(path = %self.txn_log.display(), "failed to append coordination txn log: {}", e);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.registry.len()
    }
}
