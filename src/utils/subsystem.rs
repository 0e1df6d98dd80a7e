//! Embedded subsystems run on their own OS thread with a dedicated tokio
//! runtime, so they outlive whatever runtime (if any) the caller is on.
//!
//! Start and stop are blocking: [`SubsystemHandle::spawn`] returns once the
//! subsystem signals readiness, [`SubsystemHandle::stop`] once its thread has
//! finished. Both are bounded.

use std::future::Future;
use std::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::sync::mpsc::SyncSender;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::Error;
use crate::Result;

const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Handed to the subsystem body; consumed when the subsystem is ready to serve.
pub struct ReadySignal<R> {
    tx: SyncSender<Result<R>>,
}

impl<R> ReadySignal<R> {
    pub fn ready(
        self,
        value: R,
    ) {
        // The starter may have given up already; nothing to report to then.
        let _ = self.tx.send(Ok(value));
    }
}

/// Opaque handle to a running embedded subsystem.
pub struct SubsystemHandle {
    component: &'static str,
    shutdown_tx: Option<watch::Sender<()>>,
    done_rx: Option<mpsc::Receiver<Result<()>>>,
    thread: Option<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl std::fmt::Debug for SubsystemHandle {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SubsystemHandle")
            .field("component", &self.component)
            .field("running", &self.thread.is_some())
            .finish()
    }
}

impl SubsystemHandle {
    /// Runs `body` on a new thread named `thread_name` and blocks until it
    /// calls [`ReadySignal::ready`], fails, or `startup_timeout` elapses.
    ///
    /// `body` receives the ready signal and a shutdown receiver that changes
    /// (or closes) when [`SubsystemHandle::stop`] is called.
    pub fn spawn<R, F, Fut>(
        component: &'static str,
        thread_name: String,
        startup_timeout: Duration,
        shutdown_timeout: Duration,
        body: F,
    ) -> Result<(Self, R)>
    where
        R: Send + 'static,
        F: FnOnce(ReadySignal<R>, watch::Receiver<()>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>>,
    {
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<R>>(1);
        let (done_tx, done_rx) = mpsc::sync_channel::<Result<()>>(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        let thread = thread::Builder::new().name(thread_name).spawn(move || {
            let early_tx = ready_tx.clone();
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .thread_name(format!("{component}-worker"))
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    let _ = early_tx.send(Err(Error::Startup {
                        component,
                        reason: format!("failed to build runtime: {e}"),
                    }));
                    let _ = done_tx.send(Ok(()));
                    return;
                }
            };

            let result = runtime.block_on(body(ReadySignal { tx: ready_tx }, shutdown_rx));
            runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);

            let result = match result {
                // Failed before signalling ready: the starter is still waiting for this.
                Err(e) => match early_tx.try_send(Err(e)) {
                    Ok(()) => Ok(()),
                    Err(mpsc::TrySendError::Full(Err(e)))
                    | Err(mpsc::TrySendError::Disconnected(Err(e))) => Err(e),
                    Err(_) => Ok(()),
                },
                Ok(()) => Ok(()),
            };
            let _ = done_tx.send(result);
            debug!(component, "subsystem thread finished");
        })?;

        let handle = Self {
            component,
            shutdown_tx: Some(shutdown_tx),
            done_rx: Some(done_rx),
            thread: Some(thread),
            shutdown_timeout,
        };

        match ready_rx.recv_timeout(startup_timeout) {
            Ok(Ok(value)) => {
                debug!(component, "subsystem ready");
                Ok((handle, value))
            }
            Ok(Err(e)) => {
                error!(component, error = %e, "subsystem failed to start");
                let _ = handle.stop();
                Err(e)
            }
            Err(RecvTimeoutError::Timeout) => {
                error!(component, ?startup_timeout, "subsystem startup timed out");
                let _ = handle.stop();
                Err(Error::StartupTimeout {
                    component,
                    timeout: startup_timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.stop();
                Err(Error::Startup {
                    component,
                    reason: "subsystem thread exited before becoming ready".to_string(),
                })
            }
        }
    }

    /// A handle with no thread behind it; stopping it always succeeds.
    pub fn detached(component: &'static str) -> Self {
        Self {
            component,
            shutdown_tx: None,
            done_rx: None,
            thread: None,
            shutdown_timeout: Duration::ZERO,
        }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    /// Signals shutdown and waits for the subsystem thread to finish.
    pub fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            // Receiver already gone means the body returned on its own.
            let _ = tx.send(());
        }

        let Some(done_rx) = self.done_rx.take() else {
            return Ok(());
        };

        let outcome = match done_rx.recv_timeout(self.shutdown_timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!(component = self.component, "subsystem did not stop in time, detaching");
                self.thread.take();
                return Err(Error::Shutdown {
                    component: self.component,
                    reason: format!("did not stop within {:?}", self.shutdown_timeout),
                });
            }
            Err(RecvTimeoutError::Disconnected) => Err(Error::Shutdown {
                component: self.component,
                reason: "subsystem thread panicked".to_string(),
            }),
        };

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() && outcome.is_ok() {
                return Err(Error::Shutdown {
                    component: self.component,
                    reason: "subsystem thread panicked".to_string(),
                });
            }
        }

        outcome.map_err(|e| match e {
            e @ Error::Shutdown { .. } => e,
            other => Error::Shutdown {
                component: self.component,
                reason: other.to_string(),
            },
        })
    }
}

impl Drop for SubsystemHandle {
    fn drop(&mut self) {
        // Dropped without stop(): ask the subsystem to wind down, don't wait for it.
        if let Some(tx) = self.shutdown_tx.take() {
            warn!(component = self.component, "subsystem handle dropped while running");
            let _ = tx.send(());
        }
    }
}
