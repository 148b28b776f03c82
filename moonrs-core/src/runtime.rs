//! The lifecycle orchestrator: spawns the worker pool, holds their join handles, drives the
//! periodic `update()` tick, and coordinates shutdown across the whole runtime.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::info;

use crate::config::RuntimeConfig;
use crate::router::Router;
use crate::worker;

/// Owns the worker pool for the life of the process. Build with [`Runtime::start`], tear down
/// with [`Runtime::shutdown`].
pub struct Runtime {
    router: Arc<Router>,
    joins: Vec<JoinHandle<()>>,
    tick_stop: Option<mpsc::Sender<()>>,
    ticker: Option<JoinHandle<()>>,
}

impl Runtime {
    /// Spawns `config.worker_threads` workers (ids `1..=worker_threads`; `0` is reserved) and
    /// blocks until every one has reported `ready`, then starts the periodic tick thread.
    pub fn start(config: RuntimeConfig) -> Self {
        let worker_count = config.worker_threads.clamp(1, 255);
        let router = Router::new(config.clone());
        let mut joins = Vec::with_capacity(worker_count);
        for n in 1..=worker_count {
            let worker_id = n as u8;
            let (handle, join) = worker::spawn(worker_id, router.clone(), config.clone());
            router.register_worker(worker_id, handle);
            joins.push(join);
        }
        info!(workers = worker_count, "runtime started");

        let tick_router = router.clone();
        let interval = Duration::from_millis(config.tick_interval_ms.max(1));
        let (tick_stop_tx, tick_stop_rx) = mpsc::channel();
        let ticker = std::thread::Builder::new()
            .name("moonrs-ticker".into())
            .spawn(move || loop {
                if tick_stop_rx.recv_timeout(interval).is_ok() {
                    break;
                }
                tick_router.tick_all();
            })
            .expect("failed to spawn ticker thread");

        Runtime {
            router,
            joins,
            tick_stop: Some(tick_stop_tx),
            ticker: Some(ticker),
        }
    }

    /// The router, for installing services and sending the first messages.
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Posts `stop()` to every worker and returns immediately; services drain in-flight work
    /// and call `exit()` asynchronously. Idempotent.
    pub fn stop(&self) {
        self.router.stop_all();
    }

    /// True once every worker has reached `exited`.
    pub fn all_exited(&self) -> bool {
        self.router.all_exited()
    }

    /// Stops the tick thread, tells every worker's reactor to shut down, and joins all worker
    /// threads. Callers should ensure [`Self::stop`] has driven every worker to `exited` first;
    /// otherwise in-flight services are dropped mid-shutdown.
    pub fn shutdown(mut self) {
        if let Some(tx) = self.tick_stop.take() {
            let _ = tx.send(());
        }
        if let Some(t) = self.ticker.take() {
            let _ = t.join();
        }
        self.router.shutdown_all();
        for join in self.joins.drain(..) {
            let _ = join.join();
        }
    }
}
