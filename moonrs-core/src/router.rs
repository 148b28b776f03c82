//! Stateless-by-design message routing and service placement. The router never touches a
//! worker's `services` map directly; it only decodes identities, posts tasks, and pushes
//! messages onto the right worker's inbound queue.

use std::collections::HashMap;
use std::sync::atomic::AtomicU32;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tracing::debug;

use crate::config::RuntimeConfig;
use crate::error::{AnyResult, RouterError};
use crate::identity::{make_service_id, ServiceId, WorkerId};
use crate::message::{Message, PType, ResponseId};
use crate::service::Service;
use crate::worker::{WorkerHandle, WorkerTask};

/// Id never assigned to a live service; used as the nominal sender of router-synthesized
/// system/error responses and as the inert target for self-triggered (crash) removals that
/// nobody is waiting on.
pub const SYSTEM_SERVICE_ID: ServiceId = ServiceId::from_raw(0);

/// Where a new service should be hosted. Resolves the placement ambiguity left open by the
/// distilled shared/lowest-`servicenum` heuristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// Apply the shared/lowest-`servicenum` heuristic. Never clears the chosen worker's
    /// `shared` flag.
    Auto,
    /// Apply the same heuristic, then clear the chosen worker's `shared` flag so it hosts no
    /// further auto-placed services until its set empties again.
    Exclusive,
    /// Pin to an explicit worker, bypassing the heuristic entirely.
    Worker(WorkerId),
}

/// Cross-worker routing, service placement, and the name registry. Owned by [`crate::Runtime`]
/// and handed to every worker and [`crate::context::ServiceContext`] as an `Arc`.
pub struct Router {
    workers: Mutex<HashMap<WorkerId, Arc<WorkerHandle>>>,
    names: Mutex<HashMap<String, ServiceId>>,
    serviceuid: AtomicU32,
    config: RuntimeConfig,
}

impl Router {
    pub(crate) fn new(config: RuntimeConfig) -> Arc<Router> {
        Arc::new(Router {
            workers: Mutex::new(HashMap::new()),
            names: Mutex::new(HashMap::new()),
            serviceuid: AtomicU32::new(1),
            config,
        })
    }

    pub(crate) fn register_worker(&self, id: WorkerId, handle: Arc<WorkerHandle>) {
        self.workers.lock().unwrap().insert(id, handle);
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    fn handle_for(&self, worker_id: WorkerId) -> Option<Arc<WorkerHandle>> {
        self.workers.lock().unwrap().get(&worker_id).cloned()
    }

    pub(crate) fn worker_ids(&self) -> Vec<WorkerId> {
        self.workers.lock().unwrap().keys().copied().collect()
    }

    /// Routes a message to its receiver's owning worker. Messages addressed to an unknown or
    /// already-gone worker are dropped (logged at debug level) rather than erroring the caller,
    /// matching the "no error propagated across workers synchronously" rule.
    pub fn send(&self, msg: Message) {
        let worker_id = msg.receiver().worker_id();
        match self.handle_for(worker_id) {
            Some(handle) => handle.push(msg),
            None => debug!(worker = worker_id, receiver = %msg.receiver(), "dropping message: unknown worker"),
        }
    }

    /// Fans a message out to every worker. The message's own `sender`/`broadcast` fields are
    /// used as-is; each worker is responsible for excluding the originator.
    pub fn broadcast(&self, msg: Message) {
        let handles: Vec<Arc<WorkerHandle>> = self.workers.lock().unwrap().values().cloned().collect();
        for handle in handles {
            handle.push(msg.clone());
        }
    }

    /// Synthesizes and routes a system-authored response (dead-receiver errors, `remove_service`
    /// acks, `runcmd` results). The sender is always [`SYSTEM_SERVICE_ID`]; a service replying
    /// to its own caller should use [`crate::context::ServiceContext::reply`] instead.
    pub(crate) fn make_response(
        &self,
        to: ServiceId,
        header: impl Into<String>,
        body: impl Into<Bytes>,
        responseid: ResponseId,
        ptype: PType,
    ) {
        let msg = Message::builder()
            .sender(SYSTEM_SERVICE_ID)
            .receiver(to)
            .ptype(ptype)
            .header(header)
            .responseid(responseid)
            .payload(body)
            .build();
        self.send(msg);
    }

    fn choose_worker(&self, placement: Placement) -> AnyResult<WorkerId> {
        match placement {
            Placement::Worker(id) => {
                if self.workers.lock().unwrap().contains_key(&id) {
                    Ok(id)
                } else {
                    Err(RouterError::UnknownWorker(id).into())
                }
            }
            Placement::Auto | Placement::Exclusive => {
                let workers = self.workers.lock().unwrap();
                workers
                    .values()
                    .filter(|h| h.shared())
                    .min_by_key(|h| h.servicenum())
                    .map(|h| h.worker_id())
                    .ok_or_else(|| RouterError::NoSharedWorker.into())
            }
        }
    }

    /// Installs a new service on the worker chosen by `placement`. Blocks the calling thread
    /// until the owning worker has run the service's `start()` hook, so the returned id is
    /// immediately safe to send to.
    pub fn create_service<F>(self: &Arc<Self>, placement: Placement, factory: F) -> AnyResult<ServiceId>
    where
        F: FnOnce(ServiceId) -> Box<dyn Service> + Send + 'static,
    {
        let worker_id = self.choose_worker(placement)?;
        let handle = self
            .handle_for(worker_id)
            .ok_or(RouterError::UnknownWorker(worker_id))?;
        let id = make_service_id(&self.serviceuid, worker_id);
        if matches!(placement, Placement::Exclusive) {
            handle.set_shared(false);
        }

        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        handle.post(WorkerTask::AddService(Box::new(factory), id, ready_tx));
        ready_rx.recv().map_err(|_| RouterError::WorkerGone(worker_id))?;
        Ok(id)
    }

    /// Registers a discoverable name for an already-installed service.
    pub fn register_name(&self, name: impl Into<String>, id: ServiceId) {
        self.names.lock().unwrap().insert(name.into(), id);
    }

    /// Looks up a service previously registered with [`Self::register_name`].
    pub fn lookup_name(&self, name: &str) -> Option<ServiceId> {
        self.names.lock().unwrap().get(name).copied()
    }

    /// Evicts a name registry entry. Called by a worker on graceful (non-crashed) removal only.
    pub(crate) fn on_service_remove(&self, id: ServiceId) {
        self.names.lock().unwrap().retain(|_, v| *v != id);
    }

    /// Asks the owning worker to remove a service. `sender`/`responseid` identify who receives
    /// the `"service destroy"` acknowledgement; pass [`SYSTEM_SERVICE_ID`]/`0` when nobody is
    /// waiting on one (e.g. a service requesting its own removal, or a crash).
    pub(crate) fn request_remove(&self, id: ServiceId, sender: ServiceId, responseid: ResponseId, crashed: bool) {
        if let Some(handle) = self.handle_for(id.worker_id()) {
            handle.post(WorkerTask::RemoveService {
                id,
                sender,
                responseid,
                crashed,
            });
        }
    }

    /// Dispatches a dotted command string to the given worker (see `worker.<wid>.<name>` /
    /// `service.<id>.<...>` forms).
    pub fn runcmd(&self, worker_id: WorkerId, sender: ServiceId, cmd: impl Into<String>, responseid: ResponseId) {
        if let Some(handle) = self.handle_for(worker_id) {
            handle.post(WorkerTask::RunCmd {
                sender,
                cmd: cmd.into(),
                responseid,
            });
        }
    }

    /// Posts `stop()` to every worker. Idempotent: a worker already stopping or exited ignores
    /// a repeat.
    pub(crate) fn stop_all(&self) {
        for handle in self.workers.lock().unwrap().values() {
            handle.post(WorkerTask::Stop);
        }
    }

    /// Posts a periodic `Update` tick to every worker.
    pub(crate) fn tick_all(&self) {
        for handle in self.workers.lock().unwrap().values() {
            handle.post(WorkerTask::Tick);
        }
    }

    pub(crate) fn shutdown_all(&self) {
        for handle in self.workers.lock().unwrap().values() {
            handle.post(WorkerTask::Shutdown);
        }
    }

    /// True once every worker has reached [`crate::worker::WorkerState::Exited`].
    pub(crate) fn all_exited(&self) -> bool {
        self.workers
            .lock()
            .unwrap()
            .values()
            .all(|h| h.state() == crate::worker::WorkerState::Exited)
    }
}
