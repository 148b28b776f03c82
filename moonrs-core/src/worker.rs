//! The single-threaded actor host. Each worker owns a private reactor thread, a set of
//! installed services, and a strictly-ordered task queue that serializes every mutation against
//! that thread: draining the inbound mailbox, adding/removing services, dispatching commands,
//! and ticking `update`. One thread, one mailbox, no locks inside the hot path.

use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc as stdmpsc, Arc, Mutex};
use std::time::Instant;

use futures_channel::mpsc::{UnboundedReceiver, UnboundedSender};
use futures_util::StreamExt;
use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::context::ServiceContext;
use crate::identity::{ServiceId, WorkerId};
use crate::message::{Message, PType, ResponseId};
use crate::reactor::Reactor;
use crate::router::Router;
use crate::service::Service;

/// Worker lifecycle. Monotonic: `Init -> Ready -> Stopping -> Exited`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum WorkerState {
    Init,
    Ready,
    Stopping,
    Exited,
}

type ServiceFactory = Box<dyn FnOnce(ServiceId) -> Box<dyn Service> + Send>;

pub(crate) enum WorkerTask {
    Drain,
    AddService(ServiceFactory, ServiceId, stdmpsc::Sender<()>),
    RemoveService {
        id: ServiceId,
        sender: ServiceId,
        responseid: ResponseId,
        crashed: bool,
    },
    RunCmd {
        sender: ServiceId,
        cmd: String,
        responseid: ResponseId,
    },
    Tick,
    Stop,
    Shutdown,
}

/// The router-facing half of a worker: everything reachable from other threads. Mutation of
/// `services`/`commands`/`state` itself only ever happens on the worker's own reactor thread,
/// reached by posting a [`WorkerTask`].
pub(crate) struct WorkerHandle {
    worker_id: WorkerId,
    inbound: Mutex<VecDeque<Message>>,
    tasks: UnboundedSender<WorkerTask>,
    shared: AtomicBool,
    servicenum: AtomicUsize,
    state: Mutex<WorkerState>,
}

impl WorkerHandle {
    fn new(worker_id: WorkerId, tasks: UnboundedSender<WorkerTask>) -> Self {
        WorkerHandle {
            worker_id,
            inbound: Mutex::new(VecDeque::new()),
            tasks,
            shared: AtomicBool::new(true),
            servicenum: AtomicUsize::new(0),
            state: Mutex::new(WorkerState::Init),
        }
    }

    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    pub fn shared(&self) -> bool {
        self.shared.load(Ordering::Acquire)
    }

    pub fn set_shared(&self, v: bool) {
        self.shared.store(v, Ordering::Release);
    }

    pub fn servicenum(&self) -> usize {
        self.servicenum.load(Ordering::Acquire)
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap()
    }

    pub(crate) fn mark_ready(&self) {
        *self.state.lock().unwrap() = WorkerState::Ready;
    }

    /// Enqueues a message for this worker. Posts exactly one drain task on the 0→1 transition;
    /// every other push rides the drain already scheduled.
    pub fn push(&self, msg: Message) {
        let len = {
            let mut q = self.inbound.lock().unwrap();
            q.push_back(msg);
            q.len()
        };
        if len == 1 {
            self.post(WorkerTask::Drain);
        }
    }

    pub(crate) fn post(&self, task: WorkerTask) {
        if self.tasks.unbounded_send(task).is_err() {
            warn!(worker = self.worker_id, "worker reactor has shut down, dropping task");
        }
    }
}

/// Spawns the worker thread and blocks the caller until it reports `ready`, mirroring the
/// original `run()`'s "returns only after ready" contract with a one-shot handoff instead of a
/// spin loop.
pub(crate) fn spawn(
    worker_id: WorkerId,
    router: Arc<Router>,
    config: RuntimeConfig,
) -> (Arc<WorkerHandle>, std::thread::JoinHandle<()>) {
    let (tx, rx) = futures_channel::mpsc::unbounded();
    let handle = Arc::new(WorkerHandle::new(worker_id, tx));
    let thread_handle = handle.clone();
    let (ready_tx, ready_rx) = stdmpsc::channel();
    let join = std::thread::Builder::new()
        .name(format!("moonrs-worker-{worker_id}"))
        .spawn(move || {
            if config.cpu_affinity {
                if let Ok(parallelism) = std::thread::available_parallelism() {
                    let core = (worker_id as usize) % parallelism.get();
                    if let Err(e) = monoio::utils::bind_to_cpu_set([core]) {
                        warn!(worker = worker_id, core, "failed to bind worker thread to cpu core: {e}");
                    }
                }
            }
            let mut reactor = Reactor::build(&config);
            thread_handle.mark_ready();
            let _ = ready_tx.send(());
            info!(worker = worker_id, "worker start");
            let mut worker = Worker {
                id: worker_id,
                router,
                handle: thread_handle.clone(),
                config,
                services: HashMap::new(),
                work_time_ms: 0,
            };
            reactor.block_on(worker.run(rx));
            info!(worker = worker_id, "worker stop");
        })
        .expect("failed to spawn worker thread");
    ready_rx.recv().expect("worker thread did not signal ready");
    (handle, join)
}

struct Worker {
    id: WorkerId,
    router: Arc<Router>,
    handle: Arc<WorkerHandle>,
    config: RuntimeConfig,
    services: HashMap<ServiceId, Box<dyn Service>>,
    work_time_ms: u64,
}

impl Worker {
    async fn run(&mut self, mut tasks: UnboundedReceiver<WorkerTask>) {
        while let Some(task) = tasks.next().await {
            if matches!(&task, WorkerTask::Shutdown) {
                break;
            }
            self.dispatch(task);
        }
    }

    fn ctx(&self, id: ServiceId) -> ServiceContext {
        ServiceContext::new(self.router.clone(), id)
    }

    fn dispatch(&mut self, task: WorkerTask) {
        match task {
            WorkerTask::Drain => self.drain(),
            WorkerTask::AddService(factory, id, ready_tx) => self.add_service(factory, id, ready_tx),
            WorkerTask::RemoveService {
                id,
                sender,
                responseid,
                crashed,
            } => self.remove_service(id, sender, responseid, crashed),
            WorkerTask::RunCmd {
                sender,
                cmd,
                responseid,
            } => self.runcmd(sender, &cmd, responseid),
            WorkerTask::Tick => self.tick(),
            WorkerTask::Stop => self.stop(),
            WorkerTask::Shutdown => unreachable!("handled by the run loop"),
        }
    }

    fn drain(&mut self) {
        let batch: VecDeque<Message> = {
            let mut q = self.handle.inbound.lock().unwrap();
            std::mem::take(&mut *q)
        };
        if batch.is_empty() {
            return;
        }
        if batch.len() > self.config.queue_warn_threshold {
            debug!(worker = self.id, queue_size = batch.len(), "worker queue size too long");
        }
        let started = Instant::now();
        for msg in batch {
            self.handle_one(msg);
        }
        self.work_time_ms += started.elapsed().as_millis() as u64;
    }

    fn handle_one(&mut self, msg: Message) {
        if msg.broadcast() {
            let ids: Vec<ServiceId> = self
                .services
                .keys()
                .copied()
                .filter(|id| *id != msg.sender())
                .collect();
            for id in ids {
                self.invoke(id, msg.clone());
            }
            return;
        }

        let receiver = msg.receiver();
        if self.services.contains_key(&receiver) {
            self.invoke(receiver, msg);
        } else {
            self.router
                .make_response(msg.sender(), "error", "call dead service.", msg.responseid(), PType::ERROR);
        }
    }

    fn invoke(&mut self, id: ServiceId, msg: Message) {
        let sender = msg.sender();
        let responseid = msg.responseid();
        let ctx = self.ctx(id);
        let result = {
            let svc = match self.services.get_mut(&id) {
                Some(s) => s,
                None => return,
            };
            panic::catch_unwind(AssertUnwindSafe(|| svc.handle_message(msg, &ctx)))
        };
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => self.crash(id, sender, responseid, err.to_string()),
            Err(payload) => {
                let reason = panic_message(&payload);
                self.crash(id, sender, responseid, reason);
            }
        }
    }

    fn crash(&mut self, id: ServiceId, sender: ServiceId, responseid: ResponseId, reason: String) {
        warn!(worker = self.id, service = %id, reason = %reason, "service handler failed, removing");
        self.ctx(id).reply_error(sender, responseid, reason);
        self.remove_service(id, ServiceId::from_raw(0), 0, true);
    }

    fn add_service(&mut self, factory: ServiceFactory, id: ServiceId, ready_tx: stdmpsc::Sender<()>) {
        let svc = factory(id);
        let name = svc.name().to_string();
        if self.services.insert(id, svc).is_some() {
            panic!("serviceid repeated: {id}");
        }
        self.handle.servicenum.store(self.services.len(), Ordering::Release);
        info!(worker = self.id, service = %id, name = %name, "new service");
        let ctx = self.ctx(id);
        self.services.get_mut(&id).unwrap().start(&ctx);
        let _ = ready_tx.send(());
    }

    fn remove_service(&mut self, id: ServiceId, sender: ServiceId, responseid: ResponseId, crashed: bool) {
        let Some(svc) = self.services.get_mut(&id) else {
            self.router
                .make_response(sender, "error", format!("remove_service:service not found. {id}"), responseid, PType::ERROR);
            return;
        };
        let ctx = self.ctx(id);
        svc.destroy(&ctx);
        let name = svc.name().to_string();

        if self.services.len() == 1 {
            self.handle.set_shared(true);
        }
        if !crashed {
            self.router.on_service_remove(id);
        }
        self.services.remove(&id);
        self.handle.servicenum.store(self.services.len(), Ordering::Release);

        let body = serde_json::json!({ "name": name, "serviceid": id.raw() }).to_string();
        self.router.make_response(sender, "service destroy", body, responseid, PType::RESPONSE);
        info!(worker = self.id, service = %id, name = %name, "service destroy");

        let reason = if crashed { "service crashed" } else { "service exit" };
        let sys = Message::builder()
            .sender(id)
            .ptype(PType::SYSTEM)
            .header("exit")
            .payload(reason)
            .broadcast(true)
            .build();
        self.router.broadcast(sys);

        if self.services.is_empty() && self.handle.state() == WorkerState::Stopping {
            *self.handle.state.lock().unwrap() = WorkerState::Exited;
        }
    }

    fn runcmd(&mut self, sender: ServiceId, cmd: &str, responseid: ResponseId) {
        let params: Vec<&str> = cmd.split('.').collect();
        match params.first().copied() {
            Some("worker") => {
                if let Some(name) = params.get(2) {
                    if let Some(body) = self.run_builtin(name) {
                        self.router.make_response(sender, "", body, responseid, PType::RESPONSE);
                    }
                }
            }
            Some("service") => {
                let target = params
                    .get(1)
                    .and_then(|s| s.parse::<u32>().ok())
                    .map(ServiceId::from_raw);
                match target.filter(|id| self.services.contains_key(id)) {
                    Some(id) => {
                        let ctx = self.ctx(id);
                        self.services.get_mut(&id).unwrap().runcmd(sender, cmd, responseid, &ctx);
                    }
                    None => {
                        let missing = params.get(1).copied().unwrap_or("?");
                        self.router.make_response(
                            sender,
                            "error",
                            format!("runcmd:can not found service. {missing}"),
                            responseid,
                            PType::ERROR,
                        );
                    }
                }
            }
            _ => {}
        }
    }

    fn run_builtin(&mut self, name: &str) -> Option<String> {
        match name {
            "worktime" => {
                let body = serde_json::json!({ "work_time": self.work_time_ms }).to_string();
                self.work_time_ms = 0;
                Some(body)
            }
            "services" => {
                let entries: Vec<serde_json::Value> = self
                    .services
                    .values()
                    .map(|s| serde_json::json!({ "name": s.name(), "serviceid": s.id().raw() }))
                    .collect();
                Some(serde_json::Value::Array(entries).to_string())
            }
            _ => None,
        }
    }

    fn tick(&mut self) {
        let started = Instant::now();
        let ids: Vec<ServiceId> = self.services.keys().copied().collect();
        for id in ids {
            let ctx = self.ctx(id);
            if let Some(svc) = self.services.get_mut(&id) {
                svc.update(&ctx);
            }
        }
        self.work_time_ms += started.elapsed().as_millis() as u64;
    }

    fn stop(&mut self) {
        let mut state = self.handle.state.lock().unwrap();
        if matches!(*state, WorkerState::Stopping | WorkerState::Exited) {
            return;
        }
        if self.services.is_empty() {
            *state = WorkerState::Exited;
            return;
        }
        *state = WorkerState::Stopping;
        drop(state);

        let ids: Vec<ServiceId> = self.services.keys().copied().collect();
        for id in ids {
            let ctx = self.ctx(id);
            if let Some(svc) = self.services.get_mut(&id) {
                svc.exit(&ctx);
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "service panicked".to_string()
    }
}
