//! End-to-end tests against the public `Runtime`/`Router`/`Service` surface: no internal module
//! is reached into directly, matching how a real consumer of this crate would exercise it.

use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use bytes::Bytes;
use moonrs_core::{AnyError, Message, PType, Placement, Runtime, RuntimeConfig, Service, ServiceContext, ServiceId};

fn test_config() -> RuntimeConfig {
    RuntimeConfig {
        worker_threads: 2,
        cpu_affinity: false,
        queue_warn_threshold: 1000,
        tick_interval_ms: 20,
        entries: 256,
    }
}

fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    predicate()
}

/// Forwards every message it receives to a channel, for the test to assert on.
struct RecorderService {
    id: ServiceId,
    name: String,
    tx: Sender<Message>,
}

impl Service for RecorderService {
    fn id(&self) -> ServiceId {
        self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn handle_message(&mut self, msg: Message, _ctx: &ServiceContext) -> Result<(), AnyError> {
        let _ = self.tx.send(msg);
        Ok(())
    }
}

/// Replies "pong" with the original payload to whoever sent it.
struct PingPongService {
    id: ServiceId,
    name: String,
}

impl Service for PingPongService {
    fn id(&self) -> ServiceId {
        self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn handle_message(&mut self, msg: Message, ctx: &ServiceContext) -> Result<(), AnyError> {
        ctx.reply(msg.sender(), "pong", msg.payload().clone(), msg.responseid());
        Ok(())
    }
}

/// Fails every message whose header is `"boom"`; replies normally otherwise. Used to trigger
/// crash containment.
struct CrashyService {
    id: ServiceId,
    name: String,
}

impl Service for CrashyService {
    fn id(&self) -> ServiceId {
        self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn handle_message(&mut self, msg: Message, _ctx: &ServiceContext) -> Result<(), AnyError> {
        if msg.header() == "boom" {
            anyhow::bail!("kaboom");
        }
        Ok(())
    }
}

/// Sleeps briefly on `"slow"` messages so `worktime` has something non-zero to report.
struct SlowService {
    id: ServiceId,
    name: String,
}

impl Service for SlowService {
    fn id(&self) -> ServiceId {
        self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn handle_message(&mut self, msg: Message, _ctx: &ServiceContext) -> Result<(), AnyError> {
        if msg.header() == "slow" {
            std::thread::sleep(Duration::from_millis(10));
        }
        Ok(())
    }
}

fn start_runtime() -> Runtime {
    Runtime::start(test_config())
}

#[test]
fn round_trip_request_response() {
    let runtime = start_runtime();
    let router = runtime.router().clone();
    let (tx, rx): (Sender<Message>, Receiver<Message>) = mpsc::channel();

    let recorder = router
        .create_service(Placement::Worker(1), move |id| {
            Box::new(RecorderService {
                id,
                name: "recorder".into(),
                tx,
            })
        })
        .unwrap();
    let pong = router
        .create_service(Placement::Auto, |id| {
            Box::new(PingPongService { id, name: "pingpong".into() })
        })
        .unwrap();

    let ping = Message::builder()
        .sender(recorder)
        .receiver(pong)
        .header("ping")
        .responseid(7)
        .payload(Bytes::from_static(b"hi"))
        .build();
    router.send(ping);

    let reply = rx.recv_timeout(Duration::from_secs(1)).expect("reply arrives");
    assert_eq!(reply.header(), "pong");
    assert_eq!(reply.responseid(), 7);
    assert_eq!(reply.payload().as_ref(), b"hi");

    runtime.shutdown();
}

#[test]
fn dead_receiver_gets_error_response() {
    let runtime = start_runtime();
    let router = runtime.router().clone();
    let (tx, rx) = mpsc::channel();

    let recorder = router
        .create_service(Placement::Worker(1), move |id| {
            Box::new(RecorderService {
                id,
                name: "recorder".into(),
                tx,
            })
        })
        .unwrap();

    // Worker 1, a service id that was never installed.
    let ghost = ServiceId::from_raw(0x01FF_FFFF);
    let msg = Message::builder()
        .sender(recorder)
        .receiver(ghost)
        .header("ping")
        .responseid(3)
        .build();
    router.send(msg);

    let reply = rx.recv_timeout(Duration::from_secs(1)).expect("error reply arrives");
    assert_eq!(reply.ptype(), PType::ERROR);
    assert_eq!(reply.header(), "error");
    assert_eq!(reply.responseid(), 3);
    assert_eq!(reply.payload().as_ref(), b"call dead service.");

    runtime.shutdown();
}

#[test]
fn graceful_shutdown_reaches_exited() {
    let runtime = start_runtime();
    let router = runtime.router().clone();

    router
        .create_service(Placement::Worker(1), |id| Box::new(PingPongService { id, name: "a".into() }))
        .unwrap();
    router
        .create_service(Placement::Worker(1), |id| Box::new(PingPongService { id, name: "b".into() }))
        .unwrap();

    runtime.stop();
    assert!(wait_until(Duration::from_secs(2), || runtime.all_exited()));

    runtime.shutdown();
}

#[test]
fn crash_broadcasts_without_registry_eviction() {
    let runtime = start_runtime();
    let router = runtime.router().clone();
    let (tx, rx) = mpsc::channel();

    router
        .create_service(Placement::Worker(1), move |id| {
            Box::new(RecorderService {
                id,
                name: "observer".into(),
                tx,
            })
        })
        .unwrap();
    let crashy = router
        .create_service(Placement::Worker(1), |id| Box::new(CrashyService { id, name: "crashy".into() }))
        .unwrap();
    router.register_name("crashy", crashy);

    let msg = Message::builder()
        .sender(ServiceId::from_raw(0))
        .receiver(crashy)
        .header("boom")
        .build();
    router.send(msg);

    let broadcast = loop {
        let msg = rx.recv_timeout(Duration::from_secs(1)).expect("broadcast arrives");
        if msg.ptype() == PType::SYSTEM && msg.header() == "exit" {
            break msg;
        }
    };
    assert_eq!(broadcast.payload().as_ref(), b"service crashed");
    assert_eq!(broadcast.sender(), crashy);

    // Crashed removal bypasses the router's name eviction: the stale entry survives.
    assert!(wait_until(Duration::from_millis(200), || router.lookup_name("crashy").is_some()));

    runtime.shutdown();
}

#[test]
fn batch_drain_preserves_fifo_order() {
    let runtime = start_runtime();
    let router = runtime.router().clone();
    let (tx, rx) = mpsc::channel();

    let recorder = router
        .create_service(Placement::Worker(1), move |id| {
            Box::new(RecorderService {
                id,
                name: "recorder".into(),
                tx,
            })
        })
        .unwrap();

    const N: i32 = 200;
    for i in 0..N {
        let msg = Message::builder()
            .sender(ServiceId::from_raw(0))
            .receiver(recorder)
            .header("seq")
            .responseid(i)
            .build();
        router.send(msg);
    }

    let mut seen = Vec::with_capacity(N as usize);
    for _ in 0..N {
        let msg = rx.recv_timeout(Duration::from_secs(2)).expect("message arrives");
        seen.push(msg.responseid());
    }
    let expected: Vec<i32> = (0..N).collect();
    assert_eq!(seen, expected);

    runtime.shutdown();
}

#[test]
fn worktime_command_reports_and_resets() {
    let runtime = start_runtime();
    let router = runtime.router().clone();
    let (tx, rx) = mpsc::channel();

    let recorder = router
        .create_service(Placement::Worker(1), move |id| {
            Box::new(RecorderService {
                id,
                name: "recorder".into(),
                tx,
            })
        })
        .unwrap();
    let slow = router
        .create_service(Placement::Worker(1), |id| Box::new(SlowService { id, name: "slow".into() }))
        .unwrap();

    let msg = Message::builder().sender(recorder).receiver(slow).header("slow").build();
    router.send(msg);
    std::thread::sleep(Duration::from_millis(50));

    router.runcmd(1, recorder, "worker.1.worktime", 9);
    let first = rx.recv_timeout(Duration::from_secs(1)).expect("worktime reply arrives");
    assert_eq!(first.responseid(), 9);
    let body = String::from_utf8_lossy(first.payload());
    assert!(body.contains("\"work_time\":"));
    assert!(!body.contains("\"work_time\":0}"), "expected nonzero work_time, got {body}");

    router.runcmd(1, recorder, "worker.1.worktime", 10);
    let second = rx.recv_timeout(Duration::from_secs(1)).expect("second worktime reply arrives");
    let body2 = String::from_utf8_lossy(second.payload());
    assert_eq!(body2, "{\"work_time\":0}");

    runtime.shutdown();
}
