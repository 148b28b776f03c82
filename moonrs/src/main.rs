//! Demo entrypoint: starts a runtime, installs a supervisor and an echo service, exchanges one
//! message between them, then shuts down. Loading a config file from a CLI argument is out of
//! scope; `RuntimeConfig::default()` is used here.

use std::time::Duration;

use bytes::Bytes;
use moonrs_core::{Message, Placement, Runtime, RuntimeConfig};
use moonrs_services::{EchoService, SupervisorService};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let runtime = Runtime::start(RuntimeConfig::default());
    let router = runtime.router().clone();

    let supervisor_id = router
        .create_service(Placement::Worker(1), |id| Box::new(SupervisorService::new(id)))
        .expect("install supervisor");
    router.register_name("supervisor", supervisor_id);

    let echo_id = router
        .create_service(Placement::Auto, |id| Box::new(EchoService::new(id)))
        .expect("install echo");
    router.register_name("echo", echo_id);

    let ping = Message::builder()
        .sender(supervisor_id)
        .receiver(echo_id)
        .header("ping")
        .responseid(1)
        .payload(Bytes::from_static(b"hello"))
        .build();
    router.send(ping);

    std::thread::sleep(Duration::from_millis(200));

    runtime.stop();
    std::thread::sleep(Duration::from_millis(200));
    runtime.shutdown();
}
