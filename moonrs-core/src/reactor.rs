//! The per-worker I/O reactor. Each worker owns exactly one of these, driven to completion on
//! its own dedicated OS thread: prefer the io_uring driver on Linux, fall back to the portable
//! legacy (epoll/kqueue) driver everywhere else.

use std::future::Future;

#[cfg(target_os = "linux")]
use monoio::IoUringDriver;
use monoio::{LegacyDriver, Runtime};

use crate::config::RuntimeConfig;

pub enum Reactor {
    #[cfg(target_os = "linux")]
    IoUring(Runtime<IoUringDriver>),
    Legacy(Runtime<LegacyDriver>),
}

impl Reactor {
    pub fn build(config: &RuntimeConfig) -> Self {
        #[cfg(target_os = "linux")]
        {
            if monoio::utils::detect_uring() {
                let runtime = monoio::RuntimeBuilder::<IoUringDriver>::new()
                    .with_entries(config.entries)
                    .build()
                    .expect("failed to build io_uring reactor");
                return Reactor::IoUring(runtime);
            }
        }
        let _ = config;
        let runtime = monoio::RuntimeBuilder::<LegacyDriver>::new()
            .build()
            .expect("failed to build legacy reactor");
        Reactor::Legacy(runtime)
    }

    pub fn block_on<F: Future>(&mut self, future: F) -> F::Output {
        match self {
            #[cfg(target_os = "linux")]
            Reactor::IoUring(rt) => rt.block_on(future),
            Reactor::Legacy(rt) => rt.block_on(future),
        }
    }
}
