//! Runtime configuration: the single externally-loadable knob set (worker count, cpu
//! affinity, io_uring entries, and the knobs this runtime's worker loop reads directly).

use serde::{Deserialize, Serialize};

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

const fn default_queue_warn_threshold() -> usize {
    1000
}

const fn default_tick_interval_ms() -> u64 {
    100
}

const fn default_entries() -> u32 {
    32768
}

/// Runtime configuration for the worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Number of workers to spawn. Must fit in `1..=255`.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Bind each worker thread to a CPU core.
    #[serde(default)]
    pub cpu_affinity: bool,

    /// Batch size, beyond which a drain logs a debug warning about queue depth.
    #[serde(default = "default_queue_warn_threshold")]
    pub queue_warn_threshold: usize,

    /// Period, in milliseconds, of the `Update` tick posted to every worker.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// io_uring submission queue entries (Linux `IoUringDriver` only).
    #[serde(default = "default_entries")]
    pub entries: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            worker_threads: default_worker_threads(),
            cpu_affinity: false,
            queue_warn_threshold: default_queue_warn_threshold(),
            tick_interval_ms: default_tick_interval_ms(),
            entries: default_entries(),
        }
    }
}

impl RuntimeConfig {
    /// Parses a TOML document into a `RuntimeConfig`. The concrete CLI that would normally
    /// resolve a config file path is out of scope for this crate; this is the load-from-bytes
    /// half of that contract.
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_constructible_without_a_file() {
        let cfg = RuntimeConfig::default();
        assert!(cfg.worker_threads >= 1);
        assert_eq!(cfg.queue_warn_threshold, 1000);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg = RuntimeConfig::from_toml("worker_threads = 4\n").unwrap();
        assert_eq!(cfg.worker_threads, 4);
        assert_eq!(cfg.tick_interval_ms, 100);
    }
}
