//! Service identity encoding: the upper byte of a [`ServiceId`] is the owning worker id, the
//! lower 24 bits are a per-worker monotonic counter. Encoding/decoding is a pure function so
//! sends resolve to the right worker without a global directory lookup.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Id of a worker within the runtime. Valid range is `1..=255`; `0` is reserved and never
/// assigned to a live worker.
pub type WorkerId = u8;

/// Number of bits the low, per-worker counter occupies before the worker id starts.
pub const WORKER_ID_SHIFT: u32 = 24;

/// Per-worker counter modulus. Must be `>= 2^16`; chosen with headroom over that floor.
pub const MAX_SERVICE_NUM: u32 = 1 << 20;

const LOW_MASK: u32 = (1 << WORKER_ID_SHIFT) - 1;

/// A 32-bit service identity. The high byte encodes the owning worker; the low 24 bits are a
/// per-worker counter that is never observed to be zero.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(u32);

impl ServiceId {
    /// Wraps a raw 32-bit id as-is, with no validation. Used when an id arrives over the wire.
    pub const fn from_raw(raw: u32) -> Self {
        ServiceId(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// The worker id encoded in the high byte of this service id.
    pub const fn worker_id(self) -> WorkerId {
        (self.0 >> WORKER_ID_SHIFT) as u8
    }

    /// The low, per-worker counter portion of this service id (never zero for a valid id).
    pub const fn low(self) -> u32 {
        self.0 & LOW_MASK
    }

    fn encode(worker: WorkerId, low: u32) -> Self {
        debug_assert!(low & !LOW_MASK == 0, "low bits must fit in 24 bits");
        ServiceId(((worker as u32) << WORKER_ID_SHIFT) | low)
    }
}

impl fmt::Debug for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceId(0x{:08x})", self.0)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Allocates the next service id for a worker: `serviceuid` is a shared atomic counter any
/// thread may call this with, taken modulo [`MAX_SERVICE_NUM`] and bumped by one so the low
/// bits are never zero.
pub fn make_service_id(serviceuid: &AtomicU32, worker: WorkerId) -> ServiceId {
    let uid = serviceuid.fetch_add(1, Ordering::Relaxed);
    let low = (uid % MAX_SERVICE_NUM) + 1;
    ServiceId::encode(worker, low)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_id_roundtrips_through_encoding() {
        let counter = AtomicU32::new(0);
        let id = make_service_id(&counter, 7);
        assert_eq!(id.worker_id(), 7);
        assert_ne!(id.low(), 0);
    }

    #[test]
    fn low_bits_never_zero_even_at_wraparound() {
        let counter = AtomicU32::new(MAX_SERVICE_NUM - 1);
        let id = make_service_id(&counter, 3);
        assert_ne!(id.low(), 0);
        let id2 = make_service_id(&counter, 3);
        assert_ne!(id2.low(), 0);
    }

    #[test]
    fn successive_allocations_are_distinct() {
        let counter = AtomicU32::new(0);
        let a = make_service_id(&counter, 1);
        let b = make_service_id(&counter, 1);
        assert_ne!(a, b);
    }

    #[test]
    fn display_is_hex() {
        let id = ServiceId::from_raw(0x0100_0001);
        assert_eq!(format!("{id}"), "0x01000001");
    }
}
