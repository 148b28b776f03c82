//! The message envelope routed between services. Immutable once handed to a worker's queue.

use bytes::Bytes;

use crate::identity::ServiceId;

pub type ResponseId = i32;

/// Message type tag. `0..=31` are reserved for the runtime; values above that are free for
/// user-defined protocols riding on top of the actor layer.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash)]
pub struct PType(pub u8);

impl PType {
    /// Default type for an ordinary, non-error response.
    pub const RESPONSE: PType = PType(0);
    /// System notifications synthesized by the runtime itself (e.g. the exit broadcast).
    pub const SYSTEM: PType = PType(1);
    /// Error responses synthesized by the router or worker.
    pub const ERROR: PType = PType(255);
}

impl From<u8> for PType {
    fn from(v: u8) -> Self {
        PType(v)
    }
}

/// An immutable (post-send) envelope carrying sender, receiver, type tag, header, response id,
/// payload and broadcast flag.
#[derive(Clone, Debug)]
pub struct Message {
    sender: ServiceId,
    receiver: ServiceId,
    ptype: PType,
    header: String,
    responseid: ResponseId,
    payload: Bytes,
    broadcast: bool,
}

impl Message {
    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }

    pub fn sender(&self) -> ServiceId {
        self.sender
    }

    pub fn receiver(&self) -> ServiceId {
        self.receiver
    }

    pub fn ptype(&self) -> PType {
        self.ptype
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn responseid(&self) -> ResponseId {
        self.responseid
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn broadcast(&self) -> bool {
        self.broadcast
    }
}

/// Fresh, writable message under construction. Becomes logically immutable once [`Self::build`]
/// hands a [`Message`] to a queue.
#[derive(Default)]
pub struct MessageBuilder {
    sender: Option<ServiceId>,
    receiver: Option<ServiceId>,
    ptype: PType,
    header: String,
    responseid: ResponseId,
    payload: Bytes,
    broadcast: bool,
}

impl MessageBuilder {
    pub fn sender(mut self, id: ServiceId) -> Self {
        self.sender = Some(id);
        self
    }

    pub fn receiver(mut self, id: ServiceId) -> Self {
        self.receiver = Some(id);
        self
    }

    pub fn ptype(mut self, ptype: PType) -> Self {
        self.ptype = ptype;
        self
    }

    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    pub fn responseid(mut self, responseid: ResponseId) -> Self {
        self.responseid = responseid;
        self
    }

    pub fn payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn broadcast(mut self, broadcast: bool) -> Self {
        self.broadcast = broadcast;
        self
    }

    /// Builds the message. `sender`/`receiver` default to [`ServiceId::from_raw(0)`] if unset,
    /// which is never a valid live id and will simply fail routing as a dead receiver.
    pub fn build(self) -> Message {
        Message {
            sender: self.sender.unwrap_or(ServiceId::from_raw(0)),
            receiver: self.receiver.unwrap_or(ServiceId::from_raw(0)),
            ptype: self.ptype,
            header: self.header,
            responseid: self.responseid,
            payload: self.payload,
            broadcast: self.broadcast,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_round_trips_fields() {
        let m = Message::builder()
            .sender(ServiceId::from_raw(0x0100_0001))
            .receiver(ServiceId::from_raw(0x0200_0001))
            .ptype(PType::RESPONSE)
            .header("pong")
            .responseid(42)
            .payload(Bytes::from_static(b"ok"))
            .build();
        assert_eq!(m.header(), "pong");
        assert_eq!(m.responseid(), 42);
        assert_eq!(m.payload().as_ref(), b"ok");
        assert!(!m.broadcast());
    }

    #[test]
    fn broadcast_flag_defaults_false() {
        let m = Message::builder().build();
        assert!(!m.broadcast());
    }
}
