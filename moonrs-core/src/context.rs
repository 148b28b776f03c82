//! The handle a running [`crate::service::Service`] uses to talk back to the runtime: send
//! further messages, reply to its caller, or ask its owning worker to remove it.

use std::sync::Arc;

use bytes::Bytes;

use crate::identity::ServiceId;
use crate::message::{Message, PType, ResponseId};
use crate::router::Router;

/// Borrowed by every [`crate::service::Service`] callback; cheap to clone (an `Arc` plus a
/// `ServiceId`), but services are always handed a `&ServiceContext` rather than an owned one.
#[derive(Clone)]
pub struct ServiceContext {
    router: Arc<Router>,
    id: ServiceId,
}

impl ServiceContext {
    pub(crate) fn new(router: Arc<Router>, id: ServiceId) -> Self {
        ServiceContext { router, id }
    }

    /// The id of the service this context was handed to.
    pub fn id(&self) -> ServiceId {
        self.id
    }

    /// Sends an already-built message. The router decodes the worker id from `msg.receiver()`
    /// and enqueues it there.
    pub fn send(&self, msg: Message) {
        self.router.send(msg);
    }

    /// Convenience for the common case: reply to `to` with this service as the message's sender.
    pub fn reply(
        &self,
        to: ServiceId,
        header: impl Into<String>,
        body: impl Into<Bytes>,
        responseid: ResponseId,
    ) {
        let msg = Message::builder()
            .sender(self.id)
            .receiver(to)
            .ptype(PType::RESPONSE)
            .header(header)
            .responseid(responseid)
            .payload(body)
            .build();
        self.send(msg);
    }

    /// Convenience for replying with a `PTYPE_ERROR` envelope.
    pub fn reply_error(&self, to: ServiceId, responseid: ResponseId, reason: impl Into<String>) {
        let msg = Message::builder()
            .sender(self.id)
            .receiver(to)
            .ptype(PType::ERROR)
            .header("error")
            .responseid(responseid)
            .payload(Bytes::from(reason.into()))
            .build();
        self.send(msg);
    }

    /// Asks this service's owning worker to remove it. A well-behaved `exit()` implementation
    /// calls this once it has finished draining in-flight work.
    pub fn request_remove(&self, crashed: bool) {
        self.router.request_remove(self.id, self.id, 0, crashed);
    }
}
