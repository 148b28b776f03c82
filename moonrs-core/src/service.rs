//! The `Service` contract: a named, addressable actor with a mailbox handler, lifecycle hooks,
//! an optional per-tick `update`, and dotted-string command dispatch.

use crate::context::ServiceContext;
use crate::error::AnyError;
use crate::identity::ServiceId;
use crate::message::{Message, ResponseId};

/// A single-threaded actor hosted by a [`crate::worker::Worker`].
///
/// All methods run on the owning worker's reactor thread; none of them may block beyond their
/// own bounded work. `handle_message` returning `Err` (or panicking) is treated identically to a
/// crash: the worker converts it into a `PTYPE_ERROR` reply to the sender and removes the
/// service with `crashed = true`.
pub trait Service: Send {
    /// Stable identity assigned by the router before construction.
    fn id(&self) -> ServiceId;

    /// Short, human-readable name used in logs and the `services` command.
    fn name(&self) -> &str;

    /// Invoked once, on the owning worker's thread, immediately after installation and before
    /// any user message can reach this service.
    fn start(&mut self, _ctx: &ServiceContext) {}

    /// Processes one message. May enqueue further messages via `ctx`.
    fn handle_message(&mut self, msg: Message, ctx: &ServiceContext) -> Result<(), AnyError>;

    /// Optional periodic hook driven by the worker's tick.
    fn update(&mut self, _ctx: &ServiceContext) {}

    /// Dispatches a dotted command string addressed to this service (the `service.<id>.<...>`
    /// form already resolved by the worker). The default implementation reports the command as
    /// unrecognized.
    fn runcmd(&mut self, sender: ServiceId, cmd: &str, responseid: ResponseId, ctx: &ServiceContext) {
        let _ = sender;
        ctx.reply_error(sender, responseid, format!("unknown command: {cmd}"));
    }

    /// Requests graceful termination. A well-behaved service finishes in-flight work and then
    /// asks its worker to remove it via `ctx.request_remove(false)`.
    fn exit(&mut self, ctx: &ServiceContext) {
        ctx.request_remove(false);
    }

    /// Terminal teardown, called by the worker on its own thread exactly once.
    fn destroy(&mut self, _ctx: &ServiceContext) {}
}
