//! A minimal request/response demo service: replies to every non-system message with `"pong"`
//! and the original payload.

use moonrs_core::{AnyError, Message, PType, Service, ServiceContext, ServiceId};
use tracing::info;

pub struct EchoService {
    id: ServiceId,
    name: String,
}

impl EchoService {
    pub fn new(id: ServiceId) -> Self {
        EchoService {
            id,
            name: "echo".to_string(),
        }
    }
}

impl Service for EchoService {
    fn id(&self) -> ServiceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, _ctx: &ServiceContext) {
        info!(service = %self.id, "echo service started");
    }

    fn handle_message(&mut self, msg: Message, ctx: &ServiceContext) -> Result<(), AnyError> {
        if msg.ptype() == PType::SYSTEM {
            return Ok(());
        }
        ctx.reply(msg.sender(), "pong", msg.payload().clone(), msg.responseid());
        Ok(())
    }
}
