//! A demo service that only listens: it logs every `PTYPE_SYSTEM`/`"exit"` broadcast it
//! receives, so an operator can watch sibling services come and go.

use moonrs_core::{AnyError, Message, PType, Service, ServiceContext, ServiceId};
use tracing::{info, warn};

pub struct SupervisorService {
    id: ServiceId,
    name: String,
}

impl SupervisorService {
    pub fn new(id: ServiceId) -> Self {
        SupervisorService {
            id,
            name: "supervisor".to_string(),
        }
    }
}

impl Service for SupervisorService {
    fn id(&self) -> ServiceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, _ctx: &ServiceContext) {
        info!(service = %self.id, "supervisor started");
    }

    fn handle_message(&mut self, msg: Message, _ctx: &ServiceContext) -> Result<(), AnyError> {
        if msg.ptype() == PType::SYSTEM && msg.header() == "exit" {
            let body = String::from_utf8_lossy(msg.payload());
            warn!(from = %msg.sender(), body = %body, "sibling service removed");
        }
        Ok(())
    }
}
