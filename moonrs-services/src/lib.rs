//! Demo services exercising the `moonrs-core` actor runtime.

mod echo;
mod supervisor;

pub use echo::EchoService;
pub use supervisor::SupervisorService;
