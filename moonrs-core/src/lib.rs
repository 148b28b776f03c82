//! In-process, multi-worker actor runtime: messages route between named services hosted on a
//! small pool of single-threaded workers, each with its own I/O reactor.

pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod message;
mod reactor;
pub mod reader;
pub mod router;
mod runtime;
pub mod service;
mod worker;

pub use config::RuntimeConfig;
pub use context::ServiceContext;
pub use error::{AnyError, AnyResult, ReaderError, RouterError};
pub use identity::{ServiceId, WorkerId, MAX_SERVICE_NUM};
pub use message::{Message, MessageBuilder, PType, ResponseId};
pub use reader::{ByteReader, Primitive};
pub use router::{Placement, Router, SYSTEM_SERVICE_ID};
pub use runtime::Runtime;
pub use service::Service;
