/// A type alias for `anyhow::Error`, representing any error type.
///
/// Used at the handler boundary: a [`crate::service::Service`] converts whatever it fails with
/// into this before the worker turns it into a `PTYPE_ERROR` response.
pub type AnyError = anyhow::Error;

/// A type alias for `Result<T, E>` where `E` defaults to [`AnyError`].
pub type AnyResult<T, E = AnyError> = std::result::Result<T, E>;

#[macro_export]
macro_rules! bail_into {
    ($msg:literal $(,)?) => {
        return Err(::anyhow::anyhow!($msg).into())
    };
    ($err:expr $(,)?) => {
        return Err(::anyhow::anyhow!($err).into())
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err(::anyhow::anyhow!($fmt, $($arg)*).into())
    };
}

/// Errors produced by the router when it cannot resolve or reach a worker.
#[derive(thiserror::Error, Debug)]
pub enum RouterError {
    #[error("worker {0} is not part of this runtime")]
    UnknownWorker(u8),
    #[error("worker {0} reactor has already shut down")]
    WorkerGone(u8),
    #[error("no worker is currently eligible to host a new shared service")]
    NoSharedWorker,
}

/// Errors produced by [`crate::reader::ByteReader`]'s throwing reads.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderError {
    #[error("read past the end of the buffer")]
    Underflow,
}
