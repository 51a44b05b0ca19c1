//! Shared primitives used across every Portway crate: the error taxonomy,
//! the response envelope shapes, correlation ids and the blocking threadpool
//! helper for CPU-bound work (PBKDF2, SQL driver calls) that must not stall
//! the async reactor.

pub mod blocking;
pub mod correlation;
pub mod envelope;
pub mod error;

pub use blocking::{run_on_blocking_threadpool, BlockingThreadpool};
pub use correlation::CorrelationId;
pub use envelope::{ListEnvelope, MutationEnvelope};
pub use error::{ErrorKind, PortwayError, ReportableError};

/// Header under which the correlation id is echoed back to the caller.
pub static X_CORRELATION_ID: &str = "x-correlation-id";

#[macro_export]
macro_rules! from_error {
    ($from:ty, $to:ty, $to_kind:expr) => {
        impl From<$from> for $to {
            fn from(inner: $from) -> $to {
                $to_kind(inner).into()
            }
        }
    };
}
