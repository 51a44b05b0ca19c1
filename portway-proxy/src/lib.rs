//! The Proxy Handler and Composite Orchestrator (`spec.md` §4.F, §4.G).

pub mod client;
pub mod composite;
pub mod error;
pub mod handler;
pub mod headers;
mod query_rewrite;
pub mod template;

pub use client::build_client;
pub use composite::{execute as execute_composite, CompositeOutcome, StepInvoker, StepResult};
pub use error::ProxyError;
pub use handler::{forward, ForwardRequest};
pub use headers::strip_hop_by_hop;
