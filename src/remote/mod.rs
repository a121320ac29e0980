//! Remote coordination through hosted database procedures.
//!
//! The remote store (a PostgREST RPC endpoint) is authoritative whenever it
//! answers. When it is absent, failing or returns nothing usable, the local
//! components in [`crate::ratelimit`] and [`crate::breaker`] answer instead.

mod capability;
mod coordinator;
mod rows;
mod transport;

pub use capability::{Capabilities, Capability, CapabilityCell};
pub use coordinator::{
    BreakerEvent, BreakerStatus, RemoteCoordinator, CIRCUIT_BREAKER_PROCEDURE,
    RATE_LIMIT_PROCEDURE,
};
pub use rows::{first_row, BreakerRow, RateLimitRow};
pub use transport::{HttpRpcTransport, RpcReply, RpcTransport};

#[cfg(test)]
pub(crate) use coordinator::tests as testing;
