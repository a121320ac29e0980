//! Circuit breaking for fragile dependencies.

mod circuit;
mod registry;
mod state;

pub use circuit::{BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig};
pub use registry::BreakerRegistry;
pub use state::CircuitState;
