//! Request dispatch and upstream forwarding.
//!
//! Provides the route table, the per-node Forwarder, the fleet-wide
//! status Aggregator and the Gateway that ties them into one handler
//! producing JSON envelopes.

mod aggregator;
mod cors;
mod envelope;
mod gateway;
mod router;
mod upstream;

pub use cors::{AllowedOrigins, CorsPolicy};
pub use gateway::Gateway;
pub use upstream::{Forwarder, DEFAULT_TIMEOUT};
