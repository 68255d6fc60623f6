//! Tagged transport and wire encoding used by the exchange rounds.

pub mod transport;
pub mod wire;

pub use transport::{LocalCluster, LocalTransport, NoTransport, Transport};
