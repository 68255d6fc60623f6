//! `PartitionError`: unified error type for the partition build.
//!
//! Every failure during construction is fatal (there is no
//! consistent-subgraph fallback), so each variant carries enough context
//! (host id, phase counter) to identify where a distributed build died.
//! Invariant checks are part of the contract and run in release builds.

use thiserror::Error;

/// Errors raised while building or persisting a cartesian partition.
#[derive(Debug, Error)]
pub enum PartitionError {
    /// The buffered reader or the persistence stream failed.
    #[error("host {host} (phase {phase}): i/o failure: {source}")]
    Io {
        host: usize,
        phase: u32,
        #[source]
        source: std::io::Error,
    },

    /// A structural invariant of the partition was violated: a source
    /// expected to be owned was not, a global id appeared twice in the
    /// local index, or a prefix-sum/slot-size mismatch.
    #[error("host {host} (phase {phase}): partition invariant violated: {detail}")]
    Invariant {
        host: usize,
        phase: u32,
        detail: String,
    },

    /// A received buffer is inconsistent with this exchange round: wrong
    /// sender for the round, or a truncated/malformed payload.
    #[error("host {host} (phase {phase}): protocol mismatch: {detail}")]
    Protocol {
        host: usize,
        phase: u32,
        detail: String,
    },

    /// Bad construction parameters: zero scale-factor sum, zero decompose
    /// factor, missing or truncated graph file.
    #[error("invalid partition configuration: {0}")]
    Config(String),
}

impl PartitionError {
    pub(crate) fn io(host: usize, phase: u32, source: std::io::Error) -> Self {
        PartitionError::Io {
            host,
            phase,
            source,
        }
    }

    pub(crate) fn invariant(host: usize, phase: u32, detail: impl Into<String>) -> Self {
        PartitionError::Invariant {
            host,
            phase,
            detail: detail.into(),
        }
    }

    pub(crate) fn protocol(host: usize, phase: u32, detail: impl Into<String>) -> Self {
        PartitionError::Protocol {
            host,
            phase,
            detail: detail.into(),
        }
    }
}
