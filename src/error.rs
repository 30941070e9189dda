//! Error kinds surfaced by the engine. Per the fail-fast policy, all of these
//! abort the run; there is no retry.

use crate::node_id::NodeId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// A reference bound to a mismatched shape, or a composite reference zipped
    /// against an observer of different arity.
    #[error("binding error: {0}")]
    Binding(String),

    /// Raised from a node's `start_fn`.
    #[error("start error in node {node}: {source}")]
    Start {
        node: NodeId,
        #[source]
        source: anyhow::Error,
    },

    /// Raised from a node's `eval_fn`.
    #[error("eval error in node {node}: {source}")]
    Eval {
        node: NodeId,
        #[source]
        source: anyhow::Error,
    },

    /// A push source's sender was called after `stop`.
    #[error("enqueue on stopped push source {0}")]
    EnqueueOnStopped(NodeId),

    /// Deleting a key from a [`crate::ts::dict::TsdOutput`] that isn't present.
    #[error("key error: key not present in dict output of node {0}")]
    KeyError(NodeId),
}
