//! A reactive time-series dataflow engine.
//!
//! A wiring phase builds a static graph of nodes whose edges carry typed,
//! time-stamped streams; the engine then advances a logical clock, evaluates
//! nodes that become ready at each instant in rank order, and propagates
//! changes along edges. Streams come in six shapes: scalar ([`ts::scalar`]),
//! fixed-named bundle ([`ts::bundle`]), fixed-length list ([`ts::list`]),
//! mutable set ([`ts::set`]), dynamic dict ([`ts::dict`]) and reference
//! ([`ts::reference`]).
//!
//! ```
//! use reactgraph::*;
//! use reactgraph::ts::scalar::{OutputHandle, ScalarInput};
//!
//! struct Doubler {
//!     input: ScalarInput<i32>,
//!     output: OutputHandle<i32>,
//! }
//!
//! impl MutableNode for Doubler {
//!     fn cycle(&mut self, ctx: &mut EngineContext) -> Result<bool> {
//!         let v = self.input.value();
//!         self.output.borrow_mut().set(v * 2, ctx);
//!         Ok(true)
//!     }
//!     fn signature(&self) -> NodeSignature {
//!         NodeSignature::new(NodeKind::Compute, "Doubler".to_string())
//!     }
//! }
//! ```

pub mod builder;
pub mod context;
pub mod engine;
pub mod error;
pub mod graph;
pub mod node;
pub mod node_id;
pub mod scheduler;
pub mod sources;
pub mod ts;

mod queue;
#[cfg(test)]
mod scenarios;
mod time;

pub use context::{EngineContext, RunFor, RunMode};
pub use builder::{run_graph, Edge, GraphBuilder, NodeBuilder};
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use graph::Graph;
pub use node::{IntoNode, MutableNode, Node, NodeHandle, NodeKind, NodeSignature, UpStreams};
pub use node_id::NodeId;
pub use scheduler::{NodeScheduler, UNTAGGED};
pub use time::Time;
