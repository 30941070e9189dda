//! The external wiring protocol (§6): everything the engine needs from the
//! layer that decides *which* nodes exist and *how* they're connected, kept
//! out of this crate's core. A caller implements [`GraphBuilder`] (backed by
//! whatever materializes nodes and bindings — a DSL, a config file, plain
//! Rust) and hands it to [`run_graph`].

use crate::context::{RunFor, RunMode};
use crate::engine::Engine;
use crate::error::Result;
use crate::graph::Graph;
use crate::node::Node;
use crate::node_id::NodeId;
use std::rc::Rc;

/// One edge in the wiring layer's description of a graph: a path into a
/// source node's output composite, routed to a path into a destination
/// node's input composite. Core itself never walks these; they're the
/// vocabulary a [`GraphBuilder`] implementation uses while constructing a
/// [`Graph`], binding each edge with the typed `bind`/`bind_scalar_input`
/// calls the destination's shape calls for.
#[derive(Clone, Debug)]
pub struct Edge {
    pub src_node: usize,
    pub src_output_path: Vec<String>,
    pub dst_node: usize,
    pub dst_input_path: Vec<String>,
}

/// Constructs a single node. Implemented once per node kind by the wiring
/// layer; `owning_graph_id` lets a nested sub-graph's nodes get a `NodeId`
/// path rooted under their parent rather than the top-level graph.
pub trait NodeBuilder {
    fn make_instance(&self, owning_graph_id: &NodeId) -> Rc<dyn Node>;

    /// Optional teardown run after a node is no longer needed, e.g. a
    /// dict-valued sub-graph whose key was removed.
    fn release_instance(&self, _node: &Rc<dyn Node>) {}
}

/// Produces a fully wired [`Graph`]: every node built, every edge bound.
/// Core only ever sees the result; it never constructs nodes itself.
pub trait GraphBuilder {
    fn make_instance(&self, owning_graph_id: &NodeId) -> Graph;
}

/// Build and run a graph to completion. This is the entire surface the
/// outside world needs: build once, run until `run_for` says stop, propagate
/// the first fatal error.
pub fn run_graph(
    builder: &dyn GraphBuilder,
    run_mode: RunMode,
    run_for: RunFor,
) -> Result<()> {
    let graph = builder.make_instance(&NodeId::ROOT);
    let mut engine = Engine::from_graph(graph, run_for);
    engine.run()
}
