//! The node lifecycle contract (§4.2): `initialise` happens at construction,
//! then the graph drives `start` → repeated `cycle` → `stop`.

use crate::context::EngineContext;
use crate::error::Result;
use crate::node_id::NodeId;
use derive_new::new;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// What role a node plays in scheduling: sources are always eligible to run
/// regardless of input state (they have none, or don't gate on it), sinks
/// never produce downstream output, computes do both.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeKind {
    PushSource,
    PullSource,
    Compute,
    Sink,
}

/// Static description of a node, used for diagnostics and by the external
/// wiring layer; the engine itself gates evaluation through
/// [`MutableNode::inputs_valid`] and [`MutableNode::inputs_modified`] rather
/// than re-deriving behaviour from this at runtime.
#[derive(new, Clone, Debug)]
pub struct NodeSignature {
    pub kind: NodeKind,
    pub label: String,
}

/// The graph's upstream wiring declaration for a node: active upstreams wake
/// this node when they tick, passive upstreams are readable but don't.
#[derive(new, Default)]
pub struct UpStreams {
    pub active: Vec<Rc<dyn Node>>,
    pub passive: Vec<Rc<dyn Node>>,
}

impl UpStreams {
    pub fn none() -> UpStreams {
        UpStreams::default()
    }
}

/// Implement this to build a node. `cycle` is only ever invoked by the graph
/// when the gating in `inputs_valid`/`inputs_modified` (or an explicit
/// schedule) says this node is due.
pub trait MutableNode {
    /// Evaluate the node, returning whether it produced (ticked) output.
    /// Implementations read inputs and call `set` on their own outputs;
    /// output writes notify subscribers by calling
    /// [`EngineContext::mark_dirty`] directly, so the return value here is
    /// only used for `EngineContext::ticked` bookkeeping.
    fn cycle(&mut self, ctx: &mut EngineContext) -> Result<bool>;

    fn upstreams(&self) -> UpStreams {
        UpStreams::none()
    }

    fn initialise(&mut self, _ctx: &mut EngineContext) -> Result<()> {
        Ok(())
    }

    fn start(&mut self, _ctx: &mut EngineContext) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self, _ctx: &mut EngineContext) -> Result<()> {
        Ok(())
    }

    fn signature(&self) -> NodeSignature;

    fn type_name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// Object-safe wrapper over [`MutableNode`], implemented for `RefCell<N>` so
/// a node can be shared as `Rc<dyn Node>` while still being mutated through
/// `&self` by the graph.
pub trait Node {
    fn cycle(&self, ctx: &mut EngineContext) -> Result<bool>;
    fn upstreams(&self) -> UpStreams;
    fn initialise(&self, ctx: &mut EngineContext) -> Result<()>;
    fn start(&self, ctx: &mut EngineContext) -> Result<()>;
    fn stop(&self, ctx: &mut EngineContext) -> Result<()>;
    fn signature(&self) -> NodeSignature;
    fn type_name(&self) -> String;
}

impl<N: MutableNode> Node for RefCell<N> {
    fn cycle(&self, ctx: &mut EngineContext) -> Result<bool> {
        self.borrow_mut().cycle(ctx)
    }
    fn upstreams(&self) -> UpStreams {
        self.borrow().upstreams()
    }
    fn initialise(&self, ctx: &mut EngineContext) -> Result<()> {
        self.borrow_mut().initialise(ctx)
    }
    fn start(&self, ctx: &mut EngineContext) -> Result<()> {
        self.borrow_mut().start(ctx)
    }
    fn stop(&self, ctx: &mut EngineContext) -> Result<()> {
        self.borrow_mut().stop(ctx)
    }
    fn signature(&self) -> NodeSignature {
        self.borrow().signature()
    }
    fn type_name(&self) -> String {
        self.borrow().type_name()
    }
}

impl fmt::Display for dyn Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{:?}]", self.type_name(), self.signature().kind)
    }
}

/// Wraps a concrete [`MutableNode`] for storage in a graph.
pub trait IntoNode {
    fn into_node(self) -> Rc<dyn Node>;
}

impl<N: MutableNode + 'static> IntoNode for N {
    fn into_node(self) -> Rc<dyn Node> {
        Rc::new(RefCell::new(self))
    }
}

/// Identifies a node within its owning graph; kept alongside the `Rc<dyn
/// Node>` itself so diagnostics and errors can reference a stable id rather
/// than a vector index that could be confused with another graph's.
#[derive(Clone, Debug)]
pub struct NodeHandle {
    pub id: NodeId,
    pub node: Rc<dyn Node>,
}
