//! [`Graph`]: owns the node set, wires it once at construction time (§4.7),
//! and drives per-instant evaluation in rank order.

use crate::context::EngineContext;
use crate::error::{EngineError, Result};
use crate::node::Node;
use crate::node_id::NodeId;
use crate::queue::HashByRef;
use crate::time::Time;
use log::debug;
use std::collections::HashMap;
use std::rc::Rc;

struct NodeEntry {
    id: NodeId,
    node: Rc<dyn Node>,
    rank: usize,
}

/// A wired, runnable instance of a node graph. Built once via
/// [`Graph::wire`] from a set of root nodes; the node set and their ranks are
/// fixed for the lifetime of the graph even though the value routing between
/// them (reference bindings, dict children) can change while it runs.
pub struct Graph {
    nodes: Vec<NodeEntry>,
    by_identity: HashMap<HashByRef<dyn Node>, usize>,
    ctx: EngineContext,
}

impl Graph {
    pub fn wire(root_nodes: Vec<Rc<dyn Node>>, ctx: EngineContext) -> Self {
        let mut graph = Graph {
            nodes: Vec::new(),
            by_identity: HashMap::new(),
            ctx,
        };
        for root in root_nodes {
            graph.wire_node(&root);
        }
        let ranks = graph.nodes.iter().map(|n| n.rank).collect();
        graph.ctx.register_nodes(ranks);
        debug!("wired {} nodes", graph.nodes.len());
        graph
    }

    fn seen(&self, node: &Rc<dyn Node>) -> Option<usize> {
        self.by_identity.get(&HashByRef::new(node.clone())).copied()
    }

    fn wire_node(&mut self, node: &Rc<dyn Node>) -> usize {
        if let Some(ix) = self.seen(node) {
            return ix;
        }
        let upstreams = node.upstreams();
        let mut rank = match node.signature().kind {
            crate::node::NodeKind::PushSource => 0,
            crate::node::NodeKind::PullSource => 1,
            _ => 0,
        };
        for up in upstreams.active.iter().chain(upstreams.passive.iter()) {
            let up_ix = self.wire_node(up);
            rank = rank.max(self.nodes[up_ix].rank + 1);
        }
        if node.signature().kind == crate::node::NodeKind::Sink {
            rank = rank.max(1);
        }
        let index = self.nodes.len();
        let id = NodeId::ROOT.child(index);
        self.by_identity.insert(HashByRef::new(node.clone()), index);
        self.nodes.push(NodeEntry {
            id,
            node: node.clone(),
            rank,
        });
        index
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn ctx(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn ctx_mut(&mut self) -> &mut EngineContext {
        &mut self.ctx
    }

    pub fn initialise(&mut self) -> Result<()> {
        self.for_each_node(|node, ctx| node.initialise(ctx))
    }

    pub fn start(&mut self) -> Result<()> {
        self.for_each_node(|node, ctx| node.start(ctx))
    }

    pub fn stop(&mut self) -> Result<()> {
        self.for_each_node(|node, ctx| node.stop(ctx))
    }

    fn for_each_node(
        &mut self,
        f: impl Fn(&Rc<dyn Node>, &mut EngineContext) -> Result<()>,
    ) -> Result<()> {
        for ix in 0..self.nodes.len() {
            self.ctx.set_current_node(Some(ix));
            let node = self.nodes[ix].node.clone();
            let result = f(&node, &mut self.ctx).map_err(|e| self.wrap(ix, e));
            self.ctx.set_current_node(None);
            result?;
        }
        Ok(())
    }

    fn wrap(&self, ix: usize, err: EngineError) -> EngineError {
        match err {
            EngineError::Start { source, .. } => EngineError::Start {
                node: self.nodes[ix].id.clone(),
                source,
            },
            EngineError::Eval { source, .. } => EngineError::Eval {
                node: self.nodes[ix].id.clone(),
                source,
            },
            other => other,
        }
    }

    /// Schedule `node_index` to be cycled at or after `when`, tagged `tag`.
    /// Exposed for the external wiring layer; nodes themselves call
    /// [`EngineContext::schedule_self`] from inside `start`/`eval`.
    pub fn schedule(&mut self, node_index: usize, tag: &str, when: Time) {
        self.ctx.schedule_node(node_index, tag, when);
    }

    pub(crate) fn next_scheduled_time(&self) -> Option<Time> {
        self.ctx.next_scheduled_time()
    }

    pub(crate) fn set_time(&mut self, t: Time) {
        self.ctx.set_time(t);
    }

    pub(crate) fn set_last_cycle(&mut self, last: bool) {
        self.ctx.set_last_cycle(last);
    }

    /// Wake every node due at or before the current time, queuing them into
    /// the rank-ordered ready set.
    pub(crate) fn process_due_wakeups(&mut self) -> bool {
        let due = self.ctx.drain_due(self.ctx.time());
        let progressed = !due.is_empty();
        for ix in due {
            self.ctx.mark_dirty(ix);
        }
        progressed
    }

    /// Drain the rank-ordered ready set, cycling each due node exactly once,
    /// and run any after-evaluation callbacks nodes registered along the way.
    pub fn cycle(&mut self) -> Result<()> {
        for rank in 0..self.ctx.dirty_ranks() {
            let ready = self.ctx.take_rank(rank);
            for ix in ready {
                self.cycle_node(ix)?;
            }
        }
        self.ctx.run_after_eval();
        self.ctx.reset_for_next_instant();
        Ok(())
    }

    fn cycle_node(&mut self, index: usize) -> Result<()> {
        let scheduled = self.ctx.is_scheduled_now(index);
        self.ctx.set_current_node(Some(index));
        let node = self.nodes[index].node.clone();
        let ticked = node
            .cycle(&mut self.ctx)
            .map_err(|e| self.wrap(index, e))?;
        self.ctx.set_current_node(None);
        if scheduled {
            if let Some(next) = self.ctx.advance_scheduler(index) {
                self.ctx.requeue_pending(index, next);
            }
        }
        if ticked {
            self.ctx.set_ticked(index);
        }
        Ok(())
    }
}
