//! [`NodeId`]: the path-addressed identity of a node.

use smallvec::SmallVec;
use std::fmt;

/// Path from the root graph down to a node: `(p1, .., pn, ndx)`. The empty path
/// identifies the root graph itself; the last element is the node's index within
/// its immediately owning graph.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(SmallVec<[usize; 4]>);

impl NodeId {
    /// The id of the root graph: an empty path.
    pub const ROOT: NodeId = NodeId(SmallVec::new_const());

    pub fn child(&self, ndx: usize) -> NodeId {
        let mut path = self.0.clone();
        path.push(ndx);
        NodeId(path)
    }

    /// The node's index within its immediately owning graph, i.e. the last path
    /// element. Panics on the root graph id, which owns no node.
    pub fn local_index(&self) -> usize {
        *self.0.last().expect("NodeId::ROOT has no local index")
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn path(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ")")
    }
}
