//! REF<T>: a value that names a binding rather than holding data directly.
//!
//! A reference is itself an ordinary scalar time-series — `Reference<T>` is
//! just the value type it carries — but receiving a new one means rewiring
//! which output a target input reads from, recursively for composite
//! references (§4.6). This mirrors how the source's `TimeSeriesReference`
//! distinguishes a direct peer binding from a composite built from several
//! sub-references, and zips a composite against a same-shaped observer.

use super::list::TslInput;
use super::scalar::{OutputHandle, ScalarInput};
use crate::error::{EngineError, Result};

/// The value carried by a REF<T> edge.
#[derive(Clone)]
pub enum Reference<T: Clone + 'static> {
    /// Not bound to anything; a consumer sees an invalid input.
    Invalid,
    /// A direct binding to a single producer's output.
    Peer(OutputHandle<T>),
    /// A binding built by zipping several sub-references together, e.g. one
    /// per element of a [`super::list::TslOutput`].
    Composite(Vec<Reference<T>>),
}

impl<T: Clone + 'static> Reference<T> {
    pub fn peer(output: OutputHandle<T>) -> Self {
        Reference::Peer(output)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Reference::Invalid)
    }
}

impl<T: Clone + 'static> Default for Reference<T> {
    fn default() -> Self {
        Reference::Invalid
    }
}

/// Rewire `target` to follow `reference`. Per the source's un-bind rule, the
/// target's sample time afterwards is whatever `ScalarInput::bind`/`unbind`
/// already produce: the bound output's own clock if it's a peer, or
/// untouched (falls back to MIN_DT) if now invalid.
pub fn bind_scalar_input<T: Clone + 'static>(
    reference: &Reference<T>,
    target: &mut ScalarInput<T>,
) -> Result<()> {
    match reference {
        Reference::Invalid => {
            target.unbind();
            Ok(())
        }
        Reference::Peer(output) => {
            target.bind(output.clone());
            Ok(())
        }
        Reference::Composite(_) => Err(EngineError::Binding(
            "a composite reference cannot bind a scalar input".to_string(),
        )),
    }
}

/// Recursively zip `reference` against a list-shaped `target`: a composite
/// reference rebinds each element in turn, a peer reference only binds if
/// `target` has exactly one element, and an invalid reference un-binds
/// everything.
pub fn bind_list_input<T: Clone + 'static>(
    reference: &Reference<T>,
    target: &mut TslInput<T>,
) -> Result<()> {
    match reference {
        Reference::Invalid => {
            for i in 0..target.len() {
                target.unbind(i);
            }
            Ok(())
        }
        Reference::Peer(output) => {
            if target.len() != 1 {
                return Err(EngineError::Binding(format!(
                    "peer reference cannot bind a list input of arity {}",
                    target.len()
                )));
            }
            target.bind(0, output.clone());
            Ok(())
        }
        Reference::Composite(children) => {
            if children.len() != target.len() {
                return Err(EngineError::Binding(format!(
                    "composite reference of arity {} cannot bind a list input of arity {}",
                    children.len(),
                    target.len()
                )));
            }
            for (i, child) in children.iter().enumerate() {
                match child {
                    Reference::Invalid => target.unbind(i),
                    Reference::Peer(output) => target.bind(i, output.clone()),
                    Reference::Composite(_) => {
                        return Err(EngineError::Binding(
                            "nested composite references are not supported".to_string(),
                        ));
                    }
                }
            }
            Ok(())
        }
    }
}
