// Variable graph nodes. The arena in `Graph` owns the nodes; user code holds
// plain `VariableId` handles, so variables and the functions that produced
// them never form reference cycles.

use crate::buffer::TensorBuffer;
use crate::function::FunctionId;
use std::cell::RefCell;
use std::rc::Rc;

/// Handle to a Variable node in a `Graph` arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariableId(pub(crate) usize);

/// A graph vertex owning a tensor buffer (data + grad planes), gradient
/// bookkeeping flags, and a back-reference to the producing function.
///
/// The buffer is shared through `Rc<RefCell<_>>` so unlinked views of a
/// variable (same storage, detached from the graph, possibly a different
/// `need_grad` flag) can alias it — mirroring how parameters are handed out
/// by the registry with an `as_need_grad` override.
#[derive(Debug)]
pub(crate) struct VariableNode {
    pub(crate) buffer: Rc<RefCell<TensorBuffer>>,
    /// Should gradients accumulate into this node during backward.
    pub(crate) need_grad: bool,
    /// Persistent buffers are never released by `clear_no_need_grad`.
    pub(crate) persistent: bool,
    /// The function that computed this variable, or `None` for a leaf
    /// (input or parameter). At most one parent per variable.
    pub(crate) parent: Option<FunctionId>,
}

impl VariableNode {
    pub(crate) fn leaf(buffer: TensorBuffer, need_grad: bool) -> Self {
        VariableNode {
            buffer: Rc::new(RefCell::new(buffer)),
            need_grad,
            persistent: false,
            parent: None,
        }
    }

    /// A view sharing this node's buffer but detached from the graph.
    pub(crate) fn unlinked(&self, need_grad: bool) -> Self {
        VariableNode {
            buffer: Rc::clone(&self.buffer),
            need_grad,
            persistent: self.persistent,
            parent: None,
        }
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.parent.is_none()
    }
}
