// The graph executor: an arena of Variable and Function nodes, topological
// forward evaluation and reverse-mode backward traversal.

mod backward;
mod forward;

use crate::buffer::TensorBuffer;
use crate::error::NeuroGradError;
use crate::function::{FunctionId, FunctionNode, Operator};
use crate::types::DType;
use crate::variable::{VariableId, VariableNode};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// A computation graph and its executor.
///
/// Variables and functions live in arenas and are addressed by `Copy`
/// handles (`VariableId`, `FunctionId`); the parent back-references from
/// variables to the functions that produced them never form cycles because
/// a function can only consume variables that already exist. This also means
/// function ids are created in topological order, which the executor relies
/// on when planning traversals.
///
/// Buffers use `Rc<RefCell<_>>` internally: the graph is a single-threaded
/// object and callers must serialize access to it (one graph per worker).
#[derive(Debug, Default)]
pub struct Graph {
    pub(crate) vars: Vec<VariableNode>,
    pub(crate) funcs: Vec<FunctionNode>,
    no_grad: bool,
    auto_forward: bool,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    // --- Variable construction ---

    /// Creates a leaf variable with the given shape. While `no_grad` is
    /// active the requested `need_grad` flag is forced to `false`.
    pub fn variable(&mut self, shape: &[usize], need_grad: bool) -> VariableId {
        self.variable_with_dtype(shape, DType::F32, need_grad)
    }

    /// Creates a leaf variable with an explicit dtype.
    pub fn variable_with_dtype(
        &mut self,
        shape: &[usize],
        dtype: DType,
        need_grad: bool,
    ) -> VariableId {
        let buffer = TensorBuffer::new(shape.to_vec(), dtype);
        self.push_var(VariableNode::leaf(buffer, need_grad && !self.no_grad))
    }

    /// Creates a leaf variable pre-populated with data.
    pub fn variable_from_data(
        &mut self,
        shape: &[usize],
        data: Vec<f32>,
        need_grad: bool,
    ) -> Result<VariableId, NeuroGradError> {
        let id = self.variable(shape, need_grad);
        self.vars[id.0].buffer.borrow_mut().set_data_f32(data)?;
        Ok(id)
    }

    /// Creates a variable sharing `of`'s buffer but detached from the graph
    /// (no parent), with its own `need_grad` flag. Mutating data through
    /// either handle is visible through the other.
    pub fn unlinked(&mut self, of: VariableId, need_grad: bool) -> VariableId {
        let node = self.vars[of.0].unlinked(need_grad && !self.no_grad);
        self.push_var(node)
    }

    fn push_var(&mut self, node: VariableNode) -> VariableId {
        let id = VariableId(self.vars.len());
        self.vars.push(node);
        id
    }

    // --- Function application ---

    /// Binds an operator to concrete inputs, creating its output variables.
    ///
    /// Arity is checked here (it is fixed at construction); shapes are not —
    /// shape errors surface at forward time, mirroring deferred execution.
    /// When `auto_forward` is active the function executes immediately.
    pub fn apply(
        &mut self,
        op: Box<dyn Operator>,
        inputs: &[VariableId],
    ) -> Result<Vec<VariableId>, NeuroGradError> {
        let (n_in, n_out) = op.io_arity();
        if inputs.len() != n_in {
            return Err(NeuroGradError::ArityMismatch {
                expected: n_in,
                actual: inputs.len(),
                operation: op.name().to_string(),
            });
        }
        let need_grad =
            !self.no_grad && inputs.iter().any(|&i| self.vars[i.0].need_grad);
        let fid = FunctionId(self.funcs.len());
        let mut outputs = Vec::with_capacity(n_out);
        for _ in 0..n_out {
            // Output shapes are unknown until forward; a placeholder scalar
            // shape is installed and replaced by shape inference.
            let mut node =
                VariableNode::leaf(TensorBuffer::new(Vec::new(), DType::F32), need_grad);
            node.parent = Some(fid);
            outputs.push(self.push_var(node));
        }
        self.funcs.push(FunctionNode {
            op,
            inputs: inputs.to_vec(),
            outputs: outputs.clone(),
        });
        if self.auto_forward {
            self.execute_function(fid)?;
        }
        Ok(outputs)
    }

    // --- Execution modes ---

    /// Runs `f` with `no_grad` active: every variable created inside has
    /// `need_grad` forced to `false`, so no gradient bookkeeping is built.
    /// The previous flag is restored on every exit path of `f`.
    pub fn no_grad<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let prev = self.no_grad;
        self.no_grad = true;
        let out = f(self);
        self.no_grad = prev;
        out
    }

    /// Runs `f` with `auto_forward` active: every `apply` executes its
    /// forward immediately instead of waiting for an explicit `forward`
    /// call. Purely a scheduling convenience; values are unchanged.
    pub fn auto_forward<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let prev = self.auto_forward;
        self.auto_forward = true;
        let out = f(self);
        self.auto_forward = prev;
        out
    }

    pub fn set_no_grad(&mut self, active: bool) {
        self.no_grad = active;
    }

    pub fn set_auto_forward(&mut self, active: bool) {
        self.auto_forward = active;
    }

    pub fn no_grad_active(&self) -> bool {
        self.no_grad
    }

    pub fn auto_forward_active(&self) -> bool {
        self.auto_forward
    }

    // --- Variable accessors ---

    pub fn shape(&self, id: VariableId) -> Vec<usize> {
        self.vars[id.0].buffer.borrow().shape().to_vec()
    }

    pub fn numel(&self, id: VariableId) -> usize {
        self.vars[id.0].buffer.borrow().numel()
    }

    /// Returns a copy of the variable's data plane.
    pub fn data(&self, id: VariableId) -> Result<Vec<f32>, NeuroGradError> {
        Ok(self.vars[id.0].buffer.borrow().data_f32()?.to_vec())
    }

    pub fn set_data(&self, id: VariableId, data: Vec<f32>) -> Result<(), NeuroGradError> {
        self.vars[id.0].buffer.borrow_mut().set_data_f32(data)
    }

    pub fn data_f64(&self, id: VariableId) -> Result<Vec<f64>, NeuroGradError> {
        Ok(self.vars[id.0].buffer.borrow().data_f64()?.to_vec())
    }

    pub fn set_data_f64(&self, id: VariableId, data: Vec<f64>) -> Result<(), NeuroGradError> {
        self.vars[id.0].buffer.borrow_mut().set_data_f64(data)
    }

    /// Returns a copy of the accumulated gradient, or `None` if no gradient
    /// has been accumulated into this variable.
    pub fn grad(&self, id: VariableId) -> Option<Vec<f32>> {
        let buf = self.vars[id.0].buffer.borrow();
        if buf.has_grad() {
            buf.grad_f32().ok().map(|g| g.to_vec())
        } else {
            None
        }
    }

    /// Resets the gradient of this variable (releases the grad plane).
    pub fn zero_grad(&self, id: VariableId) {
        self.vars[id.0].buffer.borrow_mut().clear_grad();
    }

    /// Releases the variable's data plane.
    pub fn clear_data(&self, id: VariableId) {
        self.vars[id.0].buffer.borrow_mut().clear_data();
    }

    pub fn has_data(&self, id: VariableId) -> bool {
        self.vars[id.0].buffer.borrow().has_data()
    }

    pub fn need_grad(&self, id: VariableId) -> bool {
        self.vars[id.0].need_grad
    }

    pub fn set_need_grad(&mut self, id: VariableId, need_grad: bool) {
        self.vars[id.0].need_grad = need_grad;
    }

    pub fn persistent(&self, id: VariableId) -> bool {
        self.vars[id.0].persistent
    }

    pub fn set_persistent(&mut self, id: VariableId, persistent: bool) {
        self.vars[id.0].persistent = persistent;
    }

    /// The function that produced this variable, or `None` for a leaf.
    pub fn parent(&self, id: VariableId) -> Option<FunctionId> {
        self.vars[id.0].parent
    }

    pub fn is_leaf(&self, id: VariableId) -> bool {
        self.vars[id.0].is_leaf()
    }

    pub fn num_variables(&self) -> usize {
        self.vars.len()
    }

    pub fn num_functions(&self) -> usize {
        self.funcs.len()
    }

    pub(crate) fn buffer_rc(&self, id: VariableId) -> Rc<RefCell<TensorBuffer>> {
        Rc::clone(&self.vars[id.0].buffer)
    }

    // --- Traversal planning ---

    /// Ancestor functions of `target` in topological order.
    ///
    /// Function ids are assigned in creation order and a function can only
    /// consume already-existing variables, so sorting the ancestor set by id
    /// yields a valid topological order with each function visited once.
    pub(crate) fn topo_plan(&self, target: VariableId) -> Vec<FunctionId> {
        let mut seen: HashSet<usize> = HashSet::new();
        let mut stack = Vec::new();
        if let Some(root) = self.vars[target.0].parent {
            stack.push(root);
        }
        while let Some(fid) = stack.pop() {
            if !seen.insert(fid.0) {
                continue;
            }
            for &input in &self.funcs[fid.0].inputs {
                if let Some(parent) = self.vars[input.0].parent {
                    stack.push(parent);
                }
            }
        }
        let mut order: Vec<FunctionId> = seen.into_iter().map(FunctionId).collect();
        order.sort_unstable_by_key(|f| f.0);
        order
    }
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod tests;
