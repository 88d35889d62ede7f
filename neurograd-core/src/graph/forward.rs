// Forward execution: topological evaluation with optional buffer clearing.

use super::Graph;
use crate::buffer::{ArrayView, ArrayViewMut, TensorBuffer};
use crate::error::NeuroGradError;
use crate::function::FunctionId;
use crate::variable::VariableId;
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

impl Graph {
    /// Evaluates the graph up to `target`, executing each ancestor function
    /// exactly once in topological order. Leaves must be pre-populated;
    /// reading an unpopulated leaf fails with `UseAfterClear`.
    ///
    /// With `clear_no_need_grad`, intermediate data buffers whose
    /// `need_grad` is false are released as soon as their last consumer in
    /// the plan has read them, bounding peak memory. A buffer is never
    /// cleared while any consumer still needs it — including consumers that
    /// will need its value again during backward.
    pub fn forward(
        &self,
        target: VariableId,
        clear_no_need_grad: bool,
    ) -> Result<(), NeuroGradError> {
        let plan = self.topo_plan(target);
        log::debug!(
            "forward: target {:?}, {} function(s) to execute",
            target,
            plan.len()
        );

        // Pending reads per variable, counted across the plan only.
        let mut remaining: HashMap<usize, usize> = HashMap::new();
        if clear_no_need_grad {
            for fid in &plan {
                for input in &self.funcs[fid.0].inputs {
                    *remaining.entry(input.0).or_insert(0) += 1;
                }
            }
        }

        for fid in plan {
            self.execute_function(fid)?;
            if !clear_no_need_grad {
                continue;
            }
            for &input in &self.funcs[fid.0].inputs {
                let count = remaining
                    .get_mut(&input.0)
                    .ok_or_else(|| {
                        NeuroGradError::InternalError(
                            "forward: consumer count missing".to_string(),
                        )
                    })?;
                *count -= 1;
                if *count == 0 && self.clearable(input, target) {
                    log::trace!("forward: clearing data of {:?}", input);
                    self.vars[input.0].buffer.borrow_mut().clear_data();
                }
            }
        }
        Ok(())
    }

    /// Whether a variable's data plane may be released after its last
    /// forward consumer has read it.
    fn clearable(&self, id: VariableId, target: VariableId) -> bool {
        let node = &self.vars[id.0];
        if node.need_grad || node.persistent || node.is_leaf() || id == target {
            return false;
        }
        // The value may still be required to compute gradients: any consumer
        // with a grad-needing input will be visited during backward and
        // reads its input data there.
        !self.funcs.iter().any(|f| {
            f.inputs.contains(&id)
                && f.inputs.iter().any(|&i| self.vars[i.0].need_grad)
        })
    }

    /// Executes a single function: infers and installs output shapes, then
    /// runs the operator kernel over the buffers.
    pub(crate) fn execute_function(&self, fid: FunctionId) -> Result<(), NeuroGradError> {
        let func = &self.funcs[fid.0];
        let op_name = func.op.name();

        let in_bufs: Vec<Rc<RefCell<TensorBuffer>>> = func
            .inputs
            .iter()
            .map(|&id| Rc::clone(&self.vars[id.0].buffer))
            .collect();
        let out_bufs: Vec<Rc<RefCell<TensorBuffer>>> = func
            .outputs
            .iter()
            .map(|&id| Rc::clone(&self.vars[id.0].buffer))
            .collect();

        let in_guards: Vec<Ref<'_, TensorBuffer>> =
            in_bufs.iter().map(|b| b.borrow()).collect();

        // Lazy shape checking happens here, not at apply time.
        let in_shapes: Vec<&[usize]> = in_guards.iter().map(|g| g.shape()).collect();
        let out_shapes = func.op.infer_output_shapes(&in_shapes)?;
        if out_shapes.len() != out_bufs.len() {
            return Err(NeuroGradError::InternalError(format!(
                "{} declared {} outputs but inferred {} shapes",
                op_name,
                out_bufs.len(),
                out_shapes.len()
            )));
        }
        for (buf, shape) in out_bufs.iter().zip(out_shapes) {
            buf.borrow_mut().reshape(shape);
        }

        let in_views = gather_views(&in_guards, op_name, "input")?;

        let mut out_guards: Vec<RefMut<'_, TensorBuffer>> =
            out_bufs.iter().map(|b| b.borrow_mut()).collect();
        let mut out_views: Vec<ArrayViewMut<'_>> = out_guards
            .iter_mut()
            .map(|g| g.view_mut())
            .collect::<Result<_, _>>()?;

        log::trace!("forward: executing {:?} ({})", fid, op_name);
        func.op.forward(&in_views, &mut out_views)
    }
}

/// Builds read views over buffers, enriching `UseAfterClear` with the
/// consuming operator and slot for diagnosable errors.
pub(crate) fn gather_views<'a>(
    guards: &'a [Ref<'a, TensorBuffer>],
    op_name: &str,
    role: &str,
) -> Result<Vec<ArrayView<'a>>, NeuroGradError> {
    guards
        .iter()
        .enumerate()
        .map(|(i, g)| {
            g.view().map_err(|e| match e {
                NeuroGradError::UseAfterClear { .. } => NeuroGradError::UseAfterClear {
                    what: format!("{} {} of {}", role, i, op_name),
                },
                other => other,
            })
        })
        .collect()
}
