// Reverse-mode backward traversal with additive gradient accumulation.

use super::forward::gather_views;
use super::Graph;
use crate::buffer::{ArrayView, TensorBuffer};
use crate::error::NeuroGradError;
use crate::variable::VariableId;
use std::cell::{Ref, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

impl Graph {
    /// Computes gradients of `target` with respect to every grad-needing
    /// ancestor, accumulating additively into each variable's grad plane.
    ///
    /// `seed` is the initial gradient on `target`; it defaults to ones of
    /// the target's shape. If the target does not need grad (e.g. the graph
    /// was built under `no_grad`), this is a logged no-op.
    ///
    /// Functions are visited in reverse topological order, so every
    /// consumer's contribution to a variable has been accumulated before the
    /// variable's producer runs; diamond fan-in never sees a partial
    /// gradient. Within one call the first write to an intermediate variable
    /// replaces whatever a previous call left there, while leaf gradients
    /// always accumulate across calls. Use `zero_grad` between training
    /// steps.
    pub fn backward(
        &self,
        target: VariableId,
        seed: Option<&[f32]>,
    ) -> Result<(), NeuroGradError> {
        if !self.vars[target.0].need_grad {
            log::debug!("backward: target {:?} does not need grad; no-op", target);
            return Ok(());
        }

        // Variables whose grad plane has been written during this call.
        // The first write of the call replaces stale content on non-leaves;
        // later writes (fan-in) accumulate.
        let mut written: HashSet<usize> = HashSet::new();

        {
            let mut buf = self.vars[target.0].buffer.borrow_mut();
            let numel = buf.numel();
            buf.clear_grad();
            match seed {
                Some(s) => {
                    if s.len() != numel {
                        return Err(NeuroGradError::ShapeMismatch {
                            expected: buf.shape().to_vec(),
                            actual: vec![s.len()],
                            operation: "backward seed".to_string(),
                        });
                    }
                    buf.accumulate_grad(s)?;
                }
                None => {
                    let ones = vec![1.0f32; numel];
                    buf.accumulate_grad(&ones)?;
                }
            }
            written.insert(target.0);
        }

        let plan = self.topo_plan(target);
        log::debug!(
            "backward: target {:?}, {} function(s) to visit",
            target,
            plan.len()
        );

        for fid in plan.iter().rev() {
            let func = &self.funcs[fid.0];
            let op_name = func.op.name();

            let propagate: Vec<bool> = func
                .inputs
                .iter()
                .map(|&i| self.vars[i.0].need_grad)
                .collect();
            if !propagate.iter().any(|&p| p) {
                log::trace!("backward: skipping {:?} ({}), no grad-needing input", fid, op_name);
                continue;
            }

            // No gradient flowed into any output: this branch contributes
            // nothing (its outputs only feed paths outside the target).
            if !func
                .outputs
                .iter()
                .any(|&o| self.vars[o.0].buffer.borrow().has_grad())
            {
                log::trace!("backward: skipping {:?} ({}), no output gradient", fid, op_name);
                continue;
            }

            // Output gradients, owned; outputs that received no gradient
            // (e.g. unused outputs of a multi-output function) are zeros.
            let mut og_shapes: Vec<Vec<usize>> = Vec::with_capacity(func.outputs.len());
            let mut og_data: Vec<Vec<f32>> = Vec::with_capacity(func.outputs.len());
            for &out in &func.outputs {
                let buf = self.vars[out.0].buffer.borrow();
                og_shapes.push(buf.shape().to_vec());
                if buf.has_grad() {
                    og_data.push(buf.grad_f32()?.to_vec());
                } else {
                    og_data.push(vec![0.0f32; buf.numel()]);
                }
            }

            let input_grads = {
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
                let out_guards: Vec<Ref<'_, TensorBuffer>> =
                    out_bufs.iter().map(|b| b.borrow()).collect();
                let in_views = gather_views(&in_guards, op_name, "input")?;
                let out_views = gather_views(&out_guards, op_name, "output")?;
                let og_views: Vec<ArrayView<'_>> = og_shapes
                    .iter()
                    .zip(og_data.iter())
                    .map(|(shape, data)| ArrayView { shape, data })
                    .collect();

                log::trace!("backward: visiting {:?} ({})", fid, op_name);
                // NotImplemented from a gradient-less operator propagates
                // unchanged; it is never substituted with zeros.
                func.op
                    .backward(&in_views, &out_views, &og_views, &propagate)?
            };

            if input_grads.len() != func.inputs.len() {
                return Err(NeuroGradError::InternalError(format!(
                    "{} returned {} input gradients, expected {}",
                    op_name,
                    input_grads.len(),
                    func.inputs.len()
                )));
            }

            for (i, grad) in input_grads.into_iter().enumerate() {
                // need_grad == false slots never receive accumulation, even
                // if the operator produced a value for them.
                if !propagate[i] {
                    continue;
                }
                if let Some(g) = grad {
                    let vid = func.inputs[i].0;
                    let first_write = written.insert(vid);
                    let mut buf = self.vars[vid].buffer.borrow_mut();
                    if first_write && !self.vars[vid].is_leaf() {
                        buf.clear_grad();
                    }
                    buf.accumulate_grad(&g)
                        .map_err(|e| match e {
                            NeuroGradError::ShapeMismatch { expected, actual, .. } => {
                                NeuroGradError::ShapeMismatch {
                                    expected,
                                    actual,
                                    operation: format!("{} backward, input {}", op_name, i),
                                }
                            }
                            other => other,
                        })?;
                }
            }
        }
        Ok(())
    }
}
