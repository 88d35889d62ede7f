// neurograd-core/src/ops/math.rs

use super::{apply_single, map_unary};
use crate::buffer::{ArrayView, ArrayViewMut};
use crate::error::NeuroGradError;
use crate::function::{DoubleBackwardGrads, Operator};
use crate::graph::Graph;
use crate::variable::VariableId;

// --- Exp ---

/// Element-wise exponential. Supports double-backward.
pub fn exp(graph: &mut Graph, x: VariableId) -> Result<VariableId, NeuroGradError> {
    apply_single(graph, Box::new(Exp), &[x])
}

#[derive(Debug, Clone)]
pub struct Exp;

impl Operator for Exp {
    fn name(&self) -> &'static str {
        "Exp"
    }

    fn io_arity(&self) -> (usize, usize) {
        (1, 1)
    }

    fn infer_output_shapes(
        &self,
        input_shapes: &[&[usize]],
    ) -> Result<Vec<Vec<usize>>, NeuroGradError> {
        Ok(vec![input_shapes[0].to_vec()])
    }

    fn forward(
        &self,
        inputs: &[ArrayView<'_>],
        outputs: &mut [ArrayViewMut<'_>],
    ) -> Result<(), NeuroGradError> {
        map_unary(inputs[0].data, outputs[0].data, f32::exp);
        Ok(())
    }

    // d exp(x) / dx = exp(x), reusing the forward output.
    fn backward(
        &self,
        _inputs: &[ArrayView<'_>],
        outputs: &[ArrayView<'_>],
        output_grads: &[ArrayView<'_>],
        propagate: &[bool],
    ) -> Result<Vec<Option<Vec<f32>>>, NeuroGradError> {
        let y = outputs[0].data;
        let g = output_grads[0].data;
        Ok(vec![propagate[0]
            .then(|| g.iter().zip(y.iter()).map(|(&gv, &yv)| gv * yv).collect())])
    }

    fn has_double_backward(&self) -> bool {
        true
    }

    // backward produces gx = gy * exp(x); against seed h:
    //   d/dx = h * gy * exp(x),  d/dgy = h * exp(x)
    fn double_backward(
        &self,
        inputs: &[ArrayView<'_>],
        output_grads: &[ArrayView<'_>],
        grad_grads: &[Option<ArrayView<'_>>],
        propagate: &[bool],
    ) -> Result<DoubleBackwardGrads, NeuroGradError> {
        let x = inputs[0].data;
        let gy = output_grads[0].data;
        let h = grad_grads[0].as_ref().map(|v| v.data);

        let wrt_x = propagate[0].then(|| {
            (0..x.len())
                .map(|i| h.map_or(0.0, |h| h[i] * gy[i] * x[i].exp()))
                .collect()
        });
        let wrt_gy = (0..gy.len())
            .map(|i| h.map_or(0.0, |h| h[i] * x[i].exp()))
            .collect();

        Ok(DoubleBackwardGrads {
            wrt_inputs: vec![wrt_x],
            wrt_output_grads: vec![Some(wrt_gy)],
        })
    }
}

// --- Log ---

/// Element-wise natural logarithm. Fails with `DomainError` on non-positive
/// input values (not masked; visible failure over silent NaN).
pub fn log(graph: &mut Graph, x: VariableId) -> Result<VariableId, NeuroGradError> {
    apply_single(graph, Box::new(Log), &[x])
}

#[derive(Debug, Clone)]
pub struct Log;

impl Operator for Log {
    fn name(&self) -> &'static str {
        "Log"
    }

    fn io_arity(&self) -> (usize, usize) {
        (1, 1)
    }

    fn infer_output_shapes(
        &self,
        input_shapes: &[&[usize]],
    ) -> Result<Vec<Vec<usize>>, NeuroGradError> {
        Ok(vec![input_shapes[0].to_vec()])
    }

    fn forward(
        &self,
        inputs: &[ArrayView<'_>],
        outputs: &mut [ArrayViewMut<'_>],
    ) -> Result<(), NeuroGradError> {
        if let Some(&bad) = inputs[0].data.iter().find(|&&x| x <= 0.0) {
            return Err(NeuroGradError::DomainError {
                operation: self.name().to_string(),
                message: format!("log of non-positive value {}", bad),
            });
        }
        map_unary(inputs[0].data, outputs[0].data, f32::ln);
        Ok(())
    }

    fn backward(
        &self,
        inputs: &[ArrayView<'_>],
        _outputs: &[ArrayView<'_>],
        output_grads: &[ArrayView<'_>],
        propagate: &[bool],
    ) -> Result<Vec<Option<Vec<f32>>>, NeuroGradError> {
        let x = inputs[0].data;
        let g = output_grads[0].data;
        Ok(vec![propagate[0]
            .then(|| g.iter().zip(x.iter()).map(|(&gv, &xv)| gv / xv).collect())])
    }
}

// --- Sin ---

/// Element-wise sine. Supports double-backward.
pub fn sin(graph: &mut Graph, x: VariableId) -> Result<VariableId, NeuroGradError> {
    apply_single(graph, Box::new(Sin), &[x])
}

#[derive(Debug, Clone)]
pub struct Sin;

impl Operator for Sin {
    fn name(&self) -> &'static str {
        "Sin"
    }

    fn io_arity(&self) -> (usize, usize) {
        (1, 1)
    }

    fn infer_output_shapes(
        &self,
        input_shapes: &[&[usize]],
    ) -> Result<Vec<Vec<usize>>, NeuroGradError> {
        Ok(vec![input_shapes[0].to_vec()])
    }

    fn forward(
        &self,
        inputs: &[ArrayView<'_>],
        outputs: &mut [ArrayViewMut<'_>],
    ) -> Result<(), NeuroGradError> {
        map_unary(inputs[0].data, outputs[0].data, f32::sin);
        Ok(())
    }

    fn backward(
        &self,
        inputs: &[ArrayView<'_>],
        _outputs: &[ArrayView<'_>],
        output_grads: &[ArrayView<'_>],
        propagate: &[bool],
    ) -> Result<Vec<Option<Vec<f32>>>, NeuroGradError> {
        let x = inputs[0].data;
        let g = output_grads[0].data;
        Ok(vec![propagate[0].then(|| {
            g.iter()
                .zip(x.iter())
                .map(|(&gv, &xv)| gv * xv.cos())
                .collect()
        })])
    }

    fn has_double_backward(&self) -> bool {
        true
    }

    // backward produces gx = gy * cos(x); against seed h:
    //   d/dx = -h * gy * sin(x),  d/dgy = h * cos(x)
    fn double_backward(
        &self,
        inputs: &[ArrayView<'_>],
        output_grads: &[ArrayView<'_>],
        grad_grads: &[Option<ArrayView<'_>>],
        propagate: &[bool],
    ) -> Result<DoubleBackwardGrads, NeuroGradError> {
        let x = inputs[0].data;
        let gy = output_grads[0].data;
        let h = grad_grads[0].as_ref().map(|v| v.data);

        let wrt_x = propagate[0].then(|| {
            (0..x.len())
                .map(|i| h.map_or(0.0, |h| -h[i] * gy[i] * x[i].sin()))
                .collect()
        });
        let wrt_gy = (0..gy.len())
            .map(|i| h.map_or(0.0, |h| h[i] * x[i].cos()))
            .collect();

        Ok(DoubleBackwardGrads {
            wrt_inputs: vec![wrt_x],
            wrt_output_grads: vec![Some(wrt_gy)],
        })
    }
}

// --- Floor ---

/// Element-wise floor. Forward-only: its backward is intentionally left
/// unimplemented and requesting it fails with `NotImplemented`.
pub fn floor(graph: &mut Graph, x: VariableId) -> Result<VariableId, NeuroGradError> {
    apply_single(graph, Box::new(Floor), &[x])
}

#[derive(Debug, Clone)]
pub struct Floor;

impl Operator for Floor {
    fn name(&self) -> &'static str {
        "Floor"
    }

    fn io_arity(&self) -> (usize, usize) {
        (1, 1)
    }

    fn infer_output_shapes(
        &self,
        input_shapes: &[&[usize]],
    ) -> Result<Vec<Vec<usize>>, NeuroGradError> {
        Ok(vec![input_shapes[0].to_vec()])
    }

    fn forward(
        &self,
        inputs: &[ArrayView<'_>],
        outputs: &mut [ArrayViewMut<'_>],
    ) -> Result<(), NeuroGradError> {
        map_unary(inputs[0].data, outputs[0].data, f32::floor);
        Ok(())
    }

    // No backward override: the trait default fails with NotImplemented.
}

// --- Tests ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grad_check::{check_double_backward, check_grad};
    use approx::assert_relative_eq;

    #[test]
    fn test_exp_forward() {
        let mut g = Graph::new();
        let x = g.variable_from_data(&[2], vec![0.0, 1.0], false).unwrap();
        let y = exp(&mut g, x).unwrap();
        g.forward(y, false).unwrap();
        let out = g.data(y).unwrap();
        assert_relative_eq!(out[0], 1.0);
        assert_relative_eq!(out[1], std::f32::consts::E);
    }

    #[test]
    fn test_exp_grad_check() {
        check_grad(
            |g, inputs| exp(g, inputs[0]),
            &[(vec![3], vec![-0.5, 0.0, 0.8])],
            1e-3,
            1e-2,
        )
        .unwrap();
    }

    #[test]
    fn test_exp_double_backward_check() {
        check_double_backward(
            &Exp,
            &[(vec![3], vec![-0.4, 0.2, 0.9])],
            &[(vec![3], vec![1.0, -0.5, 2.0])],
            1e-3,
            1e-2,
        )
        .unwrap();
    }

    #[test]
    fn test_log_grad_check() {
        check_grad(
            |g, inputs| log(g, inputs[0]),
            &[(vec![3], vec![0.5, 1.0, 2.5])],
            1e-3,
            1e-2,
        )
        .unwrap();
    }

    #[test]
    fn test_log_domain_error() {
        let mut g = Graph::new();
        let x = g
            .variable_from_data(&[2], vec![1.0, -1.0], false)
            .unwrap();
        let y = log(&mut g, x).unwrap();
        match g.forward(y, false) {
            Err(NeuroGradError::DomainError { operation, .. }) => {
                assert_eq!(operation, "Log");
            }
            other => panic!("expected DomainError, got {:?}", other),
        }
    }

    #[test]
    fn test_sin_grad_check() {
        check_grad(
            |g, inputs| sin(g, inputs[0]),
            &[(vec![4], vec![-1.2, -0.3, 0.4, 1.1])],
            1e-3,
            1e-2,
        )
        .unwrap();
    }

    #[test]
    fn test_sin_double_backward_check() {
        check_double_backward(
            &Sin,
            &[(vec![3], vec![-0.9, 0.1, 0.7])],
            &[(vec![3], vec![0.5, 1.5, -1.0])],
            1e-3,
            1e-2,
        )
        .unwrap();
    }

    #[test]
    fn test_mul_double_backward_check() {
        use crate::ops::arithmetic::Mul;
        check_double_backward(
            &Mul,
            &[
                (vec![3], vec![0.5, -1.0, 2.0]),
                (vec![3], vec![1.5, 0.25, -0.5]),
            ],
            &[(vec![3], vec![1.0, -2.0, 0.5])],
            1e-3,
            1e-2,
        )
        .unwrap();
    }

    #[test]
    fn test_floor_backward_not_implemented() {
        let mut g = Graph::new();
        let x = g.variable_from_data(&[2], vec![1.7, -0.3], true).unwrap();
        let y = floor(&mut g, x).unwrap();
        g.forward(y, false).unwrap();
        assert_eq!(g.data(y).unwrap(), vec![1.0, -1.0]);
        // Backward must fail loudly, never substitute a zero gradient.
        match g.backward(y, None) {
            Err(NeuroGradError::NotImplemented {
                operation,
                capability,
            }) => {
                assert_eq!(operation, "Floor");
                assert_eq!(capability, "backward");
            }
            other => panic!("expected NotImplemented, got {:?}", other),
        }
    }

    #[test]
    fn test_double_backward_absent_by_default() {
        assert!(!Log.has_double_backward());
        let err = Log
            .double_backward(&[], &[], &[], &[])
            .expect_err("Log has no double_backward");
        assert!(matches!(err, NeuroGradError::NotImplemented { .. }));
    }
}
