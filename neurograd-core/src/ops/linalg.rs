// neurograd-core/src/ops/linalg.rs

use super::apply_single;
use crate::buffer::{ArrayView, ArrayViewMut};
use crate::error::NeuroGradError;
use crate::function::Operator;
use crate::graph::Graph;
use crate::variable::VariableId;

/// 2-D matrix product `a (m,k) @ b (k,n) -> (m,n)`.
pub fn matmul(
    graph: &mut Graph,
    a: VariableId,
    b: VariableId,
) -> Result<VariableId, NeuroGradError> {
    apply_single(graph, Box::new(MatMul), &[a, b])
}

#[derive(Debug, Clone)]
pub struct MatMul;

impl MatMul {
    fn dims(input_shapes: &[&[usize]]) -> Result<(usize, usize, usize), NeuroGradError> {
        let (a, b) = (input_shapes[0], input_shapes[1]);
        if a.len() != 2 || b.len() != 2 || a[1] != b[0] {
            return Err(NeuroGradError::ShapeMismatch {
                expected: a.to_vec(),
                actual: b.to_vec(),
                operation: "MatMul".to_string(),
            });
        }
        Ok((a[0], a[1], b[1]))
    }
}

impl Operator for MatMul {
    fn name(&self) -> &'static str {
        "MatMul"
    }

    fn io_arity(&self) -> (usize, usize) {
        (2, 1)
    }

    fn infer_output_shapes(
        &self,
        input_shapes: &[&[usize]],
    ) -> Result<Vec<Vec<usize>>, NeuroGradError> {
        let (m, _, n) = Self::dims(input_shapes)?;
        Ok(vec![vec![m, n]])
    }

    fn forward(
        &self,
        inputs: &[ArrayView<'_>],
        outputs: &mut [ArrayViewMut<'_>],
    ) -> Result<(), NeuroGradError> {
        let (m, k, n) = Self::dims(&[inputs[0].shape, inputs[1].shape])?;
        let a = inputs[0].data;
        let b = inputs[1].data;
        let out = &mut *outputs[0].data;
        for i in 0..m {
            for j in 0..n {
                let mut acc = 0.0f32;
                for l in 0..k {
                    acc += a[i * k + l] * b[l * n + j];
                }
                out[i * n + j] = acc;
            }
        }
        Ok(())
    }

    // dA = G . B^T, dB = A^T . G
    fn backward(
        &self,
        inputs: &[ArrayView<'_>],
        _outputs: &[ArrayView<'_>],
        output_grads: &[ArrayView<'_>],
        propagate: &[bool],
    ) -> Result<Vec<Option<Vec<f32>>>, NeuroGradError> {
        let (m, k, n) = Self::dims(&[inputs[0].shape, inputs[1].shape])?;
        let a = inputs[0].data;
        let b = inputs[1].data;
        let g = output_grads[0].data;

        let grad_a = propagate[0].then(|| {
            let mut ga = vec![0.0f32; m * k];
            for i in 0..m {
                for l in 0..k {
                    let mut acc = 0.0f32;
                    for j in 0..n {
                        acc += g[i * n + j] * b[l * n + j];
                    }
                    ga[i * k + l] = acc;
                }
            }
            ga
        });
        let grad_b = propagate[1].then(|| {
            let mut gb = vec![0.0f32; k * n];
            for l in 0..k {
                for j in 0..n {
                    let mut acc = 0.0f32;
                    for i in 0..m {
                        acc += a[i * k + l] * g[i * n + j];
                    }
                    gb[l * n + j] = acc;
                }
            }
            gb
        });
        Ok(vec![grad_a, grad_b])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grad_check::check_grad;

    #[test]
    fn test_matmul_forward() {
        let mut g = Graph::new();
        let a = g
            .variable_from_data(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], false)
            .unwrap();
        let b = g
            .variable_from_data(&[3, 2], vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0], false)
            .unwrap();
        let y = matmul(&mut g, a, b).unwrap();
        g.forward(y, false).unwrap();
        assert_eq!(g.shape(y), vec![2, 2]);
        assert_eq!(g.data(y).unwrap(), vec![58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_matmul_inner_dim_mismatch() {
        let mut g = Graph::new();
        let a = g.variable_from_data(&[2, 3], vec![0.0; 6], false).unwrap();
        let b = g.variable_from_data(&[2, 2], vec![0.0; 4], false).unwrap();
        let y = matmul(&mut g, a, b).unwrap();
        assert!(matches!(
            g.forward(y, false),
            Err(NeuroGradError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_matmul_grad_check() {
        check_grad(
            |g, inputs| matmul(g, inputs[0], inputs[1]),
            &[
                (vec![2, 3], vec![0.5, -1.0, 2.0, 1.5, 0.3, -0.7]),
                (vec![3, 2], vec![1.0, 0.5, -0.5, 2.0, 0.8, -1.2]),
            ],
            1e-2,
            1e-2,
        )
        .unwrap();
    }
}
