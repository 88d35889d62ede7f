// neurograd-core/src/grad_check.rs
//
// Finite-difference verification of operator gradients. Analytic gradients
// come from a real backward pass; numeric ones from central differences on
// a scalar loss (the sum of all output elements).

use crate::buffer::{ArrayView, ArrayViewMut};
use crate::error::NeuroGradError;
use crate::function::Operator;
use crate::graph::Graph;
use crate::variable::VariableId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GradCheckError {
    #[error("graph error during gradient check: {0}")]
    Graph(#[from] NeuroGradError),

    #[error("no gradient was accumulated for input {input}")]
    MissingGrad { input: usize },

    #[error("non-finite value in {what} at index {index}")]
    NonFinite { what: String, index: usize },

    #[error(
        "gradient mismatch for {what}[{index}]: analytic {analytic}, numeric {numeric} (tolerance {tolerance})"
    )]
    Mismatch {
        what: String,
        index: usize,
        analytic: f64,
        numeric: f64,
        tolerance: f64,
    },
}

/// Checks first-order gradients of a subgraph built by `build`.
///
/// `build` receives a fresh graph and one leaf per `(shape, data)` entry and
/// returns the output variable. Gradients of the summed output with respect
/// to every input element are compared against central differences with step
/// `epsilon` and relative tolerance `tolerance`.
pub fn check_grad<F>(
    build: F,
    inputs: &[(Vec<usize>, Vec<f32>)],
    epsilon: f64,
    tolerance: f64,
) -> Result<(), GradCheckError>
where
    F: Fn(&mut Graph, &[VariableId]) -> Result<VariableId, NeuroGradError>,
{
    let mut graph = Graph::new();
    let ids: Vec<VariableId> = inputs
        .iter()
        .map(|(shape, data)| graph.variable_from_data(shape, data.clone(), true))
        .collect::<Result<_, _>>()?;
    let out = build(&mut graph, &ids)?;
    graph.forward(out, false)?;
    graph.backward(out, Some(&vec![1.0f32; graph.numel(out)]))?;

    let analytic: Vec<Vec<f32>> = ids
        .iter()
        .enumerate()
        .map(|(i, &id)| graph.grad(id).ok_or(GradCheckError::MissingGrad { input: i }))
        .collect::<Result<_, _>>()?;

    for (i, (_, data)) in inputs.iter().enumerate() {
        for j in 0..data.len() {
            let mut plus = inputs.to_vec();
            plus[i].1[j] += epsilon as f32;
            let mut minus = inputs.to_vec();
            minus[i].1[j] -= epsilon as f32;
            let numeric =
                (eval_sum(&build, &plus)? - eval_sum(&build, &minus)?) / (2.0 * epsilon);
            compare(
                &format!("input{}", i),
                j,
                analytic[i][j] as f64,
                numeric,
                tolerance,
            )?;
        }
    }
    Ok(())
}

/// Checks an operator's `double_backward` against finite differences of its
/// `backward`. The scalar under test is the sum of all first-order input
/// gradients, which corresponds to seeding every gradient-of-gradient slot
/// with ones.
pub fn check_double_backward(
    op: &dyn Operator,
    inputs: &[(Vec<usize>, Vec<f32>)],
    output_grads: &[(Vec<usize>, Vec<f32>)],
    epsilon: f64,
    tolerance: f64,
) -> Result<(), GradCheckError> {
    let propagate = vec![true; inputs.len()];
    let seeds: Vec<Vec<f32>> = inputs
        .iter()
        .map(|(shape, _)| vec![1.0f32; shape.iter().product()])
        .collect();

    let in_views = views(inputs);
    let og_views = views(output_grads);
    let gg_views: Vec<Option<ArrayView<'_>>> = inputs
        .iter()
        .zip(seeds.iter())
        .map(|((shape, _), seed)| Some(ArrayView { shape, data: seed }))
        .collect();
    let second = op.double_backward(&in_views, &og_views, &gg_views, &propagate)?;

    for (i, (_, data)) in inputs.iter().enumerate() {
        let analytic = second.wrt_inputs[i]
            .as_ref()
            .ok_or(GradCheckError::MissingGrad { input: i })?;
        for j in 0..data.len() {
            let mut plus = inputs.to_vec();
            plus[i].1[j] += epsilon as f32;
            let mut minus = inputs.to_vec();
            minus[i].1[j] -= epsilon as f32;
            let numeric = (backward_sum(op, &plus, output_grads)?
                - backward_sum(op, &minus, output_grads)?)
                / (2.0 * epsilon);
            compare(&format!("input{}", i), j, analytic[j] as f64, numeric, tolerance)?;
        }
    }

    for (k, (_, data)) in output_grads.iter().enumerate() {
        let analytic = second.wrt_output_grads[k]
            .as_ref()
            .ok_or(GradCheckError::MissingGrad { input: k })?;
        for j in 0..data.len() {
            let mut plus = output_grads.to_vec();
            plus[k].1[j] += epsilon as f32;
            let mut minus = output_grads.to_vec();
            minus[k].1[j] -= epsilon as f32;
            let numeric = (backward_sum(op, inputs, &plus)?
                - backward_sum(op, inputs, &minus)?)
                / (2.0 * epsilon);
            compare(
                &format!("output_grad{}", k),
                j,
                analytic[j] as f64,
                numeric,
                tolerance,
            )?;
        }
    }
    Ok(())
}

fn compare(
    what: &str,
    index: usize,
    analytic: f64,
    numeric: f64,
    tolerance: f64,
) -> Result<(), GradCheckError> {
    if !analytic.is_finite() {
        return Err(GradCheckError::NonFinite {
            what: format!("analytic {}", what),
            index,
        });
    }
    if !numeric.is_finite() {
        return Err(GradCheckError::NonFinite {
            what: format!("numeric {}", what),
            index,
        });
    }
    if (analytic - numeric).abs() > tolerance * numeric.abs().max(1.0) {
        return Err(GradCheckError::Mismatch {
            what: what.to_string(),
            index,
            analytic,
            numeric,
            tolerance,
        });
    }
    Ok(())
}

/// Rebuilds the subgraph on fresh leaves and returns the summed output.
fn eval_sum<F>(
    build: &F,
    inputs: &[(Vec<usize>, Vec<f32>)],
) -> Result<f64, NeuroGradError>
where
    F: Fn(&mut Graph, &[VariableId]) -> Result<VariableId, NeuroGradError>,
{
    let mut graph = Graph::new();
    let ids: Vec<VariableId> = inputs
        .iter()
        .map(|(shape, data)| graph.variable_from_data(shape, data.clone(), false))
        .collect::<Result<_, _>>()?;
    let out = build(&mut graph, &ids)?;
    graph.forward(out, false)?;
    Ok(graph.data(out)?.iter().map(|&x| x as f64).sum())
}

/// Runs the operator's forward then backward directly on raw planes and
/// returns the sum of every first-order input gradient.
fn backward_sum(
    op: &dyn Operator,
    inputs: &[(Vec<usize>, Vec<f32>)],
    output_grads: &[(Vec<usize>, Vec<f32>)],
) -> Result<f64, NeuroGradError> {
    let in_shapes: Vec<&[usize]> = inputs.iter().map(|(s, _)| s.as_slice()).collect();
    let out_shapes = op.infer_output_shapes(&in_shapes)?;
    let mut out_data: Vec<Vec<f32>> = out_shapes
        .iter()
        .map(|s| vec![0.0f32; s.iter().product::<usize>().max(1)])
        .collect();
    {
        let in_views = views(inputs);
        let mut out_views: Vec<ArrayViewMut<'_>> = out_shapes
            .iter()
            .zip(out_data.iter_mut())
            .map(|(shape, data)| ArrayViewMut { shape, data })
            .collect();
        op.forward(&in_views, &mut out_views)?;
    }
    let in_views = views(inputs);
    let out_views: Vec<ArrayView<'_>> = out_shapes
        .iter()
        .zip(out_data.iter())
        .map(|(shape, data)| ArrayView { shape, data })
        .collect();
    let og_views = views(output_grads);
    let grads = op.backward(&in_views, &out_views, &og_views, &vec![true; inputs.len()])?;
    Ok(grads
        .iter()
        .flatten()
        .flat_map(|g| g.iter())
        .map(|&x| x as f64)
        .sum())
}

fn views(planes: &[(Vec<usize>, Vec<f32>)]) -> Vec<ArrayView<'_>> {
    planes
        .iter()
        .map(|(shape, data)| ArrayView { shape, data })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{add, mul};

    #[test]
    fn test_check_grad_passes_for_correct_op() {
        check_grad(
            |g, inputs| {
                let p = mul(g, inputs[0], inputs[1])?;
                add(g, p, inputs[0])
            },
            &[
                (vec![2], vec![0.4, -1.1]),
                (vec![2], vec![2.0, 0.3]),
            ],
            1e-3,
            1e-2,
        )
        .unwrap();
    }

    // An operator whose backward is deliberately wrong must be caught.
    #[derive(Debug)]
    struct BadSquare;

    impl Operator for BadSquare {
        fn name(&self) -> &'static str {
            "BadSquare"
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
            for (o, &x) in outputs[0].data.iter_mut().zip(inputs[0].data.iter()) {
                *o = x * x;
            }
            Ok(())
        }

        fn backward(
            &self,
            inputs: &[ArrayView<'_>],
            _outputs: &[ArrayView<'_>],
            output_grads: &[ArrayView<'_>],
            propagate: &[bool],
        ) -> Result<Vec<Option<Vec<f32>>>, NeuroGradError> {
            // Wrong on purpose: should be 2 * x * g.
            let x = inputs[0].data;
            let g = output_grads[0].data;
            Ok(vec![propagate[0].then(|| {
                g.iter().zip(x.iter()).map(|(&gv, &xv)| gv * xv).collect()
            })])
        }
    }

    #[test]
    fn test_check_grad_detects_wrong_backward() {
        let result = check_grad(
            |g, inputs| crate::ops::apply_single(g, Box::new(BadSquare), &[inputs[0]]),
            &[(vec![2], vec![1.5, -2.0])],
            1e-3,
            1e-2,
        );
        assert!(matches!(result, Err(GradCheckError::Mismatch { .. })));
    }
}
