use approx::assert_relative_eq;
use neurograd_core::{
    ops, ArrayInitializer, ConstantInitializer, Graph, ParameterRegistry,
    UniformInitializer,
};

mod common;
use common::leaf;

// A few manual SGD steps on (w - 3)^2 must reduce the loss.
#[test]
fn test_training_loop_converges() {
    let mut g = Graph::new();
    let mut reg = ParameterRegistry::new();
    let w = reg
        .get_or_create(&mut g, "w", &[1], &ConstantInitializer::zeros(), true)
        .unwrap();
    let target = leaf(&mut g, &[1], vec![3.0], false);

    let d = ops::sub(&mut g, w, target).unwrap();
    let loss = ops::mul(&mut g, d, d).unwrap();

    let lr = 0.1f32;
    let mut last = f32::INFINITY;
    for _ in 0..20 {
        g.zero_grad(w);
        g.forward(loss, false).unwrap();
        let current = g.data(loss).unwrap()[0];
        assert!(current <= last + 1e-6);
        last = current;

        g.backward(loss, None).unwrap();
        let grad = g.grad(w).unwrap();
        let updated: Vec<f32> = g
            .data(w)
            .unwrap()
            .iter()
            .zip(grad.iter())
            .map(|(&v, &dg)| v - lr * dg)
            .collect();
        g.set_data(w, updated).unwrap();
    }
    assert!(last < 0.1);
    assert_relative_eq!(g.data(w).unwrap()[0], 3.0, max_relative = 0.2);
}

#[test]
fn test_shared_parameters_across_model_builds() {
    let mut g = Graph::new();
    let mut reg = ParameterRegistry::new();
    let init = ArrayInitializer::new(vec![2.0]);

    let build = |g: &mut Graph, reg: &mut ParameterRegistry, x| {
        let w = reg.scope("model", |reg| {
            reg.get_or_create(g, "w", &[1], &init, true).unwrap()
        });
        ops::mul(g, x, w).unwrap()
    };

    let x1 = leaf(&mut g, &[1], vec![1.0], false);
    let y1 = build(&mut g, &mut reg, x1);
    let x2 = leaf(&mut g, &[1], vec![5.0], false);
    let y2 = build(&mut g, &mut reg, x2);

    // Both builds resolved the same parameter.
    assert_eq!(reg.len(), 1);
    let w = reg.scope("model", |reg| reg.get("w").unwrap());

    g.forward(y1, false).unwrap();
    g.forward(y2, false).unwrap();
    assert_eq!(g.data(y1).unwrap(), vec![2.0]);
    assert_eq!(g.data(y2).unwrap(), vec![10.0]);

    // Gradients from both heads accumulate into the shared parameter.
    g.backward(y1, None).unwrap();
    g.backward(y2, None).unwrap();
    assert_eq!(g.grad(w).unwrap(), vec![6.0]);
}

#[test]
fn test_frozen_parameters_are_skipped_by_enumerate() {
    let mut g = Graph::new();
    let mut reg = ParameterRegistry::new();
    let init = UniformInitializer::with_seed(-0.1, 0.1, 1);
    reg.get_or_create(&mut g, "trainable", &[2, 2], &init, true)
        .unwrap();
    reg.get_or_create(&mut g, "frozen", &[2, 2], &init, false)
        .unwrap();

    let names: Vec<String> = reg
        .enumerate(&g, true)
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, vec!["trainable"]);
    assert_eq!(reg.enumerate(&g, false).len(), 2);
}

// Evaluating with frozen parameters must leave the stored flags intact once
// the no_grad region ends.
#[test]
fn test_evaluation_round_trip_preserves_parameters() {
    let mut g = Graph::new();
    let mut reg = ParameterRegistry::new();
    let init = ArrayInitializer::new(vec![1.5]);
    let w = reg.get_or_create(&mut g, "w", &[1], &init, true).unwrap();

    let y = g.no_grad(|g| {
        let x = g.variable_from_data(&[1], vec![4.0], false).unwrap();
        let w_view = reg.get_or_create(g, "w", &[1], &init, true).unwrap();
        ops::mul(g, x, w_view).unwrap()
    });
    g.forward(y, false).unwrap();
    assert_eq!(g.data(y).unwrap(), vec![6.0]);
    assert!(!g.need_grad(y));
    assert!(g.need_grad(w));
}
