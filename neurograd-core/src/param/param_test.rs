// neurograd-core/src/param/param_test.rs

use super::*;
use crate::ops::{mul_scalar, sum};

fn zeros() -> ConstantInitializer {
    ConstantInitializer::zeros()
}

#[test]
fn test_get_or_create_is_idempotent() {
    let mut g = Graph::new();
    let mut reg = ParameterRegistry::new();
    let init = ArrayInitializer::new(vec![1.0, 2.0, 3.0]);
    let w1 = reg.get_or_create(&mut g, "w", &[3], &init, true).unwrap();
    g.set_data(w1, vec![9.0, 9.0, 9.0]).unwrap();
    let w2 = reg.get_or_create(&mut g, "w", &[3], &init, true).unwrap();
    assert_eq!(w1, w2);
    // Data set after creation survives the second lookup.
    assert_eq!(g.data(w2).unwrap(), vec![9.0, 9.0, 9.0]);
    assert_eq!(reg.len(), 1);
}

#[test]
fn test_nested_scopes_compose_with_slash() {
    let mut g = Graph::new();
    let mut reg = ParameterRegistry::new();
    let nested = reg.scope("aaa", |reg| {
        reg.scope("bbb", |reg| {
            assert_eq!(reg.current_scope(), "aaa/bbb");
            reg.get_or_create(&mut g, "w", &[2], &zeros(), true).unwrap()
        })
    });
    let flat = reg.scope("aaa/bbb", |reg| {
        reg.get_or_create(&mut g, "w", &[2], &zeros(), true).unwrap()
    });
    assert_eq!(nested, flat);
    assert_eq!(reg.enumerate(&g, false)[0].0, "aaa/bbb/w");
}

#[test]
fn test_scope_restored_after_closure() {
    let mut reg = ParameterRegistry::new();
    reg.scope("outer", |reg| {
        assert_eq!(reg.current_scope(), "outer");
    });
    assert_eq!(reg.current_scope(), "");
}

#[test]
fn test_shape_mismatch_on_existing_parameter() {
    let mut g = Graph::new();
    let mut reg = ParameterRegistry::new();
    reg.get_or_create(&mut g, "w", &[2, 2], &zeros(), true).unwrap();
    let err = reg.get_or_create(&mut g, "w", &[4], &zeros(), true);
    assert!(matches!(err, Err(NeuroGradError::ShapeMismatch { .. })));
}

#[test]
fn test_need_grad_flip_preserves_gradient() {
    let mut g = Graph::new();
    let mut reg = ParameterRegistry::new();
    let init = ArrayInitializer::new(vec![1.0, 2.0]);
    let w = reg.get_or_create(&mut g, "w", &[2], &init, true).unwrap();

    let y = mul_scalar(&mut g, w, 3.0).unwrap();
    let loss = sum(&mut g, y).unwrap();
    g.forward(loss, false).unwrap();
    g.backward(loss, None).unwrap();
    assert_eq!(g.grad(w).unwrap(), vec![3.0, 3.0]);

    // Re-fetching with need_grad=false mutates the stored flag but keeps
    // the accumulated gradient plane.
    let w2 = reg.get_or_create(&mut g, "w", &[2], &init, false).unwrap();
    assert_eq!(w, w2);
    assert!(!g.need_grad(w));
    assert_eq!(g.grad(w).unwrap(), vec![3.0, 3.0]);
}

#[test]
fn test_as_need_grad_returns_shared_view() {
    let mut g = Graph::new();
    let mut reg = ParameterRegistry::new();
    let init = ArrayInitializer::new(vec![1.0, 2.0]);
    let w = reg.get_or_create(&mut g, "w", &[2], &init, true).unwrap();

    let view = reg
        .get_or_create_as(&mut g, "w", &[2], &init, true, Some(false))
        .unwrap();
    assert_ne!(w, view);
    assert!(g.need_grad(w));
    assert!(!g.need_grad(view));
    assert!(g.is_leaf(view));

    // Same underlying buffer: writes through the view are seen on the
    // parameter.
    g.set_data(view, vec![5.0, 6.0]).unwrap();
    assert_eq!(g.data(w).unwrap(), vec![5.0, 6.0]);
}

#[test]
fn test_no_grad_lookup_returns_detached_view() {
    let mut g = Graph::new();
    let mut reg = ParameterRegistry::new();
    let w = reg.get_or_create(&mut g, "w", &[2], &zeros(), true).unwrap();

    let view = g.no_grad(|g| reg.get_or_create(g, "w", &[2], &zeros(), true).unwrap());
    assert_ne!(w, view);
    assert!(!g.need_grad(view));
    // The stored parameter is untouched.
    assert!(g.need_grad(w));
    assert_eq!(reg.get("w"), Some(w));
}

#[test]
fn test_pop_and_get() {
    let mut g = Graph::new();
    let mut reg = ParameterRegistry::new();
    let w = reg.get_or_create(&mut g, "w", &[2], &zeros(), true).unwrap();
    assert_eq!(reg.get("w"), Some(w));
    assert_eq!(reg.pop("w"), Some(w));
    assert_eq!(reg.get("w"), None);
    assert_eq!(reg.pop("w"), None);
    assert!(reg.is_empty());
}

#[test]
fn test_enumerate_order_and_grad_only() {
    let mut g = Graph::new();
    let mut reg = ParameterRegistry::new();
    reg.get_or_create(&mut g, "b", &[1], &zeros(), true).unwrap();
    reg.get_or_create(&mut g, "a", &[1], &zeros(), false).unwrap();
    reg.scope("layer", |reg| {
        reg.get_or_create(&mut g, "w", &[1], &zeros(), true).unwrap()
    });

    let all: Vec<String> = reg.enumerate(&g, false).into_iter().map(|(k, _)| k).collect();
    assert_eq!(all, vec!["b", "a", "layer/w"]);

    let trainable: Vec<String> =
        reg.enumerate(&g, true).into_iter().map(|(k, _)| k).collect();
    assert_eq!(trainable, vec!["b", "layer/w"]);

    // Enumeration inside a scope is restricted to that subtree.
    reg.scope("layer", |reg| {
        let scoped: Vec<String> =
            reg.enumerate(&g, false).into_iter().map(|(k, _)| k).collect();
        assert_eq!(scoped, vec!["layer/w"]);
    });
}

#[test]
fn test_clear_all() {
    let mut g = Graph::new();
    let mut reg = ParameterRegistry::new();
    reg.get_or_create(&mut g, "w", &[1], &zeros(), true).unwrap();
    reg.clear_all();
    assert!(reg.is_empty());
    assert_eq!(reg.get("w"), None);
}
