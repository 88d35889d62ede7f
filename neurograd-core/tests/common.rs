use neurograd_core::{Graph, VariableId};

// Helper to create a populated leaf for integration tests.
// Added allow(dead_code) because usage across different test crates isn't detected easily.
#[allow(dead_code)]
pub(crate) fn leaf(
    g: &mut Graph,
    shape: &[usize],
    data: Vec<f32>,
    need_grad: bool,
) -> VariableId {
    g.variable_from_data(shape, data, need_grad)
        .expect("Test leaf creation failed")
}
