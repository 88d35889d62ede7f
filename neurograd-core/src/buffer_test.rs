use super::*;

#[test]
fn test_lazy_allocation_and_read() {
    let mut buf = TensorBuffer::new(vec![2, 3], DType::F32);
    assert!(!buf.has_data());
    // Reading before any write fails.
    match buf.data_f32() {
        Err(NeuroGradError::UseAfterClear { .. }) => {}
        other => panic!("expected UseAfterClear, got {:?}", other),
    }
    // First mutable access zero-allocates.
    {
        let data = buf.data_f32_mut().unwrap();
        assert_eq!(data.len(), 6);
        assert!(data.iter().all(|&x| x == 0.0));
        data[4] = 7.0;
    }
    assert_eq!(buf.data_f32().unwrap()[4], 7.0);
}

#[test]
fn test_clear_then_use_fails() {
    let mut buf = TensorBuffer::new(vec![4], DType::F32);
    buf.set_data_f32(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    assert!(buf.has_data());
    buf.clear_data();
    assert!(!buf.has_data());
    assert!(matches!(
        buf.data_f32(),
        Err(NeuroGradError::UseAfterClear { .. })
    ));
    // Reallocation makes it readable again.
    buf.set_data_f32(vec![0.0; 4]).unwrap();
    assert!(buf.data_f32().is_ok());
}

#[test]
fn test_set_data_length_checked() {
    let mut buf = TensorBuffer::new(vec![2, 2], DType::F32);
    match buf.set_data_f32(vec![1.0, 2.0, 3.0]) {
        Err(NeuroGradError::TensorCreationError { data_len, shape }) => {
            assert_eq!(data_len, 3);
            assert_eq!(shape, vec![2, 2]);
        }
        other => panic!("expected TensorCreationError, got {:?}", other),
    }
}

#[test]
fn test_accumulate_grad_is_additive() {
    let mut buf = TensorBuffer::new(vec![3], DType::F32);
    buf.accumulate_grad(&[1.0, 2.0, 3.0]).unwrap();
    buf.accumulate_grad(&[0.5, 0.5, 0.5]).unwrap();
    assert_eq!(buf.grad_f32().unwrap(), &[1.5, 2.5, 3.5]);
    buf.clear_grad();
    assert!(!buf.has_grad());
}

#[test]
fn test_accumulate_grad_shape_checked() {
    let mut buf = TensorBuffer::new(vec![3], DType::F32);
    assert!(matches!(
        buf.accumulate_grad(&[1.0, 2.0]),
        Err(NeuroGradError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_scalar_shape_has_one_element() {
    let mut buf = TensorBuffer::new(vec![], DType::F32);
    assert_eq!(buf.numel(), 1);
    buf.set_data_f32(vec![42.0]).unwrap();
    assert_eq!(buf.data_f32().unwrap(), &[42.0]);
}

#[test]
fn test_f64_storage_round_trip_and_op_rejection() {
    let mut buf = TensorBuffer::new(vec![2], DType::F64);
    buf.set_data_f64(vec![1.0f64, 2.0]).unwrap();
    assert_eq!(buf.data_f64().unwrap(), &[1.0f64, 2.0]);
    // Operator kernels read through the f32 view and must get a clean error.
    assert!(matches!(
        buf.data_f32(),
        Err(NeuroGradError::DTypeMismatch { .. })
    ));
    assert!(matches!(
        buf.view(),
        Err(NeuroGradError::DTypeMismatch { .. })
    ));
}

#[test]
fn test_reshape_drops_stale_planes() {
    let mut buf = TensorBuffer::new(vec![2, 2], DType::F32);
    buf.set_data_f32(vec![1.0; 4]).unwrap();
    buf.reshape(vec![2, 3]);
    assert!(!buf.has_data());
    assert_eq!(buf.shape(), &[2, 3]);
    assert!(buf.planes_consistent());
}
