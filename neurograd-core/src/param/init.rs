// neurograd-core/src/param/init.rs

use crate::error::NeuroGradError;
use rand::distributions::Uniform;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use std::fmt::Debug;

/// Produces the initial data plane for a freshly created parameter.
pub trait Initializer: Debug {
    fn generate(&self, shape: &[usize]) -> Result<Vec<f32>, NeuroGradError>;
}

fn numel(shape: &[usize]) -> usize {
    shape.iter().product::<usize>().max(1)
}

/// Fills every element with the same value.
#[derive(Debug, Clone)]
pub struct ConstantInitializer {
    pub value: f32,
}

impl ConstantInitializer {
    pub fn new(value: f32) -> Self {
        ConstantInitializer { value }
    }

    pub fn zeros() -> Self {
        Self::new(0.0)
    }

    pub fn ones() -> Self {
        Self::new(1.0)
    }
}

impl Initializer for ConstantInitializer {
    fn generate(&self, shape: &[usize]) -> Result<Vec<f32>, NeuroGradError> {
        Ok(vec![self.value; numel(shape)])
    }
}

/// Samples from `U[low, high)`. A fixed seed gives reproducible parameters.
#[derive(Debug, Clone)]
pub struct UniformInitializer {
    pub low: f32,
    pub high: f32,
    pub seed: Option<u64>,
}

impl UniformInitializer {
    pub fn new(low: f32, high: f32) -> Self {
        UniformInitializer { low, high, seed: None }
    }

    pub fn with_seed(low: f32, high: f32, seed: u64) -> Self {
        UniformInitializer { low, high, seed: Some(seed) }
    }
}

impl Initializer for UniformInitializer {
    fn generate(&self, shape: &[usize]) -> Result<Vec<f32>, NeuroGradError> {
        if self.low >= self.high {
            return Err(NeuroGradError::DomainError {
                operation: "UniformInitializer".to_string(),
                message: format!("empty range [{}, {})", self.low, self.high),
            });
        }
        let dist = Uniform::new(self.low, self.high);
        let mut rng = seeded_rng(self.seed);
        Ok((0..numel(shape)).map(|_| rng.sample(dist)).collect())
    }
}

/// Samples from `N(mean, std_dev)`.
#[derive(Debug, Clone)]
pub struct NormalInitializer {
    pub mean: f32,
    pub std_dev: f32,
    pub seed: Option<u64>,
}

impl NormalInitializer {
    pub fn new(mean: f32, std_dev: f32) -> Self {
        NormalInitializer { mean, std_dev, seed: None }
    }

    pub fn with_seed(mean: f32, std_dev: f32, seed: u64) -> Self {
        NormalInitializer { mean, std_dev, seed: Some(seed) }
    }
}

impl Initializer for NormalInitializer {
    fn generate(&self, shape: &[usize]) -> Result<Vec<f32>, NeuroGradError> {
        let dist = Normal::new(self.mean, self.std_dev).map_err(|e| {
            NeuroGradError::DomainError {
                operation: "NormalInitializer".to_string(),
                message: e.to_string(),
            }
        })?;
        let mut rng = seeded_rng(self.seed);
        Ok((0..numel(shape)).map(|_| rng.sample(dist)).collect())
    }
}

/// Installs explicit values; the length must match the parameter shape.
#[derive(Debug, Clone)]
pub struct ArrayInitializer {
    pub data: Vec<f32>,
}

impl ArrayInitializer {
    pub fn new(data: Vec<f32>) -> Self {
        ArrayInitializer { data }
    }
}

impl Initializer for ArrayInitializer {
    fn generate(&self, shape: &[usize]) -> Result<Vec<f32>, NeuroGradError> {
        if self.data.len() != numel(shape) {
            return Err(NeuroGradError::TensorCreationError {
                data_len: self.data.len(),
                shape: shape.to_vec(),
            });
        }
        Ok(self.data.clone())
    }
}

fn seeded_rng(seed: Option<u64>) -> rand::rngs::StdRng {
    match seed {
        Some(s) => rand::rngs::StdRng::seed_from_u64(s),
        None => rand::rngs::StdRng::from_entropy(),
    }
}
