// neurograd-core/src/param/mod.rs
//
// A name-to-variable registry with hierarchical scopes. Parameters are
// ordinary leaf variables in a graph; the registry only owns the naming.

pub mod init;

pub use init::{
    ArrayInitializer, ConstantInitializer, Initializer, NormalInitializer,
    UniformInitializer,
};

use crate::error::NeuroGradError;
use crate::graph::Graph;
use crate::variable::VariableId;
use std::collections::HashMap;

/// Scoped registry of named parameters.
///
/// Keys are slash-joined scope paths (`"block1/conv/w"`). Enumeration is in
/// insertion order, which keeps checkpoint layouts stable across runs.
#[derive(Debug, Default)]
pub struct ParameterRegistry {
    entries: HashMap<String, VariableId>,
    order: Vec<String>,
    scopes: Vec<String>,
}

impl ParameterRegistry {
    pub fn new() -> Self {
        ParameterRegistry::default()
    }

    /// Runs `f` with `prefix` pushed onto the scope stack. Nested calls
    /// compose: `scope("aaa", .. scope("bbb", ..))` addresses `"aaa/bbb/.."`,
    /// the same keys as a single `scope("aaa/bbb", ..)`.
    pub fn scope<R>(&mut self, prefix: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        self.scopes.push(prefix.to_string());
        let out = f(self);
        self.scopes.pop();
        out
    }

    pub fn current_scope(&self) -> String {
        self.scopes.join("/")
    }

    fn scoped_key(&self, name: &str) -> String {
        if self.scopes.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.scopes.join("/"), name)
        }
    }

    /// Fetches the parameter `name` in the current scope, creating and
    /// initializing it on first use.
    ///
    /// On an existing parameter the stored `need_grad` flag is updated to the
    /// requested one (its accumulated gradient is kept either way). The shape
    /// must match what was registered.
    pub fn get_or_create(
        &mut self,
        graph: &mut Graph,
        name: &str,
        shape: &[usize],
        init: &dyn Initializer,
        need_grad: bool,
    ) -> Result<VariableId, NeuroGradError> {
        self.get_or_create_as(graph, name, shape, init, need_grad, None)
    }

    /// Like [`get_or_create`](Self::get_or_create) but the returned handle
    /// may carry a different `need_grad` than the stored parameter: when
    /// `as_need_grad` differs from `need_grad`, or while the graph is in
    /// `no_grad`, an unlinked view sharing the parameter's buffer is returned
    /// instead of the parameter itself.
    pub fn get_or_create_as(
        &mut self,
        graph: &mut Graph,
        name: &str,
        shape: &[usize],
        init: &dyn Initializer,
        need_grad: bool,
        as_need_grad: Option<bool>,
    ) -> Result<VariableId, NeuroGradError> {
        let key = self.scoped_key(name);
        let view_need_grad = as_need_grad.unwrap_or(need_grad);

        let id = match self.entries.get(&key) {
            Some(&id) => {
                let actual = graph.shape(id);
                if actual != shape {
                    return Err(NeuroGradError::ShapeMismatch {
                        expected: shape.to_vec(),
                        actual,
                        operation: format!("parameter '{}'", key),
                    });
                }
                graph.set_need_grad(id, need_grad);
                id
            }
            None => {
                log::debug!("creating parameter '{}' with shape {:?}", key, shape);
                let data = init.generate(shape)?;
                let id = graph.variable_from_data(shape, data, need_grad)?;
                // Creation under no_grad masks the flag; the stored
                // parameter keeps the requested one regardless.
                graph.set_need_grad(id, need_grad);
                self.entries.insert(key.clone(), id);
                self.order.push(key);
                id
            }
        };

        if graph.no_grad_active() || view_need_grad != need_grad {
            return Ok(graph.unlinked(id, view_need_grad));
        }
        Ok(id)
    }

    /// Registers an existing variable under `name` in the current scope,
    /// replacing any previous entry with that key.
    pub fn set(&mut self, name: &str, id: VariableId) {
        let key = self.scoped_key(name);
        if self.entries.insert(key.clone(), id).is_none() {
            self.order.push(key);
        }
    }

    pub fn get(&self, name: &str) -> Option<VariableId> {
        self.entries.get(&self.scoped_key(name)).copied()
    }

    /// Removes and returns the parameter, if registered.
    pub fn pop(&mut self, name: &str) -> Option<VariableId> {
        let key = self.scoped_key(name);
        let id = self.entries.remove(&key)?;
        self.order.retain(|k| k != &key);
        Some(id)
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// All parameters under the current scope in insertion order. With
    /// `grad_only` set, parameters whose stored `need_grad` is `false` are
    /// skipped.
    pub fn enumerate(&self, graph: &Graph, grad_only: bool) -> Vec<(String, VariableId)> {
        let prefix = self.current_scope();
        self.order
            .iter()
            .filter(|key| {
                prefix.is_empty()
                    || key.as_str() == prefix
                    || key.starts_with(&format!("{}/", prefix))
            })
            .map(|key| (key.clone(), self.entries[key]))
            .filter(|&(_, id)| !grad_only || graph.need_grad(id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
#[path = "param_test.rs"]
mod tests;
