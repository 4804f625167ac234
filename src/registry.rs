//! Operation registry: lookup by name.
//!
//! The process-wide registry is created on first use with every built-in
//! operation from [`ops`](crate::ops) and can be extended at runtime with
//! [`register`]. Registering an operation under an existing name replaces
//! the old one.

use crate::error::{Error, Result};
use crate::operation::{ArgDirection, Operation};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

#[derive(Default)]
pub struct Registry {
    operations: BTreeMap<String, Arc<dyn Operation>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in operation.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::ops::register_builtins(&mut registry);
        registry
    }

    /// Add an operation, returning the one it replaced.
    pub fn insert(&mut self, operation: Arc<dyn Operation>) -> Option<Arc<dyn Operation>> {
        self.operations
            .insert(operation.name().to_string(), operation)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Operation>> {
        self.operations.get(name).cloned()
    }

    /// Operation names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

static REGISTRY: LazyLock<RwLock<Registry>> =
    LazyLock::new(|| RwLock::new(Registry::with_builtins()));

/// Find an operation in the global registry.
pub fn lookup(name: &str) -> Result<Arc<dyn Operation>> {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
        .ok_or_else(|| Error::UnknownOperation(name.to_string()))
}

/// Add an operation to the global registry.
pub fn register(operation: Arc<dyn Operation>) -> Option<Arc<dyn Operation>> {
    tracing::debug!(name = operation.name(), "registering operation");
    REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(operation)
}

/// Every registered operation, sorted by name.
pub fn operations() -> Vec<Arc<dyn Operation>> {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .operations
        .values()
        .cloned()
        .collect()
}

/// Serializable description of an operation, for listings and help.
#[derive(Debug, Clone, Serialize)]
pub struct OperationInfo {
    pub name: String,
    pub description: String,
    pub arguments: Vec<ArgumentInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArgumentInfo {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub value_type: String,
    pub direction: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<(f64, f64)>,
}

impl OperationInfo {
    pub fn of(operation: &dyn Operation) -> Self {
        Self {
            name: operation.name().to_string(),
            description: operation.description().to_string(),
            arguments: operation
                .args()
                .iter()
                .map(|a| ArgumentInfo {
                    name: a.name.to_string(),
                    description: a.description.to_string(),
                    value_type: a.value_type.to_string(),
                    direction: a.direction.as_str(),
                    required: a.required,
                    default: a.default.as_ref().map(|d| d.to_string()),
                    range: a.range,
                })
                .collect(),
        }
    }

    pub fn required_inputs(&self) -> impl Iterator<Item = &ArgumentInfo> {
        self.arguments
            .iter()
            .filter(|a| a.required && a.direction == ArgDirection::Input.as_str())
    }

    pub fn required_outputs(&self) -> impl Iterator<Item = &ArgumentInfo> {
        self.arguments
            .iter()
            .filter(|a| a.required && a.direction == ArgDirection::Output.as_str())
    }
}

/// Describe a registered operation by name.
pub fn describe(name: &str) -> Result<OperationInfo> {
    lookup(name).map(|op| OperationInfo::of(op.as_ref()))
}
