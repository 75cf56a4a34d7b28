//! Operation registry.
//!
//! Built once at startup from the engine's declared operations. Each
//! declaration is classified by its parameter list:
//!
//! - exactly one `Image` parameter → [`Shape::Paste`]
//! - only `Text` parameters → [`Shape::Text`] with `arity` = parameter count
//! - anything else → [`RegistryError::UnclassifiableOperation`]
//!
//! Any error aborts construction: a mismatch between engine and gateway has to
//! be caught before serving traffic, not on the first request that hits it.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::engine::{ImageEngine, OperationDecl, ParamKind};
use crate::error::RegistryError;

/// How an operation takes its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    /// One image, supplied by URL
    Paste,
    /// `arity` positional strings
    Text { arity: usize },
}

impl Shape {
    /// Classify a parameter list.
    pub fn classify(params: &[ParamKind]) -> Option<Shape> {
        match params {
            [ParamKind::Image] => Some(Shape::Paste),
            _ if params.iter().all(|p| *p == ParamKind::Text) => Some(Shape::Text {
                arity: params.len(),
            }),
            _ => None,
        }
    }
}

/// A classified, routable operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationDescriptor {
    name: String,
    shape: Shape,
    summary: String,
}

impl OperationDescriptor {
    /// Classify one declaration.
    pub fn from_decl(decl: &OperationDecl) -> Result<Self, RegistryError> {
        if !is_valid_route_name(&decl.name) {
            return Err(RegistryError::InvalidOperationName(decl.name.clone()));
        }

        let shape = Shape::classify(&decl.params)
            .ok_or_else(|| RegistryError::UnclassifiableOperation(decl.name.clone()))?;

        let summary = match shape {
            Shape::Paste => format!("Generates a/an '{}' image", decl.name),
            Shape::Text { .. } => format!("Writes given text on '{}' image", decl.name),
        };

        Ok(Self {
            name: decl.name.clone(),
            shape,
            summary,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Human-readable summary for documentation.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Documentation group.
    pub fn tag(&self) -> &'static str {
        match self.shape {
            Shape::Paste => "Paste on Image",
            Shape::Text { .. } => "Text on Image",
        }
    }

    /// Stable identifier for documentation tooling.
    pub fn operation_id(&self) -> String {
        format!("image_generator_{}", self.name)
    }
}

/// Route segments: ASCII letters, digits, `_` and `-`.
fn is_valid_route_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Immutable table of operations, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    operations: BTreeMap<String, OperationDescriptor>,
}

impl OperationRegistry {
    /// Classify and register every declaration.
    pub fn build<I>(decls: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = OperationDecl>,
    {
        let mut operations = BTreeMap::new();

        for decl in decls {
            let descriptor = OperationDescriptor::from_decl(&decl)?;
            if operations.contains_key(&decl.name) {
                return Err(RegistryError::DuplicateOperation(decl.name));
            }
            operations.insert(decl.name, descriptor);
        }

        Ok(Self { operations })
    }

    /// Build the registry from an engine's declared operations.
    pub fn from_engine<E: ImageEngine>(engine: &E) -> Result<Self, RegistryError> {
        Self::build(engine.operations())
    }

    pub fn get(&self, name: &str) -> Option<&OperationDescriptor> {
        self.operations.get(name)
    }

    /// All operations, ordered by name.
    pub fn operations(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.operations.values()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
