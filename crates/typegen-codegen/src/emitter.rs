//! # Interface Emitter
//!
//! Turns a decoded registry and module list into [`EmittedArtifact`]s:
//! one `types/<Name>.ts` per type descriptor in ascending id order, then one
//! `modules/<module>.ts` per module in metadata order.
//!
//! ## Invariants
//!
//! - [`Emitter::new`] validates everything that can fail for structural
//!   reasons: dangling references, unnameable types and artifact name
//!   collisions. A constructed emitter has nothing left to reject.
//! - Output depends only on the registry, the modules and the namespace.
//!   Two runs over the same input produce byte-identical artifacts in the
//!   same order.

use std::collections::BTreeMap;

use typegen_core::EmitError;
use typegen_metadata::{ModuleDescriptor, TypeId, TypeRegistry};

use crate::naming::{
    assign_names, describe_module, describe_type, module_artifact_name, type_artifact_name,
};
use crate::render::Renderer;

/// A generated source unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedArtifact {
    /// Path relative to the namespace directory, `/`-separated.
    pub name: String,
    /// UTF-8 source text.
    pub contents: String,
}

/// Emits artifacts for one registry and namespace.
///
/// Borrows the registry for its whole lifetime; the registry is never
/// modified.
#[derive(Debug)]
pub struct Emitter<'a> {
    registry: &'a TypeRegistry,
    modules: &'a [ModuleDescriptor],
    namespace: String,
    names: BTreeMap<TypeId, String>,
    type_order: Vec<TypeId>,
}

impl<'a> Emitter<'a> {
    /// Validate the input and prepare emission.
    pub fn new(
        registry: &'a TypeRegistry,
        modules: &'a [ModuleDescriptor],
        namespace: impl Into<String>,
    ) -> Result<Self, EmitError> {
        let namespace = namespace.into();

        if let Some((holder, missing)) = registry.first_dangling_reference() {
            return Err(EmitError::UnresolvedType {
                id: missing,
                referenced_by: registry
                    .get(holder)
                    .map_or_else(|| format!("type #{holder}"), describe_type),
            });
        }
        for module in modules {
            if let Some(missing) = module.references().into_iter().find(|r| !registry.contains(*r)) {
                return Err(EmitError::UnresolvedType {
                    id: missing,
                    referenced_by: describe_module(module),
                });
            }
        }

        let names = assign_names(registry)?;

        let mut claimed: BTreeMap<String, String> = BTreeMap::new();
        let sources = registry
            .iter()
            .filter_map(|ty| names.get(&ty.id).map(|n| (type_artifact_name(n), describe_type(ty))))
            .chain(modules.iter().map(|m| (module_artifact_name(m), describe_module(m))));
        for (artifact, source) in sources {
            if let Some(first) = claimed.get(&artifact) {
                return Err(EmitError::NameCollision {
                    name: artifact,
                    first: first.clone(),
                    second: source,
                });
            }
            claimed.insert(artifact, source);
        }

        tracing::debug!(
            namespace = %namespace,
            types = registry.len(),
            modules = modules.len(),
            "emitter ready"
        );

        Ok(Self {
            registry,
            modules,
            namespace,
            type_order: registry.iter().map(|t| t.id).collect(),
            names,
        })
    }

    /// Target namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Generated identifier for a type id.
    pub fn type_name(&self, id: TypeId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Number of artifacts [`Emitter::artifacts`] yields.
    pub fn artifact_count(&self) -> usize {
        self.type_order.len() + self.modules.len()
    }

    /// Lazily render every artifact.
    ///
    /// The iterator stops after the first error.
    pub fn artifacts(&self) -> Artifacts<'_, 'a> {
        Artifacts {
            emitter: self,
            next_type: 0,
            next_module: 0,
            failed: false,
        }
    }

    fn renderer(&self) -> Renderer<'_> {
        Renderer {
            names: &self.names,
            namespace: &self.namespace,
        }
    }
}

/// Iterator returned by [`Emitter::artifacts`].
#[derive(Debug)]
pub struct Artifacts<'e, 'a> {
    emitter: &'e Emitter<'a>,
    next_type: usize,
    next_module: usize,
    failed: bool,
}

impl Iterator for Artifacts<'_, '_> {
    type Item = Result<EmittedArtifact, EmitError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let emitter = self.emitter;
        let item = if let Some(&id) = emitter.type_order.get(self.next_type) {
            self.next_type += 1;
            let ty = emitter.registry.get(id)?;
            let name = emitter.names.get(&id)?;
            emitter
                .renderer()
                .type_artifact(ty)
                .map(|contents| EmittedArtifact {
                    name: type_artifact_name(name),
                    contents,
                })
        } else if let Some(module) = emitter.modules.get(self.next_module) {
            self.next_module += 1;
            emitter
                .renderer()
                .module_artifact(module)
                .map(|contents| EmittedArtifact {
                    name: module_artifact_name(module),
                    contents,
                })
        } else {
            return None;
        };
        if item.is_err() {
            self.failed = true;
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            return (0, Some(0));
        }
        let left = self.emitter.artifact_count() - self.next_type - self.next_module;
        (0, Some(left))
    }
}
