//! Reference targets.

use crate::entity::{EntityType, WeakEntityType};
use crate::error::{OdmError, OdmResult};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// The target of a reference field.
///
/// Either bound directly to a registered entity type, or holding a name
/// that is looked up in the owning registry on first use and memoized.
/// Clones share the memo, so a definition registered with several
/// registries only trusts the memo when it belongs to the owner's registry
/// and otherwise looks the name up again.
#[derive(Clone)]
pub struct TypeRef {
    name: String,
    resolved: Arc<OnceLock<WeakEntityType>>,
}

impl TypeRef {
    /// A deferred reference by entity type name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resolved: Arc::new(OnceLock::new()),
        }
    }

    /// A reference bound to a registered entity type.
    #[must_use]
    pub fn to(target: &EntityType) -> Self {
        let resolved = OnceLock::new();
        let _ = resolved.set(target.downgrade());
        Self {
            name: target.name().to_string(),
            resolved: Arc::new(resolved),
        }
    }

    /// Returns the target type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves the target within `owner`'s registry, looking it up by name
    /// unless the memo already points into that registry.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntityType` if no registered type has this name.
    pub fn resolve(&self, owner: &EntityType) -> OdmResult<EntityType> {
        if let Some(target) = self.resolved.get().and_then(WeakEntityType::upgrade) {
            if target.same_registry(owner) {
                return Ok(target);
            }
        }

        let target = owner
            .lookup(&self.name)
            .ok_or_else(|| OdmError::UnknownEntityType {
                name: self.name.clone(),
            })?;
        let _ = self.resolved.set(target.downgrade());
        Ok(target)
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRef")
            .field("name", &self.name)
            .field("resolved", &self.resolved.get().is_some())
            .finish()
    }
}
