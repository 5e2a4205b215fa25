//! Canonical resource addresses ("self links") for created entities.

use uuid::Uuid;

use crate::EntityKind;

/// Renders the canonical address of an entity.
pub trait SelfLinker: Send + Sync {
    fn self_link(&self, kind: EntityKind, id: Uuid) -> String;
}

/// Links of the form `{service_root}/{Collection}({id})`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRootLinker {
    service_root: String,
}

impl ServiceRootLinker {
    pub fn new(service_root: impl Into<String>) -> Self {
        let mut service_root = service_root.into();
        while service_root.ends_with('/') {
            service_root.pop();
        }
        Self { service_root }
    }

    pub fn service_root(&self) -> &str {
        &self.service_root
    }
}

impl SelfLinker for ServiceRootLinker {
    fn self_link(&self, kind: EntityKind, id: Uuid) -> String {
        format!("{}/{}({})", self.service_root, kind.collection(), id)
    }
}
