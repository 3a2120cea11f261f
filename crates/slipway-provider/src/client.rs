use crate::ProviderError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of object a platform manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Network,
    Container,
    Cluster,
    Release,
    Manifests,
    Proxy,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectKind::Network => "network",
            ObjectKind::Container => "container",
            ObjectKind::Cluster => "cluster",
            ObjectKind::Release => "release",
            ObjectKind::Manifests => "manifests",
            ObjectKind::Proxy => "proxy",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub name: String,
}

impl ObjectRef {
    pub fn new(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// Desired state of one platform object.
///
/// `settings` is the flattened declaration; `depends_on` lists the objects
/// that must exist while this one does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformObject {
    pub kind: ObjectKind,
    pub name: String,
    pub settings: BTreeMap<String, String>,
    pub depends_on: Vec<ObjectRef>,
}

impl PlatformObject {
    pub fn new(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            settings: BTreeMap::new(),
            depends_on: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.settings.insert(key.to_owned(), value.into());
        self
    }

    #[must_use]
    pub fn depends_on(mut self, kind: ObjectKind, name: impl Into<String>) -> Self {
        let target = ObjectRef::new(kind, name);
        if !self.depends_on.contains(&target) {
            self.depends_on.push(target);
        }
        self
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(self.kind, self.name.clone())
    }
}

/// Outcome of [`PlatformClient::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Convergence {
    Created,
    Updated,
    Unchanged,
}

impl fmt::Display for Convergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Convergence::Created => write!(f, "created"),
            Convergence::Updated => write!(f, "updated"),
            Convergence::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Shared handle to the platform that owns the real objects.
pub trait PlatformClient: Send + Sync {
    fn name(&self) -> &str;

    /// Create `object` or converge an existing one to its settings.
    fn ensure(&self, object: &PlatformObject) -> Result<Convergence, ProviderError>;

    /// Remove an object. Returns `false` if it was already absent.
    fn remove(&self, kind: ObjectKind, name: &str) -> Result<bool, ProviderError>;

    /// Platform identifier of an object, `None` if it does not exist.
    fn find(&self, kind: ObjectKind, name: &str) -> Result<Option<String>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depends_on_deduplicates() {
        let object = PlatformObject::new(ObjectKind::Proxy, "web")
            .depends_on(ObjectKind::Network, "net")
            .depends_on(ObjectKind::Network, "net");
        assert_eq!(object.depends_on.len(), 1);
        assert_eq!(object.depends_on[0].to_string(), "network/net");
    }
}
