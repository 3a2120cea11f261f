use crate::client::{Convergence, ObjectKind, ObjectRef, PlatformClient, PlatformObject};
use crate::ProviderError;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tempfile::NamedTempFile;

/// Platform call that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Ensure,
    Remove,
    Find,
}

/// A real change made to the mock platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    Created(ObjectRef),
    Updated(ObjectRef),
    Removed(ObjectRef),
}

#[derive(Default)]
struct MockState {
    objects: BTreeMap<ObjectRef, PlatformObject>,
    effects: Vec<SideEffect>,
    failures: HashSet<(MockOp, ObjectRef)>,
}

/// In-memory platform that behaves like a strict live one.
///
/// Ensuring an object whose dependencies are missing fails, as does removing
/// an object another object still depends on. Re-ensuring an identical object
/// is `Unchanged` and leaves no side effect.
#[derive(Default)]
pub struct MockPlatform {
    state: Mutex<MockState>,
    snapshot: Option<PathBuf>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock whose objects survive the process in a JSON file at `path`.
    pub fn persistent(path: impl Into<PathBuf>) -> Result<Self, ProviderError> {
        let path = path.into();
        let mut state = MockState::default();
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let objects: Vec<PlatformObject> = serde_json::from_str(&content)?;
            state.objects = objects.into_iter().map(|o| (o.object_ref(), o)).collect();
            tracing::debug!(
                "loaded {} mock objects from {}",
                state.objects.len(),
                path.display()
            );
        }
        Ok(Self {
            state: Mutex::new(state),
            snapshot: Some(path),
        })
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every `op` on the given object fail until cleared.
    pub fn fail_on(&self, op: MockOp, kind: ObjectKind, name: &str) {
        self.lock().failures.insert((op, ObjectRef::new(kind, name)));
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    pub fn effects(&self) -> Vec<SideEffect> {
        self.lock().effects.clone()
    }

    pub fn objects(&self) -> Vec<PlatformObject> {
        self.lock().objects.values().cloned().collect()
    }

    pub fn get(&self, kind: ObjectKind, name: &str) -> Option<PlatformObject> {
        self.lock().objects.get(&ObjectRef::new(kind, name)).cloned()
    }

    pub fn contains(&self, kind: ObjectKind, name: &str) -> bool {
        self.get(kind, name).is_some()
    }

    fn check_failure(state: &MockState, op: MockOp, target: &ObjectRef) -> Result<(), ProviderError> {
        if state.failures.contains(&(op, target.clone())) {
            return Err(ProviderError::Platform(format!(
                "injected {op:?} failure for {target}"
            )));
        }
        Ok(())
    }

    fn save(&self, state: &MockState) -> Result<(), ProviderError> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        let objects: Vec<&PlatformObject> = state.objects.values().collect();
        let content = serde_json::to_string_pretty(&objects)?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| ProviderError::Io(e.error))?;
        Ok(())
    }
}

impl PlatformClient for MockPlatform {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn ensure(&self, object: &PlatformObject) -> Result<Convergence, ProviderError> {
        let mut state = self.lock();
        let target = object.object_ref();
        Self::check_failure(&state, MockOp::Ensure, &target)?;

        if let Some(missing) = object
            .depends_on
            .iter()
            .find(|dep| !state.objects.contains_key(dep))
        {
            return Err(ProviderError::Platform(format!(
                "{target} requires {missing}, which does not exist"
            )));
        }

        let outcome = match state.objects.get(&target) {
            Some(existing) if existing == object => return Ok(Convergence::Unchanged),
            Some(_) => Convergence::Updated,
            None => Convergence::Created,
        };
        let previous = state.objects.insert(target.clone(), object.clone());
        if let Err(e) = self.save(&state) {
            match previous {
                Some(previous) => state.objects.insert(target, previous),
                None => state.objects.remove(&target),
            };
            return Err(e);
        }
        let effect = if outcome == Convergence::Created {
            SideEffect::Created(target)
        } else {
            SideEffect::Updated(target)
        };
        state.effects.push(effect);
        Ok(outcome)
    }

    fn remove(&self, kind: ObjectKind, name: &str) -> Result<bool, ProviderError> {
        let mut state = self.lock();
        let target = ObjectRef::new(kind, name);
        Self::check_failure(&state, MockOp::Remove, &target)?;

        if let Some(user) = state
            .objects
            .values()
            .find(|o| o.depends_on.contains(&target))
        {
            return Err(ProviderError::Platform(format!(
                "{target} is still used by {}",
                user.object_ref()
            )));
        }

        let Some(removed) = state.objects.remove(&target) else {
            return Ok(false);
        };
        if let Err(e) = self.save(&state) {
            state.objects.insert(target, removed);
            return Err(e);
        }
        state.effects.push(SideEffect::Removed(target));
        Ok(true)
    }

    fn find(&self, kind: ObjectKind, name: &str) -> Result<Option<String>, ProviderError> {
        let state = self.lock();
        let target = ObjectRef::new(kind, name);
        Self::check_failure(&state, MockOp::Find, &target)?;
        Ok(state.objects.contains_key(&target).then(|| {
            let hash = blake3::hash(target.to_string().as_bytes()).to_hex();
            format!("mock-{}", &hash[..12])
        }))
    }
}
