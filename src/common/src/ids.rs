use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

static TYPE_KEY_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identity of a type under construction.
///
/// Keys compare by id only, never by the structure of the type they stand
/// for, so they stay usable while that structure is incomplete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeKey {
    id: u64,
}

impl TypeKey {
    /// Allocates a fresh key.
    pub fn new() -> Self {
        Self {
            id: TYPE_KEY_COUNTER.fetch_add(1, Ordering::SeqCst),
        }
    }

    /// Derives the key for a named descriptor by hashing its name.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the descriptor.
    pub fn named(name: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self {
            id: hasher.finish(),
        }
    }

    /// Returns the key id.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Default for TypeKey {
    fn default() -> Self {
        TypeKey::new()
    }
}

impl From<u64> for TypeKey {
    fn from(id: u64) -> Self {
        Self { id }
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
