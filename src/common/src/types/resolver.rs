//! Bookkeeping for building types that refer to themselves.
//!
//! While a record type is being constructed, a nested reference back to it
//! cannot be built (that would recurse forever). The builder instead asks for
//! an [`CyclicResolver::unresolved`] placeholder, finishes the outer type, and
//! records it with [`CyclicResolver::set_resolution`]. Later reads pass types
//! through [`CyclicResolver::resolve`] to swap the placeholder for the real type.
//!
//! One resolver is bound per thread for the duration of a top-level
//! [`with_thread_instance`] call. Nested calls on the same thread are handed
//! the same resolver, so a cycle that spans several construction calls is
//! tracked in one place.

use crate::{Attribute, DataType, TypeKey};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

thread_local! {
    static THREAD_RESOLVER: RefCell<Option<Rc<CyclicResolver>>> = RefCell::new(None);
}

/// Resolution context for one top-level type construction.
#[derive(Debug, Default)]
pub struct CyclicResolver {
    /// Placeholder or real type per key.
    resolutions: RefCell<HashMap<TypeKey, DataType>>,
    /// Keys currently under construction.
    active: RefCell<HashSet<TypeKey>>,
    /// Types finished in this scope, cyclic or not.
    completed: RefCell<HashMap<TypeKey, DataType>>,
    /// Number of placeholders replaced by real types.
    resolution_count: Cell<usize>,
    /// Number of lookups answered from `completed`.
    reuse_count: Cell<usize>,
}

impl CyclicResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers and returns a placeholder for `key`.
    ///
    /// A real type already recorded for `key` is kept.
    pub fn unresolved(&self, key: TypeKey) -> DataType {
        let placeholder = DataType::Unresolved(key);
        self.resolutions
            .borrow_mut()
            .entry(key)
            .or_insert_with(|| placeholder.clone());
        placeholder
    }

    /// Returns the real type behind a placeholder if one has been recorded.
    ///
    /// Anything else, including a placeholder that is still pending, comes
    /// back unchanged.
    pub fn resolve(&self, ty: &DataType) -> DataType {
        if let DataType::Unresolved(key) = ty {
            if let Some(resolved) = self.resolutions.borrow().get(key) {
                return resolved.clone();
            }
        }
        ty.clone()
    }

    /// Replaces the placeholder for `key` with `result`.
    ///
    /// No-op unless a placeholder is currently registered for `key`.
    pub fn set_resolution(&self, key: TypeKey, result: DataType) {
        let mut resolutions = self.resolutions.borrow_mut();
        match resolutions.get(&key) {
            Some(DataType::Unresolved(_)) => {
                debug!("resolved type {} as {}", key, result.digest());
                resolutions.insert(key, result);
                self.resolution_count.set(self.resolution_count.get() + 1);
            }
            _ => trace!("no placeholder for type {}, resolution skipped", key),
        }
    }

    /// Marks `key` as under construction.
    ///
    /// Returns false if it already was, which means the caller has hit a cycle
    /// and should use [`CyclicResolver::unresolved`] instead of recursing.
    pub fn enter(&self, key: TypeKey) -> bool {
        self.active.borrow_mut().insert(key)
    }

    /// Marks `key` as no longer under construction.
    pub fn leave(&self, key: TypeKey) {
        self.active.borrow_mut().remove(&key);
    }

    /// Records the finished type for `key` so later references reuse it.
    pub fn complete(&self, key: TypeKey, result: DataType) {
        self.completed.borrow_mut().insert(key, result);
    }

    /// Returns the type finished earlier in this scope for `key`, if any.
    pub fn completed(&self, key: TypeKey) -> Option<DataType> {
        let found = self.completed.borrow().get(&key).cloned();
        if found.is_some() {
            self.reuse_count.set(self.reuse_count.get() + 1);
        }
        found
    }

    /// Passes every field type through [`CyclicResolver::resolve`].
    pub fn resolve_list(&self, fields: Vec<Attribute>) -> Vec<Attribute> {
        fields
            .into_iter()
            .map(|a| {
                let dtype = self.resolve(&a.dtype);
                Attribute::new(a.name, dtype)
            })
            .collect()
    }

    pub fn resolution_count(&self) -> usize {
        self.resolution_count.get()
    }

    pub fn reuse_count(&self) -> usize {
        self.reuse_count.get()
    }
}

/// Unbinds the thread's resolver when the top-level call exits, by return or unwind.
struct Binding;

impl Drop for Binding {
    fn drop(&mut self) {
        let _ = THREAD_RESOLVER.try_with(|slot| slot.borrow_mut().take());
    }
}

/// Runs `action` with a resolver bound to this thread.
///
/// Creates and binds a new resolver if none is bound, and unbinds it when
/// `action` returns or panics. If one is already bound, `action` gets that one.
pub fn with_thread_instance<R, F>(action: F) -> R
where
    F: FnOnce(&CyclicResolver) -> R,
{
    if let Some(resolver) = THREAD_RESOLVER.with(|slot| slot.borrow().clone()) {
        return action(&resolver);
    }
    let resolver = Rc::new(CyclicResolver::new());
    THREAD_RESOLVER.with(|slot| *slot.borrow_mut() = Some(Rc::clone(&resolver)));
    let _binding = Binding;
    action(&resolver)
}

/// True while a [`with_thread_instance`] call is running on this thread.
pub fn is_bound() -> bool {
    THREAD_RESOLVER.with(|slot| slot.borrow().is_some())
}

/// Resolves field types through the thread's resolver, if one is bound.
///
/// Outside of [`with_thread_instance`] the fields come back unchanged.
pub fn resolve_list(fields: Vec<Attribute>) -> Vec<Attribute> {
    match THREAD_RESOLVER.with(|slot| slot.borrow().clone()) {
        Some(resolver) => resolver.resolve_list(fields),
        None => fields,
    }
}
