//! Change-notification callback registries.
//!
//! For each event kind the core keeps a set of unique listener
//! function pointers behind its own reader-writer lock, so dispatch
//! can run concurrently with registration on other sets. Listeners
//! must not mutate the set they are being dispatched from (they may
//! mutate other sets), and must not call back into the manager that
//! is dispatching them.
//!
//! Listeners are plain `fn` pointers: uniqueness and the
//! `CallbackAlreadyExist` / `CallbackNotFound` contract fall out of
//! set semantics, and the signatures mirror the embedding ABI, where
//! subscribers hand the core raw function addresses.

use std::hash::Hash;

use ahash::AHashSet;
use parking_lot::RwLock;
use warden_types::{Action, CookieValue, Status};

/// A set of unique listeners for one event kind.
pub struct CallbackSet<F> {
    callbacks: RwLock<AHashSet<F>>,
}

impl<F> Default for CallbackSet<F> {
    fn default() -> Self {
        Self {
            callbacks: RwLock::new(AHashSet::new()),
        }
    }
}

impl<F: Copy + Eq + Hash> CallbackSet<F> {
    /// Adds a listener.
    ///
    /// Returns `CallbackAlreadyExist` if it was already registered.
    pub fn register(&self, callback: F) -> Status {
        if self.callbacks.write().insert(callback) {
            Status::Success
        } else {
            Status::CallbackAlreadyExist
        }
    }

    /// Removes a listener.
    ///
    /// Returns `CallbackNotFound` if it was not registered.
    pub fn unregister(&self, callback: F) -> Status {
        if self.callbacks.write().remove(&callback) {
            Status::Success
        } else {
            Status::CallbackNotFound
        }
    }

    /// Invokes `invoke` for every registered listener, under the
    /// shared lock. Order is unspecified.
    pub fn dispatch(&self, mut invoke: impl FnMut(F)) {
        for callback in self.callbacks.read().iter() {
            invoke(*callback);
        }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Returns `true` if no listeners are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── user events ──────────────────────────────────────────────

/// A permission was added to or removed from a user.
pub type UserPermissionListener =
    fn(plugin_id: u64, action: Action, target_id: u64, perm: &str, timestamp: i64);

/// A cookie was set on a user.
pub type UserCookieListener = fn(plugin_id: u64, target_id: u64, name: &str, value: &CookieValue);

/// A group membership was added to or removed from a user.
pub type UserGroupListener =
    fn(plugin_id: u64, action: Action, target_id: u64, group: &str, timestamp: i64);

/// A user was created.
pub type UserCreateListener =
    fn(plugin_id: u64, target_id: u64, immunity: i32, groups: &[String], perms: &[String]);

/// A user is about to be deleted.
pub type UserDeleteListener = fn(plugin_id: u64, target_id: u64);

/// A temporary permission expired.
pub type PermExpirationListener = fn(target_id: u64, perm: &str);

/// A temporary group membership expired.
pub type GroupExpirationListener = fn(target_id: u64, group: &str);

/// A user data load was requested; storage providers perform the
/// actual load through the regular create/add calls.
pub type UserLoadListener = fn(plugin_id: u64, target_id: u64);

/// The callback sets of the user manager, one per event kind.
#[derive(Default)]
pub struct UserEvents {
    /// Permission add/remove.
    pub permission_change: CallbackSet<UserPermissionListener>,
    /// Cookie sets.
    pub set_cookie: CallbackSet<UserCookieListener>,
    /// Membership add/remove.
    pub group_change: CallbackSet<UserGroupListener>,
    /// User creation.
    pub create: CallbackSet<UserCreateListener>,
    /// User deletion (dispatched before the record is erased).
    pub delete: CallbackSet<UserDeleteListener>,
    /// Temporary permission expiry.
    pub perm_expiration: CallbackSet<PermExpirationListener>,
    /// Temporary membership expiry.
    pub group_expiration: CallbackSet<GroupExpirationListener>,
    /// Load requests.
    pub load: CallbackSet<UserLoadListener>,
}

// ── group events ─────────────────────────────────────────────

/// A parent group was assigned to a child group.
pub type GroupParentListener = fn(child: &str, parent: &str);

/// A cookie was set on a group.
pub type GroupCookieListener = fn(group: &str, name: &str, value: &CookieValue);

/// A permission was added to or removed from a group.
pub type GroupPermissionListener = fn(action: Action, group: &str, perm: &str);

/// A group was created.
pub type GroupCreateListener = fn(name: &str, perms: &[String], priority: i32, parent: &str);

/// A group is about to be deleted.
pub type GroupDeleteListener = fn(name: &str);

/// A group definition load was requested.
pub type LoadGroupsListener = fn(plugin_id: u64);

/// The callback sets of the group manager, one per event kind.
#[derive(Default)]
pub struct GroupEvents {
    /// Parent assignment.
    pub set_parent: CallbackSet<GroupParentListener>,
    /// Cookie sets.
    pub set_cookie: CallbackSet<GroupCookieListener>,
    /// Permission add/remove.
    pub permission_change: CallbackSet<GroupPermissionListener>,
    /// Group creation.
    pub create: CallbackSet<GroupCreateListener>,
    /// Group deletion (dispatched before the cascade runs).
    pub delete: CallbackSet<GroupDeleteListener>,
    /// Load requests.
    pub load: CallbackSet<LoadGroupsListener>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static HITS: AtomicUsize = AtomicUsize::new(0);

    fn listener_a(_plugin: u64, _target: u64) {
        HITS.fetch_add(1, Ordering::SeqCst);
    }

    fn listener_b(_plugin: u64, _target: u64) {
        HITS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn register_is_unique() {
        let set: CallbackSet<UserLoadListener> = CallbackSet::default();
        assert_eq!(set.register(listener_a), Status::Success);
        assert_eq!(set.register(listener_a), Status::CallbackAlreadyExist);
        assert_eq!(set.register(listener_b), Status::Success);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn unregister_missing_reports_not_found() {
        let set: CallbackSet<UserLoadListener> = CallbackSet::default();
        assert_eq!(set.unregister(listener_a), Status::CallbackNotFound);
        set.register(listener_a);
        assert_eq!(set.unregister(listener_a), Status::Success);
        assert!(set.is_empty());
    }

    #[test]
    fn dispatch_reaches_every_listener() {
        let set: CallbackSet<UserLoadListener> = CallbackSet::default();
        set.register(listener_a);
        set.register(listener_b);

        HITS.store(0, Ordering::SeqCst);
        set.dispatch(|cb| cb(1, 2));
        assert_eq!(HITS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dispatch_on_empty_set_is_noop() {
        let set: CallbackSet<UserLoadListener> = CallbackSet::default();
        set.dispatch(|cb| cb(0, 0));
    }
}
