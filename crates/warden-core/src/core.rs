//! The core aggregate.
//!
//! [`PermissionsCore`] owns the two registries, the timer wheel, and
//! the callback sets. It replaces the process-wide globals of older
//! in-process permission systems with one aggregate the embedding
//! host wraps however it likes (the C ABI shim holds a single static
//! instance).
//!
//! # Locking
//!
//! Two reader-writer locks, one per registry. When both must be
//! held, the order is *always* groups first, then users; every
//! façade method below and in the manager modules follows it. A
//! group mutation that can race a user-layer verdict (group
//! permission and cookie writes, group deletion) takes both locks in
//! write mode.
//!
//! # Expiration
//!
//! Temporary entries schedule wheel timers whose user data carries
//! the permission line (or group name) and the user id — never a
//! node handle. When a timer fires, the callback re-resolves its
//! target under the registry locks, removes the expired entry, and
//! fans the expiration event out *after* the lock is released.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use warden_engine::{Fingerprint, TimerCallback, TimerValue, TimerWheel};
use warden_types::str_hash;

use crate::events::{GroupEvents, UserEvents};
use crate::group::GroupStore;
use crate::user::UserStore;

/// The in-memory authorization core: registries, timers, events.
///
/// Constructed behind an [`Arc`] so expiration callbacks can hold a
/// weak handle back into the aggregate.
///
/// ```
/// use warden_core::PermissionsCore;
/// use warden_types::Status;
///
/// let core = PermissionsCore::new();
/// core.create_group("admins", &["admin.*".into()], 10, "");
/// core.create_user(0, 42, -1, &["admins".into()], &[]);
/// assert_eq!(core.has_permission(42, "admin.kick"), Status::Allow);
/// ```
pub struct PermissionsCore {
    pub(crate) groups: RwLock<GroupStore>,
    pub(crate) users: RwLock<UserStore>,
    pub(crate) timers: TimerWheel,
    pub(crate) group_events: GroupEvents,
    pub(crate) user_events: UserEvents,
    /// Wheel callback for temporary permission expiry.
    pub(crate) perm_expire: TimerCallback,
    /// Wheel callback for temporary membership expiry.
    pub(crate) group_expire: TimerCallback,
}

impl std::fmt::Debug for PermissionsCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionsCore")
            .field("groups", &self.groups.read().len())
            .field("users", &self.users.read().len())
            .field("pending_timers", &self.timers.len())
            .finish()
    }
}

impl PermissionsCore {
    /// Creates an empty core.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let perm_weak = weak.clone();
            let group_weak = weak.clone();
            Self {
                groups: RwLock::new(GroupStore::default()),
                users: RwLock::new(UserStore::default()),
                timers: TimerWheel::new(),
                group_events: GroupEvents::default(),
                user_events: UserEvents::default(),
                perm_expire: Arc::new(move |_, data: &[TimerValue]| {
                    let Some(core) = perm_weak.upgrade() else {
                        return;
                    };
                    let (Some(perm), Some(target)) =
                        (data.first().and_then(|v| v.as_str()), data.get(1).and_then(|v| v.as_u64()))
                    else {
                        return;
                    };
                    core.expire_perm(perm, target);
                }),
                group_expire: Arc::new(move |_, data: &[TimerValue]| {
                    let Some(core) = group_weak.upgrade() else {
                        return;
                    };
                    let (Some(name), Some(target)) =
                        (data.first().and_then(|v| v.as_str()), data.get(1).and_then(|v| v.as_u64()))
                    else {
                        return;
                    };
                    core.expire_group(name, target);
                }),
            }
        })
    }

    /// Drives pending timer expirations. Called from the host's
    /// frame tick; expiration callbacks run on the calling thread.
    pub fn run_frame(&self) {
        self.timers.run_frame();
    }

    /// Number of pending expiration timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// The user-side event registries.
    #[must_use]
    pub fn user_events(&self) -> &UserEvents {
        &self.user_events
    }

    /// The group-side event registries.
    #[must_use]
    pub fn group_events(&self) -> &GroupEvents {
        &self.group_events
    }

    /// A temporary permission came due: drop it from the user's temp
    /// trie, then notify subscribers outside the lock.
    fn expire_perm(&self, perm: &str, target: u64) {
        {
            let mut users = self.users.write();
            let Some(user) = users.get_mut(target) else {
                return;
            };
            user.temp_nodes.remove(&Fingerprint::parse(perm), &self.timers);
        }
        tracing::trace!(user = target, perm, "temporary permission expired");
        self.user_events
            .perm_expiration
            .dispatch(|cb| cb(target, perm));
    }

    /// A temporary membership came due: drop it from the user's
    /// list, then notify subscribers outside the locks.
    fn expire_group(&self, name: &str, target: u64) {
        {
            let groups = self.groups.read();
            if !groups.contains(str_hash(name)) {
                return;
            }
            let mut users = self.users.write();
            let Some(user) = users.get_mut(target) else {
                return;
            };
            user.remove_temp_membership(str_hash(name), &self.timers);
        }
        tracing::trace!(user = target, group = name, "temporary membership expired");
        self.user_events
            .group_expiration
            .dispatch(|cb| cb(target, name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_types::{now_unix, Status};

    #[test]
    fn debug_format_reports_sizes() {
        let core = PermissionsCore::new();
        core.create_group("g", &[], 0, "");
        let rendered = format!("{core:?}");
        assert!(rendered.contains("groups: 1"));
        assert!(rendered.contains("users: 0"));
    }

    #[test]
    fn expired_perm_is_dropped_on_frame() {
        let core = PermissionsCore::new();
        core.create_user(0, 7, 0, &[], &[]);
        core.add_permission(0, 7, "vip.badge", now_unix() - 1, false);
        assert_eq!(core.has_permission(7, "vip.badge"), Status::Allow);

        core.run_frame();
        assert_eq!(core.has_permission(7, "vip.badge"), Status::PermNotFound);
        assert_eq!(core.pending_timers(), 0);
    }

    #[test]
    fn expiration_against_deleted_user_is_noop() {
        let core = PermissionsCore::new();
        core.create_user(0, 7, 0, &[], &[]);
        core.add_permission(0, 7, "vip.badge", now_unix() - 1, false);

        // Delete first; the pending timer is killed with the user.
        assert_eq!(core.delete_user(0, 7), Status::Success);
        core.run_frame();
        assert_eq!(core.pending_timers(), 0);
    }

    #[test]
    fn expired_membership_is_dropped_on_frame() {
        let core = PermissionsCore::new();
        core.create_group("event", &["vip.*".into()], 1, "");
        core.create_user(0, 7, 0, &[], &[]);
        core.add_group(0, 7, "event", now_unix() - 1, false);
        assert_eq!(core.has_permission(7, "vip.badge"), Status::Allow);

        core.run_frame();
        assert_eq!(core.has_permission(7, "vip.badge"), Status::PermNotFound);
        assert_eq!(core.has_group(7, "event"), Status::GroupNotDefined);
    }
}
