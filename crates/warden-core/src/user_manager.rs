//! User manager façade.
//!
//! Reads that resolve group chains (verdicts, immunity, membership
//! kinds, cookie fallback) take the group registry lock shared and
//! the user registry lock shared, in that order; mutations take the
//! user registry lock exclusively. Change events are dispatched
//! while the registry lock is held — except expiration events, which
//! the core fans out after the lock is released — and each mutating
//! operation accepts a `dont_broadcast` flag so storage providers
//! can replay state without echoing it back to themselves.

use warden_engine::Fingerprint;
use warden_types::{
    split_temp_suffix, str_hash, Action, CookieValue, PermSource, Status,
};

use crate::core::PermissionsCore;
use crate::events::{
    GroupExpirationListener, PermExpirationListener, UserCookieListener, UserCreateListener,
    UserDeleteListener, UserGroupListener, UserLoadListener, UserPermissionListener,
};
use crate::user::User;

/// Splits a `"<value> <unix_ts>"` entry, tolerating malformed tails:
/// a bad tail is logged and the value is treated as permanent.
fn split_entry(entry: &str) -> (&str, i64) {
    match split_temp_suffix(entry) {
        Ok(pair) => pair,
        Err(error) => {
            tracing::warn!(%error, entry, "malformed expiry tail, treating entry as permanent");
            (entry.split_once(' ').map_or(entry, |(value, _)| value), 0)
        }
    }
}

impl PermissionsCore {
    /// Creates a user.
    ///
    /// `group_names` and `perms` may carry ` <unix_ts>` tails for
    /// temporary entries. Every group name must resolve; every entry
    /// flows through the same precedence logic as
    /// [`add_permission`](Self::add_permission) /
    /// [`add_group`](Self::add_group), so overlaps collapse the same
    /// way they would at runtime. `immunity` of −1 derives immunity
    /// from the highest membership priority.
    pub fn create_user(
        &self,
        plugin_id: u64,
        target_id: u64,
        immunity: i32,
        group_names: &[String],
        perms: &[String],
    ) -> Status {
        let groups = self.groups.read();
        let mut users = self.users.write();
        if users.contains(target_id) {
            return Status::UserAlreadyExist;
        }

        let mut memberships = Vec::with_capacity(group_names.len());
        for entry in group_names {
            let (name, timestamp) = split_entry(entry);
            let key = str_hash(name);
            if !groups.contains(key) {
                return Status::GroupNotFound;
            }
            memberships.push((key, timestamp));
        }

        let mut user = User::new(target_id, immunity);
        for (key, timestamp) in memberships {
            // Transitive duplicates collapse silently here.
            let _ = user.add_group(key, timestamp, &groups, &self.timers, &self.group_expire);
        }
        for entry in perms {
            let (perm, timestamp) = split_entry(entry);
            let _ = user.add_perm(perm, timestamp, &groups, &self.timers, &self.perm_expire);
        }
        user.direct_nodes.optimize();
        user.temp_nodes.optimize();
        users.insert(user);

        tracing::debug!(user = target_id, immunity, "user created");
        self.user_events
            .create
            .dispatch(|cb| cb(plugin_id, target_id, immunity, group_names, perms));
        Status::Success
    }

    /// Deletes a user: subscribers are notified first, then every
    /// pending timer anchored in the record is killed and the record
    /// erased.
    pub fn delete_user(&self, plugin_id: u64, target_id: u64) -> Status {
        let mut users = self.users.write();
        if !users.contains(target_id) {
            return Status::TargetUserNotFound;
        }
        self.user_events
            .delete
            .dispatch(|cb| cb(plugin_id, target_id));
        if let Some(user) = users.remove(target_id) {
            user.kill_timers(&self.timers);
        }
        tracing::debug!(user = target_id, "user deleted");
        Status::Success
    }

    /// Returns `true` if the user is registered.
    #[must_use]
    pub fn user_exists(&self, target_id: u64) -> bool {
        self.users.read().contains(target_id)
    }

    /// Requests loading of a user's data. Dispatches the load event
    /// only; storage providers subscribe and perform the actual load
    /// through the regular create/add calls.
    pub fn load_user(&self, plugin_id: u64, target_id: u64) {
        self.user_events
            .load
            .dispatch(|cb| cb(plugin_id, target_id));
    }

    /// Resolves a permission through the user's four layers.
    ///
    /// Returns the first decisive verdict, or `PermNotFound` when
    /// every layer abstains; `TargetUserNotFound` for an unknown id.
    pub fn has_permission(&self, target_id: u64, perm: &str) -> Status {
        match self.resolve_permission(target_id, perm) {
            Ok((verdict, _)) => verdict,
            Err(status) => status,
        }
    }

    /// Like [`has_permission`](Self::has_permission), also reporting
    /// which layer produced the verdict.
    ///
    /// # Errors
    ///
    /// `TargetUserNotFound` for an unknown id.
    pub fn resolve_permission(
        &self,
        target_id: u64,
        perm: &str,
    ) -> Result<(Status, PermSource), Status> {
        let groups = self.groups.read();
        let users = self.users.read();
        let user = users.get(target_id).ok_or(Status::TargetUserNotFound)?;
        Ok(user.resolve(&Fingerprint::parse(perm), &groups))
    }

    /// Renders the user's own declarations (direct, then temporary).
    ///
    /// # Errors
    ///
    /// `TargetUserNotFound` for an unknown id.
    pub fn dump_permissions(&self, target_id: u64) -> Result<Vec<String>, Status> {
        let users = self.users.read();
        users
            .get(target_id)
            .map(User::dump_perms)
            .ok_or(Status::TargetUserNotFound)
    }

    /// Compares actor and target immunity: `Allow` iff the actor's
    /// effective immunity is at least the target's.
    pub fn can_affect_user(&self, actor_id: u64, target_id: u64) -> Status {
        let groups = self.groups.read();
        let users = self.users.read();
        let Some(actor) = users.get(actor_id) else {
            return Status::ActorUserNotFound;
        };
        let Some(target) = users.get(target_id) else {
            return Status::TargetUserNotFound;
        };
        if actor.effective_immunity(&groups) >= target.effective_immunity(&groups) {
            Status::Allow
        } else {
            Status::Disallow
        }
    }

    /// Reports how the user holds the group: `PermanentGroup` or
    /// `TemporalGroup` when it is reachable through a membership's
    /// parent chain, `GroupNotDefined` otherwise.
    pub fn has_group(&self, target_id: u64, group_name: &str) -> Status {
        let groups = self.groups.read();
        let users = self.users.read();
        let Some(user) = users.get(target_id) else {
            return Status::TargetUserNotFound;
        };
        let key = str_hash(group_name);
        if !groups.contains(key) {
            return Status::GroupNotFound;
        }
        user.membership_kind(key, &groups)
    }

    /// Names of the user's memberships: permanent groups first, then
    /// temporary ones rendered as `"<name> <unix_ts>"`.
    ///
    /// # Errors
    ///
    /// `TargetUserNotFound` for an unknown id.
    pub fn get_user_groups(&self, target_id: u64) -> Result<Vec<String>, Status> {
        let groups = self.groups.read();
        let users = self.users.read();
        let user = users.get(target_id).ok_or(Status::TargetUserNotFound)?;

        let mut names = Vec::with_capacity(user.groups.len() + user.temp_groups.len());
        for &key in &user.groups {
            if let Some(group) = groups.get(key) {
                names.push(group.name().to_string());
            }
        }
        for membership in &user.temp_groups {
            if let Some(group) = groups.get(membership.group) {
                names.push(format!("{} {}", group.name(), membership.timestamp));
            }
        }
        Ok(names)
    }

    /// Returns the user's effective immunity: the explicit value, or
    /// the highest membership priority when set to −1.
    ///
    /// # Errors
    ///
    /// `TargetUserNotFound` for an unknown id.
    pub fn get_immunity(&self, target_id: u64) -> Result<i32, Status> {
        let groups = self.groups.read();
        let users = self.users.read();
        users
            .get(target_id)
            .map(|user| user.effective_immunity(&groups))
            .ok_or(Status::TargetUserNotFound)
    }

    /// Sets the user's explicit immunity (−1 re-enables derivation).
    pub fn set_immunity(&self, target_id: u64, immunity: i32) -> Status {
        let mut users = self.users.write();
        let Some(user) = users.get_mut(target_id) else {
            return Status::TargetUserNotFound;
        };
        user.immunity = immunity;
        Status::Success
    }

    /// Adds a permission to a user; `timestamp` of 0 is permanent,
    /// otherwise an absolute expiry. See the precedence rules on
    /// [`User`]. Dispatches the permission-change event on success
    /// unless `dont_broadcast` is set.
    pub fn add_permission(
        &self,
        plugin_id: u64,
        target_id: u64,
        perm: &str,
        timestamp: i64,
        dont_broadcast: bool,
    ) -> Status {
        let groups = self.groups.read();
        let mut users = self.users.write();
        let Some(user) = users.get_mut(target_id) else {
            return Status::TargetUserNotFound;
        };
        let status = user.add_perm(perm, timestamp, &groups, &self.timers, &self.perm_expire);
        if status == Status::Success {
            tracing::trace!(user = target_id, perm, timestamp, "permission added");
            if !dont_broadcast {
                self.user_events.permission_change.dispatch(|cb| {
                    cb(plugin_id, Action::Add, target_id, perm, timestamp);
                });
            }
        }
        status
    }

    /// Removes a user-level permission declaration.
    ///
    /// Group-provided permissions are not removable here and report
    /// `PermNotFound`. The emitted event carries `timestamp` 1 when
    /// a temporary declaration was removed and 0 for a permanent
    /// one, so subscribers can tell the layers apart.
    pub fn remove_permission(
        &self,
        plugin_id: u64,
        target_id: u64,
        perm: &str,
        dont_broadcast: bool,
    ) -> Status {
        let groups = self.groups.read();
        let mut users = self.users.write();
        let Some(user) = users.get_mut(target_id) else {
            return Status::TargetUserNotFound;
        };

        let fp = Fingerprint::parse(perm);
        let (_, source) = user.resolve(&fp, &groups);
        if !matches!(source, PermSource::TempUser | PermSource::DirectUser) {
            return Status::PermNotFound;
        }
        let marker = i64::from(source == PermSource::TempUser);
        if !dont_broadcast {
            self.user_events.permission_change.dispatch(|cb| {
                cb(plugin_id, Action::Remove, target_id, perm, marker);
            });
        }
        user.remove_layer(source, &fp, &self.timers);
        tracing::trace!(user = target_id, perm, "permission removed");
        Status::Success
    }

    /// Adds a group membership; `timestamp` of 0 is permanent,
    /// otherwise an absolute expiry. Memberships already reachable
    /// through a parent chain are refused with `GroupAlreadyExist`;
    /// an existing temporary membership is rescheduled or promoted.
    pub fn add_group(
        &self,
        plugin_id: u64,
        target_id: u64,
        group_name: &str,
        timestamp: i64,
        dont_broadcast: bool,
    ) -> Status {
        let groups = self.groups.read();
        let mut users = self.users.write();
        let Some(user) = users.get_mut(target_id) else {
            return Status::TargetUserNotFound;
        };
        let key = str_hash(group_name);
        if !groups.contains(key) {
            return Status::GroupNotFound;
        }

        let status = user.add_group(key, timestamp, &groups, &self.timers, &self.group_expire);
        if status == Status::Success {
            tracing::trace!(user = target_id, group = group_name, timestamp, "group added");
            if !dont_broadcast {
                self.user_events.group_change.dispatch(|cb| {
                    cb(plugin_id, Action::Add, target_id, group_name, timestamp);
                });
            }
        }
        status
    }

    /// Removes the exact membership (parent chains are not
    /// searched). The emitted event carries the membership's stored
    /// expiry for a temporary one and 0 for a permanent one.
    ///
    /// Returns `ChildGroupNotFound` for an unknown group and
    /// `ParentGroupNotFound` when the user holds no such membership.
    pub fn remove_group(
        &self,
        plugin_id: u64,
        target_id: u64,
        group_name: &str,
        dont_broadcast: bool,
    ) -> Status {
        let groups = self.groups.read();
        let mut users = self.users.write();
        let Some(user) = users.get_mut(target_id) else {
            return Status::TargetUserNotFound;
        };
        let key = str_hash(group_name);
        if !groups.contains(key) {
            return Status::ChildGroupNotFound;
        }

        match user.remove_membership(key, &self.timers) {
            Some(marker) => {
                tracing::trace!(user = target_id, group = group_name, "group removed");
                if !dont_broadcast {
                    self.user_events.group_change.dispatch(|cb| {
                        cb(plugin_id, Action::Remove, target_id, group_name, marker);
                    });
                }
                Status::Success
            }
            None => Status::ParentGroupNotFound,
        }
    }

    /// Resolves a cookie: the user's own map first, then each
    /// permanent membership's parent chain.
    ///
    /// # Errors
    ///
    /// `TargetUserNotFound` or `CookieNotFound`.
    pub fn get_cookie(&self, target_id: u64, name: &str) -> Result<CookieValue, Status> {
        let groups = self.groups.read();
        let users = self.users.read();
        let user = users.get(target_id).ok_or(Status::TargetUserNotFound)?;

        if let Some(value) = user.cookies.get(name) {
            return Ok(value.clone());
        }
        for &key in &user.groups {
            if let Some(value) = groups.cookie_chain(key, name) {
                return Ok(value.clone());
            }
        }
        Err(Status::CookieNotFound)
    }

    /// Sets a cookie on the user.
    pub fn set_cookie(
        &self,
        plugin_id: u64,
        target_id: u64,
        name: &str,
        value: CookieValue,
    ) -> Status {
        let mut users = self.users.write();
        let Some(user) = users.get_mut(target_id) else {
            return Status::TargetUserNotFound;
        };
        user.cookies.insert(name.to_string(), value.clone());
        self.user_events
            .set_cookie
            .dispatch(|cb| cb(plugin_id, target_id, name, &value));
        Status::Success
    }

    /// Returns the user's own cookies (group cookies excluded).
    ///
    /// # Errors
    ///
    /// `TargetUserNotFound` for an unknown id.
    pub fn get_all_cookies(&self, target_id: u64) -> Result<Vec<(String, CookieValue)>, Status> {
        let users = self.users.read();
        let user = users.get(target_id).ok_or(Status::TargetUserNotFound)?;
        Ok(user
            .cookies
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    // ── event registration ───────────────────────────────────

    /// Registers a user permission-change listener.
    pub fn on_user_permission_change_register(&self, callback: UserPermissionListener) -> Status {
        self.user_events.permission_change.register(callback)
    }

    /// Unregisters a user permission-change listener.
    pub fn on_user_permission_change_unregister(&self, callback: UserPermissionListener) -> Status {
        self.user_events.permission_change.unregister(callback)
    }

    /// Registers a user cookie listener.
    pub fn on_user_set_cookie_register(&self, callback: UserCookieListener) -> Status {
        self.user_events.set_cookie.register(callback)
    }

    /// Unregisters a user cookie listener.
    pub fn on_user_set_cookie_unregister(&self, callback: UserCookieListener) -> Status {
        self.user_events.set_cookie.unregister(callback)
    }

    /// Registers a membership-change listener.
    pub fn on_user_group_change_register(&self, callback: UserGroupListener) -> Status {
        self.user_events.group_change.register(callback)
    }

    /// Unregisters a membership-change listener.
    pub fn on_user_group_change_unregister(&self, callback: UserGroupListener) -> Status {
        self.user_events.group_change.unregister(callback)
    }

    /// Registers a user-creation listener.
    pub fn on_user_create_register(&self, callback: UserCreateListener) -> Status {
        self.user_events.create.register(callback)
    }

    /// Unregisters a user-creation listener.
    pub fn on_user_create_unregister(&self, callback: UserCreateListener) -> Status {
        self.user_events.create.unregister(callback)
    }

    /// Registers a user-deletion listener.
    pub fn on_user_delete_register(&self, callback: UserDeleteListener) -> Status {
        self.user_events.delete.register(callback)
    }

    /// Unregisters a user-deletion listener.
    pub fn on_user_delete_unregister(&self, callback: UserDeleteListener) -> Status {
        self.user_events.delete.unregister(callback)
    }

    /// Registers a temporary-permission expiry listener.
    pub fn on_permission_expiration_register(&self, callback: PermExpirationListener) -> Status {
        self.user_events.perm_expiration.register(callback)
    }

    /// Unregisters a temporary-permission expiry listener.
    pub fn on_permission_expiration_unregister(&self, callback: PermExpirationListener) -> Status {
        self.user_events.perm_expiration.unregister(callback)
    }

    /// Registers a temporary-membership expiry listener.
    pub fn on_group_expiration_register(&self, callback: GroupExpirationListener) -> Status {
        self.user_events.group_expiration.register(callback)
    }

    /// Unregisters a temporary-membership expiry listener.
    pub fn on_group_expiration_unregister(&self, callback: GroupExpirationListener) -> Status {
        self.user_events.group_expiration.unregister(callback)
    }

    /// Registers a load-user-request listener.
    pub fn on_load_user_register(&self, callback: UserLoadListener) -> Status {
        self.user_events.load.register(callback)
    }

    /// Unregisters a load-user-request listener.
    pub fn on_load_user_unregister(&self, callback: UserLoadListener) -> Status {
        self.user_events.load.unregister(callback)
    }
}
