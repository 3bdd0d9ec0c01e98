//! Group manager façade.
//!
//! Every operation takes the group registry lock (shared for reads,
//! exclusive for mutations); permission and cookie writes — the
//! mutations that can race a user-layer verdict — additionally take
//! the user registry lock exclusively, in the fixed groups → users
//! order. Change events are dispatched while the registry lock is
//! held; listeners must not call back into the managers.

use warden_engine::Fingerprint;
use warden_types::{str_hash, Action, CookieValue, Status};

use crate::core::PermissionsCore;
use crate::events::{
    GroupCookieListener, GroupCreateListener, GroupDeleteListener, GroupParentListener,
    GroupPermissionListener, LoadGroupsListener,
};
use crate::group::Group;

impl PermissionsCore {
    /// Creates a group with an initial permission set.
    ///
    /// `parent` may be empty for a root group.
    ///
    /// Returns `GroupAlreadyExist` or `ParentGroupNotFound` on
    /// collision or missing parent.
    pub fn create_group(&self, name: &str, perms: &[String], priority: i32, parent: &str) -> Status {
        let key = str_hash(name);
        let mut groups = self.groups.write();
        if groups.contains(key) {
            return Status::GroupAlreadyExist;
        }
        let parent_key = if parent.is_empty() {
            None
        } else {
            let parent_key = str_hash(parent);
            if !groups.contains(parent_key) {
                return Status::ParentGroupNotFound;
            }
            Some(parent_key)
        };

        groups.insert(key, Group::new(name, perms, priority, parent_key));
        tracing::debug!(group = name, priority, "group created");
        self.group_events
            .create
            .dispatch(|cb| cb(name, perms, priority, parent));
        Status::Success
    }

    /// Deletes a group and cascades: subscribers are notified, every
    /// other group pointing at it is orphaned, and the group is
    /// excised from every user's permanent and temporary membership
    /// lists (temporary timers killed).
    pub fn delete_group(&self, name: &str) -> Status {
        let key = str_hash(name);
        let mut groups = self.groups.write();
        if !groups.contains(key) {
            return Status::GroupNotFound;
        }

        self.group_events.delete.dispatch(|cb| cb(name));
        groups.remove(key);
        for group in groups.values_mut() {
            if group.parent == Some(key) {
                group.parent = None;
            }
        }

        let mut users = self.users.write();
        for user in users.values_mut() {
            user.groups.retain(|&member| member != key);
            user.remove_temp_membership(key, &self.timers);
        }

        tracing::debug!(group = name, "group deleted");
        Status::Success
    }

    /// Assigns `parent` as the parent of `child`.
    ///
    /// An assignment that would close a cycle (including
    /// self-parenting) is refused with `Disallow`.
    pub fn set_parent(&self, child: &str, parent: &str) -> Status {
        let child_key = str_hash(child);
        let parent_key = str_hash(parent);
        let mut groups = self.groups.write();
        if !groups.contains(child_key) {
            return Status::ChildGroupNotFound;
        }
        if !groups.contains(parent_key) {
            return Status::ParentGroupNotFound;
        }
        if groups.chain_reaches(parent_key, child_key) {
            tracing::warn!(child, parent, "parent assignment would close a cycle, refused");
            return Status::Disallow;
        }

        let Some(group) = groups.get_mut(child_key) else {
            return Status::ChildGroupNotFound;
        };
        group.parent = Some(parent_key);
        self.group_events.set_parent.dispatch(|cb| cb(child, parent));
        Status::Success
    }

    /// Returns the name of a group's parent.
    ///
    /// # Errors
    ///
    /// `ChildGroupNotFound` for an unknown group,
    /// `ParentGroupNotFound` for a root group.
    pub fn get_parent(&self, name: &str) -> Result<String, Status> {
        let groups = self.groups.read();
        let group = groups
            .get(str_hash(name))
            .ok_or(Status::ChildGroupNotFound)?;
        let parent_key = group.parent.ok_or(Status::ParentGroupNotFound)?;
        let parent = groups.get(parent_key).ok_or(Status::ParentGroupNotFound)?;
        Ok(parent.name().to_string())
    }

    /// Reports whether `parent` appears anywhere in `child`'s parent
    /// chain: `Allow` if so, `Disallow` otherwise.
    pub fn has_parent_group(&self, child: &str, parent: &str) -> Status {
        let groups = self.groups.read();
        let child_key = str_hash(child);
        let parent_key = str_hash(parent);
        if !groups.contains(child_key) {
            return Status::ChildGroupNotFound;
        }
        if !groups.contains(parent_key) {
            return Status::ParentGroupNotFound;
        }
        if groups.has_ancestor(child_key, parent_key) {
            Status::Allow
        } else {
            Status::Disallow
        }
    }

    /// Returns a group's priority.
    ///
    /// # Errors
    ///
    /// `GroupNotFound` for an unknown group.
    pub fn get_priority_group(&self, name: &str) -> Result<i32, Status> {
        let groups = self.groups.read();
        groups
            .get(str_hash(name))
            .map(Group::priority)
            .ok_or(Status::GroupNotFound)
    }

    /// Renders a group's own permission set (parents excluded).
    ///
    /// # Errors
    ///
    /// `GroupNotFound` for an unknown group.
    pub fn dump_permissions_group(&self, name: &str) -> Result<Vec<String>, Status> {
        let groups = self.groups.read();
        groups
            .get(str_hash(name))
            .map(|g| g.nodes.dump())
            .ok_or(Status::GroupNotFound)
    }

    /// Resolves a permission against a group and its parent chain.
    pub fn has_permission_group(&self, name: &str, perm: &str) -> Status {
        let groups = self.groups.read();
        let key = str_hash(name);
        if !groups.contains(key) {
            return Status::GroupNotFound;
        }
        groups.check_chain(key, &Fingerprint::parse(perm))
    }

    /// Adds a permission line to a group.
    ///
    /// Takes both registry locks exclusively: the change is visible
    /// to every member's next verdict.
    pub fn add_permission_group(&self, name: &str, perm: &str) -> Status {
        let mut groups = self.groups.write();
        let key = str_hash(name);
        let Some(group) = groups.get_mut(key) else {
            return Status::GroupNotFound;
        };

        let _users = self.users.write();
        group.nodes.add(&Fingerprint::parse(perm));
        tracing::trace!(group = name, perm, "group permission added");
        self.group_events
            .permission_change
            .dispatch(|cb| cb(Action::Add, name, perm));
        Status::Success
    }

    /// Removes a permission line from a group.
    pub fn remove_permission_group(&self, name: &str, perm: &str) -> Status {
        let mut groups = self.groups.write();
        let key = str_hash(name);
        let Some(group) = groups.get_mut(key) else {
            return Status::GroupNotFound;
        };

        let _users = self.users.write();
        self.group_events
            .permission_change
            .dispatch(|cb| cb(Action::Remove, name, perm));
        group.nodes.remove(&Fingerprint::parse(perm), &self.timers);
        tracing::trace!(group = name, perm, "group permission removed");
        Status::Success
    }

    /// Resolves a cookie through the group's parent chain.
    ///
    /// # Errors
    ///
    /// `GroupNotFound` or `CookieNotFound`.
    pub fn get_cookie_group(&self, name: &str, cookie: &str) -> Result<CookieValue, Status> {
        let groups = self.groups.read();
        let key = str_hash(name);
        if !groups.contains(key) {
            return Err(Status::GroupNotFound);
        }
        groups
            .cookie_chain(key, cookie)
            .cloned()
            .ok_or(Status::CookieNotFound)
    }

    /// Sets a cookie on the group itself (never on its parents).
    pub fn set_cookie_group(&self, name: &str, cookie: &str, value: CookieValue) -> Status {
        let mut groups = self.groups.write();
        let Some(group) = groups.get_mut(str_hash(name)) else {
            return Status::GroupNotFound;
        };

        let _users = self.users.write();
        self.group_events
            .set_cookie
            .dispatch(|cb| cb(name, cookie, &value));
        group.cookies.insert(cookie.to_string(), value);
        Status::Success
    }

    /// Returns the group's own cookies (parents excluded).
    ///
    /// # Errors
    ///
    /// `GroupNotFound` for an unknown group.
    pub fn get_all_cookies_group(&self, name: &str) -> Result<Vec<(String, CookieValue)>, Status> {
        let groups = self.groups.read();
        let group = groups.get(str_hash(name)).ok_or(Status::GroupNotFound)?;
        Ok(group
            .cookies
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    /// Names of all registered groups, in unspecified order.
    #[must_use]
    pub fn get_all_groups(&self) -> Vec<String> {
        let groups = self.groups.read();
        groups.iter().map(|(_, g)| g.name().to_string()).collect()
    }

    /// Returns `true` if the group is registered.
    #[must_use]
    pub fn group_exists(&self, name: &str) -> bool {
        self.groups.read().contains(str_hash(name))
    }

    /// Requests loading of group definitions; storage providers
    /// subscribe and perform the actual load through `create_group`.
    pub fn load_groups(&self, plugin_id: u64) {
        self.group_events.load.dispatch(|cb| cb(plugin_id));
    }

    // ── event registration ───────────────────────────────────

    /// Registers a parent-assignment listener.
    pub fn on_group_set_parent_register(&self, callback: GroupParentListener) -> Status {
        self.group_events.set_parent.register(callback)
    }

    /// Unregisters a parent-assignment listener.
    pub fn on_group_set_parent_unregister(&self, callback: GroupParentListener) -> Status {
        self.group_events.set_parent.unregister(callback)
    }

    /// Registers a group cookie listener.
    pub fn on_group_set_cookie_register(&self, callback: GroupCookieListener) -> Status {
        self.group_events.set_cookie.register(callback)
    }

    /// Unregisters a group cookie listener.
    pub fn on_group_set_cookie_unregister(&self, callback: GroupCookieListener) -> Status {
        self.group_events.set_cookie.unregister(callback)
    }

    /// Registers a group permission-change listener.
    pub fn on_group_permission_change_register(&self, callback: GroupPermissionListener) -> Status {
        self.group_events.permission_change.register(callback)
    }

    /// Unregisters a group permission-change listener.
    pub fn on_group_permission_change_unregister(
        &self,
        callback: GroupPermissionListener,
    ) -> Status {
        self.group_events.permission_change.unregister(callback)
    }

    /// Registers a group-creation listener.
    pub fn on_group_create_register(&self, callback: GroupCreateListener) -> Status {
        self.group_events.create.register(callback)
    }

    /// Unregisters a group-creation listener.
    pub fn on_group_create_unregister(&self, callback: GroupCreateListener) -> Status {
        self.group_events.create.unregister(callback)
    }

    /// Registers a group-deletion listener.
    pub fn on_group_delete_register(&self, callback: GroupDeleteListener) -> Status {
        self.group_events.delete.register(callback)
    }

    /// Unregisters a group-deletion listener.
    pub fn on_group_delete_unregister(&self, callback: GroupDeleteListener) -> Status {
        self.group_events.delete.unregister(callback)
    }

    /// Registers a load-groups-request listener.
    pub fn on_load_groups_register(&self, callback: LoadGroupsListener) -> Status {
        self.group_events.load.register(callback)
    }

    /// Unregisters a load-groups-request listener.
    pub fn on_load_groups_unregister(&self, callback: LoadGroupsListener) -> Status {
        self.group_events.load.unregister(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PermissionsCore;

    fn perms(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn create_and_exists() {
        let core = PermissionsCore::new();
        assert!(!core.group_exists("admins"));
        assert_eq!(
            core.create_group("admins", &perms(&["admin.*"]), 10, ""),
            Status::Success
        );
        assert!(core.group_exists("admins"));
        assert_eq!(
            core.create_group("admins", &[], 0, ""),
            Status::GroupAlreadyExist
        );
    }

    #[test]
    fn create_with_missing_parent_fails() {
        let core = PermissionsCore::new();
        assert_eq!(
            core.create_group("mods", &[], 5, "missing"),
            Status::ParentGroupNotFound
        );
    }

    #[test]
    fn parent_linkage() {
        let core = PermissionsCore::new();
        core.create_group("admins", &[], 10, "");
        core.create_group("mods", &[], 5, "");

        assert_eq!(core.set_parent("mods", "admins"), Status::Success);
        assert_eq!(core.get_parent("mods"), Ok("admins".to_string()));
        assert_eq!(core.get_parent("admins"), Err(Status::ParentGroupNotFound));
        assert_eq!(core.get_parent("missing"), Err(Status::ChildGroupNotFound));

        assert_eq!(core.has_parent_group("mods", "admins"), Status::Allow);
        assert_eq!(core.has_parent_group("admins", "mods"), Status::Disallow);
    }

    #[test]
    fn set_parent_refuses_cycles() {
        let core = PermissionsCore::new();
        core.create_group("a", &[], 0, "");
        core.create_group("b", &[], 0, "");
        core.create_group("c", &[], 0, "");
        assert_eq!(core.set_parent("b", "a"), Status::Success);
        assert_eq!(core.set_parent("c", "b"), Status::Success);

        // c's chain already reaches a; closing the loop is refused.
        assert_eq!(core.set_parent("a", "c"), Status::Disallow);
        assert_eq!(core.set_parent("a", "a"), Status::Disallow);
        // The existing links are untouched.
        assert_eq!(core.get_parent("c"), Ok("b".to_string()));
        assert_eq!(core.get_parent("a"), Err(Status::ParentGroupNotFound));
    }

    #[test]
    fn chain_permission_resolution() {
        let core = PermissionsCore::new();
        core.create_group("parent", &perms(&["chat.send"]), 5, "");
        core.create_group("child", &[], 10, "parent");

        assert_eq!(core.has_permission_group("child", "chat.send"), Status::Allow);
        assert_eq!(
            core.has_permission_group("child", "chat.shout"),
            Status::PermNotFound
        );

        // A child-level denial overrides the inherited grant.
        assert_eq!(
            core.add_permission_group("child", "-chat.send"),
            Status::Success
        );
        assert_eq!(
            core.has_permission_group("child", "chat.send"),
            Status::Disallow
        );
    }

    #[test]
    fn wildcard_precedence_in_group() {
        let core = PermissionsCore::new();
        core.create_group("admins", &perms(&["admin.*", "-admin.root"]), 10, "");

        assert_eq!(core.has_permission_group("admins", "admin.kick"), Status::Allow);
        assert_eq!(
            core.has_permission_group("admins", "admin.root"),
            Status::Disallow
        );
    }

    #[test]
    fn dump_reflects_mutations() {
        let core = PermissionsCore::new();
        core.create_group("admins", &perms(&["admin.kick", "-chat.spam"]), 10, "");
        core.add_permission_group("admins", "vip.*");
        core.remove_permission_group("admins", "admin.kick");

        let mut dump = core.dump_permissions_group("admins").expect("group present");
        dump.sort();
        assert_eq!(dump, ["-chat.spam", "vip.*"]);
        assert_eq!(
            core.dump_permissions_group("missing"),
            Err(Status::GroupNotFound)
        );
    }

    #[test]
    fn cookies_inherit_through_chain_on_get_only() {
        let core = PermissionsCore::new();
        core.create_group("parent", &[], 5, "");
        core.create_group("child", &[], 10, "parent");

        core.set_cookie_group("parent", "color", CookieValue::from("gold"));
        assert_eq!(
            core.get_cookie_group("child", "color")
                .expect("inherited cookie")
                .as_str(),
            Ok("gold")
        );

        // Set lands on the child itself, not on the parent.
        core.set_cookie_group("child", "tag", CookieValue::from("jr"));
        assert_eq!(
            core.get_cookie_group("parent", "tag"),
            Err(Status::CookieNotFound)
        );
        assert_eq!(
            core.get_all_cookies_group("parent").expect("group present").len(),
            1
        );
    }

    #[test]
    fn delete_orphans_children() {
        let core = PermissionsCore::new();
        core.create_group("parent", &[], 5, "");
        core.create_group("child", &[], 10, "parent");

        assert_eq!(core.delete_group("parent"), Status::Success);
        assert!(!core.group_exists("parent"));
        assert_eq!(core.get_parent("child"), Err(Status::ParentGroupNotFound));
        assert_eq!(core.delete_group("parent"), Status::GroupNotFound);
    }

    #[test]
    fn get_all_groups_lists_names() {
        let core = PermissionsCore::new();
        core.create_group("a", &[], 0, "");
        core.create_group("b", &[], 0, "");
        let mut names = core.get_all_groups();
        names.sort();
        assert_eq!(names, ["a", "b"]);
    }
}
