//! Users and the user registry.
//!
//! A [`User`] layers four permission sources, consulted in a fixed
//! order until one is decisive:
//!
//! 1. the temporary trie (`temp_nodes`),
//! 2. the direct trie (`direct_nodes`),
//! 3. each temporary membership's group chain,
//! 4. each permanent membership's group chain.
//!
//! Membership lists are kept sorted by group priority, highest
//! first, and hold registry keys, never references. The dedup
//! invariant: a group already reachable through any existing
//! membership's parent chain is never added as a separate
//! membership.

use ahash::AHashMap;
use warden_engine::{Fingerprint, Node, TimerCallback, TimerId, TimerValue, TimerWheel};
use warden_types::{now_unix, CookieValue, PermSource, Status};

use crate::group::GroupStore;

/// A temporary group membership: the group's registry key, the
/// absolute expiry, and the wheel entry driving it.
#[derive(Debug, Clone, Copy)]
pub struct TempMembership {
    pub(crate) group: u64,
    pub(crate) timestamp: i64,
    pub(crate) timer: TimerId,
}

/// One registered user.
#[derive(Debug)]
pub struct User {
    pub(crate) id: u64,
    /// −1 means "derive from the highest group priority".
    pub(crate) immunity: i32,
    pub(crate) direct_nodes: Node,
    pub(crate) temp_nodes: Node,
    /// Permanent memberships, priority-sorted descending.
    pub(crate) groups: Vec<u64>,
    /// Temporary memberships, priority-sorted descending.
    pub(crate) temp_groups: Vec<TempMembership>,
    pub(crate) cookies: AHashMap<String, CookieValue>,
}

impl User {
    pub(crate) fn new(id: u64, immunity: i32) -> Self {
        Self {
            id,
            immunity,
            direct_nodes: Node::new(),
            temp_nodes: Node::new(),
            groups: Vec::new(),
            temp_groups: Vec::new(),
            cookies: AHashMap::new(),
        }
    }

    /// The user's id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Resolves a fingerprint through the four layers; the first
    /// decisive verdict wins, tagged with the layer that produced it.
    pub(crate) fn resolve(&self, fp: &Fingerprint<'_>, groups: &GroupStore) -> (Status, PermSource) {
        let verdict = self.temp_nodes.check(fp);
        if verdict.is_decisive() {
            return (verdict, PermSource::TempUser);
        }
        let verdict = self.direct_nodes.check(fp);
        if verdict.is_decisive() {
            return (verdict, PermSource::DirectUser);
        }
        for membership in &self.temp_groups {
            let verdict = groups.check_chain(membership.group, fp);
            if verdict.is_decisive() {
                return (verdict, PermSource::TempGroup);
            }
        }
        for &key in &self.groups {
            let verdict = groups.check_chain(key, fp);
            if verdict.is_decisive() {
                return (verdict, PermSource::PermGroup);
            }
        }
        (Status::PermNotFound, PermSource::None)
    }

    /// Adds a permission with the layering precedence rules.
    ///
    /// A temporary assignment only lands if it would change the
    /// effective verdict; a permanent assignment drops any temporary
    /// declaration of the same permission and is refused only when
    /// the direct or permanent-group layer already yields the same
    /// verdict.
    pub(crate) fn add_perm(
        &mut self,
        perm: &str,
        timestamp: i64,
        groups: &GroupStore,
        wheel: &TimerWheel,
        expire: &TimerCallback,
    ) -> Status {
        let fp = Fingerprint::parse(perm);
        if fp.is_noop() {
            return Status::Success;
        }
        let denied = !fp.allow();
        let (current, source) = self.resolve(&fp, groups);
        let diff =
            !((denied && current == Status::Disallow) || (!denied && current == Status::Allow));

        if timestamp != 0 {
            if !diff {
                return Status::PermAlreadyGranted;
            }
            self.add_temp_perm(&fp, perm, timestamp, wheel, expire);
        } else {
            if source == PermSource::TempUser {
                // A permanent assignment displaces the temporary one.
                self.temp_nodes.remove(&fp, wheel);
            } else if !diff && source != PermSource::TempGroup {
                return Status::PermAlreadyGranted;
            }
            self.direct_nodes.add(&fp);
        }
        Status::Success
    }

    fn add_temp_perm(
        &mut self,
        fp: &Fingerprint<'_>,
        perm: &str,
        timestamp: i64,
        wheel: &TimerWheel,
        expire: &TimerCallback,
    ) {
        let id = self.id;
        if let Some(node) = self.temp_nodes.add(fp) {
            match node.timer() {
                Some(timer) => wheel.reschedule(timer, timestamp - now_unix()),
                None => {
                    let timer = wheel.create(
                        timestamp - now_unix(),
                        expire.clone(),
                        false,
                        vec![TimerValue::Str(perm.to_string()), TimerValue::U64(id)],
                    );
                    node.set_timer(Some(timer));
                }
            }
            node.set_timestamp(timestamp);
        }
    }

    /// Removes a declaration from the named layer.
    pub(crate) fn remove_layer(
        &mut self,
        source: PermSource,
        fp: &Fingerprint<'_>,
        wheel: &TimerWheel,
    ) {
        match source {
            PermSource::TempUser => self.temp_nodes.remove(fp, wheel),
            PermSource::DirectUser => self.direct_nodes.remove(fp, wheel),
            _ => {}
        }
    }

    /// Adds a membership, permanent (`timestamp == 0`) or temporary.
    ///
    /// Refuses with `GroupAlreadyExist` when the group is already
    /// reachable through any existing membership's parent chain, or
    /// when an identical temporary membership exists. A temporary
    /// membership re-added with a new timestamp is rescheduled; one
    /// re-added as permanent is promoted.
    pub(crate) fn add_group(
        &mut self,
        key: u64,
        timestamp: i64,
        groups: &GroupStore,
        wheel: &TimerWheel,
        expire: &TimerCallback,
    ) -> Status {
        for &member in &self.groups {
            if groups.chain_reaches(member, key) {
                return Status::GroupAlreadyExist;
            }
        }

        if let Some(pos) = self.temp_groups.iter().position(|t| t.group == key) {
            if timestamp != 0 {
                let membership = &mut self.temp_groups[pos];
                if membership.timestamp == timestamp {
                    return Status::GroupAlreadyExist;
                }
                membership.timestamp = timestamp;
                wheel.reschedule(membership.timer, timestamp - now_unix());
                return Status::Success;
            }
            // Promote to permanent.
            let membership = self.temp_groups.remove(pos);
            wheel.kill(membership.timer);
        } else {
            for membership in &self.temp_groups {
                if groups.chain_reaches(membership.group, key) {
                    return Status::GroupAlreadyExist;
                }
            }
        }

        if timestamp == 0 {
            self.groups.push(key);
        } else {
            let name = groups.get(key).map(|g| g.name.clone()).unwrap_or_default();
            let timer = wheel.create(
                timestamp - now_unix(),
                expire.clone(),
                false,
                vec![TimerValue::Str(name), TimerValue::U64(self.id)],
            );
            self.temp_groups.push(TempMembership {
                group: key,
                timestamp,
                timer,
            });
        }
        self.sort_memberships(groups);
        Status::Success
    }

    /// Removes the exact membership if present, killing its timer.
    ///
    /// Returns the event timestamp marker: the stored expiry for a
    /// temporary membership, 0 for a permanent one, `None` when the
    /// user holds no such membership. Parent chains are not searched.
    pub(crate) fn remove_membership(&mut self, key: u64, wheel: &TimerWheel) -> Option<i64> {
        if let Some(timestamp) = self.remove_temp_membership(key, wheel) {
            return Some(timestamp);
        }
        let pos = self.groups.iter().position(|&g| g == key)?;
        self.groups.remove(pos);
        Some(0)
    }

    /// Removes the exact temporary membership if present, killing
    /// its timer; returns its stored expiry.
    pub(crate) fn remove_temp_membership(&mut self, key: u64, wheel: &TimerWheel) -> Option<i64> {
        let pos = self.temp_groups.iter().position(|t| t.group == key)?;
        let membership = self.temp_groups.remove(pos);
        wheel.kill(membership.timer);
        Some(membership.timestamp)
    }

    /// Reports how the user holds `target`: through a permanent
    /// membership's chain, a temporary one's, or not at all.
    pub(crate) fn membership_kind(&self, target: u64, groups: &GroupStore) -> Status {
        for &key in &self.groups {
            if groups.chain_reaches(key, target) {
                return Status::PermanentGroup;
            }
        }
        for membership in &self.temp_groups {
            if groups.chain_reaches(membership.group, target) {
                return Status::TemporalGroup;
            }
        }
        Status::GroupNotDefined
    }

    /// The immunity used in actor/target comparisons: the explicit
    /// value, or the highest membership priority when set to −1.
    pub(crate) fn effective_immunity(&self, groups: &GroupStore) -> i32 {
        if self.immunity != -1 {
            return self.immunity;
        }
        let top_perm = self
            .groups
            .first()
            .and_then(|&key| groups.get(key))
            .map_or(-1, |g| g.priority);
        let top_temp = self
            .temp_groups
            .first()
            .and_then(|t| groups.get(t.group))
            .map_or(-1, |g| g.priority);
        top_perm.max(top_temp)
    }

    pub(crate) fn sort_memberships(&mut self, groups: &GroupStore) {
        self.groups
            .sort_by_key(|&key| std::cmp::Reverse(groups.get(key).map_or(i32::MIN, |g| g.priority)));
        self.temp_groups.sort_by_key(|t| {
            std::cmp::Reverse(groups.get(t.group).map_or(i32::MIN, |g| g.priority))
        });
    }

    /// Kills every pending timer anchored in this user: the
    /// temporary trie and the temporary memberships.
    pub(crate) fn kill_timers(&self, wheel: &TimerWheel) {
        self.temp_nodes.kill_all_timers(wheel);
        for membership in &self.temp_groups {
            wheel.kill(membership.timer);
        }
    }

    /// Renders the user's own declarations: direct first, then
    /// temporary (with their expiry tails).
    pub(crate) fn dump_perms(&self) -> Vec<String> {
        let mut perms = self.direct_nodes.dump();
        perms.extend(self.temp_nodes.dump());
        perms
    }
}

/// Registry of all users, keyed by id.
#[derive(Debug, Default)]
pub struct UserStore {
    users: AHashMap<u64, User>,
}

impl UserStore {
    /// Looks a user up by id.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<&User> {
        self.users.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: u64) -> Option<&mut User> {
        self.users.get_mut(&id)
    }

    #[must_use]
    pub(crate) fn contains(&self, id: u64) -> bool {
        self.users.contains_key(&id)
    }

    pub(crate) fn insert(&mut self, user: User) {
        self.users.insert(user.id, user);
    }

    pub(crate) fn remove(&mut self, id: u64) -> Option<User> {
        self.users.remove(&id)
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut User> {
        self.users.values_mut()
    }

    /// Number of registered users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns `true` if no users are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
