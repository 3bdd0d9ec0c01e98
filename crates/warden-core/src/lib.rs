//! Concurrent authorization core: group forest, user records, and
//! the manager façades.
//!
//! # Architecture
//!
//! ```text
//! warden-types   (Status, Action, PermSource, CookieValue, hashing)
//!     ↑
//! warden-engine  (Fingerprint, Node, TimerWheel)
//!     ↑
//! warden-core    ◄── THIS CRATE
//!   ├─ Group / GroupStore      named trie owners, parent forest
//!   ├─ User / UserStore        four-layer permission records
//!   ├─ CallbackSet             per-event listener registries
//!   └─ PermissionsCore         the aggregate: locks, timers, façades
//! ```
//!
//! The embedding host holds one [`PermissionsCore`] (typically a
//! single static instance behind its ABI shim), drives
//! [`PermissionsCore::run_frame`] from its frame tick, and calls the
//! manager façades from any thread: reads run concurrently under
//! shared locks, mutations serialize per registry.
//!
//! # Example
//!
//! ```
//! use warden_core::PermissionsCore;
//! use warden_types::Status;
//!
//! let core = PermissionsCore::new();
//! core.create_group("admins", &["admin.*".into(), "-admin.root".into()], 10, "");
//! core.create_user(0, 42, -1, &["admins".into()], &["chat.color".into()]);
//!
//! assert_eq!(core.has_permission(42, "admin.kick"), Status::Allow);
//! assert_eq!(core.has_permission(42, "admin.root"), Status::Disallow);
//! assert_eq!(core.get_immunity(42), Ok(10));
//! ```

pub mod core;
pub mod events;
pub mod group;
pub mod group_manager;
pub mod user;
pub mod user_manager;

pub use crate::core::PermissionsCore;
pub use events::{
    CallbackSet, GroupCookieListener, GroupCreateListener, GroupDeleteListener, GroupEvents,
    GroupExpirationListener, GroupParentListener, GroupPermissionListener, LoadGroupsListener,
    PermExpirationListener, UserCookieListener, UserCreateListener, UserDeleteListener,
    UserEvents, UserGroupListener, UserLoadListener, UserPermissionListener,
};
pub use group::{Group, GroupStore};
pub use user::{TempMembership, User, UserStore};

// Re-export the vocabulary types for convenience.
pub use warden_types::{Action, CookieValue, PermSource, Status};
