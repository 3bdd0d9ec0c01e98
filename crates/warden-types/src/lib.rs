//! Shared value types for the warden authorization core.
//!
//! This crate is the leaf of the workspace dependency graph, sitting
//! below `warden-engine` (trie, timers) and `warden-core` (stores,
//! manager façades):
//!
//! ```text
//! warden-types   (Status, Action, PermSource, CookieValue, hashing)
//!     ↑
//! warden-engine  (Fingerprint, Node, TimerWheel)
//!     ↑
//! warden-core    (Group, User, PermissionsCore)
//! ```
//!
//! Everything here is a plain value type: the closed [`Status`]
//! taxonomy returned by every core operation, the [`Action`] tag on
//! change events, the [`PermSource`] layer marker, opaque
//! [`CookieValue`]s, the process-stable string hash used by both the
//! permission trie and the group registry, and the `"<value> <ts>"`
//! wire parsing for temporary entries.

pub mod action;
pub mod cookie;
pub mod hash;
pub mod source;
pub mod status;
pub mod temp;

pub use action::Action;
pub use cookie::{CookieError, CookieValue};
pub use hash::{str_hash, WILDCARD_HASH};
pub use source::PermSource;
pub use status::Status;
pub use temp::{now_unix, split_temp_suffix, TempStringError};
