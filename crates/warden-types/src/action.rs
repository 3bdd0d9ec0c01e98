//! Change-event action tag.

use serde::{Deserialize, Serialize};

/// Whether a permission or membership change added or removed the
/// entry. Carried on every change-notification event so subscribers
/// (typically storage providers) can mirror the mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Action {
    /// The entry was granted or attached.
    Add = 0,
    /// The entry was revoked or detached.
    Remove = 1,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Remove => "remove",
        })
    }
}
