//! The closed result taxonomy.
//!
//! Every mutating or lookup operation in the core returns a
//! [`Status`]. The discriminants are part of the embedding contract
//! and must never be renumbered: hosts compare them across the ABI
//! boundary as raw `i32`s.
//!
//! # Families
//!
//! | Family | Variants |
//! |--------|----------|
//! | Verdict | `Allow`, `Disallow` |
//! | Not found | `PermNotFound`, `CookieNotFound`, `GroupNotFound`, `ChildGroupNotFound`, `ParentGroupNotFound`, `ActorUserNotFound`, `TargetUserNotFound`, `CallbackNotFound` |
//! | Collision | `GroupAlreadyExist`, `UserAlreadyExist`, `CallbackAlreadyExist`, `PermAlreadyGranted` |
//! | Membership kind | `TemporalGroup`, `PermanentGroup`, `GroupNotDefined` |

use serde::{Deserialize, Serialize};

/// Result code returned by every core operation.
///
/// `Allow` and `Disallow` are the *decisive* verdicts of a permission
/// lookup; `PermNotFound` means no layer had an opinion. The rest are
/// operation-specific outcomes, see the module docs for the family
/// breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Status {
    /// The operation completed.
    Success = 0,
    /// Decisive positive verdict.
    Allow = 1,
    /// Decisive negative verdict.
    Disallow = 2,
    /// No layer declares the permission.
    PermNotFound = 3,
    /// The cookie is not set on the target or any inherited chain.
    CookieNotFound = 4,
    /// The named group is not registered.
    GroupNotFound = 5,
    /// The child side of a parent-link operation is missing.
    ChildGroupNotFound = 6,
    /// The parent side of a parent-link operation is missing.
    ParentGroupNotFound = 7,
    /// The acting user of an immunity comparison is missing.
    ActorUserNotFound = 8,
    /// The targeted user is not registered.
    TargetUserNotFound = 9,
    /// A group with that name (or an equivalent membership) already exists.
    GroupAlreadyExist = 10,
    /// A user with that id already exists.
    UserAlreadyExist = 11,
    /// The callback is already registered for the event.
    CallbackAlreadyExist = 12,
    /// The callback was not registered for the event.
    CallbackNotFound = 13,
    /// The assignment would not change the effective verdict.
    PermAlreadyGranted = 14,
    /// The membership is temporary.
    TemporalGroup = 15,
    /// The membership is permanent.
    PermanentGroup = 16,
    /// The user holds no membership (direct or inherited) in the group.
    GroupNotDefined = 17,
}

impl Status {
    /// Returns `true` for `Allow` or `Disallow`.
    ///
    /// A decisive verdict terminates the layered lookup; everything
    /// else lets resolution fall through to the next source.
    #[must_use]
    pub fn is_decisive(self) -> bool {
        matches!(self, Self::Allow | Self::Disallow)
    }

    /// Returns `true` for `Success`.
    #[must_use]
    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    /// Returns the raw wire discriminant.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Returns a stable machine-readable code.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Allow => "ALLOW",
            Self::Disallow => "DISALLOW",
            Self::PermNotFound => "PERM_NOT_FOUND",
            Self::CookieNotFound => "COOKIE_NOT_FOUND",
            Self::GroupNotFound => "GROUP_NOT_FOUND",
            Self::ChildGroupNotFound => "CHILD_GROUP_NOT_FOUND",
            Self::ParentGroupNotFound => "PARENT_GROUP_NOT_FOUND",
            Self::ActorUserNotFound => "ACTOR_USER_NOT_FOUND",
            Self::TargetUserNotFound => "TARGET_USER_NOT_FOUND",
            Self::GroupAlreadyExist => "GROUP_ALREADY_EXIST",
            Self::UserAlreadyExist => "USER_ALREADY_EXIST",
            Self::CallbackAlreadyExist => "CALLBACK_ALREADY_EXIST",
            Self::CallbackNotFound => "CALLBACK_NOT_FOUND",
            Self::PermAlreadyGranted => "PERM_ALREADY_GRANTED",
            Self::TemporalGroup => "TEMPORAL_GROUP",
            Self::PermanentGroup => "PERMANENT_GROUP",
            Self::GroupNotDefined => "GROUP_NOT_DEFINED",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
