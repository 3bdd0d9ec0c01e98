//! Permission layer marker.

use serde::{Deserialize, Serialize};

/// Which layer of a user's permission stack produced a verdict.
///
/// The layered lookup consults the sources in exactly this order and
/// stops at the first decisive verdict; the numeric values are part
/// of the embedding contract.
///
/// ```
/// use warden_types::PermSource;
///
/// assert!(PermSource::TempUser.as_u16() < PermSource::DirectUser.as_u16());
/// assert!(PermSource::DirectUser.as_u16() < PermSource::TempGroup.as_u16());
/// assert!(PermSource::TempGroup.as_u16() < PermSource::PermGroup.as_u16());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum PermSource {
    /// The user's temporary trie.
    TempUser = 0,
    /// The user's direct (permanent) trie.
    DirectUser = 1,
    /// A temporary group membership (or its parent chain).
    TempGroup = 2,
    /// A permanent group membership (or its parent chain).
    PermGroup = 3,
    /// No layer had an opinion.
    None = 4,
}

impl PermSource {
    /// Returns the raw wire value.
    #[must_use]
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns `true` if the verdict came from a group layer
    /// (temporary or permanent).
    #[must_use]
    pub fn is_group(self) -> bool {
        matches!(self, Self::TempGroup | Self::PermGroup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_layers() {
        assert!(PermSource::TempGroup.is_group());
        assert!(PermSource::PermGroup.is_group());
        assert!(!PermSource::TempUser.is_group());
        assert!(!PermSource::DirectUser.is_group());
        assert!(!PermSource::None.is_group());
    }
}
