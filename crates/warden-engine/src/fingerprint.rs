//! Parsed permission strings.
//!
//! A permission string such as `-admin.kick.*` is parsed once into a
//! [`Fingerprint`] — the segment hashes plus their source slices —
//! and threaded through every trie operation, so a lookup never
//! re-hashes and never allocates.
//!
//! # Grammar
//!
//! ```text
//! perm := ['-'] segment ('.' segment)* ['.' '*']
//! ```
//!
//! - a leading `-` on the whole string flips polarity to deny (a
//!   stray `-` prefix on an individual segment is also stripped, a
//!   historical leniency);
//! - a final segment that is literally `*` marks a wildcard and is
//!   not stored as a segment;
//! - segments are split on `.` and are otherwise uninterpreted,
//!   case-sensitive bytes.

use warden_types::{str_hash, WILDCARD_HASH};

/// Upper bound on stored segments; anything past it is dropped.
pub const MAX_SEGMENTS: usize = 64;

/// A parsed permission string: segment hashes with their source
/// slices, the wildcard marker, and the polarity.
///
/// ```
/// use warden_engine::Fingerprint;
///
/// let fp = Fingerprint::parse("-admin.kick.*");
/// assert!(!fp.allow());
/// assert!(fp.wildcard());
/// assert_eq!(fp.segments().len(), 2);
/// assert_eq!(fp.segments()[0].1, "admin");
/// ```
#[derive(Debug, Clone)]
pub struct Fingerprint<'a> {
    segments: Vec<(u64, &'a str)>,
    wildcard: bool,
    allow: bool,
}

impl<'a> Fingerprint<'a> {
    /// Parses a permission string.
    ///
    /// Empty input produces a no-op fingerprint (see
    /// [`is_noop`](Self::is_noop)); segments beyond
    /// [`MAX_SEGMENTS`] are truncated.
    #[must_use]
    pub fn parse(perm: &'a str) -> Self {
        let (allow, body) = match perm.strip_prefix('-') {
            Some(rest) => (false, rest),
            None => (true, perm),
        };

        let mut segments = Vec::new();
        let mut wildcard = false;

        if !body.is_empty() {
            for raw in body.split('.') {
                let seg = raw.strip_prefix('-').unwrap_or(raw);
                let hash = str_hash(seg);
                if hash == *WILDCARD_HASH {
                    wildcard = true;
                    break;
                }
                if segments.len() == MAX_SEGMENTS {
                    break;
                }
                segments.push((hash, seg));
            }
        }

        Self {
            segments,
            wildcard,
            allow,
        }
    }

    /// The segment hashes paired with their source slices.
    #[must_use]
    pub fn segments(&self) -> &[(u64, &'a str)] {
        &self.segments
    }

    /// `true` iff the final segment was a literal `*`.
    #[must_use]
    pub fn wildcard(&self) -> bool {
        self.wildcard
    }

    /// `false` iff the string carried a leading `-` (a denial).
    #[must_use]
    pub fn allow(&self) -> bool {
        self.allow
    }

    /// `true` for a bare `*` or `-*`: the fingerprint addresses the
    /// entire permission set.
    #[must_use]
    pub fn is_all(&self) -> bool {
        self.wildcard && self.segments.is_empty()
    }

    /// `true` for empty input; every trie operation treats it as a
    /// no-op.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        !self.wildcard && self.segments.is_empty()
    }
}
