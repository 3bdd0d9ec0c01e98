//! Temp-bearing wire strings and the wall clock.
//!
//! Temporary permissions and temporary group memberships travel
//! through `create_user` inside the value strings themselves:
//! `"<value> <unix_ts>"` with a single space and a decimal integer
//! tail. Absence of the tail means the entry is permanent. This
//! keeps the creation call wire-compatible with hosts that only know
//! how to pass string arrays.

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

/// Error returned when a temp-bearing string carries a malformed tail.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TempStringError {
    /// The space-separated tail is not a decimal integer.
    #[error("invalid timestamp tail {tail:?}")]
    InvalidTimestamp {
        /// The offending tail text.
        tail: String,
    },
    /// The string starts with the separator, leaving no value.
    #[error("empty value before timestamp tail")]
    EmptyValue,
}

/// Splits a temp-bearing string into its value and expiry timestamp.
///
/// Returns `(value, 0)` when no tail is present (a permanent entry),
/// or `(value, ts)` when a ` <unix_ts>` tail follows the value.
///
/// ```
/// use warden_types::split_temp_suffix;
///
/// assert_eq!(split_temp_suffix("vip.badge"), Ok(("vip.badge", 0)));
/// assert_eq!(split_temp_suffix("vip.badge 1735689600"), Ok(("vip.badge", 1735689600)));
/// assert!(split_temp_suffix("vip.badge soon").is_err());
/// ```
///
/// # Errors
///
/// Returns [`TempStringError`] when a tail is present but not a
/// decimal integer, or when the value part is empty.
pub fn split_temp_suffix(input: &str) -> Result<(&str, i64), TempStringError> {
    match input.split_once(' ') {
        None => Ok((input, 0)),
        Some(("", _)) => Err(TempStringError::EmptyValue),
        Some((value, tail)) => {
            let ts = tail
                .parse::<i64>()
                .map_err(|_| TempStringError::InvalidTimestamp {
                    tail: tail.to_string(),
                })?;
            Ok((value, ts))
        }
    }
}

/// Current wall-clock time as unix seconds.
#[must_use]
pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_tail_is_permanent() {
        assert_eq!(split_temp_suffix("admin.kick"), Ok(("admin.kick", 0)));
        assert_eq!(split_temp_suffix("-admin.kick"), Ok(("-admin.kick", 0)));
    }

    #[test]
    fn decimal_tail_parses() {
        assert_eq!(split_temp_suffix("vip 123"), Ok(("vip", 123)));
        assert_eq!(split_temp_suffix("vip.badge.* 99"), Ok(("vip.badge.*", 99)));
    }

    #[test]
    fn malformed_tail_is_error() {
        assert_eq!(
            split_temp_suffix("vip 12x"),
            Err(TempStringError::InvalidTimestamp {
                tail: "12x".to_string()
            })
        );
    }

    #[test]
    fn second_space_lands_in_tail() {
        // Only a single separator is part of the grammar; anything
        // after it must parse as one integer.
        assert!(split_temp_suffix("vip 12 34").is_err());
    }

    #[test]
    fn empty_value_is_error() {
        assert_eq!(split_temp_suffix(" 12"), Err(TempStringError::EmptyValue));
    }

    #[test]
    fn clock_is_monotone_enough() {
        let a = now_unix();
        let b = now_unix();
        assert!(b >= a);
        assert!(a > 1_600_000_000);
    }
}
