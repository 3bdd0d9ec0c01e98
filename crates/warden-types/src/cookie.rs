//! Opaque tagged cookie values.
//!
//! Users and groups carry a `name → value` cookie map. The core never
//! interprets the values; it only stores them and resolves lookups
//! through the group parent chain. Hosts use cookies for anything
//! from chat colors to ban counters.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned by the fallible [`CookieValue`] accessors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CookieError {
    /// The value holds a different tag than the accessor asked for.
    #[error("cookie holds {actual}, not {requested}")]
    WrongKind {
        /// Tag actually stored.
        actual: &'static str,
        /// Tag the accessor asked for.
        requested: &'static str,
    },
}

/// An opaque tagged value attached to a user or group by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CookieValue {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// UTF-8 string.
    Str(String),
}

impl CookieValue {
    fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
        }
    }

    /// Returns the boolean payload.
    ///
    /// # Errors
    ///
    /// Returns [`CookieError::WrongKind`] if the value is not a bool.
    pub fn as_bool(&self) -> Result<bool, CookieError> {
        match self {
            Self::Bool(v) => Ok(*v),
            other => Err(CookieError::WrongKind {
                actual: other.kind(),
                requested: "bool",
            }),
        }
    }

    /// Returns the integer payload.
    ///
    /// # Errors
    ///
    /// Returns [`CookieError::WrongKind`] if the value is not an int.
    pub fn as_int(&self) -> Result<i64, CookieError> {
        match self {
            Self::Int(v) => Ok(*v),
            other => Err(CookieError::WrongKind {
                actual: other.kind(),
                requested: "int",
            }),
        }
    }

    /// Returns the float payload.
    ///
    /// # Errors
    ///
    /// Returns [`CookieError::WrongKind`] if the value is not a float.
    pub fn as_float(&self) -> Result<f64, CookieError> {
        match self {
            Self::Float(v) => Ok(*v),
            other => Err(CookieError::WrongKind {
                actual: other.kind(),
                requested: "float",
            }),
        }
    }

    /// Returns the string payload.
    ///
    /// # Errors
    ///
    /// Returns [`CookieError::WrongKind`] if the value is not a string.
    pub fn as_str(&self) -> Result<&str, CookieError> {
        match self {
            Self::Str(v) => Ok(v),
            other => Err(CookieError::WrongKind {
                actual: other.kind(),
                requested: "str",
            }),
        }
    }
}

impl From<bool> for CookieValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for CookieValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for CookieValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for CookieValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for CookieValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}
