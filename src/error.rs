//! The error channel shared by the parser and the AST-level transformations.
//!
//! Every fallible routine in the front end returns [`Result`]; the error
//! value is a [`Panic`] carrying the source range it refers to. Internal
//! invariant violations do not go through this channel at all, they
//! `panic!` outright.

use std::fmt;

use crate::types::Source;

/// A user-facing compile error with the source range it was raised at.
#[derive(Clone, Debug)]
pub struct Panic {
  /// Where in the source buffer the problem is.
  pub source: Source,
  /// Human-readable description.
  pub message: String,
}

impl Panic {
  /// Raise a compile error at the given location.
  pub fn new(source: Source, message: impl Into<String>) -> Panic {
    Panic { source, message: message.into() }
  }
}

impl fmt::Display for Panic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.message)
  }
}

impl std::error::Error for Panic {}

/// Result alias used throughout the front end.
pub type Result<T = ()> = std::result::Result<T, Panic>;

/// A non-fatal diagnostic. Warnings accumulate on the parser and never
/// abort parsing.
#[derive(Clone, Debug)]
pub struct Warning {
  /// Where in the source buffer the suspicious construct is.
  pub source: Source,
  /// Human-readable description.
  pub message: String,
}

impl Warning {
  /// Construct a warning at the given location.
  pub fn new(source: Source, message: impl Into<String>) -> Warning {
    Warning { source, message: message.into() }
  }
}
