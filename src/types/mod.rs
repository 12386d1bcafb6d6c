//! Types used in the stages of the front end.

pub mod ast;
pub mod expr;
pub mod layout;
pub mod meta;
pub mod ty;

use std::fmt;

/// The maximum number of nested anonymous composites, and therefore the
/// maximum number of indices in a [`layout::Endpoint`].
pub const MAX_DEPTH: usize = 8;

/// A location in a source buffer: the owning translation object, the byte
/// index where the construct begins, and how many bytes it spans. The actual
/// buffers live with the external driver; the front end only threads these
/// through so diagnostics can point somewhere.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Source {
  /// Index of the translation object this location belongs to.
  pub object: u32,
  /// Byte offset of the start of the construct.
  pub index: u32,
  /// Number of bytes covered.
  pub stride: u32,
}

impl Source {
  /// The null location, used for synthesized declarations.
  pub const NONE: Source = Source { object: 0, index: 0, stride: 0 };

  /// Construct a location within the given object.
  #[must_use] pub fn at(object: u32, index: u32, stride: u32) -> Source {
    Source { object, index, stride }
  }
}

/// A function ID. Functions are stored in one growable sequence on the AST
/// and referenced by index; cross-references between functions (virtual
/// origins, dispatchers) go through these instead of pointers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FuncId(pub u32);

impl FuncId {
  /// Get the underlying index.
  #[must_use] pub fn into_usize(self) -> usize { self.0 as usize }
}

impl fmt::Display for FuncId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "fn#{}", self.0)
  }
}
