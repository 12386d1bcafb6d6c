//! The Vesper front end: a token-driven recursive-descent parser producing
//! a fully elaborated AST, together with the polymorph resolver and the
//! meta-directive evaluator that later passes invoke on demand.
//!
//! Data flows one way: the external lexer produces a [`token::TokenList`],
//! [`parse`] consumes it into a [`types::ast::Ast`], and the downstream IR
//! builder reads the AST directly, calling into [`resolve`] with catalogs
//! it builds from call sites. Everything here is single-threaded; parallel
//! compilation of independent translation units works by giving each its
//! own tokens, AST, and [`Compiler`] handle.

pub mod error;
pub mod parse;
pub mod resolve;
pub mod rtti;
pub mod token;
pub mod types;

use bitflags::bitflags;

use crate::error::Warning;
use crate::types::meta::{MetaDefinition, MetaExpr};
use crate::types::Source;

pub use parse::parse;

bitflags! {
  /// Driver-level switches the front end consults.
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
  pub struct CompilerTraits: u32 {
    /// Enable the `Namespace::name` prename syntax.
    const COLON_COLON = 1;
    /// Accept the experimental `name : type` declaration syntax.
    const TYPE_COLON = 1 << 1;
    /// Runtime type information is disabled; skip injecting the
    /// reflection declarations.
    const NO_TYPEINFO = 1 << 2;
  }
}

/// The driver handle threaded through parsing: switches, the entry point
/// name, compile-time constants exposed to meta directives, and collected
/// warnings.
#[derive(Clone, Debug)]
pub struct Compiler {
  /// Driver switches.
  pub traits: CompilerTraits,
  /// Name of the program entry point.
  pub entry_point: String,
  /// Compile-time constants exposed by the driver; `#get` consults these
  /// before user definitions.
  pub special_meta: Vec<MetaDefinition>,
  /// Warnings accumulated while parsing. Never abort anything.
  pub warnings: Vec<Warning>,
}

impl Default for Compiler {
  fn default() -> Compiler {
    Compiler {
      traits: CompilerTraits::empty(),
      entry_point: "main".to_string(),
      special_meta: Vec::new(),
      warnings: Vec::new(),
    }
  }
}

impl Compiler {
  /// A driver handle with default settings and a `main` entry point.
  #[must_use] pub fn new() -> Compiler {
    Compiler::default()
  }

  /// Look up a driver-provided meta constant.
  #[must_use] pub fn special_meta_variable(&self, name: &str) -> Option<MetaExpr> {
    types::meta::find_definition(&self.special_meta, name)
      .map(|definition| definition.value.clone())
  }

  /// Record a warning.
  pub fn warn(&mut self, source: Source, message: impl Into<String>) {
    let warning = Warning::new(source, message);
    log::warn!("{}", warning.message);
    self.warnings.push(warning);
  }
}
