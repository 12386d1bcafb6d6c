//! The parser: a recursive-descent consumer of the lexed token stream.
//!
//! The mutable [`Parser`] context carries the token list, the read cursor,
//! the AST under construction, and the handful of state slots the grammar
//! needs (prename, composite association, newline sensitivity, pending
//! angle-bracket shift splits). No globals; concurrent units get separate
//! contexts.

pub mod composite;
pub mod expr;
pub mod func;
pub mod item;
pub mod stmt;
pub mod ty;

use crate::error::{Panic, Result};
use crate::token::{TokenKind, TokenList};
use crate::types::ast::Ast;
use crate::types::{Source, MAX_DEPTH};
use crate::{Compiler, CompilerTraits};

/// The composite whose domain (`struct X { ... }`) we are currently
/// parsing functions inside of, if any.
#[derive(Clone, Debug)]
pub struct CompositeAssociation {
  /// Name of the composite.
  pub name: String,
  /// Where the composite was declared.
  pub source: Source,
  /// Whether the composite is polymorphic.
  pub is_polymorphic: bool,
  /// Generic parameter names, for polymorphic composites.
  pub generics: Vec<String>,
}

/// The mutable parser context.
pub struct Parser<'a> {
  /// The driver handle.
  pub compiler: &'a mut Compiler,
  /// The token stream being consumed. String payloads are taken out of
  /// tokens as they are used.
  pub tokens: TokenList,
  /// The read cursor.
  pub i: usize,
  /// The AST under construction.
  pub ast: Ast,
  /// Index of the translation object being parsed.
  pub object: u32,
  /// Name captured before `::` when the colon-colon syntax is enabled.
  pub prename: Option<String>,
  /// The struct domain currently open, if any.
  pub composite_association: Option<CompositeAssociation>,
  /// Traits a pragma has requested for the next declared function.
  pub next_builtin_traits: crate::types::ast::FuncTraits,
  /// Whether `$T~Similar` prerequisites are allowed in the type being
  /// parsed (only inside function parameter lists).
  pub allow_polymorphic_prereqs: bool,
  /// How many `<` characters remain in a pending `<<`/`<<<` shift token
  /// that the type parser split while opening nested generics.
  pub angle_bracket_repeat: u32,
  /// Depth of parenthesized/bracketed regions in which newlines do not
  /// terminate the current expression.
  pub ignore_newlines_in_expr_depth: u32,
  /// The token that closes the composite body being parsed: `)` or `}`.
  pub struct_closer: TokenKind,
  /// Whether a `namespace name` scope is open.
  pub has_namespace_scope: bool,
  /// The namespace prepended to parsed names, if any.
  pub current_namespace: Option<String>,
}

/// Parse one translation object's tokens into an AST.
///
/// Runtime-type declarations are injected first (unless the driver
/// disabled type info), then the top-level loop runs until the tokens are
/// exhausted, then the sorted lookup collections are sorted.
pub fn parse(compiler: &mut Compiler, tokens: TokenList, object: u32) -> Result<Ast> {
  let mut ast = Ast::new();

  if !compiler.traits.contains(CompilerTraits::NO_TYPEINFO) {
    crate::rtti::inject(&mut ast);
  }

  let mut parser = Parser {
    compiler,
    tokens,
    i: 0,
    ast,
    object,
    prename: None,
    composite_association: None,
    next_builtin_traits: crate::types::ast::FuncTraits::empty(),
    allow_polymorphic_prereqs: false,
    angle_bracket_repeat: 0,
    ignore_newlines_in_expr_depth: 0,
    struct_closer: TokenKind::Close,
    has_namespace_scope: false,
    current_namespace: None,
  };

  parser.parse_tokens()?;

  let mut ast = parser.ast;
  ast.sort();
  Ok(ast)
}

impl<'a> Parser<'a> {
  /// The token kind at the cursor.
  #[must_use] pub fn peek(&self) -> &TokenKind {
    self.tokens.kind(self.i)
  }

  /// The token kind `ahead` tokens past the cursor.
  #[must_use] pub fn peek_ahead(&self, ahead: usize) -> &TokenKind {
    self.tokens.kind(self.i + ahead)
  }

  /// The source range at the cursor.
  #[must_use] pub fn peek_source(&self) -> Source {
    self.tokens.source(self.i)
  }

  /// Advance the cursor one token.
  pub fn advance(&mut self) {
    self.i += 1;
  }

  /// Consume the token at the cursor if it matches, without erroring.
  pub fn eat(&mut self, kind: &TokenKind) -> bool {
    if self.peek() == kind {
      self.i += 1;
      true
    } else {
      false
    }
  }

  /// Consume the token at the cursor, erroring with `message` if it does
  /// not match.
  pub fn expect(&mut self, kind: &TokenKind, message: &str) -> Result {
    if self.eat(kind) {
      Ok(())
    } else {
      Err(Panic::new(self.peek_source(), message))
    }
  }

  /// Take the identifier at the cursor, erroring with `message` if the
  /// token is not a word.
  pub fn take_word(&mut self, message: &str) -> Result<String> {
    match self.tokens.take_word(self.i) {
      Some(word) => {
        self.i += 1;
        Ok(word)
      }
      None => Err(Panic::new(self.peek_source(), message)),
    }
  }

  /// Take the identifier at the cursor if the token is a word.
  pub fn eat_word(&mut self) -> Option<String> {
    let word = self.tokens.take_word(self.i)?;
    self.i += 1;
    Some(word)
  }

  /// Take the string payload at the cursor if the token is a string.
  pub fn eat_string(&mut self) -> Option<String> {
    let string = self.tokens.take_string(self.i)?;
    self.i += 1;
    Some(string)
  }

  /// Skip newline tokens. Errors with `message` at end of input.
  pub fn ignore_newlines(&mut self, message: &str) -> Result {
    while matches!(self.peek(), TokenKind::Newline) {
      self.i += 1;
    }

    if self.i >= self.tokens.len() {
      return Err(Panic::new(self.tokens.source(self.tokens.len().wrapping_sub(1)), message));
    }

    Ok(())
  }

  /// An "unexpected token" error with the token's display name spliced
  /// into `context` (which contains a `{}` placeholder).
  #[must_use] pub fn unexpected_token(&self, context: &str) -> Panic {
    Panic::new(
      self.peek_source(),
      context.replacen("{}", self.peek().name(), 1),
    )
  }

  /// Prepend the open namespace to a parsed name, unless suppressed.
  pub fn prepend_namespace(&self, name: &mut String) {
    if let Some(namespace) = &self.current_namespace {
      *name = format!("{namespace}\\{name}");
    }
  }

  /// The top-level loop: dispatch on the next token until the stream is
  /// exhausted.
  pub fn parse_tokens(&mut self) -> Result {
    while self.i < self.tokens.len() {
      match self.peek() {
        TokenKind::Newline => self.advance(),

        TokenKind::Func
        | TokenKind::Stdcall
        | TokenKind::Verbatim
        | TokenKind::Implicit
        | TokenKind::Constructor
        | TokenKind::Virtual
        | TokenKind::Override => self.parse_func()?,

        TokenKind::Foreign => {
          if matches!(self.peek_ahead(1), TokenKind::Str(_) | TokenKind::CStr(_)) {
            self.parse_foreign_library()?;
          } else if self.peek_ahead(1) == &TokenKind::Enum {
            self.advance();
            self.parse_enum_ex(true)?;
          } else {
            self.parse_func()?;
          }
        }

        TokenKind::Struct | TokenKind::Packed | TokenKind::Record | TokenKind::Class =>
          self.parse_composite(false)?,
        TokenKind::Union => self.parse_composite(true)?,

        TokenKind::Define => self.parse_global_constant_definition()?,

        TokenKind::Word(_) => {
          if self.compiler.traits.contains(CompilerTraits::COLON_COLON)
            && matches!(self.peek_ahead(1), TokenKind::Associate)
          {
            let prename = self.take_word("Expected pre-name for '::'")?;
            self.prename = Some(prename);
            self.advance();
          } else {
            self.parse_global()?;
          }
        }

        TokenKind::External => {
          if matches!(
            self.peek_ahead(1),
            TokenKind::Func | TokenKind::Stdcall | TokenKind::Verbatim | TokenKind::Implicit
          ) {
            self.parse_func()?;
          } else {
            self.parse_global()?;
          }
        }

        TokenKind::Alias => self.parse_alias()?,
        TokenKind::Import => self.parse_import()?,
        TokenKind::Pragma => self.parse_pragma()?,
        TokenKind::Enum => self.parse_enum()?,
        TokenKind::Meta(_) => self.parse_meta_directive()?,
        TokenKind::Namespace => self.parse_namespace()?,

        TokenKind::End => {
          if self.has_namespace_scope {
            self.has_namespace_scope = false;
            self.current_namespace = None;
          } else if self.composite_association.is_some() {
            self.composite_association = None;
          } else {
            return Err(Panic::new(self.peek_source(), "Unexpected trailing closing brace '}'"));
          }
          self.advance();
        }

        _ => return Err(self.unexpected_token("Encountered unexpected token {} in global scope")),
      }
    }

    if let Some(association) = &self.composite_association {
      return Err(Panic::new(
        association.source,
        "Expected closing brace '}' for struct domain",
      ));
    }

    log::debug!(
      "parsed object {}: {} funcs, {} composites, {} globals",
      self.object,
      self.ast.funcs.len(),
      self.ast.composites.len() + self.ast.poly_composites.len(),
      self.ast.globals.len(),
    );

    Ok(())
  }

  /// Error used when a structural nesting limit is exceeded.
  #[must_use] pub fn depth_limit_error(&self, source: Source, what: &str) -> Panic {
    Panic::new(
      source,
      format!("Maximum depth of {what} exceeded - No more than {MAX_DEPTH} are allowed"),
    )
  }
}
