//! Top-level items other than functions and composites: globals, named
//! expressions, type aliases, enums, meta directives, pragmas, imports,
//! foreign libraries, and namespaces.

use super::Parser;
use crate::error::{Panic, Result};
use crate::token::TokenKind;
use crate::types::ast::{FuncTraits, GlobalTraits, ItemTraits, LibraryKind, NamedExpression};
use crate::types::meta::{MetaDefinition, MetaExpr, MetaOp};
use crate::CompilerTraits;

// Type names that cannot be shadowed by an alias.
const RESERVED_ALIAS_NAMES: &[&str] = &[
  "Any", "AnyEnumType", "AnyFixedArrayType", "AnyFuncPtrType", "AnyPtrType",
  "AnyStructType", "AnyType", "AnyTypeKind", "String", "bool", "byte", "double",
  "float", "int", "long", "ptr", "short", "successful", "ubyte", "uint", "ulong",
  "ushort", "usize", "void",
];

impl Parser<'_> {
  /// Parse a global variable declaration (or an old-style `NAME == value`
  /// constant) at the cursor.
  pub fn parse_global(&mut self) -> Result {
    let source = self.peek_source();

    if self.composite_association.is_some() {
      return Err(Panic::new(source, "Cannot declare global variable within struct domain"));
    }

    let mut traits = GlobalTraits::empty();

    loop {
      if self.eat(&TokenKind::External) {
        traits |= GlobalTraits::EXTERNAL;
        continue;
      }
      if self.eat(&TokenKind::ThreadLocal) {
        traits |= GlobalTraits::THREAD_LOCAL;
        continue;
      }
      break;
    }

    let mut name = self.take_word("Expected global variable name")?;
    self.prepend_namespace(&mut name);

    if self.peek() == &TokenKind::Equals {
      // Old-style named expression syntax: `NAME == value`.
      self.advance();
      let value = self.parse_expr()?;

      self.compiler.warn(
        source,
        format!("Old-style constant syntax; use 'define {name} = ...' instead"),
      );

      self.ast.add_named_expression(NamedExpression {
        name,
        value,
        traits: ItemTraits::empty(),
        source,
      });
      return Ok(());
    }

    if self.eat(&TokenKind::Pod) {
      traits |= GlobalTraits::POD;
    }

    let ty = self.parse_type()?;
    let mut initial = None;

    if self.eat(&TokenKind::Assign) {
      if self.eat(&TokenKind::Undef) {
        // 'undef' does nothing for globals; treat as a plain definition.
      } else {
        initial = Some(self.parse_expr()?);
      }
    }

    if self.peek() != &TokenKind::Newline && self.peek() != &TokenKind::None {
      return Err(Panic::new(
        self.peek_source(),
        "Expected end-of-line after global variable definition",
      ));
    }

    self.ast.add_global(name, ty, initial, traits, source);
    Ok(())
  }

  /// Parse `define NAME = value` at global scope.
  pub fn parse_global_constant_definition(&mut self) -> Result {
    let named_expression = self.parse_named_expression_definition()?;
    self.ast.add_named_expression(named_expression);
    Ok(())
  }

  /// Parse a `define NAME = value` named expression; shared between the
  /// global scope and statement position.
  pub fn parse_named_expression_definition(&mut self) -> Result<NamedExpression> {
    // Assumes the cursor is on the 'define' keyword.
    let source = self.peek_source();
    self.advance();

    let mut name = if self.compiler.traits.contains(CompilerTraits::COLON_COLON)
      && self.prename.is_some()
    {
      self.prename.take().expect("checked prename")
    } else {
      self.take_word("Expected name for named expression definition after 'define' keyword")?
    };

    self.prepend_namespace(&mut name);
    self.expect(&TokenKind::Assign, "Expected '=' after name of named expression")?;

    let value = self.parse_expr()?;

    Ok(NamedExpression { name, value, traits: ItemTraits::empty(), source })
  }

  /// Parse `alias Name = Type`.
  pub fn parse_alias(&mut self) -> Result {
    let source = self.peek_source();
    self.advance();

    if self.composite_association.is_some() {
      return Err(Panic::new(source, "Cannot declare type alias within struct domain"));
    }

    let mut name = if self.compiler.traits.contains(CompilerTraits::COLON_COLON)
      && self.prename.is_some()
    {
      self.prename.take().expect("checked prename")
    } else {
      self.take_word("Expected alias name after 'alias' keyword")?
    };

    self.prepend_namespace(&mut name);

    if RESERVED_ALIAS_NAMES.binary_search(&name.as_str()).is_ok() {
      return Err(Panic::new(
        source,
        format!("Reserved type name '{name}' can't be used to create an alias"),
      ));
    }

    self.expect(&TokenKind::Assign, "Expected '=' after alias name")?;
    self.ignore_newlines("Expected type after '=' in alias")?;
    let ty = self.parse_type()?;

    self.ast.add_alias(name, ty, ItemTraits::empty(), source);
    Ok(())
  }

  /// Parse `enum Name (KIND, KIND, ...)`.
  pub fn parse_enum(&mut self) -> Result {
    self.parse_enum_ex(false)
  }

  /// Parse an enum, optionally a foreign one whose kinds also become
  /// global named expressions so the enum name is optional at use sites.
  pub fn parse_enum_ex(&mut self, is_foreign: bool) -> Result {
    let source = self.peek_source();

    if self.composite_association.is_some() {
      return Err(Panic::new(source, "Cannot declare enum within struct domain"));
    }

    self.expect(&TokenKind::Enum, "Expected 'enum' keyword")?;

    let mut name = if self.compiler.traits.contains(CompilerTraits::COLON_COLON)
      && self.prename.is_some()
    {
      self.prename.take().expect("checked prename")
    } else {
      self.take_word("Expected name of enum after 'enum' keyword")?
    };

    self.prepend_namespace(&mut name);

    let kinds = self.parse_enum_body()?;

    if is_foreign {
      for kind in &kinds {
        self.ast.add_named_expression(NamedExpression {
          name: kind.clone(),
          value: crate::types::expr::Expr::new(
            crate::types::expr::ExprKind::EnumValue {
              enum_name: name.clone(),
              kind: kind.clone(),
            },
            source,
          ),
          traits: ItemTraits::GENERATED,
          source,
        });
      }
    }

    self.ast.add_enum(name, kinds, source);
    Ok(())
  }

  fn parse_enum_body(&mut self) -> Result<Vec<String>> {
    self.ignore_newlines("Expected '(' after enum name")?;
    self.expect(&TokenKind::Open, "Expected '(' after enum name")?;

    let mut kinds = Vec::new();

    while self.peek() != &TokenKind::Close {
      self.ignore_newlines("Expected element")?;
      kinds.push(self.take_word("Expected element")?);
      self.ignore_newlines("Expected ',' or ')'")?;

      if self.eat(&TokenKind::Next) {
        self.ignore_newlines("Expected element")?;
        if self.peek() == &TokenKind::Close {
          return Err(Panic::new(self.peek_source(), "Expected element after ',' in element list"));
        }
      } else if self.peek() != &TokenKind::Close {
        return Err(Panic::new(self.peek_source(), "Expected ',' after element"));
      }
    }

    self.advance();
    Ok(kinds)
  }

  /// Parse `import "file"` / `import component`. Resolution belongs to
  /// the external dependency layer; the parser only consumes the form.
  pub fn parse_import(&mut self) -> Result {
    self.advance();

    if let Some(path) = self.eat_string() {
      log::debug!("import of \"{path}\" recorded for the dependency layer");
      return Ok(());
    }

    if let Some(component) = self.eat_word() {
      log::debug!("import of component '{component}' recorded for the dependency layer");
      return Ok(());
    }

    Err(Panic::new(self.peek_source(), "Expected filename or component after 'import' keyword"))
  }

  /// Parse `foreign "libname"` / `foreign "name" framework`, recording
  /// the library for the linker driver.
  pub fn parse_foreign_library(&mut self) -> Result {
    self.advance();

    let Some(library) = self.eat_string() else {
      return Err(Panic::new(self.peek_source(), "Expected library name after 'foreign' keyword"));
    };

    let kind = if self.tokens.peek_word(self.i) == Some("framework") {
      self.advance();
      LibraryKind::Framework
    } else {
      LibraryKind::Library
    };

    self.ast.add_foreign_library(library, kind);
    Ok(())
  }

  /// Parse `pragma directive [arguments...]`. Trait-marking directives
  /// apply to the next declared function; everything else belongs to the
  /// driver and is skipped after minimal validation.
  pub fn parse_pragma(&mut self) -> Result {
    self.advance();

    let Some(directive) = self.eat_word() else {
      return Err(Panic::new(self.peek_source(), "Expected pragma directive after 'pragma' keyword"));
    };

    match directive.as_str() {
      "no_discard" => self.next_builtin_traits |= FuncTraits::NO_DISCARD,
      "disallow" => self.next_builtin_traits |= FuncTraits::DISALLOW,
      "no_suggest" => self.next_builtin_traits |= FuncTraits::NO_SUGGEST,
      "warn_bad_printf_format" =>
        self.next_builtin_traits |= FuncTraits::WARN_BAD_PRINTF_FORMAT,
      other => {
        log::debug!("pragma '{other}' left for the driver");

        // Arguments to driver pragmas are consumed without interpretation.
        while !matches!(self.peek(), TokenKind::Newline | TokenKind::None) {
          self.advance();
        }
      }
    }

    Ok(())
  }

  /// Parse `namespace name`; the scope lasts until a matching `end`.
  pub fn parse_namespace(&mut self) -> Result {
    let source = self.peek_source();
    self.advance();

    if self.has_namespace_scope {
      return Err(Panic::new(source, "Cannot open namespace inside another namespace"));
    }

    let name = self.take_word("Expected name of namespace after 'namespace' keyword")?;

    self.has_namespace_scope = true;
    self.current_namespace = Some(name);
    Ok(())
  }

  /// Parse a `#directive` in statement or global position.
  pub fn parse_meta_directive(&mut self) -> Result {
    let source = self.peek_source();
    let directive = self.tokens.take_meta_name(self.i).expect("meta token");
    self.advance();

    match directive.as_str() {
      "set" => {
        let name = self.take_word("Expected variable name after '#set'")?;
        let mut value = self.parse_meta_expr()?;
        value.collapse(&self.ast.meta_definitions, source)?;
        self.ast.meta_definitions.push(MetaDefinition::new(name, value));
        Ok(())
      }
      "get" => Err(Panic::new(source, "'#get' can only be used inside an expression")),
      other => Err(Panic::new(source, format!("Unrecognized meta directive '#{other}'"))),
    }
  }

  // The meta expression grammar mirrors the main precedence climb over a
  // much smaller primary set.
  fn parse_meta_expr(&mut self) -> Result<MetaExpr> {
    let primary = self.parse_meta_primary_expr()?;
    self.parse_meta_op_expr(0, primary)
  }

  fn parse_meta_primary_expr(&mut self) -> Result<MetaExpr> {
    let source = self.peek_source();

    let expr = match self.peek().clone() {
      TokenKind::True => MetaExpr::True,
      TokenKind::False => MetaExpr::False,
      TokenKind::Null => MetaExpr::Null,
      TokenKind::Undef => MetaExpr::Undef,
      TokenKind::Byte(v) => MetaExpr::Int(i64::from(v)),
      TokenKind::Ubyte(v) => MetaExpr::Int(i64::from(v)),
      TokenKind::Short(v) => MetaExpr::Int(i64::from(v)),
      TokenKind::Ushort(v) => MetaExpr::Int(i64::from(v)),
      TokenKind::Int(v) => MetaExpr::Int(i64::from(v)),
      TokenKind::Uint(v) => MetaExpr::Int(i64::from(v)),
      TokenKind::Long(v) | TokenKind::GenericInt(v) => MetaExpr::Int(v),
      TokenKind::Ulong(v) | TokenKind::Usize(v) => MetaExpr::Int(v as i64),
      TokenKind::Float(v) => MetaExpr::Float(f64::from(v)),
      TokenKind::Double(v) | TokenKind::GenericFloat(v) => MetaExpr::Float(v),
      TokenKind::Str(_) | TokenKind::CStr(_) => {
        let value = self.eat_string().expect("string token");
        return Ok(MetaExpr::Str(value));
      }
      TokenKind::Word(_) => {
        let name = self.eat_word().expect("word token");
        return Ok(MetaExpr::Var { name, source });
      }
      TokenKind::Open => {
        self.advance();
        self.ignore_newlines("Expected ')' after meta expression")?;
        let inner = self.parse_meta_expr()?;
        self.expect(&TokenKind::Close, "Expected ')' after meta expression")?;
        return Ok(inner);
      }
      TokenKind::Not => {
        self.advance();
        let inner = self.parse_meta_primary_expr()?;
        return Ok(MetaExpr::Not(Box::new(inner)));
      }
      TokenKind::Subtract => {
        self.advance();
        let inner = self.parse_meta_primary_expr()?;
        return Ok(MetaExpr::Binary {
          op: MetaOp::Sub,
          a: Box::new(MetaExpr::Int(0)),
          b: Box::new(inner),
        });
      }
      _ => return Err(self.unexpected_token("Unexpected token {} in meta expression")),
    };

    self.advance();
    Ok(expr)
  }

  fn meta_precedence_of(kind: &TokenKind) -> i32 {
    match kind {
      TokenKind::UberAnd | TokenKind::UberOr => 2,
      TokenKind::And | TokenKind::Or | TokenKind::BitXor => 3,
      TokenKind::Equals | TokenKind::NotEquals | TokenKind::LessThan
      | TokenKind::GreaterThan | TokenKind::LessThanEq | TokenKind::GreaterThanEq => 4,
      TokenKind::Add | TokenKind::Subtract => 5,
      TokenKind::Multiply | TokenKind::Divide | TokenKind::Modulus => 6,
      _ => 0,
    }
  }

  fn parse_meta_op_expr(&mut self, precedence: i32, mut left: MetaExpr) -> Result<MetaExpr> {
    loop {
      let op = match self.peek() {
        TokenKind::UberAnd | TokenKind::And => MetaOp::And,
        TokenKind::UberOr | TokenKind::Or => MetaOp::Or,
        TokenKind::BitXor => MetaOp::Xor,
        TokenKind::Add => MetaOp::Add,
        TokenKind::Subtract => MetaOp::Sub,
        TokenKind::Multiply => MetaOp::Mul,
        TokenKind::Divide => MetaOp::Div,
        TokenKind::Modulus => MetaOp::Mod,
        TokenKind::Equals => MetaOp::Eq,
        TokenKind::NotEquals => MetaOp::Neq,
        TokenKind::GreaterThan => MetaOp::Gt,
        TokenKind::GreaterThanEq => MetaOp::Gte,
        TokenKind::LessThan => MetaOp::Lt,
        TokenKind::LessThanEq => MetaOp::Lte,
        _ => return Ok(left),
      };

      let op_prec = Parser::meta_precedence_of(self.peek());
      if op_prec < precedence {
        return Ok(left);
      }

      self.advance();
      self.ignore_newlines("Unexpected meta expression termination")?;

      let mut right = self.parse_meta_primary_expr()?;
      if op_prec < Parser::meta_precedence_of(self.peek()) {
        right = self.parse_meta_op_expr(op_prec + 1, right)?;
      }

      left = MetaExpr::Binary { op, a: Box::new(left), b: Box::new(right) };
    }
  }
}
