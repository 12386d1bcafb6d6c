//! Expression parsing: primaries, post-expression modifiers, and
//! precedence climbing.
//!
//! Newlines terminate expressions unless the cursor is inside a
//! parenthesized, bracketed, or argument-list region; those regions bump
//! `ignore_newlines_in_expr_depth` on entry and decrement it on every exit
//! path.

use super::Parser;
use crate::error::{Panic, Result};
use crate::token::TokenKind;
use crate::types::expr::{
  BinaryOp, CallExpr, DeclareStmt, DeclareTraits, Expr, ExprKind, ExprList,
  FuncAddrExpr, MethodCallExpr, NewExpr, StaticDataExpr, StaticKind, SuperExpr,
};
use crate::types::meta::MetaExpr;
use crate::types::Source;

fn precedence_of(kind: &TokenKind) -> i32 {
  match kind {
    TokenKind::Maybe => 1,
    TokenKind::UberAnd | TokenKind::UberOr => 2,
    TokenKind::And | TokenKind::Or => 3,
    TokenKind::Equals | TokenKind::NotEquals | TokenKind::LessThan
    | TokenKind::GreaterThan | TokenKind::LessThanEq | TokenKind::GreaterThanEq => 4,
    TokenKind::Add | TokenKind::Subtract | TokenKind::Word(_) => 5,
    TokenKind::Multiply | TokenKind::Divide | TokenKind::Modulus => 6,
    TokenKind::As => 7,
    _ => 0,
  }
}

// Tokens that end the expression at the operator level.
fn is_terminating_token(kind: &TokenKind) -> bool {
  matches!(
    kind,
    TokenKind::Word(_) | TokenKind::Assign | TokenKind::Close | TokenKind::Begin
    | TokenKind::End | TokenKind::Newline | TokenKind::Next | TokenKind::BracketClose
    | TokenKind::AddAssign | TokenKind::SubtractAssign | TokenKind::MultiplyAssign
    | TokenKind::DivideAssign | TokenKind::ModulusAssign | TokenKind::AndAssign
    | TokenKind::OrAssign | TokenKind::XorAssign | TokenKind::LshiftAssign
    | TokenKind::RshiftAssign | TokenKind::LgcLshiftAssign | TokenKind::LgcRshiftAssign
    | TokenKind::Terminate | TokenKind::Colon | TokenKind::Break | TokenKind::Continue
    | TokenKind::Defer | TokenKind::Delete | TokenKind::Each | TokenKind::Else
    | TokenKind::Exhaustive | TokenKind::For | TokenKind::If | TokenKind::Repeat
    | TokenKind::Return | TokenKind::Switch | TokenKind::Unless | TokenKind::Until
    | TokenKind::Using | TokenKind::VaArg | TokenKind::VaEnd | TokenKind::VaStart
    | TokenKind::While
  )
}

impl Parser<'_> {
  /// Parse a complete expression at the cursor.
  pub fn parse_expr(&mut self) -> Result<Expr> {
    let primary = self.parse_primary_expr()?;
    self.parse_op_expr(0, primary, false)
  }

  /// Parse an expression but stop before any binary operator, keeping the
  /// result suitable as a mutable operand.
  pub fn parse_expr_keep_mutable(&mut self) -> Result<Expr> {
    let primary = self.parse_primary_expr()?;
    self.parse_op_expr(0, primary, true)
  }

  /// Parse a primary expression (with its post-expression modifiers).
  pub fn parse_primary_expr(&mut self) -> Result<Expr> {
    let source = self.peek_source();

    let expr = match self.peek().clone() {
      TokenKind::Byte(value) => self.literal(ExprKind::Byte(value), source),
      TokenKind::Ubyte(value) => self.literal(ExprKind::Ubyte(value), source),
      TokenKind::Short(value) => self.literal(ExprKind::Short(value), source),
      TokenKind::Ushort(value) => self.literal(ExprKind::Ushort(value), source),
      TokenKind::Int(value) => self.literal(ExprKind::Int(value), source),
      TokenKind::Uint(value) => self.literal(ExprKind::Uint(value), source),
      TokenKind::Long(value) => self.literal(ExprKind::Long(value), source),
      TokenKind::Ulong(value) => self.literal(ExprKind::Ulong(value), source),
      TokenKind::Usize(value) => self.literal(ExprKind::Usize(value), source),
      TokenKind::GenericInt(value) => self.literal(ExprKind::GenericInt(value), source),
      TokenKind::Float(value) => self.literal(ExprKind::Float(value), source),
      TokenKind::Double(value) => self.literal(ExprKind::Double(value), source),
      TokenKind::GenericFloat(value) => self.literal(ExprKind::GenericFloat(value), source),
      TokenKind::True => self.literal(ExprKind::Boolean(true), source),
      TokenKind::False => self.literal(ExprKind::Boolean(false), source),
      TokenKind::Null => self.literal(ExprKind::Null, source),

      TokenKind::Str(_) => {
        let value = self.eat_string().expect("string token");
        Expr::new(ExprKind::Str(value), source)
      }
      TokenKind::CStr(_) => {
        let value = self.eat_string().expect("cstring token");
        Expr::new(ExprKind::CStr(value), source)
      }

      TokenKind::Word(_) => self.parse_expr_word()?,

      TokenKind::Associate => {
        self.advance();
        let kind = self.take_word("Expected enum value name after '::' operator")?;
        Expr::new(ExprKind::GenericEnumValue(kind), source)
      }

      TokenKind::Open => {
        self.advance();
        self.ignore_newlines("Expected ')' after expression")?;

        self.ignore_newlines_in_expr_depth += 1;
        let inner = self.parse_expr();
        self.ignore_newlines_in_expr_depth -= 1;

        let inner = inner?;
        self.expect(&TokenKind::Close, "Expected ')' after expression")?;
        inner
      }

      TokenKind::Address => self.parse_expr_address()?,
      TokenKind::Func => self.parse_expr_func_address()?,
      TokenKind::Multiply => {
        self.advance();
        let value = self.parse_expr_keep_mutable()?;
        Expr::new(ExprKind::Dereference(Box::new(value)), source)
      }
      TokenKind::Cast => self.parse_expr_cast()?,
      TokenKind::Sizeof => self.parse_expr_sizeof()?,
      TokenKind::Alignof => {
        self.advance();
        let ty = self.parse_type()?;
        Expr::new(ExprKind::Alignof(ty), source)
      }
      TokenKind::Typeinfo => {
        self.advance();
        let ty = self.parse_type()?;
        Expr::new(ExprKind::Typeinfo(ty), source)
      }
      TokenKind::Typenameof => {
        self.advance();
        let ty = self.parse_type()?;
        Expr::new(ExprKind::Typenameof(ty), source)
      }

      TokenKind::Not => self.parse_expr_unary(|v| ExprKind::Not(v))?,
      TokenKind::BitComplement => self.parse_expr_unary(|v| ExprKind::BitComplement(v))?,
      TokenKind::Subtract => self.parse_expr_unary(|v| ExprKind::Negate(v))?,

      TokenKind::New => self.parse_expr_new()?,
      TokenKind::Static => self.parse_expr_static()?,
      TokenKind::Def | TokenKind::Undef => self.parse_expr_def()?,

      TokenKind::Increment =>
        self.parse_expr_mutable_unary_prefix("++", |v| ExprKind::PreIncrement(v))?,
      TokenKind::Decrement =>
        self.parse_expr_mutable_unary_prefix("--", |v| ExprKind::PreDecrement(v))?,

      TokenKind::Meta(_) => self.parse_expr_meta_get()?,
      TokenKind::VaArg => self.parse_expr_va_arg()?,
      TokenKind::Begin => self.parse_expr_initlist()?,

      TokenKind::PolyCount(_) => {
        let name = self.tokens.take_poly_name(self.i).expect("polycount token");
        self.advance();
        Expr::new(ExprKind::PolyCount { name }, source)
      }

      TokenKind::Embed => {
        self.advance();
        let path = match self.eat_string() {
          Some(path) => path,
          None => return Err(Panic::new(self.peek_source(), "Expected filename after 'embed' keyword")),
        };
        Expr::new(ExprKind::Embed(path), source)
      }

      _ => return Err(self.unexpected_token("Unexpected token {} in expression")),
    };

    self.parse_expr_post(expr)
  }

  fn literal(&mut self, kind: ExprKind, source: Source) -> Expr {
    self.advance();
    Expr::new(kind, source)
  }

  // A word begins a call, a parent-constructor call, an enum value, or a
  // variable reference.
  fn parse_expr_word(&mut self) -> Result<Expr> {
    match self.peek_ahead(1) {
      TokenKind::Open if self.tokens.peek_word(self.i) == Some("super") =>
        return self.parse_expr_super(),
      TokenKind::Open => return self.parse_expr_call(false),
      TokenKind::Associate => return self.parse_expr_enum_value(),
      _ => {}
    }

    let source = self.peek_source();
    let name = self.take_word("Expected variable name")?;
    Ok(Expr::new(ExprKind::Variable(name), source))
  }

  // `super(args...)` — call the parent class constructor.
  fn parse_expr_super(&mut self) -> Result<Expr> {
    let source = self.peek_source();
    self.advance(); // 'super'
    self.expect(&TokenKind::Open, "Expected '(' after 'super' keyword")?;

    self.ignore_newlines_in_expr_depth += 1;
    let args = self.parse_expr_arguments();
    self.ignore_newlines_in_expr_depth -= 1;
    let args = args?;

    Ok(Expr::new(
      ExprKind::SuperCall(Box::new(SuperExpr { args, is_tentative: false })),
      source,
    ))
  }

  /// Parse a call expression at its name token.
  pub fn parse_expr_call(&mut self, allow_tentative: bool) -> Result<Expr> {
    let source = self.peek_source();
    let name = self.take_word("Expected function name")?;

    self.ignore_newlines("Unexpected statement termination")?;
    let is_tentative = self.eat(&TokenKind::Maybe);
    self.expect(&TokenKind::Open, "Expected '(' after function name for function call")?;

    self.ignore_newlines_in_expr_depth += 1;
    let args = self.parse_expr_arguments();
    self.ignore_newlines_in_expr_depth -= 1;
    let args = args?;

    if is_tentative && !allow_tentative {
      return Err(Panic::new(source, "Tentative calls cannot be used in expressions"));
    }

    let gives = if self.eat(&TokenKind::Gives) {
      Some(self.parse_type()?)
    } else {
      None
    };

    Ok(Expr::new(
      ExprKind::Call(Box::new(CallExpr { name, args, is_tentative, gives, no_discard: false })),
      source,
    ))
  }

  /// Parse `(arg1, arg2, ...)` after the opening parenthesis has been
  /// consumed; consumes the closing one.
  pub fn parse_expr_arguments(&mut self) -> Result<ExprList> {
    let mut args = ExprList::new();

    while self.peek() != &TokenKind::Close {
      self.ignore_newlines("Expected argument")?;
      args.push(self.parse_expr()?);
      self.ignore_newlines("Expected ',' or ')' after expression")?;

      if !self.eat(&TokenKind::Next) && self.peek() != &TokenKind::Close {
        return Err(Panic::new(self.peek_source(), "Expected ',' or ')' after expression"));
      }
    }

    self.advance();
    Ok(args)
  }

  // `Color::RED`
  fn parse_expr_enum_value(&mut self) -> Result<Expr> {
    let source = self.peek_source();
    let enum_name = self.take_word("Expected enum name")?;
    self.expect(&TokenKind::Associate, "Expected '::' operator for enum value")?;
    let kind = self.take_word("Expected enum value name after '::' operator")?;

    Ok(Expr::new(ExprKind::EnumValue { enum_name, kind }, source))
  }

  fn parse_expr_address(&mut self) -> Result<Expr> {
    let source = self.peek_source();
    self.advance();

    let value = self.parse_expr_keep_mutable()?;
    if !value.is_mutable() {
      return Err(Panic::new(value.source, "The '&' operator requires the operand to be mutable"));
    }

    Ok(Expr::new(ExprKind::Address(Box::new(value)), source))
  }

  // `func &name(int, int)` — optionally `func null &name` for tentative
  // lookup.
  fn parse_expr_func_address(&mut self) -> Result<Expr> {
    let source = self.peek_source();
    self.advance();

    let tentative = self.eat(&TokenKind::Null);
    self.expect(&TokenKind::Address, "Expected '&' after 'func' keyword in expression")?;
    let name = self.take_word("Expected function name after 'func &' operator")?;

    let match_args = if self.eat(&TokenKind::Open) {
      let mut args = Vec::new();

      while self.i < self.tokens.len() && self.peek() != &TokenKind::Close {
        self.ignore_newlines("Expected function argument")?;
        args.push(self.parse_type()?);

        if self.eat(&TokenKind::Next) {
          if self.peek() == &TokenKind::Close {
            return Err(Panic::new(self.peek_source(), "Expected type after ',' in argument list"));
          }
        } else if self.peek() != &TokenKind::Close {
          return Err(Panic::new(self.peek_source(), "Expected ',' after argument type"));
        }
      }

      self.advance();
      Some(args)
    } else {
      None
    };

    Ok(Expr::new(
      ExprKind::FuncAddr(Box::new(FuncAddrExpr { name, match_args, tentative })),
      source,
    ))
  }

  // `cast Type (value)` or `cast Type value`. The parenthesized form only
  // applies the cast to the parenthesized expression.
  fn parse_expr_cast(&mut self) -> Result<Expr> {
    let source = self.peek_source();
    self.advance();

    let to = self.parse_type()?;
    self.ignore_newlines("Unexpected statement termination")?;

    let value = if self.eat(&TokenKind::Open) {
      self.ignore_newlines("Unexpected statement termination")?;
      let inner = self.parse_expr()?;
      self.expect(&TokenKind::Close, "Expected ')' after expression given to 'cast'")?;
      inner
    } else {
      self.parse_primary_expr()?
    };

    Ok(Expr::new(ExprKind::Cast { to, value: Box::new(value) }, source))
  }

  // `sizeof (value)` takes the expression interpretation; a type operand
  // must be written without parentheses.
  fn parse_expr_sizeof(&mut self) -> Result<Expr> {
    let source = self.peek_source();
    self.advance();

    if self.peek() == &TokenKind::Open {
      let value = self.parse_primary_expr()?;
      Ok(Expr::new(ExprKind::SizeofValue(Box::new(value)), source))
    } else {
      let ty = self.parse_type()?;
      Ok(Expr::new(ExprKind::Sizeof(ty), source))
    }
  }

  fn parse_expr_unary(&mut self, make: impl FnOnce(Box<Expr>) -> ExprKind) -> Result<Expr> {
    let source = self.peek_source();
    self.advance();

    let value = self.parse_primary_expr()?;
    Ok(Expr::new(make(Box::new(value)), source))
  }

  fn parse_expr_mutable_unary_prefix(
    &mut self,
    readable_operator: &str,
    make: impl FnOnce(Box<Expr>) -> ExprKind,
  ) -> Result<Expr> {
    let source = self.peek_source();
    self.advance();

    let value = self.parse_expr_keep_mutable()?;
    if !value.is_mutable() {
      return Err(Panic::new(
        value.source,
        format!("The '{readable_operator}' operator requires the operand to be mutable"),
      ));
    }

    Ok(Expr::new(make(Box::new(value)), source))
  }

  // `new Type`, `new undef Type`, `new Type * count`, `new Type (args)`,
  // `new "cstring"`.
  fn parse_expr_new(&mut self) -> Result<Expr> {
    let source = self.peek_source();
    self.advance();

    if matches!(self.peek(), TokenKind::CStr(_)) {
      let value = self.eat_string().expect("cstring token");
      return Ok(Expr::new(ExprKind::NewCstring(value), source));
    }

    let is_undef = self.eat(&TokenKind::Undef);
    let ty = self.parse_type()?;

    let inputs = if self.eat(&TokenKind::Open) {
      Some(self.parse_expr_arguments()?)
    } else {
      None
    };

    let amount = if self.eat(&TokenKind::Multiply) {
      Some(Box::new(self.parse_primary_expr()?))
    } else {
      None
    };

    Ok(Expr::new(
      ExprKind::New(Box::new(NewExpr { ty, amount, inputs, is_undef })),
      source,
    ))
  }

  // `static Type (v1, v2)` struct-shaped; `static Type { v1, v2 }`
  // array-shaped.
  fn parse_expr_static(&mut self) -> Result<Expr> {
    let source = self.peek_source();
    self.advance();

    let ty = self.parse_type()?;

    let (kind, closer, message) = match self.peek() {
      TokenKind::Begin => (StaticKind::Array, TokenKind::End, "Expected ',' or '}' after expression"),
      TokenKind::Open => (StaticKind::Struct, TokenKind::Close, "Expected ',' or ')' after expression"),
      _ => return Err(Panic::new(self.peek_source(), "Expected '(' or '{' after given type")),
    };
    self.advance();

    let mut values = ExprList::new();
    while self.peek() != &closer {
      self.ignore_newlines("Expected expression")?;
      values.push(self.parse_expr()?);
      self.ignore_newlines(message)?;

      if !self.eat(&TokenKind::Next) && self.peek() != &closer {
        return Err(Panic::new(self.peek_source(), message));
      }
    }
    self.advance();

    Ok(Expr::new(
      ExprKind::StaticData(Box::new(StaticDataExpr { kind, ty, values })),
      source,
    ))
  }

  // `def name Type [= value]` / `undef name Type` — inline declarations
  // usable as value expressions.
  fn parse_expr_def(&mut self) -> Result<Expr> {
    let source = self.peek_source();
    let is_undef = self.peek() == &TokenKind::Undef;
    self.advance();

    let name = self.take_word("Expected variable name for inline declaration")?;

    let mut traits = DeclareTraits::empty();
    if self.eat(&TokenKind::Pod) {
      traits |= DeclareTraits::POD;
    }

    let ty = self.parse_type()?;

    let value = if self.eat(&TokenKind::Assign) {
      if is_undef {
        return Err(Panic::new(self.peek_source(), "Can't initialize undefined inline variable"));
      }

      if self.eat(&TokenKind::Pod) {
        traits |= DeclareTraits::ASSIGN_POD;
      }

      Some(Box::new(self.parse_expr()?))
    } else {
      None
    };

    Ok(Expr::new(
      ExprKind::Declare(Box::new(DeclareStmt {
        name,
        ty,
        value,
        inputs: None,
        traits,
        is_undef,
        is_inline: true,
      })),
      source,
    ))
  }

  // `#get name` splices a collapsed meta value into the expression.
  fn parse_expr_meta_get(&mut self) -> Result<Expr> {
    let source = self.peek_source();
    let directive = self.tokens.take_meta_name(self.i).expect("meta token");
    self.advance();

    if directive != "get" {
      return Err(Panic::new(
        source,
        format!("Unexpected meta directive '#{directive}' in expression"),
      ));
    }

    let name = self.take_word("Expected variable name after '#get'")?;

    let value = match self.compiler.special_meta_variable(&name) {
      Some(special) => special,
      None => match crate::types::meta::find_definition(&self.ast.meta_definitions, &name) {
        Some(definition) => definition.value.clone(),
        None => return Err(Panic::new(source, format!("Variable '{name}' does not exist"))),
      },
    };

    assert!(value.is_collapsed(), "meta definitions hold collapsed values");

    let kind = match value {
      MetaExpr::Undef | MetaExpr::Null => ExprKind::Null,
      MetaExpr::True => ExprKind::Boolean(true),
      MetaExpr::False => ExprKind::Boolean(false),
      MetaExpr::Str(string) => ExprKind::Str(string),
      MetaExpr::Int(integer) => ExprKind::Long(integer),
      MetaExpr::Float(float) => ExprKind::Double(float),
      _ => unreachable!("collapsed meta expression"),
    };

    Ok(Expr::new(kind, source))
  }

  // `va_arg(list, Type)`
  fn parse_expr_va_arg(&mut self) -> Result<Expr> {
    let source = self.peek_source();
    self.advance();

    self.expect(&TokenKind::Open, "Expected '(' after va_arg keyword")?;
    let list = self.parse_expr()?;
    self.expect(&TokenKind::Next, "Expected ',' after first parameter to va_arg")?;
    let ty = self.parse_type()?;
    self.expect(&TokenKind::Close, "Expected ')' after va_arg parameters")?;

    Ok(Expr::new(ExprKind::VaArg { list: Box::new(list), ty }, source))
  }

  // `{ v1, v2, ... }`
  fn parse_expr_initlist(&mut self) -> Result<Expr> {
    let source = self.peek_source();
    self.advance();

    let mut values = ExprList::new();
    self.ignore_newlines("Expected '}' or ',' in initializer list before end of file")?;

    while self.peek() != &TokenKind::End {
      values.push(self.parse_expr()?);
      self.ignore_newlines("Expected '}' or ',' in initializer list before end of file")?;

      if self.eat(&TokenKind::Next) {
        self.ignore_newlines("Expected '}' or ',' in initializer list before end of file")?;
      } else if self.peek() != &TokenKind::End {
        return Err(Panic::new(self.peek_source(), "Expected '}' or ',' in initializer list"));
      }
    }

    self.advance();
    Ok(Expr::new(ExprKind::InitializerList(values), source))
  }

  /// Apply post-expression modifiers: `[index]`, `.field`, `.method(...)`,
  /// `at index`, postfix `++`/`--`, and `!!`.
  pub fn parse_expr_post(&mut self, mut expr: Expr) -> Result<Expr> {
    loop {
      match self.peek() {
        TokenKind::BracketOpen => {
          let source = self.peek_source();
          self.advance();

          self.ignore_newlines_in_expr_depth += 1;
          let index = self.parse_expr();
          self.ignore_newlines_in_expr_depth -= 1;
          let index = index?;

          self.expect(&TokenKind::BracketClose, "Expected ']' after array index expression")?;

          expr = Expr::new(
            ExprKind::ArrayAccess { value: Box::new(expr), index: Box::new(index) },
            source,
          );
        }

        TokenKind::Member => {
          self.advance();
          let is_tentative = self.eat(&TokenKind::Maybe);
          self.ignore_newlines("Unexpected statement termination")?;

          let source = self.peek_source();
          let name = self.take_word("Expected identifier after '.' operator")?;

          if self.eat(&TokenKind::Open) {
            self.ignore_newlines_in_expr_depth += 1;
            let args = self.parse_expr_arguments();
            self.ignore_newlines_in_expr_depth -= 1;
            let args = args?;

            let gives = if self.eat(&TokenKind::Gives) {
              Some(self.parse_type()?)
            } else {
              None
            };

            expr = Expr::new(
              ExprKind::MethodCall(Box::new(MethodCallExpr {
                name,
                subject: Box::new(expr),
                args,
                is_tentative,
                gives,
                no_discard: false,
              })),
              source,
            );
          } else {
            if is_tentative {
              return Err(Panic::new(source, "Cannot have tentative field access"));
            }

            expr = Expr::new(
              ExprKind::Member { value: Box::new(expr), member: name },
              source,
            );
          }
        }

        TokenKind::At => {
          let source = self.peek_source();
          self.advance();
          let index = self.parse_primary_expr()?;

          expr = Expr::new(
            ExprKind::At { value: Box::new(expr), index: Box::new(index) },
            source,
          );
        }

        TokenKind::Increment | TokenKind::Decrement => {
          let source = self.peek_source();
          let is_increment = self.peek() == &TokenKind::Increment;
          self.advance();

          if !expr.is_mutable() {
            return Err(Panic::new(
              source,
              if is_increment {
                "Can only increment mutable values"
              } else {
                "Can only decrement mutable values"
              },
            ));
          }

          expr = Expr::new(
            if is_increment {
              ExprKind::PostIncrement(Box::new(expr))
            } else {
              ExprKind::PostDecrement(Box::new(expr))
            },
            source,
          );
        }

        TokenKind::Toggle => {
          let source = self.peek_source();
          if !expr.is_mutable() {
            return Err(Panic::new(source, "Cannot perform '!!' operator on immutable values"));
          }
          self.advance();
          expr = Expr::new(ExprKind::Toggle(Box::new(expr)), source);
        }

        _ => return Ok(expr),
      }
    }
  }

  /// The precedence-climbing operator loop.
  pub fn parse_op_expr(&mut self, precedence: i32, mut left: Expr, keep_mutable: bool) -> Result<Expr> {
    while self.i < self.tokens.len() {
      // Await possible termination.
      loop {
        if !is_terminating_token(self.peek()) {
          break;
        }

        if self.peek() != &TokenKind::Newline || self.ignore_newlines_in_expr_depth == 0 {
          return Ok(left);
        }

        // Newlines inside an open region are skipped.
        self.ignore_newlines("Unexpected statement termination")?;
      }

      let source = self.peek_source();
      let op_prec = precedence_of(self.peek());
      if op_prec < precedence || keep_mutable {
        return Ok(left);
      }

      left = match self.peek() {
        TokenKind::Add => self.parse_math(left, BinaryOp::Add, op_prec, source)?,
        TokenKind::Subtract => self.parse_math(left, BinaryOp::Subtract, op_prec, source)?,
        TokenKind::Multiply => self.parse_math(left, BinaryOp::Multiply, op_prec, source)?,
        TokenKind::Divide => self.parse_math(left, BinaryOp::Divide, op_prec, source)?,
        TokenKind::Modulus => self.parse_math(left, BinaryOp::Modulus, op_prec, source)?,
        TokenKind::Equals => self.parse_math(left, BinaryOp::Equals, op_prec, source)?,
        TokenKind::NotEquals => self.parse_math(left, BinaryOp::NotEquals, op_prec, source)?,
        TokenKind::GreaterThan => self.parse_math(left, BinaryOp::Greater, op_prec, source)?,
        TokenKind::LessThan => self.parse_math(left, BinaryOp::Lesser, op_prec, source)?,
        TokenKind::GreaterThanEq => self.parse_math(left, BinaryOp::GreaterEq, op_prec, source)?,
        TokenKind::LessThanEq => self.parse_math(left, BinaryOp::LesserEq, op_prec, source)?,
        TokenKind::BitOr => self.parse_math(left, BinaryOp::BitOr, op_prec, source)?,
        TokenKind::BitXor => self.parse_math(left, BinaryOp::BitXor, op_prec, source)?,
        TokenKind::BitLshift => self.parse_math(left, BinaryOp::BitLshift, op_prec, source)?,
        TokenKind::BitRshift => self.parse_math(left, BinaryOp::BitRshift, op_prec, source)?,
        TokenKind::BitLgcLshift => self.parse_math(left, BinaryOp::BitLgcLshift, op_prec, source)?,
        TokenKind::BitLgcRshift => self.parse_math(left, BinaryOp::BitLgcRshift, op_prec, source)?,
        TokenKind::Address => self.parse_math(left, BinaryOp::BitAnd, op_prec, source)?,
        TokenKind::And | TokenKind::UberAnd => self.parse_math(left, BinaryOp::And, op_prec, source)?,
        TokenKind::Or | TokenKind::UberOr => self.parse_math(left, BinaryOp::Or, op_prec, source)?,

        TokenKind::As => {
          self.advance();
          let to = self.parse_type()?;
          let cast = Expr::new(ExprKind::Cast { to, value: Box::new(left) }, source);
          self.parse_expr_post(cast)?
        }

        TokenKind::At => {
          self.advance();
          let index = self.parse_primary_expr()?;
          let access = Expr::new(
            ExprKind::At { value: Box::new(left), index: Box::new(index) },
            source,
          );
          self.parse_expr_post(access)?
        }

        TokenKind::Maybe => self.parse_expr_ternary(left, source)?,

        _ => return Err(self.unexpected_token("Unrecognized operator {} in expression")),
      };
    }

    Ok(left)
  }

  fn parse_math(&mut self, left: Expr, op: BinaryOp, op_prec: i32, source: Source) -> Result<Expr> {
    let right = self.parse_rhs_expr(op_prec)?;
    Ok(Expr::new(
      ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) },
      source,
    ))
  }

  // The right-hand side of a binary operator; climbs while the next
  // operator binds tighter.
  fn parse_rhs_expr(&mut self, op_prec: i32) -> Result<Expr> {
    self.advance();
    self.ignore_newlines("Unexpected expression termination")?;

    let mut right = self.parse_primary_expr()?;
    if op_prec < precedence_of(self.peek()) {
      right = self.parse_op_expr(op_prec + 1, right, false)?;
    }

    Ok(right)
  }

  // `condition ? a : b`
  fn parse_expr_ternary(&mut self, condition: Expr, source: Source) -> Result<Expr> {
    self.advance();

    self.ignore_newlines("Unexpected end of expression")?;
    let if_true = self.parse_expr()?;

    self.ignore_newlines("Unexpected end of expression")?;
    self.expect(&TokenKind::Colon, "Ternary operator expected ':' after expression")?;
    self.ignore_newlines("Unexpected end of expression")?;

    let if_false = self.parse_expr()?;

    Ok(Expr::new(
      ExprKind::Ternary {
        condition: Box::new(condition),
        if_true: Box::new(if_true),
        if_false: Box::new(if_false),
      },
      source,
    ))
  }
}
