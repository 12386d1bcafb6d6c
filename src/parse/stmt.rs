//! Statement parsing and the defer-scope tree.
//!
//! Each iterable or labelable scope pushes a frame that collects deferred
//! statements. Leaving a scope normally flushes its frame in LIFO order
//! into the emitted statement list; `break`/`continue`/`fallthrough`
//! rewind through enclosing frames by cloning their deferred statements;
//! `return` unwinds everything.

use bitflags::bitflags;
use if_chain::if_chain;

use super::Parser;
use crate::error::{Panic, Result};
use crate::token::TokenKind;
use crate::types::expr::{
  AssertStmt, AssignKind, AssignStmt, ConditionalStmt, DeclareStmt, DeclareTraits,
  EachInStmt, Expr, ExprKind, ExprList, ForStmt, IfElseStmt, InlineAsmExpr,
  LoopAlwaysStmt, RepeatStmt, SwitchStmt, Case,
};
use crate::types::ty::{Type, TypeElem};
use crate::types::Source;

bitflags! {
  /// What kinds of rewinding a defer scope participates in.
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
  pub struct ScopeTraits: u8 {
    /// `break` may target this scope.
    const BREAKABLE = 1;
    /// `continue` may target this scope.
    const CONTINUABLE = 1 << 1;
    /// `fallthrough` may target this scope.
    const FALLTHROUGHABLE = 1 << 2;
  }
}

bitflags! {
  /// How `parse_stmts` should behave; empty is the standard block mode.
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
  pub struct StmtsMode: u8 {
    /// Parse exactly one statement.
    const SINGLE = 1;
    /// Do not join statements across ';'.
    const NO_JOINING = 1 << 1;
    /// The caller owns the top defer frame; do not flush it on exit.
    const PARENT_DEFER_SCOPE = 1 << 2;
  }
}

/// One frame of deferred statements.
#[derive(Debug, Default)]
pub struct DeferScope {
  /// Deferred statements in declaration order; flushed in reverse.
  pub list: ExprList,
  /// The scope's label, if the construct was labeled.
  pub label: Option<String>,
  /// Which rewinds may stop at this scope.
  pub traits: ScopeTraits,
}

/// The stack of open defer scopes for the function being parsed.
#[derive(Debug, Default)]
pub struct DeferScopes {
  frames: Vec<DeferScope>,
}

impl DeferScopes {
  /// A stack with a single root frame.
  #[must_use] pub fn new() -> DeferScopes {
    let mut scopes = DeferScopes::default();
    scopes.push(None, ScopeTraits::empty());
    scopes
  }

  /// Open a scope.
  pub fn push(&mut self, label: Option<String>, traits: ScopeTraits) {
    self.frames.push(DeferScope { list: ExprList::new(), label, traits });
  }

  /// Close the innermost scope, dropping whatever deferred statements were
  /// not flushed (error paths).
  pub fn pop(&mut self) {
    self.frames.pop().expect("unbalanced defer scope pop");
  }

  /// Record a deferred statement on the innermost scope.
  pub fn defer(&mut self, stmt: Expr) {
    self.frames.last_mut().expect("no open defer scope").list.push(stmt);
  }

  /// Flush the innermost scope's deferred statements (moving them) into
  /// `out` in LIFO order.
  pub fn fulfill(&mut self, out: &mut ExprList) {
    let top = self.frames.last_mut().expect("no open defer scope");
    while let Some(stmt) = top.list.pop() {
      out.push(stmt);
    }
  }

  // Clone one frame's deferred statements into `out` in LIFO order.
  fn fulfill_by_cloning(frame: &DeferScope, out: &mut ExprList) {
    for stmt in frame.list.iter().rev() {
      out.push(stmt.clone());
    }
  }

  /// Rewind for `break`/`continue`/`fallthrough`: flush the innermost
  /// scope, then clone outward until a scope carrying `stop` (and matching
  /// `label`, when both are present) is reached.
  pub fn rewind(&mut self, out: &mut ExprList, stop: ScopeTraits, label: Option<&str>) {
    self.fulfill(out);

    let mut depth = self.frames.len() - 1;
    loop {
      let frame = &self.frames[depth];
      let mismatched_label = match (label, &frame.label) {
        (Some(wanted), Some(actual)) => wanted != actual,
        _ => false,
      };

      if (frame.traits.contains(stop) && !mismatched_label) || depth == 0 {
        return;
      }

      depth -= 1;
      DeferScopes::fulfill_by_cloning(&self.frames[depth], out);
    }
  }

  /// Unwind everything for `return`: flush the innermost scope and clone
  /// every enclosing scope's deferred statements, innermost first.
  #[must_use] pub fn unwind_completely(&mut self) -> ExprList {
    let mut out = ExprList::new();
    self.fulfill(&mut out);

    for frame in self.frames[..self.frames.len() - 1].iter().rev() {
      DeferScopes::fulfill_by_cloning(frame, &mut out);
    }

    out
  }
}

impl Parser<'_> {
  // Eat '{' for a standard block or ',' for a single-statement block.
  fn parse_block_beginning(&mut self, to_begin_what: &str) -> Result<StmtsMode> {
    match self.peek() {
      TokenKind::Begin => {
        self.advance();
        Ok(StmtsMode::empty())
      }
      TokenKind::Next => {
        self.advance();
        Ok(StmtsMode::SINGLE)
      }
      _ => Err(Panic::new(
        self.peek_source(),
        format!("Expected '{{' or ',' after {to_begin_what}"),
      )),
    }
  }

  // Parse a dependent block: push a scope, parse its statements, pop, and
  // leave the cursor after the block the same way for both block shapes.
  fn parse_dependent_block(
    &mut self,
    to_begin_what: &str,
    scopes: &mut DeferScopes,
    label: Option<String>,
    traits: ScopeTraits,
  ) -> Result<ExprList> {
    self.ignore_newlines(&format!("Expected '{{' or ',' after {to_begin_what}"))?;
    let mode = self.parse_block_beginning(to_begin_what)?;

    let mut list = ExprList::new();
    scopes.push(label, traits);
    let outcome = self.parse_stmts(&mut list, scopes, mode);
    scopes.pop();
    outcome?;

    if mode.contains(StmtsMode::SINGLE) {
      self.i -= 1;
    } else {
      self.advance();
    }

    Ok(list)
  }

  // A label directly after a loop keyword, `while drain: condition`.
  fn eat_label(&mut self) -> Option<String> {
    if_chain! {
      if matches!(self.peek(), TokenKind::Word(_));
      if self.peek_ahead(1) == &TokenKind::Colon;
      then {
        let label = self.eat_word().expect("checked word");
        self.advance();
        Some(label)
      } else {
        None
      }
    }
  }

  /// Parse statements into `stmt_list` until the closing `}` (or, in
  /// single mode, after one statement).
  pub fn parse_stmts(
    &mut self,
    stmt_list: &mut ExprList,
    scopes: &mut DeferScopes,
    mode: StmtsMode,
  ) -> Result {
    while self.peek() != &TokenKind::End {
      self.ignore_newlines("Unexpected expression termination")?;

      match self.peek() {
        TokenKind::End => break,

        TokenKind::Return => {
          let source = self.peek_source();
          self.advance();

          let value = if self.peek() == &TokenKind::Newline {
            None
          } else {
            Some(Box::new(self.parse_expr()?))
          };

          let last_minute = scopes.unwind_completely();
          stmt_list.push(Expr::new(ExprKind::Return { value, last_minute }, source));
        }

        TokenKind::Str(_) | TokenKind::CStr(_) => {
          // Allow statements such as: "literal".doSomething()
          let expression = self.parse_expr()?;
          if !matches!(expression.kind, ExprKind::MethodCall(_)) {
            return Err(Panic::new(expression.source, "Expression not supported as a statement"));
          }
          stmt_list.push(expression);
        }

        TokenKind::Define => {
          let source = self.peek_source();
          let named_expression = self.parse_named_expression_definition()?;
          stmt_list.push(Expr::new(
            ExprKind::DeclareNamedExpression(Box::new(named_expression)),
            source,
          ));
        }

        TokenKind::Word(_) => match self.peek_ahead(1) {
          TokenKind::Maybe => {
            if self.peek_ahead(2) == &TokenKind::Open {
              self.parse_stmt_call(stmt_list, true)?;
            } else {
              return Err(self.unexpected_token(
                "Encountered unexpected token {} at beginning of statement",
              ));
            }
          }
          TokenKind::Open => self.parse_stmt_call(stmt_list, false)?,
          TokenKind::Word(_) | TokenKind::Func | TokenKind::Stdcall | TokenKind::Next
          | TokenKind::Pod | TokenKind::GenericInt(_) | TokenKind::Multiply
          | TokenKind::LessThan | TokenKind::BitLshift | TokenKind::BitLgcLshift
          | TokenKind::Polymorph(_) | TokenKind::Colon | TokenKind::PolyCount(_)
          | TokenKind::Struct | TokenKind::Packed | TokenKind::Union =>
            self.parse_stmt_declare(stmt_list)?,
          TokenKind::BracketOpen => self.parse_ambiguous_open_bracket(stmt_list)?,
          _ => self.parse_mutable_expr_operation(stmt_list)?,
        },

        TokenKind::Const | TokenKind::Static => self.parse_stmt_declare(stmt_list)?,

        TokenKind::Multiply | TokenKind::Open | TokenKind::Increment
        | TokenKind::Decrement | TokenKind::Address | TokenKind::BitOr
        | TokenKind::BitXor | TokenKind::BitLshift | TokenKind::BitRshift
        | TokenKind::BitLgcLshift | TokenKind::BitLgcRshift =>
          self.parse_mutable_expr_operation(stmt_list)?,

        TokenKind::If | TokenKind::Unless =>
          self.parse_onetime_conditional(stmt_list, scopes)?,

        TokenKind::While | TokenKind::Until => self.parse_loop(stmt_list, scopes)?,
        TokenKind::Each => self.parse_each_in(stmt_list, scopes)?,
        TokenKind::Repeat => self.parse_repeat(stmt_list, scopes)?,

        TokenKind::Defer => {
          self.advance();
          let mut deferred = ExprList::new();
          scopes.push(None, ScopeTraits::empty());
          let outcome = self.parse_stmts(&mut deferred, scopes, StmtsMode::SINGLE);
          scopes.pop();
          outcome?;
          self.i -= 1;

          let top = scopes.frames.last_mut().expect("no open defer scope");
          top.list.append(&mut deferred);
        }

        TokenKind::Delete => {
          let source = self.peek_source();
          self.advance();
          let value = self.parse_primary_expr()?;
          stmt_list.push(Expr::new(ExprKind::Delete(Box::new(value)), source));
        }

        TokenKind::Break => {
          let source = self.peek_source();
          self.advance();

          if matches!(self.peek(), TokenKind::Word(_)) {
            let label = self.eat_word().expect("checked word");
            scopes.rewind(stmt_list, ScopeTraits::BREAKABLE, Some(&label));
            stmt_list.push(Expr::new(ExprKind::BreakTo { label }, source));
          } else {
            scopes.rewind(stmt_list, ScopeTraits::BREAKABLE, None);
            stmt_list.push(Expr::new(ExprKind::Break, source));
          }
        }

        TokenKind::Continue => {
          let source = self.peek_source();
          self.advance();

          if matches!(self.peek(), TokenKind::Word(_)) {
            let label = self.eat_word().expect("checked word");
            scopes.rewind(stmt_list, ScopeTraits::CONTINUABLE, Some(&label));
            stmt_list.push(Expr::new(ExprKind::ContinueTo { label }, source));
          } else {
            scopes.rewind(stmt_list, ScopeTraits::CONTINUABLE, None);
            stmt_list.push(Expr::new(ExprKind::Continue, source));
          }
        }

        TokenKind::FallThrough => {
          let source = self.peek_source();
          self.advance();
          scopes.rewind(stmt_list, ScopeTraits::FALLTHROUGHABLE, None);
          stmt_list.push(Expr::new(ExprKind::FallThrough, source));
        }

        TokenKind::Meta(_) => self.parse_meta_directive()?,

        TokenKind::Exhaustive => {
          self.advance();
          self.parse_switch(stmt_list, scopes, true)?;
        }
        TokenKind::Switch => self.parse_switch(stmt_list, scopes, false)?,

        TokenKind::VaStart | TokenKind::VaEnd => {
          let is_start = self.peek() == &TokenKind::VaStart;
          let source = self.peek_source();
          self.advance();

          let value = Box::new(self.parse_expr()?);
          stmt_list.push(Expr::new(
            if is_start { ExprKind::VaStart(value) } else { ExprKind::VaEnd(value) },
            source,
          ));
        }

        TokenKind::VaCopy => {
          let source = self.peek_source();
          self.advance();

          self.expect(&TokenKind::Open, "Expected '(' after va_copy keyword")?;
          let dest = Box::new(self.parse_expr()?);
          self.expect(&TokenKind::Next, "Expected ',' after first parameter to va_copy")?;
          let src = Box::new(self.parse_expr()?);
          self.expect(&TokenKind::Close, "Expected ')' after va_copy parameters")?;

          stmt_list.push(Expr::new(ExprKind::VaCopy { dest, src }, source));
        }

        TokenKind::For => self.parse_for(stmt_list, scopes)?,
        TokenKind::Asm => self.parse_inline_asm(stmt_list)?,

        TokenKind::Begin => {
          let source = self.peek_source();
          self.advance();

          let mut block = ExprList::new();
          scopes.push(None, ScopeTraits::empty());
          let outcome = self.parse_stmts(&mut block, scopes, StmtsMode::empty());
          scopes.pop();
          outcome?;

          self.expect(&TokenKind::End, "Expected '}' to close condition-less block")?;
          stmt_list.push(Expr::new(ExprKind::Block(block), source));
        }

        TokenKind::Assert => {
          let source = self.peek_source();
          self.advance();

          let assertion = Box::new(self.parse_expr()?);
          let message = if self.eat(&TokenKind::Next) {
            Some(Box::new(self.parse_expr()?))
          } else {
            None
          };

          stmt_list.push(Expr::new(
            ExprKind::Assert(Box::new(AssertStmt { assertion, message })),
            source,
          ));
        }

        _ => return Err(self.unexpected_token(
          "Encountered unexpected token {} at beginning of statement",
        )),
      }

      // Join statements across ';' unless forbidden.
      if self.peek() == &TokenKind::Terminate && !mode.contains(StmtsMode::NO_JOINING) {
        self.advance();
        continue;
      }

      // Step over the statement's terminating newline.
      match self.peek() {
        TokenKind::Newline => self.advance(),
        TokenKind::Meta(directive)
          if directive.as_str() == "else" || directive.as_str() == "elif" =>
          self.advance(),
        TokenKind::Else | TokenKind::Terminate | TokenKind::Close | TokenKind::Begin
        | TokenKind::Next | TokenKind::End => {}
        _ => return Err(self.unexpected_token(
          "Encountered unexpected token {} at end of statement",
        )),
      }

      if mode.contains(StmtsMode::SINGLE) {
        if !mode.contains(StmtsMode::PARENT_DEFER_SCOPE) {
          scopes.fulfill(stmt_list);
        }
        return Ok(());
      }
    }

    if !mode.contains(StmtsMode::PARENT_DEFER_SCOPE) {
      scopes.fulfill(stmt_list);
    }

    // Top-level calls must not silently discard no-discard results.
    for stmt in stmt_list.iter_mut() {
      match &mut stmt.kind {
        ExprKind::Call(call) => call.no_discard = true,
        ExprKind::MethodCall(call) => call.no_discard = true,
        _ => {}
      }
    }

    Ok(())
  }

  // A call statement: `name(args)`, `super(args)`, or tentative
  // `name?(args)`, with post-expression modifiers allowed.
  fn parse_stmt_call(&mut self, stmt_list: &mut ExprList, _tentative: bool) -> Result {
    let call = if self.tokens.peek_word(self.i) == Some("super") {
      self.parse_primary_expr()?
    } else {
      self.parse_expr_call(true)?
    };
    let call = self.parse_expr_post(call)?;

    if !matches!(
      call.kind,
      ExprKind::Call(_) | ExprKind::MethodCall(_) | ExprKind::SuperCall(_)
    ) {
      return Err(Panic::new(call.source, "Expression is not a statement"));
    }

    stmt_list.push(call);
    Ok(())
  }

  // A statement that begins with a mutable expression: assignment, or a
  // bare method call / step expression.
  fn parse_mutable_expr_operation(&mut self, stmt_list: &mut ExprList) -> Result {
    let source = self.peek_source();
    let mutable_expr = self.parse_expr_keep_mutable()?;
    self.parse_mid_mutable_expr_operation(stmt_list, mutable_expr, source)
  }

  fn parse_mid_mutable_expr_operation(
    &mut self,
    stmt_list: &mut ExprList,
    mutable_expr: Expr,
    source: Source,
  ) -> Result {
    // Some expressions stand on their own as statements.
    match &mutable_expr.kind {
      ExprKind::MethodCall(_)
      | ExprKind::PostIncrement(_)
      | ExprKind::PostDecrement(_)
      | ExprKind::PreIncrement(_)
      | ExprKind::PreDecrement(_)
      | ExprKind::Toggle(_) => {
        stmt_list.push(mutable_expr);
        return Ok(());
      }
      _ => {}
    }

    let kind = match self.peek() {
      TokenKind::Assign => AssignKind::Plain,
      TokenKind::AddAssign => AssignKind::Add,
      TokenKind::SubtractAssign => AssignKind::Subtract,
      TokenKind::MultiplyAssign => AssignKind::Multiply,
      TokenKind::DivideAssign => AssignKind::Divide,
      TokenKind::ModulusAssign => AssignKind::Modulus,
      TokenKind::AndAssign => AssignKind::BitAnd,
      TokenKind::OrAssign => AssignKind::BitOr,
      TokenKind::XorAssign => AssignKind::BitXor,
      TokenKind::LshiftAssign => AssignKind::BitLshift,
      TokenKind::RshiftAssign => AssignKind::BitRshift,
      TokenKind::LgcLshiftAssign => AssignKind::BitLgcLshift,
      TokenKind::LgcRshiftAssign => AssignKind::BitLgcRshift,
      _ => return Err(Panic::new(
        self.peek_source(),
        "Expected assignment operator after expression",
      )),
    };
    self.advance();

    let is_pod = self.eat(&TokenKind::Pod);

    if !mutable_expr.is_mutable() {
      return Err(Panic::new(
        self.peek_source(),
        "Can't modify expression because it is immutable",
      ));
    }

    let value = self.parse_expr()?;
    stmt_list.push(Expr::new(
      ExprKind::Assign(Box::new(AssignStmt {
        kind,
        destination: Box::new(mutable_expr),
        value: Box::new(value),
        is_pod,
      })),
      source,
    ));
    Ok(())
  }

  // `a, b, c Type [= value]`, with optional `const`/`static` and POD
  // marks, or a constructor-call declaration `name Type(args)`.
  fn parse_stmt_declare(&mut self, stmt_list: &mut ExprList) -> Result {
    let mut traits = DeclareTraits::empty();

    if self.eat(&TokenKind::Const) {
      traits |= DeclareTraits::CONST;
    } else if self.eat(&TokenKind::Static) {
      traits |= DeclareTraits::STATIC;
    }

    let mut names = Vec::new();
    let mut sources = Vec::new();

    loop {
      sources.push(self.peek_source());
      names.push(self.take_word("Expected variable name")?);
      if !self.eat(&TokenKind::Next) {
        break;
      }
    }

    if self.eat(&TokenKind::Pod) {
      traits |= DeclareTraits::POD;
    }

    let ty = self.parse_type()?;
    self.parse_stmt_mid_declare(stmt_list, ty, names, sources, traits)
  }

  // The back half of a declaration, after the names and type are known.
  fn parse_stmt_mid_declare(
    &mut self,
    stmt_list: &mut ExprList,
    master_type: Type,
    names: Vec<String>,
    sources: Vec<Source>,
    mut traits: DeclareTraits,
  ) -> Result {
    let mut is_undef = false;
    let mut initial: Option<Expr> = None;
    let mut inputs: Option<ExprList> = None;

    if self.eat(&TokenKind::Assign) {
      if self.eat(&TokenKind::Undef) {
        is_undef = true;
      } else {
        if self.eat(&TokenKind::Pod) {
          traits |= DeclareTraits::ASSIGN_POD;
        }
        initial = Some(self.parse_expr()?);
      }
    } else if self.eat(&TokenKind::Open) {
      self.ignore_newlines_in_expr_depth += 1;
      let args = self.parse_expr_arguments();
      self.ignore_newlines_in_expr_depth -= 1;
      inputs = Some(args?);
    }

    let count = names.len();
    for (index, (name, source)) in names.into_iter().zip(sources).enumerate() {
      let is_last = index + 1 == count;

      let ty = master_type.clone();
      let value = if is_last {
        initial.take().map(Box::new)
      } else {
        initial.clone().map(Box::new)
      };

      stmt_list.push(Expr::new(
        ExprKind::Declare(Box::new(DeclareStmt {
          name,
          ty,
          value,
          inputs: inputs.clone(),
          traits,
          is_undef,
          is_inline: false,
        })),
        source,
      ));
    }

    Ok(())
  }

  // Disambiguate `variable[value] = ...` from `variable [4] Type`.
  fn parse_ambiguous_open_bracket(&mut self, stmt_list: &mut ExprList) -> Result {
    let source = self.peek_source();
    let word = self.take_word("Expected variable name")?;

    let mut bracketed = Vec::new();
    while self.peek() == &TokenKind::BracketOpen {
      let bracket_source = self.peek_source();
      self.advance();

      self.ignore_newlines_in_expr_depth += 1;
      let sub_expr = self.parse_expr();
      self.ignore_newlines_in_expr_depth -= 1;

      bracketed.push((sub_expr?, bracket_source));
      self.expect(&TokenKind::BracketClose, "Expected ']'")?;
    }

    let is_declaration =
      Parser::can_type_start_with(self.peek(), false) || self.peek() == &TokenKind::Next;

    if is_declaration {
      let mut ty = self.parse_type()?;

      // The bracketed expressions were fixed-array prefixes all along.
      for (length, bracket_source) in bracketed.into_iter().rev() {
        ty.elements.insert(0, TypeElem::VarFixedArray {
          length: Box::new(length),
          source: bracket_source,
        });
      }

      self.parse_stmt_mid_declare(stmt_list, ty, vec![word], vec![source], DeclareTraits::empty())
    } else {
      let mut mutable_expr = Expr::new(ExprKind::Variable(word), source);
      for (index, bracket_source) in bracketed {
        mutable_expr = Expr::new(
          ExprKind::ArrayAccess {
            value: Box::new(mutable_expr),
            index: Box::new(index),
          },
          bracket_source,
        );
      }

      let mutable_expr = self.parse_expr_post(mutable_expr)?;
      let mutable_expr = self.parse_op_expr(0, mutable_expr, true)?;
      self.parse_mid_mutable_expr_operation(stmt_list, mutable_expr, source)
    }
  }

  // `if`/`unless` with optional `else`.
  fn parse_onetime_conditional(
    &mut self,
    stmt_list: &mut ExprList,
    scopes: &mut DeferScopes,
  ) -> Result {
    let is_unless = self.peek() == &TokenKind::Unless;
    let source = self.peek_source();
    self.advance();

    let condition = Box::new(self.parse_expr()?);
    let statements =
      self.parse_dependent_block("conditional", scopes, None, ScopeTraits::empty())?;

    // In single-statement mode the cursor rests on the newline; walk ahead
    // to see whether an 'else' follows.
    let mut readahead = self.i;
    while self.tokens.kind(readahead) == &TokenKind::Newline && readahead < self.tokens.len() {
      readahead += 1;
    }

    if self.tokens.kind(readahead) == &TokenKind::Else {
      self.i = readahead + 1;

      let mode = match self.peek() {
        TokenKind::Next => {
          self.advance();
          StmtsMode::SINGLE
        }
        TokenKind::Begin => {
          self.advance();
          StmtsMode::empty()
        }
        _ => StmtsMode::SINGLE,
      };

      let mut else_statements = ExprList::new();
      scopes.push(None, ScopeTraits::empty());
      let outcome = self.parse_stmts(&mut else_statements, scopes, mode);
      scopes.pop();
      outcome?;

      if mode.contains(StmtsMode::SINGLE) {
        self.i -= 1;
      } else {
        self.advance();
      }

      stmt_list.push(Expr::new(
        if is_unless {
          ExprKind::UnlessElse(Box::new(IfElseStmt {
            label: None,
            condition,
            statements,
            else_statements,
          }))
        } else {
          ExprKind::IfElse(Box::new(IfElseStmt {
            label: None,
            condition,
            statements,
            else_statements,
          }))
        },
        source,
      ));
    } else {
      stmt_list.push(Expr::new(
        if is_unless {
          ExprKind::Unless(Box::new(ConditionalStmt { label: None, condition, statements }))
        } else {
          ExprKind::If(Box::new(ConditionalStmt { label: None, condition, statements }))
        },
        source,
      ));
    }

    Ok(())
  }

  // `while`/`until` loops, including the `while continue` / `until break`
  // forms.
  fn parse_loop(&mut self, stmt_list: &mut ExprList, scopes: &mut DeferScopes) -> Result {
    let is_until = self.peek() == &TokenKind::Until;
    let source = self.peek_source();
    self.advance();

    let mut label = None;
    let mut condition = None;

    if matches!(self.peek(), TokenKind::Break | TokenKind::Continue) {
      let keyword_is_continue = self.peek() == &TokenKind::Continue;

      if !is_until && !keyword_is_continue {
        return Err(Panic::new(
          source,
          "Did you mean to use 'while continue'? There is no such conditional as 'while break'",
        ));
      }
      if is_until && keyword_is_continue {
        return Err(Panic::new(
          source,
          "Did you mean to use 'until break'? There is no such conditional as 'until continue'",
        ));
      }

      self.advance();
      label = self.eat_word();
    } else {
      label = self.eat_label();
      condition = Some(Box::new(self.parse_expr()?));
    }

    let statements = self.parse_dependent_block(
      "conditional expression",
      scopes,
      label.clone(),
      ScopeTraits::BREAKABLE | ScopeTraits::CONTINUABLE,
    )?;

    stmt_list.push(Expr::new(
      match condition {
        Some(condition) if is_until =>
          ExprKind::Until(Box::new(ConditionalStmt { label, condition, statements })),
        Some(condition) =>
          ExprKind::While(Box::new(ConditionalStmt { label, condition, statements })),
        None if is_until =>
          ExprKind::UntilBreak(Box::new(LoopAlwaysStmt { label, statements })),
        None =>
          ExprKind::WhileContinue(Box::new(LoopAlwaysStmt { label, statements })),
      },
      source,
    ));

    Ok(())
  }

  // `each [it_name] Type in [array, length]` or `each Type in list`.
  fn parse_each_in(&mut self, stmt_list: &mut ExprList, scopes: &mut DeferScopes) -> Result {
    let source = self.peek_source();
    self.advance();

    let label = self.eat_label();

    let it_name = if matches!(self.peek(), TokenKind::Word(_))
      && self.peek_ahead(1) != &TokenKind::In
    {
      Some(self.take_word("Expected name for 'it' variable")?)
    } else {
      None
    };

    let it_type = self.parse_type()?;
    self.expect(&TokenKind::In, "Expected 'in' keyword")?;

    let is_static = self.eat(&TokenKind::Static);

    let mut low_array = None;
    let mut length = None;
    let mut list = None;

    if self.eat(&TokenKind::BracketOpen) {
      low_array = Some(Box::new(self.parse_expr()?));
      self.expect(
        &TokenKind::Next,
        "Expected ',' after low-level array data in 'each in' statement",
      )?;
      length = Some(Box::new(self.parse_expr()?));
      self.expect(
        &TokenKind::BracketClose,
        "Expected ']' after low-level array data and length in 'each in' statement",
      )?;
    } else {
      list = Some(Box::new(self.parse_expr()?));
    }

    let statements = self.parse_dependent_block(
      "'each in'",
      scopes,
      label.clone(),
      ScopeTraits::BREAKABLE | ScopeTraits::CONTINUABLE,
    )?;

    stmt_list.push(Expr::new(
      ExprKind::EachIn(Box::new(EachInStmt {
        label,
        it_name,
        it_type,
        low_array,
        length,
        list,
        statements,
        is_static,
      })),
      source,
    ));

    Ok(())
  }

  // `repeat [static] limit [using idx_name]`.
  fn parse_repeat(&mut self, stmt_list: &mut ExprList, scopes: &mut DeferScopes) -> Result {
    let source = self.peek_source();
    self.advance();

    let label = self.eat_label();
    let is_static = self.eat(&TokenKind::Static);
    let limit = Box::new(self.parse_expr()?);

    self.ignore_newlines("Expected '{' or ',' after limit expression")?;

    let idx_name = if self.eat(&TokenKind::Using) {
      let name = self.take_word("Expected name for 'idx' variable after 'using' keyword")?;
      self.ignore_newlines("Expected '{' or ',' after 'using' variable")?;
      Some(name)
    } else {
      None
    };

    let statements = self.parse_dependent_block(
      "'repeat'",
      scopes,
      label.clone(),
      ScopeTraits::BREAKABLE | ScopeTraits::CONTINUABLE,
    )?;

    stmt_list.push(Expr::new(
      ExprKind::Repeat(Box::new(RepeatStmt { label, limit, statements, is_static, idx_name })),
      source,
    ));

    Ok(())
  }

  // `switch value { case ... default ... }`, optionally exhaustive.
  fn parse_switch(
    &mut self,
    stmt_list: &mut ExprList,
    scopes: &mut DeferScopes,
    mut is_exhaustive: bool,
  ) -> Result {
    let source = self.peek_source();
    self.expect(&TokenKind::Switch, "Expected 'switch' keyword after 'exhaustive' keyword")?;

    let value = Box::new(self.parse_expr()?);
    self.ignore_newlines("Expected '{' after value given to 'switch' statement")?;
    self.expect(&TokenKind::Begin, "Expected '{' after value given to 'switch' statement")?;

    let mut cases: Vec<Case> = Vec::new();
    let mut default_statements = ExprList::new();
    // Whether statements currently accumulate into a case or the default.
    let mut in_case = false;

    scopes.push(None, ScopeTraits::FALLTHROUGHABLE);

    let outcome = loop {
      if let Err(error) = self.ignore_newlines("Expected '}' before end of file") {
        break Err(error);
      }

      match self.peek() {
        TokenKind::End => break Ok(()),

        TokenKind::Case => {
          let case_source = self.peek_source();
          self.advance();

          let condition = match self.parse_expr() {
            Ok(condition) => condition,
            Err(error) => break Err(error),
          };
          self.eat(&TokenKind::Next);

          // Flush whatever the previous arm deferred.
          {
            let list = if in_case {
              &mut cases.last_mut().expect("open case").statements
            } else {
              &mut default_statements
            };
            scopes.fulfill(list);
          }
          scopes.pop();
          scopes.push(None, ScopeTraits::FALLTHROUGHABLE);

          cases.push(Case { condition, statements: ExprList::new(), source: case_source });
          in_case = true;
        }

        TokenKind::Default => {
          {
            let list = if in_case {
              &mut cases.last_mut().expect("open case").statements
            } else {
              &mut default_statements
            };
            scopes.fulfill(list);
          }
          scopes.pop();
          scopes.push(None, ScopeTraits::empty());

          in_case = false;
          is_exhaustive = false;
          self.advance();
        }

        _ => {
          let list_outcome = if in_case {
            let mut arm = ExprList::new();
            let outcome = self.parse_stmts(
              &mut arm,
              scopes,
              StmtsMode::SINGLE | StmtsMode::PARENT_DEFER_SCOPE,
            );
            cases.last_mut().expect("open case").statements.append(&mut arm);
            outcome
          } else {
            self.parse_stmts(
              &mut default_statements,
              scopes,
              StmtsMode::SINGLE | StmtsMode::PARENT_DEFER_SCOPE,
            )
          };

          if let Err(error) = list_outcome {
            break Err(error);
          }
        }
      }
    };

    if let Err(error) = outcome {
      scopes.pop();
      return Err(error);
    }

    // Skip over '}'.
    self.advance();

    {
      let list = if in_case {
        &mut cases.last_mut().expect("open case").statements
      } else {
        &mut default_statements
      };
      scopes.fulfill(list);
    }
    scopes.pop();

    stmt_list.push(Expr::new(
      ExprKind::Switch(Box::new(SwitchStmt { value, cases, default_statements, is_exhaustive })),
      source,
    ));

    Ok(())
  }

  // C-style `for [label:] (before; condition; after) { ... }`, parentheses
  // optional.
  fn parse_for(&mut self, stmt_list: &mut ExprList, scopes: &mut DeferScopes) -> Result {
    let source = self.peek_source();
    self.advance(); // 'for'

    let label = self.eat_label();
    let had_parens = self.eat(&TokenKind::Open);

    scopes.push(label.clone(), ScopeTraits::BREAKABLE | ScopeTraits::CONTINUABLE);

    let outcome = (|parser: &mut Parser<'_>, scopes: &mut DeferScopes| {
      let mut before = ExprList::new();
      if parser.peek() != &TokenKind::Terminate {
        parser.parse_stmts(
          &mut before,
          scopes,
          StmtsMode::SINGLE | StmtsMode::NO_JOINING | StmtsMode::PARENT_DEFER_SCOPE,
        )?;
      }
      parser.expect(&TokenKind::Terminate, "Expected ';' after first part of 'for' statement")?;

      let condition = if parser.peek() != &TokenKind::Terminate {
        Some(Box::new(parser.parse_expr()?))
      } else {
        None
      };
      parser.expect(&TokenKind::Terminate, "Expected ';' after second part of 'for' statement")?;

      let mut after = ExprList::new();
      if !matches!(
        parser.peek(),
        TokenKind::Next | TokenKind::Begin | TokenKind::Newline | TokenKind::Close
      ) {
        parser.parse_stmts(
          &mut after,
          scopes,
          StmtsMode::SINGLE | StmtsMode::NO_JOINING | StmtsMode::PARENT_DEFER_SCOPE,
        )?;
      }

      if had_parens {
        parser.eat(&TokenKind::Close);
      }
      parser.ignore_newlines("Expected '{' or ',' after beginning parts of 'for' loop")?;

      let mode = match parser.peek() {
        TokenKind::Begin => StmtsMode::empty(),
        TokenKind::Next => StmtsMode::SINGLE,
        _ => return Err(Panic::new(
          parser.peek_source(),
          "Expected '{' or ',' after beginning parts of 'for' loop",
        )),
      };
      parser.advance();

      let mut statements = ExprList::new();
      parser.parse_stmts(&mut statements, scopes, mode)?;

      if mode.contains(StmtsMode::SINGLE) {
        parser.i -= 1;
      } else {
        parser.advance();
      }

      Ok((before, condition, after, statements))
    })(self, scopes);

    scopes.pop();
    let (before, condition, after, statements) = outcome?;

    stmt_list.push(Expr::new(
      ExprKind::For(Box::new(ForStmt { label, before, condition, after, statements })),
      source,
    ));

    Ok(())
  }

  // `asm dialect [traits] { "template", ... } "constraints" (args)`
  fn parse_inline_asm(&mut self, stmt_list: &mut ExprList) -> Result {
    let source = self.peek_source();
    self.advance();

    let dialect = self.take_word("Expected either intel or att after 'asm' keyword")?;
    let is_intel = match dialect.as_str() {
      "intel" => true,
      "att" => false,
      _ => return Err(Panic::new(
        source,
        "Expected either intel or att for inline assembly dialect",
      )),
    };

    let mut has_side_effects = false;
    let mut is_stack_align = false;

    while let Some(info) = self.tokens.peek_word(self.i).map(str::to_string) {
      match info.as_str() {
        "side_effects" => has_side_effects = true,
        "stack_align" => is_stack_align = true,
        other => return Err(Panic::new(
          self.peek_source(),
          format!("Unrecognized assembly trait '{other}', valid traits are: 'side_effects', 'stack_align'"),
        )),
      }
      self.advance();
    }

    self.expect(&TokenKind::Begin, "Expected '{' after inline assembly dialect")?;

    let mut assembly = String::new();
    while self.peek() != &TokenKind::End {
      match self.peek() {
        TokenKind::Str(_) | TokenKind::CStr(_) => {
          let line = self.eat_string().expect("string token");
          assembly.push_str(&line);
          assembly.push('\n');
          continue;
        }
        TokenKind::Next | TokenKind::Newline => self.advance(),
        _ => return Err(Panic::new(
          self.peek_source(),
          "Expected string or ',' while inside { ... } for inline assembly",
        )),
      }

      if self.i >= self.tokens.len() {
        return Err(Panic::new(source, "Expected '}' for inline assembly before end-of-file"));
      }
    }
    self.advance();

    let constraints = match self.eat_string() {
      Some(constraints) => constraints,
      None => return Err(Panic::new(
        self.peek_source(),
        "Expected constraints string after '}' for inline assembly",
      )),
    };

    self.expect(&TokenKind::Open, "Expected '(' for beginning of inline assembly arguments")?;
    self.ignore_newlines_in_expr_depth += 1;
    let args = self.parse_expr_arguments();
    self.ignore_newlines_in_expr_depth -= 1;
    let args = args?;

    stmt_list.push(Expr::new(
      ExprKind::InlineAsm(Box::new(InlineAsmExpr {
        assembly,
        constraints,
        args,
        has_side_effects,
        is_stack_align,
        is_intel,
      })),
      source,
    ));

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn stmt(kind: ExprKind) -> Expr {
    Expr::new(kind, Source::NONE)
  }

  fn call(name: &str) -> Expr {
    stmt(ExprKind::Call(Box::new(crate::types::expr::CallExpr {
      name: name.into(),
      args: Vec::new(),
      is_tentative: false,
      gives: None,
      no_discard: false,
    })))
  }

  fn call_name(expr: &Expr) -> &str {
    match &expr.kind {
      ExprKind::Call(call) => &call.name,
      _ => panic!("expected call"),
    }
  }

  #[test]
  fn fulfill_is_lifo() {
    let mut scopes = DeferScopes::new();
    scopes.defer(call("a"));
    scopes.defer(call("b"));

    let mut out = ExprList::new();
    scopes.fulfill(&mut out);

    assert_eq!(call_name(&out[0]), "b");
    assert_eq!(call_name(&out[1]), "a");

    // Flushing moved the statements out.
    let mut again = ExprList::new();
    scopes.fulfill(&mut again);
    assert!(again.is_empty());
  }

  #[test]
  fn rewind_clones_enclosing_scopes() {
    let mut scopes = DeferScopes::new();
    scopes.defer(call("root"));
    scopes.push(None, ScopeTraits::BREAKABLE | ScopeTraits::CONTINUABLE);
    scopes.defer(call("loop_cleanup"));
    scopes.push(None, ScopeTraits::empty());
    scopes.defer(call("inner"));

    let mut out = ExprList::new();
    scopes.rewind(&mut out, ScopeTraits::BREAKABLE, None);

    // Inner scope flushed by move, loop scope cloned, root untouched.
    assert_eq!(out.len(), 2);
    assert_eq!(call_name(&out[0]), "inner");
    assert_eq!(call_name(&out[1]), "loop_cleanup");

    scopes.pop();
    let mut loop_exit = ExprList::new();
    scopes.fulfill(&mut loop_exit);
    assert_eq!(loop_exit.len(), 1);
    assert_eq!(call_name(&loop_exit[0]), "loop_cleanup");
  }

  #[test]
  fn labeled_rewind_passes_mismatched_scopes() {
    let mut scopes = DeferScopes::new();
    scopes.push(Some("outer".into()), ScopeTraits::BREAKABLE | ScopeTraits::CONTINUABLE);
    scopes.defer(call("outer_cleanup"));
    scopes.push(Some("inner".into()), ScopeTraits::BREAKABLE | ScopeTraits::CONTINUABLE);
    scopes.defer(call("inner_cleanup"));

    let mut out = ExprList::new();
    scopes.rewind(&mut out, ScopeTraits::BREAKABLE, Some("outer"));

    assert_eq!(out.len(), 2);
    assert_eq!(call_name(&out[0]), "inner_cleanup");
    assert_eq!(call_name(&out[1]), "outer_cleanup");
  }

  #[test]
  fn unwind_completely_reaches_the_root() {
    let mut scopes = DeferScopes::new();
    scopes.defer(call("root"));
    scopes.push(None, ScopeTraits::BREAKABLE | ScopeTraits::CONTINUABLE);
    scopes.defer(call("loop_cleanup"));

    let out = scopes.unwind_completely();
    assert_eq!(out.len(), 2);
    assert_eq!(call_name(&out[0]), "loop_cleanup");
    assert_eq!(call_name(&out[1]), "root");

    // The enclosing scope keeps its deferred statements for its own exit.
    scopes.pop();
    let mut root_exit = ExprList::new();
    scopes.fulfill(&mut root_exit);
    assert_eq!(root_exit.len(), 1);
  }
}
