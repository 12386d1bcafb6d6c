//! Function parsing: heads, parameter lists, bodies, aliases, and the
//! special-name well-formedness checks that run once a head is complete.

use super::stmt::{DeferScopes, StmtsMode};
use super::Parser;
use crate::error::{Panic, Result};
use crate::token::TokenKind;
use crate::types::ast::{
  Flow, Func, FuncAlias, FuncTraits, Param, ParamTraits, VariadicParam, VirtualRole,
  MAX_FUNCS,
};
use crate::types::expr::{DeclareStmt, DeclareTraits, Expr, ExprKind, ExprList};
use crate::types::ty::{Type, TypeElem};
use crate::types::Source;
use crate::CompilerTraits;

#[derive(Clone, Copy, Debug, Default)]
struct FuncPrefixes {
  is_stdcall: bool,
  is_verbatim: bool,
  is_implicit: bool,
  is_external: bool,
  is_virtual: bool,
  is_override: bool,
}

struct FuncHead {
  name: String,
  source: Source,
  is_foreign: bool,
  is_constructor: bool,
  prefixes: FuncPrefixes,
  export_name: Option<String>,
}

// `[$#N] T` parameters use the polycount element form once the head is
// complete; lengths that are count references collapse here.
fn collapse_polycount_var_fixed_arrays(ty: &mut Type) {
  for elem in &mut ty.elements {
    let replacement = match elem {
      TypeElem::VarFixedArray { length, source } => match &length.kind {
        ExprKind::PolyCount { name } =>
          Some(TypeElem::PolyCount { name: name.clone(), source: *source }),
        _ => None,
      },
      _ => None,
    };

    if let Some(replacement) = replacement {
      *elem = replacement;
    }
  }
}

impl Parser<'_> {
  /// Parse a function, foreign function declaration, constructor, or
  /// function alias at the cursor.
  pub fn parse_func(&mut self) -> Result {
    let source = self.peek_source();

    if self.peek() == &TokenKind::Func && self.peek_ahead(1) == &TokenKind::Alias {
      return self.parse_func_alias();
    }

    if self.ast.funcs.len() >= MAX_FUNCS {
      return Err(Panic::new(source, "Maximum number of AST functions reached"));
    }

    let head = self.parse_func_head()?;

    if head.is_foreign && self.composite_association.is_some() {
      return Err(Panic::new(source, "Cannot declare foreign function within struct domain"));
    }

    let mut func = self.func_template(&head);

    if !self.next_builtin_traits.is_empty() {
      func.traits |= self.next_builtin_traits;
      self.next_builtin_traits = FuncTraits::empty();
    }

    self.parse_func_params(&mut func)?;
    self.ignore_newlines("Expected '{' after function head")?;

    if self.eat(&TokenKind::Exhaustive) {
      func.traits |= FuncTraits::NO_DISCARD;
    }

    if !head.is_foreign && matches!(self.peek(), TokenKind::Begin | TokenKind::Assign) {
      func.return_type = Type::void(self.peek_source());
    } else {
      func.return_type = self.parse_type()?;
      collapse_polycount_var_fixed_arrays(&mut func.return_type);
    }

    // `func f(...) T = delete` declares a disallowed function.
    if self.peek() == &TokenKind::Assign && self.peek_ahead(1) == &TokenKind::Delete {
      func.traits |= FuncTraits::DISALLOW;
      self.i += 2;
    }

    self.validate_func_requirements(&mut func, source)?;

    if func.has_polymorphic_signature() {
      if head.is_foreign {
        return Err(Panic::new(source, "Cannot declare foreign functions as polymorphic"));
      }

      func.traits |= FuncTraits::POLYMORPHIC;
    }

    self.parse_func_body(&mut func)?;

    let is_polymorphic = func.traits.contains(FuncTraits::POLYMORPHIC);
    let is_method = func.is_method();
    let name = func.name.clone();
    let func_id = self.ast.add_func(func);

    if is_polymorphic {
      self.ast.add_poly_func(name.clone(), func_id);
      if is_method {
        self.ast.add_polymorphic_method(name, func_id);
      }
    }

    if head.is_constructor {
      self.solidify_constructor(func_id, source)?;
    }

    Ok(())
  }

  fn parse_func_prefixes(&mut self) -> FuncPrefixes {
    let mut prefixes = FuncPrefixes::default();

    loop {
      match self.peek() {
        TokenKind::Stdcall => prefixes.is_stdcall = true,
        TokenKind::Verbatim => prefixes.is_verbatim = true,
        TokenKind::Implicit => prefixes.is_implicit = true,
        TokenKind::External => prefixes.is_external = true,
        TokenKind::Virtual => prefixes.is_virtual = true,
        TokenKind::Override => prefixes.is_override = true,
        _ => return prefixes,
      }
      self.advance();
    }
  }

  fn parse_func_head(&mut self) -> Result<FuncHead> {
    let source = self.peek_source();
    let prefixes = self.parse_func_prefixes();

    let keyword = self.peek().clone();
    self.advance();

    let is_foreign = keyword == TokenKind::Foreign;
    let is_constructor = keyword == TokenKind::Constructor;

    if keyword != TokenKind::Func && !is_foreign && !is_constructor {
      return Err(Panic::new(
        self.tokens.source(self.i - 1),
        "Expected 'func' or 'foreign' or 'constructor' keyword",
      ));
    }

    let custom_export_name = self.eat_string();

    let mut name = if is_constructor {
      if self.prename.is_some() {
        return Err(Panic::new(source, "Constructor cannot be named"));
      }
      "__constructor__".to_string()
    } else if self.compiler.traits.contains(CompilerTraits::COLON_COLON) && self.prename.is_some() {
      self.prename.take().expect("checked prename")
    } else {
      let message = if is_foreign {
        "Expected function name after 'foreign' keyword"
      } else {
        "Expected function name after 'func' keyword"
      };
      self.take_word(message)?
    };

    if self.composite_association.is_none() {
      if is_constructor {
        return Err(Panic::new(
          source,
          "Constructor must be defined inside the domain of a structure",
        ));
      }
      if !prefixes.is_verbatim {
        self.prepend_namespace(&mut name);
      }
    }

    let export_name = match custom_export_name {
      Some(custom) => Some(custom),
      None if prefixes.is_external => Some(name.clone()),
      None => None,
    };

    Ok(FuncHead { name, source, is_foreign, is_constructor, prefixes, export_name })
  }

  // Fill out a fresh function from its parsed head.
  fn func_template(&self, head: &FuncHead) -> Func {
    let mut traits = FuncTraits::empty();

    if head.is_foreign { traits |= FuncTraits::FOREIGN }
    if head.prefixes.is_stdcall { traits |= FuncTraits::STDCALL }
    if head.prefixes.is_implicit { traits |= FuncTraits::IMPLICIT }
    if head.prefixes.is_virtual { traits |= FuncTraits::VIRTUAL }
    if head.prefixes.is_override { traits |= FuncTraits::OVERRIDE }

    match head.name.as_str() {
      "__defer__" => traits |= FuncTraits::DEFER,
      "__pass__" => traits |= FuncTraits::PASS,
      name if name == self.compiler.entry_point && !head.is_foreign =>
        traits |= FuncTraits::MAIN,
      _ => {}
    }

    if head.is_constructor {
      traits |= FuncTraits::CLASS_CONSTRUCTOR;
    }

    Func {
      name: head.name.clone(),
      params: Vec::new(),
      variadic: None,
      return_type: Type::default(),
      traits,
      statements: ExprList::new(),
      source: head.source,
      export_as: head.export_name.clone(),
      instantiation_depth: 0,
      virtual_role: VirtualRole::None,
    }
  }

  // The implicit `this` parameter for functions declared inside a struct
  // domain.
  fn this_param(&self) -> Option<Param> {
    let association = self.composite_association.as_ref()?;

    let ty = if association.is_polymorphic {
      let generics = association.generics.iter()
        .map(|generic| Type::polymorph(generic.clone()))
        .collect();

      Type {
        elements: smallvec::smallvec![
          TypeElem::Pointer { source: Source::NONE },
          TypeElem::GenericBase(Box::new(crate::types::ty::GenericBaseElem {
            name: association.name.clone(),
            generics,
            name_is_polymorphic: false,
            source: Source::NONE,
          })),
        ],
        source: Source::NONE,
      }
    } else {
      Type::base_ptr(association.name.clone())
    };

    Some(Param {
      name: "this".to_string(),
      ty,
      source: association.source,
      flow: Flow::In,
      traits: ParamTraits::empty(),
      default: None,
    })
  }

  fn parse_func_params(&mut self, func: &mut Func) -> Result {
    self.ignore_newlines("Expected '(' after function name")?;

    if self.composite_association.is_some() {
      if func.traits.contains(FuncTraits::FOREIGN) {
        return Err(Panic::new(func.source, "Cannot declare foreign function inside of struct domain"));
      }
      func.params.push(self.this_param().expect("association checked"));
    }

    // A function may have no argument list at all.
    if !self.eat(&TokenKind::Open) {
      return Ok(());
    }

    self.allow_polymorphic_prereqs = true;
    let outcome = self.parse_func_params_inner(func);
    self.allow_polymorphic_prereqs = false;
    outcome?;

    for param in &mut func.params {
      collapse_polycount_var_fixed_arrays(&mut param.ty);
    }

    self.advance(); // ')'
    Ok(())
  }

  fn parse_func_params_inner(&mut self, func: &mut Func) -> Result {
    // Names still waiting for the shared type at the end of a name list.
    let mut backfill: Vec<(String, Source, Flow)> = Vec::new();
    let is_foreign = func.traits.contains(FuncTraits::FOREIGN);

    while self.peek() != &TokenKind::Close {
      self.ignore_newlines("Expected function argument")?;

      let flow = if self.eat(&TokenKind::In) {
        Flow::In
      } else if self.eat(&TokenKind::Out) {
        Flow::Out
      } else if self.eat(&TokenKind::InOut) {
        Flow::InOut
      } else {
        Flow::In
      };

      let param_source = self.peek_source();

      if self.eat(&TokenKind::Ellipsis) {
        // Bare ellipsis: C-style varargs.
        if !backfill.is_empty() {
          return Err(Panic::new(param_source, "Expected type for previous arguments before ellipsis"));
        }
        func.traits |= FuncTraits::VARARG;

        self.ignore_newlines("Expected ')' after variadic argument")?;
        if self.peek() != &TokenKind::Close {
          return Err(Panic::new(self.peek_source(), "Expected ')' after variadic argument"));
        }
        continue;
      }

      // Argument name; optional for foreign declarations, where a lone
      // word may be the whole type.
      let name = if is_foreign {
        let mut lookahead = self.i;
        let mut is_argument_name = false;

        if matches!(self.tokens.kind(lookahead), TokenKind::Word(_)) {
          lookahead += 1;
          while self.tokens.kind(lookahead) == &TokenKind::Newline {
            lookahead += 1;
          }
          is_argument_name = !matches!(
            self.tokens.kind(lookahead),
            TokenKind::Next | TokenKind::Close
          );
        }

        if is_argument_name {
          self.take_word("Expected argument name")?
        } else {
          String::new()
        }
      } else {
        self.take_word("Expected argument name before argument type")?
      };

      if self.peek() == &TokenKind::Ellipsis {
        // Named `..` variadic tail.
        if is_foreign {
          return Err(Panic::new(
            self.peek_source(),
            "Foreign functions cannot have named variadic arguments",
          ));
        }
        if !backfill.is_empty() {
          return Err(Panic::new(
            self.peek_source(),
            "Expected type for previous arguments before ellipsis",
          ));
        }

        self.advance();
        func.traits |= FuncTraits::VARIADIC;
        func.variadic = Some(VariadicParam { name, source: param_source });

        self.ignore_newlines("Expected ')' after variadic argument")?;
        if self.peek() != &TokenKind::Close {
          return Err(Panic::new(self.peek_source(), "Expected ')' after variadic argument"));
        }
        continue;
      }

      self.ignore_newlines("Expected type")?;

      if !is_foreign && self.peek() == &TokenKind::Next {
        // `a, b, c Type` — remember the name, wait for the type.
        self.advance();
        if self.peek() == &TokenKind::Close {
          return Err(Panic::new(self.peek_source(), "Expected type after ',' in argument list"));
        }
        backfill.push((name, param_source, flow));
        continue;
      }

      let mut traits = ParamTraits::empty();
      if self.eat(&TokenKind::Pod) {
        traits |= ParamTraits::POD;
      }

      self.ignore_newlines("Expected type")?;
      let ty = self.parse_type()?;

      let default = if self.eat(&TokenKind::Assign) {
        Some(self.parse_expr()?)
      } else {
        None
      };

      // Flush any waiting names with clones of this type.
      for (waiting_name, waiting_source, waiting_flow) in backfill.drain(..) {
        func.params.push(Param {
          name: waiting_name,
          ty: ty.clone(),
          source: waiting_source,
          flow: waiting_flow,
          traits,
          default: default.clone(),
        });
      }

      func.params.push(Param { name, ty, source: param_source, flow, traits, default });

      self.ignore_newlines("Expected ',' after argument")?;

      if self.eat(&TokenKind::Next) {
        self.ignore_newlines("Expected type after ',' in argument list")?;
        if self.peek() == &TokenKind::Close {
          return Err(Panic::new(self.peek_source(), "Expected type after ',' in argument list"));
        }
      } else if self.peek() != &TokenKind::Close {
        return Err(Panic::new(self.peek_source(), "Expected ',' after argument type"));
      }
    }

    if !backfill.is_empty() {
      return Err(Panic::new(self.peek_source(), "Expected argument type before end of argument list"));
    }

    Ok(())
  }

  fn parse_func_body(&mut self, func: &mut Func) -> Result {
    if func.traits.contains(FuncTraits::FOREIGN) {
      return Ok(());
    }

    self.ignore_newlines("Expected function body")?;

    if self.eat(&TokenKind::Assign) {
      // Single-line `func f(...) T = expr` body.
      if func.return_type.is_void() {
        return Err(Panic::new(self.peek_source(), "Cannot return 'void' from single line function"));
      }

      self.ignore_newlines("Expected function body")?;
      let value = self.parse_expr()?;
      let source = value.source;

      func.statements.push(Expr::new(
        ExprKind::Return { value: Some(Box::new(value)), last_minute: ExprList::new() },
        source,
      ));
      return Ok(());
    }

    if func.traits.contains(FuncTraits::DISALLOW) && self.peek() != &TokenKind::Begin {
      // Disallowed functions have no body.
      return Ok(());
    }

    self.expect(&TokenKind::Begin, "Expected '{' after function prototype")?;

    let mut statements = ExprList::new();
    let mut scopes = DeferScopes::new();
    self.parse_stmts(&mut statements, &mut scopes, StmtsMode::empty())?;
    self.expect(&TokenKind::End, "Expected '}' to close function body")?;

    func.statements = statements;
    Ok(())
  }

  // Synthesize the subject-less constructor for a subject-ful class
  // constructor, so `Person(name, age)` works as a value expression.
  fn solidify_constructor(&mut self, constructor_id: crate::types::FuncId, source: Source) -> Result {
    if self.ast.funcs.len() >= MAX_FUNCS {
      return Err(Panic::new(source, "Maximum number of AST functions reached"));
    }

    let constructor = self.ast.func(constructor_id);

    let this_pointee: Type = Type {
      elements: constructor.params[0].ty.unwrapped_view().iter().cloned().collect(),
      source: constructor.params[0].ty.source,
    };
    let struct_name = this_pointee.struct_name()
      .expect("constructor subject is base-like")
      .to_string();

    let params: Vec<Param> = constructor.params[1..].to_vec();

    let inputs: ExprList = params.iter()
      .map(|param| Expr::new(ExprKind::Variable(param.name.clone()), Source::NONE))
      .collect();

    let mut statements = ExprList::new();
    statements.push(Expr::new(
      ExprKind::Declare(Box::new(DeclareStmt {
        name: "$".to_string(),
        ty: this_pointee.clone(),
        value: None,
        inputs: Some(inputs),
        traits: DeclareTraits::POD,
        is_undef: false,
        is_inline: false,
      })),
      source,
    ));
    statements.push(Expr::new(
      ExprKind::Return {
        value: Some(Box::new(Expr::new(ExprKind::Variable("$".to_string()), Source::NONE))),
        last_minute: ExprList::new(),
      },
      Source::NONE,
    ));

    let func = Func {
      name: struct_name,
      params,
      variadic: None,
      return_type: this_pointee,
      traits: FuncTraits::GENERATED,
      statements,
      source,
      export_as: None,
      instantiation_depth: 0,
      virtual_role: VirtualRole::None,
    };

    let has_polymorphic_signature = func.has_polymorphic_signature();
    let name = func.name.clone();
    let mut func = func;
    if has_polymorphic_signature {
      func.traits |= FuncTraits::POLYMORPHIC;
    }

    let func_id = self.ast.add_func(func);
    if has_polymorphic_signature {
      self.ast.add_poly_func(name, func_id);
    }

    // The composite now has a usable constructor.
    if let Some(association) = &self.composite_association {
      let association_name = association.name.clone();
      if let Some(composite) = self.ast.composites.iter_mut()
        .find(|composite| composite.name == association_name)
      {
        composite.has_constructor = true;
      } else if let Some(poly) = self.ast.poly_composites.iter_mut()
        .find(|poly| poly.composite.name == association_name)
      {
        poly.composite.has_constructor = true;
      }
    }

    Ok(())
  }

  // `func alias myAlias(...) => otherFunction`
  fn parse_func_alias(&mut self) -> Result {
    let source = self.peek_source();
    self.advance(); // 'func'
    self.expect(&TokenKind::Alias, "Expected 'alias' keyword for function alias")?;

    let mut from = if self.compiler.traits.contains(CompilerTraits::COLON_COLON)
      && self.prename.is_some()
    {
      self.prename.take().expect("checked prename")
    } else {
      self.take_word("Expected function alias name")?
    };

    self.prepend_namespace(&mut from);

    let mut required_traits = FuncTraits::empty();
    let mut arg_types = None;
    let match_first_of_name = self.peek() != &TokenKind::Open;

    if !match_first_of_name {
      self.advance();
      let mut types = Vec::new();

      while self.peek() != &TokenKind::Close {
        self.ignore_newlines("Expected argument type for function alias")?;

        if self.eat(&TokenKind::Ellipsis) {
          required_traits |= FuncTraits::VARARG;
        } else if self.eat(&TokenKind::Range) {
          required_traits |= FuncTraits::VARIADIC;
        } else {
          types.push(self.parse_type()?);
        }

        self.ignore_newlines("Expected argument type for function alias")?;

        if self.eat(&TokenKind::Next) {
          if required_traits.intersects(FuncTraits::VARARG | FuncTraits::VARIADIC) {
            return Err(Panic::new(self.peek_source(), "Expected ')' after variadic argument"));
          }
          if self.peek() == &TokenKind::Close {
            return Err(Panic::new(self.peek_source(), "Expected type after ',' in argument types"));
          }
        } else if self.peek() != &TokenKind::Close {
          let message = if required_traits.intersects(FuncTraits::VARARG | FuncTraits::VARIADIC) {
            "Expected ')' after variadic argument"
          } else {
            "Expected ',' after argument type"
          };
          return Err(Panic::new(self.peek_source(), message));
        }
      }

      self.expect(&TokenKind::Close, "Expected ')' after function alias argument types")?;
      arg_types = Some(types);
    }

    self.expect(&TokenKind::StrongArrow, "Expected '=>' after argument types for function alias")?;
    let to = self.take_word("Expected function alias destination name")?;

    self.ast.func_aliases.push(FuncAlias {
      from,
      to,
      arg_types,
      required_traits,
      match_first_of_name,
      source,
    });

    Ok(())
  }

  // Special-name validation, run after the head is fully parsed.
  fn validate_func_requirements(&mut self, func: &mut Func, source: Source) -> Result {
    fn is_valid_method(func: &Func) -> bool {
      func.arity() > 0
        && func.params[0].name == "this"
        && (func.params[0].ty.is_base_ptr()
          || func.params[0].ty.is_polymorph_ptr()
          || func.params[0].ty.is_generic_base_ptr())
        && func.params[0].traits.is_empty()
    }

    fn is_math_func(name: &str) -> bool {
      matches!(
        name,
        "__add__" | "__divide__" | "__equals__" | "__greater_than__"
        | "__greater_than_or_equal__" | "__less_than__" | "__less_than_or_equal__"
        | "__modulus__" | "__multiply__" | "__not_equals__" | "__subtract__"
      )
    }

    if func.traits.contains(FuncTraits::DEFER) {
      if func.arity() == 1
        && is_valid_method(func)
        && func.return_type.is_void()
        && !func.traits.contains(FuncTraits::FOREIGN)
      {
        return Ok(());
      }
      return Err(Panic::new(
        source,
        "Management method __defer__ must be declared as 'func __defer__(this *T) void'",
      ));
    }

    if func.traits.contains(FuncTraits::PASS) {
      if func.arity() == 1
        && func.return_type.identical(&func.params[0].ty)
        && func.params[0].traits == ParamTraits::POD
        && (func.return_type.is_base()
          || func.return_type.is_polymorph()
          || func.return_type.is_generic_base()
          || func.return_type.is_fixed_array())
        && !func.traits.contains(FuncTraits::FOREIGN)
      {
        return Ok(());
      }
      return Err(Panic::new(
        source,
        "Management function __pass__ must be declared as 'func __pass__(value POD T) T'",
      ));
    }

    match func.name.as_str() {
      "__assign__" => {
        if func.arity() == 2
          && func.return_type.is_void()
          && is_valid_method(func)
          && func.params[0].ty.is_pointer_to(&func.params[1].ty)
          && !func.traits.contains(FuncTraits::FOREIGN)
        {
          return Ok(());
        }
        Err(Panic::new(
          source,
          "Management method __assign__ must be declared like 'func __assign__(this *T, other T) void'",
        ))
      }

      "__access__" => {
        if func.arity() == 2
          && is_valid_method(func)
          && func.return_type.is_pointer()
          && !func.traits.contains(FuncTraits::FOREIGN)
        {
          return Ok(());
        }
        Err(Panic::new(
          source,
          "Management method __access__ must be declared like '__access__(this *T, index $Key) *$Value'",
        ))
      }

      "__array__" => {
        if func.arity() == 1
          && is_valid_method(func)
          && func.return_type.is_pointer()
          && !func.traits.contains(FuncTraits::FOREIGN)
        {
          return Ok(());
        }
        Err(Panic::new(
          source,
          "Management method __array__ must be declared like '__array__(this *T) *$ArrayElementType'",
        ))
      }

      "__length__" => {
        if func.arity() == 1
          && is_valid_method(func)
          && func.return_type.is_base_of("usize")
          && !func.traits.contains(FuncTraits::FOREIGN)
        {
          return Ok(());
        }
        Err(Panic::new(
          source,
          "Management method __length__ must be declared like '__length__(this *T) usize'",
        ))
      }

      "__variadic_array__" => {
        if self.ast.common.variadic_array.is_some() {
          return Err(Panic::new(
            source,
            "Special function __variadic_array__ can only be defined once",
          ));
        }

        if func.return_type.is_void() {
          return Err(Panic::new(source, "Special function __variadic_array__ must return a value"));
        }

        if func.arity() == 4
          && func.params[0].ty.is_base_of("ptr")
          && func.params[1].ty.is_base_of("usize")
          && func.params[2].ty.is_base_of("usize")
          && func.params[3].ty.is_base_of("ptr")
          && func.params.iter().all(|param| param.traits.is_empty())
        {
          self.ast.common.variadic_array = Some((func.return_type.clone(), func.source));
          return Ok(());
        }

        Err(Panic::new(
          source,
          "Special function __variadic_array__ must be declared like:\n'__variadic_array__(pointer ptr, bytes usize, length usize, maybe_types ptr) ReturnType'",
        ))
      }

      "__initializer_list__" => {
        if func.return_type.is_void() {
          return Err(Panic::new(source, "Special function __initializer_list__ must return a value"));
        }

        if func.arity() == 2
          && func.params[0].ty.is_polymorph_ptr()
          && func.params[1].ty.is_base_of("usize")
          && func.params.iter().all(|param| param.traits.is_empty())
        {
          if self.ast.common.initializer_list.is_none() {
            self.ast.common.initializer_list = Some((func.return_type.clone(), func.source));
          }
          return Ok(());
        }

        Err(Panic::new(
          source,
          "Special function __initializer_list__ must be declared like:\n'__initializer_list__(array *$T, length usize) <$T> ReturnType'",
        ))
      }

      name if is_math_func(name) => {
        if func.arity() != 2 {
          return Err(Panic::new(
            source,
            format!("Math function {name} must take two arguments"),
          ));
        }
        if func.params[0].ty.is_pointer() {
          return Err(Panic::new(
            source,
            format!("Math function {name} cannot have a pointer as its first argument"),
          ));
        }
        Ok(())
      }

      _ => Ok(()),
    }
  }
}
