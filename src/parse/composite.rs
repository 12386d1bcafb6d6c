//! Composite parsing: structs, unions, records, classes, anonymous
//! nested composites, struct integration, and record constructor
//! synthesis.

use super::{CompositeAssociation, Parser};
use crate::error::{Panic, Result};
use crate::resolve::PolyCatalog;
use crate::token::TokenKind;
use crate::types::ast::{Flow, Func, FuncTraits, Param, ParamTraits, VirtualRole};
use crate::types::expr::{
  AssignKind, AssignStmt, DeclareStmt, DeclareTraits, Expr, ExprKind, ExprList,
};
use crate::types::layout::{
  BoneTraits, Endpoint, FieldMap, Layout, LayoutKind, LayoutTraits, Skeleton,
};
use crate::types::ty::{GenericBaseElem, Type, TypeElem};
use crate::types::Source;
use crate::CompilerTraits;

// Type names that cannot be redefined by user composites.
const RESERVED_TYPE_NAMES: &[&str] = &[
  "Any", "AnyEnumType", "AnyFixedArrayType", "AnyFuncPtrType", "AnyPtrType",
  "AnyStructType", "AnyType", "AnyTypeKind", "bool", "byte", "double", "float",
  "int", "long", "ptr", "short", "successful", "ubyte", "uint", "ulong",
  "ushort", "usize", "void",
];

fn is_builtin_typename(name: &str) -> bool {
  matches!(
    name,
    "bool" | "byte" | "double" | "float" | "int" | "long" | "ptr" | "short"
    | "successful" | "ubyte" | "uint" | "ulong" | "ushort" | "usize" | "void"
  )
}

fn is_function_like_beginning(kind: &TokenKind) -> bool {
  matches!(
    kind,
    TokenKind::Constructor | TokenKind::Func | TokenKind::Implicit | TokenKind::In
    | TokenKind::Verbatim | TokenKind::Virtual | TokenKind::Override
  )
}

struct CompositeHead {
  name: String,
  is_packed: bool,
  is_record: bool,
  is_class: bool,
  parent: Option<Type>,
  generics: Option<Vec<String>>,
}

impl Parser<'_> {
  /// Parse a struct/packed/record/class or union declaration at the
  /// cursor.
  pub fn parse_composite(&mut self, is_union: bool) -> Result {
    let source = self.peek_source();

    if self.composite_association.is_some() {
      return Err(Panic::new(
        source,
        format!(
          "Cannot declare {} within another struct's domain",
          if is_union { "union" } else { "struct" },
        ),
      ));
    }

    let head = self.parse_composite_head(is_union)?;

    if RESERVED_TYPE_NAMES.binary_search(&head.name.as_str()).is_ok() {
      return Err(Panic::new(
        source,
        format!(
          "Reserved type name '{}' can't be used to create a {}",
          head.name,
          if is_union { "union" } else { "struct" },
        ),
      ));
    }

    let (field_map, skeleton) = self.parse_composite_body_root(&head)?;

    let layout = Layout {
      kind: if is_union { LayoutKind::Union } else { LayoutKind::Struct },
      field_map,
      skeleton,
      traits: if head.is_packed { LayoutTraits::PACKED } else { LayoutTraits::empty() },
    };

    if head.is_record {
      self.create_record_constructor(&head, &layout, source)?;
    }

    let association = CompositeAssociation {
      name: head.name.clone(),
      source,
      is_polymorphic: head.generics.is_some(),
      generics: head.generics.clone().unwrap_or_default(),
    };

    match head.generics {
      Some(generics) => {
        self.ast.add_poly_composite(
          head.name,
          layout,
          source,
          head.parent,
          head.is_class,
          generics,
        );
      }
      None => {
        self.ast.add_composite(head.name, layout, source, head.parent, head.is_class);
      }
    }

    self.parse_composite_domain(association, head.is_class)
  }

  fn parse_composite_head(&mut self, is_union: bool) -> Result<CompositeHead> {
    let mut is_packed = false;
    let mut is_record = false;
    let mut is_class = false;

    if is_union {
      self.expect(&TokenKind::Union, "Expected 'union' keyword for union definition")?;
    } else {
      if self.eat(&TokenKind::Packed) {
        is_packed = true;
      }

      if self.eat(&TokenKind::Record) {
        is_record = true;
      } else if self.eat(&TokenKind::Class) {
        is_class = true;
      } else {
        self.expect(&TokenKind::Struct, "Expected 'struct' keyword after 'packed' keyword")?;
      }
    }

    // `<$A, $B>` generic parameter list.
    let generics = if self.eat(&TokenKind::LessThan) {
      let mut generics = Vec::new();

      while self.peek() != &TokenKind::GreaterThan {
        self.ignore_newlines("Expected polymorphic generic type")?;

        if !matches!(self.peek(), TokenKind::Polymorph(_)) {
          return Err(Panic::new(self.peek_source(), "Expected polymorphic generic type"));
        }
        generics.push(self.tokens.take_poly_name(self.i).expect("polymorph token"));
        self.advance();

        self.ignore_newlines("Expected '>' or ',' after polymorphic generic type")?;

        if self.eat(&TokenKind::Next) {
          if self.peek() == &TokenKind::GreaterThan {
            return Err(Panic::new(
              self.peek_source(),
              "Expected polymorphic generic type after ',' in generics list",
            ));
          }
        } else if self.peek() != &TokenKind::GreaterThan {
          return Err(Panic::new(
            self.peek_source(),
            "Expected ',' after polymorphic generic type",
          ));
        }
      }

      self.advance();
      Some(generics)
    } else {
      None
    };

    let mut name = if self.compiler.traits.contains(CompilerTraits::COLON_COLON)
      && self.prename.is_some()
    {
      self.prename.take().expect("checked prename")
    } else {
      self.take_word("Expected structure name after 'struct' keyword")?
    };

    let parent = if self.eat(&TokenKind::Extends) {
      Some(self.parse_type()?)
    } else {
      None
    };

    self.prepend_namespace(&mut name);

    Ok(CompositeHead { name, is_packed, is_record, is_class, parent, generics })
  }

  // Root-level composite fields. The closer is ')' or '}' depending on
  // which opener was used; methods may begin directly before the closer.
  fn parse_composite_body_root(
    &mut self,
    head: &CompositeHead,
  ) -> Result<(FieldMap, Skeleton)> {
    self.ignore_newlines("Expected '(' or '{' after composite name")?;

    let closer = match self.peek() {
      TokenKind::Open => TokenKind::Close,
      TokenKind::Begin => TokenKind::End,
      _ => return Err(Panic::new(self.peek_source(), "Expected '(' or '{' after composite name")),
    };
    self.advance();
    self.struct_closer = closer.clone();

    let mut field_map = FieldMap::new();
    let mut skeleton = Skeleton::new();
    let mut next_endpoint = Endpoint::from_indices(&[0]).expect("one index");
    let mut backfill = 0usize;

    if head.is_class {
      if let Some(parent) = &head.parent {
        self.integrate_another_composite(
          &mut field_map,
          &mut skeleton,
          &mut next_endpoint,
          parent,
          true,
        )?;
      } else {
        field_map.add("__vtable__", next_endpoint.clone());
        next_endpoint.increment();
        skeleton.add_field(Type::base("ptr"));
      }
    }

    self.ignore_newlines("Expected name of field")?;

    while (self.peek() != &closer && !is_function_like_beginning(self.peek()))
      || backfill != 0
    {
      // Be lenient with unnecessary preceding commas.
      self.eat(&TokenKind::Next);

      self.ignore_newlines("Expected name of field")?;
      self.parse_composite_field(&mut field_map, &mut skeleton, &mut backfill, &mut next_endpoint)?;

      let auto_comma = self.peek() == &TokenKind::Newline;
      let close_message = if closer == TokenKind::Close {
        "Expected ')' or ',' after field"
      } else {
        "Expected '}' or ',' after field"
      };
      self.ignore_newlines(close_message)?;

      if self.eat(&TokenKind::Next) {
        self.ignore_newlines(close_message)?;

        // Allow an unnecessary trailing comma.
        if self.peek() == &closer || is_function_like_beginning(self.peek()) {
          break;
        }
      } else if self.peek() != &closer
        && !is_function_like_beginning(self.peek())
        && !auto_comma
      {
        return Err(Panic::new(self.peek_source(), "Expected ',' after field name and type"));
      }
    }

    Ok((field_map, skeleton))
  }

  /// A plain parenthesized field region, used for anonymous composite
  /// types. The caller consumes the closer.
  pub fn parse_layout_body(&mut self, closer: &TokenKind) -> Result<(FieldMap, Skeleton)> {
    let mut field_map = FieldMap::new();
    let mut skeleton = Skeleton::new();
    let mut next_endpoint = Endpoint::from_indices(&[0]).expect("one index");
    let mut backfill = 0usize;

    while self.peek() != closer || backfill != 0 {
      self.ignore_newlines("Expected name of field")?;
      self.parse_composite_field(&mut field_map, &mut skeleton, &mut backfill, &mut next_endpoint)?;
      self.ignore_newlines("Expected ')' or ',' after field")?;

      if self.eat(&TokenKind::Next) {
        if self.peek() == closer {
          return Err(Panic::new(
            self.peek_source(),
            "Expected field name and type after ',' in field list",
          ));
        }
      } else if self.peek() != closer {
        return Err(Panic::new(self.peek_source(), "Expected ',' after field name and type"));
      }
    }

    Ok((field_map, skeleton))
  }

  // One field: a struct integration, an anonymous composite, or a regular
  // (possibly backfilled) named field.
  fn parse_composite_field(
    &mut self,
    field_map: &mut FieldMap,
    skeleton: &mut Skeleton,
    backfill: &mut usize,
    next_endpoint: &mut Endpoint,
  ) -> Result {
    let leading = self.peek().clone();

    if leading == TokenKind::Struct
      && !matches!(self.peek_ahead(1), TokenKind::Open | TokenKind::BracketOpen)
    {
      // Struct integration: `struct OtherStruct` flattens another simple
      // composite's fields into this one.
      if *backfill != 0 {
        return Err(Panic::new(
          self.peek_source(),
          "Expected field type for previous fields before integrated struct",
        ));
      }

      self.advance();
      let inner_type = self.parse_type()?;
      return self.integrate_another_composite(field_map, skeleton, next_endpoint, &inner_type, false);
    }

    if matches!(leading, TokenKind::Packed | TokenKind::Struct | TokenKind::Union) {
      // Anonymous nested composite.
      if *backfill != 0 {
        return Err(Panic::new(
          self.peek_source(),
          format!(
            "Expected field type for previous fields before anonymous {}",
            if leading == TokenKind::Union { "union" } else { "struct" },
          ),
        ));
      }

      return self.parse_anonymous_composite(field_map, skeleton, next_endpoint);
    }

    // A regular field.
    let field_name = self.take_word("Expected name of field")?;
    field_map.add(field_name, next_endpoint.clone());
    next_endpoint.increment();

    if matches!(self.peek(), TokenKind::Next | TokenKind::Newline) {
      // Part of a name list sharing one trailing type.
      *backfill += 1;
      return Ok(());
    }

    let field_type = self.parse_type()?;

    while *backfill != 0 {
      skeleton.add_field(field_type.clone());
      *backfill -= 1;
    }

    skeleton.add_field(field_type);
    Ok(())
  }

  // `struct (a int, b int)` / `union (...)` nested inside a composite
  // body, adding one level to the endpoint of every contained field.
  fn parse_anonymous_composite(
    &mut self,
    field_map: &mut FieldMap,
    skeleton: &mut Skeleton,
    next_endpoint: &mut Endpoint,
  ) -> Result {
    let source = self.peek_source();

    let is_packed = self.eat(&TokenKind::Packed);
    let is_union = self.peek() == &TokenKind::Union;
    self.advance();

    let bone_traits = if is_packed { BoneTraits::PACKED } else { BoneTraits::empty() };

    let mut child_next_endpoint = next_endpoint.clone();
    if !child_next_endpoint.add_index(0) {
      return Err(self.depth_limit_error(source, "anonymous composites"));
    }

    self.ignore_newlines("Expected '(' for anonymous composite")?;
    self.expect(&TokenKind::Open, "Expected '(' for anonymous composite")?;

    // Parse the child fields into a separate skeleton, keeping names in
    // the shared field map.
    let mut child_skeleton = Skeleton::new();
    let mut backfill = 0usize;

    while self.peek() != &TokenKind::Close || backfill != 0 {
      self.ignore_newlines("Expected name of field")?;
      self.parse_composite_field(
        field_map,
        &mut child_skeleton,
        &mut backfill,
        &mut child_next_endpoint,
      )?;
      self.ignore_newlines("Expected ')' or ',' after field")?;

      if self.eat(&TokenKind::Next) {
        if self.peek() == &TokenKind::Close {
          return Err(Panic::new(
            self.peek_source(),
            "Expected field name and type after ',' in field list",
          ));
        }
      } else if self.peek() != &TokenKind::Close {
        return Err(Panic::new(self.peek_source(), "Expected ',' after field name and type"));
      }
    }

    let child = if is_union {
      skeleton.add_union(bone_traits)
    } else {
      skeleton.add_struct(bone_traits)
    };
    *child = child_skeleton;

    next_endpoint.increment();
    self.advance();
    Ok(())
  }

  // Flatten another simple composite's fields into the one being built.
  // Classes use this to inherit their parent's fields.
  fn integrate_another_composite(
    &mut self,
    field_map: &mut FieldMap,
    skeleton: &mut Skeleton,
    next_endpoint: &mut Endpoint,
    other_type: &Type,
    require_class: bool,
  ) -> Result {
    let Some(composite) = self.ast.find_composite(other_type) else {
      let message = if require_class {
        format!("Cannot extend non-existent class '{other_type}'")
      } else {
        format!("Struct '{other_type}' must already be declared")
      };
      return Err(Panic::new(other_type.source, message));
    };

    let layout = if composite.is_polymorphic {
      let poly = self.ast.poly_composite_find_exact(&composite.name)
        .expect("polymorphic composite is indexed");

      let TypeElem::GenericBase(generic_base) = &other_type.elements[0] else {
        return Err(Panic::new(
          other_type.source,
          format!("Incorrect number of type parameters specified for type '{}'", composite.name),
        ));
      };

      if generic_base.generics.len() != poly.generics.len() {
        return Err(Panic::new(
          other_type.source,
          format!("Incorrect number of type parameters specified for type '{}'", generic_base.name),
        ));
      }

      let mut catalog = PolyCatalog::new();
      for (name, binding) in poly.generics.iter().zip(&generic_base.generics) {
        catalog.put_type(name.clone(), binding.clone());
      }

      catalog.resolve_layout(&poly.composite.layout)?
    } else {
      composite.layout.clone()
    };

    if !layout.is_simple_struct() {
      let message = if require_class {
        format!("Cannot extend class '{other_type}' which has a complex layout")
      } else {
        format!("Cannot integrate composite '{other_type}' which has a complex layout")
      };
      return Err(Panic::new(other_type.source, message));
    }

    for index in 0..layout.field_map.count() {
      let field_name = layout.field_map.name_at_index(index).to_string();
      let field_type = layout.skeleton.get_type_at_index(index)
        .expect("simple struct fields are leaves")
        .clone();

      field_map.add(field_name, next_endpoint.clone());
      skeleton.add_field(field_type);
      next_endpoint.increment();
    }

    Ok(())
  }

  // Open the composite's function domain if one follows the body.
  fn parse_composite_domain(
    &mut self,
    association: CompositeAssociation,
    is_class: bool,
  ) -> Result {
    let anchor = self.i;

    if is_function_like_beginning(self.peek()) {
      // Methods begin immediately; the body closer doubles as the domain
      // closer.
      self.composite_association = Some(association);
      return Ok(());
    }

    // Only the parenthesized body form may be followed by a `{ ... }`
    // function domain.
    if self.struct_closer == TokenKind::Close && self.eat(&TokenKind::Close) {
      let mut lookahead = self.i;
      while self.tokens.kind(lookahead) == &TokenKind::Newline {
        lookahead += 1;
      }

      if self.tokens.kind(lookahead) == &TokenKind::Begin {
        self.i = lookahead + 1;
        self.composite_association = Some(association);
        return Ok(());
      }
    }

    self.i = anchor;
    self.advance(); // past the closer
    self.require_class_constructor(&association, is_class)
  }

  fn require_class_constructor(
    &self,
    association: &CompositeAssociation,
    is_class: bool,
  ) -> Result {
    if is_class {
      return Err(Panic::new(association.source, "Class is missing constructor"));
    }
    Ok(())
  }

  // Synthesize the by-value constructor for a record composite.
  fn create_record_constructor(
    &mut self,
    head: &CompositeHead,
    layout: &Layout,
    source: Source,
  ) -> Result {
    if !layout.is_simple_struct() {
      return Err(Panic::new(
        source,
        format!("Record type '{}' cannot be defined to have a complicated structure", head.name),
      ));
    }

    if head.name.starts_with("__") {
      return Err(Panic::new(
        source,
        format!("Name of record type '{}' cannot start with double underscores", head.name),
      ));
    }

    if head.name == self.compiler.entry_point {
      return Err(Panic::new(
        source,
        format!("Name of record type '{}' conflicts with name of entry point", head.name),
      ));
    }

    let is_polymorphic = layout.skeleton.has_polymorph() || head.generics.is_some();

    // The value under construction; this name cannot appear in user code.
    let master_variable_name = "$";

    let return_type = match &head.generics {
      Some(generics) => Type {
        elements: smallvec::smallvec![TypeElem::GenericBase(Box::new(GenericBaseElem {
          name: head.name.clone(),
          generics: generics.iter().map(|g| Type::polymorph(g.clone())).collect(),
          name_is_polymorphic: false,
          source: Source::NONE,
        }))],
        source: Source::NONE,
      },
      None => Type::base(head.name.clone()),
    };

    let mut params = Vec::with_capacity(layout.field_map.count());
    let mut all_primitive = true;

    for arrow in &layout.field_map.arrows {
      let field_type = layout.skeleton.get_type(&arrow.endpoint)
        .expect("simple struct fields are leaves")
        .clone();

      if all_primitive {
        all_primitive = match field_type.struct_name() {
          Some(name) if field_type.is_base() => is_builtin_typename(name),
          _ => false,
        };
      }

      params.push(Param {
        name: arrow.name.clone(),
        ty: field_type,
        source: Source::NONE,
        flow: Flow::In,
        traits: ParamTraits::POD,
        default: None,
      });
    }

    let mut statements = ExprList::with_capacity(params.len() + 2);

    // Declare the master value; primitives-only records skip zeroing.
    statements.push(Expr::new(
      ExprKind::Declare(Box::new(DeclareStmt {
        name: master_variable_name.to_string(),
        ty: return_type.clone(),
        value: None,
        inputs: None,
        traits: DeclareTraits::POD | DeclareTraits::ASSIGN_POD,
        is_undef: all_primitive,
        is_inline: false,
      })),
      source,
    ));

    for param in &params {
      statements.push(Expr::new(
        ExprKind::Assign(Box::new(AssignStmt {
          kind: AssignKind::Plain,
          destination: Box::new(Expr::new(
            ExprKind::Member {
              value: Box::new(Expr::new(
                ExprKind::Variable(master_variable_name.to_string()),
                source,
              )),
              member: param.name.clone(),
            },
            source,
          )),
          value: Box::new(Expr::new(ExprKind::Variable(param.name.clone()), source)),
          is_pod: false,
        })),
        source,
      ));
    }

    statements.push(Expr::new(
      ExprKind::Return {
        value: Some(Box::new(Expr::new(
          ExprKind::Variable(master_variable_name.to_string()),
          source,
        ))),
        last_minute: ExprList::new(),
      },
      source,
    ));

    let mut traits = FuncTraits::GENERATED;
    if is_polymorphic {
      traits |= FuncTraits::POLYMORPHIC;
    }

    let func = Func {
      name: head.name.clone(),
      params,
      variadic: None,
      return_type,
      traits,
      statements,
      source,
      export_as: None,
      instantiation_depth: 0,
      virtual_role: VirtualRole::None,
    };

    let func_id = self.ast.add_func(func);

    if is_polymorphic {
      self.ast.add_poly_func(head.name.clone(), func_id);
    }

    Ok(())
  }
}
