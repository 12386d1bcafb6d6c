//! Polymorph resolution.
//!
//! A [`PolyCatalog`] maps type variables `$T` to types and count variables
//! `$#N` to lengths. Resolution walks a type or expression tree and
//! substitutes every variable by its binding: a bound `$T` splices a deep
//! clone of the binding's element sequence (which may be several elements
//! long), a bound `$#N` becomes a fixed-array element, and `$#N` count
//! expressions are rewritten in place to `usize` literals. Anything free of
//! variables is cloned verbatim, so resolving a polymorph-free tree is a
//! deep copy.

use hashbrown::HashMap;

use crate::error::{Panic, Result};
use crate::types::expr::{Expr, ExprKind, ExprList};
use crate::types::layout::{Bone, BoneKind, Layout, Skeleton};
use crate::types::ty::{FuncElem, GenericBaseElem, Type, TypeElem, TypeElems};

/// The bindings used during one resolution.
#[derive(Clone, Debug, Default)]
pub struct PolyCatalog {
  types: HashMap<String, Type>,
  counts: HashMap<String, usize>,
}

impl PolyCatalog {
  /// An empty catalog.
  #[must_use] pub fn new() -> PolyCatalog {
    PolyCatalog::default()
  }

  /// Bind `$name` to a type.
  pub fn put_type(&mut self, name: impl Into<String>, binding: Type) {
    self.types.insert(name.into(), binding);
  }

  /// Bind `$#name` to a length.
  pub fn put_count(&mut self, name: impl Into<String>, binding: usize) {
    self.counts.insert(name.into(), binding);
  }

  /// The type bound to `$name`, if any.
  #[must_use] pub fn find_type(&self, name: &str) -> Option<&Type> {
    self.types.get(name)
  }

  /// The length bound to `$#name`, if any.
  #[must_use] pub fn find_count(&self, name: &str) -> Option<usize> {
    self.counts.get(name).copied()
  }

  /// Resolve a type into a freshly owned copy with every variable
  /// substituted.
  pub fn resolve_type(&self, in_type: &Type) -> Result<Type> {
    let mut elements = TypeElems::new();

    for elem in &in_type.elements {
      match elem {
        TypeElem::Func(func) => {
          let mut arg_types = Vec::with_capacity(func.arg_types.len());
          for arg_type in &func.arg_types {
            arg_types.push(self.resolve_type(arg_type)?);
          }

          elements.push(TypeElem::Func(Box::new(FuncElem {
            arg_types,
            return_type: self.resolve_type(&func.return_type)?,
            traits: func.traits,
            source: func.source,
          })));
        }
        TypeElem::GenericBase(base) => {
          if base.name_is_polymorphic {
            return Err(Panic::new(
              base.source,
              "Polymorphic names for generic composites cannot be resolved",
            ));
          }

          let mut generics = Vec::with_capacity(base.generics.len());
          for generic in &base.generics {
            generics.push(self.resolve_type(generic)?);
          }

          elements.push(TypeElem::GenericBase(Box::new(GenericBaseElem {
            name: base.name.clone(),
            generics,
            name_is_polymorphic: false,
            source: base.source,
          })));
        }
        TypeElem::Polymorph { name, source, .. } => {
          let Some(binding) = self.find_type(name) else {
            return Err(Panic::new(
              *source,
              format!("Undetermined polymorphic type variable '${name}'"),
            ));
          };

          // The binding may expand into multiple elements.
          elements.extend(binding.elements.iter().cloned());
        }
        TypeElem::PolymorphPrereq(prereq) => {
          let Some(binding) = self.find_type(&prereq.name) else {
            return Err(Panic::new(
              prereq.source,
              format!("Undetermined polymorphic type variable '${}'", prereq.name),
            ));
          };

          elements.extend(binding.elements.iter().cloned());
        }
        TypeElem::PolyCount { name, source } => {
          let Some(length) = self.find_count(name) else {
            return Err(Panic::new(
              *source,
              format!("Undetermined polymorphic count variable '$#{name}'"),
            ));
          };

          elements.push(TypeElem::FixedArray { length, source: *source });
        }
        TypeElem::VarFixedArray { length, source } => {
          // A length that is a bound count reference collapses to the
          // fixed form here; anything else stays for later inference.
          match &length.kind {
            ExprKind::PolyCount { name } if self.find_count(name).is_some() => {
              let length = self.find_count(name).expect("checked above");
              elements.push(TypeElem::FixedArray { length, source: *source });
            }
            _ => {
              let mut length = length.clone();
              self.resolve_expr(&mut length)?;
              elements.push(TypeElem::VarFixedArray { length, source: *source });
            }
          }
        }
        other => elements.push(other.clone()),
      }
    }

    Ok(Type { elements, source: in_type.source })
  }

  /// Resolve a type in place, replacing the previous value.
  pub fn resolve_type_in_place(&self, ty: &mut Type) -> Result {
    *ty = self.resolve_type(ty)?;
    Ok(())
  }

  /// Resolve every field type inside a layout, producing a freshly owned
  /// layout with the same shape and names. Used when a polymorphic
  /// composite is integrated with concrete type parameters.
  pub fn resolve_layout(&self, layout: &Layout) -> Result<Layout> {
    const DEPTH_LIMIT: u32 = 64;

    fn resolve_skeleton(
      catalog: &PolyCatalog,
      skeleton: &Skeleton,
      depth_left: u32,
    ) -> Result<Skeleton> {
      if depth_left == 0 {
        return Err(Panic::new(
          crate::types::Source::NONE,
          "Refusing to resolve polymorphism in composite layout that nests absurdly deep",
        ));
      }

      let mut resolved = Skeleton::new();
      for bone in &skeleton.bones {
        let kind = match &bone.kind {
          BoneKind::Field(ty) => BoneKind::Field(catalog.resolve_type(ty)?),
          BoneKind::Struct(children) =>
            BoneKind::Struct(resolve_skeleton(catalog, children, depth_left - 1)?),
          BoneKind::Union(children) =>
            BoneKind::Union(resolve_skeleton(catalog, children, depth_left - 1)?),
        };
        resolved.bones.push(Bone { traits: bone.traits, kind });
      }
      Ok(resolved)
    }

    Ok(Layout {
      kind: layout.kind,
      field_map: layout.field_map.clone(),
      skeleton: resolve_skeleton(self, &layout.skeleton, DEPTH_LIMIT)?,
      traits: layout.traits,
    })
  }

  /// Resolve every expression in a list.
  pub fn resolve_expr_list(&self, list: &mut ExprList) -> Result {
    for expr in list {
      self.resolve_expr(expr)?;
    }
    Ok(())
  }

  fn resolve_optional_expr(&self, value: &mut Option<Box<Expr>>) -> Result {
    match value {
      Some(expr) => self.resolve_expr(expr),
      None => Ok(()),
    }
  }

  fn resolve_optional_type(&self, ty: &mut Option<Type>) -> Result {
    match ty {
      Some(ty) => self.resolve_type_in_place(ty),
      None => Ok(()),
    }
  }

  /// Resolve an expression tree in place, dispatching over the full
  /// statement taxonomy.
  pub fn resolve_expr(&self, expr: &mut Expr) -> Result {
    let source = expr.source;

    // A count reference becomes a usize literal in place.
    if let ExprKind::PolyCount { name } = &expr.kind {
      let Some(count) = self.find_count(name) else {
        return Err(Panic::new(
          source,
          format!("Undetermined polymorphic count variable '$#{name}'"),
        ));
      };
      expr.kind = ExprKind::Usize(count as u64);
      return Ok(());
    }

    match &mut expr.kind {
      ExprKind::Return { value, last_minute } => {
        self.resolve_optional_expr(value)?;
        self.resolve_expr_list(last_minute)?;
      }
      ExprKind::Call(call) => {
        self.resolve_expr_list(&mut call.args)?;
        self.resolve_optional_type(&mut call.gives)?;
      }
      ExprKind::SuperCall(call) => {
        self.resolve_expr_list(&mut call.args)?;
      }
      ExprKind::MethodCall(call) => {
        self.resolve_expr(&mut call.subject)?;
        self.resolve_expr_list(&mut call.args)?;
        self.resolve_optional_type(&mut call.gives)?;
      }
      ExprKind::Declare(declare) => {
        self.resolve_type_in_place(&mut declare.ty)?;
        if let Some(value) = &mut declare.value {
          self.resolve_expr(value)?;
        }
        if let Some(inputs) = &mut declare.inputs {
          self.resolve_expr_list(inputs)?;
        }
      }
      ExprKind::Assign(assign) => {
        self.resolve_expr(&mut assign.destination)?;
        self.resolve_expr(&mut assign.value)?;
      }
      ExprKind::If(conditional)
      | ExprKind::Unless(conditional)
      | ExprKind::While(conditional)
      | ExprKind::Until(conditional) => {
        self.resolve_expr(&mut conditional.condition)?;
        self.resolve_expr_list(&mut conditional.statements)?;
      }
      ExprKind::IfElse(conditional) | ExprKind::UnlessElse(conditional) => {
        self.resolve_expr(&mut conditional.condition)?;
        self.resolve_expr_list(&mut conditional.statements)?;
        self.resolve_expr_list(&mut conditional.else_statements)?;
      }
      ExprKind::WhileContinue(always) | ExprKind::UntilBreak(always) => {
        self.resolve_expr_list(&mut always.statements)?;
      }
      ExprKind::EachIn(each) => {
        self.resolve_type_in_place(&mut each.it_type)?;
        if let Some(low_array) = &mut each.low_array {
          self.resolve_expr(low_array)?;
        }
        if let Some(length) = &mut each.length {
          self.resolve_expr(length)?;
        }
        if let Some(list) = &mut each.list {
          self.resolve_expr(list)?;
        }
        self.resolve_expr_list(&mut each.statements)?;
      }
      ExprKind::Repeat(repeat) => {
        self.resolve_expr(&mut repeat.limit)?;
        self.resolve_expr_list(&mut repeat.statements)?;
      }
      ExprKind::Switch(switch) => {
        self.resolve_expr(&mut switch.value)?;
        for case in &mut switch.cases {
          self.resolve_expr(&mut case.condition)?;
          self.resolve_expr_list(&mut case.statements)?;
        }
        self.resolve_expr_list(&mut switch.default_statements)?;
      }
      ExprKind::For(for_loop) => {
        self.resolve_expr_list(&mut for_loop.before)?;
        if let Some(condition) = &mut for_loop.condition {
          self.resolve_expr(condition)?;
        }
        self.resolve_expr_list(&mut for_loop.after)?;
        self.resolve_expr_list(&mut for_loop.statements)?;
      }
      ExprKind::Block(statements) => {
        self.resolve_expr_list(statements)?;
      }
      ExprKind::Cast { to, value } => {
        self.resolve_type_in_place(to)?;
        self.resolve_expr(value)?;
      }
      ExprKind::Sizeof(ty)
      | ExprKind::Alignof(ty)
      | ExprKind::Typeinfo(ty)
      | ExprKind::Typenameof(ty) => {
        self.resolve_type_in_place(ty)?;
      }
      ExprKind::SizeofValue(value) => {
        self.resolve_expr(value)?;
      }
      ExprKind::New(new) => {
        self.resolve_type_in_place(&mut new.ty)?;
        self.resolve_optional_expr(&mut new.amount)?;
        if let Some(inputs) = &mut new.inputs {
          self.resolve_expr_list(inputs)?;
        }
      }
      ExprKind::StaticData(data) => {
        self.resolve_type_in_place(&mut data.ty)?;
        self.resolve_expr_list(&mut data.values)?;
      }
      ExprKind::Address(value)
      | ExprKind::Dereference(value)
      | ExprKind::BitComplement(value)
      | ExprKind::Not(value)
      | ExprKind::Negate(value)
      | ExprKind::PreIncrement(value)
      | ExprKind::PreDecrement(value)
      | ExprKind::PostIncrement(value)
      | ExprKind::PostDecrement(value)
      | ExprKind::Toggle(value)
      | ExprKind::Delete(value)
      | ExprKind::VaStart(value)
      | ExprKind::VaEnd(value) => {
        self.resolve_expr(value)?;
      }
      ExprKind::Binary { left, right, .. } => {
        self.resolve_expr(left)?;
        self.resolve_expr(right)?;
      }
      ExprKind::Ternary { condition, if_true, if_false } => {
        self.resolve_expr(condition)?;
        self.resolve_expr(if_true)?;
        self.resolve_expr(if_false)?;
      }
      ExprKind::Member { value, .. } => {
        self.resolve_expr(value)?;
      }
      ExprKind::ArrayAccess { value, index } | ExprKind::At { value, index } => {
        self.resolve_expr(value)?;
        self.resolve_expr(index)?;
      }
      ExprKind::FuncAddr(func_addr) => {
        if let Some(match_args) = &mut func_addr.match_args {
          for arg in match_args {
            self.resolve_type_in_place(arg)?;
          }
        }
      }
      ExprKind::InitializerList(values) => {
        self.resolve_expr_list(values)?;
      }
      ExprKind::VaArg { list, ty } => {
        self.resolve_expr(list)?;
        self.resolve_type_in_place(ty)?;
      }
      ExprKind::VaCopy { dest, src } => {
        self.resolve_expr(dest)?;
        self.resolve_expr(src)?;
      }
      ExprKind::Assert(assert) => {
        self.resolve_expr(&mut assert.assertion)?;
        if let Some(message) = &mut assert.message {
          self.resolve_expr(message)?;
        }
      }
      ExprKind::InlineAsm(asm) => {
        self.resolve_expr_list(&mut asm.args)?;
      }
      ExprKind::DeclareNamedExpression(named) => {
        self.resolve_expr(&mut named.value)?;
      }
      ExprKind::Phantom(phantom) => {
        self.resolve_type_in_place(&mut phantom.ty)?;
      }

      // Leaves.
      ExprKind::Byte(_) | ExprKind::Ubyte(_) | ExprKind::Short(_)
      | ExprKind::Ushort(_) | ExprKind::Int(_) | ExprKind::Uint(_)
      | ExprKind::Long(_) | ExprKind::Ulong(_) | ExprKind::Usize(_)
      | ExprKind::GenericInt(_) | ExprKind::Float(_) | ExprKind::Double(_)
      | ExprKind::GenericFloat(_) | ExprKind::Boolean(_) | ExprKind::Str(_)
      | ExprKind::CStr(_) | ExprKind::Null | ExprKind::Variable(_)
      | ExprKind::EnumValue { .. } | ExprKind::GenericEnumValue(_)
      | ExprKind::NewCstring(_) | ExprKind::Embed(_) | ExprKind::Break
      | ExprKind::Continue | ExprKind::FallThrough | ExprKind::BreakTo { .. }
      | ExprKind::ContinueTo { .. } => {}

      ExprKind::PolyCount { .. } => unreachable!("rewritten before the dispatch"),
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::Source;

  fn catalog() -> PolyCatalog {
    let mut catalog = PolyCatalog::new();
    catalog.put_type("T", Type::base("int"));
    catalog.put_count("N", 4);
    catalog
  }

  #[test]
  fn substitutes_type_variables() {
    let ty = Type::polymorph("T").into_pointer();
    let resolved = catalog().resolve_type(&ty).expect("bound");
    assert_eq!(resolved.to_string(), "*int");
  }

  #[test]
  fn substitutes_count_variables() {
    let ty = Type {
      elements: smallvec::smallvec![
        TypeElem::PolyCount { name: "N".into(), source: Source::NONE },
        TypeElem::Polymorph {
          name: "T".into(),
          allow_auto_conversion: false,
          source: Source::NONE,
        },
      ],
      source: Source::NONE,
    };
    let resolved = catalog().resolve_type(&ty).expect("bound");
    assert_eq!(resolved.to_string(), "4 int");
    assert!(resolved.is_fixed_array());
  }

  #[test]
  fn binding_may_expand_into_multiple_elements() {
    let mut catalog = PolyCatalog::new();
    catalog.put_type("T", Type::base_ptr("ubyte"));

    let resolved = catalog.resolve_type(&Type::polymorph("T").into_pointer()).expect("bound");
    assert_eq!(resolved.to_string(), "**ubyte");
  }

  #[test]
  fn unbound_variable_fails() {
    assert!(PolyCatalog::new().resolve_type(&Type::polymorph("T")).is_err());
  }

  #[test]
  fn resolution_without_polymorphs_is_deep_clone() {
    let ty = Type::base_ptr("Player");
    let resolved = PolyCatalog::new().resolve_type(&ty).expect("no variables");
    assert!(resolved.identical(&ty));
  }

  #[test]
  fn polycount_expr_rewritten_to_usize() {
    let mut expr = Expr::new(ExprKind::PolyCount { name: "N".into() }, Source::NONE);
    catalog().resolve_expr(&mut expr).expect("bound");
    assert!(matches!(expr.kind, ExprKind::Usize(4)));
  }

  #[test]
  fn walks_statements() {
    use crate::types::expr::{ConditionalStmt, DeclareStmt, DeclareTraits};

    let mut stmt = Expr::new(
      ExprKind::While(Box::new(ConditionalStmt {
        label: None,
        condition: Box::new(Expr::new(ExprKind::Boolean(true), Source::NONE)),
        statements: vec![Expr::new(
          ExprKind::Declare(Box::new(DeclareStmt {
            name: "value".into(),
            ty: Type::polymorph("T"),
            value: None,
            inputs: None,
            traits: DeclareTraits::empty(),
            is_undef: false,
            is_inline: false,
          })),
          Source::NONE,
        )],
      })),
      Source::NONE,
    );

    catalog().resolve_expr(&mut stmt).expect("bound");

    let ExprKind::While(conditional) = &stmt.kind else { panic!("shape preserved") };
    let ExprKind::Declare(declare) = &conditional.statements[0].kind else {
      panic!("shape preserved")
    };
    assert!(declare.ty.is_base_of("int"));
  }
}
