//! The type model.
//!
//! A type is an ordered sequence of [`TypeElem`]s appearing in the same
//! order they were written in source. For example the type `**ubyte` is
//! represented as `[Pointer, Pointer, Base "ubyte"]`. Only the final
//! element may be a terminal (base, layout, generic base, func pointer or
//! polymorph); pointers and array elements are prefixes.

use std::fmt;
use std::hash::{Hash, Hasher};

use itertools::Itertools;
use smallvec::SmallVec;

use super::ast::FuncTraits;
use super::expr::Expr;
use super::layout::Layout;
use super::Source;

/// The element sequence type. Most types are one or two elements long.
pub type TypeElems = SmallVec<[TypeElem; 2]>;

/// One element of a type's left-to-right spelling.
#[derive(Clone, Debug)]
pub enum TypeElem {
  /// A named primitive or user type.
  Base {
    /// The type name as written.
    name: String,
    /// Where the name was written.
    source: Source,
  },
  /// A single indirection.
  Pointer {
    /// Where the `*` was written.
    source: Source,
  },
  /// An array prefix with no compile-time length.
  Array {
    /// Where the prefix was written.
    source: Source,
  },
  /// A fixed-length array prefix, e.g. the `10` of `10 int`.
  FixedArray {
    /// Number of elements.
    length: usize,
    /// Where the prefix was written.
    source: Source,
  },
  /// A fixed-length array prefix whose length is still an expression,
  /// e.g. `[$#N] int` before polymorph resolution. Collapses to
  /// [`TypeElem::FixedArray`] once the length is known.
  VarFixedArray {
    /// The unevaluated length.
    length: Box<Expr>,
    /// Where the prefix was written.
    source: Source,
  },
  /// An untyped integer literal's type, awaiting inference.
  GenericInt {
    /// Where the literal was written.
    source: Source,
  },
  /// An untyped float literal's type, awaiting inference.
  GenericFloat {
    /// Where the literal was written.
    source: Source,
  },
  /// A function pointer.
  Func(Box<FuncElem>),
  /// A polymorphic type variable `$T` (or `$~T` when auto conversions are
  /// allowed during matching).
  Polymorph {
    /// The variable name without the `$`.
    name: String,
    /// Whether matching may insert automatic conversions.
    allow_auto_conversion: bool,
    /// Where the variable was written.
    source: Source,
  },
  /// A polymorphic count variable `$#N`, standing where a fixed-array
  /// length is expected.
  PolyCount {
    /// The variable name without the `$#`.
    name: String,
    /// Where the variable was written.
    source: Source,
  },
  /// A polymorphic type variable restricted to structurally similar or
  /// extending types, `$T~Similar`.
  PolymorphPrereq(Box<PolymorphPrereq>),
  /// A parameterized user type variant, `<int, int> Pair`.
  GenericBase(Box<GenericBaseElem>),
  /// An anonymous composite embedded directly in a type.
  Layout {
    /// The embedded layout.
    layout: Layout,
    /// Where the composite was written.
    source: Source,
  },
}

/// Payload of [`TypeElem::Func`].
#[derive(Clone, Debug)]
pub struct FuncElem {
  /// Parameter types in order.
  pub arg_types: Vec<Type>,
  /// The return type.
  pub return_type: Type,
  /// `vararg` / `variadic` / `stdcall` bits; other bits are never set on a
  /// function pointer element.
  pub traits: FuncTraits,
  /// Where the `func(..)` was written.
  pub source: Source,
}

/// Payload of [`TypeElem::PolymorphPrereq`].
#[derive(Clone, Debug)]
pub struct PolymorphPrereq {
  /// The variable name without the `$`.
  pub name: String,
  /// Whether matching may insert automatic conversions.
  pub allow_auto_conversion: bool,
  /// Name of the composite the binding must be structurally similar to.
  pub similarity: String,
  /// If present, the binding must extend this class type.
  pub extends: Option<Type>,
  /// Where the variable was written.
  pub source: Source,
}

/// Payload of [`TypeElem::GenericBase`].
#[derive(Clone, Debug)]
pub struct GenericBaseElem {
  /// Name of the parameterized composite.
  pub name: String,
  /// The type arguments.
  pub generics: Vec<Type>,
  /// Whether the name itself is a polymorphic variable (unsupported by
  /// resolution; kept so the error can be precise).
  pub name_is_polymorphic: bool,
  /// Where the name was written.
  pub source: Source,
}

/// A complete type: at least one element, terminal last.
#[derive(Clone, Debug, Default)]
pub struct Type {
  /// The elements in written order.
  pub elements: TypeElems,
  /// Where the whole type begins.
  pub source: Source,
}

/// Treat `usize`/`ulong` and `bool`/`successful` as one name for identity
/// and hashing purposes.
fn canonical_base_name(name: &str) -> &str {
  match name {
    "usize" => "ulong",
    "successful" => "bool",
    other => other,
  }
}

/// Element-wise structural identity over element slices. This is the core
/// of [`Type::identical`], shared with borrowed views.
#[must_use] pub fn elems_identical(a: &[TypeElem], b: &[TypeElem]) -> bool {
  if a.len() != b.len() { return false }

  a.iter().zip(b).all(|(a_elem, b_elem)| match (a_elem, b_elem) {
    (TypeElem::Base { name: a_name, .. }, TypeElem::Base { name: b_name, .. }) =>
      canonical_base_name(a_name) == canonical_base_name(b_name),
    (TypeElem::Pointer { .. }, TypeElem::Pointer { .. })
    | (TypeElem::Array { .. }, TypeElem::Array { .. })
    | (TypeElem::GenericInt { .. }, TypeElem::GenericInt { .. })
    | (TypeElem::GenericFloat { .. }, TypeElem::GenericFloat { .. }) => true,
    (TypeElem::FixedArray { length: a_len, .. }, TypeElem::FixedArray { length: b_len, .. }) =>
      a_len == b_len,
    // An uncollapsed length expression cannot be proven equivalent.
    (TypeElem::VarFixedArray { .. }, TypeElem::VarFixedArray { .. }) => false,
    (TypeElem::Func(a_func), TypeElem::Func(b_func)) => {
      a_func.traits.contains(FuncTraits::VARARG) == b_func.traits.contains(FuncTraits::VARARG)
        && a_func.traits.contains(FuncTraits::STDCALL) == b_func.traits.contains(FuncTraits::STDCALL)
        && a_func.arg_types.len() == b_func.arg_types.len()
        && a_func.return_type.identical(&b_func.return_type)
        && a_func.arg_types.iter().zip(&b_func.arg_types).all(|(x, y)| x.identical(y))
    }
    (
      TypeElem::Polymorph { name: a_name, allow_auto_conversion: a_auto, .. },
      TypeElem::Polymorph { name: b_name, allow_auto_conversion: b_auto, .. },
    ) => a_auto == b_auto && a_name == b_name,
    (TypeElem::PolyCount { name: a_name, .. }, TypeElem::PolyCount { name: b_name, .. }) =>
      a_name == b_name,
    (TypeElem::PolymorphPrereq(a_prereq), TypeElem::PolymorphPrereq(b_prereq)) => {
      a_prereq.allow_auto_conversion == b_prereq.allow_auto_conversion
        && a_prereq.similarity == b_prereq.similarity
        && a_prereq.name == b_prereq.name
        && match (&a_prereq.extends, &b_prereq.extends) {
          (None, None) => true,
          (Some(x), Some(y)) => x.identical(y),
          _ => false,
        }
    }
    (TypeElem::GenericBase(a_base), TypeElem::GenericBase(b_base)) => {
      assert!(
        !a_base.name_is_polymorphic && !b_base.name_is_polymorphic,
        "polymorphic names for generic bases are unimplemented"
      );
      a_base.name == b_base.name
        && a_base.generics.len() == b_base.generics.len()
        && a_base.generics.iter().zip(&b_base.generics).all(|(x, y)| x.identical(y))
    }
    (TypeElem::Layout { layout: a_layout, .. }, TypeElem::Layout { layout: b_layout, .. }) =>
      a_layout.identical(b_layout),
    _ => false,
  })
}

impl TypeElem {
  /// Where this element was written.
  #[must_use] pub fn source(&self) -> Source {
    match self {
      TypeElem::Base { source, .. }
      | TypeElem::Pointer { source }
      | TypeElem::Array { source }
      | TypeElem::FixedArray { source, .. }
      | TypeElem::VarFixedArray { source, .. }
      | TypeElem::GenericInt { source }
      | TypeElem::GenericFloat { source }
      | TypeElem::Polymorph { source, .. }
      | TypeElem::PolyCount { source, .. }
      | TypeElem::Layout { source, .. } => *source,
      TypeElem::Func(func) => func.source,
      TypeElem::PolymorphPrereq(prereq) => prereq.source,
      TypeElem::GenericBase(base) => base.source,
    }
  }

  /// Whether a polymorphic variable occurs anywhere inside this element.
  #[must_use] pub fn has_polymorph(&self) -> bool {
    match self {
      TypeElem::Polymorph { .. }
      | TypeElem::PolyCount { .. }
      | TypeElem::PolymorphPrereq(_) => true,
      TypeElem::Func(func) =>
        func.return_type.has_polymorph()
          || func.arg_types.iter().any(Type::has_polymorph),
      TypeElem::GenericBase(base) =>
        base.name_is_polymorphic || base.generics.iter().any(Type::has_polymorph),
      TypeElem::Layout { layout, .. } => layout.has_polymorph(),
      TypeElem::VarFixedArray { .. }
      | TypeElem::Base { .. }
      | TypeElem::Pointer { .. }
      | TypeElem::Array { .. }
      | TypeElem::FixedArray { .. }
      | TypeElem::GenericInt { .. }
      | TypeElem::GenericFloat { .. } => false,
    }
  }
}

impl Hash for TypeElem {
  fn hash<H: Hasher>(&self, state: &mut H) {
    std::mem::discriminant(self).hash(state);
    match self {
      TypeElem::Base { name, .. } => canonical_base_name(name).hash(state),
      TypeElem::FixedArray { length, .. } => length.hash(state),
      TypeElem::Func(func) => {
        func.traits.bits().hash(state);
        func.arg_types.len().hash(state);
        for arg in &func.arg_types { arg.hash(state) }
        func.return_type.hash(state);
      }
      TypeElem::Polymorph { name, allow_auto_conversion, .. } => {
        name.hash(state);
        allow_auto_conversion.hash(state);
      }
      TypeElem::PolyCount { name, .. } => name.hash(state),
      TypeElem::PolymorphPrereq(prereq) => {
        prereq.name.hash(state);
        prereq.allow_auto_conversion.hash(state);
        prereq.similarity.hash(state);
      }
      TypeElem::GenericBase(base) => {
        base.name.hash(state);
        for generic in &base.generics { generic.hash(state) }
      }
      TypeElem::Layout { layout, .. } => layout.hash(state),
      // Positional elements contribute only their discriminant.
      TypeElem::Pointer { .. }
      | TypeElem::Array { .. }
      | TypeElem::VarFixedArray { .. }
      | TypeElem::GenericInt { .. }
      | TypeElem::GenericFloat { .. } => {}
    }
  }
}

impl Hash for Type {
  fn hash<H: Hasher>(&self, state: &mut H) {
    for elem in &self.elements { elem.hash(state) }
  }
}

impl Type {
  /// A base type at a null location.
  #[must_use] pub fn base(name: impl Into<String>) -> Type {
    Type::base_at(Source::NONE, name)
  }

  /// A base type at the given location.
  #[must_use] pub fn base_at(source: Source, name: impl Into<String>) -> Type {
    Type {
      elements: smallvec::smallvec![TypeElem::Base { name: name.into(), source }],
      source,
    }
  }

  /// A pointer to a base type.
  #[must_use] pub fn base_ptr(name: impl Into<String>) -> Type {
    Type::base(name).into_pointer()
  }

  /// The `void` type.
  #[must_use] pub fn void(source: Source) -> Type {
    Type::base_at(source, "void")
  }

  /// A plain polymorphic variable `$name`.
  #[must_use] pub fn polymorph(name: impl Into<String>) -> Type {
    let source = Source::NONE;
    Type {
      elements: smallvec::smallvec![TypeElem::Polymorph {
        name: name.into(),
        allow_auto_conversion: false,
        source,
      }],
      source,
    }
  }

  /// Consume this type and return it with a pointer prepended.
  #[must_use] pub fn into_pointer(mut self) -> Type {
    self.prepend_pointer();
    self
  }

  /// Prepend a pointer element in place.
  pub fn prepend_pointer(&mut self) {
    self.elements.insert(0, TypeElem::Pointer { source: self.source });
  }

  /// Structural identity. The two types must be exactly the same to be
  /// considered identical; aliases are not collapsed. The only cross-name
  /// equivalences are `usize`/`ulong` and `bool`/`successful`.
  #[must_use] pub fn identical(&self, other: &Type) -> bool {
    elems_identical(&self.elements, &other.elements)
  }

  /// Whether this type is `void`.
  #[must_use] pub fn is_void(&self) -> bool {
    self.is_base_of("void")
  }

  /// Whether this type is a lone base.
  #[must_use] pub fn is_base(&self) -> bool {
    matches!(self.elements.as_slice(), [TypeElem::Base { .. }])
  }

  /// Whether this type is a pointer to a base.
  #[must_use] pub fn is_base_ptr(&self) -> bool {
    matches!(self.elements.as_slice(), [TypeElem::Pointer { .. }, TypeElem::Base { .. }])
  }

  /// Whether this type is the lone base named `base`.
  #[must_use] pub fn is_base_of(&self, base: &str) -> bool {
    matches!(self.elements.as_slice(), [TypeElem::Base { name, .. }] if name == base)
  }

  /// Whether this type is a pointer to the base named `base`.
  #[must_use] pub fn is_base_ptr_of(&self, base: &str) -> bool {
    matches!(
      self.elements.as_slice(),
      [TypeElem::Pointer { .. }, TypeElem::Base { name, .. }] if name == base
    )
  }

  /// Whether this type is base-like: a lone base or generic base.
  #[must_use] pub fn is_base_like(&self) -> bool {
    matches!(
      self.elements.as_slice(),
      [TypeElem::Base { .. }] | [TypeElem::GenericBase(_)]
    )
  }

  /// Whether this type starts with a pointer element.
  #[must_use] pub fn is_pointer(&self) -> bool {
    matches!(self.elements.first(), Some(TypeElem::Pointer { .. }))
  }

  /// Whether this type is a pointer to exactly `to`.
  #[must_use] pub fn is_pointer_to(&self, to: &Type) -> bool {
    self.is_pointer() && elems_identical(&self.elements[1..], &to.elements)
  }

  /// Whether this type is a pointer to a base-like terminal.
  #[must_use] pub fn is_pointer_to_base_like(&self) -> bool {
    matches!(
      self.elements.as_slice(),
      [TypeElem::Pointer { .. }, TypeElem::Base { .. }]
      | [TypeElem::Pointer { .. }, TypeElem::GenericBase(_)]
    )
  }

  /// Whether this type is a lone plain polymorph.
  #[must_use] pub fn is_polymorph(&self) -> bool {
    matches!(self.elements.as_slice(), [TypeElem::Polymorph { .. }])
  }

  /// Whether this type is a pointer to a plain polymorph.
  #[must_use] pub fn is_polymorph_ptr(&self) -> bool {
    matches!(self.elements.as_slice(), [TypeElem::Pointer { .. }, TypeElem::Polymorph { .. }])
  }

  /// Whether this type is a pointer to a plain polymorph or a polymorph
  /// with prerequisites.
  #[must_use] pub fn is_polymorph_like_ptr(&self) -> bool {
    matches!(
      self.elements.as_slice(),
      [TypeElem::Pointer { .. }, TypeElem::Polymorph { .. }]
      | [TypeElem::Pointer { .. }, TypeElem::PolymorphPrereq(_)]
    )
  }

  /// Whether this type is a lone generic base.
  #[must_use] pub fn is_generic_base(&self) -> bool {
    matches!(self.elements.as_slice(), [TypeElem::GenericBase(_)])
  }

  /// Whether this type is a pointer to a generic base.
  #[must_use] pub fn is_generic_base_ptr(&self) -> bool {
    matches!(self.elements.as_slice(), [TypeElem::Pointer { .. }, TypeElem::GenericBase(_)])
  }

  /// Whether this type starts with a fixed-array element.
  #[must_use] pub fn is_fixed_array(&self) -> bool {
    matches!(self.elements.first(), Some(TypeElem::FixedArray { .. }))
  }

  /// Whether this type is a lone function pointer.
  #[must_use] pub fn is_func(&self) -> bool {
    matches!(self.elements.as_slice(), [TypeElem::Func(_)])
  }

  /// Whether a polymorphic variable occurs anywhere in this type,
  /// descending into function pointers, generic bases and layout
  /// skeletons.
  #[must_use] pub fn has_polymorph(&self) -> bool {
    self.elements.iter().any(TypeElem::has_polymorph)
  }

  /// The base name of a base or generic-base type, or `None`.
  #[must_use] pub fn struct_name(&self) -> Option<&str> {
    match self.elements.as_slice() {
      [TypeElem::Base { name, .. }] => Some(name),
      [TypeElem::GenericBase(base)] => Some(&base.name),
      _ => None,
    }
  }

  /// A borrowed view of this pointer type with its head stripped, valid
  /// until the original is next modified. Returns `None` unless the type
  /// starts with a pointer element.
  #[must_use] pub fn dereferenced_view(&self) -> Option<&[TypeElem]> {
    match self.elements.first() {
      Some(TypeElem::Pointer { .. }) => Some(&self.elements[1..]),
      _ => None,
    }
  }

  /// A borrowed view of this type with its first element stripped,
  /// whatever it is.
  #[must_use] pub fn unwrapped_view(&self) -> &[TypeElem] {
    &self.elements[1..]
  }

  /// Remove the leading pointer element in place. Panics if the type is
  /// not a pointer; callers check first.
  pub fn dereference(&mut self) {
    match self.elements.first() {
      Some(TypeElem::Pointer { .. }) => { self.elements.remove(0); }
      _ => panic!("dereference() on non-pointer type {self}"),
    }
  }

  /// Remove the leading fixed-array element in place. Panics if the type
  /// is not a fixed array; callers check first.
  pub fn unwrap_fixed_array(&mut self) {
    match self.elements.first() {
      Some(TypeElem::FixedArray { .. }) => { self.elements.remove(0); }
      _ => panic!("unwrap_fixed_array() on non-fixed-array type {self}"),
    }
  }
}

impl fmt::Display for TypeElem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TypeElem::Base { name, .. } => write!(f, "{name}"),
      TypeElem::Pointer { .. } => write!(f, "*"),
      TypeElem::Array { .. } => write!(f, "[]"),
      TypeElem::FixedArray { length, .. } => write!(f, "{length} "),
      TypeElem::VarFixedArray { .. } => write!(f, "[...] "),
      TypeElem::GenericInt { .. } => write!(f, "long"),
      TypeElem::GenericFloat { .. } => write!(f, "double"),
      TypeElem::Func(func) => {
        if func.traits.contains(FuncTraits::STDCALL) { write!(f, "stdcall ")? }
        write!(f, "func({}", func.arg_types.iter().format(", "))?;
        if func.traits.contains(FuncTraits::VARARG) {
          write!(f, ", ...")?;
        } else if func.traits.contains(FuncTraits::VARIADIC) {
          write!(f, ", ..")?;
        }
        write!(f, ") {}", func.return_type)
      }
      TypeElem::Polymorph { name, allow_auto_conversion, .. } => {
        write!(f, "${}{name}", if *allow_auto_conversion { "~" } else { "" })
      }
      TypeElem::PolyCount { name, .. } => write!(f, "$#{name} "),
      TypeElem::PolymorphPrereq(prereq) => {
        write!(
          f,
          "${}{}~{}",
          if prereq.allow_auto_conversion { "~" } else { "" },
          prereq.name,
          prereq.similarity,
        )
      }
      TypeElem::GenericBase(base) => {
        write!(
          f,
          "<{}> {}{}",
          base.generics.iter().format(", "),
          if base.name_is_polymorphic { "$" } else { "" },
          base.name,
        )
      }
      TypeElem::Layout { layout, .. } => write!(f, "{layout}"),
    }
  }
}

impl fmt::Display for Type {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for elem in &self.elements { write!(f, "{elem}")? }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::hash::{DefaultHasher, Hash, Hasher};

  fn hash_of(ty: &Type) -> u64 {
    let mut hasher = DefaultHasher::new();
    ty.hash(&mut hasher);
    hasher.finish()
  }

  #[test]
  fn identity_is_reflexive_through_clone() {
    let ty = Type::base_ptr("ubyte").into_pointer();
    assert!(ty.identical(&ty.clone()));
  }

  #[test]
  fn usize_ulong_equivalence() {
    assert!(Type::base("usize").identical(&Type::base("ulong")));
    assert!(Type::base("ulong").identical(&Type::base("usize")));
    assert!(Type::base("bool").identical(&Type::base("successful")));
    assert!(!Type::base("usize").identical(&Type::base("bool")));
  }

  #[test]
  fn var_fixed_array_never_identical() {
    use crate::types::expr::{Expr, ExprKind};
    let length = Box::new(Expr { kind: ExprKind::GenericInt(4), source: Source::NONE });
    let ty = Type {
      elements: smallvec::smallvec![
        TypeElem::VarFixedArray { length, source: Source::NONE },
        TypeElem::Base { name: "int".into(), source: Source::NONE },
      ],
      source: Source::NONE,
    };
    assert!(!ty.identical(&ty.clone()));
  }

  #[test]
  fn identical_types_hash_equal() {
    let a = Type::base("usize");
    let b = Type::base("ulong");
    assert!(a.identical(&b));
    assert_eq!(hash_of(&a), hash_of(&b));
  }

  #[test]
  fn renders_round_trip_ish() {
    let double_ptr = Type::base_ptr("ubyte").into_pointer();
    assert_eq!(double_ptr.to_string(), "**ubyte");

    let fixed = Type {
      elements: smallvec::smallvec![
        TypeElem::FixedArray { length: 10, source: Source::NONE },
        TypeElem::Base { name: "int".into(), source: Source::NONE },
      ],
      source: Source::NONE,
    };
    assert_eq!(fixed.to_string(), "10 int");

    let func = Type {
      elements: smallvec::smallvec![TypeElem::Func(Box::new(FuncElem {
        arg_types: vec![Type::base("int"), Type::base("int")],
        return_type: Type::base("int"),
        traits: FuncTraits::STDCALL,
        source: Source::NONE,
      }))],
      source: Source::NONE,
    };
    assert_eq!(func.to_string(), "stdcall func(int, int) int");

    let poly = Type {
      elements: smallvec::smallvec![TypeElem::Polymorph {
        name: "T".into(),
        allow_auto_conversion: true,
        source: Source::NONE,
      }],
      source: Source::NONE,
    };
    assert_eq!(poly.to_string(), "$~T");
  }

  #[test]
  fn dereference_views_and_in_place() {
    let mut ty = Type::base_ptr("int");
    let view = ty.dereferenced_view().expect("pointer type");
    assert!(elems_identical(view, &Type::base("int").elements));

    ty.dereference();
    assert!(ty.is_base_of("int"));
    assert!(ty.dereferenced_view().is_none());
  }

  #[test]
  fn predicates() {
    assert!(Type::void(Source::NONE).is_void());
    assert!(Type::base_ptr("Player").is_base_ptr());
    assert!(Type::base_ptr("Player").is_pointer_to(&Type::base("Player")));
    assert!(Type::polymorph("T").is_polymorph());
    assert!(Type::polymorph("T").into_pointer().is_polymorph_ptr());
    assert!(Type::polymorph("T").has_polymorph());
    assert!(!Type::base("int").has_polymorph());
    assert_eq!(Type::base("Player").struct_name(), Some("Player"));
    assert_eq!(Type::base_ptr("Player").struct_name(), None);
  }
}
