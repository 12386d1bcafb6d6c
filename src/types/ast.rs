//! The AST container and its top-level items: functions, composites,
//! globals, aliases, enums, named expressions, and the polymorphic-item
//! indices.
//!
//! The container is acyclic by construction. Cross-references between
//! items (a composite's parent class, a function's virtual origin or
//! dispatcher) go through names and [`FuncId`]s, never back-pointers.

use std::fmt;

use bitflags::bitflags;

use super::expr::{Expr, ExprKind, ExprList};
use super::layout::{Endpoint, Layout, Path};
use super::meta::MetaDefinition;
use super::ty::{Type, TypeElem};
use super::{FuncId, Source};

/// Hard cap on the number of functions in one AST; ids are 32-bit.
pub const MAX_FUNCS: usize = u32::MAX as usize;

bitflags! {
  /// Function trait bits.
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
  pub struct FuncTraits: u32 {
    /// Declared `foreign`; no body, C ABI.
    const FOREIGN = 1;
    /// C-style `...` variadic.
    const VARARG = 1 << 1;
    /// The program entry point.
    const MAIN = 1 << 2;
    /// `stdcall` calling convention.
    const STDCALL = 1 << 3;
    /// The signature contains polymorphic variables.
    const POLYMORPHIC = 1 << 4;
    /// Synthesized by the compiler rather than written by the user.
    const GENERATED = 1 << 5;
    /// The `__defer__` management method.
    const DEFER = 1 << 6;
    /// The `__pass__` management function.
    const PASS = 1 << 7;
    /// Auto-generated management plumbing.
    const AUTOGEN = 1 << 8;
    /// Named-list `..` variadic.
    const VARIADIC = 1 << 9;
    /// Declared `implicit`; eligible for implicit calls.
    const IMPLICIT = 1 << 10;
    /// The Windows entry point.
    const WINMAIN = 1 << 11;
    /// The result must not be discarded.
    const NO_DISCARD = 1 << 12;
    /// Calling this function is an error; exists to produce diagnostics.
    const DISALLOW = 1 << 13;
    /// Declared `virtual`; has a vtable slot.
    const VIRTUAL = 1 << 14;
    /// Declared `override`; fills a parent's vtable slot.
    const OVERRIDE = 1 << 15;
    /// An override that is actually referenced by a dispatcher.
    const USED_OVERRIDE = 1 << 16;
    /// Never offered in did-you-mean suggestions.
    const NO_SUGGEST = 1 << 17;
    /// A generated virtual dispatcher.
    const DISPATCHER = 1 << 18;
    /// A class constructor.
    const CLASS_CONSTRUCTOR = 1 << 19;
    /// Arguments are checked against a printf-style format string.
    const WARN_BAD_PRINTF_FORMAT = 1 << 20;
    /// Runs before `main`.
    const INIT = 1 << 21;
    /// Runs after `main`.
    const DEINIT = 1 << 22;
  }
}

bitflags! {
  /// Parameter type trait bits.
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
  pub struct ParamTraits: u8 {
    /// Plain-old-data: the argument bypasses `__pass__` management.
    const POD = 1;
  }
}

bitflags! {
  /// Global variable trait bits.
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
  pub struct GlobalTraits: u32 {
    /// Plain-old-data; no management functions run.
    const POD = 1;
    /// Declared `external`; storage lives elsewhere.
    const EXTERNAL = 1 << 1;
    /// One instance per thread.
    const THREAD_LOCAL = 1 << 2;
    /// Reserved for the runtime type table; one of the sub-traits below
    /// says which slot.
    const SPECIAL = 1 << 3;
    /// The `__types__` table. Sub-trait of `SPECIAL`.
    const TYPES_ARRAY = 1 << 4;
    /// The `__types_length__` count. Sub-trait of `SPECIAL`.
    const TYPES_LENGTH = 1 << 5;
    /// The `__type_kinds__` table. Sub-trait of `SPECIAL`.
    const TYPE_KINDS_ARRAY = 1 << 6;
    /// The `__type_kinds_length__` count. Sub-trait of `SPECIAL`.
    const TYPE_KINDS_LENGTH = 1 << 7;
  }
}

bitflags! {
  /// Trait bits shared by aliases and named expressions.
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
  pub struct ItemTraits: u8 {
    /// Synthesized by the compiler rather than written by the user.
    const GENERATED = 1;
  }
}

/// A parameter's data-flow annotation. Affects semantic analysis only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Flow {
  /// Value flows into the function.
  #[default]
  In,
  /// Value flows out of the function.
  Out,
  /// Value flows both ways.
  InOut,
}

/// One function parameter.
#[derive(Clone, Debug)]
pub struct Param {
  /// The parameter name.
  pub name: String,
  /// The declared type.
  pub ty: Type,
  /// Where the parameter was written.
  pub source: Source,
  /// The data-flow annotation.
  pub flow: Flow,
  /// Type trait bits (`POD`).
  pub traits: ParamTraits,
  /// Default argument value, if any.
  pub default: Option<Expr>,
}

/// The named variadic tail of a `..`-variadic function.
#[derive(Clone, Debug)]
pub struct VariadicParam {
  /// Name the variadic list binds to.
  pub name: String,
  /// Where the tail was written.
  pub source: Source,
}

/// A function's role in virtual dispatch. Downstream passes write at most
/// one of the two ids; the `VIRTUAL`/`DISPATCHER`/`OVERRIDE` traits remain
/// the bits they key on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VirtualRole {
  /// Not part of virtual dispatch.
  #[default]
  None,
  /// The virtual function this override descends from.
  Origin(FuncId),
  /// The generated dispatcher that routes to this function.
  Dispatcher(FuncId),
}

/// A function within the root AST.
#[derive(Clone, Debug)]
pub struct Func {
  /// The function name.
  pub name: String,
  /// Parameters in order.
  pub params: Vec<Param>,
  /// The named variadic tail, if the function is `..`-variadic.
  pub variadic: Option<VariadicParam>,
  /// The return type.
  pub return_type: Type,
  /// Trait bits.
  pub traits: FuncTraits,
  /// The body.
  pub statements: ExprList,
  /// Where the head was written.
  pub source: Source,
  /// Export symbol name, if any.
  pub export_as: Option<String>,
  /// How many instantiations deep this copy was produced.
  pub instantiation_depth: u32,
  /// Virtual-dispatch cross reference.
  pub virtual_role: VirtualRole,
}

impl Func {
  /// Number of parameters.
  #[must_use] pub fn arity(&self) -> usize { self.params.len() }

  /// Whether this function is method-like: its first parameter is named
  /// `this`.
  #[must_use] pub fn is_method(&self) -> bool {
    self.params.first().is_some_and(|param| param.name == "this")
  }

  /// The typename of the subject of a method, i.e. the base the `this`
  /// pointer points at. Assumes [`Func::is_method`]; returns `None` if the
  /// subject type is not compatible.
  #[must_use] pub fn method_subject_typename(&self) -> Option<&str> {
    match self.params.first()?.ty.elements.as_slice() {
      [TypeElem::Pointer { .. }, TypeElem::Base { name, .. }] => Some(name),
      [TypeElem::Pointer { .. }, TypeElem::GenericBase(base)] => Some(&base.name),
      _ => None,
    }
  }

  /// Whether the signature contains polymorphic variables.
  #[must_use] pub fn has_polymorphic_signature(&self) -> bool {
    self.return_type.has_polymorph()
      || self.params.iter().any(|param| param.ty.has_polymorph())
  }

  /// The inside of the parentheses of this function's signature.
  #[must_use] pub fn args_string(&self) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    for (i, param) in self.params.iter().enumerate() {
      if i != 0 { out.push_str(", ") }
      match param.flow {
        Flow::In => {}
        Flow::Out => out.push_str("out "),
        Flow::InOut => out.push_str("inout "),
      }
      let _ = write!(out, "{} ", param.name);
      if param.traits.contains(ParamTraits::POD) { out.push_str("POD ") }
      let _ = write!(out, "{}", param.ty);
    }
    if let Some(variadic) = &self.variadic {
      if !self.params.is_empty() { out.push_str(", ") }
      let _ = write!(out, "{} ..", variadic.name);
    } else if self.traits.contains(FuncTraits::VARARG) {
      if !self.params.is_empty() { out.push_str(", ") }
      out.push_str("...");
    }
    out
  }

  /// The displayable head of this function's signature.
  #[must_use] pub fn head_string(&self) -> String {
    format!("func {}({}) {}", self.name, self.args_string(), self.return_type)
  }
}

/// A function redirection within the root AST.
#[derive(Clone, Debug)]
pub struct FuncAlias {
  /// The alias name.
  pub from: String,
  /// The destination function name.
  pub to: String,
  /// If present, only destinations with exactly these argument types
  /// match.
  pub arg_types: Option<Vec<Type>>,
  /// Traits a destination must carry.
  pub required_traits: FuncTraits,
  /// Fall back to the first function of the destination name.
  pub match_first_of_name: bool,
  /// Where the alias was written.
  pub source: Source,
}

/// A structure/union within the root AST.
#[derive(Clone, Debug)]
pub struct Composite {
  /// The composite name.
  pub name: String,
  /// The field layout.
  pub layout: Layout,
  /// Where the composite was written.
  pub source: Source,
  /// The parent class type, if any.
  pub parent: Option<Type>,
  /// Whether the composite has generic parameters.
  pub is_polymorphic: bool,
  /// Whether the composite is a class.
  pub is_class: bool,
  /// Whether a constructor has been declared or synthesized.
  pub has_constructor: bool,
}

impl Composite {
  /// Find a field by name, yielding its endpoint and derived access path.
  #[must_use] pub fn find_field(&self, name: &str) -> Option<(Endpoint, Path)> {
    let endpoint = self.layout.field_map.find(name)?.clone();
    let path = self.layout.get_path(&endpoint)?;
    Some((endpoint, path))
  }
}

/// A polymorphic composite: a composite plus its generic parameter names.
#[derive(Clone, Debug)]
pub struct PolyComposite {
  /// The shared composite fields.
  pub composite: Composite,
  /// Generic parameter names in order.
  pub generics: Vec<String>,
}

/// A type alias within the root AST.
#[derive(Clone, Debug)]
pub struct TypeAlias {
  /// The alias name.
  pub name: String,
  /// The aliased type.
  pub ty: Type,
  /// Trait bits.
  pub traits: ItemTraits,
  /// Where the alias was written.
  pub source: Source,
}

/// A global variable within the root AST.
#[derive(Clone, Debug)]
pub struct Global {
  /// The global name.
  pub name: String,
  /// The declared type.
  pub ty: Type,
  /// The initial value, if any.
  pub initial: Option<Expr>,
  /// Trait bits.
  pub traits: GlobalTraits,
  /// Where the global was written.
  pub source: Source,
}

/// An enum declaration.
#[derive(Clone, Debug)]
pub struct Enum {
  /// The enum name.
  pub name: String,
  /// Kind names in declaration order.
  pub kinds: Vec<String>,
  /// Where the enum was written.
  pub source: Source,
}

impl Enum {
  /// Find the index of a kind by name.
  #[must_use] pub fn find_kind(&self, kind_name: &str) -> Option<usize> {
    self.kinds.iter().position(|kind| kind == kind_name)
  }

  /// Whether a kind with the given name exists.
  #[must_use] pub fn contains(&self, kind_name: &str) -> bool {
    self.find_kind(kind_name).is_some()
  }
}

/// A named compile-time expression (`define name = value`).
#[derive(Clone, Debug)]
pub struct NamedExpression {
  /// The constant name.
  pub name: String,
  /// The owned expression.
  pub value: Expr,
  /// Trait bits.
  pub traits: ItemTraits,
  /// Where the definition was written.
  pub source: Source,
}

/// An entry in the polymorphic-function or polymorphic-method index.
#[derive(Clone, Debug)]
pub struct PolyFunc {
  /// The function name; groups share a name.
  pub name: String,
  /// The function the entry refers to.
  pub func_id: FuncId,
}

/// How a foreign library is linked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LibraryKind {
  /// An ordinary library.
  Library,
  /// A macOS framework.
  Framework,
}

impl fmt::Display for LibraryKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LibraryKind::Library => write!(f, "library"),
      LibraryKind::Framework => write!(f, "framework"),
    }
  }
}

/// A foreign library reference.
#[derive(Clone, Debug)]
pub struct Library {
  /// The library name or path.
  pub name: String,
  /// How it is linked.
  pub kind: LibraryKind,
}

/// Singleton types cached on the AST so later passes do not rebuild them.
#[derive(Clone, Debug)]
pub struct SharedCommon {
  /// The `int` type.
  pub int_type: Type,
  /// The `usize` type.
  pub usize_type: Type,
  /// The user-defined variadic-array type from `__variadic_array__`, with
  /// where it was established.
  pub variadic_array: Option<(Type, Source)>,
  /// The user-defined initializer-list type from `__initializer_list__`,
  /// with where it was established.
  pub initializer_list: Option<(Type, Source)>,
}

impl Default for SharedCommon {
  fn default() -> SharedCommon {
    SharedCommon {
      int_type: Type::base("int"),
      usize_type: Type::base("usize"),
      variadic_array: None,
      initializer_list: None,
    }
  }
}

/// The root AST for one translation unit.
#[derive(Clone, Debug, Default)]
pub struct Ast {
  /// Functions, addressed by [`FuncId`].
  pub funcs: Vec<Func>,
  /// Function redirections.
  pub func_aliases: Vec<FuncAlias>,
  /// Plain composites.
  pub composites: Vec<Composite>,
  /// Polymorphic composites.
  pub poly_composites: Vec<PolyComposite>,
  /// Type aliases, sorted by name after parsing.
  pub aliases: Vec<TypeAlias>,
  /// Globals, sorted by name after parsing.
  pub globals: Vec<Global>,
  /// Enums, sorted by name after parsing.
  pub enums: Vec<Enum>,
  /// Named expressions, kept sorted on insert.
  pub named_expressions: Vec<NamedExpression>,
  /// Meta definitions in definition order.
  pub meta_definitions: Vec<MetaDefinition>,
  /// Index of polymorphic functions, sorted by name after parsing.
  pub poly_funcs: Vec<PolyFunc>,
  /// Index of polymorphic methods, sorted by name after parsing.
  pub polymorphic_methods: Vec<PolyFunc>,
  /// Foreign libraries in declaration order.
  pub libraries: Vec<Library>,
  /// Cached singleton types.
  pub common: SharedCommon,
}

impl Ast {
  /// An empty AST with default common types. Runtime-type declarations are
  /// injected separately.
  #[must_use] pub fn new() -> Ast {
    Ast { common: SharedCommon::default(), ..Ast::default() }
  }

  /// Append a function and return its id. The caller checks [`MAX_FUNCS`]
  /// beforehand; ids are dense.
  pub fn add_func(&mut self, func: Func) -> FuncId {
    assert!(self.funcs.len() < MAX_FUNCS, "too many AST functions");
    #[allow(clippy::cast_possible_truncation)]
    let id = FuncId(self.funcs.len() as u32);
    self.funcs.push(func);
    id
  }

  /// The function with the given id.
  #[must_use] pub fn func(&self, id: FuncId) -> &Func {
    &self.funcs[id.into_usize()]
  }

  /// Add a type alias to the global scope.
  pub fn add_alias(&mut self, name: impl Into<String>, ty: Type, traits: ItemTraits, source: Source) {
    self.aliases.push(TypeAlias { name: name.into(), ty, traits, source });
  }

  /// Add an enum to the global scope.
  pub fn add_enum(&mut self, name: impl Into<String>, kinds: Vec<String>, source: Source) {
    self.enums.push(Enum { name: name.into(), kinds, source });
  }

  /// Add a global variable to the global scope.
  pub fn add_global(
    &mut self,
    name: impl Into<String>,
    ty: Type,
    initial: Option<Expr>,
    traits: GlobalTraits,
    source: Source,
  ) {
    self.globals.push(Global { name: name.into(), ty, initial, traits, source });
  }

  /// Insert a named expression, keeping the list sorted by name.
  pub fn add_named_expression(&mut self, named_expression: NamedExpression) {
    let at = self.named_expressions
      .partition_point(|existing| existing.name < named_expression.name);
    self.named_expressions.insert(at, named_expression);
  }

  /// Find a named expression by name. The list is kept sorted on insert.
  #[must_use] pub fn find_named_expression(&self, name: &str) -> Option<&NamedExpression> {
    let index = self.named_expressions
      .binary_search_by(|probe| probe.name.as_str().cmp(name))
      .ok()?;
    Some(&self.named_expressions[index])
  }

  /// Register a function in the polymorphic-function index.
  pub fn add_poly_func(&mut self, name: impl Into<String>, func_id: FuncId) {
    self.poly_funcs.push(PolyFunc { name: name.into(), func_id });
  }

  /// Register a method in the polymorphic-method index.
  pub fn add_polymorphic_method(&mut self, name: impl Into<String>, func_id: FuncId) {
    self.polymorphic_methods.push(PolyFunc { name: name.into(), func_id });
  }

  /// Add a composite to the global scope and return it for further setup.
  pub fn add_composite(
    &mut self,
    name: impl Into<String>,
    layout: Layout,
    source: Source,
    parent: Option<Type>,
    is_class: bool,
  ) -> &mut Composite {
    self.composites.push(Composite {
      name: name.into(),
      layout,
      source,
      parent,
      is_polymorphic: false,
      is_class,
      has_constructor: false,
    });
    self.composites.last_mut().expect("just pushed")
  }

  /// Add a polymorphic composite to the global scope and return it for
  /// further setup.
  pub fn add_poly_composite(
    &mut self,
    name: impl Into<String>,
    layout: Layout,
    source: Source,
    parent: Option<Type>,
    is_class: bool,
    generics: Vec<String>,
  ) -> &mut PolyComposite {
    self.poly_composites.push(PolyComposite {
      composite: Composite {
        name: name.into(),
        layout,
        source,
        parent,
        is_polymorphic: true,
        is_class,
        has_constructor: false,
      },
      generics,
    });
    self.poly_composites.last_mut().expect("just pushed")
  }

  /// Record a foreign library.
  pub fn add_foreign_library(&mut self, name: impl Into<String>, kind: LibraryKind) {
    self.libraries.push(Library { name: name.into(), kind });
  }

  /// Find a plain composite by its exact name.
  #[must_use] pub fn composite_find_exact(&self, name: &str) -> Option<&Composite> {
    self.composites.iter().find(|composite| composite.name == name)
  }

  /// Find a polymorphic composite by its exact name.
  #[must_use] pub fn poly_composite_find_exact(&self, name: &str) -> Option<&PolyComposite> {
    self.poly_composites.iter().find(|poly| poly.composite.name == name)
  }

  /// Find the composite (plain or polymorphic) a base-like type names.
  #[must_use] pub fn find_composite(&self, ty: &Type) -> Option<&Composite> {
    match ty.elements.as_slice() {
      [TypeElem::Base { name, .. }] => self.composite_find_exact(name),
      [TypeElem::GenericBase(base)] =>
        self.poly_composite_find_exact(&base.name).map(|poly| &poly.composite),
      _ => None,
    }
  }

  /// Find a type alias by name. Requires [`Ast::sort`] to have run.
  #[must_use] pub fn find_alias(&self, name: &str) -> Option<&TypeAlias> {
    let index = self.aliases
      .binary_search_by(|probe| probe.name.as_str().cmp(name))
      .ok()?;
    Some(&self.aliases[index])
  }

  /// Find an enum by name. Requires [`Ast::sort`] to have run.
  #[must_use] pub fn find_enum(&self, name: &str) -> Option<&Enum> {
    let index = self.enums
      .binary_search_by(|probe| probe.name.as_str().cmp(name))
      .ok()?;
    Some(&self.enums[index])
  }

  /// Find a global by name. Requires [`Ast::sort`] to have run.
  #[must_use] pub fn find_global(&self, name: &str) -> Option<&Global> {
    let index = self.globals
      .binary_search_by(|probe| probe.name.as_str().cmp(name))
      .ok()?;
    Some(&self.globals[index])
  }

  /// Sort the lookup collections. The parser calls this once after the
  /// token stream is exhausted; lookups by binary search assume it ran.
  pub fn sort(&mut self) {
    self.aliases.sort_by(|a, b| a.name.cmp(&b.name));
    self.enums.sort_by(|a, b| a.name.cmp(&b.name));
    self.globals.sort_by(|a, b| a.name.cmp(&b.name));
    self.poly_funcs.sort_by(|a, b| a.name.cmp(&b.name));
    self.polymorphic_methods.sort_by(|a, b| a.name.cmp(&b.name));
  }

  /// Whether it is possible to execute the whole body of a function and
  /// still not have returned.
  #[must_use] pub fn func_end_is_reachable(&self, id: FuncId) -> bool {
    end_is_reachable(&self.func(id).statements, 0, 20)
  }
}

fn end_is_reachable(statements: &ExprList, depth: u32, max_depth: u32) -> bool {
  if depth > max_depth { return true }

  for statement in statements {
    match &statement.kind {
      ExprKind::Return { .. } => return false,
      ExprKind::IfElse(conditional) | ExprKind::UnlessElse(conditional) => {
        if !end_is_reachable(&conditional.statements, depth + 1, max_depth)
          && !end_is_reachable(&conditional.else_statements, depth + 1, max_depth)
        {
          return false;
        }
      }
      _ => {}
    }
  }

  true
}

#[cfg(test)]
mod tests {
  use super::*;

  fn minimal_func(name: &str) -> Func {
    Func {
      name: name.into(),
      params: Vec::new(),
      variadic: None,
      return_type: Type::void(Source::NONE),
      traits: FuncTraits::empty(),
      statements: Vec::new(),
      source: Source::NONE,
      export_as: None,
      instantiation_depth: 0,
      virtual_role: VirtualRole::None,
    }
  }

  #[test]
  fn func_ids_are_dense() {
    let mut ast = Ast::new();
    assert_eq!(ast.add_func(minimal_func("a")), FuncId(0));
    assert_eq!(ast.add_func(minimal_func("b")), FuncId(1));
    assert_eq!(ast.func(FuncId(1)).name, "b");
  }

  #[test]
  fn method_detection_and_subject() {
    let mut func = minimal_func("to_string");
    func.params.push(Param {
      name: "this".into(),
      ty: Type::base_ptr("Player"),
      source: Source::NONE,
      flow: Flow::In,
      traits: ParamTraits::empty(),
      default: None,
    });
    assert!(func.is_method());
    assert_eq!(func.method_subject_typename(), Some("Player"));
    assert_eq!(func.head_string(), "func to_string(this *Player) void");
  }

  #[test]
  fn sorted_lookups() {
    let mut ast = Ast::new();
    ast.add_enum("Color", vec!["RED".into(), "GREEN".into()], Source::NONE);
    ast.add_enum("Animal", vec!["CAT".into()], Source::NONE);
    ast.add_global("score", Type::base("int"), None, GlobalTraits::empty(), Source::NONE);
    ast.sort();

    let color = ast.find_enum("Color").expect("present");
    assert_eq!(color.find_kind("GREEN"), Some(1));
    assert!(color.contains("RED"));
    assert!(!color.contains("BLUE"));
    assert!(ast.find_enum("Mineral").is_none());
    assert!(ast.find_global("score").is_some());
  }

  #[test]
  fn named_expressions_sorted_on_insert() {
    let mut ast = Ast::new();
    for name in ["zeta", "alpha", "mid"] {
      ast.add_named_expression(NamedExpression {
        name: name.into(),
        value: Expr::new(ExprKind::GenericInt(1), Source::NONE),
        traits: ItemTraits::empty(),
        source: Source::NONE,
      });
    }
    let names: Vec<&str> =
      ast.named_expressions.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, ["alpha", "mid", "zeta"]);
    assert!(ast.find_named_expression("mid").is_some());
  }

  #[test]
  fn reachability() {
    let mut ast = Ast::new();
    let mut func = minimal_func("f");
    func.statements.push(Expr::new(
      ExprKind::Return { value: None, last_minute: Vec::new() },
      Source::NONE,
    ));
    let returning = ast.add_func(func);
    let empty = ast.add_func(minimal_func("g"));

    assert!(!ast.func_end_is_reachable(returning));
    assert!(ast.func_end_is_reachable(empty));
  }
}
