//! Runtime-type declaration injection.
//!
//! On AST initialization the front end synthesizes the declarations that
//! back reflection, so user code can reference `Any`, `AnyType`, and the
//! type tables before the IR builder fills them with real data.

use crate::types::ast::{Ast, GlobalTraits, ItemTraits};
use crate::types::layout::Layout;
use crate::types::ty::Type;
use crate::types::Source;

/// Names for each `AnyTypeKind` variant, in kind order.
pub const ANY_TYPE_KIND_NAMES: &[&str] = &[
  "void", "bool", "byte", "ubyte", "short", "ushort", "int", "uint",
  "long", "ulong", "float", "double", "pointer", "struct", "union",
  "function-pointer", "fixed-array",
];

fn base_ptr_ptr(name: &str) -> Type {
  Type::base_ptr(name).into_pointer()
}

fn struct_fields(names: &[&str], types: Vec<Type>) -> Layout {
  Layout::with_struct_fields(
    names.iter().map(|name| (*name).to_string()),
    types,
  )
}

/// Inject every reflection-backing declaration into an AST.
pub fn inject(ast: &mut Ast) {
  inject_any(ast);
  inject_any_type(ast);
  inject_any_type_kind(ast);

  inject_any_ptr_type(ast);
  inject_any_composite_type(ast);
  inject_any_struct_type(ast);
  inject_any_union_type(ast);
  inject_any_func_ptr_type(ast);
  inject_any_fixed_array_type(ast);
  inject_any_enum_type(ast);

  inject_type_tables(ast);
}

fn inject_any(ast: &mut Ast) {
  // struct Any (type *AnyType, placeholder ulong)
  let layout = struct_fields(
    &["type", "placeholder"],
    vec![Type::base_ptr("AnyType"), Type::base("ulong")],
  );
  ast.add_composite("Any", layout, Source::NONE, None, false);
}

fn inject_any_type(ast: &mut Ast) {
  // struct AnyType (kind AnyTypeKind, name *ubyte, is_alias bool, size usize)
  let layout = struct_fields(
    &["kind", "name", "is_alias", "size"],
    vec![
      Type::base("AnyTypeKind"),
      Type::base_ptr("ubyte"),
      Type::base("bool"),
      Type::base("usize"),
    ],
  );
  ast.add_composite("AnyType", layout, Source::NONE, None, false);
}

fn inject_any_type_kind(ast: &mut Ast) {
  // enum AnyTypeKind (VOID, BOOL, ..., FIXED_ARRAY)
  let kinds = vec![
    "VOID".to_string(), "BOOL".to_string(), "BYTE".to_string(), "UBYTE".to_string(),
    "SHORT".to_string(), "USHORT".to_string(), "INT".to_string(), "UINT".to_string(),
    "LONG".to_string(), "ULONG".to_string(), "FLOAT".to_string(), "DOUBLE".to_string(),
    "PTR".to_string(), "STRUCT".to_string(), "UNION".to_string(),
    "FUNC_PTR".to_string(), "FIXED_ARRAY".to_string(),
  ];
  ast.add_enum("AnyTypeKind", kinds, Source::NONE);
}

fn inject_any_ptr_type(ast: &mut Ast) {
  // struct AnyPtrType (kind AnyTypeKind, name *ubyte, is_alias bool,
  //                    size usize, subtype *AnyType)
  let layout = struct_fields(
    &["kind", "name", "is_alias", "size", "subtype"],
    vec![
      Type::base("AnyTypeKind"),
      Type::base_ptr("ubyte"),
      Type::base("bool"),
      Type::base("usize"),
      Type::base_ptr("AnyType"),
    ],
  );
  ast.add_composite("AnyPtrType", layout, Source::NONE, None, false);
}

fn inject_any_composite_type(ast: &mut Ast) {
  // struct AnyCompositeType (kind AnyTypeKind, name *ubyte, is_alias bool,
  //   size usize, members **AnyType, length usize, offsets *usize,
  //   member_names **ubyte, is_packed bool)
  let layout = struct_fields(
    &["kind", "name", "is_alias", "size", "members", "length", "offsets", "member_names", "is_packed"],
    vec![
      Type::base("AnyTypeKind"),
      Type::base_ptr("ubyte"),
      Type::base("bool"),
      Type::base("usize"),
      base_ptr_ptr("AnyType"),
      Type::base("usize"),
      Type::base_ptr("usize"),
      base_ptr_ptr("ubyte"),
      Type::base("bool"),
    ],
  );
  ast.add_composite("AnyCompositeType", layout, Source::NONE, None, false);
}

fn inject_any_struct_type(ast: &mut Ast) {
  // Kept as an alias of the composite form; the 'kind' field still says
  // STRUCT.
  ast.add_alias(
    "AnyStructType",
    Type::base("AnyCompositeType"),
    ItemTraits::GENERATED,
    Source::NONE,
  );
}

fn inject_any_union_type(ast: &mut Ast) {
  ast.add_alias(
    "AnyUnionType",
    Type::base("AnyCompositeType"),
    ItemTraits::GENERATED,
    Source::NONE,
  );
}

fn inject_any_func_ptr_type(ast: &mut Ast) {
  // struct AnyFuncPtrType (kind AnyTypeKind, name *ubyte, is_alias bool,
  //   size usize, args **AnyType, length usize, return_type *AnyType,
  //   is_vararg bool, is_stdcall bool)
  let layout = struct_fields(
    &["kind", "name", "is_alias", "size", "args", "length", "return_type", "is_vararg", "is_stdcall"],
    vec![
      Type::base("AnyTypeKind"),
      Type::base_ptr("ubyte"),
      Type::base("bool"),
      Type::base("usize"),
      base_ptr_ptr("AnyType"),
      Type::base("usize"),
      Type::base_ptr("AnyType"),
      Type::base("bool"),
      Type::base("bool"),
    ],
  );
  ast.add_composite("AnyFuncPtrType", layout, Source::NONE, None, false);
}

fn inject_any_fixed_array_type(ast: &mut Ast) {
  // struct AnyFixedArrayType (kind AnyTypeKind, name *ubyte, is_alias bool,
  //   size usize, subtype *AnyType, length usize)
  let layout = struct_fields(
    &["kind", "name", "is_alias", "size", "subtype", "length"],
    vec![
      Type::base("AnyTypeKind"),
      Type::base_ptr("ubyte"),
      Type::base("bool"),
      Type::base("usize"),
      Type::base_ptr("AnyType"),
      Type::base("usize"),
    ],
  );
  ast.add_composite("AnyFixedArrayType", layout, Source::NONE, None, false);
}

fn inject_any_enum_type(ast: &mut Ast) {
  // struct AnyEnumType (kind AnyTypeKind, name *ubyte, is_alias bool,
  //   size usize, members **ubyte, length usize)
  let layout = struct_fields(
    &["kind", "name", "is_alias", "size", "members", "length"],
    vec![
      Type::base("AnyTypeKind"),
      Type::base_ptr("ubyte"),
      Type::base("bool"),
      Type::base("usize"),
      base_ptr_ptr("ubyte"),
      Type::base("usize"),
    ],
  );
  ast.add_composite("AnyEnumType", layout, Source::NONE, None, false);
}

fn inject_type_tables(ast: &mut Ast) {
  // __types__ **AnyType
  ast.add_global(
    "__types__",
    base_ptr_ptr("AnyType"),
    None,
    GlobalTraits::SPECIAL | GlobalTraits::TYPES_ARRAY,
    Source::NONE,
  );

  // __types_length__ usize
  ast.add_global(
    "__types_length__",
    Type::base("usize"),
    None,
    GlobalTraits::SPECIAL | GlobalTraits::TYPES_LENGTH,
    Source::NONE,
  );

  // __type_kinds__ **ubyte
  ast.add_global(
    "__type_kinds__",
    base_ptr_ptr("ubyte"),
    None,
    GlobalTraits::SPECIAL | GlobalTraits::TYPE_KINDS_ARRAY,
    Source::NONE,
  );

  // __type_kinds_length__ usize
  ast.add_global(
    "__type_kinds_length__",
    Type::base("usize"),
    None,
    GlobalTraits::SPECIAL | GlobalTraits::TYPE_KINDS_LENGTH,
    Source::NONE,
  );
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn injects_reflection_declarations() {
    let mut ast = Ast::new();
    inject(&mut ast);

    let any = ast.composite_find_exact("Any").expect("Any injected");
    assert!(any.layout.is_simple_struct());
    assert_eq!(any.layout.field_map.count(), 2);
    assert!(any.layout.find_field("placeholder").is_some());

    assert!(ast.composite_find_exact("AnyCompositeType").is_some());
    assert!(ast.composite_find_exact("AnyEnumType").is_some());

    ast.sort();
    let kind_enum = ast.find_enum("AnyTypeKind").expect("enum injected");
    assert_eq!(kind_enum.kinds.len(), 17);
    assert_eq!(kind_enum.find_kind("VOID"), Some(0));
    assert_eq!(kind_enum.find_kind("FIXED_ARRAY"), Some(16));

    let aliases: Vec<&str> = ast.aliases.iter().map(|a| a.name.as_str()).collect();
    assert!(aliases.contains(&"AnyStructType"));
    assert!(aliases.contains(&"AnyUnionType"));

    let types_global = ast.find_global("__types__").expect("global injected");
    assert!(types_global.traits.contains(GlobalTraits::SPECIAL | GlobalTraits::TYPES_ARRAY));
    assert_eq!(types_global.ty.to_string(), "**AnyType");
    assert!(ast.find_global("__type_kinds_length__").is_some());
  }
}
