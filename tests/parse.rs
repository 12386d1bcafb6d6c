//! End-to-end parser tests driving hand-built token lists through the
//! public entry point.

use vesperc::token::{Token, TokenKind, TokenList};
use vesperc::types::ast::{Ast, FuncTraits, GlobalTraits};
use vesperc::types::expr::{BinaryOp, Expr, ExprKind};
use vesperc::types::layout::Endpoint;
use vesperc::types::Source;
use vesperc::Compiler;

fn tokens(kinds: Vec<TokenKind>) -> TokenList {
  TokenList::new(
    kinds.into_iter()
      .enumerate()
      .map(|(i, kind)| Token { kind, source: Source::at(0, i as u32, 1) })
      .collect(),
  )
}

fn parse(kinds: Vec<TokenKind>) -> Ast {
  let mut compiler = Compiler::new();
  vesperc::parse(&mut compiler, tokens(kinds), 0).expect("parses cleanly")
}

fn parse_error(kinds: Vec<TokenKind>) -> String {
  let mut compiler = Compiler::new();
  match vesperc::parse(&mut compiler, tokens(kinds), 0) {
    Ok(_) => panic!("expected a parse error"),
    Err(error) => error.message,
  }
}

fn word(text: &str) -> TokenKind {
  TokenKind::Word(text.to_string())
}

// `func <name>() void { <body tokens> }`
fn void_func(name: &str, body: Vec<TokenKind>) -> Vec<TokenKind> {
  let mut kinds = vec![
    TokenKind::Func,
    word(name),
    TokenKind::Open,
    TokenKind::Close,
    TokenKind::Begin,
    TokenKind::Newline,
  ];
  kinds.extend(body);
  kinds.extend([TokenKind::End, TokenKind::Newline]);
  kinds
}

fn call_name(expr: &Expr) -> &str {
  match &expr.kind {
    ExprKind::Call(call) => &call.name,
    other => panic!("expected call, got {other:?}"),
  }
}

#[test]
fn defer_statements_unwind_in_reverse_order() {
  let ast = parse(void_func("f", vec![
    TokenKind::Defer, word("print"), TokenKind::Open,
    TokenKind::Str("A".into()), TokenKind::Close, TokenKind::Newline,
    TokenKind::Defer, word("print"), TokenKind::Open,
    TokenKind::Str("B".into()), TokenKind::Close, TokenKind::Newline,
    TokenKind::Return, TokenKind::Newline,
  ]));

  let func = &ast.funcs[0];
  assert_eq!(func.statements.len(), 1);

  let ExprKind::Return { value, last_minute } = &func.statements[0].kind else {
    panic!("expected return statement");
  };
  assert!(value.is_none());
  assert_eq!(last_minute.len(), 2);

  // LIFO: the second defer runs first.
  let first_arg = |expr: &Expr| match &expr.kind {
    ExprKind::Call(call) => match &call.args[0].kind {
      ExprKind::Str(text) => text.clone(),
      other => panic!("expected string argument, got {other:?}"),
    },
    other => panic!("expected call, got {other:?}"),
  };
  assert_eq!(first_arg(&last_minute[0]), "B");
  assert_eq!(first_arg(&last_minute[1]), "A");
}

#[test]
fn break_rewinds_deferred_cleanup() {
  let ast = parse(void_func("f", vec![
    TokenKind::While, TokenKind::True, TokenKind::Begin, TokenKind::Newline,
    TokenKind::Defer, word("cleanup"), TokenKind::Open, TokenKind::Close, TokenKind::Newline,
    TokenKind::Break, TokenKind::Newline,
    TokenKind::End, TokenKind::Newline,
  ]));

  let func = &ast.funcs[0];
  let ExprKind::While(while_stmt) = &func.statements[0].kind else {
    panic!("expected while loop");
  };

  assert_eq!(while_stmt.statements.len(), 2);
  assert_eq!(call_name(&while_stmt.statements[0]), "cleanup");
  assert!(matches!(while_stmt.statements[1].kind, ExprKind::Break));
}

#[test]
fn record_constructor_is_synthesized() {
  let ast = parse(vec![
    TokenKind::Record, word("Pair"), TokenKind::Open,
    word("first"), TokenKind::Next, word("second"), word("int"),
    TokenKind::Close, TokenKind::Newline,
  ]);

  assert!(ast.composite_find_exact("Pair").is_some());

  let constructor = ast.funcs.iter().find(|func| func.name == "Pair")
    .expect("constructor synthesized");
  assert_eq!(constructor.arity(), 2);
  assert_eq!(constructor.params[0].name, "first");
  assert_eq!(constructor.params[1].name, "second");
  assert!(constructor.params.iter().all(|param| {
    param.ty.is_base_of("int")
      && param.traits.contains(vesperc::types::ast::ParamTraits::POD)
  }));
  assert!(constructor.return_type.is_base_of("Pair"));
  assert!(constructor.traits.contains(FuncTraits::GENERATED));

  // Body: declare '$', one assignment per field, return '$'.
  assert_eq!(constructor.statements.len(), 4);

  let ExprKind::Declare(declare) = &constructor.statements[0].kind else {
    panic!("expected declaration of the master value");
  };
  assert_eq!(declare.name, "$");
  assert!(declare.is_undef, "all-primitive records skip zero-initialization");

  let ExprKind::Assign(assign) = &constructor.statements[1].kind else {
    panic!("expected field assignment");
  };
  let ExprKind::Member { member, .. } = &assign.destination.kind else {
    panic!("expected member destination");
  };
  assert_eq!(member, "first");

  let ExprKind::Return { value: Some(value), .. } = &constructor.statements[3].kind else {
    panic!("expected return of the master value");
  };
  assert!(matches!(&value.kind, ExprKind::Variable(name) if name == "$"));
}

#[test]
fn struct_integration_flattens_fields() {
  let mut kinds = vec![
    TokenKind::Struct, word("A"), TokenKind::Open,
    word("x"), word("int"), TokenKind::Next, word("y"), word("int"),
    TokenKind::Close, TokenKind::Newline,
  ];
  kinds.extend(vec![
    TokenKind::Struct, word("B"), TokenKind::Open,
    TokenKind::Struct, word("A"), TokenKind::Next, word("z"), word("int"),
    TokenKind::Close, TokenKind::Newline,
  ]);

  let ast = parse(kinds);
  let b = ast.composite_find_exact("B").expect("B parsed");

  for (field, index) in [("x", 0u16), ("y", 1), ("z", 2)] {
    let endpoint = b.layout.field_map.find(field).expect("field integrated");
    assert_eq!(endpoint, &Endpoint::from_indices(&[index]).expect("one index"));
  }
  assert!(b.layout.is_simple_struct());
}

#[test]
fn precedence_climbing() {
  let ast = parse(void_func("f", vec![
    word("x"), TokenKind::Assign,
    TokenKind::GenericInt(1), TokenKind::Add,
    TokenKind::GenericInt(2), TokenKind::Multiply, TokenKind::GenericInt(3),
    TokenKind::Newline,
  ]));

  let ExprKind::Assign(assign) = &ast.funcs[0].statements[0].kind else {
    panic!("expected assignment");
  };
  let ExprKind::Binary { op: BinaryOp::Add, left, right } = &assign.value.kind else {
    panic!("expected addition at the top");
  };
  assert!(matches!(left.kind, ExprKind::GenericInt(1)));
  let ExprKind::Binary { op: BinaryOp::Multiply, left, right } = &right.kind else {
    panic!("expected multiplication under addition");
  };
  assert!(matches!(left.kind, ExprKind::GenericInt(2)));
  assert!(matches!(right.kind, ExprKind::GenericInt(3)));
}

#[test]
fn comparison_binds_tighter_than_and() {
  let ast = parse(void_func("f", vec![
    word("r"), TokenKind::Assign,
    word("a"), TokenKind::Equals, word("b"),
    TokenKind::And,
    word("c"), TokenKind::Equals, word("d"),
    TokenKind::Newline,
  ]));

  let ExprKind::Assign(assign) = &ast.funcs[0].statements[0].kind else {
    panic!("expected assignment");
  };
  let ExprKind::Binary { op: BinaryOp::And, left, right } = &assign.value.kind else {
    panic!("expected 'and' at the top");
  };
  assert!(matches!(left.kind, ExprKind::Binary { op: BinaryOp::Equals, .. }));
  assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Equals, .. }));
}

#[test]
fn ternary_condition_is_preserved() {
  let ast = parse(void_func("f", vec![
    word("r"), TokenKind::Assign,
    word("cond"), TokenKind::Maybe, word("x"), TokenKind::Colon, word("y"),
    TokenKind::Newline,
  ]));

  let ExprKind::Assign(assign) = &ast.funcs[0].statements[0].kind else {
    panic!("expected assignment");
  };
  let ExprKind::Ternary { condition, if_true, if_false } = &assign.value.kind else {
    panic!("expected ternary");
  };
  assert!(matches!(&condition.kind, ExprKind::Variable(name) if name == "cond"));
  assert!(matches!(&if_true.kind, ExprKind::Variable(name) if name == "x"));
  assert!(matches!(&if_false.kind, ExprKind::Variable(name) if name == "y"));
}

#[test]
fn globals_aliases_and_enums() {
  let mut kinds = vec![
    word("buffer"), TokenKind::Multiply, TokenKind::Multiply, word("ubyte"),
    TokenKind::Newline,
  ];
  kinds.extend(vec![
    TokenKind::Alias, word("MyInt"), TokenKind::Assign, word("int"),
    TokenKind::Newline,
  ]);
  kinds.extend(vec![
    TokenKind::Enum, word("Color"), TokenKind::Open,
    word("RED"), TokenKind::Next, word("GREEN"), TokenKind::Close,
    TokenKind::Newline,
  ]);

  let ast = parse(kinds);

  let global = ast.find_global("buffer").expect("global parsed");
  assert_eq!(global.ty.to_string(), "**ubyte");
  assert!(!global.traits.contains(GlobalTraits::EXTERNAL));

  let alias = ast.find_alias("MyInt").expect("alias parsed");
  assert!(alias.ty.is_base_of("int"));

  let color = ast.find_enum("Color").expect("enum parsed");
  assert_eq!(color.kinds, ["RED", "GREEN"]);
}

#[test]
fn function_pointer_type_round_trips() {
  let ast = parse(vec![
    word("callback"), TokenKind::Func, TokenKind::Open,
    word("int"), TokenKind::Next, word("int"), TokenKind::Close, word("int"),
    TokenKind::Newline,
  ]);

  let global = ast.find_global("callback").expect("global parsed");
  assert_eq!(global.ty.to_string(), "func(int, int) int");
}

#[test]
fn polymorphic_functions_are_indexed() {
  let ast = parse(void_func_with_params());

  let func = &ast.funcs[0];
  assert!(func.traits.contains(FuncTraits::POLYMORPHIC));
  assert_eq!(ast.poly_funcs.len(), 1);
  assert_eq!(ast.poly_funcs[0].name, "swap");
  assert!(ast.polymorphic_methods.is_empty());
}

// `func swap(a, b $T) void {}`
fn void_func_with_params() -> Vec<TokenKind> {
  vec![
    TokenKind::Func, word("swap"), TokenKind::Open,
    word("a"), TokenKind::Next,
    word("b"), TokenKind::Polymorph("T".into()),
    TokenKind::Close, word("void"), TokenKind::Begin, TokenKind::End,
    TokenKind::Newline,
  ]
}

#[test]
fn class_constructor_synthesis_and_vtable() {
  let ast = parse(vec![
    TokenKind::Class, word("Person"), TokenKind::Begin, TokenKind::Newline,
    TokenKind::Constructor, TokenKind::Open,
    word("age"), word("int"), TokenKind::Close,
    TokenKind::Begin, TokenKind::End, TokenKind::Newline,
    TokenKind::End, TokenKind::Newline,
  ]);

  let person = ast.composite_find_exact("Person").expect("class parsed");
  assert!(person.is_class);
  assert!(person.has_constructor);
  assert!(person.layout.field_map.find("__vtable__").is_some());

  // The subject-ful constructor plus the synthesized subject-less one.
  let constructor = ast.funcs.iter().find(|f| f.name == "__constructor__")
    .expect("subject-ful constructor");
  assert!(constructor.is_method());
  assert_eq!(constructor.method_subject_typename(), Some("Person"));
  assert!(constructor.traits.contains(FuncTraits::CLASS_CONSTRUCTOR));

  let value_constructor = ast.funcs.iter().find(|f| f.name == "Person")
    .expect("subject-less constructor");
  assert_eq!(value_constructor.arity(), 1);
  assert_eq!(value_constructor.params[0].name, "age");
  assert!(value_constructor.return_type.is_base_of("Person"));
}

#[test]
fn methods_in_struct_domain_get_this() {
  let ast = parse(vec![
    TokenKind::Struct, word("Player"), TokenKind::Open,
    word("x"), word("int"), TokenKind::Close, TokenKind::Newline,
    TokenKind::Begin, TokenKind::Newline,
    TokenKind::Func, word("getX"), TokenKind::Open, TokenKind::Close, word("int"),
    TokenKind::Assign, TokenKind::GenericInt(0), TokenKind::Newline,
    TokenKind::End, TokenKind::Newline,
  ]);

  let method = ast.funcs.iter().find(|f| f.name == "getX").expect("method parsed");
  assert!(method.is_method());
  assert_eq!(method.method_subject_typename(), Some("Player"));
  assert_eq!(method.head_string(), "func getX(this *Player) int");
}

#[test]
fn meta_definitions_feed_get_expressions() {
  let mut kinds = vec![
    TokenKind::Meta("set".into()), word("VERSION"),
    TokenKind::GenericInt(2), TokenKind::Add, TokenKind::GenericInt(3),
    TokenKind::Newline,
  ];
  kinds.extend(vec![
    TokenKind::Define, word("v"), TokenKind::Assign,
    TokenKind::Meta("get".into()), word("VERSION"),
    TokenKind::Newline,
  ]);

  let ast = parse(kinds);

  let named = ast.find_named_expression("v").expect("definition parsed");
  assert!(matches!(named.value.kind, ExprKind::Long(5)));
}

#[test]
fn switch_with_cases_and_default() {
  let ast = parse(void_func("f", vec![
    TokenKind::Switch, word("x"), TokenKind::Begin, TokenKind::Newline,
    TokenKind::Case, TokenKind::GenericInt(1), TokenKind::Newline,
    word("go"), TokenKind::Open, TokenKind::Close, TokenKind::Newline,
    TokenKind::Default, TokenKind::Newline,
    word("stop"), TokenKind::Open, TokenKind::Close, TokenKind::Newline,
    TokenKind::End, TokenKind::Newline,
  ]));

  let ExprKind::Switch(switch) = &ast.funcs[0].statements[0].kind else {
    panic!("expected switch");
  };
  assert_eq!(switch.cases.len(), 1);
  assert!(!switch.is_exhaustive);
  assert_eq!(switch.cases[0].statements.len(), 1);
  assert_eq!(call_name(&switch.cases[0].statements[0]), "go");
  assert_eq!(switch.default_statements.len(), 1);
  assert_eq!(call_name(&switch.default_statements[0]), "stop");
}

#[test]
fn each_in_over_low_array() {
  let ast = parse(void_func("f", vec![
    TokenKind::Each, word("int"), TokenKind::In,
    TokenKind::BracketOpen, word("arr"), TokenKind::Next, word("n"), TokenKind::BracketClose,
    TokenKind::Begin, TokenKind::End, TokenKind::Newline,
  ]));

  let ExprKind::EachIn(each) = &ast.funcs[0].statements[0].kind else {
    panic!("expected each-in");
  };
  assert!(each.it_name.is_none());
  assert!(each.it_type.is_base_of("int"));
  assert!(each.low_array.is_some());
  assert!(each.length.is_some());
  assert!(each.list.is_none());
}

#[test]
fn textually_identical_composites_hash_equal() {
  use std::hash::{DefaultHasher, Hash, Hasher};

  let ast = parse(vec![
    TokenKind::Struct, word("P1"), TokenKind::Open,
    word("x"), word("int"), TokenKind::Next, word("y"), word("float"),
    TokenKind::Close, TokenKind::Newline,
    TokenKind::Struct, word("P2"), TokenKind::Open,
    word("x"), word("int"), TokenKind::Next, word("y"), word("float"),
    TokenKind::Close, TokenKind::Newline,
  ]);

  let hash_of = |name: &str| {
    let mut hasher = DefaultHasher::new();
    ast.composite_find_exact(name).expect("parsed").layout.hash(&mut hasher);
    hasher.finish()
  };

  assert_eq!(hash_of("P1"), hash_of("P2"));
}

#[test]
fn rtti_declarations_are_injected() {
  let ast = parse(vec![TokenKind::Newline]);

  assert!(ast.composite_find_exact("Any").is_some());
  assert!(ast.composite_find_exact("AnyType").is_some());
  assert!(ast.find_global("__types__").is_some());
  assert!(ast.find_enum("AnyTypeKind").is_some());
}

#[test]
fn reserved_type_names_are_rejected() {
  let message = parse_error(vec![
    TokenKind::Struct, word("usize"), TokenKind::Open,
    word("x"), word("int"), TokenKind::Close, TokenKind::Newline,
  ]);
  assert!(message.contains("Reserved type name"));
}

#[test]
fn bad_defer_signature_is_rejected() {
  // __defer__ must be a method over *T returning void.
  let message = parse_error(vec![
    TokenKind::Func, word("__defer__"), TokenKind::Open,
    word("x"), word("int"), TokenKind::Close, word("void"),
    TokenKind::Begin, TokenKind::End, TokenKind::Newline,
  ]);
  assert!(message.contains("__defer__"));
}

#[test]
fn foreign_functions_take_bare_types() {
  let ast = parse(vec![
    TokenKind::Foreign, word("puts"), TokenKind::Open,
    TokenKind::Multiply, word("ubyte"), TokenKind::Close, word("int"),
    TokenKind::Newline,
  ]);

  let func = ast.funcs.iter().find(|f| f.name == "puts").expect("foreign parsed");
  assert!(func.traits.contains(FuncTraits::FOREIGN));
  assert_eq!(func.arity(), 1);
  assert_eq!(func.params[0].name, "");
  assert!(func.params[0].ty.is_base_ptr_of("ubyte"));
  assert!(func.statements.is_empty());
}

#[test]
fn foreign_libraries_are_recorded() {
  let ast = parse(vec![
    TokenKind::Foreign, TokenKind::Str("libcustom.a".into()), TokenKind::Newline,
  ]);

  assert_eq!(ast.libraries.len(), 1);
  assert_eq!(ast.libraries[0].name, "libcustom.a");
}
