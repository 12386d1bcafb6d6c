//! The expression model.
//!
//! Expressions and statements share one tagged tree: a statement list is an
//! [`ExprList`] whose entries use the statement-shaped variants. Every node
//! carries a source location; children are owned exclusively, so cloning
//! and dropping both walk the tree.

use super::ast::NamedExpression;
use super::ty::Type;
use super::Source;

use bitflags::bitflags;

/// An owned list of expressions or statements.
pub type ExprList = Vec<Expr>;

/// One expression or statement node.
#[derive(Clone, Debug)]
pub struct Expr {
  /// The discriminant and payload.
  pub kind: ExprKind,
  /// Where the node came from.
  pub source: Source,
}

impl Expr {
  /// Construct a node.
  #[must_use] pub fn new(kind: ExprKind, source: Source) -> Expr {
    Expr { kind, source }
  }

  /// Whether this expression is mutable-addressable: a variable, member,
  /// dereference, array access, mutable phantom, a ternary whose branches
  /// are both mutable, or a post-step applied to a mutable operand.
  #[must_use] pub fn is_mutable(&self) -> bool {
    match &self.kind {
      ExprKind::Variable(_)
      | ExprKind::Member { .. }
      | ExprKind::Dereference(_)
      | ExprKind::ArrayAccess { .. } => true,
      ExprKind::Ternary { if_true, if_false, .. } =>
        if_true.is_mutable() && if_false.is_mutable(),
      ExprKind::PostIncrement(value) | ExprKind::PostDecrement(value) =>
        value.is_mutable(),
      ExprKind::Phantom(phantom) => phantom.is_mutable,
      _ => false,
    }
  }

  /// Deduce the compile-time non-negative length this expression evaluates
  /// to, folding integer literals through `add`/`sub`/`mul`/`div`/`mod`.
  /// Negative signed literals clamp to zero. Returns `None` for any
  /// non-arithmetic operand, overflow, or division by zero.
  #[must_use] pub fn deduce_size(&self) -> Option<usize> {
    #[allow(clippy::cast_sign_loss)]
    fn clamp(value: i64) -> usize {
      if value < 0 { 0 } else { value as usize }
    }

    match &self.kind {
      ExprKind::Byte(v) => Some(clamp(i64::from(*v))),
      ExprKind::Ubyte(v) => Some(*v as usize),
      ExprKind::Short(v) => Some(clamp(i64::from(*v))),
      ExprKind::Ushort(v) => Some(*v as usize),
      ExprKind::Int(v) => Some(clamp(i64::from(*v))),
      ExprKind::Uint(v) => Some(*v as usize),
      ExprKind::Long(v) | ExprKind::GenericInt(v) => Some(clamp(*v)),
      ExprKind::Ulong(v) | ExprKind::Usize(v) => usize::try_from(*v).ok(),
      ExprKind::Binary { op, left, right } => {
        let a = left.deduce_size()?;
        let b = right.deduce_size()?;
        match op {
          BinaryOp::Add => a.checked_add(b),
          BinaryOp::Subtract => a.checked_sub(b),
          BinaryOp::Multiply => a.checked_mul(b),
          BinaryOp::Divide => a.checked_div(b),
          BinaryOp::Modulus => a.checked_rem(b),
          _ => None,
        }
      }
      _ => None,
    }
  }
}

/// Binary operators, including the bitwise and short-circuit families.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
  /// `+`
  Add,
  /// `-`
  Subtract,
  /// `*`
  Multiply,
  /// `/`
  Divide,
  /// `%`
  Modulus,
  /// `==`
  Equals,
  /// `!=`
  NotEquals,
  /// `>`
  Greater,
  /// `<`
  Lesser,
  /// `>=`
  GreaterEq,
  /// `<=`
  LesserEq,
  /// `and` / `&&`
  And,
  /// `or` / `||`
  Or,
  /// `&`
  BitAnd,
  /// `|`
  BitOr,
  /// `^`
  BitXor,
  /// `<<`
  BitLshift,
  /// `>>`
  BitRshift,
  /// `<<<`
  BitLgcLshift,
  /// `>>>`
  BitLgcRshift,
}

/// The assignment family: plain `=` plus the compound forms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignKind {
  /// `=`
  Plain,
  /// `+=`
  Add,
  /// `-=`
  Subtract,
  /// `*=`
  Multiply,
  /// `/=`
  Divide,
  /// `%=`
  Modulus,
  /// `&=`
  BitAnd,
  /// `|=`
  BitOr,
  /// `^=`
  BitXor,
  /// `<<=`
  BitLshift,
  /// `>>=`
  BitRshift,
  /// `<<<=`
  BitLgcLshift,
  /// `>>>=`
  BitLgcRshift,
}

impl AssignKind {
  /// The binary operator a compound assignment applies before storing, or
  /// `None` for plain assignment.
  #[must_use] pub fn binary_op(self) -> Option<BinaryOp> {
    match self {
      AssignKind::Plain => None,
      AssignKind::Add => Some(BinaryOp::Add),
      AssignKind::Subtract => Some(BinaryOp::Subtract),
      AssignKind::Multiply => Some(BinaryOp::Multiply),
      AssignKind::Divide => Some(BinaryOp::Divide),
      AssignKind::Modulus => Some(BinaryOp::Modulus),
      AssignKind::BitAnd => Some(BinaryOp::BitAnd),
      AssignKind::BitOr => Some(BinaryOp::BitOr),
      AssignKind::BitXor => Some(BinaryOp::BitXor),
      AssignKind::BitLshift => Some(BinaryOp::BitLshift),
      AssignKind::BitRshift => Some(BinaryOp::BitRshift),
      AssignKind::BitLgcLshift => Some(BinaryOp::BitLgcLshift),
      AssignKind::BitLgcRshift => Some(BinaryOp::BitLgcRshift),
    }
  }
}

/// Whether a static literal is array- or struct-shaped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StaticKind {
  /// `static Type { ... }`
  Array,
  /// `static Type ( ... )`
  Struct,
}

bitflags! {
  /// Modifier bits on a declaration statement.
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
  pub struct DeclareTraits: u8 {
    /// Plain-old-data: skip management functions for the variable itself.
    const POD = 1;
    /// Assignment of the initial value skips `__assign__`.
    const ASSIGN_POD = 1 << 1;
    /// `const` declaration.
    const CONST = 1 << 2;
    /// `static` declaration.
    const STATIC = 1 << 3;
  }
}

/// Payload of [`ExprKind::Call`].
#[derive(Clone, Debug)]
pub struct CallExpr {
  /// The callee name.
  pub name: String,
  /// Arguments in order.
  pub args: ExprList,
  /// `name?(...)` calls are allowed to match nothing.
  pub is_tentative: bool,
  /// Explicit return type ascription, `call(...) ~> Type`.
  pub gives: Option<Type>,
  /// Set on statement-position calls so later passes can warn when a
  /// no-discard result is dropped.
  pub no_discard: bool,
}

/// Payload of [`ExprKind::MethodCall`].
#[derive(Clone, Debug)]
pub struct MethodCallExpr {
  /// The method name.
  pub name: String,
  /// The subject the method is invoked on.
  pub subject: Box<Expr>,
  /// Arguments in order, not counting the subject.
  pub args: ExprList,
  /// `subject.name?(...)` calls are allowed to match nothing.
  pub is_tentative: bool,
  /// Explicit return type ascription.
  pub gives: Option<Type>,
  /// Set on statement-position calls so later passes can warn when a
  /// no-discard result is dropped.
  pub no_discard: bool,
}

/// Payload of [`ExprKind::SuperCall`].
#[derive(Clone, Debug)]
pub struct SuperExpr {
  /// Arguments to the parent class constructor.
  pub args: ExprList,
  /// Whether the call may match nothing.
  pub is_tentative: bool,
}

/// Payload of [`ExprKind::New`].
#[derive(Clone, Debug)]
pub struct NewExpr {
  /// The type to allocate.
  pub ty: Type,
  /// Element count for `new Type * count`.
  pub amount: Option<Box<Expr>>,
  /// Constructor inputs for `new Type (args...)`.
  pub inputs: Option<ExprList>,
  /// `new undef Type` skips zero-initialization.
  pub is_undef: bool,
}

/// Payload of [`ExprKind::StaticData`].
#[derive(Clone, Debug)]
pub struct StaticDataExpr {
  /// Array- or struct-shaped.
  pub kind: StaticKind,
  /// The element or composite type.
  pub ty: Type,
  /// The member values.
  pub values: ExprList,
}

/// Payload of [`ExprKind::FuncAddr`].
#[derive(Clone, Debug)]
pub struct FuncAddrExpr {
  /// Name of the function whose address is taken.
  pub name: String,
  /// If present, only functions with exactly these argument types match.
  pub match_args: Option<Vec<Type>>,
  /// Whether failure to match is tolerated.
  pub tentative: bool,
}

/// Payload of [`ExprKind::InlineAsm`].
#[derive(Clone, Debug)]
pub struct InlineAsmExpr {
  /// The assembly template.
  pub assembly: String,
  /// The constraint string.
  pub constraints: String,
  /// Expression operands.
  pub args: ExprList,
  /// Whether the assembly has side effects.
  pub has_side_effects: bool,
  /// Whether the stack must be aligned around the assembly.
  pub is_stack_align: bool,
  /// Intel rather than AT&T syntax.
  pub is_intel: bool,
}

/// Payload of [`ExprKind::Phantom`]: an expression injected by a later
/// pass carrying an already-lowered value. The handle is opaque to the
/// front end.
#[derive(Clone, Debug)]
pub struct PhantomExpr {
  /// The type of the carried value.
  pub ty: Type,
  /// Opaque handle meaningful to the IR builder.
  pub handle: u64,
  /// Whether the carried value is addressable.
  pub is_mutable: bool,
}

/// Payload of [`ExprKind::Declare`].
#[derive(Clone, Debug)]
pub struct DeclareStmt {
  /// The variable name.
  pub name: String,
  /// The declared type.
  pub ty: Type,
  /// The initial value, if any.
  pub value: Option<Box<Expr>>,
  /// Constructor-style inputs, `Name Type(args...)`.
  pub inputs: Option<ExprList>,
  /// Modifier bits.
  pub traits: DeclareTraits,
  /// Declared with `= undef`.
  pub is_undef: bool,
  /// An inline declaration usable as a value expression (`def x int`).
  pub is_inline: bool,
}

/// Payload of [`ExprKind::Assign`].
#[derive(Clone, Debug)]
pub struct AssignStmt {
  /// Which assignment operator.
  pub kind: AssignKind,
  /// The place assigned to.
  pub destination: Box<Expr>,
  /// The value stored.
  pub value: Box<Expr>,
  /// Whether `__assign__` management is skipped.
  pub is_pod: bool,
}

/// Payload of the simple conditionals and loops
/// ([`ExprKind::If`], [`ExprKind::Unless`], [`ExprKind::While`],
/// [`ExprKind::Until`]).
#[derive(Clone, Debug)]
pub struct ConditionalStmt {
  /// Loop label, if any.
  pub label: Option<String>,
  /// The condition value.
  pub condition: Box<Expr>,
  /// The body.
  pub statements: ExprList,
}

/// Payload of [`ExprKind::IfElse`] and [`ExprKind::UnlessElse`].
#[derive(Clone, Debug)]
pub struct IfElseStmt {
  /// Label, if any.
  pub label: Option<String>,
  /// The condition value.
  pub condition: Box<Expr>,
  /// The then-branch body.
  pub statements: ExprList,
  /// The else-branch body.
  pub else_statements: ExprList,
}

/// Payload of [`ExprKind::WhileContinue`] and [`ExprKind::UntilBreak`]:
/// loops that run until an explicit `continue`/`break`.
#[derive(Clone, Debug)]
pub struct LoopAlwaysStmt {
  /// Loop label, if any.
  pub label: Option<String>,
  /// The body.
  pub statements: ExprList,
}

/// Payload of [`ExprKind::EachIn`].
#[derive(Clone, Debug)]
pub struct EachInStmt {
  /// Loop label, if any.
  pub label: Option<String>,
  /// Override name for the `it` variable.
  pub it_name: Option<String>,
  /// Declared element type.
  pub it_type: Type,
  /// For the `[array, length]` form: the array expression.
  pub low_array: Option<Box<Expr>>,
  /// For the `[array, length]` form: the length expression.
  pub length: Option<Box<Expr>>,
  /// For the list form: the iterated list value.
  pub list: Option<Box<Expr>>,
  /// The body.
  pub statements: ExprList,
  /// Whether `idx` persists across iterations of an enclosing loop.
  pub is_static: bool,
}

/// Payload of [`ExprKind::Repeat`].
#[derive(Clone, Debug)]
pub struct RepeatStmt {
  /// Loop label, if any.
  pub label: Option<String>,
  /// Number of iterations.
  pub limit: Box<Expr>,
  /// The body.
  pub statements: ExprList,
  /// Whether `idx` persists across iterations of an enclosing loop.
  pub is_static: bool,
  /// Override name for the `idx` variable (`using name`).
  pub idx_name: Option<String>,
}

/// One case of a switch statement.
#[derive(Clone, Debug)]
pub struct Case {
  /// The matched value.
  pub condition: Expr,
  /// The case body.
  pub statements: ExprList,
  /// Where the case begins.
  pub source: Source,
}

/// Payload of [`ExprKind::Switch`].
#[derive(Clone, Debug)]
pub struct SwitchStmt {
  /// The scrutinee.
  pub value: Box<Expr>,
  /// The cases in order.
  pub cases: Vec<Case>,
  /// Statements of the `default` arm; empty when absent.
  pub default_statements: ExprList,
  /// Whether every enum kind must be covered.
  pub is_exhaustive: bool,
}

/// Payload of [`ExprKind::For`].
#[derive(Clone, Debug)]
pub struct ForStmt {
  /// Loop label, if any.
  pub label: Option<String>,
  /// Statements run once before the loop.
  pub before: ExprList,
  /// The condition, if any.
  pub condition: Option<Box<Expr>>,
  /// Statements run after each iteration.
  pub after: ExprList,
  /// The body.
  pub statements: ExprList,
}

/// Payload of [`ExprKind::Assert`].
#[derive(Clone, Debug)]
pub struct AssertStmt {
  /// The asserted condition.
  pub assertion: Box<Expr>,
  /// Optional failure message value.
  pub message: Option<Box<Expr>>,
}

/// The shared expression/statement taxonomy.
#[derive(Clone, Debug)]
pub enum ExprKind {
  // Literals. Integer and float literals carry the fixed width chosen at
  // parse time.
  /// `13sb`
  Byte(i8),
  /// `13ub`
  Ubyte(u8),
  /// `13ss`
  Short(i16),
  /// `13us`
  Ushort(u16),
  /// `13si`
  Int(i32),
  /// `13ui`
  Uint(u32),
  /// `13sl`
  Long(i64),
  /// `13ul`
  Ulong(u64),
  /// `13uz`
  Usize(u64),
  /// An untyped integer literal awaiting inference.
  GenericInt(i64),
  /// `13.0f`
  Float(f32),
  /// `13.0d`
  Double(f64),
  /// An untyped float literal awaiting inference.
  GenericFloat(f64),
  /// `true` / `false`
  Boolean(bool),
  /// A string literal.
  Str(String),
  /// A C-string literal.
  CStr(String),
  /// `null`
  Null,

  /// A variable reference.
  Variable(String),
  /// `EnumName::KIND`
  EnumValue {
    /// The enum name.
    enum_name: String,
    /// The kind name.
    kind: String,
  },
  /// `::KIND` with the enum inferred from context.
  GenericEnumValue(String),

  /// `value.member`
  Member {
    /// The accessed value.
    value: Box<Expr>,
    /// The member name.
    member: String,
  },
  /// `value[index]`
  ArrayAccess {
    /// The indexed value.
    value: Box<Expr>,
    /// The element index.
    index: Box<Expr>,
  },
  /// `value at index`, pointer arithmetic access.
  At {
    /// The pointer value.
    value: Box<Expr>,
    /// The element index.
    index: Box<Expr>,
  },

  /// A function call.
  Call(Box<CallExpr>),
  /// A parent-class constructor call, `super(...)`.
  SuperCall(Box<SuperExpr>),
  /// A method call, `subject.name(...)`.
  MethodCall(Box<MethodCallExpr>),

  /// `cast Type (value)` or `value as Type`.
  Cast {
    /// The target type.
    to: Type,
    /// The converted value.
    value: Box<Expr>,
  },
  /// `sizeof Type`
  Sizeof(Type),
  /// `sizeof (value)`
  SizeofValue(Box<Expr>),
  /// `alignof Type`
  Alignof(Type),
  /// `typeinfo Type`
  Typeinfo(Type),
  /// `typenameof Type`
  Typenameof(Type),

  /// `&value`
  Address(Box<Expr>),
  /// `func &name(...)` function address.
  FuncAddr(Box<FuncAddrExpr>),
  /// `*value`
  Dereference(Box<Expr>),
  /// `~value`
  BitComplement(Box<Expr>),
  /// `!value`
  Not(Box<Expr>),
  /// `-value`
  Negate(Box<Expr>),
  /// A binary operation.
  Binary {
    /// The operator.
    op: BinaryOp,
    /// Left operand.
    left: Box<Expr>,
    /// Right operand.
    right: Box<Expr>,
  },
  /// `++value`
  PreIncrement(Box<Expr>),
  /// `--value`
  PreDecrement(Box<Expr>),
  /// `value++`
  PostIncrement(Box<Expr>),
  /// `value--`
  PostDecrement(Box<Expr>),
  /// `value!!`, boolean toggle of a mutable place.
  Toggle(Box<Expr>),
  /// `condition ? if_true : if_false`
  Ternary {
    /// The condition.
    condition: Box<Expr>,
    /// Value when true.
    if_true: Box<Expr>,
    /// Value when false.
    if_false: Box<Expr>,
  },

  /// Heap allocation.
  New(Box<NewExpr>),
  /// `new "literal"`, heap-allocated C-string.
  NewCstring(String),
  /// `delete value`
  Delete(Box<Expr>),
  /// `static Type (...)` / `static Type { ... }`
  StaticData(Box<StaticDataExpr>),
  /// `{ v1, v2, ... }`
  InitializerList(ExprList),
  /// `$#N` polymorphic count reference; rewritten to a `usize` literal
  /// during polymorph resolution.
  PolyCount {
    /// The count variable name.
    name: String,
  },
  /// Inline assembly.
  InlineAsm(Box<InlineAsmExpr>),
  /// `embed "path"`, file contents captured by the downstream layer.
  Embed(String),
  /// `va_arg(list, Type)`
  VaArg {
    /// The variadic list value.
    list: Box<Expr>,
    /// The extracted type.
    ty: Type,
  },
  /// An already-lowered value injected by a later pass.
  Phantom(Box<PhantomExpr>),

  // Statement-shaped variants.
  /// `return value?` with deferred statements to run first.
  Return {
    /// The returned value, if any.
    value: Option<Box<Expr>>,
    /// Deferred statements unwound at this return.
    last_minute: ExprList,
  },
  /// A declaration.
  Declare(Box<DeclareStmt>),
  /// An assignment.
  Assign(Box<AssignStmt>),
  /// `if cond { ... }`
  If(Box<ConditionalStmt>),
  /// `unless cond { ... }`
  Unless(Box<ConditionalStmt>),
  /// `while cond { ... }`
  While(Box<ConditionalStmt>),
  /// `until cond { ... }`
  Until(Box<ConditionalStmt>),
  /// `if cond { ... } else { ... }`
  IfElse(Box<IfElseStmt>),
  /// `unless cond { ... } else { ... }`
  UnlessElse(Box<IfElseStmt>),
  /// `while continue { ... }`
  WhileContinue(Box<LoopAlwaysStmt>),
  /// `until break { ... }`
  UntilBreak(Box<LoopAlwaysStmt>),
  /// `each Type in ...`
  EachIn(Box<EachInStmt>),
  /// `repeat limit { ... }`
  Repeat(Box<RepeatStmt>),
  /// `switch value { case ... }`
  Switch(Box<SwitchStmt>),
  /// C-style `for` with before/condition/after blocks.
  For(Box<ForStmt>),
  /// A conditionless block with its own scope.
  Block(ExprList),
  /// `break`
  Break,
  /// `continue`
  Continue,
  /// `fallthrough`
  FallThrough,
  /// `break label`
  BreakTo {
    /// The target label.
    label: String,
  },
  /// `continue label`
  ContinueTo {
    /// The target label.
    label: String,
  },
  /// `va_start value`
  VaStart(Box<Expr>),
  /// `va_end value`
  VaEnd(Box<Expr>),
  /// `va_copy (dest, src)`
  VaCopy {
    /// Destination list.
    dest: Box<Expr>,
    /// Source list.
    src: Box<Expr>,
  },
  /// `assert condition [, message]`
  Assert(Box<AssertStmt>),
  /// A named-expression constant declared inside a function body.
  DeclareNamedExpression(Box<NamedExpression>),
}

#[cfg(test)]
mod tests {
  use super::*;

  fn expr(kind: ExprKind) -> Expr {
    Expr::new(kind, Source::NONE)
  }

  fn binary(op: BinaryOp, left: ExprKind, right: ExprKind) -> Expr {
    expr(ExprKind::Binary {
      op,
      left: Box::new(expr(left)),
      right: Box::new(expr(right)),
    })
  }

  #[test]
  fn size_deduction_folds_arithmetic() {
    assert_eq!(
      binary(BinaryOp::Add, ExprKind::GenericInt(8), ExprKind::GenericInt(4)).deduce_size(),
      Some(12),
    );
    assert_eq!(
      binary(BinaryOp::Multiply, ExprKind::GenericInt(8), ExprKind::GenericInt(4)).deduce_size(),
      Some(32),
    );
    assert_eq!(
      binary(BinaryOp::Divide, ExprKind::GenericInt(8), ExprKind::GenericInt(0)).deduce_size(),
      None,
    );
  }

  #[test]
  fn size_deduction_clamps_negative_literals() {
    assert_eq!(expr(ExprKind::Int(-3)).deduce_size(), Some(0));
    assert_eq!(expr(ExprKind::GenericInt(-1)).deduce_size(), Some(0));
    assert_eq!(expr(ExprKind::Ubyte(200)).deduce_size(), Some(200));
  }

  #[test]
  fn size_deduction_rejects_non_arithmetic() {
    assert_eq!(expr(ExprKind::Str("hm".into())).deduce_size(), None);
    assert_eq!(
      binary(BinaryOp::BitAnd, ExprKind::GenericInt(1), ExprKind::GenericInt(1)).deduce_size(),
      None,
    );
  }

  #[test]
  fn mutability() {
    let variable = expr(ExprKind::Variable("x".into()));
    assert!(variable.is_mutable());
    assert!(expr(ExprKind::PostIncrement(Box::new(variable.clone()))).is_mutable());
    assert!(!expr(ExprKind::GenericInt(7)).is_mutable());

    let ternary = expr(ExprKind::Ternary {
      condition: Box::new(expr(ExprKind::Boolean(true))),
      if_true: Box::new(variable.clone()),
      if_false: Box::new(expr(ExprKind::GenericInt(0))),
    });
    assert!(!ternary.is_mutable());
  }

  #[test]
  fn assignment_operator_decoding() {
    assert_eq!(AssignKind::Plain.binary_op(), None);
    assert_eq!(AssignKind::Add.binary_op(), Some(BinaryOp::Add));
    assert_eq!(AssignKind::BitLgcRshift.binary_op(), Some(BinaryOp::BitLgcRshift));
  }

  #[test]
  fn clone_walks_the_tree() {
    let tree = binary(
      BinaryOp::Add,
      ExprKind::GenericInt(1),
      ExprKind::Binary {
        op: BinaryOp::Multiply,
        left: Box::new(expr(ExprKind::GenericInt(2))),
        right: Box::new(expr(ExprKind::GenericInt(3))),
      },
    );
    let copy = tree.clone();
    drop(tree);
    assert_eq!(copy.deduce_size(), Some(7));
  }
}
