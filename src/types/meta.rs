//! Meta expressions and their evaluator.
//!
//! Meta expressions are the compile-time values behind `#`-directives:
//! strings, integers, floats, booleans, `undef`, and operator trees over
//! them. Evaluation is a post-order fold with strict typing: each binary
//! operator picks its arithmetic from a 3x3 mode table keyed on the operand
//! modes. Addition is the only operator with string promotion; `pow` is
//! uniformly float, even for integer inputs.

use crate::error::{Panic, Result};
use crate::types::Source;

/// A compile-time meta expression. The literal variants (`Undef`, `Null`,
/// `True`, `False`, `Str`, `Int`, `Float`) are the *collapsed* forms;
/// everything else folds away during evaluation.
#[derive(Clone, Debug, PartialEq)]
pub enum MetaExpr {
  /// The undefined value. Coerces to false / zero / `"undef"`.
  Undef,
  /// The null value.
  Null,
  /// Boolean true.
  True,
  /// Boolean false.
  False,
  /// A string literal.
  Str(String),
  /// An integer literal.
  Int(i64),
  /// A float literal.
  Float(f64),
  /// A named variable, replaced by its definition (or `Undef`) on
  /// collapse.
  Var {
    /// The variable name.
    name: String,
    /// Where the variable was referenced.
    source: Source,
  },
  /// Boolean negation.
  Not(Box<MetaExpr>),
  /// A binary operation.
  Binary {
    /// The operator.
    op: MetaOp,
    /// Left operand.
    a: Box<MetaExpr>,
    /// Right operand.
    b: Box<MetaExpr>,
  },
}

/// Binary meta operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetaOp {
  /// Boolean and.
  And,
  /// Boolean or.
  Or,
  /// Boolean exclusive or.
  Xor,
  /// Addition; concatenation when the left operand is a string.
  Add,
  /// Subtraction.
  Sub,
  /// Multiplication.
  Mul,
  /// Division.
  Div,
  /// Remainder.
  Mod,
  /// Exponentiation; always float.
  Pow,
  /// Equality.
  Eq,
  /// Inequality.
  Neq,
  /// Greater than.
  Gt,
  /// Greater than or equal.
  Gte,
  /// Less than.
  Lt,
  /// Less than or equal.
  Lte,
}

/// A `(name, value)` pair established by `#set` or by the driver.
#[derive(Clone, Debug)]
pub struct MetaDefinition {
  /// The definition name.
  pub name: String,
  /// The (collapsed) value.
  pub value: MetaExpr,
}

impl MetaDefinition {
  /// Pair a name with a value.
  pub fn new(name: impl Into<String>, value: MetaExpr) -> MetaDefinition {
    MetaDefinition { name: name.into(), value }
  }
}

/// Find a definition by name. Definitions are an ordered list queried by
/// linear scan; later definitions shadow nothing (the first match wins).
#[must_use] pub fn find_definition<'a>(
  definitions: &'a [MetaDefinition],
  name: &str,
) -> Option<&'a MetaDefinition> {
  definitions.iter().find(|definition| definition.name == name)
}

/// Operand arithmetic modes for the binary operator tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
  Int = 0,
  Float = 1,
  Str = 2,
}

type ModeTable = [[Mode; 3]; 3];

// Tables are indexed [a_mode][b_mode].
const ADDITION_MODES: ModeTable = [
  [Mode::Int, Mode::Float, Mode::Int],
  [Mode::Float, Mode::Float, Mode::Float],
  [Mode::Str, Mode::Str, Mode::Str],
];

const TYPICAL_MODES: ModeTable = [
  [Mode::Int, Mode::Float, Mode::Int],
  [Mode::Float, Mode::Float, Mode::Float],
  [Mode::Int, Mode::Float, Mode::Float],
];

const POWER_MODES: ModeTable = [
  [Mode::Float, Mode::Float, Mode::Float],
  [Mode::Float, Mode::Float, Mode::Float],
  [Mode::Float, Mode::Float, Mode::Float],
];

const COMPARISON_MODES: ModeTable = [
  [Mode::Int, Mode::Float, Mode::Int],
  [Mode::Float, Mode::Float, Mode::Float],
  [Mode::Int, Mode::Float, Mode::Str],
];

fn mode_of(expr: &MetaExpr) -> Mode {
  match expr {
    MetaExpr::Float(_) => Mode::Float,
    MetaExpr::Str(_) => Mode::Str,
    _ => Mode::Int,
  }
}

impl MetaExpr {
  /// Whether this expression is already in canonical literal form.
  #[must_use] pub fn is_collapsed(&self) -> bool {
    matches!(
      self,
      MetaExpr::Undef | MetaExpr::Null | MetaExpr::True | MetaExpr::False
      | MetaExpr::Str(_) | MetaExpr::Int(_) | MetaExpr::Float(_)
    )
  }

  /// The display string of a collapsed expression: `undef`/`true`/`false`
  /// as symbols, integers in decimal, floats with six decimals.
  ///
  /// Panics on a non-collapsed expression; callers collapse first.
  #[must_use] pub fn literal_string(&self) -> String {
    match self {
      MetaExpr::Undef | MetaExpr::Null => "undef".to_string(),
      MetaExpr::True => "true".to_string(),
      MetaExpr::False => "false".to_string(),
      MetaExpr::Str(value) => value.clone(),
      MetaExpr::Int(value) => format!("{value}"),
      MetaExpr::Float(value) => format!("{value:.6}"),
      _ => panic!("literal_string() on non-collapsed meta expression"),
    }
  }

  /// Collapse this expression to canonical literal form in place.
  pub fn collapse(&mut self, definitions: &[MetaDefinition], source: Source) -> Result {
    while !self.is_collapsed() {
      match self {
        MetaExpr::Var { name, .. } => {
          let replacement = match find_definition(definitions, name) {
            Some(definition) => definition.value.clone(),
            None => MetaExpr::Undef,
          };
          *self = replacement;
        }
        MetaExpr::Not(value) => {
          let inner = value.as_mut().into_bool(definitions, source)?;
          *self = if inner { MetaExpr::False } else { MetaExpr::True };
        }
        MetaExpr::Binary { op: op @ (MetaOp::And | MetaOp::Or | MetaOp::Xor), a, b } => {
          let a = a.as_mut().into_bool(definitions, source)?;
          let b = b.as_mut().into_bool(definitions, source)?;
          let result = match op {
            MetaOp::And => a && b,
            MetaOp::Or => a || b,
            _ => a ^ b,
          };
          *self = if result { MetaExpr::True } else { MetaExpr::False };
        }
        MetaExpr::Binary {
          op: op @ (MetaOp::Add | MetaOp::Sub | MetaOp::Mul | MetaOp::Div | MetaOp::Mod | MetaOp::Pow),
          a,
          b,
        } => {
          let op = *op;
          a.collapse(definitions, source)?;
          b.collapse(definitions, source)?;

          let table = match op {
            MetaOp::Add => &ADDITION_MODES,
            MetaOp::Pow => &POWER_MODES,
            _ => &TYPICAL_MODES,
          };

          match table[mode_of(a) as usize][mode_of(b) as usize] {
            Mode::Int => {
              let a = a.as_mut().into_int(definitions, source)?;
              let b = b.as_mut().into_int(definitions, source)?;
              if b == 0 && matches!(op, MetaOp::Div | MetaOp::Mod) {
                return Err(Panic::new(source, "Division by zero in meta expression"));
              }
              *self = MetaExpr::Int(match op {
                MetaOp::Add => a.wrapping_add(b),
                MetaOp::Sub => a.wrapping_sub(b),
                MetaOp::Mul => a.wrapping_mul(b),
                MetaOp::Div => a.wrapping_div(b),
                MetaOp::Mod => a.wrapping_rem(b),
                _ => unreachable!("pow never runs in int mode"),
              });
            }
            Mode::Float => {
              let a = a.as_mut().into_float(definitions, source)?;
              let b = b.as_mut().into_float(definitions, source)?;
              *self = MetaExpr::Float(match op {
                MetaOp::Add => a + b,
                MetaOp::Sub => a - b,
                MetaOp::Mul => a * b,
                MetaOp::Div => a / b,
                MetaOp::Mod => a % b,
                MetaOp::Pow => a.powf(b),
                _ => unreachable!(),
              });
            }
            Mode::Str => {
              let mut a = a.as_mut().into_string(definitions, source)?;
              let b = b.as_mut().into_string(definitions, source)?;
              a.push_str(&b);
              *self = MetaExpr::Str(a);
            }
          }
        }
        MetaExpr::Binary { op, a, b } => {
          let op = *op;
          a.collapse(definitions, source)?;
          b.collapse(definitions, source)?;

          let truth = match COMPARISON_MODES[mode_of(a) as usize][mode_of(b) as usize] {
            Mode::Int => {
              let a = a.as_mut().into_int(definitions, source)?;
              let b = b.as_mut().into_int(definitions, source)?;
              compare(op, &a, &b)
            }
            Mode::Float => {
              let a = a.as_mut().into_float(definitions, source)?;
              let b = b.as_mut().into_float(definitions, source)?;
              compare(op, &a, &b)
            }
            Mode::Str => {
              let a = a.as_mut().into_string(definitions, source)?;
              let b = b.as_mut().into_string(definitions, source)?;
              compare(op, &a, &b)
            }
          };
          *self = if truth { MetaExpr::True } else { MetaExpr::False };
        }
        _ => unreachable!("collapsed expressions are handled by the loop condition"),
      }
    }

    Ok(())
  }

  /// Collapse, then coerce to a boolean: `undef`, `false` and numeric
  /// zero are false, everything else is true.
  pub fn into_bool(&mut self, definitions: &[MetaDefinition], source: Source) -> Result<bool> {
    self.collapse(definitions, source)?;
    Ok(match self {
      MetaExpr::Undef | MetaExpr::Null | MetaExpr::False => false,
      MetaExpr::True => true,
      MetaExpr::Int(value) => *value != 0,
      MetaExpr::Float(value) => *value != 0.0,
      _ => true,
    })
  }

  /// Collapse, then coerce to an integer: `true` is 1, strings parse in
  /// base 10 (zero on garbage), floats truncate.
  pub fn into_int(&mut self, definitions: &[MetaDefinition], source: Source) -> Result<i64> {
    self.collapse(definitions, source)?;
    #[allow(clippy::cast_possible_truncation)]
    Ok(match self {
      MetaExpr::Undef | MetaExpr::Null | MetaExpr::False => 0,
      MetaExpr::True => 1,
      MetaExpr::Int(value) => *value,
      MetaExpr::Float(value) => *value as i64,
      MetaExpr::Str(value) => parse_int_prefix(value),
      _ => unreachable!("collapse() produced a non-literal"),
    })
  }

  /// Collapse, then coerce to a float.
  pub fn into_float(&mut self, definitions: &[MetaDefinition], source: Source) -> Result<f64> {
    self.collapse(definitions, source)?;
    #[allow(clippy::cast_precision_loss)]
    Ok(match self {
      MetaExpr::Undef | MetaExpr::Null | MetaExpr::False => 0.0,
      MetaExpr::True => 1.0,
      MetaExpr::Int(value) => *value as f64,
      MetaExpr::Float(value) => *value,
      MetaExpr::Str(value) => value.trim().parse().unwrap_or(0.0),
      _ => unreachable!("collapse() produced a non-literal"),
    })
  }

  /// Collapse, then coerce to the display string.
  pub fn into_string(&mut self, definitions: &[MetaDefinition], source: Source) -> Result<String> {
    self.collapse(definitions, source)?;
    Ok(self.literal_string())
  }
}

fn compare<T: PartialOrd>(op: MetaOp, a: &T, b: &T) -> bool {
  match op {
    MetaOp::Eq => a == b,
    MetaOp::Neq => a != b,
    MetaOp::Gt => a > b,
    MetaOp::Gte => a >= b,
    MetaOp::Lt => a < b,
    MetaOp::Lte => a <= b,
    _ => unreachable!("comparison table only reached for comparison ops"),
  }
}

// C `atoll` semantics: optional sign, then as many digits as are there.
fn parse_int_prefix(text: &str) -> i64 {
  let trimmed = text.trim_start();
  let (negative, digits) = match trimmed.strip_prefix('-') {
    Some(rest) => (true, rest),
    None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
  };

  let mut value: i64 = 0;
  for c in digits.chars() {
    let Some(digit) = c.to_digit(10) else { break };
    value = value.wrapping_mul(10).wrapping_add(i64::from(digit));
  }

  if negative { -value } else { value }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn binary(op: MetaOp, a: MetaExpr, b: MetaExpr) -> MetaExpr {
    MetaExpr::Binary { op, a: Box::new(a), b: Box::new(b) }
  }

  fn collapsed(mut expr: MetaExpr) -> MetaExpr {
    expr.collapse(&[], Source::NONE).expect("collapsible");
    expr
  }

  #[test]
  fn integer_addition() {
    assert_eq!(
      collapsed(binary(MetaOp::Add, MetaExpr::Int(1), MetaExpr::Int(2))),
      MetaExpr::Int(3),
    );
  }

  #[test]
  fn string_promotion_on_add() {
    assert_eq!(
      collapsed(binary(MetaOp::Add, MetaExpr::Str("foo".into()), MetaExpr::Int(42))),
      MetaExpr::Str("foo42".into()),
    );
    // Int x str addition runs in int mode, parsing the string.
    assert_eq!(
      collapsed(binary(MetaOp::Add, MetaExpr::Int(42), MetaExpr::Str("foo".into()))),
      MetaExpr::Int(42),
    );
  }

  #[test]
  fn pow_is_always_float() {
    let result = collapsed(binary(MetaOp::Pow, MetaExpr::Int(2), MetaExpr::Int(10)));
    assert_eq!(result, MetaExpr::Float(1024.0));
    assert_eq!(result.literal_string(), "1024.000000");
  }

  #[test]
  fn string_comparison() {
    assert_eq!(
      collapsed(binary(MetaOp::Eq, MetaExpr::Str("a".into()), MetaExpr::Str("a".into()))),
      MetaExpr::True,
    );
    assert_eq!(
      collapsed(binary(MetaOp::Lt, MetaExpr::Str("a".into()), MetaExpr::Str("b".into()))),
      MetaExpr::True,
    );
  }

  #[test]
  fn not_undef_is_true() {
    assert_eq!(collapsed(MetaExpr::Not(Box::new(MetaExpr::Undef))), MetaExpr::True);
  }

  #[test]
  fn unbound_variable_collapses_to_undef() {
    let expr = collapsed(MetaExpr::Var { name: "missing".into(), source: Source::NONE });
    assert_eq!(expr, MetaExpr::Undef);
  }

  #[test]
  fn bound_variable_uses_definition() {
    let definitions = vec![MetaDefinition::new("answer", MetaExpr::Int(42))];
    let mut expr = binary(
      MetaOp::Add,
      MetaExpr::Var { name: "answer".into(), source: Source::NONE },
      MetaExpr::Int(1),
    );
    expr.collapse(&definitions, Source::NONE).expect("collapsible");
    assert_eq!(expr, MetaExpr::Int(43));
  }

  #[test]
  fn division_by_zero_is_reported() {
    let mut expr = binary(MetaOp::Div, MetaExpr::Int(1), MetaExpr::Int(0));
    assert!(expr.collapse(&[], Source::NONE).is_err());
  }

  #[test]
  fn coercions() {
    let defs: &[MetaDefinition] = &[];
    assert!(MetaExpr::Int(7).into_bool(defs, Source::NONE).expect("ok"));
    assert!(!MetaExpr::Undef.into_bool(defs, Source::NONE).expect("ok"));
    assert_eq!(MetaExpr::Str("19m".into()).into_int(defs, Source::NONE).expect("ok"), 19);
    assert_eq!(MetaExpr::True.into_int(defs, Source::NONE).expect("ok"), 1);
    assert_eq!(MetaExpr::Int(3).into_string(defs, Source::NONE).expect("ok"), "3");
  }
}
