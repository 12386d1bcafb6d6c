//! The token stream contract consumed by the parser.
//!
//! Tokens are produced by the external lexer as an ordered list of
//! `(kind, payload, source)` tuples. Word/string payloads are owned by the
//! token until the parser *takes* them while consuming it; the parser never
//! copies a payload and leaves the original behind.

use std::mem;

use crate::types::Source;

/// A token id together with its payload, if its family carries one.
///
/// Literal tokens are already typed by the lexer (`13sb` lexes to
/// [`TokenKind::Byte`], a bare `13` to [`TokenKind::GenericInt`]).
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
  /// Absence of a token; also what out-of-range lookahead yields.
  None,
  /// Logical line terminator. May be ignored or required depending on
  /// context.
  Newline,

  // Payload-bearing families.
  /// An identifier.
  Word(String),
  /// A string literal.
  Str(String),
  /// A C-string literal.
  CStr(String),
  /// A meta directive, e.g. `#get` carrying `get`.
  Meta(String),
  /// A polymorphic type variable `$T`.
  Polymorph(String),
  /// A polymorphic count variable `$#N`.
  PolyCount(String),

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
  /// An untyped integer literal.
  GenericInt(i64),
  /// `13.0f`
  Float(f32),
  /// `13.0d`
  Double(f64),
  /// An untyped float literal.
  GenericFloat(f64),

  // Grouping and separators.
  /// `(`
  Open,
  /// `)`
  Close,
  /// `{`
  Begin,
  /// `}`
  End,
  /// `[`
  BracketOpen,
  /// `]`
  BracketClose,
  /// `,`
  Next,
  /// `:`
  Colon,
  /// `;`
  Terminate,
  /// `.`
  Member,
  /// `..`
  Range,
  /// `...`
  Ellipsis,
  /// `::`
  Associate,
  /// `~>`
  Gives,
  /// `=>`
  StrongArrow,
  /// `?`
  Maybe,

  // Operators.
  /// `=`
  Assign,
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
  /// `<`
  LessThan,
  /// `>`
  GreaterThan,
  /// `<=`
  LessThanEq,
  /// `>=`
  GreaterThanEq,
  /// `!`
  Not,
  /// `~`
  BitComplement,
  /// `&` (address-of and bitwise AND, disambiguated by position)
  Address,
  /// `|`
  BitOr,
  /// `^`
  BitXor,
  /// `<<` (also the generic-open shift token, split by the parser)
  BitLshift,
  /// `>>`
  BitRshift,
  /// `<<<`
  BitLgcLshift,
  /// `>>>`
  BitLgcRshift,
  /// `&&`
  UberAnd,
  /// `||`
  UberOr,
  /// `++`
  Increment,
  /// `--`
  Decrement,
  /// `!!`
  Toggle,
  /// `+=`
  AddAssign,
  /// `-=`
  SubtractAssign,
  /// `*=`
  MultiplyAssign,
  /// `/=`
  DivideAssign,
  /// `%=`
  ModulusAssign,
  /// `&=`
  AndAssign,
  /// `|=`
  OrAssign,
  /// `^=`
  XorAssign,
  /// `<<=`
  LshiftAssign,
  /// `>>=`
  RshiftAssign,
  /// `<<<=`
  LgcLshiftAssign,
  /// `>>>=`
  LgcRshiftAssign,

  // Keywords.
  /// `alias`
  Alias,
  /// `alignof`
  Alignof,
  /// `and`
  And,
  /// `as`
  As,
  /// `asm`
  Asm,
  /// `assert`
  Assert,
  /// `at`
  At,
  /// `break`
  Break,
  /// `case`
  Case,
  /// `cast`
  Cast,
  /// `class`
  Class,
  /// `const`
  Const,
  /// `constructor`
  Constructor,
  /// `continue`
  Continue,
  /// `def`
  Def,
  /// `default`
  Default,
  /// `defer`
  Defer,
  /// `define`
  Define,
  /// `delete`
  Delete,
  /// `each`
  Each,
  /// `else`
  Else,
  /// `embed`
  Embed,
  /// `enum`
  Enum,
  /// `exhaustive`
  Exhaustive,
  /// `extends`
  Extends,
  /// `external`
  External,
  /// `fallthrough`
  FallThrough,
  /// `false`
  False,
  /// `for`
  For,
  /// `foreign`
  Foreign,
  /// `func`
  Func,
  /// `if`
  If,
  /// `implicit`
  Implicit,
  /// `import`
  Import,
  /// `in`
  In,
  /// `inout`
  InOut,
  /// `namespace`
  Namespace,
  /// `new`
  New,
  /// `null`
  Null,
  /// `or`
  Or,
  /// `out`
  Out,
  /// `override`
  Override,
  /// `packed`
  Packed,
  /// `POD`
  Pod,
  /// `pragma`
  Pragma,
  /// `record`
  Record,
  /// `repeat`
  Repeat,
  /// `return`
  Return,
  /// `sizeof`
  Sizeof,
  /// `static`
  Static,
  /// `stdcall`
  Stdcall,
  /// `struct`
  Struct,
  /// `switch`
  Switch,
  /// `thread_local`
  ThreadLocal,
  /// `true`
  True,
  /// `typeinfo`
  Typeinfo,
  /// `typenameof`
  Typenameof,
  /// `undef`
  Undef,
  /// `union`
  Union,
  /// `unless`
  Unless,
  /// `until`
  Until,
  /// `using`
  Using,
  /// `va_arg`
  VaArg,
  /// `va_copy`
  VaCopy,
  /// `va_end`
  VaEnd,
  /// `va_start`
  VaStart,
  /// `verbatim`
  Verbatim,
  /// `virtual`
  Virtual,
  /// `while`
  While,
}

impl TokenKind {
  /// The display name used in "unexpected token" diagnostics.
  #[must_use] pub fn name(&self) -> &'static str {
    match self {
      TokenKind::None => "nothing",
      TokenKind::Newline => "newline",
      TokenKind::Word(_) => "identifier",
      TokenKind::Str(_) => "string literal",
      TokenKind::CStr(_) => "C-string literal",
      TokenKind::Meta(_) => "meta directive",
      TokenKind::Polymorph(_) => "polymorphic type variable",
      TokenKind::PolyCount(_) => "polymorphic count variable",
      TokenKind::Byte(_) | TokenKind::Ubyte(_) | TokenKind::Short(_)
      | TokenKind::Ushort(_) | TokenKind::Int(_) | TokenKind::Uint(_)
      | TokenKind::Long(_) | TokenKind::Ulong(_) | TokenKind::Usize(_)
      | TokenKind::GenericInt(_) => "integer literal",
      TokenKind::Float(_) | TokenKind::Double(_) | TokenKind::GenericFloat(_) =>
        "float literal",
      TokenKind::Open => "'('",
      TokenKind::Close => "')'",
      TokenKind::Begin => "'{'",
      TokenKind::End => "'}'",
      TokenKind::BracketOpen => "'['",
      TokenKind::BracketClose => "']'",
      TokenKind::Next => "','",
      TokenKind::Colon => "':'",
      TokenKind::Terminate => "';'",
      TokenKind::Member => "'.'",
      TokenKind::Range => "'..'",
      TokenKind::Ellipsis => "'...'",
      TokenKind::Associate => "'::'",
      TokenKind::Gives => "'~>'",
      TokenKind::StrongArrow => "'=>'",
      TokenKind::Maybe => "'?'",
      TokenKind::Assign => "'='",
      TokenKind::Add => "'+'",
      TokenKind::Subtract => "'-'",
      TokenKind::Multiply => "'*'",
      TokenKind::Divide => "'/'",
      TokenKind::Modulus => "'%'",
      TokenKind::Equals => "'=='",
      TokenKind::NotEquals => "'!='",
      TokenKind::LessThan => "'<'",
      TokenKind::GreaterThan => "'>'",
      TokenKind::LessThanEq => "'<='",
      TokenKind::GreaterThanEq => "'>='",
      TokenKind::Not => "'!'",
      TokenKind::BitComplement => "'~'",
      TokenKind::Address => "'&'",
      TokenKind::BitOr => "'|'",
      TokenKind::BitXor => "'^'",
      TokenKind::BitLshift => "'<<'",
      TokenKind::BitRshift => "'>>'",
      TokenKind::BitLgcLshift => "'<<<'",
      TokenKind::BitLgcRshift => "'>>>'",
      TokenKind::UberAnd => "'&&'",
      TokenKind::UberOr => "'||'",
      TokenKind::Increment => "'++'",
      TokenKind::Decrement => "'--'",
      TokenKind::Toggle => "'!!'",
      TokenKind::AddAssign => "'+='",
      TokenKind::SubtractAssign => "'-='",
      TokenKind::MultiplyAssign => "'*='",
      TokenKind::DivideAssign => "'/='",
      TokenKind::ModulusAssign => "'%='",
      TokenKind::AndAssign => "'&='",
      TokenKind::OrAssign => "'|='",
      TokenKind::XorAssign => "'^='",
      TokenKind::LshiftAssign => "'<<='",
      TokenKind::RshiftAssign => "'>>='",
      TokenKind::LgcLshiftAssign => "'<<<='",
      TokenKind::LgcRshiftAssign => "'>>>='",
      TokenKind::Alias => "'alias'",
      TokenKind::Alignof => "'alignof'",
      TokenKind::And => "'and'",
      TokenKind::As => "'as'",
      TokenKind::Asm => "'asm'",
      TokenKind::Assert => "'assert'",
      TokenKind::At => "'at'",
      TokenKind::Break => "'break'",
      TokenKind::Case => "'case'",
      TokenKind::Cast => "'cast'",
      TokenKind::Class => "'class'",
      TokenKind::Const => "'const'",
      TokenKind::Constructor => "'constructor'",
      TokenKind::Continue => "'continue'",
      TokenKind::Def => "'def'",
      TokenKind::Default => "'default'",
      TokenKind::Defer => "'defer'",
      TokenKind::Define => "'define'",
      TokenKind::Delete => "'delete'",
      TokenKind::Each => "'each'",
      TokenKind::Else => "'else'",
      TokenKind::Embed => "'embed'",
      TokenKind::Enum => "'enum'",
      TokenKind::Exhaustive => "'exhaustive'",
      TokenKind::Extends => "'extends'",
      TokenKind::External => "'external'",
      TokenKind::FallThrough => "'fallthrough'",
      TokenKind::False => "'false'",
      TokenKind::For => "'for'",
      TokenKind::Foreign => "'foreign'",
      TokenKind::Func => "'func'",
      TokenKind::If => "'if'",
      TokenKind::Implicit => "'implicit'",
      TokenKind::Import => "'import'",
      TokenKind::In => "'in'",
      TokenKind::InOut => "'inout'",
      TokenKind::Namespace => "'namespace'",
      TokenKind::New => "'new'",
      TokenKind::Null => "'null'",
      TokenKind::Or => "'or'",
      TokenKind::Out => "'out'",
      TokenKind::Override => "'override'",
      TokenKind::Packed => "'packed'",
      TokenKind::Pod => "'POD'",
      TokenKind::Pragma => "'pragma'",
      TokenKind::Record => "'record'",
      TokenKind::Repeat => "'repeat'",
      TokenKind::Return => "'return'",
      TokenKind::Sizeof => "'sizeof'",
      TokenKind::Static => "'static'",
      TokenKind::Stdcall => "'stdcall'",
      TokenKind::Struct => "'struct'",
      TokenKind::Switch => "'switch'",
      TokenKind::ThreadLocal => "'thread_local'",
      TokenKind::True => "'true'",
      TokenKind::Typeinfo => "'typeinfo'",
      TokenKind::Typenameof => "'typenameof'",
      TokenKind::Undef => "'undef'",
      TokenKind::Union => "'union'",
      TokenKind::Unless => "'unless'",
      TokenKind::Until => "'until'",
      TokenKind::Using => "'using'",
      TokenKind::VaArg => "'va_arg'",
      TokenKind::VaCopy => "'va_copy'",
      TokenKind::VaEnd => "'va_end'",
      TokenKind::VaStart => "'va_start'",
      TokenKind::Verbatim => "'verbatim'",
      TokenKind::Virtual => "'virtual'",
      TokenKind::While => "'while'",
    }
  }

  /// Whether this token is one of the identifier-or-keyword family that can
  /// begin a type.
  #[must_use] pub fn is_word(&self) -> bool {
    matches!(self, TokenKind::Word(_))
  }
}

/// One token with the source range it was lexed from.
#[derive(Clone, Debug)]
pub struct Token {
  /// The token id and payload.
  pub kind: TokenKind,
  /// Where the token came from.
  pub source: Source,
}

/// The ordered token sequence for one translation object.
#[derive(Clone, Debug, Default)]
pub struct TokenList {
  /// The tokens in lexical order.
  pub tokens: Vec<Token>,
}

static NONE_KIND: TokenKind = TokenKind::None;

impl TokenList {
  /// Wrap a lexed token sequence.
  #[must_use] pub fn new(tokens: Vec<Token>) -> TokenList {
    TokenList { tokens }
  }

  /// Number of tokens.
  #[must_use] pub fn len(&self) -> usize { self.tokens.len() }

  /// Whether the list is empty.
  #[must_use] pub fn is_empty(&self) -> bool { self.tokens.is_empty() }

  /// The token kind at `i`, or [`TokenKind::None`] past the end. Lookahead
  /// never panics.
  #[must_use] pub fn kind(&self, i: usize) -> &TokenKind {
    self.tokens.get(i).map_or(&NONE_KIND, |t| &t.kind)
  }

  /// The source range of the token at `i`, or the null range past the end.
  #[must_use] pub fn source(&self, i: usize) -> Source {
    self.tokens.get(i).map_or(Source::NONE, |t| t.source)
  }

  /// Take ownership of the identifier payload at `i`, leaving an empty
  /// string behind. Returns `None` if the token is not a word.
  pub fn take_word(&mut self, i: usize) -> Option<String> {
    match self.tokens.get_mut(i) {
      Some(Token { kind: TokenKind::Word(name), .. }) => Some(mem::take(name)),
      _ => None,
    }
  }

  /// Take ownership of a string or C-string payload at `i`.
  pub fn take_string(&mut self, i: usize) -> Option<String> {
    match self.tokens.get_mut(i) {
      Some(Token { kind: TokenKind::Str(s), .. })
      | Some(Token { kind: TokenKind::CStr(s), .. }) => Some(mem::take(s)),
      _ => None,
    }
  }

  /// Take ownership of a polymorph or polycount name payload at `i`.
  pub fn take_poly_name(&mut self, i: usize) -> Option<String> {
    match self.tokens.get_mut(i) {
      Some(Token { kind: TokenKind::Polymorph(s), .. })
      | Some(Token { kind: TokenKind::PolyCount(s), .. }) => Some(mem::take(s)),
      _ => None,
    }
  }

  /// Take ownership of a meta directive name payload at `i`.
  pub fn take_meta_name(&mut self, i: usize) -> Option<String> {
    match self.tokens.get_mut(i) {
      Some(Token { kind: TokenKind::Meta(s), .. }) => Some(mem::take(s)),
      _ => None,
    }
  }

  /// Borrow the identifier payload at `i` without consuming it.
  #[must_use] pub fn peek_word(&self, i: usize) -> Option<&str> {
    match self.kind(i) {
      TokenKind::Word(name) => Some(name),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn take_word_empties_payload() {
    let mut list = TokenList::new(vec![
      Token { kind: TokenKind::Word("main".into()), source: Source::NONE },
    ]);
    assert_eq!(list.take_word(0).as_deref(), Some("main"));
    assert_eq!(list.kind(0), &TokenKind::Word(String::new()));
    assert!(list.take_word(1).is_none());
  }

  #[test]
  fn lookahead_past_end_is_none() {
    let list = TokenList::default();
    assert_eq!(list.kind(3), &TokenKind::None);
    assert_eq!(list.source(3), Source::NONE);
  }
}
