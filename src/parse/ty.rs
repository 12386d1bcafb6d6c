//! Type parsing.
//!
//! Types read left to right: pointer/array prefixes first, then one
//! terminal (base name, generic base, function pointer, polymorph, or an
//! anonymous composite). Nested generics interact with the lexer's shift
//! tokens: `<<` and `<<<` arrive as single tokens, and the parser splits
//! them one `<` at a time via `angle_bracket_repeat`.

use super::Parser;
use crate::error::{Panic, Result};
use crate::token::TokenKind;
use crate::types::ast::FuncTraits;
use crate::types::layout::{Layout, LayoutKind, LayoutTraits};
use crate::types::ty::{FuncElem, GenericBaseElem, PolymorphPrereq, Type, TypeElem};

impl Parser<'_> {
  /// Whether a type can start at a token of this kind.
  #[must_use] pub fn can_type_start_with(kind: &TokenKind, allow_open_bracket: bool) -> bool {
    matches!(
      kind,
      TokenKind::Word(_)
      | TokenKind::Multiply
      | TokenKind::GenericInt(_)
      | TokenKind::Polymorph(_)
      | TokenKind::PolyCount(_)
      | TokenKind::LessThan
      | TokenKind::BitLshift
      | TokenKind::BitLgcLshift
      | TokenKind::Func
      | TokenKind::Stdcall
      | TokenKind::Packed
      | TokenKind::Struct
      | TokenKind::Union
    ) || (allow_open_bracket && matches!(kind, TokenKind::BracketOpen))
  }

  /// Parse a complete type at the cursor.
  pub fn parse_type(&mut self) -> Result<Type> {
    let start = self.peek_source();
    let mut elements = crate::types::ty::TypeElems::new();

    if self.compiler.traits.contains(crate::CompilerTraits::TYPE_COLON) {
      // Skip over colon for the experimental ': int' syntax.
      self.eat(&TokenKind::Colon);
    }

    // Prefix elements.
    loop {
      let source = self.peek_source();
      match self.peek() {
        TokenKind::Multiply => {
          elements.push(TypeElem::Pointer { source });
          self.advance();
        }
        TokenKind::GenericInt(value) => {
          let length = usize::try_from(*value).unwrap_or(0);
          elements.push(TypeElem::FixedArray { length, source });
          self.advance();
        }
        TokenKind::BracketOpen => {
          self.advance();
          let length = Box::new(self.parse_expr()?);
          elements.push(TypeElem::VarFixedArray { length, source });
          self.expect(
            &TokenKind::BracketClose,
            "Expected ']' after size of fixed array in type",
          )?;
        }
        TokenKind::PolyCount(_) => {
          let name = self.tokens.take_poly_name(self.i).expect("polycount token");
          self.advance();
          elements.push(TypeElem::PolyCount { name, source });
        }
        _ => break,
      }
    }

    // Terminal element.
    let source = self.peek_source();
    match self.peek() {
      TokenKind::Word(_) => {
        let name = self.take_word("Expected type")?;
        elements.push(TypeElem::Base { name, source });
      }

      TokenKind::Func | TokenKind::Stdcall => {
        elements.push(self.parse_type_func()?);
      }

      TokenKind::Packed | TokenKind::Struct | TokenKind::Union => {
        let mut traits = LayoutTraits::empty();
        if self.eat(&TokenKind::Packed) {
          traits |= LayoutTraits::PACKED;
        }

        let kind = match self.peek() {
          TokenKind::Union => LayoutKind::Union,
          _ => LayoutKind::Struct,
        };
        self.advance();

        self.ignore_newlines("Expected '(' for anonymous composite type")?;
        self.expect(&TokenKind::Open, "Expected '(' for anonymous composite type")?;

        let (field_map, skeleton) = self.parse_layout_body(&TokenKind::Close)?;
        self.expect(&TokenKind::Close, "Expected ')' to close anonymous composite type")?;

        elements.push(TypeElem::Layout {
          layout: Layout { kind, field_map, skeleton, traits },
          source,
        });
      }

      TokenKind::Polymorph(_) => {
        let mut name = self.tokens.take_poly_name(self.i).expect("polymorph token");
        self.advance();

        // A leading tilde in the payload marks `$~T`.
        let allow_auto_conversion = name.starts_with('~');
        if allow_auto_conversion {
          name.remove(0);
        }

        if self.peek() == &TokenKind::BitComplement {
          if !self.allow_polymorphic_prereqs {
            return Err(Panic::new(
              self.peek_source(),
              "Polymorphic prerequisites are not allowed here",
            ));
          }

          self.advance();
          let similarity =
            self.take_word("Expected struct name after '~' in polymorphic prerequisite")?;

          let extends = if self.eat(&TokenKind::Extends) {
            Some(self.parse_type()?)
          } else {
            None
          };

          elements.push(TypeElem::PolymorphPrereq(Box::new(PolymorphPrereq {
            name,
            allow_auto_conversion,
            similarity,
            extends,
            source,
          })));
        } else {
          elements.push(TypeElem::Polymorph { name, allow_auto_conversion, source });
        }
      }

      TokenKind::LessThan | TokenKind::BitLshift | TokenKind::BitLgcLshift => {
        elements.push(self.parse_type_generic_base()?);
      }

      _ => return Err(Panic::new(start, "Expected type")),
    }

    Ok(Type { elements, source: start })
  }

  // `<$K, $V> Map` — the shift-token splitting happens on entry: a pending
  // `<<` counts as two `<`s, one consumed now and one left for the nested
  // generic that must follow.
  fn parse_type_generic_base(&mut self) -> Result<TypeElem> {
    if self.angle_bracket_repeat == 0 {
      self.angle_bracket_repeat = match self.peek() {
        TokenKind::LessThan => 1,
        TokenKind::BitLshift => 2,
        TokenKind::BitLgcLshift => 3,
        _ => unreachable!("caller matched an angle-open token"),
      };
    }

    self.angle_bracket_repeat -= 1;
    if self.angle_bracket_repeat == 0 {
      self.advance();
    }

    let mut generics = Vec::new();

    while self.peek() != &TokenKind::GreaterThan {
      self.ignore_newlines("Expected type in polymorphic generics")?;
      generics.push(self.parse_type()?);
      self.ignore_newlines("Expected '>' or ',' after type in polymorphic generics")?;

      if self.eat(&TokenKind::Next) {
        if self.peek() == &TokenKind::GreaterThan {
          return Err(Panic::new(
            self.peek_source(),
            "Expected type after ',' in polymorphic generics",
          ));
        }
      } else if self.peek() != &TokenKind::GreaterThan {
        return Err(Panic::new(
          self.peek_source(),
          "Expected ',' after type in polymorphic generics",
        ));
      }
    }

    self.expect(&TokenKind::GreaterThan, "Expected '>' after polymorphic generics")?;
    let source = self.peek_source();
    let name = self.take_word("Expected type name after polymorphic generics")?;

    Ok(TypeElem::GenericBase(Box::new(GenericBaseElem {
      name,
      generics,
      name_is_polymorphic: false,
      source,
    })))
  }

  // `stdcall func(int, int) int`
  fn parse_type_func(&mut self) -> Result<TypeElem> {
    let source = self.peek_source();
    let mut traits = FuncTraits::empty();

    if self.eat(&TokenKind::Stdcall) {
      traits |= FuncTraits::STDCALL;
    }

    self.expect(&TokenKind::Func, "Expected 'func' keyword in function type")?;
    self.expect(&TokenKind::Open, "Expected '(' after 'func' keyword in type")?;

    let mut arg_types = Vec::new();
    let mut is_vararg = false;

    while self.peek() != &TokenKind::Close {
      if is_vararg {
        return Err(Panic::new(self.peek_source(), "Expected ')' after variadic argument"));
      }

      // Argument flow is allowed but carries no meaning on a type.
      let _ = self.eat(&TokenKind::In)
        || self.eat(&TokenKind::Out)
        || self.eat(&TokenKind::InOut);

      if self.eat(&TokenKind::Ellipsis) {
        is_vararg = true;
        traits |= FuncTraits::VARARG;
      } else {
        arg_types.push(self.parse_type()?);
      }

      if self.eat(&TokenKind::Next) {
        if self.peek() == &TokenKind::Close {
          return Err(Panic::new(
            self.peek_source(),
            "Expected type after ',' in argument list",
          ));
        }
      } else if self.peek() != &TokenKind::Close {
        let message = if is_vararg {
          "Expected ')' after variadic argument"
        } else {
          "Expected ',' after argument type"
        };
        return Err(Panic::new(self.peek_source(), message));
      }
    }

    self.advance();
    let return_type = self.parse_type()?;

    Ok(TypeElem::Func(Box::new(FuncElem { arg_types, return_type, traits, source })))
  }
}
