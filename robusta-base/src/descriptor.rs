//! Field and method descriptor grammar.
//!
//! Types are `B C D F I J S Z`, `L<internal-name>;`, and `[<Type>`; a method
//! descriptor is `( Type* ) ReturnType` where the return type may also be
//! `V`. Parsing is total: any input yields either a parsed form or a
//! [`DescriptorError`], never a panic. Re-emitting a successfully parsed
//! descriptor reproduces the input string exactly.

use std::fmt;
use std::num::NonZeroUsize;

use smallvec::SmallVec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    /// The input was empty where a type was required.
    EmptyDescriptor,
    /// A method descriptor did not start with `(`.
    ExpectedOpenParen,
    /// The parameter list never reached its closing `)`.
    UnterminatedParameters,
    /// An `L...;` class form was missing its trailing `;`.
    UnterminatedClassName,
    /// `[` appeared with no component type after it.
    MissingArrayComponent,
    /// A character that starts no type.
    InvalidTypeCharacter(char),
    /// Characters remained after the return type.
    TrailingData,
    /// `V` appeared somewhere other than the return position.
    VoidParameter,
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorError::EmptyDescriptor => f.write_str("empty descriptor"),
            DescriptorError::ExpectedOpenParen => f.write_str("expected '(' to begin parameters"),
            DescriptorError::UnterminatedParameters => {
                f.write_str("missing ')' after parameters")
            }
            DescriptorError::UnterminatedClassName => {
                f.write_str("missing ';' after class name")
            }
            DescriptorError::MissingArrayComponent => {
                f.write_str("'[' with no component type")
            }
            DescriptorError::InvalidTypeCharacter(c) => {
                write!(f, "invalid type character {c:?}")
            }
            DescriptorError::TrailingData => f.write_str("trailing data after return type"),
            DescriptorError::VoidParameter => f.write_str("'V' is only valid as a return type"),
        }
    }
}

impl std::error::Error for DescriptorError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl PrimitiveType {
    /// The single-character descriptor form.
    #[must_use]
    pub fn descriptor_char(self) -> char {
        match self {
            PrimitiveType::Byte => 'B',
            PrimitiveType::Char => 'C',
            PrimitiveType::Double => 'D',
            PrimitiveType::Float => 'F',
            PrimitiveType::Int => 'I',
            PrimitiveType::Long => 'J',
            PrimitiveType::Short => 'S',
            PrimitiveType::Boolean => 'Z',
        }
    }

    /// The Java source-level name, used in diagnostics.
    #[must_use]
    pub fn java_name(self) -> &'static str {
        match self {
            PrimitiveType::Byte => "byte",
            PrimitiveType::Char => "char",
            PrimitiveType::Double => "double",
            PrimitiveType::Float => "float",
            PrimitiveType::Int => "int",
            PrimitiveType::Long => "long",
            PrimitiveType::Short => "short",
            PrimitiveType::Boolean => "boolean",
        }
    }

    /// The wrapper class holding this primitive's `TYPE` field.
    #[must_use]
    pub fn wrapper_class(self) -> &'static str {
        match self {
            PrimitiveType::Byte => "java/lang/Byte",
            PrimitiveType::Char => "java/lang/Character",
            PrimitiveType::Double => "java/lang/Double",
            PrimitiveType::Float => "java/lang/Float",
            PrimitiveType::Int => "java/lang/Integer",
            PrimitiveType::Long => "java/lang/Long",
            PrimitiveType::Short => "java/lang/Short",
            PrimitiveType::Boolean => "java/lang/Boolean",
        }
    }

    #[must_use]
    pub fn from_descriptor_char(c: char) -> Option<PrimitiveType> {
        Some(match c {
            'B' => PrimitiveType::Byte,
            'C' => PrimitiveType::Char,
            'D' => PrimitiveType::Double,
            'F' => PrimitiveType::Float,
            'I' => PrimitiveType::Int,
            'J' => PrimitiveType::Long,
            'S' => PrimitiveType::Short,
            'Z' => PrimitiveType::Boolean,
            _ => return None,
        })
    }

    /// Whether values of this type occupy two local-variable slots.
    #[must_use]
    pub fn is_category_2(self) -> bool {
        matches!(self, PrimitiveType::Long | PrimitiveType::Double)
    }
}

/// A non-array type: a primitive or a class reference by internal name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorTypeBasic {
    Primitive(PrimitiveType),
    /// Internal name without the `L`/`;` framing, e.g. `java/lang/String`.
    Class(String),
}

impl DescriptorTypeBasic {
    fn emit(&self, out: &mut String) {
        match self {
            DescriptorTypeBasic::Primitive(p) => out.push(p.descriptor_char()),
            DescriptorTypeBasic::Class(name) => {
                out.push('L');
                out.push_str(name);
                out.push(';');
            }
        }
    }
}

/// A full field/parameter type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorType {
    Basic(DescriptorTypeBasic),
    Array {
        level: NonZeroUsize,
        component: DescriptorTypeBasic,
    },
}

impl DescriptorType {
    /// The internal class name this type resolves to, as used by the name
    /// pool: the plain name for classes, the bracketed form for arrays,
    /// `None` for primitives.
    #[must_use]
    pub fn class_name(&self) -> Option<String> {
        match self {
            DescriptorType::Basic(DescriptorTypeBasic::Primitive(_)) => None,
            DescriptorType::Basic(DescriptorTypeBasic::Class(name)) => Some(name.clone()),
            DescriptorType::Array { .. } => Some(self.to_descriptor_string()),
        }
    }

    #[must_use]
    pub fn is_category_2(&self) -> bool {
        match self {
            DescriptorType::Basic(DescriptorTypeBasic::Primitive(p)) => p.is_category_2(),
            _ => false,
        }
    }

    /// Re-emit the descriptor form this was parsed from.
    #[must_use]
    pub fn to_descriptor_string(&self) -> String {
        let mut out = String::new();
        self.emit(&mut out);
        out
    }

    fn emit(&self, out: &mut String) {
        match self {
            DescriptorType::Basic(basic) => basic.emit(out),
            DescriptorType::Array { level, component } => {
                for _ in 0..level.get() {
                    out.push('[');
                }
                component.emit(out);
            }
        }
    }

    /// Parse a single field descriptor. The entire input must be consumed.
    pub fn parse(desc: &str) -> Result<DescriptorType, DescriptorError> {
        let mut cursor = Cursor::new(desc);
        let ty = cursor.parse_type()?;
        if !cursor.is_at_end() {
            return Err(DescriptorError::TrailingData);
        }
        Ok(ty)
    }
}

pub type ParametersContainer = SmallVec<[DescriptorType; 8]>;

/// Parsed `( Type* ) ReturnType` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    parameters: ParametersContainer,
    /// `None` represents void.
    return_type: Option<DescriptorType>,
}

impl MethodDescriptor {
    #[must_use]
    pub fn new(
        parameters: ParametersContainer,
        return_type: Option<DescriptorType>,
    ) -> MethodDescriptor {
        MethodDescriptor {
            parameters,
            return_type,
        }
    }

    #[must_use]
    pub fn parameters(&self) -> &[DescriptorType] {
        self.parameters.as_slice()
    }

    #[must_use]
    pub fn return_type(&self) -> Option<&DescriptorType> {
        self.return_type.as_ref()
    }

    /// Number of operand-stack slots the parameters occupy. The operand
    /// stack is 64 bits wide, so every parameter is one slot regardless of
    /// category.
    #[must_use]
    pub fn parameter_slots(&self) -> usize {
        self.parameters.len()
    }

    /// Parse a method descriptor. The entire input must be consumed.
    pub fn parse(desc: &str) -> Result<MethodDescriptor, DescriptorError> {
        if desc.is_empty() {
            return Err(DescriptorError::EmptyDescriptor);
        }

        let mut cursor = Cursor::new(desc);
        if cursor.next() != Some('(') {
            return Err(DescriptorError::ExpectedOpenParen);
        }

        let mut parameters = ParametersContainer::new();
        loop {
            match cursor.peek() {
                None => return Err(DescriptorError::UnterminatedParameters),
                Some(')') => {
                    cursor.next();
                    break;
                }
                Some('V') => return Err(DescriptorError::VoidParameter),
                Some(_) => parameters.push(cursor.parse_type()?),
            }
        }

        let return_type = match cursor.peek() {
            None => return Err(DescriptorError::EmptyDescriptor),
            Some('V') => {
                cursor.next();
                None
            }
            Some(_) => Some(cursor.parse_type()?),
        };

        if !cursor.is_at_end() {
            return Err(DescriptorError::TrailingData);
        }

        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }

    /// Re-emit the descriptor string this was parsed from.
    #[must_use]
    pub fn to_descriptor_string(&self) -> String {
        let mut out = String::from("(");
        for parameter in &self.parameters {
            parameter.emit(&mut out);
        }
        out.push(')');
        match &self.return_type {
            Some(ret) => ret.emit(&mut out),
            None => out.push('V'),
        }
        out
    }
}

struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Cursor<'a> {
        Cursor { rest: input }
    }

    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.rest = &self.rest[c.len_utf8()..];
        Some(c)
    }

    fn is_at_end(&self) -> bool {
        self.rest.is_empty()
    }

    /// Parse one type, which is not permitted to be `V`.
    fn parse_type(&mut self) -> Result<DescriptorType, DescriptorError> {
        let mut level = 0usize;
        while self.peek() == Some('[') {
            self.next();
            level += 1;
        }

        let basic = self.parse_basic(level > 0)?;
        Ok(match NonZeroUsize::new(level) {
            Some(level) => DescriptorType::Array {
                level,
                component: basic,
            },
            None => DescriptorType::Basic(basic),
        })
    }

    fn parse_basic(&mut self, in_array: bool) -> Result<DescriptorTypeBasic, DescriptorError> {
        let c = match self.next() {
            Some(c) => c,
            None if in_array => return Err(DescriptorError::MissingArrayComponent),
            None => return Err(DescriptorError::EmptyDescriptor),
        };

        if let Some(p) = PrimitiveType::from_descriptor_char(c) {
            return Ok(DescriptorTypeBasic::Primitive(p));
        }

        if c == 'L' {
            let end = self
                .rest
                .find(';')
                .ok_or(DescriptorError::UnterminatedClassName)?;
            let name = self.rest[..end].to_owned();
            self.rest = &self.rest[end + 1..];
            return Ok(DescriptorTypeBasic::Class(name));
        }

        Err(DescriptorError::InvalidTypeCharacter(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> DescriptorType {
        DescriptorType::Basic(DescriptorTypeBasic::Primitive(PrimitiveType::Int))
    }

    #[test]
    fn parses_two_int_void() {
        let desc = MethodDescriptor::parse("(II)V").unwrap();
        assert_eq!(desc.parameters(), &[int(), int()]);
        assert!(desc.return_type().is_none());
    }

    #[test]
    fn parses_string_to_object() {
        let desc = MethodDescriptor::parse("(Ljava/lang/String;)Ljava/lang/Object;").unwrap();
        assert_eq!(
            desc.parameters(),
            &[DescriptorType::Basic(DescriptorTypeBasic::Class(
                "java/lang/String".to_owned()
            ))]
        );
        assert_eq!(
            desc.return_type(),
            Some(&DescriptorType::Basic(DescriptorTypeBasic::Class(
                "java/lang/Object".to_owned()
            )))
        );
    }

    #[test]
    fn parses_array_parameters() {
        let desc = MethodDescriptor::parse("([Ljava/lang/String;)V").unwrap();
        assert_eq!(desc.parameter_slots(), 1);
        assert_eq!(
            desc.parameters()[0].class_name().as_deref(),
            Some("[Ljava/lang/String;")
        );
    }

    #[test]
    fn rejects_malformed_descriptors() {
        assert_eq!(
            MethodDescriptor::parse(""),
            Err(DescriptorError::EmptyDescriptor)
        );
        assert_eq!(
            MethodDescriptor::parse("()"),
            Err(DescriptorError::EmptyDescriptor)
        );
        assert_eq!(
            MethodDescriptor::parse("(I"),
            Err(DescriptorError::UnterminatedParameters)
        );
        assert_eq!(
            MethodDescriptor::parse("I)V"),
            Err(DescriptorError::ExpectedOpenParen)
        );
        assert_eq!(
            MethodDescriptor::parse("(Ljava/lang/String)V"),
            Err(DescriptorError::UnterminatedClassName)
        );
    }

    #[test]
    fn rejects_trailing_junk_and_bare_bracket() {
        assert_eq!(
            MethodDescriptor::parse("()VX"),
            Err(DescriptorError::TrailingData)
        );
        assert_eq!(
            MethodDescriptor::parse("([)V"),
            Err(DescriptorError::InvalidTypeCharacter(')'))
        );
        assert_eq!(
            MethodDescriptor::parse("(["),
            Err(DescriptorError::MissingArrayComponent)
        );
    }

    #[test]
    fn reemission_is_identity() {
        for desc in [
            "(II)V",
            "()V",
            "(Ljava/lang/String;)Ljava/lang/Object;",
            "([[I[Ljava/lang/String;JD)[Ljava/lang/Class;",
            "()[B",
        ] {
            let parsed = MethodDescriptor::parse(desc).unwrap();
            assert_eq!(parsed.to_descriptor_string(), desc);
        }
    }

    #[test]
    fn field_descriptor_round_trip() {
        for desc in ["I", "J", "[[D", "Ljava/lang/Object;", "[Ljava/lang/String;"] {
            let parsed = DescriptorType::parse(desc).unwrap();
            assert_eq!(parsed.to_descriptor_string(), desc);
        }
        assert!(DescriptorType::parse("L/no/semicolon").is_err());
        assert!(DescriptorType::parse("II").is_err());
        assert!(DescriptorType::parse("V").is_err());
    }
}
