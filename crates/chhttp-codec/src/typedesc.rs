use crate::tokenizer::{tokenize, Token};
use chhttp_core::{CodecError, CodecResult};

/// Parsed form of a wire type name. Numeric and quoted arguments are kept as
/// leaf nodes whose `name` holds the literal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDesc {
    pub name: String,
    pub args: Vec<TypeDesc>,
}

impl TypeDesc {
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(name: impl Into<String>, args: Vec<TypeDesc>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

pub fn parse_type_desc(input: &str) -> CodecResult<TypeDesc> {
    let tokens = tokenize(input)?;
    let mut parser = DescParser { tokens: &tokens, pos: 0 };
    let desc = parser.type_desc()?;
    match parser.peek() {
        Token::End => Ok(desc),
        other => Err(CodecError::syntax(format!(
            "unexpected {other:?} after complete type in {input:?}"
        ))),
    }
}

static END: Token = Token::End;

struct DescParser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> DescParser<'a> {
    fn peek(&self) -> &'a Token {
        self.tokens.get(self.pos).unwrap_or(&END)
    }

    fn advance(&mut self) -> &'a Token {
        let token = self.peek();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn type_desc(&mut self) -> CodecResult<TypeDesc> {
        let name = match self.advance() {
            Token::Symbol(name) | Token::Quoted(name) => name.clone(),
            Token::Punct('(') => return Err(CodecError::syntax("'(' without preceding type name")),
            other => return Err(CodecError::syntax(format!("expected type name, got {other:?}"))),
        };
        if self.peek() != &Token::Punct('(') {
            return Ok(TypeDesc::leaf(name));
        }
        self.advance();
        if name == "Enum8" || name == "Enum16" {
            self.skip_balanced()?;
            return Ok(TypeDesc::leaf(name));
        }
        let mut args = Vec::new();
        if self.peek() == &Token::Punct(')') {
            self.advance();
            return Ok(TypeDesc::with_args(name, args));
        }
        loop {
            args.push(self.type_desc()?);
            match self.advance() {
                Token::Punct(',') => continue,
                Token::Punct(')') => break,
                Token::End => {
                    return Err(CodecError::syntax(format!("unterminated argument list for {name}")))
                }
                other => {
                    return Err(CodecError::syntax(format!(
                        "expected ',' or ')' in arguments of {name}, got {other:?}"
                    )))
                }
            }
        }
        Ok(TypeDesc::with_args(name, args))
    }

    /// Consumes everything up to and including the `)` matching an already
    /// consumed `(`.
    fn skip_balanced(&mut self) -> CodecResult<()> {
        let mut depth = 1usize;
        while depth > 0 {
            match self.advance() {
                Token::Punct('(') => depth += 1,
                Token::Punct(')') => depth -= 1,
                Token::End => return Err(CodecError::syntax("unterminated enum argument list")),
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str) -> TypeDesc {
        TypeDesc::leaf(name)
    }

    #[test]
    fn plain_and_nullable() {
        assert_eq!(parse_type_desc("String").expect("parse"), leaf("String"));
        assert_eq!(
            parse_type_desc("Nullable(Nothing)").expect("parse"),
            TypeDesc::with_args("Nullable", vec![leaf("Nothing")])
        );
    }

    #[test]
    fn empty_parens_yield_no_args() {
        assert_eq!(parse_type_desc("DateTime()").expect("parse"), leaf("DateTime"));
    }

    #[test]
    fn numeric_and_quoted_args() {
        assert_eq!(
            parse_type_desc("FixedString(42)").expect("parse"),
            TypeDesc::with_args("FixedString", vec![leaf("42")])
        );
        assert_eq!(
            parse_type_desc("Decimal(9,4)").expect("parse"),
            TypeDesc::with_args("Decimal", vec![leaf("9"), leaf("4")])
        );
        assert_eq!(
            parse_type_desc(r"DateTime('UTC\b\r\n\'\f\t\0')").expect("parse"),
            TypeDesc::with_args("DateTime", vec![leaf("UTC\u{8}\r\n'\u{c}\t\0")])
        );
    }

    #[test]
    fn enum_args_are_discarded() {
        assert_eq!(
            parse_type_desc("Enum8(you can = put, 'whatever' here)").expect("parse"),
            leaf("Enum8")
        );
        assert_eq!(
            parse_type_desc("Array(Enum16('a' = 1, 'b(' = 2))").expect("parse"),
            TypeDesc::with_args("Array", vec![leaf("Enum16")])
        );
    }

    #[test]
    fn nested_args() {
        let desc = parse_type_desc("Array(Tuple(Tuple(String, String), Tuple(String, UInt64)))")
            .expect("parse");
        let expected = TypeDesc::with_args(
            "Array",
            vec![TypeDesc::with_args(
                "Tuple",
                vec![
                    TypeDesc::with_args("Tuple", vec![leaf("String"), leaf("String")]),
                    TypeDesc::with_args("Tuple", vec![leaf("String"), leaf("UInt64")]),
                ],
            )],
        );
        assert_eq!(desc, expected);
    }

    #[test]
    fn malformed_descriptors_fail() {
        for input in [
            "Array(Tuple(Tuple(String, String), Tuple(String, UInt64))",
            "(",
            "Array(')",
            r"Array(\",
            "Array() String",
            "",
            "Enum8('a' = 1",
        ] {
            assert!(
                matches!(parse_type_desc(input), Err(CodecError::Syntax(_))),
                "expected syntax error for {input:?}"
            );
        }
    }
}
