use chhttp_core::{CodecError, CodecResult};
use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Symbol(String),
    Quoted(String),
    /// One of `(`, `)` or `,`.
    Punct(char),
    End,
}

/// Splits a type descriptor such as `Array(Nullable(DateTime('UTC')))` into
/// tokens. The returned sequence always ends with [`Token::End`].
pub fn tokenize(input: &str) -> CodecResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' | ')' | ',' => {
                chars.next();
                tokens.push(Token::Punct(c));
            }
            '\'' => {
                chars.next();
                tokens.push(Token::Quoted(read_quoted(&mut chars)?));
            }
            _ => {
                let mut symbol = String::new();
                while let Some(&c) = chars.peek() {
                    if !is_symbol_char(c) {
                        break;
                    }
                    symbol.push(c);
                    chars.next();
                }
                tokens.push(Token::Symbol(symbol));
            }
        }
    }
    tokens.push(Token::End);
    Ok(tokens)
}

fn is_symbol_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | ',' | '\'')
}

fn read_quoted(chars: &mut Peekable<Chars<'_>>) -> CodecResult<String> {
    let mut out = String::new();
    loop {
        match chars.next() {
            None => return Err(CodecError::syntax("unterminated quoted string")),
            Some('\'') => return Ok(out),
            Some('\\') => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| CodecError::syntax("unterminated escape sequence"))?;
                let unescaped = u8::try_from(escaped)
                    .ok()
                    .and_then(unescape_byte)
                    .ok_or_else(|| CodecError::syntax(format!("invalid escape sequence \\{escaped}")))?;
                out.push(char::from(unescaped));
            }
            Some(c) => out.push(c),
        }
    }
}

/// Maps the byte following a backslash to the byte it stands for. Shared by
/// the type-descriptor lexer and the cell decoder.
pub(crate) fn unescape_byte(b: u8) -> Option<u8> {
    match b {
        b'\\' => Some(b'\\'),
        b'\'' => Some(b'\''),
        b'b' => Some(0x08),
        b'r' => Some(b'\r'),
        b'n' => Some(b'\n'),
        b'f' => Some(0x0c),
        b't' => Some(b'\t'),
        b'0' => Some(0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Token {
        Token::Symbol(s.to_string())
    }

    #[test]
    fn empty_input_yields_end() {
        assert_eq!(tokenize("").expect("tokenize"), vec![Token::End]);
        assert_eq!(tokenize(" \t\n ").expect("tokenize"), vec![Token::End]);
    }

    #[test]
    fn whitespace_all_over_the_place() {
        let tokens = tokenize("   \t\nhello   \t  \n   world   \n").expect("tokenize");
        assert_eq!(tokens, vec![sym("hello"), sym("world"), Token::End]);
    }

    #[test]
    fn quotes_and_escaping() {
        let tokens =
            tokenize(r"Array(Tuple(FixedString(5), Float32, 'hello, \') world'))").expect("tokenize");
        assert_eq!(
            tokens,
            vec![
                sym("Array"),
                Token::Punct('('),
                sym("Tuple"),
                Token::Punct('('),
                sym("FixedString"),
                Token::Punct('('),
                sym("5"),
                Token::Punct(')'),
                Token::Punct(','),
                sym("Float32"),
                Token::Punct(','),
                Token::Quoted("hello, ') world".to_string()),
                Token::Punct(')'),
                Token::Punct(')'),
                Token::End,
            ]
        );
    }

    #[test]
    fn control_escapes() {
        let tokens = tokenize(r"'UTC\b\r\n\'\f\t\0\\'").expect("tokenize");
        assert_eq!(
            tokens,
            vec![Token::Quoted("UTC\u{8}\r\n'\u{c}\t\0\\".to_string()), Token::End]
        );
    }

    #[test]
    fn unclosed_quote_fails() {
        assert!(matches!(tokenize("Array(')"), Err(CodecError::Syntax(_))));
    }

    #[test]
    fn unfinished_escape_fails() {
        assert!(matches!(tokenize(r"Array('\"), Err(CodecError::Syntax(_))));
    }

    #[test]
    fn unknown_escape_fails() {
        assert!(matches!(tokenize(r"'\q'"), Err(CodecError::Syntax(_))));
    }
}
