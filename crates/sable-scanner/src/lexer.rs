//! Hand-written scanner.
//!
//! The scanner produces the full token stream for a source file up front;
//! the parser works over the resulting `Vec<Token>` with two tokens of
//! lookahead. Locations are 1-based line/column pairs.

use crate::token::{Token, TokenKind};
use sable_common::int::parse_integer;
use sable_common::{Atom, Diagnostic, ErrorKind, Fatal, Interner, SourceLocation};

/// Suffixes accepted on integer literals. The resolver maps them to types;
/// the scanner rejects anything else so a malformed suffix is a syntax
/// error, not a late resolution failure.
const INTEGER_SUFFIXES: &[&str] = &[
    "", "y", "u8", "s8", "u16", "s16", "u32", "s32", "u64", "s64", "u", "s",
];

pub struct Lexer<'src> {
    source: &'src [u8],
    pos: usize,
    line: u32,
    col: u32,
    path: Atom,
    path_str: String,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str, path: &str, interner: &mut Interner) -> Self {
        Lexer {
            source: source.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
            path: interner.intern(path),
            path_str: path.to_owned(),
        }
    }

    /// Scan the entire source into a token stream terminated by `Eof`.
    pub fn tokenize(mut self, interner: &mut Interner) -> Result<Vec<Token>, Fatal> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token(interner)?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self, interner: &mut Interner) -> Result<Token, Fatal> {
        self.skip_whitespace_and_comments();
        let location = self.location();

        let Some(c) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                location,
            });
        };

        let kind = match c {
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.scan_identifier_or_keyword(interner),
            b'0'..=b'9' => self.scan_integer(interner, location)?,
            b'\'' => self.scan_character(location)?,
            b'"' => self.scan_bytes(location)?,
            _ => self.scan_operator(location)?,
        };

        Ok(Token { kind, location })
    }

    fn location(&self) -> SourceLocation {
        SourceLocation::new(self.path, self.line, self.col)
    }

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.bump();
                }
                b'#' => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn error(&self, location: SourceLocation, message: impl Into<String>) -> Fatal {
        Diagnostic::new(
            ErrorKind::Syntax,
            self.path_str.clone(),
            location.line,
            location.col,
            message,
        )
    }

    fn scan_identifier_or_keyword(&mut self, interner: &mut Interner) -> TokenKind {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.bump();
            } else {
                break;
            }
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).expect("ascii identifier");
        match text {
            "namespace" => TokenKind::Namespace,
            "import" => TokenKind::Import,
            "var" => TokenKind::Var,
            "const" => TokenKind::Const,
            "func" => TokenKind::Func,
            "struct" => TokenKind::Struct,
            "extend" => TokenKind::Extend,
            "alias" => TokenKind::Alias,
            "extern" => TokenKind::Extern,
            "defer" => TokenKind::Defer,
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "dump" => TokenKind::Dump,
            "return" => TokenKind::Return,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "not" => TokenKind::Not,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "sizeof" => TokenKind::Sizeof,
            "alignof" => TokenKind::Alignof,
            "countof" => TokenKind::Countof,
            "typeof" => TokenKind::Typeof,
            "syscall" => TokenKind::Syscall,
            "uninit" => TokenKind::Uninit,
            _ => TokenKind::Identifier(interner.intern(text)),
        }
    }

    fn scan_integer(
        &mut self,
        interner: &mut Interner,
        location: SourceLocation,
    ) -> Result<TokenKind, Fatal> {
        let start = self.pos;
        let radix_digits: fn(u8) -> bool =
            if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x' | b'X')) {
                self.bump();
                self.bump();
                |c| c.is_ascii_hexdigit() || c == b'_'
            } else if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'o' | b'O')) {
                self.bump();
                self.bump();
                |c| (b'0'..=b'7').contains(&c) || c == b'_'
            } else if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'b' | b'B')) {
                self.bump();
                self.bump();
                |c| c == b'0' || c == b'1' || c == b'_'
            } else {
                |c| c.is_ascii_digit() || c == b'_'
            };

        while let Some(c) = self.peek() {
            if radix_digits(c) {
                self.bump();
            } else {
                break;
            }
        }
        let digits = std::str::from_utf8(&self.source[start..self.pos]).expect("ascii digits");

        let suffix_start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.bump();
            } else {
                break;
            }
        }
        let suffix =
            std::str::from_utf8(&self.source[suffix_start..self.pos]).expect("ascii suffix");

        let Some(value) = parse_integer(digits) else {
            return Err(self.error(location, format!("malformed integer literal `{digits}`")));
        };
        if !INTEGER_SUFFIXES.contains(&suffix) {
            return Err(self.error(
                location,
                format!("unknown integer literal suffix `{suffix}`"),
            ));
        }

        Ok(TokenKind::Integer {
            value,
            suffix: interner.intern(suffix),
        })
    }

    fn scan_escape(&mut self, location: SourceLocation) -> Result<u8, Fatal> {
        // Caller consumed the backslash.
        let Some(c) = self.bump() else {
            return Err(self.error(location, "unterminated escape sequence"));
        };
        match c {
            b'0' => Ok(0x00),
            b't' => Ok(b'\t'),
            b'n' => Ok(b'\n'),
            b'\'' => Ok(b'\''),
            b'"' => Ok(b'"'),
            b'\\' => Ok(b'\\'),
            b'x' => {
                let hi = self.bump();
                let lo = self.bump();
                let (Some(hi), Some(lo)) = (hi, lo) else {
                    return Err(self.error(location, "unterminated escape sequence"));
                };
                let digit = |c: u8| (c as char).to_digit(16);
                match (digit(hi), digit(lo)) {
                    (Some(hi), Some(lo)) => Ok((hi * 16 + lo) as u8),
                    _ => Err(self.error(location, "malformed hex escape sequence")),
                }
            }
            _ => Err(self.error(
                location,
                format!("unknown escape sequence `\\{}`", c as char),
            )),
        }
    }

    fn scan_character(&mut self, location: SourceLocation) -> Result<TokenKind, Fatal> {
        self.bump(); // opening quote
        let c = match self.bump() {
            None | Some(b'\n') => {
                return Err(self.error(location, "unterminated character literal"));
            }
            Some(b'\\') => self.scan_escape(location)?,
            Some(c) => c,
        };
        if self.bump() != Some(b'\'') {
            return Err(self.error(location, "unterminated character literal"));
        }
        Ok(TokenKind::Character(c as char))
    }

    fn scan_bytes(&mut self, location: SourceLocation) -> Result<TokenKind, Fatal> {
        self.bump(); // opening quote
        let mut bytes = Vec::new();
        loop {
            match self.bump() {
                None | Some(b'\n') => {
                    return Err(self.error(location, "unterminated bytes literal"));
                }
                Some(b'"') => break,
                Some(b'\\') => bytes.push(self.scan_escape(location)?),
                Some(c) => bytes.push(c),
            }
        }
        let text = String::from_utf8(bytes)
            .map_err(|_| self.error(location, "bytes literal is not valid utf-8"))?;
        Ok(TokenKind::Bytes(text))
    }

    fn scan_operator(&mut self, location: SourceLocation) -> Result<TokenKind, Fatal> {
        // Longest operators first.
        const OPERATORS: &[(&str, TokenKind)] = &[
            ("...", TokenKind::Ellipsis),
            ("::", TokenKind::ColonColon),
            (".*", TokenKind::DotStar),
            ("[[", TokenKind::LBracketLBracket),
            ("]]", TokenKind::RBracketRBracket),
            ("==", TokenKind::Eq),
            ("!=", TokenKind::Ne),
            ("<=", TokenKind::Le),
            (">=", TokenKind::Ge),
            ("<<", TokenKind::Shl),
            (">>", TokenKind::Shr),
            ("(", TokenKind::LParen),
            (")", TokenKind::RParen),
            ("{", TokenKind::LBrace),
            ("}", TokenKind::RBrace),
            ("[", TokenKind::LBracket),
            ("]", TokenKind::RBracket),
            (",", TokenKind::Comma),
            (";", TokenKind::Semicolon),
            (":", TokenKind::Colon),
            (".", TokenKind::Dot),
            ("=", TokenKind::Assign),
            ("<", TokenKind::Lt),
            (">", TokenKind::Gt),
            ("+", TokenKind::Plus),
            ("-", TokenKind::Dash),
            ("*", TokenKind::Star),
            ("/", TokenKind::FSlash),
            ("&", TokenKind::Ampersand),
            ("|", TokenKind::Pipe),
            ("^", TokenKind::Caret),
            ("~", TokenKind::Tilde),
        ];

        for (text, kind) in OPERATORS {
            if self.source[self.pos..].starts_with(text.as_bytes()) {
                for _ in 0..text.len() {
                    self.bump();
                }
                return Ok(kind.clone());
            }
        }

        let c = self.peek().expect("caller checked non-eof") as char;
        Err(self.error(location, format!("invalid character `{c}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn scan(source: &str) -> (Vec<Token>, Interner) {
        let mut interner = Interner::new();
        let tokens = Lexer::new(source, "test.sable", &mut interner)
            .tokenize(&mut interner)
            .expect("scan failure");
        (tokens, interner)
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        scan(source).0.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_declaration() {
        let (tokens, interner) = scan("var x: u32 = 123u32;");
        assert_eq!(tokens[0].kind, TokenKind::Var);
        let TokenKind::Identifier(name) = tokens[1].kind else {
            panic!("expected identifier");
        };
        assert_eq!(interner.resolve(name), "x");
        assert_eq!(tokens[2].kind, TokenKind::Colon);
        let TokenKind::Integer { ref value, suffix } = tokens[5].kind else {
            panic!("expected integer");
        };
        assert_eq!(*value, BigInt::from(123));
        assert_eq!(interner.resolve(suffix), "u32");
        assert_eq!(tokens[6].kind, TokenKind::Semicolon);
        assert_eq!(tokens[7].kind, TokenKind::Eof);
    }

    #[test]
    fn scans_multibyte_operators() {
        assert_eq!(
            kinds(":: .* [[ ]] == != <= >= << >> ..."),
            vec![
                TokenKind::ColonColon,
                TokenKind::DotStar,
                TokenKind::LBracketLBracket,
                TokenKind::RBracketRBracket,
                TokenKind::Eq,
                TokenKind::Ne,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::Shl,
                TokenKind::Shr,
                TokenKind::Ellipsis,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_radix_literals() {
        let (tokens, _) = scan("0xFF 0b1010 0o17 1_000");
        let values: Vec<BigInt> = tokens
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::Integer { value, .. } => Some(value.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            values,
            vec![
                BigInt::from(255),
                BigInt::from(10),
                BigInt::from(15),
                BigInt::from(1000)
            ]
        );
    }

    #[test]
    fn rejects_unknown_suffix() {
        let mut interner = Interner::new();
        let err = Lexer::new("123q8;", "test.sable", &mut interner)
            .tokenize(&mut interner)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
    }

    #[test]
    fn scans_character_and_bytes_literals() {
        let (tokens, _) = scan(r#"'a' '\n' '\x41' "hi\0""#);
        assert_eq!(tokens[0].kind, TokenKind::Character('a'));
        assert_eq!(tokens[1].kind, TokenKind::Character('\n'));
        assert_eq!(tokens[2].kind, TokenKind::Character('A'));
        assert_eq!(tokens[3].kind, TokenKind::Bytes("hi\0".to_owned()));
    }

    #[test]
    fn comments_and_locations() {
        let (tokens, _) = scan("# a comment\nreturn;");
        assert_eq!(tokens[0].kind, TokenKind::Return);
        assert_eq!(tokens[0].location.line, 2);
        assert_eq!(tokens[0].location.col, 1);
        assert_eq!(tokens[1].location.col, 7);
    }
}
