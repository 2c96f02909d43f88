// Lexer for the textual SSA intermediate code.
//
// Uses the `logos` crate for DFA-based lexing. Sigils are part of the token:
// `%name` is a local (value, label or named type), `@name` a global.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized characters produce `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// Token types. Opcodes, type names and keywords all lex as `Word`; the
/// parser matches them by text.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+|;[^\n]*")]
pub enum Token {
    // ── Symbols ──
    #[token("=")]
    Equals,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("*")]
    Star,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    // ── Metadata ──
    #[token("!dbg")]
    MetaDbg,
    #[token("!range")]
    MetaRange,

    // ── Names ──
    #[regex(r"%[A-Za-z0-9_.]+", strip_sigil)]
    Local(String),
    #[regex(r"@[A-Za-z0-9_.]+", strip_sigil)]
    Global(String),
    #[regex(r"[A-Za-z_][A-Za-z0-9_.]*", |lex| lex.slice().to_string())]
    Word(String),

    // ── Literals ──
    #[regex(r"-?[0-9]+", parse_int)]
    Int(i64),
    #[regex(r"-?[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", parse_float)]
    #[regex(r"-?[0-9]+[eE][+-]?[0-9]+", parse_float)]
    Float(f64),
    #[regex(r#""[^"\n]*""#, parse_string)]
    Str(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Equals => write!(f, "="),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::Star => write!(f, "*"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::MetaDbg => write!(f, "!dbg"),
            Token::MetaRange => write!(f, "!range"),
            Token::Local(n) => write!(f, "%{n}"),
            Token::Global(n) => write!(f, "@{n}"),
            Token::Word(w) => write!(f, "{w}"),
            Token::Int(v) => write!(f, "{v}"),
            Token::Float(v) => write!(f, "{v}"),
            Token::Str(s) => write!(f, "\"{s}\""),
        }
    }
}

// ── Callbacks ──

fn strip_sigil(lex: &mut logos::Lexer<'_, Token>) -> String {
    lex.slice()[1..].to_string()
}

fn parse_int(lex: &mut logos::Lexer<'_, Token>) -> Option<i64> {
    lex.slice().parse().ok()
}

fn parse_float(lex: &mut logos::Lexer<'_, Token>) -> Option<f64> {
    lex.slice().parse().ok()
}

fn parse_string(lex: &mut logos::Lexer<'_, Token>) -> String {
    let slice = lex.slice();
    slice[1..slice.len() - 1].to_string()
}

// ── Public API ──

/// Lex a module source string into tokens.
///
/// Lexing is non-fatal: errors are collected and the lexer continues past
/// bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected character: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: lex and assert no errors, return token list.
    fn lex_ok(source: &str) -> Vec<Token> {
        let result = lex(source);
        assert!(
            result.errors.is_empty(),
            "unexpected lex errors: {:?}",
            result.errors
        );
        result.tokens.into_iter().map(|(t, _)| t).collect()
    }

    fn word(w: &str) -> Token {
        Token::Word(w.to_string())
    }

    #[test]
    fn binary_instruction() {
        let tokens = lex_ok("%sum = add i32 %a, 5");
        assert_eq!(
            tokens,
            vec![
                Token::Local("sum".into()),
                Token::Equals,
                word("add"),
                word("i32"),
                Token::Local("a".into()),
                Token::Comma,
                Token::Int(5),
            ]
        );
    }

    #[test]
    fn dotted_names() {
        let tokens = lex_ok("@llvm.dbg.declare %union.Pun if.then:");
        assert_eq!(
            tokens,
            vec![
                Token::Global("llvm.dbg.declare".into()),
                Token::Local("union.Pun".into()),
                word("if.then"),
                Token::Colon,
            ]
        );
    }

    #[test]
    fn numeric_literals() {
        let tokens = lex_ok("42 -7 3.25 -1.5e3 1e20");
        assert_eq!(
            tokens,
            vec![
                Token::Int(42),
                Token::Int(-7),
                Token::Float(3.25),
                Token::Float(-1500.0),
                Token::Float(1e20),
            ]
        );
    }

    #[test]
    fn metadata_and_strings() {
        let tokens = lex_ok(r#"!dbg("x", "Temperature*") !range("Pressure")"#);
        assert_eq!(
            tokens,
            vec![
                Token::MetaDbg,
                Token::LParen,
                Token::Str("x".into()),
                Token::Comma,
                Token::Str("Temperature*".into()),
                Token::RParen,
                Token::MetaRange,
                Token::LParen,
                Token::Str("Pressure".into()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn comments_and_newlines_are_skipped() {
        let tokens = lex_ok("ret void ; done\n\n  ; another\n");
        assert_eq!(tokens, vec![word("ret"), word("void")]);
    }

    #[test]
    fn pointer_and_array_types() {
        let tokens = lex_ok("[4 x double]*");
        assert_eq!(
            tokens,
            vec![
                Token::LBracket,
                Token::Int(4),
                word("x"),
                word("double"),
                Token::RBracket,
                Token::Star,
            ]
        );
    }

    #[test]
    fn bad_character_is_reported_and_skipped() {
        let result = lex("ret # void");
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains('#'));
        assert_eq!(result.tokens.len(), 2);
    }

    #[test]
    fn spans_are_byte_offsets() {
        let result = lex("  br");
        assert_eq!(result.tokens[0].1, Span { start: 2, end: 4 });
    }
}
