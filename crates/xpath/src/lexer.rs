//! On-demand tokenizer.
//!
//! Literals and names are recognized with nom combinators; operators are
//! matched greedily against a longest-first table.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{is_not, tag, take_while, take_while1},
    character::complete::{char, digit0, digit1, one_of},
    combinator::{opt, recognize},
    multi::many0_count,
    sequence::pair,
};

use crate::token::{Token, TokenKind};

/// Multi-character operators come before their single-character prefixes.
const OPERATORS: &[(&str, TokenKind)] = &[
    ("<<", TokenKind::Precedes),
    (">>", TokenKind::Follows),
    ("<=", TokenKind::Le),
    (">=", TokenKind::Ge),
    ("!=", TokenKind::NotEq),
    ("=>", TokenKind::Arrow),
    ("||", TokenKind::Concat),
    ("//", TokenKind::DoubleSlash),
    ("::", TokenKind::ColonColon),
    (":=", TokenKind::Assign),
    ("..", TokenKind::DotDot),
    ("(", TokenKind::LParen),
    (")", TokenKind::RParen),
    ("[", TokenKind::LBracket),
    ("]", TokenKind::RBracket),
    ("{", TokenKind::LBrace),
    ("}", TokenKind::RBrace),
    (",", TokenKind::Comma),
    ("$", TokenKind::Dollar),
    (".", TokenKind::Dot),
    ("@", TokenKind::At),
    (":", TokenKind::Colon),
    ("?", TokenKind::Question),
    ("#", TokenKind::Hash),
    ("!", TokenKind::Bang),
    ("/", TokenKind::Slash),
    ("|", TokenKind::Pipe),
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("*", TokenKind::Star),
    ("=", TokenKind::Eq),
    ("<", TokenKind::Lt),
    (">", TokenKind::Gt),
];

pub struct Lexer<'s> {
    source: &'s str,
    pos: usize,
}

impl<'s> Lexer<'s> {
    pub fn new(source: &'s str) -> Self {
        Self { source, pos: 0 }
    }

    /// The unread part of the source.
    pub fn remaining(&self) -> &'s str {
        &self.source[self.pos..]
    }

    /// The next character that is not whitespace or inside a comment,
    /// without consuming anything.
    pub fn peek_next_nonspace_char(&self) -> Option<char> {
        let rest = self.remaining();
        rest[trivia_len(rest)..].chars().next()
    }

    /// Reads the next token. At the end of input this keeps returning
    /// [`TokenKind::Eof`].
    pub fn next_token(&mut self) -> Token<'s> {
        let skipped = trivia_len(self.remaining());
        self.pos += skipped;
        let space_before = skipped > 0 || self.pos == 0;
        let rest = self.remaining();
        let offset = self.pos;

        let (kind, len) = match rest.chars().next() {
            None => (TokenKind::Eof, 0),
            Some(c) if c.is_ascii_digit() || (c == '.' && starts_with_digit(&rest[1..])) => {
                match number(rest) {
                    Ok((after, kind)) => (kind, rest.len() - after.len()),
                    Err(_) => (TokenKind::Illegal, c.len_utf8()),
                }
            }
            Some('"' | '\'') => match string_literal(rest) {
                Ok((after, _)) => (TokenKind::String, rest.len() - after.len()),
                // An unterminated string swallows the rest of the input.
                Err(_) => (TokenKind::Illegal, rest.len()),
            },
            Some(c) if is_name_start(c) => match ncname(rest) {
                Ok((_, name)) => (TokenKind::Name, name.len()),
                Err(_) => (TokenKind::Illegal, c.len_utf8()),
            },
            Some(c) => OPERATORS
                .iter()
                .find(|(op, _)| rest.starts_with(op))
                .map(|(op, kind)| (*kind, op.len()))
                .unwrap_or((TokenKind::Illegal, c.len_utf8())),
        };

        self.pos += len;
        Token {
            kind,
            literal: &rest[..len],
            offset,
            space_before,
        }
    }
}

impl<'s> Iterator for Lexer<'s> {
    type Item = Token<'s>;

    fn next(&mut self) -> Option<Token<'s>> {
        let token = self.next_token();
        (token.kind != TokenKind::Eof).then_some(token)
    }
}

/// Length in bytes of the whitespace and `(: ... :)` comments at the start of `input`.
pub(crate) fn trivia_len(input: &str) -> usize {
    let mut pos = 0;
    loop {
        let rest = &input[pos..];
        let trimmed = rest.trim_start();
        pos += rest.len() - trimmed.len();
        if trimmed.starts_with("(:") {
            pos += comment_len(trimmed);
        } else {
            return pos;
        }
    }
}

/// Length of a comment starting at `input`, honouring nesting. An
/// unterminated comment runs to the end of input.
pub(crate) fn comment_len(input: &str) -> usize {
    let mut depth = 0usize;
    let mut pos = 0;
    while pos < input.len() {
        let rest = &input[pos..];
        if rest.starts_with("(:") {
            depth += 1;
            pos += 2;
        } else if rest.starts_with(":)") {
            depth -= 1;
            pos += 2;
            if depth == 0 {
                return pos;
            }
        } else {
            pos += rest.chars().next().map_or(1, |c| c.len_utf8());
        }
    }
    input.len()
}

fn starts_with_digit(input: &str) -> bool {
    input.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

/// An unprefixed name. Hyphens are allowed inside a name but never end one.
pub fn ncname(input: &str) -> IResult<&str, &str> {
    let (_, raw) = recognize(pair(take_while1(is_name_start), take_while(is_name_char)))
        .parse(input)?;
    let name = raw.trim_end_matches('-');
    Ok((&input[name.len()..], name))
}

/// True when `s` is exactly one unprefixed name.
pub fn is_ncname(s: &str) -> bool {
    matches!(ncname(s), Ok(("", _)))
}

/// Numeric literal: integer `12`, decimal `1.5` / `.5` / `2.`, double `1e3`.
/// The exponent is only taken when digits follow it.
fn number(input: &str) -> IResult<&str, TokenKind> {
    let (rest, mantissa) = alt((
        recognize((digit1, opt((char('.'), digit0)))),
        recognize((char('.'), digit1)),
    ))
    .parse(input)?;
    let (rest, exponent) =
        opt(recognize((one_of("eE"), opt(one_of("+-")), digit1))).parse(rest)?;

    let kind = if exponent.is_some() {
        TokenKind::Double
    } else if mantissa.contains('.') {
        TokenKind::Decimal
    } else {
        TokenKind::Integer
    };
    Ok((rest, kind))
}

/// A quoted string; a doubled quote stands for one quote character.
fn string_literal(input: &str) -> IResult<&str, &str> {
    alt((
        recognize((
            char('"'),
            many0_count(alt((tag("\"\""), is_not("\"")))),
            char('"'),
        )),
        recognize((
            char('\''),
            many0_count(alt((tag("''"), is_not("'")))),
            char('\''),
        )),
    ))
    .parse(input)
}

/// Strips the quotes from a string literal and collapses doubled quotes.
pub fn unescape_string(literal: &str) -> String {
    let Some(quote) = literal.chars().next() else {
        return String::new();
    };
    let inner = literal
        .get(1..literal.len().saturating_sub(1))
        .unwrap_or_default();
    let doubled: String = [quote, quote].iter().collect();
    inner.replace(&doubled, &quote.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source).map(|t| t.kind).collect()
    }

    fn literals(source: &str) -> Vec<&str> {
        Lexer::new(source).map(|t| t.literal).collect()
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("12 1.5 .5 2. 1e3 1.5E-2"),
            vec![
                TokenKind::Integer,
                TokenKind::Decimal,
                TokenKind::Decimal,
                TokenKind::Decimal,
                TokenKind::Double,
                TokenKind::Double
            ]
        );
    }

    #[test]
    fn test_exponent_requires_digits() {
        assert_eq!(literals("1eq 2"), vec!["1", "eq", "2"]);
        assert_eq!(kinds("1e"), vec![TokenKind::Integer, TokenKind::Name]);
    }

    #[test]
    fn test_greedy_operators() {
        assert_eq!(
            kinds("<< < // / := :: : || | => = != ! .. ."),
            vec![
                TokenKind::Precedes,
                TokenKind::Lt,
                TokenKind::DoubleSlash,
                TokenKind::Slash,
                TokenKind::Assign,
                TokenKind::ColonColon,
                TokenKind::Colon,
                TokenKind::Concat,
                TokenKind::Pipe,
                TokenKind::Arrow,
                TokenKind::Eq,
                TokenKind::NotEq,
                TokenKind::Bang,
                TokenKind::DotDot,
                TokenKind::Dot
            ]
        );
    }

    #[test]
    fn test_strings() {
        let tokens: Vec<Token> = Lexer::new(r#"'it''s' "say ""hi""""#).collect();
        assert_eq!(tokens.len(), 2);
        assert_eq!(unescape_string(tokens[0].literal), "it's");
        assert_eq!(unescape_string(tokens[1].literal), r#"say "hi""#);
    }

    #[test]
    fn test_unterminated_string_is_illegal() {
        let tokens: Vec<Token> = Lexer::new("1 + 'abc").collect();
        assert_eq!(tokens[2].kind, TokenKind::Illegal);
        assert_eq!(tokens[2].literal, "'abc");
    }

    #[test]
    fn test_names_and_hyphens() {
        assert_eq!(literals("string-length(a- b)"), vec!["string-length", "(", "a", "-", "b", ")"]);
        assert_eq!(literals("$x-1"), vec!["$", "x-1"]);
    }

    #[test]
    fn test_space_before_flag() {
        let tokens: Vec<Token> = Lexer::new("fn:count (a)").collect();
        let flags: Vec<bool> = tokens.iter().map(|t| t.space_before).collect();
        assert_eq!(flags, vec![true, false, false, true, false, false]);
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(literals("1 (: one (: nested :) :) + 2"), vec!["1", "+", "2"]);
        let mut lexer = Lexer::new("  (: c :) x");
        assert_eq!(lexer.peek_next_nonspace_char(), Some('x'));
        assert_eq!(lexer.next_token().literal, "x");
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }

    #[test]
    fn test_illegal_character() {
        let tokens: Vec<Token> = Lexer::new("1 ; 2").collect();
        assert_eq!(tokens[1].kind, TokenKind::Illegal);
        assert_eq!(tokens[1].offset, 2);
        assert_eq!(tokens[2].literal, "2");
    }

    #[test]
    fn test_remaining() {
        let mut lexer = Lexer::new("a/b");
        lexer.next_token();
        assert_eq!(lexer.remaining(), "/b");
    }
}
