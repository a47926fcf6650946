//! Token kinds and the operator precedence table.

/// The category of a token.
///
/// Word operators (`div`, `and`, `instance`, ...) are lexed as [`TokenKind::Name`]
/// and classified by the parser according to position, so they stay usable
/// as element names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Integer,
    Decimal,
    Double,
    String,
    Name,

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dollar,
    Dot,
    DotDot,
    At,
    Colon,
    ColonColon,
    Assign,
    Question,
    Hash,
    Bang,
    Slash,
    DoubleSlash,
    Pipe,
    Concat,
    Plus,
    Minus,
    Star,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Precedes,
    Follows,
    Arrow,

    Illegal,
    Eof,
}

/// A token with the exact source slice it was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'s> {
    pub kind: TokenKind,
    pub literal: &'s str,
    /// Byte offset into the source.
    pub offset: usize,
    /// Whether whitespace or a comment separates this token from the previous one.
    pub space_before: bool,
}

impl<'s> Token<'s> {
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// True for a name token spelling exactly `word`.
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Name && self.literal == word
    }
}

/// Binding power of infix and postfix operators, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Precedence {
    Comma = 0,
    /// Bodies of `for`, `let`, `some`, `every` and `if`.
    Control = 1,
    Or = 2,
    And = 3,
    Comparison = 4,
    Concat = 5,
    Range = 6,
    Additive = 7,
    Multiplicative = 8,
    SetOps = 9,
    TypeOps = 10,
    Arrow = 11,
    Unary = 12,
    SimpleMap = 13,
    Path = 14,
    Postfix = 15,
}

/// Word operators that are only operators in infix position.
const INFIX_WORDS: &[(&str, Precedence)] = &[
    ("or", Precedence::Or),
    ("and", Precedence::And),
    ("eq", Precedence::Comparison),
    ("ne", Precedence::Comparison),
    ("lt", Precedence::Comparison),
    ("le", Precedence::Comparison),
    ("gt", Precedence::Comparison),
    ("ge", Precedence::Comparison),
    ("is", Precedence::Comparison),
    ("to", Precedence::Range),
    ("div", Precedence::Multiplicative),
    ("idiv", Precedence::Multiplicative),
    ("mod", Precedence::Multiplicative),
    ("union", Precedence::SetOps),
    ("intersect", Precedence::SetOps),
    ("except", Precedence::SetOps),
    ("instance", Precedence::TypeOps),
    ("treat", Precedence::TypeOps),
    ("castable", Precedence::TypeOps),
    ("cast", Precedence::TypeOps),
];

/// Looks up the binding power of `token` when it follows a complete operand.
pub fn infix_precedence(token: &Token<'_>) -> Option<Precedence> {
    use TokenKind::*;
    match token.kind {
        Eq | NotEq | Lt | Le | Gt | Ge | Precedes | Follows => Some(Precedence::Comparison),
        Concat => Some(Precedence::Concat),
        Plus | Minus => Some(Precedence::Additive),
        Star => Some(Precedence::Multiplicative),
        Pipe => Some(Precedence::SetOps),
        Arrow => Some(Precedence::Arrow),
        Bang => Some(Precedence::SimpleMap),
        Slash | DoubleSlash => Some(Precedence::Path),
        LBracket | LParen | Question => Some(Precedence::Postfix),
        Name => INFIX_WORDS
            .iter()
            .find(|(word, _)| *word == token.literal)
            .map(|(_, p)| *p),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(literal: &str) -> Token<'_> {
        Token {
            kind: TokenKind::Name,
            literal,
            offset: 0,
            space_before: true,
        }
    }

    #[test]
    fn test_precedence_ordering() {
        assert!(Precedence::Multiplicative > Precedence::Additive);
        assert!(Precedence::Additive > Precedence::Range);
        assert!(Precedence::Comparison > Precedence::And);
        assert!(Precedence::And > Precedence::Or);
        assert!(Precedence::Path > Precedence::SimpleMap);
        assert!(Precedence::Postfix > Precedence::Path);
    }

    #[test]
    fn test_word_operators() {
        assert_eq!(infix_precedence(&name("div")), Some(Precedence::Multiplicative));
        assert_eq!(infix_precedence(&name("intersect")), Some(Precedence::SetOps));
        assert_eq!(infix_precedence(&name("cast")), Some(Precedence::TypeOps));
        assert_eq!(infix_precedence(&name("title")), None);
    }
}
