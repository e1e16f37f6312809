use logos::Logos;
use std::fmt;

/// All the kinds of tokens in explang
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum TokenKind {
    // === Keywords ===
    /// var - variable declaration
    #[token("var")]
    Var,

    /// fun - function declaration
    #[token("fun")]
    Fun,

    #[token("while")]
    While,

    #[token("if")]
    If,

    #[token("else")]
    Else,

    #[token("return")]
    Return,

    // === Literals ===
    /// Decimal digits; the parser checks the range once the sign is known
    #[regex(r"[0-9]+", |lex| lex.slice().to_string())]
    Integer(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    // === Operators ===
    #[token("||")]
    OrOr,

    #[token("&&")]
    AndAnd,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("%")]
    Percent,

    #[token("=")]
    Equals,

    #[token("==")]
    EqualsEquals,

    #[token("!=")]
    BangEquals,

    #[token("<")]
    Less,

    #[token("<=")]
    LessEquals,

    #[token(">")]
    Greater,

    #[token(">=")]
    GreaterEquals,

    // === Delimiters ===
    #[token("(")]
    LeftParen,

    #[token(")")]
    RightParen,

    #[token("{")]
    LeftBrace,

    #[token("}")]
    RightBrace,

    #[token(",")]
    Comma,

    /// Optional statement separator
    #[token(";")]
    Semicolon,

    #[regex(r"//[^\n]*", logos::skip)]
    Comment,

    // End of file
    Eof,
}

impl TokenKind {
    /// Operators at the relational level of the precedence ladder
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            TokenKind::Less
                | TokenKind::LessEquals
                | TokenKind::Greater
                | TokenKind::GreaterEquals
                | TokenKind::EqualsEquals
                | TokenKind::BangEquals
        )
    }

    pub fn is_additive(&self) -> bool {
        matches!(self, TokenKind::Plus | TokenKind::Minus)
    }

    pub fn is_multiplicative(&self) -> bool {
        matches!(self, TokenKind::Star | TokenKind::Slash | TokenKind::Percent)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Var => write!(f, "var"),
            TokenKind::Fun => write!(f, "fun"),
            TokenKind::While => write!(f, "while"),
            TokenKind::If => write!(f, "if"),
            TokenKind::Else => write!(f, "else"),
            TokenKind::Return => write!(f, "return"),
            TokenKind::Integer(n) => write!(f, "{}", n),
            TokenKind::Identifier(s) => write!(f, "{}", s),
            TokenKind::OrOr => write!(f, "||"),
            TokenKind::AndAnd => write!(f, "&&"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::Equals => write!(f, "="),
            TokenKind::EqualsEquals => write!(f, "=="),
            TokenKind::BangEquals => write!(f, "!="),
            TokenKind::Less => write!(f, "<"),
            TokenKind::LessEquals => write!(f, "<="),
            TokenKind::Greater => write!(f, ">"),
            TokenKind::GreaterEquals => write!(f, ">="),
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::LeftBrace => write!(f, "{{"),
            TokenKind::RightBrace => write!(f, "}}"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Semicolon => write!(f, ";"),
            TokenKind::Comment => write!(f, "comment"),
            TokenKind::Eof => write!(f, "end of file"),
        }
    }
}

/// A token with its position in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: String, line: usize, column: usize) -> Self {
        Token {
            kind,
            lexeme,
            line,
            column,
        }
    }

    pub fn eof(line: usize, column: usize) -> Self {
        Token {
            kind: TokenKind::Eof,
            lexeme: String::new(),
            line,
            column,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}:{}", self.kind, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_kind_display_keywords() {
        assert_eq!(format!("{}", TokenKind::Var), "var");
        assert_eq!(format!("{}", TokenKind::Fun), "fun");
        assert_eq!(format!("{}", TokenKind::While), "while");
        assert_eq!(format!("{}", TokenKind::If), "if");
        assert_eq!(format!("{}", TokenKind::Else), "else");
        assert_eq!(format!("{}", TokenKind::Return), "return");
    }

    #[test]
    fn test_token_kind_display_operators() {
        assert_eq!(format!("{}", TokenKind::OrOr), "||");
        assert_eq!(format!("{}", TokenKind::AndAnd), "&&");
        assert_eq!(format!("{}", TokenKind::LessEquals), "<=");
        assert_eq!(format!("{}", TokenKind::BangEquals), "!=");
        assert_eq!(format!("{}", TokenKind::LeftBrace), "{");
        assert_eq!(format!("{}", TokenKind::RightBrace), "}");
        assert_eq!(format!("{}", TokenKind::Eof), "end of file");
    }

    #[test]
    fn test_operator_levels() {
        assert!(TokenKind::Less.is_relational());
        assert!(TokenKind::EqualsEquals.is_relational());
        assert!(!TokenKind::Equals.is_relational());
        assert!(TokenKind::Minus.is_additive());
        assert!(TokenKind::Percent.is_multiplicative());
        assert!(!TokenKind::Plus.is_multiplicative());
    }

    #[test]
    fn test_token_display() {
        let token = Token::new(TokenKind::Var, "var".to_string(), 5, 1);
        assert_eq!(format!("{}", token), "var at 5:1");

        let eof = Token::eof(3, 7);
        assert_eq!(eof.kind, TokenKind::Eof);
        assert_eq!(eof.lexeme, "");
        assert_eq!(format!("{}", eof), "end of file at 3:7");
    }
}
