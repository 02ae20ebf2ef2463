//! Lexer (tokenizer) for source programs
//!
//! Converts raw source text into a flat [`Token`] stream consumed by the
//! predictive parser. The stream always ends with exactly one end-of-input
//! sentinel (see [`Token::end`]).
//!
//! Numeric literals are kept as text: range checking happens during semantic
//! analysis so that overflow is reported with the rest of the diagnostics.

use super::ast::SourceLocation;
use std::fmt;

/// Lexeme carried by the end-of-input sentinel.
pub const END_MARKER: &str = "$";

/// Closed set of token categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals
    Identifier,
    IntLiteral,
    FloatLiteral,
    StringLiteral,
    True,
    False,

    // Keywords
    Int,
    Float,
    Boolean,
    Void,
    If,
    Else,
    While,
    Do,
    For,
    Break,
    Continue,
    Return,

    // Operators
    Plus,   // +
    Minus,  // -
    Star,   // *
    Slash,  // /
    Assign, // =
    EqEq,   // ==
    NotEq,  // !=
    Lt,     // <
    Gt,     // >
    Le,     // <=
    Ge,     // >=
    AndAnd, // &&
    OrOr,   // ||
    Bang,   // !

    // Punctuation
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }
    Semicolon, // ;
    Comma,     // ,
}

impl TokenKind {
    /// Grammar terminal name for kinds that carry a lexeme.
    pub fn category(self) -> Option<&'static str> {
        match self {
            TokenKind::Identifier => Some("identifier"),
            TokenKind::IntLiteral => Some("int-literal"),
            TokenKind::FloatLiteral => Some("float-literal"),
            TokenKind::StringLiteral => Some("string-literal"),
            _ => None,
        }
    }

    /// Fixed source spelling for keywords, operators and punctuation.
    pub fn spelling(self) -> Option<&'static str> {
        let text = match self {
            TokenKind::Identifier
            | TokenKind::IntLiteral
            | TokenKind::FloatLiteral
            | TokenKind::StringLiteral => return None,
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Int => "int",
            TokenKind::Float => "float",
            TokenKind::Boolean => "boolean",
            TokenKind::Void => "void",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::Do => "do",
            TokenKind::For => "for",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Return => "return",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Assign => "=",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::Le => "<=",
            TokenKind::Ge => ">=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Bang => "!",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Semicolon => ";",
            TokenKind::Comma => ",",
        };
        Some(text)
    }

    /// The grammar terminal this kind matches: its category if it has one,
    /// otherwise its spelling.
    pub fn terminal(self) -> &'static str {
        self.category().or(self.spelling()).unwrap_or(END_MARKER)
    }
}

/// A single token.
///
/// `kind` is `None` only for the end-of-input sentinel. `lexeme` is set for
/// identifiers and literals and absent for everything spelled by its kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: Option<TokenKind>,
    pub lexeme: Option<String>,
    pub location: SourceLocation,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: Option<String>, location: SourceLocation) -> Self {
        Token {
            kind: Some(kind),
            lexeme,
            location,
        }
    }

    /// The end-of-input sentinel.
    pub fn end(location: SourceLocation) -> Self {
        Token {
            kind: None,
            lexeme: Some(END_MARKER.to_string()),
            location,
        }
    }

    /// A token that does not come from source text (line 0).
    pub fn synthetic(kind: TokenKind, lexeme: Option<String>) -> Self {
        Token::new(kind, lexeme, SourceLocation::new(0, 0))
    }

    pub fn is_end(&self) -> bool {
        self.kind.is_none()
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == Some(kind)
    }

    /// Grammar terminal matched by this token (`"$"` for the sentinel).
    pub fn terminal(&self) -> &'static str {
        self.kind.map_or(END_MARKER, TokenKind::terminal)
    }

    /// Source text: the lexeme when present, otherwise the kind's spelling.
    pub fn text(&self) -> &str {
        match (&self.lexeme, self.kind) {
            (Some(lexeme), _) => lexeme,
            (None, Some(kind)) => kind.spelling().unwrap_or_default(),
            (None, None) => END_MARKER,
        }
    }

    /// Whether this token satisfies the grammar terminal `terminal`.
    pub fn matches(&self, terminal: &str) -> bool {
        self.kind.is_some() && self.terminal() == terminal
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            None => write!(f, "end of file"),
            Some(TokenKind::Identifier) => write!(f, "identifier '{}'", self.text()),
            Some(TokenKind::IntLiteral) | Some(TokenKind::FloatLiteral) => {
                write!(f, "number '{}'", self.text())
            }
            Some(TokenKind::StringLiteral) => write!(f, "string \"{}\"", self.text()),
            Some(_) => write!(f, "'{}'", self.text()),
        }
    }
}

/// Lexer error type
#[derive(Debug)]
pub struct LexError {
    pub message: String,
    pub location: SourceLocation,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lexer error at line {}, column {}: {}",
            self.location.line, self.location.column, self.message
        )
    }
}

impl std::error::Error for LexError {}

/// Lexer for source programs
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    /// Create a new lexer for the given source string.
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments()?;

            if self.is_at_end() {
                tokens.push(Token::end(self.current_location()));
                break;
            }

            tokens.push(self.next_token()?);
        }

        Ok(tokens)
    }

    /// Get next token
    fn next_token(&mut self) -> Result<Token, LexError> {
        let loc = self.current_location();
        let ch = self.advance().ok_or_else(|| LexError {
            message: "Unexpected end of file".to_string(),
            location: loc,
        })?;

        let kind = match ch {
            '"' => return self.string_literal(loc),
            '0'..='9' => return Ok(self.number_literal(ch, loc)),
            'a'..='z' | 'A'..='Z' | '_' => return Ok(self.identifier_or_keyword(ch, loc)),

            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '=' => self.either('=', TokenKind::EqEq, TokenKind::Assign),
            '!' => self.either('=', TokenKind::NotEq, TokenKind::Bang),
            '<' => self.either('=', TokenKind::Le, TokenKind::Lt),
            '>' => self.either('=', TokenKind::Ge, TokenKind::Gt),
            '&' if self.peek() == Some('&') => {
                self.advance();
                TokenKind::AndAnd
            }
            '|' if self.peek() == Some('|') => {
                self.advance();
                TokenKind::OrOr
            }
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,

            _ => {
                return Err(LexError {
                    message: format!("Unexpected character: '{}'", ch),
                    location: loc,
                })
            }
        };

        Ok(Token::new(kind, None, loc))
    }

    /// Two-character operator if the next char is `second`, else the single one.
    fn either(&mut self, second: char, double: TokenKind, single: TokenKind) -> TokenKind {
        if self.peek() == Some(second) {
            self.advance();
            double
        } else {
            single
        }
    }

    /// Parse string literal
    fn string_literal(&mut self, loc: SourceLocation) -> Result<Token, LexError> {
        let mut string = String::new();

        while let Some(ch) = self.peek() {
            if ch == '"' {
                self.advance(); // consume closing quote
                return Ok(Token::new(TokenKind::StringLiteral, Some(string), loc));
            }

            if ch == '\\' {
                self.advance();
                let escaped = self.advance().ok_or_else(|| LexError {
                    message: "Unexpected end of file in string literal".to_string(),
                    location: self.current_location(),
                })?;

                let unescaped = match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '\\' => '\\',
                    '"' => '"',
                    '0' => '\0',
                    _ => {
                        return Err(LexError {
                            message: format!("Unknown escape sequence: \\{}", escaped),
                            location: self.current_location(),
                        });
                    }
                };
                string.push(unescaped);
            } else {
                string.push(ch);
                self.advance();
            }
        }

        Err(LexError {
            message: "Unterminated string literal".to_string(),
            location: loc,
        })
    }

    /// Parse numeric literal; a `.` after the integer part makes it a float
    fn number_literal(&mut self, first_digit: char, loc: SourceLocation) -> Token {
        let mut num_str = String::new();
        num_str.push(first_digit);
        self.take_digits(&mut num_str);

        let kind = if self.peek() == Some('.') {
            num_str.push('.');
            self.advance();
            self.take_digits(&mut num_str);
            TokenKind::FloatLiteral
        } else {
            TokenKind::IntLiteral
        };

        Token::new(kind, Some(num_str), loc)
    }

    fn take_digits(&mut self, into: &mut String) {
        while let Some(ch) = self.peek() {
            if !ch.is_ascii_digit() {
                break;
            }
            into.push(ch);
            self.advance();
        }
    }

    /// Parse identifier or keyword
    fn identifier_or_keyword(&mut self, first_char: char, loc: SourceLocation) -> Token {
        let mut ident = String::new();
        ident.push(first_char);

        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let keyword = match ident.as_str() {
            "int" => TokenKind::Int,
            "float" => TokenKind::Float,
            "boolean" => TokenKind::Boolean,
            "void" => TokenKind::Void,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "do" => TokenKind::Do,
            "for" => TokenKind::For,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "return" => TokenKind::Return,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => return Token::new(TokenKind::Identifier, Some(ident), loc),
        };

        Token::new(keyword, None, loc)
    }

    /// Skip whitespace and comments
    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') | Some('\n') => {
                    self.advance();
                }
                Some('/') => {
                    if self.peek_ahead(1) == Some('/') {
                        self.skip_line_comment();
                    } else if self.peek_ahead(1) == Some('*') {
                        self.skip_block_comment()?;
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    /// Skip single-line comment (// ...)
    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek() {
            self.advance();
            if ch == '\n' {
                break;
            }
        }
    }

    /// Skip multi-line comment (/* ... */)
    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        let start_loc = self.current_location();
        self.advance(); // skip '/'
        self.advance(); // skip '*'

        while !self.is_at_end() {
            if self.peek() == Some('*') && self.peek_ahead(1) == Some('/') {
                self.advance(); // skip '*'
                self.advance(); // skip '/'
                return Ok(());
            }
            self.advance();
        }

        Err(LexError {
            message: "Unterminated block comment".to_string(),
            location: start_loc,
        })
    }

    /// Peek at current character without consuming
    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    /// Peek ahead n characters
    fn peek_ahead(&self, n: usize) -> Option<char> {
        self.input.get(self.position + n).copied()
    }

    /// Advance to next character
    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.position += 1;

        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        Some(ch)
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn current_location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Option<TokenKind>> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_tokens() {
        let mut lexer = Lexer::new("void main() { return; }");
        let tokens = lexer.tokenize().unwrap();

        assert!(tokens[0].is(TokenKind::Void));
        assert!(tokens[1].is(TokenKind::Identifier));
        assert_eq!(tokens[1].lexeme.as_deref(), Some("main"));
        assert!(tokens[2].is(TokenKind::LParen));
        assert!(tokens[3].is(TokenKind::RParen));
        assert!(tokens[4].is(TokenKind::LBrace));
        assert!(tokens[5].is(TokenKind::Return));
        assert!(tokens[6].is(TokenKind::Semicolon));
        assert!(tokens[7].is(TokenKind::RBrace));
        assert!(tokens[8].is_end());
        assert_eq!(tokens.len(), 9);
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("== != <= >= < > = ! && ||"),
            vec![
                Some(TokenKind::EqEq),
                Some(TokenKind::NotEq),
                Some(TokenKind::Le),
                Some(TokenKind::Ge),
                Some(TokenKind::Lt),
                Some(TokenKind::Gt),
                Some(TokenKind::Assign),
                Some(TokenKind::Bang),
                Some(TokenKind::AndAnd),
                Some(TokenKind::OrOr),
                None,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let tokens = Lexer::new("42 3.25 7.").tokenize().unwrap();

        assert!(tokens[0].is(TokenKind::IntLiteral));
        assert_eq!(tokens[0].text(), "42");
        assert!(tokens[1].is(TokenKind::FloatLiteral));
        assert_eq!(tokens[1].text(), "3.25");
        assert!(tokens[2].is(TokenKind::FloatLiteral));
        assert_eq!(tokens[2].text(), "7.");
    }

    #[test]
    fn test_comments() {
        let tokens = kinds("int x; // comment\nint y; /* block\ncomment */ int z;");
        assert_eq!(tokens.len(), 10);
        assert_eq!(tokens[3], Some(TokenKind::Int));
        assert_eq!(tokens[6], Some(TokenKind::Int));
    }

    #[test]
    fn test_string_literal() {
        let tokens = Lexer::new(r#""hello\nworld""#).tokenize().unwrap();

        assert!(tokens[0].is(TokenKind::StringLiteral));
        assert_eq!(tokens[0].lexeme.as_deref(), Some("hello\nworld"));
    }

    #[test]
    fn test_locations() {
        let tokens = Lexer::new("int\n  x").tokenize().unwrap();
        assert_eq!(tokens[0].location, SourceLocation::new(1, 1));
        assert_eq!(tokens[1].location, SourceLocation::new(2, 3));
    }

    #[test]
    fn test_terminal_matching() {
        let tokens = Lexer::new("count true ;").tokenize().unwrap();

        assert!(tokens[0].matches("identifier"));
        assert!(!tokens[0].matches("count"));
        assert!(tokens[1].matches("true"));
        assert!(tokens[2].matches(";"));
        assert!(!tokens[3].matches("$"));
        assert_eq!(tokens[3].terminal(), "$");
    }

    #[test]
    fn test_errors() {
        assert!(Lexer::new("int x = 5 @ 3;").tokenize().is_err());
        assert!(Lexer::new("\"open").tokenize().is_err());
        assert!(Lexer::new("/* never closed").tokenize().is_err());
        assert!(Lexer::new("a & b").tokenize().is_err());
    }
}
