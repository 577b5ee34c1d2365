use std::fmt::Display;

use tracing::{debug, trace};

use crate::position::Position;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub position: Position,
    pub kind: TokenKind,
}

impl Token {
    pub fn kind(&self) -> &TokenKind {
        &self.kind
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    String(String),
    Identifier(String),
    Keyword(Keyword),

    // Punctuation
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,
    Colon,
    Semicolon,

    // Operators
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    Bang,
    BangEqual,
    EqualEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    AndAnd,
    OrOr,
    Pipe,
    QuestionQuestion,
    Assign(AssignOperator),

    // End of file
    Eof,
}

/// Which assignment form was written. Plain `=` is kept distinct from the
/// compound forms so the parser can tell them apart without looking back at
/// the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOperator {
    Assign,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Let,
    Const,
    Var,
    Func,
    Class,
    Return,
    If,
    Else,
    While,
    For,
    In,
    Break,
    Continue,
    Import,
    Export,
    True,
    False,
    Nil,
}

impl Keyword {
    fn from_identifier(identifier: &str) -> Option<Self> {
        let keyword = match identifier {
            "let" => Keyword::Let,
            "const" => Keyword::Const,
            "var" => Keyword::Var,
            "func" => Keyword::Func,
            "class" => Keyword::Class,
            "return" => Keyword::Return,
            "if" => Keyword::If,
            "else" => Keyword::Else,
            "while" => Keyword::While,
            "for" => Keyword::For,
            "in" => Keyword::In,
            "break" => Keyword::Break,
            "continue" => Keyword::Continue,
            "import" => Keyword::Import,
            "export" => Keyword::Export,
            "true" => Keyword::True,
            "false" => Keyword::False,
            "nil" => Keyword::Nil,
            _ => return None,
        };
        Some(keyword)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Let => "let",
            Keyword::Const => "const",
            Keyword::Var => "var",
            Keyword::Func => "func",
            Keyword::Class => "class",
            Keyword::Return => "return",
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::While => "while",
            Keyword::For => "for",
            Keyword::In => "in",
            Keyword::Break => "break",
            Keyword::Continue => "continue",
            Keyword::Import => "import",
            Keyword::Export => "export",
            Keyword::True => "true",
            Keyword::False => "false",
            Keyword::Nil => "nil",
        }
    }
}

impl Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for AssignOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignOperator::Assign => write!(f, "="),
            AssignOperator::Add => write!(f, "+="),
            AssignOperator::Subtract => write!(f, "-="),
            AssignOperator::Multiply => write!(f, "*="),
            AssignOperator::Divide => write!(f, "/="),
            AssignOperator::Modulo => write!(f, "%="),
            AssignOperator::Pow => write!(f, "**="),
        }
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "number {}", n),
            TokenKind::String(s) => write!(f, "string '{}'", s),
            TokenKind::Identifier(name) => write!(f, "identifier '{}'", name),
            TokenKind::Keyword(keyword) => write!(f, "'{}'", keyword),
            TokenKind::Eof => write!(f, "end of file"),
            TokenKind::Assign(op) => write!(f, "'{}'", op),
            punctuation => write!(f, "'{}'", punctuation.symbol()),
        }
    }
}

impl TokenKind {
    fn symbol(&self) -> &'static str {
        SINGLE_TOKENS
            .iter()
            .chain(DOUBLE_TOKENS)
            .chain(TRIPLE_TOKENS)
            .find(|(_, kind)| kind == self)
            .map_or("?", |(symbol, _)| *symbol)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexError {
    #[error("IllegalCharacterError: '{character}'\n    at {position}")]
    IllegalCharacter { character: char, position: Position },
}

impl LexError {
    pub fn position(&self) -> &Position {
        match self {
            LexError::IllegalCharacter { position, .. } => position,
        }
    }
}

const STRING_DELIMITERS: [char; 3] = ['\'', '"', '`'];

const TRIPLE_TOKENS: &[(&str, TokenKind)] = &[("**=", TokenKind::Assign(AssignOperator::Pow))];

const DOUBLE_TOKENS: &[(&str, TokenKind)] = &[
    ("==", TokenKind::EqualEqual),
    ("!=", TokenKind::BangEqual),
    ("<=", TokenKind::LessEqual),
    (">=", TokenKind::GreaterEqual),
    ("&&", TokenKind::AndAnd),
    ("||", TokenKind::OrOr),
    ("??", TokenKind::QuestionQuestion),
    ("**", TokenKind::StarStar),
    ("+=", TokenKind::Assign(AssignOperator::Add)),
    ("-=", TokenKind::Assign(AssignOperator::Subtract)),
    ("*=", TokenKind::Assign(AssignOperator::Multiply)),
    ("/=", TokenKind::Assign(AssignOperator::Divide)),
    ("%=", TokenKind::Assign(AssignOperator::Modulo)),
];

const SINGLE_TOKENS: &[(&str, TokenKind)] = &[
    ("(", TokenKind::LeftParen),
    (")", TokenKind::RightParen),
    ("{", TokenKind::LeftBrace),
    ("}", TokenKind::RightBrace),
    ("[", TokenKind::LeftBracket),
    ("]", TokenKind::RightBracket),
    (",", TokenKind::Comma),
    (".", TokenKind::Dot),
    (":", TokenKind::Colon),
    (";", TokenKind::Semicolon),
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("*", TokenKind::Star),
    ("/", TokenKind::Slash),
    ("%", TokenKind::Percent),
    ("<", TokenKind::Less),
    (">", TokenKind::Greater),
    ("!", TokenKind::Bang),
    ("|", TokenKind::Pipe),
    ("=", TokenKind::Assign(AssignOperator::Assign)),
];

/// Splits `source` into tokens. The result always ends with exactly one
/// [`TokenKind::Eof`]; the first illegal character aborts with no tokens.
pub fn tokenize(source: &str, file_name: &str) -> Result<Vec<Token>, LexError> {
    let mut cursor = Cursor {
        rest: source,
        position: Position::start(file_name),
    };
    let mut tokens = Vec::new();

    loop {
        cursor.skip_trivia();
        if cursor.rest.is_empty() {
            tokens.push(Token {
                position: cursor.position.clone(),
                kind: TokenKind::Eof,
            });
            break;
        }
        let token = cursor.token()?;
        trace!(target: "es::lexer", kind = ?token.kind, at = %token.position, "token");
        tokens.push(token);
    }

    debug!(target: "es::lexer", file = file_name, count = tokens.len(), "tokenized");
    Ok(tokens)
}

struct Cursor<'a> {
    rest: &'a str,
    position: Position,
}

impl<'a> Cursor<'a> {
    fn skip_trivia(&mut self) {
        while let Some(rest) = whitespace(self.rest).or_else(|| comment(self.rest)) {
            self.advance_to(rest);
        }
    }

    fn token(&mut self) -> Result<Token, LexError> {
        let start = self.position.clone();
        let Some(first) = self.rest.chars().next() else {
            return Ok(Token {
                position: start,
                kind: TokenKind::Eof,
            });
        };

        let scanned = if first.is_ascii_digit() {
            number(self.rest)
        } else if is_identifier_start(first) {
            Some(identifier(self.rest))
        } else if STRING_DELIMITERS.contains(&first) {
            Some(string(self.rest))
        } else {
            operator(self.rest)
        };

        match scanned {
            Some((kind, rest)) => {
                self.advance_to(rest);
                Ok(Token {
                    position: start,
                    kind,
                })
            }
            None => Err(LexError::IllegalCharacter {
                character: first,
                position: start,
            }),
        }
    }

    fn advance_to(&mut self, rest: &'a str) {
        let consumed = &self.rest[..self.rest.len() - rest.len()];
        for c in consumed.chars() {
            self.position.advance(c);
        }
        self.rest = rest;
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_char(c: char) -> bool {
    is_identifier_start(c) || c.is_ascii_digit()
}

fn whitespace(source: &str) -> Option<&str> {
    let len: usize = source
        .chars()
        .take_while(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
        .map(char::len_utf8)
        .sum();
    (len > 0).then(|| &source[len..])
}

fn comment(source: &str) -> Option<&str> {
    if let Some(body) = source.strip_prefix("//") {
        return Some(match body.find('\n') {
            Some(end) => &body[end + 1..],
            None => "",
        });
    }
    if let Some(body) = source.strip_prefix("/*") {
        return Some(match body.find("*/") {
            Some(end) => &body[end + 2..],
            None => "",
        });
    }
    None
}

fn number(source: &str) -> Option<(TokenKind, &str)> {
    let mut text = String::new();
    let mut seen_dot = false;
    let mut len = 0;

    for (i, c) in source.char_indices() {
        match c {
            '0'..='9' => text.push(c),
            '_' => {}
            '.' => {
                let next_is_digit = source[i + 1..]
                    .chars()
                    .next()
                    .is_some_and(|next| next.is_ascii_digit());
                if seen_dot || !next_is_digit {
                    break;
                }
                seen_dot = true;
                text.push('.');
            }
            _ => break,
        }
        len = i + c.len_utf8();
    }

    let value = text.parse().ok()?;
    Some((TokenKind::Number(value), &source[len..]))
}

fn identifier(source: &str) -> (TokenKind, &str) {
    let len = source
        .chars()
        .take_while(|c| is_identifier_char(*c))
        .map(char::len_utf8)
        .sum();
    let word = &source[..len];
    let kind = match Keyword::from_identifier(word) {
        Some(keyword) => TokenKind::Keyword(keyword),
        None => TokenKind::Identifier(word.to_string()),
    };
    (kind, &source[len..])
}

fn string(source: &str) -> (TokenKind, &str) {
    let mut chars = source.char_indices();
    let delimiter = chars.next().map_or('"', |(_, c)| c);
    let mut value = String::new();

    while let Some((i, c)) = chars.next() {
        match c {
            c if c == delimiter => {
                return (TokenKind::String(value), &source[i + c.len_utf8()..]);
            }
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, escaped)) => value.push(escaped),
                None => break,
            },
            c => value.push(c),
        }
    }

    // Unterminated strings run to the end of the input.
    (TokenKind::String(value), "")
}

fn operator(source: &str) -> Option<(TokenKind, &str)> {
    [TRIPLE_TOKENS, DOUBLE_TOKENS, SINGLE_TOKENS]
        .iter()
        .find_map(|table| {
            table
                .iter()
                .find(|(symbol, _)| source.starts_with(*symbol))
                .map(|(symbol, kind)| (kind.clone(), &source[symbol.len()..]))
        })
}

#[cfg(test)]
mod test {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source, "test.es")
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_tokens() {
        let expected = vec![
            TokenKind::Keyword(Keyword::Let),
            TokenKind::Identifier("x".to_string()),
            TokenKind::Assign(AssignOperator::Assign),
            TokenKind::Number(1.0),
            TokenKind::Semicolon,
            TokenKind::Eof,
        ];
        assert_eq!(kinds("let x = 1;"), expected);
    }

    #[test]
    fn test_empty_source_has_single_eof() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
        assert_eq!(kinds("  \n\t // only a comment"), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_tokens_with_comments() {
        let expected = vec![
            TokenKind::Identifier("a".to_string()),
            TokenKind::Identifier("b".to_string()),
            TokenKind::Eof,
        ];
        assert_eq!(kinds("a // comment\nb"), expected);
        assert_eq!(kinds("a /* multi\nline */ b"), expected);
    }

    #[test]
    fn test_second_dot_ends_number() {
        let tokens = tokenize("3.14.5", "test.es").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Number(3.14));
        assert_eq!(tokens[1].kind, TokenKind::Dot);
        assert_eq!(tokens[1].position.index, 4);
        assert_eq!(tokens[2].kind, TokenKind::Number(5.0));
        assert_eq!(tokens[3].kind, TokenKind::Eof);
    }

    #[test]
    fn test_underscore_separator() {
        assert_eq!(kinds("1_000"), vec![TokenKind::Number(1000.0), TokenKind::Eof]);
    }

    #[test]
    fn test_dot_without_digit_is_member_access() {
        assert_eq!(
            kinds("1.len"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Dot,
                TokenKind::Identifier("len".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            kinds(r#""a" `bc` 'defg'"#),
            vec![
                TokenKind::String("a".to_string()),
                TokenKind::String("bc".to_string()),
                TokenKind::String("defg".to_string()),
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds(r"'h\'h\n'"),
            vec![TokenKind::String("h'h\n".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_unterminated_string_stops_at_end() {
        assert_eq!(
            kinds("'abc"),
            vec![TokenKind::String("abc".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_longest_operator_wins() {
        assert_eq!(
            kinds("a **= b ** c * d"),
            vec![
                TokenKind::Identifier("a".to_string()),
                TokenKind::Assign(AssignOperator::Pow),
                TokenKind::Identifier("b".to_string()),
                TokenKind::StarStar,
                TokenKind::Identifier("c".to_string()),
                TokenKind::Star,
                TokenKind::Identifier("d".to_string()),
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("a==b+=c"),
            vec![
                TokenKind::Identifier("a".to_string()),
                TokenKind::EqualEqual,
                TokenKind::Identifier("b".to_string()),
                TokenKind::Assign(AssignOperator::Add),
                TokenKind::Identifier("c".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("class $cls _a1 true"),
            vec![
                TokenKind::Keyword(Keyword::Class),
                TokenKind::Identifier("$cls".to_string()),
                TokenKind::Identifier("_a1".to_string()),
                TokenKind::Keyword(Keyword::True),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_illegal_character() {
        let err = tokenize("let a = 1;\nlet b = @;", "test.es").unwrap_err();
        let LexError::IllegalCharacter {
            character,
            position,
        } = err;
        assert_eq!(character, '@');
        assert_eq!(position.line, 2);
        assert_eq!(position.column, 9);
    }

    #[test]
    fn test_positions_are_monotonic() {
        let tokens = tokenize("let a = [1, 2];\n a.len()", "test.es").unwrap();
        for pair in tokens.windows(2) {
            assert!(pair[0].position.index <= pair[1].position.index);
        }
        assert_eq!(tokens.iter().filter(|t| t.kind == TokenKind::Eof).count(), 1);
    }
}
