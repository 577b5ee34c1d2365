use std::{fmt::Display, rc::Rc};

/// A location in a source file.
///
/// Tokens and nodes own their own copy, so moving the tokenizer's cursor never
/// changes a position that was already handed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub index: usize,
    pub line: usize,
    pub column: usize,
    pub file_name: Rc<str>,
}

impl Position {
    pub fn start(file_name: impl Into<Rc<str>>) -> Self {
        Self {
            index: 0,
            line: 1,
            column: 1,
            file_name: file_name.into(),
        }
    }

    /// Moves past `c`.
    pub fn advance(&mut self, c: char) {
        self.index += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file_name, self.line, self.column)
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        if self.file_name != other.file_name {
            return None;
        }
        Some(self.index.cmp(&other.index))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_advance_tracks_lines() {
        let mut position = Position::start("main.es");
        for c in "ab\nc".chars() {
            position.advance(c);
        }
        assert_eq!(position.index, 4);
        assert_eq!(position.line, 2);
        assert_eq!(position.column, 2);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut position = Position::start("main.es");
        let copy = position.clone();
        position.advance('x');
        assert_eq!(copy.column, 1);
        assert!(copy < position);
    }
}
