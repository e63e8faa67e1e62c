//! Path expression parser.
//!
//! ```text
//! path     ::= body ["?"]
//! body     ::= segment ("/" segment)* ["/" function] | function
//! segment  ::= "$" name | name | "*" | "@" name | "@*" | "." | "[" digits "]"
//! function ::= "name()" | "count()" | "position()"
//! ```

use crate::types::*;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathSyntaxError {
    #[error("Empty path expression")]
    Empty,
    #[error("Empty segment at offset {pos} in '{path}'")]
    EmptySegment { path: String, pos: usize },
    #[error("Source segment '${name}' must be the first segment of '{path}'")]
    MisplacedSource { path: String, name: String },
    #[error("Missing name after '{marker}' at offset {pos} in '{path}'")]
    MissingName { path: String, marker: char, pos: usize },
    #[error("Unknown function '{name}()' in '{path}'")]
    UnknownFunction { path: String, name: String },
    #[error("Function '{name}()' must be the last segment of '{path}'")]
    MisplacedFunction { path: String, name: String },
    #[error("Unexpected character '{ch}' at offset {pos} in '{path}'")]
    UnexpectedChar { path: String, ch: char, pos: usize },
    #[error("Invalid position '{text}' in '{path}'")]
    InvalidPosition { path: String, text: String },
}

/// Path expression parser.
pub struct PathParser<'a> {
    /// Full input, used for error messages.
    path: &'a str,
    /// Input with the optional marker stripped.
    input: &'a str,
    pos: usize,
}

impl<'a> PathParser<'a> {
    /// Parse a path expression.
    pub fn parse(path: &'a str) -> Result<ParsedPath, PathSyntaxError> {
        let (input, optional) = match path.strip_suffix('?') {
            Some(body) => (body, true),
            None => (path, false),
        };
        if input.is_empty() {
            return Err(PathSyntaxError::Empty);
        }
        let mut parser = Self { path, input, pos: 0 };
        let (segments, function) = parser.parse_body()?;
        Ok(ParsedPath {
            segments,
            function,
            optional,
        })
    }

    fn parse_body(&mut self) -> Result<(Vec<Segment>, Option<PathFunction>), PathSyntaxError> {
        let mut segments = Vec::new();
        let mut function: Option<PathFunction> = None;

        loop {
            let start = self.pos;
            let text = self.take_segment();
            if text.is_empty() {
                return Err(PathSyntaxError::EmptySegment {
                    path: self.path.to_string(),
                    pos: start,
                });
            }
            if let Some(previous) = function {
                return Err(PathSyntaxError::MisplacedFunction {
                    path: self.path.to_string(),
                    name: previous.as_str().to_string(),
                });
            }

            if let Some(name) = text.strip_suffix("()") {
                function = Some(self.parse_function(name)?);
            } else {
                let segment = self.parse_segment(text, start, segments.is_empty())?;
                segments.push(segment);
            }

            if self.is_at_end() {
                break;
            }
            // take_segment stops on '/' only
            self.advance();
        }

        Ok((segments, function))
    }

    fn parse_function(&self, name: &str) -> Result<PathFunction, PathSyntaxError> {
        PathFunction::from_name(name).ok_or_else(|| PathSyntaxError::UnknownFunction {
            path: self.path.to_string(),
            name: name.to_string(),
        })
    }

    fn parse_segment(&self, text: &str, start: usize, is_head: bool) -> Result<Segment, PathSyntaxError> {
        match text {
            "*" => return Ok(Segment::AllChildren),
            "@*" => return Ok(Segment::AllAttributes),
            "." => return Ok(Segment::Current),
            _ => {}
        }

        if let Some(name) = text.strip_prefix('$') {
            if !is_head {
                return Err(PathSyntaxError::MisplacedSource {
                    path: self.path.to_string(),
                    name: name.to_string(),
                });
            }
            self.check_name(name, '$', start + 1)?;
            return Ok(Segment::Source(name.to_string()));
        }

        if let Some(name) = text.strip_prefix('@') {
            self.check_name(name, '@', start + 1)?;
            return Ok(Segment::Attribute(name.to_string()));
        }

        if text.starts_with('[') {
            return self.parse_position(text);
        }

        self.check_name(text, '/', start)?;
        Ok(Segment::Child(text.to_string()))
    }

    fn parse_position(&self, text: &str) -> Result<Segment, PathSyntaxError> {
        let invalid = || PathSyntaxError::InvalidPosition {
            path: self.path.to_string(),
            text: text.to_string(),
        };
        let digits = text
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(invalid)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        digits.parse().map(Segment::Position).map_err(|_| invalid())
    }

    /// Reject empty names and characters reserved by the grammar.
    fn check_name(&self, name: &str, marker: char, offset: usize) -> Result<(), PathSyntaxError> {
        if name.is_empty() {
            return Err(PathSyntaxError::MissingName {
                path: self.path.to_string(),
                marker,
                pos: offset,
            });
        }
        for (i, ch) in name.char_indices() {
            if matches!(ch, '(' | ')' | '?' | '[' | ']' | '*') {
                return Err(PathSyntaxError::UnexpectedChar {
                    path: self.path.to_string(),
                    ch,
                    pos: offset + i,
                });
            }
        }
        Ok(())
    }

    /// Consume input up to (not including) the next `/`.
    fn take_segment(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '/' {
                break;
            }
            self.advance();
        }
        &self.input[start..self.pos]
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }
}
