use crate::selector::{ChildName, Selector, Subscript, DEFAULT_END, DEFAULT_START, DEFAULT_STEP};

/// Errors produced while parsing a path expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("expected '$' at the start of the expression")]
    MissingRoot,

    #[error("expected {expected} but found {found}")]
    Unexpected {
        expected: &'static str,
        found: String,
    },

    #[error("'*' must be the entire identifier")]
    PartialWildcard,

    #[error("invalid subscript '{0}': expected an integer")]
    InvalidInteger(String),

    #[error("invalid subscript '{0}': expected at most start:end:step")]
    TooManyComponents(String),

    #[error("subscript step must be a positive integer, got {0}")]
    InvalidStep(i64),
}

fn unexpected(expected: &'static str, found: Option<char>) -> ParseError {
    ParseError::Unexpected {
        expected,
        found: match found {
            Some(c) => format!("'{c}'"),
            None => "end of expression".to_string(),
        },
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Parse `expr` into its selector list. The first selector is always
/// [`Selector::Root`].
pub(crate) fn parse(expr: &str) -> Result<Vec<Selector>, ParseError> {
    Parser {
        chars: expr.chars().collect(),
        pos: 0,
    }
    .parse()
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn parse(mut self) -> Result<Vec<Selector>, ParseError> {
        if !self.eat('$') {
            return Err(ParseError::MissingRoot);
        }

        let mut selectors = vec![Selector::Root];
        while let Some(c) = self.peek() {
            match c {
                '.' => {
                    self.pos += 1;
                    if self.eat('.') {
                        let inner = self.descendant()?;
                        selectors.push(Selector::RecursiveDescent(Box::new(inner)));
                    } else {
                        let name = self.dotted_name()?;
                        selectors.push(Selector::Child {
                            name,
                            subscript: None,
                        });
                    }
                }
                '[' if self.peek_at(1) == Some('\'') => selectors.push(self.bracket_names()?),
                '[' => {
                    let subscript = self.subscript()?;
                    match selectors.last_mut() {
                        Some(Selector::Child {
                            subscript: slot @ None,
                            ..
                        }) => *slot = Some(subscript),
                        _ => selectors.push(Selector::Subscript(subscript)),
                    }
                }
                other => return Err(unexpected("'.' or '['", Some(other))),
            }
        }

        Ok(selectors)
    }

    // -- tokens ---------------------------------------------------------------

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char, description: &'static str) -> Result<(), ParseError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(unexpected(description, self.peek()))
        }
    }

    // -- productions ----------------------------------------------------------

    /// The selector following `..`.
    fn descendant(&mut self) -> Result<Selector, ParseError> {
        match self.peek() {
            Some('[') if self.peek_at(1) == Some('\'') => self.bracket_names(),
            Some('[') => Ok(Selector::Subscript(self.subscript()?)),
            _ => Ok(Selector::Child {
                name: self.dotted_name()?,
                subscript: None,
            }),
        }
    }

    fn dotted_name(&mut self) -> Result<ChildName, ParseError> {
        if self.eat('*') {
            return match self.peek() {
                Some(c) if is_identifier_char(c) || c == '*' => Err(ParseError::PartialWildcard),
                _ => Ok(ChildName::Wildcard),
            };
        }

        let start = self.pos;
        while self.peek().is_some_and(is_identifier_char) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(unexpected("an identifier", self.peek()));
        }
        if self.peek() == Some('*') {
            return Err(ParseError::PartialWildcard);
        }
        Ok(ChildName::Key(self.chars[start..self.pos].iter().collect()))
    }

    /// `['a']` or `['a','b',...]`.
    fn bracket_names(&mut self) -> Result<Selector, ParseError> {
        self.expect('[', "'['")?;
        let mut names = vec![self.quoted()?];
        loop {
            self.skip_spaces();
            if self.eat(']') {
                break;
            }
            self.expect(',', "',' or ']'")?;
            self.skip_spaces();
            names.push(self.quoted()?);
        }

        if names.len() == 1 {
            let name = names.remove(0);
            Ok(Selector::Child {
                name: ChildName::Key(name),
                subscript: None,
            })
        } else {
            Ok(Selector::Union(names))
        }
    }

    fn quoted(&mut self) -> Result<String, ParseError> {
        self.expect('\'', "a quoted name")?;
        let mut name = String::new();
        loop {
            match self.peek() {
                None => return Err(unexpected("a closing quote", None)),
                Some('\'') => {
                    self.pos += 1;
                    return Ok(name);
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c @ ('\\' | '\'')) => {
                            name.push(c);
                            self.pos += 1;
                        }
                        other => return Err(unexpected("an escaped '\\' or quote", other)),
                    }
                }
                Some(c) => {
                    name.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(' ') {
            self.pos += 1;
        }
    }

    /// `[*]`, `[n]` or `[start:end:step]` with any component optional.
    fn subscript(&mut self) -> Result<Subscript, ParseError> {
        self.expect('[', "'['")?;
        if self.eat('*') {
            self.expect(']', "']'")?;
            return Ok(Subscript::Wildcard);
        }

        let start = self.pos;
        while self.peek().is_some_and(|c| c != ']') {
            self.pos += 1;
        }
        let body: String = self.chars[start..self.pos].iter().collect();
        self.expect(']', "']'")?;

        let parts: Vec<&str> = body.split(':').collect();
        match parts.as_slice() {
            [index] => Ok(Subscript::Index(integer(index, None)?)),
            [start, end] => Ok(Subscript::Range {
                start: integer(start, Some(DEFAULT_START))?,
                end: integer(end, Some(DEFAULT_END))?,
                step: DEFAULT_STEP,
            }),
            [start, end, step] => {
                let step = integer(step, Some(DEFAULT_STEP))?;
                if step <= 0 {
                    return Err(ParseError::InvalidStep(step));
                }
                Ok(Subscript::Range {
                    start: integer(start, Some(DEFAULT_START))?,
                    end: integer(end, Some(DEFAULT_END))?,
                    step,
                })
            }
            _ => Err(ParseError::TooManyComponents(body)),
        }
    }
}

fn integer(text: &str, default: Option<i64>) -> Result<i64, ParseError> {
    match (text.trim(), default) {
        ("", Some(default)) => Ok(default),
        (trimmed, _) => trimmed
            .parse()
            .map_err(|_| ParseError::InvalidInteger(text.to_string())),
    }
}
