//! Tokenizer for Python source text.
//!
//! Produces logical lines (physical lines joined across open brackets and
//! backslash continuations) with their indentation width. Only the lexical
//! layer is modelled: strings with prefixes and triple quotes, comments,
//! names, numbers and operators. The text is never evaluated.

use super::{Diagnostic, Location};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Name,
    Number,
    /// String literal; `text` holds the raw contents between the quotes.
    Str,
    Op,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub location: Location,
}

impl Token {
    pub fn is_op(&self, op: &str) -> bool {
        self.kind == TokenKind::Op && self.text == op
    }

    pub fn is_name(&self, name: &str) -> bool {
        self.kind == TokenKind::Name && self.text == name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    /// Indentation width of the first physical line (tabs to multiples of 8).
    pub indent: usize,
    pub tokens: Vec<Token>,
}

impl LogicalLine {
    pub fn location(&self) -> Location {
        self.tokens
            .first()
            .map(|t| t.location)
            .unwrap_or(Location { line: 1, column: 1 })
    }
}

const STRING_PREFIXES: &[&str] = &["r", "u", "b", "f", "br", "rb", "fr", "rf"];

const OPERATORS: &[&str] = &[
    "**=", "//=", ">>=", "<<=", "...", "->", ":=", "==", "!=", "<=", ">=", "**", "//", "<<", ">>",
    "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "@=", "(", ")", "[", "]", "{", "}", ",", ":",
    ".", ";", "@", "=", "+", "-", "*", "/", "%", "<", ">", "&", "|", "^", "~", "!",
];

/// Split `source` into logical lines, or report the first lexical error.
pub fn tokenize(source: &str) -> Result<Vec<LogicalLine>, Diagnostic> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    brackets: Vec<(char, Location)>,
    lines: Vec<LogicalLine>,
    current: Vec<Token>,
    indent: usize,
    at_line_start: bool,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            brackets: Vec::new(),
            lines: Vec::new(),
            current: Vec::new(),
            indent: 0,
            at_line_start: true,
        }
    }

    fn peek(&self) -> Option<char> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn here(&self) -> Location {
        Location {
            line: self.line,
            column: self.column,
        }
    }

    fn error(location: Location, message: impl Into<String>) -> Diagnostic {
        Diagnostic {
            location,
            message: format!("Syntax error: {}", message.into()),
        }
    }

    fn push(&mut self, kind: TokenKind, text: String, location: Location) {
        self.current.push(Token {
            kind,
            text,
            location,
        });
    }

    fn finish_line(&mut self) {
        if !self.current.is_empty() {
            self.lines.push(LogicalLine {
                indent: self.indent,
                tokens: std::mem::take(&mut self.current),
            });
        }
    }

    fn run(mut self) -> Result<Vec<LogicalLine>, Diagnostic> {
        while let Some(c) = self.peek() {
            if self.at_line_start && self.brackets.is_empty() && self.current.is_empty() {
                self.indent = self.measure_indent();
                self.at_line_start = false;
                continue;
            }

            match c {
                '\n' => {
                    self.advance();
                    if self.brackets.is_empty() {
                        self.finish_line();
                        self.at_line_start = true;
                    }
                }
                ' ' | '\t' | '\r' | '\x0c' => {
                    self.advance();
                }
                '#' => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                }
                '\\' => {
                    let at = self.here();
                    self.advance();
                    if self.peek() == Some('\r') {
                        self.advance();
                    }
                    if self.peek() != Some('\n') {
                        return Err(Self::error(at, "unexpected character after line continuation"));
                    }
                    self.advance();
                }
                '"' | '\'' => {
                    let at = self.here();
                    self.read_string(at)?;
                }
                c if c.is_alphabetic() || c == '_' => self.read_name()?,
                c if c.is_ascii_digit()
                    || (c == '.' && self.peek_at(1).is_some_and(|n| n.is_ascii_digit())) =>
                {
                    self.read_number()
                }
                _ => self.read_operator()?,
            }
        }

        if let Some((open, at)) = self.brackets.last() {
            return Err(Self::error(*at, format!("'{}' was never closed", open)));
        }
        self.finish_line();
        Ok(self.lines)
    }

    fn measure_indent(&mut self) -> usize {
        let mut width = 0;
        while let Some(c) = self.peek() {
            match c {
                ' ' => width += 1,
                '\t' => width += 8 - width % 8,
                '\x0c' => width = 0,
                _ => break,
            }
            self.advance();
        }
        width
    }

    fn read_name(&mut self) -> Result<(), Diagnostic> {
        let at = self.here();
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }

        if matches!(self.peek(), Some('"') | Some('\''))
            && STRING_PREFIXES.contains(&name.to_lowercase().as_str())
        {
            return self.read_string(at);
        }

        self.push(TokenKind::Name, name, at);
        Ok(())
    }

    fn read_string(&mut self, at: Location) -> Result<(), Diagnostic> {
        let Some(quote) = self.advance() else {
            return Err(Self::error(at, "unterminated string literal"));
        };
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.advance();
            self.advance();
        }

        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    let what = if triple {
                        "unterminated triple-quoted string literal"
                    } else {
                        "unterminated string literal"
                    };
                    return Err(Self::error(at, what));
                }
                Some('\\') => {
                    self.advance();
                    value.push('\\');
                    if let Some(escaped) = self.advance() {
                        value.push(escaped);
                    }
                }
                Some(c) if c == quote => {
                    if !triple {
                        self.advance();
                        break;
                    }
                    if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                        self.advance();
                        self.advance();
                        self.advance();
                        break;
                    }
                    self.advance();
                    value.push(c);
                }
                Some('\n') if !triple => {
                    return Err(Self::error(at, "unterminated string literal"));
                }
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }

        self.push(TokenKind::Str, value, at);
        Ok(())
    }

    fn read_number(&mut self) {
        let at = self.here();
        let mut text = String::new();
        while let Some(c) = self.peek() {
            let exponent_sign = matches!(c, '+' | '-')
                && text.ends_with(['e', 'E'])
                && !text.starts_with("0x")
                && !text.starts_with("0X");
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || exponent_sign {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        self.push(TokenKind::Number, text, at);
    }

    fn read_operator(&mut self) -> Result<(), Diagnostic> {
        let at = self.here();
        let op = OPERATORS
            .iter()
            .find(|op| {
                op.chars()
                    .enumerate()
                    .all(|(i, c)| self.peek_at(i) == Some(c))
            })
            .copied();

        let Some(op) = op else {
            let c = self.peek().unwrap_or_default();
            return Err(Self::error(at, format!("invalid character '{}'", c)));
        };

        match op {
            "(" | "[" | "{" => {
                let open = op.chars().next().unwrap_or('(');
                self.brackets.push((open, at));
            }
            ")" | "]" | "}" => {
                let expected = match op {
                    ")" => '(',
                    "]" => '[',
                    _ => '{',
                };
                match self.brackets.pop() {
                    Some((open, _)) if open == expected => {}
                    Some((open, open_at)) => {
                        return Err(Self::error(
                            at,
                            format!(
                                "closing '{}' does not match '{}' opened at line {}",
                                op, open, open_at.line
                            ),
                        ));
                    }
                    None => return Err(Self::error(at, format!("unmatched '{}'", op))),
                }
            }
            _ => {}
        }

        for _ in 0..op.chars().count() {
            self.advance();
        }
        self.push(TokenKind::Op, op.to_string(), at);
        Ok(())
    }
}
