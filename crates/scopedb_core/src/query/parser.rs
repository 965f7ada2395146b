//! Statement tokenizer and parser.
//!
//! ```text
//! statement := PUT table key value | GET table key | DELETE table key | SCAN table
//! operand   := word | 'text' | integer | NULL | TRUE | FALSE | x'hex' | %s | %(name)s
//! ```
//!
//! Keywords are case-insensitive. Inside quoted text `''` is a literal `'`.

use crate::error::{CoreError, CoreResult};
use scopedb_codec::Value;

/// One operand of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// A value written inline.
    Literal(Value),
    /// `%s`, bound by position.
    Positional,
    /// `%(name)s`, bound by name.
    Named(String),
}

/// A parsed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Store a value.
    Put {
        /// Table.
        table: Operand,
        /// Key.
        key: Operand,
        /// Value.
        value: Operand,
    },
    /// Read one key.
    Get {
        /// Table.
        table: Operand,
        /// Key.
        key: Operand,
    },
    /// Remove one key.
    Delete {
        /// Table.
        table: Operand,
        /// Key.
        key: Operand,
    },
    /// Read a whole table.
    Scan {
        /// Table.
        table: Operand,
    },
}

impl Statement {
    /// Operands in binding order.
    #[must_use]
    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Self::Put { table, key, value } => vec![table, key, value],
            Self::Get { table, key } | Self::Delete { table, key } => vec![table, key],
            Self::Scan { table } => vec![table],
        }
    }

    /// Upper-case verb.
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Put { .. } => "PUT",
            Self::Get { .. } => "GET",
            Self::Delete { .. } => "DELETE",
            Self::Scan { .. } => "SCAN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
    Hex(Vec<u8>),
    Positional,
    Named(String),
}

/// Parses one statement.
///
/// # Errors
///
/// Returns a validation error for an unknown verb, a wrong operand count,
/// or a malformed token.
pub fn parse(statement: &str) -> CoreResult<Statement> {
    let mut tokens = tokenize(statement)?.into_iter();
    let verb = match tokens.next() {
        Some(Token::Word(word)) => word.to_ascii_uppercase(),
        Some(_) => return Err(CoreError::validation("statement must start with a verb")),
        None => return Err(CoreError::validation("empty statement")),
    };
    let operands: Vec<Operand> = tokens.map(operand).collect();

    let arity = match verb.as_str() {
        "PUT" => 3,
        "GET" | "DELETE" => 2,
        "SCAN" => 1,
        other => {
            return Err(CoreError::validation(format!(
                "unknown statement {other:?}: expected PUT, GET, DELETE or SCAN"
            )))
        }
    };
    if operands.len() != arity {
        return Err(CoreError::validation(format!(
            "{verb} takes {arity} operand(s), got {}",
            operands.len()
        )));
    }

    let mut operands = operands.into_iter();
    let mut next = || operands.next().unwrap_or(Operand::Literal(Value::Null));
    Ok(match verb.as_str() {
        "PUT" => Statement::Put {
            table: next(),
            key: next(),
            value: next(),
        },
        "GET" => Statement::Get {
            table: next(),
            key: next(),
        },
        "DELETE" => Statement::Delete {
            table: next(),
            key: next(),
        },
        _ => Statement::Scan { table: next() },
    })
}

fn operand(token: Token) -> Operand {
    match token {
        Token::Positional => Operand::Positional,
        Token::Named(name) => Operand::Named(name),
        Token::Quoted(text) => Operand::Literal(Value::Text(text)),
        Token::Hex(bytes) => Operand::Literal(Value::Bytes(bytes)),
        Token::Word(word) => Operand::Literal(word_value(word)),
    }
}

fn word_value(word: String) -> Value {
    match word.to_ascii_uppercase().as_str() {
        "NULL" => return Value::Null,
        "TRUE" => return Value::Bool(true),
        "FALSE" => return Value::Bool(false),
        _ => {}
    }
    let digits = word.strip_prefix('-').unwrap_or(&word);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = word.parse::<i64>() {
            return Value::Integer(n);
        }
    }
    Value::Text(word)
}

fn tokenize(input: &str) -> CoreResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '\'' {
            chars.next();
            tokens.push(Token::Quoted(quoted(&mut chars, start)?));
            continue;
        }

        if (c == 'x' || c == 'X') && input[start + 1..].starts_with('\'') {
            chars.next();
            chars.next();
            let text = quoted(&mut chars, start)?;
            tokens.push(Token::Hex(hex(&text, start)?));
            continue;
        }

        if c == '%' {
            let rest = &input[start..];
            let len = if rest.starts_with("%s") {
                tokens.push(Token::Positional);
                2
            } else if let Some(body) = rest.strip_prefix("%(") {
                let close = body.find(")s").ok_or_else(|| {
                    CoreError::validation(format!("unterminated placeholder at offset {start}"))
                })?;
                let name = &body[..close];
                if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    return Err(CoreError::validation(format!(
                        "invalid placeholder name {name:?} at offset {start}"
                    )));
                }
                tokens.push(Token::Named(name.to_string()));
                close + 4
            } else {
                return Err(CoreError::validation(format!(
                    "invalid placeholder at offset {start}"
                )));
            };
            while chars.peek().is_some_and(|&(i, _)| i < start + len) {
                chars.next();
            }
            continue;
        }

        let mut end = input.len();
        while let Some(&(i, ch)) = chars.peek() {
            if ch.is_whitespace() {
                end = i;
                break;
            }
            if ch == '\'' || ch == '%' {
                return Err(CoreError::validation(format!(
                    "unexpected {ch:?} at offset {i}"
                )));
            }
            chars.next();
        }
        tokens.push(Token::Word(input[start..end].to_string()));
    }
    Ok(tokens)
}

fn quoted(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    start: usize,
) -> CoreResult<String> {
    let mut text = String::new();
    loop {
        match chars.next() {
            Some((_, '\'')) => {
                if chars.peek().is_some_and(|&(_, c)| c == '\'') {
                    chars.next();
                    text.push('\'');
                } else {
                    return Ok(text);
                }
            }
            Some((_, c)) => text.push(c),
            None => {
                return Err(CoreError::validation(format!(
                    "unterminated quoted text at offset {start}"
                )))
            }
        }
    }
}

fn hex(text: &str, start: usize) -> CoreResult<Vec<u8>> {
    let invalid = || CoreError::validation(format!("invalid hex literal at offset {start}"));
    if text.len() % 2 != 0 {
        return Err(invalid());
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            text.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(invalid)
        })
        .collect()
}
