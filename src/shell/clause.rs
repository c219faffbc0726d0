//! SET-clause tokenizing and value coercion for `.update`.

use std::collections::BTreeMap;

use crate::{
    error::{Error, Result},
    sql::types::Value,
};

const MALFORMED: &str = "Invalid SET clause format. Use key=value pairs separated by commas";

/// Tracks whether a scan position is inside a quoted string.
///
/// A quote opens only outside quotes and closes only on the character that opened it.
#[derive(Default)]
struct Quotes(Option<char>);

impl Quotes {
    fn feed(&mut self, c: char) {
        match (self.0, c) {
            (None, '\'' | '"') => self.0 = Some(c),
            (Some(open), c) if open == c => self.0 = None,
            _ => {}
        }
    }

    fn inside(&self) -> bool {
        self.0.is_some()
    }
}

/// Splits `key=value, key='a, b'` into ordered, trimmed key/value pairs.
///
/// Quote characters stay in the values; [`coerce`] strips them.
pub fn tokenize(clause: &str) -> Result<Vec<(String, String)>> {
    let mut fragments = Vec::new();
    let mut current = String::new();
    let mut quotes = Quotes::default();
    for c in clause.chars() {
        quotes.feed(c);
        if c == ',' && !quotes.inside() {
            fragments.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        fragments.push(current);
    }
    fragments.iter().map(|f| split_pair(f)).collect()
}

fn split_pair(fragment: &str) -> Result<(String, String)> {
    let mut quotes = Quotes::default();
    let mut equals = fragment.char_indices().filter(|&(_, c)| {
        quotes.feed(c);
        c == '=' && !quotes.inside()
    });
    let (Some((at, _)), None) = (equals.next(), equals.next()) else {
        return Err(Error::MalformedClause(MALFORMED.into()));
    };
    let key = fragment[..at].trim();
    if key.is_empty() {
        return Err(Error::MalformedClause(MALFORMED.into()));
    }
    Ok((key.to_string(), fragment[at + 1..].trim().to_string()))
}

/// Converts a raw clause value into a typed scalar. Never fails: anything
/// that is not a recognizable literal stays a string.
pub fn coerce(raw: &str) -> Value {
    let lower = raw.to_lowercase();
    match lower.as_str() {
        "true" => return Value::Boolean(true),
        "false" => return Value::Boolean(false),
        "null" | "none" => return Value::Null,
        _ => {}
    }
    if let Some(inner) = unquote(raw) {
        return Value::String(inner.to_string());
    }
    if !raw.contains('.') {
        if let Ok(i) = raw.parse::<i64>() {
            return Value::Integer(i);
        }
    } else if let Ok(f) = raw.parse::<f64>() {
        return Value::Float(f);
    }
    Value::String(raw.to_string())
}

fn unquote(raw: &str) -> Option<&str> {
    ['\'', '"']
        .into_iter()
        .find(|&q| raw.len() >= 2 && raw.starts_with(q) && raw.ends_with(q))
        .map(|_| &raw[1..raw.len() - 1])
}

/// Tokenizes and coerces a SET clause. A repeated key keeps its last value.
pub fn parse_assignments(clause: &str) -> Result<BTreeMap<String, Value>> {
    Ok(tokenize(clause)?
        .into_iter()
        .map(|(key, raw)| (key, coerce(&raw)))
        .collect())
}

/// Drops a leading `WHERE` keyword from a filter expression
pub fn strip_where(expr: &str) -> &str {
    let expr = expr.trim();
    match expr.get(..5) {
        Some(head) if head.eq_ignore_ascii_case("where") => {
            let rest = &expr[5..];
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                rest.trim_start()
            } else {
                expr
            }
        }
        _ => expr,
    }
}
