//! Expression evaluation over labelled rows.
//!
//! Shared by the query executors and by the table store, which evaluates
//! WHERE expressions against its own rows.

use std::cmp::Ordering;

use crate::{
    error::{Error, Result},
    sql::{
        parser::ast::{Expression, Operation},
        types::Value,
    },
};

/// Column label of an intermediate row: the relation (table name or alias)
/// the column came from, and the column name.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub relation: Option<String>,
    pub name: String,
}

impl Label {
    pub fn new(relation: Option<&str>, name: &str) -> Self {
        Self {
            relation: relation.map(|r| r.to_string()),
            name: name.to_string(),
        }
    }

    fn matches(&self, relation: Option<&str>, name: &str) -> bool {
        if !self.name.eq_ignore_ascii_case(name) {
            return false;
        }
        match (relation, &self.relation) {
            (None, _) => true,
            (Some(want), Some(have)) => want.eq_ignore_ascii_case(have),
            (Some(_), None) => false,
        }
    }
}

/// Finds the position of a (possibly qualified) column among `labels`
pub fn resolve(labels: &[Label], relation: Option<&str>, name: &str) -> Result<usize> {
    let mut found = labels
        .iter()
        .enumerate()
        .filter(|(_, l)| l.matches(relation, name))
        .map(|(i, _)| i);
    let display = match relation {
        Some(r) => format!("{}.{}", r, name),
        None => name.to_string(),
    };
    match (found.next(), found.next()) {
        (Some(i), None) => Ok(i),
        (Some(_), Some(_)) => Err(Error::QueryFailed(format!(
            "Binder Error: Ambiguous reference to column name \"{}\"",
            display
        ))),
        (None, _) => Err(Error::QueryFailed(format!(
            "Binder Error: Referenced column \"{}\" not found",
            display
        ))),
    }
}

/// Evaluates `expr` against one row whose columns are described by `labels`
pub fn evaluate(expr: &Expression, labels: &[Label], row: &[Value]) -> Result<Value> {
    Ok(match expr {
        Expression::Field(relation, name) => {
            let index = resolve(labels, relation.as_deref(), name)?;
            row.get(index).cloned().unwrap_or(Value::Null)
        }
        Expression::Consts(c) => Value::from_consts(c),
        Expression::Function(name, _) => {
            return Err(Error::QueryFailed(format!(
                "Binder Error: aggregate function {} is not allowed here",
                name
            )))
        }
        Expression::Operation(op) => evaluate_operation(op, labels, row)?,
    })
}

/// Evaluates a filter expression: only TRUE keeps the row
pub fn is_true(expr: &Expression, labels: &[Label], row: &[Value]) -> Result<bool> {
    match evaluate(expr, labels, row)? {
        Value::Boolean(b) => Ok(b),
        Value::Null => Ok(false),
        v => Err(Error::QueryFailed(format!(
            "Conversion Error: filter expression must be BOOLEAN, got {} {}",
            v.kind(),
            v
        ))),
    }
}

fn evaluate_operation(op: &Operation, labels: &[Label], row: &[Value]) -> Result<Value> {
    let eval = |e: &Expression| evaluate(e, labels, row);
    Ok(match op {
        Operation::And(l, r) => {
            let lv = truth(eval(l)?)?;
            if lv == Some(false) {
                return Ok(Value::Boolean(false));
            }
            match (lv, truth(eval(r)?)?) {
                (_, Some(false)) => Value::Boolean(false),
                (Some(true), Some(true)) => Value::Boolean(true),
                _ => Value::Null,
            }
        }
        Operation::Or(l, r) => {
            let lv = truth(eval(l)?)?;
            if lv == Some(true) {
                return Ok(Value::Boolean(true));
            }
            match (lv, truth(eval(r)?)?) {
                (_, Some(true)) => Value::Boolean(true),
                (Some(false), Some(false)) => Value::Boolean(false),
                _ => Value::Null,
            }
        }
        Operation::Not(e) => match truth(eval(e)?)? {
            Some(b) => Value::Boolean(!b),
            None => Value::Null,
        },

        Operation::Equal(l, r) => compared(&eval(l)?, &eval(r)?, |o| o == Ordering::Equal)?,
        Operation::NotEqual(l, r) => compared(&eval(l)?, &eval(r)?, |o| o != Ordering::Equal)?,
        Operation::GreaterThan(l, r) => compared(&eval(l)?, &eval(r)?, |o| o == Ordering::Greater)?,
        Operation::GreaterThanOrEqual(l, r) => {
            compared(&eval(l)?, &eval(r)?, |o| o != Ordering::Less)?
        }
        Operation::LessThan(l, r) => compared(&eval(l)?, &eval(r)?, |o| o == Ordering::Less)?,
        Operation::LessThanOrEqual(l, r) => {
            compared(&eval(l)?, &eval(r)?, |o| o != Ordering::Greater)?
        }

        Operation::Add(l, r) => arithmetic('+', eval(l)?, eval(r)?)?,
        Operation::Subtract(l, r) => arithmetic('-', eval(l)?, eval(r)?)?,
        Operation::Multiply(l, r) => arithmetic('*', eval(l)?, eval(r)?)?,
        Operation::Divide(l, r) => arithmetic('/', eval(l)?, eval(r)?)?,
        Operation::Modulo(l, r) => arithmetic('%', eval(l)?, eval(r)?)?,
        Operation::Negate(e) => match eval(e)? {
            Value::Null => Value::Null,
            Value::Integer(i) => Value::Integer(i.checked_neg().ok_or_else(overflow)?),
            Value::Float(f) => Value::Float(-f),
            v => {
                return Err(Error::QueryFailed(format!(
                    "Binder Error: cannot negate {} value",
                    v.kind()
                )))
            }
        },

        Operation::IsNull(e, not) => Value::Boolean(eval(e)?.is_null() != *not),
        Operation::Like(l, r, not) => match (eval(l)?, eval(r)?) {
            (Value::Null, _) | (_, Value::Null) => Value::Null,
            (Value::String(text), Value::String(pattern)) => {
                Value::Boolean(like(&text, &pattern) != *not)
            }
            (a, b) => {
                return Err(Error::QueryFailed(format!(
                    "Binder Error: LIKE expects STRING operands, got {} and {}",
                    a.kind(),
                    b.kind()
                )))
            }
        },
        Operation::In(e, list, not) => {
            let value = eval(e)?;
            if value.is_null() {
                return Ok(Value::Null);
            }
            let mut saw_null = false;
            for item in list {
                let candidate = eval(item)?;
                match compare(&value, &candidate)? {
                    Some(Ordering::Equal) => return Ok(Value::Boolean(!*not)),
                    Some(_) => {}
                    None => saw_null = true,
                }
            }
            if saw_null { Value::Null } else { Value::Boolean(*not) }
        }
        Operation::Between(e, lo, hi, not) => {
            let value = eval(e)?;
            let above = compared(&value, &eval(lo)?, |o| o != Ordering::Less)?;
            let below = compared(&value, &eval(hi)?, |o| o != Ordering::Greater)?;
            let within = match (truth(above)?, truth(below)?) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            };
            match within {
                Some(b) => Value::Boolean(b != *not),
                None => Value::Null,
            }
        }
    })
}

/// Three-valued view of a boolean operand
fn truth(value: Value) -> Result<Option<bool>> {
    match value {
        Value::Boolean(b) => Ok(Some(b)),
        Value::Null => Ok(None),
        v => Err(Error::QueryFailed(format!(
            "Conversion Error: expected BOOLEAN, got {} {}",
            v.kind(),
            v
        ))),
    }
}

/// Compares two values; `None` when either side is NULL
pub fn compare(l: &Value, r: &Value) -> Result<Option<Ordering>> {
    if l.is_null() || r.is_null() {
        return Ok(None);
    }
    match l.partial_cmp(r) {
        Some(o) => Ok(Some(o)),
        None => Err(Error::QueryFailed(format!(
            "Binder Error: cannot compare values of type {} and {}",
            l.kind(),
            r.kind()
        ))),
    }
}

fn compared<F: Fn(Ordering) -> bool>(l: &Value, r: &Value, check: F) -> Result<Value> {
    Ok(match compare(l, r)? {
        Some(o) => Value::Boolean(check(o)),
        None => Value::Null,
    })
}

fn overflow() -> Error {
    Error::QueryFailed("Out of Range Error: integer overflow".into())
}

/// Numeric arithmetic. `/` always divides as floats; division by zero is NULL.
fn arithmetic(op: char, l: Value, r: Value) -> Result<Value> {
    Ok(match (l, r) {
        (Value::Null, _) | (_, Value::Null) => Value::Null,
        (Value::Integer(a), Value::Integer(b)) => match op {
            '+' => Value::Integer(a.checked_add(b).ok_or_else(overflow)?),
            '-' => Value::Integer(a.checked_sub(b).ok_or_else(overflow)?),
            '*' => Value::Integer(a.checked_mul(b).ok_or_else(overflow)?),
            '%' if b == 0 => Value::Null,
            '%' => Value::Integer(a.checked_rem(b).ok_or_else(overflow)?),
            _ if b == 0 => Value::Null,
            _ => Value::Float(a as f64 / b as f64),
        },
        (l, r) => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => match op {
                '+' => Value::Float(a + b),
                '-' => Value::Float(a - b),
                '*' => Value::Float(a * b),
                _ if b == 0.0 => Value::Null,
                '%' => Value::Float(a % b),
                _ => Value::Float(a / b),
            },
            _ => {
                return Err(Error::QueryFailed(format!(
                    "Binder Error: cannot apply {} to {} and {}",
                    op,
                    l.kind(),
                    r.kind()
                )))
            }
        },
    })
}

/// SQL LIKE: `%` matches any run of characters, `_` exactly one
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    // matches[j] holds whether text[..i] matches pattern[..j]
    let mut matches = vec![false; pattern.len() + 1];
    matches[0] = true;
    for j in 1..=pattern.len() {
        matches[j] = matches[j - 1] && pattern[j - 1] == '%';
    }
    for c in &text {
        let mut next = vec![false; pattern.len() + 1];
        for j in 1..=pattern.len() {
            next[j] = match pattern[j - 1] {
                '%' => next[j - 1] || matches[j],
                '_' => matches[j - 1],
                p => matches[j - 1] && p == *c,
            };
        }
        matches = next;
    }
    matches[pattern.len()]
}

#[cfg(test)]
mod tests {
    use super::{Label, evaluate, is_true, like, resolve};
    use crate::{
        error::{Error, Result},
        sql::{parser::Parser, types::Value},
    };

    fn labels() -> Vec<Label> {
        vec![
            Label::new(Some("o"), "id"),
            Label::new(Some("o"), "amount"),
            Label::new(Some("c"), "id"),
            Label::new(Some("c"), "name"),
        ]
    }

    fn eval(sql: &str, row: &[Value]) -> Result<Value> {
        let expr = Parser::new(sql).parse_predicate()?;
        evaluate(&expr, &labels(), row)
    }

    #[test]
    fn test_resolve() -> Result<()> {
        let labels = labels();
        assert_eq!(resolve(&labels, None, "AMOUNT")?, 1);
        assert_eq!(resolve(&labels, Some("c"), "id")?, 2);
        assert!(matches!(
            resolve(&labels, None, "id"),
            Err(Error::QueryFailed(m)) if m.contains("Ambiguous")
        ));
        assert!(matches!(
            resolve(&labels, None, "total"),
            Err(Error::QueryFailed(m)) if m.contains("not found")
        ));
        Ok(())
    }

    #[test]
    fn test_evaluate() -> Result<()> {
        let row = vec![
            Value::Integer(1),
            Value::Integer(-20),
            Value::Integer(7),
            Value::String("Jane".into()),
        ];
        assert_eq!(eval("amount < 0", &row)?, Value::Boolean(true));
        assert_eq!(eval("o.id + c.id * 2", &row)?, Value::Integer(15));
        assert_eq!(eval("c.id / 2", &row)?, Value::Float(3.5));
        assert_eq!(eval("c.id / 0", &row)?, Value::Null);
        assert_eq!(eval("name like 'J_n%'", &row)?, Value::Boolean(true));
        assert_eq!(eval("o.id in (3, 1)", &row)?, Value::Boolean(true));
        assert_eq!(eval("amount between -30 and -10", &row)?, Value::Boolean(true));
        assert!(eval("name > 1", &row).is_err());
        Ok(())
    }

    #[test]
    fn test_null_logic() -> Result<()> {
        let row = vec![Value::Integer(1), Value::Null, Value::Null, Value::Null];
        assert_eq!(eval("amount > 0", &row)?, Value::Null);
        assert_eq!(eval("amount > 0 or o.id = 1", &row)?, Value::Boolean(true));
        assert_eq!(eval("amount > 0 and o.id = 2", &row)?, Value::Boolean(false));
        assert_eq!(eval("not (amount > 0)", &row)?, Value::Null);
        assert_eq!(eval("amount is null and name is null", &row)?, Value::Boolean(true));
        assert_eq!(eval("o.id not in (2, null)", &row)?, Value::Null);

        let expr = Parser::new("amount > 0").parse_predicate()?;
        assert!(!is_true(&expr, &labels(), &row)?);
        Ok(())
    }

    #[test]
    fn test_like() {
        assert!(like("lancedb", "%db"));
        assert!(like("", "%"));
        assert!(like("a_c", "a_c"));
        assert!(!like("abc", "a_"));
        assert!(!like("Abc", "abc"));
    }
}
