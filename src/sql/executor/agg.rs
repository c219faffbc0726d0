use std::{cmp::Ordering, collections::HashMap};

use crate::{
    error::{Error, Result},
    sql::{
        eval::{Label, evaluate, resolve},
        executor::{Catalog, Frame, checkpoint_every},
        parser::ast::Expression,
        plan::{AGGREGATE_RELATION, GROUP_RELATION},
        types::{Row, Value},
    },
};

use super::Executor;

/// Aggregate executor - groups rows and computes COUNT, SUM, MIN, MAX, AVG per group
pub struct Aggregate<C: Catalog> {
    source: Box<dyn Executor<C>>,
    group_by: Vec<Expression>,
    aggregates: Vec<Expression>,
}

impl<C: Catalog> Aggregate<C> {
    pub fn new(
        source: Box<dyn Executor<C>>,
        group_by: Vec<Expression>,
        aggregates: Vec<Expression>,
    ) -> Box<Self> {
        Box::new(Self {
            source,
            group_by,
            aggregates,
        })
    }
}

impl<C: Catalog> Executor<C> for Aggregate<C> {
    fn execute(self: Box<Self>, catalog: &C) -> Result<Frame> {
        let Frame { labels, rows } = self.source.execute(catalog)?;

        // Group keys keep the label of the column they name, so later
        // expressions can still refer to `t.col` or `col`
        let mut out_labels = Vec::new();
        for (i, expr) in self.group_by.iter().enumerate() {
            out_labels.push(match expr {
                Expression::Field(relation, name) => {
                    labels[resolve(&labels, relation.as_deref(), name)?].clone()
                }
                _ => Label::new(Some(GROUP_RELATION), &i.to_string()),
            });
        }
        for i in 0..self.aggregates.len() {
            out_labels.push(Label::new(Some(AGGREGATE_RELATION), &i.to_string()));
        }

        // Groups in order of first appearance; without GROUP BY there is
        // exactly one group, even over zero rows
        let mut groups: Vec<(Row, Vec<&Row>)> = Vec::new();
        let mut index: HashMap<Vec<u8>, usize> = HashMap::new();
        if self.group_by.is_empty() {
            groups.push((Vec::new(), rows.iter().collect()));
        } else {
            for (i, row) in rows.iter().enumerate() {
                checkpoint_every(catalog, i)?;
                let key = self
                    .group_by
                    .iter()
                    .map(|e| evaluate(e, &labels, row))
                    .collect::<Result<Row>>()?;
                let encoded = bincode::serialize(&key)?;
                match index.get(&encoded) {
                    Some(&g) => groups[g].1.push(row),
                    None => {
                        index.insert(encoded, groups.len());
                        groups.push((key, vec![row]));
                    }
                }
            }
        }

        let mut out_rows = Vec::with_capacity(groups.len());
        for (key, members) in groups {
            catalog.checkpoint()?;
            let mut row = key;
            for aggregate in &self.aggregates {
                let Expression::Function(name, arg) = aggregate else {
                    return Err(Error::Internal(format!("{} is not an aggregate", aggregate)));
                };
                // COUNT(*) counts every row: stand in a non-null value per row
                let values = members
                    .iter()
                    .map(|r| match arg {
                        Some(arg) => evaluate(arg, &labels, r),
                        None => Ok(Value::Boolean(true)),
                    })
                    .collect::<Result<Vec<_>>>()?;
                row.push(<dyn Calculator>::build(name)?.calc(&values)?);
            }
            out_rows.push(row);
        }

        Ok(Frame {
            labels: out_labels,
            rows: out_rows,
        })
    }
}

/// Trait for aggregate function calculations
pub trait Calculator {
    fn calc(&self, values: &[Value]) -> Result<Value>;
}

impl dyn Calculator {
    /// Runtime dispatch to appropriate calculator based on function name
    pub fn build(func_name: &str) -> Result<Box<dyn Calculator>> {
        let calculator: Box<dyn Calculator> = match func_name.to_uppercase().as_ref() {
            "COUNT" => Box::new(Count),
            "SUM" => Box::new(Sum),
            "MIN" => Box::new(Extreme(Ordering::Less)),
            "MAX" => Box::new(Extreme(Ordering::Greater)),
            "AVG" => Box::new(Avg),
            _ => {
                return Err(Error::QueryFailed(format!(
                    "Catalog Error: unknown aggregate function {}",
                    func_name
                )))
            }
        };
        Ok(calculator)
    }
}

/// COUNT - counts non-null values
pub struct Count;

impl Calculator for Count {
    fn calc(&self, values: &[Value]) -> Result<Value> {
        Ok(Value::Integer(
            values.iter().filter(|v| !v.is_null()).count() as i64,
        ))
    }
}

/// MIN / MAX - keeps the value that compares as the wrapped ordering
pub struct Extreme(Ordering);

impl Calculator for Extreme {
    fn calc(&self, values: &[Value]) -> Result<Value> {
        let mut best: Option<&Value> = None;
        for value in values.iter().filter(|v| !v.is_null()) {
            best = match best {
                None => Some(value),
                Some(current) => match value.partial_cmp(current) {
                    Some(o) if o == self.0 => Some(value),
                    Some(_) => Some(current),
                    None => {
                        return Err(Error::QueryFailed(format!(
                            "Binder Error: cannot compare values of type {} and {}",
                            value.kind(),
                            current.kind()
                        )))
                    }
                },
            };
        }
        Ok(best.cloned().unwrap_or(Value::Null))
    }
}

/// SUM - integer sum while every input is an integer, float sum otherwise
pub struct Sum;

impl Calculator for Sum {
    fn calc(&self, values: &[Value]) -> Result<Value> {
        let mut int_sum: Option<i64> = Some(0);
        let mut float_sum = 0.0;
        let mut seen = false;
        for value in values {
            match value {
                Value::Null => continue,
                Value::Integer(v) => {
                    int_sum = int_sum.and_then(|s| s.checked_add(*v));
                    float_sum += *v as f64;
                }
                Value::Float(v) => {
                    int_sum = None;
                    float_sum += v;
                }
                v => {
                    return Err(Error::QueryFailed(format!(
                        "Binder Error: cannot sum values of type {}",
                        v.kind()
                    )))
                }
            }
            seen = true;
        }

        Ok(match (seen, int_sum) {
            (false, _) => Value::Null,
            (true, Some(s)) => Value::Integer(s),
            (true, None) => Value::Float(float_sum),
        })
    }
}

/// AVG - calculates average of non-null values
pub struct Avg;

impl Calculator for Avg {
    fn calc(&self, values: &[Value]) -> Result<Value> {
        // AVG = SUM / COUNT
        let sum = Sum.calc(values)?;
        let count = Count.calc(values)?;
        Ok(match (sum.as_f64(), count) {
            (Some(s), Value::Integer(c)) if c > 0 => Value::Float(s / c as f64),
            _ => Value::Null,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Calculator;
    use crate::{error::Result, sql::types::Value};

    fn calc(name: &str, values: &[Value]) -> Result<Value> {
        <dyn Calculator>::build(name)?.calc(values)
    }

    #[test]
    fn test_calculators() -> Result<()> {
        let values = vec![Value::Integer(3), Value::Null, Value::Integer(-5), Value::Integer(8)];
        assert_eq!(calc("count", &values)?, Value::Integer(3));
        assert_eq!(calc("sum", &values)?, Value::Integer(6));
        assert_eq!(calc("avg", &values)?, Value::Float(2.0));
        assert_eq!(calc("min", &values)?, Value::Integer(-5));
        assert_eq!(calc("max", &values)?, Value::Integer(8));

        assert_eq!(calc("sum", &[Value::Integer(1), Value::Float(0.5)])?, Value::Float(1.5));
        assert_eq!(calc("sum", &[Value::Null])?, Value::Null);
        assert_eq!(calc("avg", &[])?, Value::Null);
        assert!(calc("sum", &[Value::String("a".into())]).is_err());
        assert!(calc("median", &values).is_err());
        Ok(())
    }
}
