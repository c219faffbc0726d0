use std::{cmp::Ordering, collections::HashSet};

use crate::{
    error::{Error, Result},
    sql::{
        eval::{Label, evaluate, is_true},
        executor::{Catalog, Frame, checkpoint_every},
        parser::ast::{Consts, Expression, OrderDirection, SelectItem},
        types::{Row, Value},
    },
};

use super::Executor;

/// View scan executor
pub struct Scan {
    view: String,
    alias: Option<String>,
}

impl Scan {
    pub fn new(view: String, alias: Option<String>) -> Box<Self> {
        Box::new(Self { view, alias })
    }
}

impl<C: Catalog> Executor<C> for Scan {
    fn execute(self: Box<Self>, catalog: &C) -> Result<Frame> {
        catalog.checkpoint()?;
        let snapshot = catalog.view(&self.view)?;
        // Columns are qualified by the alias when one is given, else by the view name
        let relation = self.alias.as_deref().unwrap_or(&self.view);
        Ok(Frame {
            labels: snapshot
                .table
                .columns
                .iter()
                .map(|c| Label::new(Some(relation), &c.name))
                .collect(),
            rows: snapshot.rows.clone(),
        })
    }
}

/// Produces one empty row, so `SELECT 1 + 1` yields a single result
pub struct Values;

impl Values {
    pub fn new() -> Box<Self> {
        Box::new(Self)
    }
}

impl<C: Catalog> Executor<C> for Values {
    fn execute(self: Box<Self>, _catalog: &C) -> Result<Frame> {
        Ok(Frame {
            labels: Vec::new(),
            rows: vec![Vec::new()],
        })
    }
}

/// WHERE / HAVING executor - keeps rows whose predicate is TRUE
pub struct Filter<C: Catalog> {
    source: Box<dyn Executor<C>>,
    predicate: Expression,
}

impl<C: Catalog> Filter<C> {
    pub fn new(source: Box<dyn Executor<C>>, predicate: Expression) -> Box<Self> {
        Box::new(Self { source, predicate })
    }
}

impl<C: Catalog> Executor<C> for Filter<C> {
    fn execute(self: Box<Self>, catalog: &C) -> Result<Frame> {
        let Frame { labels, rows } = self.source.execute(catalog)?;
        let mut kept = Vec::new();
        for (i, row) in rows.into_iter().enumerate() {
            checkpoint_every(catalog, i)?;
            if is_true(&self.predicate, &labels, &row)? {
                kept.push(row);
            }
        }
        Ok(Frame { labels, rows: kept })
    }
}

/// Where an output column comes from
enum Output<'a> {
    Column(usize),
    Expr(&'a Expression),
}

/// What an ORDER BY term sorts on
enum SortKey<'a> {
    /// Position in the output row
    Output(usize),
    /// Expression over the source row
    Expr(&'a Expression),
}

/// Projection executor - computes the SELECT list, applies DISTINCT and ORDER BY
pub struct Projection<C: Catalog> {
    source: Box<dyn Executor<C>>,
    items: Vec<SelectItem>,
    distinct: bool,
    order_by: Vec<(Expression, OrderDirection)>,
}

impl<C: Catalog> Projection<C> {
    pub fn new(
        source: Box<dyn Executor<C>>,
        items: Vec<SelectItem>,
        distinct: bool,
        order_by: Vec<(Expression, OrderDirection)>,
    ) -> Box<Self> {
        Box::new(Self {
            source,
            items,
            distinct,
            order_by,
        })
    }
}

impl<C: Catalog> Executor<C> for Projection<C> {
    fn execute(self: Box<Self>, catalog: &C) -> Result<Frame> {
        let Frame { labels, rows } = self.source.execute(catalog)?;

        // Expand wildcards against the source columns
        let mut outputs = Vec::new();
        let mut names = Vec::new();
        for item in &self.items {
            match item {
                SelectItem::Wildcard => {
                    for (i, label) in labels.iter().enumerate() {
                        outputs.push(Output::Column(i));
                        names.push(label.name.clone());
                    }
                }
                SelectItem::QualifiedWildcard(relation) => {
                    let before = outputs.len();
                    for (i, label) in labels.iter().enumerate() {
                        let same = label
                            .relation
                            .as_deref()
                            .is_some_and(|r| r.eq_ignore_ascii_case(relation));
                        if same {
                            outputs.push(Output::Column(i));
                            names.push(label.name.clone());
                        }
                    }
                    if outputs.len() == before {
                        return Err(Error::QueryFailed(format!(
                            "Binder Error: Referenced table \"{}\" not found",
                            relation
                        )));
                    }
                }
                SelectItem::Expr(expr, name) => {
                    outputs.push(Output::Expr(expr));
                    names.push(name.clone().unwrap_or_else(|| expr.to_string()));
                }
            }
        }

        let keys = self
            .order_by
            .iter()
            .map(|(expr, direction)| Ok((sort_key(expr, &names)?, *direction)))
            .collect::<Result<Vec<_>>>()?;

        let mut seen = HashSet::new();
        let mut projected: Vec<(Row, Vec<Value>)> = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            checkpoint_every(catalog, i)?;
            let values = outputs
                .iter()
                .map(|output| match output {
                    Output::Column(c) => Ok(row[*c].clone()),
                    Output::Expr(expr) => evaluate(expr, &labels, row),
                })
                .collect::<Result<Row>>()?;
            // Values are not hashable, their encoding is
            if self.distinct && !seen.insert(bincode::serialize(&values)?) {
                continue;
            }
            let sort = keys
                .iter()
                .map(|(key, _)| match key {
                    SortKey::Output(i) => Ok(values[*i].clone()),
                    SortKey::Expr(expr) => evaluate(expr, &labels, row),
                })
                .collect::<Result<Vec<_>>>()?;
            projected.push((values, sort));
        }

        // Multi-column sort: compare rows key by key according to ORDER BY clause
        // - If comparison is Equal, continue to next key
        // - If Less/Greater, apply ASC/DESC direction and return
        // - If types are incomparable (None), continue to next key
        if !keys.is_empty() {
            projected.sort_by(|(_, a), (_, b)| {
                for (i, (_, direction)) in keys.iter().enumerate() {
                    match a[i].partial_cmp(&b[i]) {
                        Some(Ordering::Equal) | None => {}
                        Some(o) => {
                            return if *direction == OrderDirection::Asc {
                                o
                            } else {
                                o.reverse()
                            };
                        }
                    }
                }
                Ordering::Equal
            });
        }

        Ok(Frame {
            labels: names.iter().map(|n| Label::new(None, n)).collect(),
            rows: projected.into_iter().map(|(values, _)| values).collect(),
        })
    }
}

/// Resolves an ORDER BY term: a 1-based output position, an output column
/// name or alias, or else an expression over the source row
fn sort_key<'a>(expr: &'a Expression, names: &[String]) -> Result<SortKey<'a>> {
    match expr {
        Expression::Consts(Consts::Integer(n)) => {
            if *n >= 1 && (*n as usize) <= names.len() {
                Ok(SortKey::Output(*n as usize - 1))
            } else {
                Err(Error::QueryFailed(format!(
                    "Binder Error: ORDER term out of range - should be between 1 and {}",
                    names.len()
                )))
            }
        }
        Expression::Field(None, name) => {
            let mut found = names
                .iter()
                .enumerate()
                .filter(|(_, n)| n.eq_ignore_ascii_case(name));
            match (found.next(), found.next()) {
                (Some((i, _)), None) => Ok(SortKey::Output(i)),
                _ => Ok(SortKey::Expr(expr)),
            }
        }
        _ => Ok(SortKey::Expr(expr)),
    }
}

/// LIMIT executor - restricts the number of rows returned
pub struct Limit<C: Catalog> {
    source: Box<dyn Executor<C>>,
    limit: usize,
}

impl<C: Catalog> Limit<C> {
    pub fn new(source: Box<dyn Executor<C>>, limit: usize) -> Box<Self> {
        Box::new(Self { source, limit })
    }
}

impl<C: Catalog> Executor<C> for Limit<C> {
    fn execute(self: Box<Self>, catalog: &C) -> Result<Frame> {
        let Frame { labels, rows } = self.source.execute(catalog)?;
        Ok(Frame {
            labels,
            rows: rows.into_iter().take(self.limit).collect(),
        })
    }
}

/// OFFSET executor - skips the first N rows
pub struct Offset<C: Catalog> {
    source: Box<dyn Executor<C>>,
    offset: usize,
}

impl<C: Catalog> Offset<C> {
    pub fn new(source: Box<dyn Executor<C>>, offset: usize) -> Box<Self> {
        Box::new(Self { source, offset })
    }
}

impl<C: Catalog> Executor<C> for Offset<C> {
    fn execute(self: Box<Self>, catalog: &C) -> Result<Frame> {
        let Frame { labels, rows } = self.source.execute(catalog)?;
        Ok(Frame {
            labels,
            rows: rows.into_iter().skip(self.offset).collect(),
        })
    }
}
