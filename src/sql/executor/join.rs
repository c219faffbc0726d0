use crate::{
    error::Result,
    sql::{
        eval::is_true,
        executor::{Catalog, Frame},
        parser::ast::Expression,
        types::Value,
    },
};

use super::Executor;

/// Nested Loop Join executor
///
/// Without a predicate this is the Cartesian product of both sides.
pub struct NestedLoopJoin<C: Catalog> {
    left: Box<dyn Executor<C>>,
    right: Box<dyn Executor<C>>,
    predicate: Option<Expression>,
    outer: bool,
}

impl<C: Catalog> NestedLoopJoin<C> {
    pub fn new(
        left: Box<dyn Executor<C>>,
        right: Box<dyn Executor<C>>,
        predicate: Option<Expression>,
        outer: bool,
    ) -> Box<Self> {
        Box::new(Self {
            left,
            right,
            predicate,
            outer,
        })
    }
}

impl<C: Catalog> Executor<C> for NestedLoopJoin<C> {
    fn execute(self: Box<Self>, catalog: &C) -> Result<Frame> {
        let Frame {
            mut labels,
            rows: lrows,
        } = self.left.execute(catalog)?;
        let Frame {
            labels: rlabels,
            rows: rrows,
        } = self.right.execute(catalog)?;
        let right_width = rlabels.len();
        // Joined rows are labelled left columns first, qualified by their relation
        labels.extend(rlabels);

        let mut rows = Vec::new();
        for lrow in &lrows {
            catalog.checkpoint()?;
            let mut matched = false;
            for rrow in &rrows {
                let mut row = lrow.clone();
                row.extend(rrow.iter().cloned());
                let keep = match &self.predicate {
                    Some(predicate) => is_true(predicate, &labels, &row)?,
                    None => true,
                };
                if keep {
                    rows.push(row);
                    matched = true;
                }
            }

            // For outer joins, fill with NULL if no match found
            if self.outer && !matched {
                let mut row = lrow.clone();
                row.extend(std::iter::repeat(Value::Null).take(right_width));
                rows.push(row);
            }
        }

        Ok(Frame { labels, rows })
    }
}
