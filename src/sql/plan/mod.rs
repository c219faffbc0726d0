use crate::{
    error::Result,
    sql::{
        executor::{Catalog, Executor, RowSet},
        parser::ast::{Expression, OrderDirection, Select, SelectItem},
    },
};

use self::planner::Planner;

mod planner;

pub use self::planner::{AGGREGATE_RELATION, GROUP_RELATION};

/// Execution plan node
#[derive(Debug, PartialEq)]
pub enum Node {
    /// Reads every row of a registered view
    Scan {
        view: String,
        alias: Option<String>,
    },

    /// A single row with no columns, the source of `SELECT` without `FROM`
    Values,

    Filter {
        source: Box<Node>,
        predicate: Expression,
    },

    /// Nested loop join; `outer` keeps unmatched left rows padded with NULLs
    NestedLoopJoin {
        left: Box<Node>,
        right: Box<Node>,
        predicate: Option<Expression>,
        outer: bool,
    },

    /// Groups rows by `group_by` and computes each aggregate call per group.
    /// Output columns are the group keys followed by the aggregates.
    Aggregate {
        source: Box<Node>,
        group_by: Vec<Expression>,
        aggregates: Vec<Expression>,
    },

    /// Computes the output columns, removes duplicates and sorts
    Projection {
        source: Box<Node>,
        items: Vec<SelectItem>,
        distinct: bool,
        order_by: Vec<(Expression, OrderDirection)>,
    },

    Offset {
        source: Box<Node>,
        offset: usize,
    },

    Limit {
        source: Box<Node>,
        limit: usize,
    },
}

/// Execution plan for one SELECT statement
#[derive(Debug, PartialEq)]
pub struct Plan(pub Node);

impl Plan {
    pub fn build(select: Select) -> Result<Self> {
        Planner::new().build(select)
    }

    pub fn execute<C: Catalog + 'static>(self, catalog: &C) -> Result<RowSet> {
        let frame = <dyn Executor<C>>::build(self.0).execute(catalog)?;
        Ok(frame.into())
    }
}
