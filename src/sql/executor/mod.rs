use std::sync::Arc;

use crate::{
    error::Result,
    sql::{
        eval::Label,
        executor::{
            agg::Aggregate,
            join::NestedLoopJoin,
            query::{Filter, Limit, Offset, Projection, Scan, Values},
        },
        plan::Node,
        types::Row,
    },
    store::Snapshot,
};

mod agg;
mod join;
mod query;

/// Rows between two interrupt checkpoints inside an executor loop
const CHECKPOINT_INTERVAL: usize = 1024;

/// Source of the views a query reads
pub trait Catalog {
    /// Returns the snapshot registered as `name`, failing if it is missing or stale
    fn view(&self, name: &str) -> Result<Arc<Snapshot>>;

    /// Fails with `Error::Interrupted` once the user has asked to stop
    fn checkpoint(&self) -> Result<()>;
}

/// SQL executor trait
pub trait Executor<C: Catalog> {
    fn execute(self: Box<Self>, catalog: &C) -> Result<Frame>;
}

/// Builds an executor from a plan node
///
/// The `'static` bound is required for trait object usage in recursive executor building.
impl<C: Catalog + 'static> dyn Executor<C> {
    pub fn build(node: Node) -> Box<dyn Executor<C>> {
        match node {
            Node::Scan { view, alias } => Scan::new(view, alias),
            Node::Values => Values::new(),
            Node::Filter { source, predicate } => Filter::new(Self::build(*source), predicate),
            Node::NestedLoopJoin {
                left,
                right,
                predicate,
                outer,
            } => NestedLoopJoin::new(Self::build(*left), Self::build(*right), predicate, outer),
            Node::Aggregate {
                source,
                group_by,
                aggregates,
            } => Aggregate::new(Self::build(*source), group_by, aggregates),
            Node::Projection {
                source,
                items,
                distinct,
                order_by,
            } => Projection::new(Self::build(*source), items, distinct, order_by),
            Node::Offset { source, offset } => Offset::new(Self::build(*source), offset),
            Node::Limit { source, limit } => Limit::new(Self::build(*source), limit),
        }
    }
}

/// Intermediate rows flowing between executors
#[derive(Debug, PartialEq)]
pub struct Frame {
    pub labels: Vec<Label>,
    pub rows: Vec<Row>,
}

/// Final query result: output column names and rows
#[derive(Debug, Clone, PartialEq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl RowSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl From<Frame> for RowSet {
    fn from(frame: Frame) -> Self {
        RowSet {
            columns: frame.labels.into_iter().map(|l| l.name).collect(),
            rows: frame.rows,
        }
    }
}

/// Calls `catalog.checkpoint()` every `CHECKPOINT_INTERVAL` rows
fn checkpoint_every<C: Catalog>(catalog: &C, i: usize) -> Result<()> {
    if i % CHECKPOINT_INTERVAL == 0 {
        catalog.checkpoint()?;
    }
    Ok(())
}
