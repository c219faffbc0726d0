use crate::{
    error::{Error, Result},
    sql::{
        eval::evaluate,
        parser::ast::{self, Expression, SelectItem},
        plan::{Node, Plan},
        types::Value,
    },
};

/// Relation name of aggregate results in the rows produced by `Node::Aggregate`
pub const AGGREGATE_RELATION: &str = "#agg";
/// Relation name of computed (non-column) group keys
pub const GROUP_RELATION: &str = "#group";

/// Query planner - converts AST into execution plan nodes
pub struct Planner;

impl Planner {
    pub fn new() -> Self {
        Self {}
    }

    /// Builds an execution plan from a SELECT statement
    pub fn build(&self, select: ast::Select) -> Result<Plan> {
        Ok(Plan(self.build_select(select)?))
    }

    fn build_select(&self, select: ast::Select) -> Result<Node> {
        let ast::Select {
            distinct,
            items,
            from,
            filter,
            group_by,
            having,
            mut order_by,
            limit,
            offset,
        } = select;

        // Build scan node from FROM clause (single table or join result)
        let mut node = match from {
            Some(item) => self.build_from_item(item)?,
            None => Node::Values,
        };

        if let Some(predicate) = filter {
            if predicate.contains_aggregate() {
                return Err(Error::QueryFailed(
                    "Binder Error: WHERE clause cannot contain aggregates".into(),
                ));
            }
            node = Node::Filter {
                source: Box::new(node),
                predicate,
            };
        }

        // Every projected expression gets its output name before any rewriting
        let mut items: Vec<SelectItem> = items
            .into_iter()
            .map(|item| match item {
                SelectItem::Expr(expr, alias) => {
                    let name = alias.unwrap_or_else(|| output_name(&expr));
                    SelectItem::Expr(expr, Some(name))
                }
                other => other,
            })
            .collect();

        let aggregating = !group_by.is_empty()
            || having.is_some()
            || order_by.iter().any(|(e, _)| e.contains_aggregate())
            || items
                .iter()
                .any(|i| matches!(i, SelectItem::Expr(e, _) if e.contains_aggregate()));

        if aggregating {
            if items.iter().any(|i| !matches!(i, SelectItem::Expr(..))) {
                return Err(Error::QueryFailed(
                    "Binder Error: SELECT * cannot be combined with GROUP BY or aggregates".into(),
                ));
            }

            let mut aggregates = Vec::new();
            {
                let mut collect = |expr: &Expression| -> Result<()> {
                    let mut nested = false;
                    expr.walk(&mut |e| {
                        if let Expression::Function(_, Some(arg)) = e {
                            nested |= arg.contains_aggregate();
                        }
                        if matches!(e, Expression::Function(..)) && !aggregates.contains(e) {
                            aggregates.push(e.clone());
                        }
                    });
                    if nested {
                        return Err(Error::QueryFailed(
                            "Binder Error: aggregate function calls cannot be nested".into(),
                        ));
                    }
                    Ok(())
                };
                for item in &items {
                    if let SelectItem::Expr(expr, _) = item {
                        collect(expr)?;
                    }
                }
                if let Some(expr) = &having {
                    collect(expr)?;
                }
                for (expr, _) in &order_by {
                    collect(expr)?;
                }
            }
            for expr in &group_by {
                if expr.contains_aggregate() {
                    return Err(Error::QueryFailed(
                        "Binder Error: GROUP BY clause cannot contain aggregates".into(),
                    ));
                }
            }

            let rewrite = |expr: Expression| rewrite_aggregates(expr, &aggregates, &group_by);
            items = items
                .into_iter()
                .map(|item| match item {
                    SelectItem::Expr(expr, name) => SelectItem::Expr(rewrite(expr), name),
                    other => other,
                })
                .collect();
            order_by = order_by
                .into_iter()
                .map(|(expr, direction)| (rewrite(expr), direction))
                .collect();
            let having = having.map(rewrite);

            node = Node::Aggregate {
                source: Box::new(node),
                group_by,
                aggregates,
            };
            if let Some(predicate) = having {
                node = Node::Filter {
                    source: Box::new(node),
                    predicate,
                };
            }
        }

        node = Node::Projection {
            source: Box::new(node),
            items,
            distinct,
            order_by,
        };

        // OFFSET - must be processed before LIMIT when both are present
        if let Some(expr) = offset {
            node = Node::Offset {
                source: Box::new(node),
                offset: constant_count(&expr, "OFFSET")?,
            };
        }

        if let Some(expr) = limit {
            node = Node::Limit {
                source: Box::new(node),
                limit: constant_count(&expr, "LIMIT")?,
            };
        }

        Ok(node)
    }

    fn build_from_item(&self, item: ast::FromItem) -> Result<Node> {
        Ok(match item {
            ast::FromItem::Table { name, alias } => Node::Scan { view: name, alias },
            ast::FromItem::Join {
                left,
                right,
                join_type,
                predicate,
            } => Node::NestedLoopJoin {
                // Recursively build join nodes (base case: single table)
                left: Box::new(self.build_from_item(*left)?),
                right: Box::new(self.build_from_item(*right)?),
                predicate,
                outer: join_type == ast::JoinType::Left,
            },
        })
    }
}

/// Default column name of a projected expression
fn output_name(expr: &Expression) -> String {
    match expr {
        Expression::Field(_, name) => name.clone(),
        other => other.to_string(),
    }
}

/// Replaces aggregate calls and computed group keys with references to the
/// columns `Node::Aggregate` produces for them
fn rewrite_aggregates(
    expr: Expression,
    aggregates: &[Expression],
    group_by: &[Expression],
) -> Expression {
    expr.replace(&mut |e| {
        if let Some(i) = aggregates.iter().position(|a| a == e) {
            return Some(Expression::Field(
                Some(AGGREGATE_RELATION.into()),
                i.to_string(),
            ));
        }
        if matches!(e, Expression::Operation(_)) {
            if let Some(i) = group_by.iter().position(|g| g == e) {
                return Some(Expression::Field(Some(GROUP_RELATION.into()), i.to_string()));
            }
        }
        None
    })
}

/// Evaluates a LIMIT/OFFSET expression, which must be a non-negative integer constant
fn constant_count(expr: &Expression, clause: &str) -> Result<usize> {
    match evaluate(expr, &[], &[]) {
        Ok(Value::Integer(n)) if n >= 0 => Ok(n as usize),
        _ => Err(Error::QueryFailed(format!(
            "Binder Error: {} must be a non-negative integer constant, got {}",
            clause, expr
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::{AGGREGATE_RELATION, Planner};
    use crate::{
        error::{Error, Result},
        sql::{
            parser::{Parser, ast::Expression, ast::SelectItem},
            plan::{Node, Plan},
        },
    };

    fn plan(sql: &str) -> Result<Plan> {
        Planner::new().build(Parser::new(sql).parse_query()?)
    }

    #[test]
    fn test_plan_limit_offset() -> Result<()> {
        let Plan(node) = plan("select a from t where a > 1 limit 5 offset 2")?;
        match node {
            Node::Limit { source, limit: 5 } => {
                assert!(matches!(*source, Node::Offset { offset: 2, .. }))
            }
            other => panic!("unexpected plan {:?}", other),
        }
        assert!(matches!(
            plan("select a from t limit -1"),
            Err(Error::QueryFailed(_))
        ));
        Ok(())
    }

    #[test]
    fn test_plan_aggregate_rewrite() -> Result<()> {
        let Plan(node) = plan("select name, count(*) from t group by name having count(*) > 1")?;
        let Node::Projection { source, items, .. } = node else {
            panic!("expected projection");
        };
        assert_eq!(
            items[1],
            SelectItem::Expr(
                Expression::Field(Some(AGGREGATE_RELATION.into()), "0".into()),
                Some("count(*)".into())
            )
        );
        let Node::Filter { source, .. } = *source else {
            panic!("expected having filter");
        };
        match *source {
            Node::Aggregate { aggregates, group_by, .. } => {
                assert_eq!(aggregates, vec![Expression::Function("COUNT".into(), None)]);
                assert_eq!(group_by.len(), 1);
            }
            other => panic!("unexpected plan {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_plan_errors() {
        assert!(plan("select * from t group by a").is_err());
        assert!(plan("select a from t where count(*) > 1").is_err());
        assert!(plan("select sum(count(a)) from t").is_err());
    }
}
