use std::fmt::Display;

/// Abstract Syntax Tree (AST) node definitions for SELECT statements
#[derive(Debug, PartialEq, Clone)]
pub struct Select {
    pub distinct: bool,
    /// Projected items in output order
    pub items: Vec<SelectItem>,
    pub from: Option<FromItem>,
    pub filter: Option<Expression>,
    pub group_by: Vec<Expression>,
    pub having: Option<Expression>,
    pub order_by: Vec<(Expression, OrderDirection)>,
    pub limit: Option<Expression>,
    pub offset: Option<Expression>,
}

/// One entry of the SELECT list
#[derive(Debug, PartialEq, Clone)]
pub enum SelectItem {
    /// `*`
    Wildcard,
    /// `t.*`
    QualifiedWildcard(String),
    /// Expression with optional alias (e.g., count(*) as cnt)
    Expr(Expression, Option<String>),
}

/// FROM clause item - represents a table or join expression
#[derive(Debug, PartialEq, Clone)]
pub enum FromItem {
    /// Single table reference
    Table {
        name: String,
        alias: Option<String>,
    },

    /// Join expression (two tables joined together)
    Join {
        left: Box<FromItem>,
        right: Box<FromItem>,
        join_type: JoinType,
        /// Join ON condition (None for CROSS JOIN)
        predicate: Option<Expression>,
    },
}

impl FromItem {
    /// Names of every table referenced by this item, left to right
    pub fn table_names(&self) -> Vec<String> {
        match self {
            FromItem::Table { name, .. } => vec![name.clone()],
            FromItem::Join { left, right, .. } => {
                let mut names = left.table_names();
                names.extend(right.table_names());
                names
            }
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum JoinType {
    Cross,
    Inner,
    Left,
}

/// Sort direction (ascending or descending)
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// Expression types (column refs, constants, operations, aggregate functions)
#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    /// Column reference, optionally qualified by table name or alias
    Field(Option<String>, String),
    /// Constant value
    Consts(Consts),
    /// Unary or binary operation
    Operation(Operation),
    /// Aggregate function: Function(name, argument); `None` stands for `*`
    Function(String, Option<Box<Expression>>),
}

impl Expression {
    /// Returns true if an aggregate function appears anywhere in the expression
    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if matches!(e, Expression::Function(..)) {
                found = true;
            }
        });
        found
    }

    /// Visits the expression tree in pre-order
    pub fn walk<F: FnMut(&Expression)>(&self, visitor: &mut F) {
        visitor(self);
        match self {
            Expression::Field(..) | Expression::Consts(_) => {}
            Expression::Function(_, arg) => {
                if let Some(arg) = arg {
                    arg.walk(visitor);
                }
            }
            Expression::Operation(op) => {
                for child in op.children() {
                    child.walk(visitor);
                }
            }
        }
    }

    /// Rebuilds the expression top-down. Wherever `f` returns a replacement the
    /// node is swapped out and its children are not visited.
    pub fn replace<F: FnMut(&Expression) -> Option<Expression>>(self, f: &mut F) -> Expression {
        if let Some(replacement) = f(&self) {
            return replacement;
        }
        match self {
            Expression::Operation(op) => Expression::Operation(op.map(|e| e.replace(&mut *f))),
            Expression::Function(name, arg) => {
                Expression::Function(name, arg.map(|a| Box::new(a.replace(&mut *f))))
            }
            e => e,
        }
    }
}

/// Implements From trait to convert Consts into Expression
impl From<Consts> for Expression {
    fn from(value: Consts) -> Self {
        Self::Consts(value)
    }
}

impl From<Operation> for Expression {
    fn from(value: Operation) -> Self {
        Self::Operation(value)
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Field(Some(table), name) => write!(f, "{}.{}", table, name),
            Expression::Field(None, name) => write!(f, "{}", name),
            Expression::Consts(c) => write!(f, "{}", c),
            Expression::Function(name, None) => write!(f, "{}(*)", name.to_lowercase()),
            Expression::Function(name, Some(arg)) => {
                write!(f, "{}({})", name.to_lowercase(), arg)
            }
            Expression::Operation(op) => write!(f, "{}", op),
        }
    }
}

/// Constant values in SQL expressions
#[derive(Debug, PartialEq, Clone)]
pub enum Consts {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Display for Consts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Consts::Null => write!(f, "NULL"),
            Consts::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Consts::Integer(i) => write!(f, "{}", i),
            Consts::Float(v) => write!(f, "{}", v),
            Consts::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

/// Unary and binary operations
#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),

    Equal(Box<Expression>, Box<Expression>),
    NotEqual(Box<Expression>, Box<Expression>),
    GreaterThan(Box<Expression>, Box<Expression>),
    GreaterThanOrEqual(Box<Expression>, Box<Expression>),
    LessThan(Box<Expression>, Box<Expression>),
    LessThanOrEqual(Box<Expression>, Box<Expression>),

    Add(Box<Expression>, Box<Expression>),
    Subtract(Box<Expression>, Box<Expression>),
    Multiply(Box<Expression>, Box<Expression>),
    Divide(Box<Expression>, Box<Expression>),
    Modulo(Box<Expression>, Box<Expression>),
    Negate(Box<Expression>),

    /// `expr IS [NOT] NULL`; the flag is true for `IS NOT NULL`
    IsNull(Box<Expression>, bool),
    /// `expr [NOT] LIKE pattern`
    Like(Box<Expression>, Box<Expression>, bool),
    /// `expr [NOT] IN (list)`
    In(Box<Expression>, Vec<Expression>, bool),
    /// `expr [NOT] BETWEEN low AND high`
    Between(Box<Expression>, Box<Expression>, Box<Expression>, bool),
}

impl Operation {
    /// Direct sub-expressions in evaluation order
    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Operation::Not(e) | Operation::Negate(e) | Operation::IsNull(e, _) => vec![&**e],
            Operation::And(l, r)
            | Operation::Or(l, r)
            | Operation::Equal(l, r)
            | Operation::NotEqual(l, r)
            | Operation::GreaterThan(l, r)
            | Operation::GreaterThanOrEqual(l, r)
            | Operation::LessThan(l, r)
            | Operation::LessThanOrEqual(l, r)
            | Operation::Add(l, r)
            | Operation::Subtract(l, r)
            | Operation::Multiply(l, r)
            | Operation::Divide(l, r)
            | Operation::Modulo(l, r)
            | Operation::Like(l, r, _) => vec![&**l, &**r],
            Operation::In(e, list, _) => {
                let mut children = vec![&**e];
                children.extend(list.iter());
                children
            }
            Operation::Between(e, lo, hi, _) => vec![&**e, &**lo, &**hi],
        }
    }

    /// Applies `f` to every direct sub-expression
    fn map<F: FnMut(Expression) -> Expression>(self, mut f: F) -> Operation {
        let mut b = |e: Box<Expression>| Box::new(f(*e));
        match self {
            Operation::And(l, r) => Operation::And(b(l), b(r)),
            Operation::Or(l, r) => Operation::Or(b(l), b(r)),
            Operation::Not(e) => Operation::Not(b(e)),
            Operation::Equal(l, r) => Operation::Equal(b(l), b(r)),
            Operation::NotEqual(l, r) => Operation::NotEqual(b(l), b(r)),
            Operation::GreaterThan(l, r) => Operation::GreaterThan(b(l), b(r)),
            Operation::GreaterThanOrEqual(l, r) => Operation::GreaterThanOrEqual(b(l), b(r)),
            Operation::LessThan(l, r) => Operation::LessThan(b(l), b(r)),
            Operation::LessThanOrEqual(l, r) => Operation::LessThanOrEqual(b(l), b(r)),
            Operation::Add(l, r) => Operation::Add(b(l), b(r)),
            Operation::Subtract(l, r) => Operation::Subtract(b(l), b(r)),
            Operation::Multiply(l, r) => Operation::Multiply(b(l), b(r)),
            Operation::Divide(l, r) => Operation::Divide(b(l), b(r)),
            Operation::Modulo(l, r) => Operation::Modulo(b(l), b(r)),
            Operation::Negate(e) => Operation::Negate(b(e)),
            Operation::IsNull(e, not) => Operation::IsNull(b(e), not),
            Operation::Like(l, r, not) => Operation::Like(b(l), b(r), not),
            Operation::In(e, list, not) => {
                let e = b(e);
                Operation::In(e, list.into_iter().map(|x| *b(Box::new(x))).collect(), not)
            }
            Operation::Between(e, lo, hi, not) => Operation::Between(b(e), b(lo), b(hi), not),
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let not = |n: &bool| if *n { "NOT " } else { "" };
        match self {
            Operation::And(l, r) => write!(f, "({} AND {})", l, r),
            Operation::Or(l, r) => write!(f, "({} OR {})", l, r),
            Operation::Not(e) => write!(f, "(NOT {})", e),
            Operation::Equal(l, r) => write!(f, "({} = {})", l, r),
            Operation::NotEqual(l, r) => write!(f, "({} != {})", l, r),
            Operation::GreaterThan(l, r) => write!(f, "({} > {})", l, r),
            Operation::GreaterThanOrEqual(l, r) => write!(f, "({} >= {})", l, r),
            Operation::LessThan(l, r) => write!(f, "({} < {})", l, r),
            Operation::LessThanOrEqual(l, r) => write!(f, "({} <= {})", l, r),
            Operation::Add(l, r) => write!(f, "({} + {})", l, r),
            Operation::Subtract(l, r) => write!(f, "({} - {})", l, r),
            Operation::Multiply(l, r) => write!(f, "({} * {})", l, r),
            Operation::Divide(l, r) => write!(f, "({} / {})", l, r),
            Operation::Modulo(l, r) => write!(f, "({} % {})", l, r),
            Operation::Negate(e) => write!(f, "-{}", e),
            Operation::IsNull(e, n) => write!(f, "({} IS {}NULL)", e, not(n)),
            Operation::Like(l, r, n) => write!(f, "({} {}LIKE {})", l, not(n), r),
            Operation::In(e, list, n) => {
                let items = list.iter().map(|x| x.to_string()).collect::<Vec<_>>();
                write!(f, "({} {}IN ({}))", e, not(n), items.join(", "))
            }
            Operation::Between(e, lo, hi, n) => {
                write!(f, "({} {}BETWEEN {} AND {})", e, not(n), lo, hi)
            }
        }
    }
}
