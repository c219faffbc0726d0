use std::iter::Peekable;

use crate::error::{Error, Result};
use crate::sql::parser::ast::{
    Consts, Expression, FromItem, JoinType, Operation, OrderDirection, Select, SelectItem,
};
use crate::sql::parser::lexer::{Keyword, Lexer, Token};

pub mod ast;
mod lexer;

/// Aggregate functions understood by the executor
const AGGREGATES: [&str; 5] = ["COUNT", "SUM", "AVG", "MIN", "MAX"];

/// SQL Parser - Converts tokens into Abstract Syntax Tree (AST)
pub struct Parser<'a> {
    lexer: Peekable<Lexer<'a>>,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given SQL input
    pub fn new(input: &'a str) -> Self {
        Parser { lexer: Lexer::new(input).peekable() }
    }

    /// Parses a complete SELECT statement; a trailing semicolon is optional
    pub fn parse_query(&mut self) -> Result<Select> {
        let select = self.parse_select()?;
        self.next_if_token(Token::Semicolon);
        self.expect_end()?;
        Ok(select)
    }

    /// Parses a standalone predicate such as a WHERE clause body
    pub fn parse_predicate(&mut self) -> Result<Expression> {
        let expr = self.parse_expression()?;
        self.expect_end()?;
        Ok(expr)
    }

    fn expect_end(&mut self) -> Result<()> {
        // No tokens allowed after the statement
        if let Some(token) = self.peek()? {
            return Err(Error::Parse(format!("[Parser] Unexpected token {}", token)));
        }
        Ok(())
    }

    /// Parses SELECT statement
    fn parse_select(&mut self) -> Result<Select> {
        match self.peek()? {
            Some(Token::Keyword(Keyword::Select)) => {}
            Some(t) => return Err(Error::Parse(format!("[Parser] Unexpected token {}", t))),
            None => return Err(Error::Parse("[Parser] Unexpected end of input".into())),
        }
        self.next_expect(Token::Keyword(Keyword::Select))?;
        let distinct = self.next_if_token(Token::Keyword(Keyword::Distinct)).is_some();

        let mut items = Vec::new();
        loop {
            items.push(self.parse_select_item()?);
            if self.next_if_token(Token::Comma).is_none() {
                break;
            }
        }

        let from = match self.next_if_token(Token::Keyword(Keyword::From)) {
            Some(_) => Some(self.parse_from_clause()?),
            None => None,
        };
        let filter = match self.next_if_token(Token::Keyword(Keyword::Where)) {
            Some(_) => Some(self.parse_expression()?),
            None => None,
        };

        let mut group_by = Vec::new();
        if self.next_if_token(Token::Keyword(Keyword::Group)).is_some() {
            self.next_expect(Token::Keyword(Keyword::By))?;
            loop {
                group_by.push(self.parse_expression()?);
                if self.next_if_token(Token::Comma).is_none() {
                    break;
                }
            }
        }
        let having = match self.next_if_token(Token::Keyword(Keyword::Having)) {
            Some(_) => Some(self.parse_expression()?),
            None => None,
        };

        let mut order_by = Vec::new();
        if self.next_if_token(Token::Keyword(Keyword::Order)).is_some() {
            self.next_expect(Token::Keyword(Keyword::By))?;
            loop {
                let expr = self.parse_expression()?;
                let direction = match self.next_if_keyword() {
                    Some(Token::Keyword(Keyword::Desc)) => OrderDirection::Desc,
                    Some(Token::Keyword(Keyword::Asc)) => OrderDirection::Asc,
                    Some(token) => {
                        return Err(Error::Parse(format!("[Parser] Unexpected token {}", token)))
                    }
                    None => OrderDirection::Asc,
                };
                order_by.push((expr, direction));
                if self.next_if_token(Token::Comma).is_none() {
                    break;
                }
            }
        }

        let limit = match self.next_if_token(Token::Keyword(Keyword::Limit)) {
            Some(_) => Some(self.parse_expression()?),
            None => None,
        };
        let offset = match self.next_if_token(Token::Keyword(Keyword::Offset)) {
            Some(_) => Some(self.parse_expression()?),
            None => None,
        };

        Ok(Select {
            distinct,
            items,
            from,
            filter,
            group_by,
            having,
            order_by,
            limit,
            offset,
        })
    }

    fn parse_select_item(&mut self) -> Result<SelectItem> {
        if self.next_if_token(Token::Asterisk).is_some() {
            return Ok(SelectItem::Wildcard);
        }
        let expr = self.parse_expression()?;
        // `t.*` comes back from the expression parser as a field named `*`
        if let Expression::Field(Some(table), name) = &expr {
            if name == "*" {
                return Ok(SelectItem::QualifiedWildcard(table.clone()));
            }
        }
        Ok(SelectItem::Expr(expr, self.parse_alias()?))
    }

    /// Parses an optional `[AS] alias`
    fn parse_alias(&mut self) -> Result<Option<String>> {
        if self.next_if_token(Token::Keyword(Keyword::As)).is_some() {
            return Ok(Some(self.next_ident()?));
        }
        Ok(match self.next_if(|t| matches!(t, Token::Ident(_))) {
            Some(Token::Ident(alias)) => Some(alias),
            _ => None,
        })
    }

    /// Parses the FROM clause: table references joined left to right
    fn parse_from_clause(&mut self) -> Result<FromItem> {
        let mut item = self.parse_table_ref()?;
        loop {
            let join_type = if self.next_if_token(Token::Comma).is_some() {
                JoinType::Cross
            } else if let Some(join_type) = self.parse_join_type()? {
                join_type
            } else {
                break;
            };

            let right = self.parse_table_ref()?;
            let predicate = match join_type {
                JoinType::Cross => None,
                _ => {
                    self.next_expect(Token::Keyword(Keyword::On))?;
                    Some(self.parse_expression()?)
                }
            };
            item = FromItem::Join {
                left: Box::new(item),
                right: Box::new(right),
                join_type,
                predicate,
            };
        }
        Ok(item)
    }

    fn parse_join_type(&mut self) -> Result<Option<JoinType>> {
        let join_type = match self.peek()? {
            Some(Token::Keyword(Keyword::Join)) => JoinType::Inner,
            Some(Token::Keyword(Keyword::Inner)) => {
                self.next()?;
                JoinType::Inner
            }
            Some(Token::Keyword(Keyword::Cross)) => {
                self.next()?;
                JoinType::Cross
            }
            Some(Token::Keyword(Keyword::Left)) => {
                self.next()?;
                self.next_if_token(Token::Keyword(Keyword::Outer));
                JoinType::Left
            }
            _ => return Ok(None),
        };
        self.next_expect(Token::Keyword(Keyword::Join))?;
        Ok(Some(join_type))
    }

    fn parse_table_ref(&mut self) -> Result<FromItem> {
        let name = self.next_ident()?;
        let alias = self.parse_alias()?;
        Ok(FromItem::Table { name, alias })
    }

    /// Parses an expression using precedence climbing
    pub fn parse_expression(&mut self) -> Result<Expression> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expression> {
        let mut lhs = self.parse_and()?;
        while self.next_if_token(Token::Keyword(Keyword::Or)).is_some() {
            let rhs = self.parse_and()?;
            lhs = Operation::Or(Box::new(lhs), Box::new(rhs)).into();
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expression> {
        let mut lhs = self.parse_not()?;
        while self.next_if_token(Token::Keyword(Keyword::And)).is_some() {
            let rhs = self.parse_not()?;
            lhs = Operation::And(Box::new(lhs), Box::new(rhs)).into();
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expression> {
        if self.next_if_token(Token::Keyword(Keyword::Not)).is_some() {
            return Ok(Operation::Not(Box::new(self.parse_not()?)).into());
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expression> {
        let lhs = self.parse_additive()?;
        let l = Box::new(lhs.clone());

        let op = match self.peek()? {
            Some(Token::Equal) => Operation::Equal,
            Some(Token::NotEqual) => Operation::NotEqual,
            Some(Token::LessThan) => Operation::LessThan,
            Some(Token::LessThanOrEqual) => Operation::LessThanOrEqual,
            Some(Token::GreaterThan) => Operation::GreaterThan,
            Some(Token::GreaterThanOrEqual) => Operation::GreaterThanOrEqual,
            Some(Token::Keyword(Keyword::Is)) => {
                self.next()?;
                let not = self.next_if_token(Token::Keyword(Keyword::Not)).is_some();
                self.next_expect(Token::Keyword(Keyword::Null))?;
                return Ok(Operation::IsNull(l, not).into());
            }
            Some(Token::Keyword(Keyword::Not)) => {
                self.next()?;
                return self.parse_negatable(l, true);
            }
            Some(Token::Keyword(Keyword::In | Keyword::Like | Keyword::Between)) => {
                return self.parse_negatable(l, false);
            }
            _ => return Ok(lhs),
        };
        self.next()?;
        let rhs = self.parse_additive()?;
        Ok(op(l, Box::new(rhs)).into())
    }

    /// Parses the tail of `[NOT] IN`, `[NOT] LIKE` or `[NOT] BETWEEN`
    fn parse_negatable(&mut self, lhs: Box<Expression>, not: bool) -> Result<Expression> {
        match self.next()? {
            Token::Keyword(Keyword::In) => {
                self.next_expect(Token::OpenParen)?;
                let mut list = Vec::new();
                loop {
                    list.push(self.parse_expression()?);
                    match self.next()? {
                        Token::CloseParen => break,
                        Token::Comma => {}
                        token => {
                            return Err(Error::Parse(format!("[Parser] Unexpected token {}", token)))
                        }
                    }
                }
                Ok(Operation::In(lhs, list, not).into())
            }
            Token::Keyword(Keyword::Like) => {
                let pattern = self.parse_additive()?;
                Ok(Operation::Like(lhs, Box::new(pattern), not).into())
            }
            Token::Keyword(Keyword::Between) => {
                let low = self.parse_additive()?;
                self.next_expect(Token::Keyword(Keyword::And))?;
                let high = self.parse_additive()?;
                Ok(Operation::Between(lhs, Box::new(low), Box::new(high), not).into())
            }
            token => Err(Error::Parse(format!("[Parser] Unexpected token {}", token))),
        }
    }

    fn parse_additive(&mut self) -> Result<Expression> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek()? {
                Some(Token::Plus) => Operation::Add,
                Some(Token::Minus) => Operation::Subtract,
                _ => break,
            };
            self.next()?;
            let rhs = self.parse_multiplicative()?;
            lhs = op(Box::new(lhs), Box::new(rhs)).into();
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek()? {
                Some(Token::Asterisk) => Operation::Multiply,
                Some(Token::Slash) => Operation::Divide,
                Some(Token::Percent) => Operation::Modulo,
                _ => break,
            };
            self.next()?;
            let rhs = self.parse_unary()?;
            lhs = op(Box::new(lhs), Box::new(rhs)).into();
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expression> {
        if self.next_if_token(Token::Plus).is_some() {
            return self.parse_unary();
        }
        if self.next_if_token(Token::Minus).is_some() {
            // Fold negative literals so `-5` stays a constant
            return Ok(match self.parse_unary()? {
                Expression::Consts(Consts::Integer(i)) => Consts::Integer(-i).into(),
                Expression::Consts(Consts::Float(f)) => Consts::Float(-f).into(),
                expr => Operation::Negate(Box::new(expr)).into(),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expression> {
        Ok(match self.next()? {
            Token::Number(n) => {
                // Lexer scans both 123 and 123.45 as Token::Number(String)
                // Need to distinguish between integer and float here
                if n.chars().all(|c| c.is_ascii_digit()) {
                    Consts::Integer(n.parse()?).into()
                } else {
                    Consts::Float(n.parse()?).into()
                }
            }
            Token::String(s) => Consts::String(s).into(),
            Token::Keyword(Keyword::True) => Consts::Boolean(true).into(),
            Token::Keyword(Keyword::False) => Consts::Boolean(false).into(),
            Token::Keyword(Keyword::Null) => Consts::Null.into(),
            Token::OpenParen => {
                let expr = self.parse_expression()?;
                self.next_expect(Token::CloseParen)?;
                expr
            }
            Token::Ident(ident) => {
                if self.next_if_token(Token::OpenParen).is_some() {
                    return self.parse_function(ident);
                }
                if self.next_if_token(Token::Period).is_some() {
                    if self.next_if_token(Token::Asterisk).is_some() {
                        return Ok(Expression::Field(Some(ident), "*".into()));
                    }
                    let column = self.next_ident()?;
                    return Ok(Expression::Field(Some(ident), column));
                }
                Expression::Field(None, ident)
            }
            t => {
                return Err(Error::Parse(format!(
                    "[Parser] Unexpected expression token {}",
                    t
                )))
            }
        })
    }

    /// Parses an aggregate call after its opening parenthesis
    fn parse_function(&mut self, name: String) -> Result<Expression> {
        let upper = name.to_uppercase();
        if !AGGREGATES.contains(&upper.as_str()) {
            return Err(Error::Parse(format!("[Parser] Unknown function {}", name)));
        }
        let arg = if upper == "COUNT" && self.next_if_token(Token::Asterisk).is_some() {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.next_expect(Token::CloseParen)?;
        Ok(Expression::Function(upper, arg))
    }

    /// Peeks at the next token
    fn peek(&mut self) -> Result<Option<Token>> {
        self.lexer.peek().cloned().transpose()
    }

    /// Consumes and returns the next token
    fn next(&mut self) -> Result<Token> {
        self.lexer
            .next()
            .unwrap_or_else(|| Err(Error::Parse("[Parser] Unexpected end of input".into())))
    }

    /// Expects and consumes an identifier
    fn next_ident(&mut self) -> Result<String> {
        match self.next()? {
            Token::Ident(ident) => Ok(ident),
            token => Err(Error::Parse(format!(
                "[Parser] Expected ident, got token {}",
                token
            ))),
        }
    }

    /// Expects a specific token, returns error if different
    fn next_expect(&mut self, expect: Token) -> Result<()> {
        let token = self.next()?;
        if token != expect {
            return Err(Error::Parse(format!(
                "[Parser] Expected token {}, got {}",
                expect, token
            )));
        }
        Ok(())
    }

    /// Consumes next token if it satisfies the predicate
    fn next_if<F: Fn(&Token) -> bool>(&mut self, predicate: F) -> Option<Token> {
        self.peek().unwrap_or(None).filter(|t| predicate(t))?;
        self.next().ok()
    }

    /// Consumes next token if it's an ASC/DESC keyword
    fn next_if_keyword(&mut self) -> Option<Token> {
        self.next_if(|t| matches!(t, Token::Keyword(Keyword::Asc | Keyword::Desc)))
    }

    /// Consumes next token if it matches the given token
    fn next_if_token(&mut self, token: Token) -> Option<Token> {
        self.next_if(|t| t == &token)
    }
}

#[cfg(test)]
mod tests {
    use super::Parser;
    use crate::{
        error::Result,
        sql::parser::ast::{
            Consts, Expression, FromItem, JoinType, Operation, OrderDirection, SelectItem,
        },
    };

    fn field(name: &str) -> Box<Expression> {
        Box::new(Expression::Field(None, name.to_string()))
    }

    #[test]
    fn test_parser_select() -> Result<()> {
        let select = Parser::new("select * from tbl1;").parse_query()?;
        assert_eq!(select.items, vec![SelectItem::Wildcard]);
        assert_eq!(
            select.from,
            Some(FromItem::Table { name: "tbl1".into(), alias: None })
        );

        let stmt1 =
            Parser::new("SELECT a, b AS bee FROM t WHERE a > 1 ORDER BY b DESC LIMIT 5")
                .parse_query()?;
        let stmt2 = Parser::new("select   a ,b bee from t where a>1 order by b desc limit 5;")
            .parse_query()?;
        assert_eq!(stmt1, stmt2);
        assert_eq!(stmt1.order_by, vec![(*field("b"), OrderDirection::Desc)]);
        assert_eq!(stmt1.limit, Some(Consts::Integer(5).into()));

        assert!(Parser::new("select * from t extra tokens").parse_query().is_err());
        assert!(Parser::new("delete from t").parse_query().is_err());
        Ok(())
    }

    #[test]
    fn test_parser_join_and_aggregate() -> Result<()> {
        let select = Parser::new(
            "select c.name, count(*) as n, sum(o.amount) from customers c \
             left join orders o on c.id = o.customer_id group by c.name having count(*) > 1",
        )
        .parse_query()?;

        match &select.from {
            Some(FromItem::Join { join_type, predicate, .. }) => {
                assert_eq!(*join_type, JoinType::Left);
                assert!(predicate.is_some());
            }
            other => panic!("unexpected from clause {:?}", other),
        }
        assert_eq!(
            select.items[1],
            SelectItem::Expr(Expression::Function("COUNT".into(), None), Some("n".into()))
        );
        assert_eq!(select.group_by.len(), 1);
        assert!(select.having.as_ref().map(|h| h.contains_aggregate()).unwrap_or(false));

        let select = Parser::new("select o.* from a o, b").parse_query()?;
        assert_eq!(select.items, vec![SelectItem::QualifiedWildcard("o".into())]);
        assert!(matches!(select.from, Some(FromItem::Join { join_type: JoinType::Cross, .. })));
        Ok(())
    }

    #[test]
    fn test_parser_predicate() -> Result<()> {
        let expr = Parser::new("amount < 0").parse_predicate()?;
        assert_eq!(
            expr,
            Operation::LessThan(field("amount"), Box::new(Consts::Integer(0).into())).into()
        );

        // AND binds tighter than OR
        let expr = Parser::new("a = 1 or b = 2 and c is not null").parse_predicate()?;
        match expr {
            Expression::Operation(Operation::Or(_, rhs)) => {
                assert!(matches!(*rhs, Expression::Operation(Operation::And(..))))
            }
            other => panic!("unexpected expression {:?}", other),
        }

        let expr = Parser::new("name not like 'J%' and id not in (1, 2) and x between -1 and 3")
            .parse_predicate()?;
        assert_eq!(
            expr.to_string(),
            "(((name NOT LIKE 'J%') AND (id NOT IN (1, 2))) AND (x BETWEEN -1 AND 3))"
        );

        assert!(Parser::new("1=1").parse_predicate().is_ok());
        assert!(Parser::new("a = ").parse_predicate().is_err());
        assert!(Parser::new("upper(a) = 'X'").parse_predicate().is_err());
        Ok(())
    }
}
