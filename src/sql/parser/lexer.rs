//! SQL Lexer - Tokenizes SQL input text into a stream of tokens

use std::{fmt::Display, iter::Peekable, str::Chars};

use crate::error::{Error, Result};

/// Represents a single lexical token in the SQL input
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// SQL reserved keyword
    Keyword(Keyword),
    /// Identifier such as table name or column name
    Ident(String),
    /// String literal
    String(String),
    /// Numeric literal (integer or floating-point)
    Number(String),
    /// Operators and punctuation
    OpenParen,
    CloseParen,
    Comma,
    Semicolon,
    Period,
    Asterisk,
    Plus,
    Minus,
    Slash,
    Percent,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Token::Keyword(keyword) => keyword.to_str(),
            Token::Ident(ident) => ident,
            Token::String(v) => v,
            Token::Number(n) => n,
            Token::OpenParen => "(",
            Token::CloseParen => ")",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::Period => ".",
            Token::Asterisk => "*",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Equal => "=",
            Token::NotEqual => "!=",
            Token::LessThan => "<",
            Token::LessThanOrEqual => "<=",
            Token::GreaterThan => ">",
            Token::GreaterThanOrEqual => ">=",
        })
    }
}

/// SQL reserved keywords
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Keyword {
    Select,
    Distinct,
    From,
    As,
    Where,
    Group,
    By,
    Having,
    Order,
    Asc,
    Desc,
    Limit,
    Offset,
    // Join keywords
    Join,
    Inner,
    Left,
    Outer,
    Cross,
    On,
    // Operators spelled as words
    And,
    Or,
    Not,
    Is,
    In,
    Like,
    Between,
    // Literal keywords
    True,
    False,
    Null,
}

impl Keyword {
    /// Attempts to parse a string as a keyword (case-insensitive)
    pub fn from_str(ident: &str) -> Option<Keyword> {
        Some(match ident.to_uppercase().as_ref() {
            "SELECT" => Keyword::Select,
            "DISTINCT" => Keyword::Distinct,
            "FROM" => Keyword::From,
            "AS" => Keyword::As,
            "WHERE" => Keyword::Where,
            "GROUP" => Keyword::Group,
            "BY" => Keyword::By,
            "HAVING" => Keyword::Having,
            "ORDER" => Keyword::Order,
            "ASC" => Keyword::Asc,
            "DESC" => Keyword::Desc,
            "LIMIT" => Keyword::Limit,
            "OFFSET" => Keyword::Offset,
            "JOIN" => Keyword::Join,
            "INNER" => Keyword::Inner,
            "LEFT" => Keyword::Left,
            "OUTER" => Keyword::Outer,
            "CROSS" => Keyword::Cross,
            "ON" => Keyword::On,
            "AND" => Keyword::And,
            "OR" => Keyword::Or,
            "NOT" => Keyword::Not,
            "IS" => Keyword::Is,
            "IN" => Keyword::In,
            "LIKE" => Keyword::Like,
            "BETWEEN" => Keyword::Between,
            "TRUE" => Keyword::True,
            "FALSE" => Keyword::False,
            "NULL" => Keyword::Null,
            _ => return None,
        })
    }

    /// Returns the uppercase string representation of the keyword
    pub fn to_str(&self) -> &'static str {
        match self {
            Keyword::Select => "SELECT",
            Keyword::Distinct => "DISTINCT",
            Keyword::From => "FROM",
            Keyword::As => "AS",
            Keyword::Where => "WHERE",
            Keyword::Group => "GROUP",
            Keyword::By => "BY",
            Keyword::Having => "HAVING",
            Keyword::Order => "ORDER",
            Keyword::Asc => "ASC",
            Keyword::Desc => "DESC",
            Keyword::Limit => "LIMIT",
            Keyword::Offset => "OFFSET",
            Keyword::Join => "JOIN",
            Keyword::Inner => "INNER",
            Keyword::Left => "LEFT",
            Keyword::Outer => "OUTER",
            Keyword::Cross => "CROSS",
            Keyword::On => "ON",
            Keyword::And => "AND",
            Keyword::Or => "OR",
            Keyword::Not => "NOT",
            Keyword::Is => "IS",
            Keyword::In => "IN",
            Keyword::Like => "LIKE",
            Keyword::Between => "BETWEEN",
            Keyword::True => "TRUE",
            Keyword::False => "FALSE",
            Keyword::Null => "NULL",
        }
    }
}

impl Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_str())
    }
}

/// SQL lexical analyzer (lexer/tokenizer)
pub struct Lexer<'a> {
    iter: Peekable<Chars<'a>>,
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.scan() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => self
                .iter
                .peek()
                .map(|c| Err(Error::Parse(format!("[Lexer] Unexpected character {}", c)))),
            Err(err) => Some(Err(err)),
        }
    }
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given SQL text
    pub fn new(sql_text: &'a str) -> Self {
        Self {
            iter: sql_text.chars().peekable(),
        }
    }

    /// Consumes the next character if it satisfies the predicate
    fn next_if<F: Fn(char) -> bool>(&mut self, predicate: F) -> Option<char> {
        self.iter.peek().filter(|&c| predicate(*c))?;
        self.iter.next()
    }

    /// Consumes consecutive characters while they satisfy the predicate
    fn next_while<F: Fn(char) -> bool>(&mut self, predicate: F) -> Option<String> {
        let mut value = String::new();
        while let Some(c) = self.next_if(&predicate) {
            value.push(c);
        }
        Some(value).filter(|v| !v.is_empty())
    }

    /// Removes whitespace from the input stream
    fn erase_whitespace(&mut self) {
        self.next_while(|c| c.is_whitespace());
    }

    /// Scans and returns the next token
    fn scan(&mut self) -> Result<Option<Token>> {
        self.erase_whitespace();
        match self.iter.peek() {
            Some('\'') => self.scan_quoted('\'').map(|s| Some(Token::String(s))),
            Some('"') => self.scan_quoted('"').map(|s| Some(Token::Ident(s))),
            Some(c) if c.is_ascii_digit() => Ok(self.scan_number()),
            Some(c) if c.is_alphabetic() || *c == '_' => Ok(self.scan_ident()),
            Some('!') => {
                self.iter.next();
                match self.next_if(|c| c == '=') {
                    Some(_) => Ok(Some(Token::NotEqual)),
                    None => Err(Error::Parse("[Lexer] Unexpected character !".into())),
                }
            }
            Some(_) => Ok(self.scan_symbol()),
            None => Ok(None),
        }
    }

    /// Scans text enclosed in `quote`; a doubled quote is an escaped quote
    fn scan_quoted(&mut self, quote: char) -> Result<String> {
        self.iter.next();
        let mut val = String::new();

        loop {
            match self.iter.next() {
                Some(c) if c == quote => {
                    if self.next_if(|c| c == quote).is_some() {
                        val.push(quote);
                    } else {
                        break;
                    }
                }
                Some(c) => val.push(c),
                None => return Err(Error::Parse("[Lexer] Unexpected end of string".into())),
            }
        }
        Ok(val)
    }

    /// Scans a numeric literal (integer or floating-point)
    fn scan_number(&mut self) -> Option<Token> {
        let mut val = self.next_while(|c| c.is_ascii_digit())?;
        if let Some(sep) = self.next_if(|c| c == '.') {
            val.push(sep);
            while let Some(c) = self.next_if(|c| c.is_ascii_digit()) {
                val.push(c);
            }
        }
        if let Some(exp) = self.next_if(|c| c == 'e' || c == 'E') {
            val.push(exp);
            if let Some(sign) = self.next_if(|c| c == '+' || c == '-') {
                val.push(sign);
            }
            while let Some(c) = self.next_if(|c| c.is_ascii_digit()) {
                val.push(c);
            }
        }
        Some(Token::Number(val))
    }

    /// Scans an identifier or keyword
    fn scan_ident(&mut self) -> Option<Token> {
        let mut val = self.next_if(|c| c.is_alphabetic() || c == '_')?.to_string();
        while let Some(c) = self.next_if(|c| c.is_alphanumeric() || c == '_') {
            val.push(c);
        }
        // Returns Keyword if matched, otherwise returns as a regular Ident
        Some(Keyword::from_str(&val).map_or(Token::Ident(val), Token::Keyword))
    }

    /// Scans a one- or two-character symbol token
    fn scan_symbol(&mut self) -> Option<Token> {
        let token = match self.iter.peek()? {
            '*' => Token::Asterisk,
            '(' => Token::OpenParen,
            ')' => Token::CloseParen,
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            '.' => Token::Period,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '=' => Token::Equal,
            '<' => {
                self.iter.next();
                return Some(match self.next_if(|c| c == '=' || c == '>') {
                    Some('=') => Token::LessThanOrEqual,
                    Some(_) => Token::NotEqual,
                    None => Token::LessThan,
                });
            }
            '>' => {
                self.iter.next();
                return Some(match self.next_if(|c| c == '=') {
                    Some(_) => Token::GreaterThanOrEqual,
                    None => Token::GreaterThan,
                });
            }
            _ => return None,
        };
        self.iter.next();
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::Lexer;
    use crate::{
        error::Result,
        sql::parser::lexer::{Keyword, Token},
    };

    #[test]
    fn test_lexer_select() -> Result<()> {
        let tokens = Lexer::new("select * from tbl;")
            .peekable()
            .collect::<Result<Vec<_>>>()?;

        assert_eq!(
            tokens,
            vec![
                Token::Keyword(Keyword::Select),
                Token::Asterisk,
                Token::Keyword(Keyword::From),
                Token::Ident("tbl".to_string()),
                Token::Semicolon,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_lexer_predicate() -> Result<()> {
        let tokens = Lexer::new("o.amount <= -4.5e1 AND name <> 'it''s' or \"Mixed Case\" != 1")
            .collect::<Result<Vec<_>>>()?;

        assert_eq!(
            tokens,
            vec![
                Token::Ident("o".to_string()),
                Token::Period,
                Token::Ident("amount".to_string()),
                Token::LessThanOrEqual,
                Token::Minus,
                Token::Number("4.5e1".to_string()),
                Token::Keyword(Keyword::And),
                Token::Ident("name".to_string()),
                Token::NotEqual,
                Token::String("it's".to_string()),
                Token::Keyword(Keyword::Or),
                Token::Ident("Mixed Case".to_string()),
                Token::NotEqual,
                Token::Number("1".to_string()),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_lexer_errors() {
        assert!(Lexer::new("'unterminated").collect::<Result<Vec<_>>>().is_err());
        assert!(Lexer::new("a ! b").collect::<Result<Vec<_>>>().is_err());
        assert!(Lexer::new("a # b").collect::<Result<Vec<_>>>().is_err());
    }
}
