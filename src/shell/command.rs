//! Command classifier for the interactive shell
//!
//! Lines starting with `.` are meta-commands; everything else is SQL for the engine.

/// Parsed input line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Blank input
    Nothing,
    ListTables,
    Schema(String),
    Refresh,
    Update {
        table: String,
        clause: String,
        predicate: String,
    },
    Delete {
        table: String,
        predicate: String,
    },
    Empty(String),
    Drop {
        table: String,
        confirmed: bool,
    },
    Help,
    Exit,
    /// A meta-command with the wrong arguments; carries the usage text
    Usage(&'static str),
    /// Passed through to the SQL engine
    RawSql(String),
}

pub const SCHEMA_USAGE: &str = "Usage: .schema <table_name>";
pub const UPDATE_USAGE: &str = "Usage: .update <table> <set_clause> <where_clause>\n\
                                Example: .update speakers name='John' id=1";
pub const DELETE_USAGE: &str = "Usage: .delete <table> <where_clause>";
pub const EMPTY_USAGE: &str = "Usage: .empty <table>";
pub const DROP_USAGE: &str = "Usage: .drop <table> [--confirm]";

/// Meta-commands offered by completion and help
pub const META_COMMANDS: &[&str] = &[
    ".tables", ".schema", ".refresh", ".update", ".delete", ".empty", ".drop", ".help", ".exit",
];

/// Command parser
pub struct CommandParser;

impl CommandParser {
    pub fn new() -> Self {
        Self
    }

    /// Classifies one input line. Never fails: malformed meta-commands
    /// become [`Command::Usage`].
    pub fn parse(&self, line: &str) -> Command {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Command::Nothing;
        }
        if trimmed.starts_with('.') {
            if let Some(command) = self.parse_meta_command(trimmed) {
                return command;
            }
        }
        Command::RawSql(trimmed.to_string())
    }

    /// Returns `None` for dot-words that are not meta-commands
    fn parse_meta_command(&self, line: &str) -> Option<Command> {
        let keyword = line
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_lowercase();

        let command = match keyword.as_str() {
            ".tables" => Command::ListTables,
            ".refresh" => Command::Refresh,
            ".help" => Command::Help,
            ".exit" | ".quit" => Command::Exit,
            ".schema" => match single_arg(line) {
                Some(table) => Command::Schema(table),
                None => Command::Usage(SCHEMA_USAGE),
            },
            ".empty" => match single_arg(line) {
                Some(table) => Command::Empty(table),
                None => Command::Usage(EMPTY_USAGE),
            },
            ".drop" => parse_drop(line),
            ".delete" => match split_args(line, 2).as_slice() {
                [_, table, predicate] => Command::Delete {
                    table: table.to_string(),
                    predicate: predicate.to_string(),
                },
                _ => Command::Usage(DELETE_USAGE),
            },
            ".update" => parse_update(line),
            _ => return None,
        };
        Some(command)
    }
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits off at most `max` leading whitespace-separated words; the
/// remainder is kept intact as the last part.
fn split_args(line: &str, max: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = line.trim();
    while !rest.is_empty() {
        if parts.len() == max {
            parts.push(rest);
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                parts.push(&rest[..end]);
                rest = rest[end..].trim_start();
            }
            None => {
                parts.push(rest);
                break;
            }
        }
    }
    parts
}

fn single_arg(line: &str) -> Option<String> {
    match split_args(line, 2).as_slice() {
        [_, arg] => Some(arg.to_string()),
        _ => None,
    }
}

fn parse_drop(line: &str) -> Command {
    match split_args(line, 3).as_slice() {
        [_, table] => Command::Drop {
            table: table.to_string(),
            confirmed: false,
        },
        [_, table, flag] if *flag == "--confirm" => Command::Drop {
            table: table.to_string(),
            confirmed: true,
        },
        _ => Command::Usage(DROP_USAGE),
    }
}

/// `.update <table> <set_clause> <where_clause>`
///
/// With a top-level `where` keyword the set clause runs up to it and may
/// contain spaces; otherwise the set clause is the next word.
fn parse_update(line: &str) -> Command {
    let [_, table, rest] = split_args(line, 2)[..] else {
        return Command::Usage(UPDATE_USAGE);
    };
    let (clause, predicate) = match find_where(rest) {
        Some(at) => (rest[..at].trim(), rest[at + 5..].trim()),
        None => match split_args(rest, 1)[..] {
            [clause, predicate] => (clause, predicate),
            _ => return Command::Usage(UPDATE_USAGE),
        },
    };
    if clause.is_empty() || predicate.is_empty() {
        return Command::Usage(UPDATE_USAGE);
    }
    Command::Update {
        table: table.to_string(),
        clause: clause.to_string(),
        predicate: predicate.to_string(),
    }
}

/// Byte offset of the first `where` word outside quotes
fn find_where(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut quote = None;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (None, '\'' | '"') => quote = Some(c),
            (Some(open), c) if open == c => quote = None,
            (None, 'w' | 'W') => {
                let starts_word = i == 0 || bytes[i - 1].is_ascii_whitespace();
                let ends_word = bytes.get(i + 5).is_none_or(|b| b.is_ascii_whitespace());
                let word = text.get(i..i + 5);
                if starts_word
                    && ends_word
                    && word.is_some_and(|w| w.eq_ignore_ascii_case("where"))
                {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sql() {
        let parser = CommandParser::new();
        assert_eq!(
            parser.parse("  SELECT * FROM users; "),
            Command::RawSql("SELECT * FROM users;".into())
        );
        assert_eq!(parser.parse("   "), Command::Nothing);
        // unknown dot-words go to the engine, which reports the error
        assert_eq!(parser.parse(".bogus"), Command::RawSql(".bogus".into()));
    }

    #[test]
    fn test_parse_meta_commands() {
        let parser = CommandParser::new();
        assert_eq!(parser.parse(".tables"), Command::ListTables);
        assert_eq!(parser.parse(".TABLES"), Command::ListTables);
        assert_eq!(parser.parse(".refresh"), Command::Refresh);
        assert_eq!(parser.parse(".exit"), Command::Exit);
        assert_eq!(parser.parse(".help"), Command::Help);
        assert_eq!(parser.parse(".schema orders"), Command::Schema("orders".into()));
        assert_eq!(parser.parse(".schema"), Command::Usage(SCHEMA_USAGE));
        assert_eq!(parser.parse(".Empty orders"), Command::Empty("orders".into()));
        assert_eq!(parser.parse(".empty"), Command::Usage(EMPTY_USAGE));
        assert_eq!(parser.parse(".empty a b"), Command::Usage(EMPTY_USAGE));
    }

    #[test]
    fn test_parse_drop() {
        let parser = CommandParser::new();
        assert_eq!(
            parser.parse(".drop orders"),
            Command::Drop {
                table: "orders".into(),
                confirmed: false
            }
        );
        assert_eq!(
            parser.parse(".drop orders --confirm"),
            Command::Drop {
                table: "orders".into(),
                confirmed: true
            }
        );
        assert_eq!(parser.parse(".drop orders --force"), Command::Usage(DROP_USAGE));
        assert_eq!(parser.parse(".drop"), Command::Usage(DROP_USAGE));
    }

    #[test]
    fn test_parse_delete() {
        let parser = CommandParser::new();
        assert_eq!(
            parser.parse(".delete orders where amount < 0"),
            Command::Delete {
                table: "orders".into(),
                predicate: "where amount < 0".into()
            }
        );
        assert_eq!(parser.parse(".delete orders"), Command::Usage(DELETE_USAGE));
    }

    #[test]
    fn test_parse_update() {
        let parser = CommandParser::new();
        assert_eq!(
            parser.parse(".update speakers name='John' id=1"),
            Command::Update {
                table: "speakers".into(),
                clause: "name='John'".into(),
                predicate: "id=1".into()
            }
        );
        assert_eq!(
            parser.parse(".update speakers name = 'John Smith', age=41 WHERE id = 1 or id = 2"),
            Command::Update {
                table: "speakers".into(),
                clause: "name = 'John Smith', age=41".into(),
                predicate: "id = 1 or id = 2".into()
            }
        );
        // a quoted "where" is part of the value
        assert_eq!(
            parser.parse(".update notes body='look where' where id = 3"),
            Command::Update {
                table: "notes".into(),
                clause: "body='look where'".into(),
                predicate: "id = 3".into()
            }
        );
        assert_eq!(parser.parse(".update speakers name='John'"), Command::Usage(UPDATE_USAGE));
        assert_eq!(parser.parse(".update speakers where id=1"), Command::Usage(UPDATE_USAGE));
        assert_eq!(parser.parse(".update"), Command::Usage(UPDATE_USAGE));
    }
}
