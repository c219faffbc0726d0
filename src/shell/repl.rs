//! Readline loop driving a [`Session`].

use std::{borrow::Cow, path::PathBuf};

use colored::Colorize;
use rustyline::{
    CompletionType, Config as EditorConfig, Context, Editor, Helper,
    completion::{Completer, Pair},
    error::ReadlineError,
    highlight::Highlighter,
    hint::Hinter,
    history::FileHistory,
    validate::Validator,
};

use crate::{
    config::ShellConfig,
    error::{Error, Result},
    shell::{command::META_COMMANDS, mutation::Confirm, render::Renderer, session::Session},
    sql::engine::SqlEngine,
    store::TableStore,
};

pub const SQL_KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "LIMIT", "OFFSET", "ORDER BY", "GROUP BY", "HAVING", "JOIN",
    "LEFT JOIN", "INNER JOIN", "CROSS JOIN", "ON", "AS", "AND", "OR", "NOT", "IN", "IS", "NULL",
    "LIKE", "BETWEEN", "DISTINCT", "ASC", "DESC", "COUNT", "SUM", "AVG", "MIN", "MAX",
];

/// Tab completion over SQL keywords, meta-commands and table names
#[derive(Debug, Default)]
pub struct ShellHelper {
    tables: Vec<String>,
}

impl ShellHelper {
    pub fn set_tables(&mut self, tables: Vec<String>) {
        self.tables = tables;
    }

    /// Everything that starts with `word`, case-insensitively
    pub fn candidates(&self, word: &str) -> Vec<String> {
        let word = word.to_lowercase();
        let keywords = SQL_KEYWORDS.iter().chain(META_COMMANDS).map(|s| s.to_string());
        keywords
            .chain(self.tables.iter().cloned())
            .filter(|c| c.to_lowercase().starts_with(&word))
            .collect()
    }

    fn word_start(line: &str, pos: usize) -> usize {
        line[..pos]
            .rfind(|c: char| c.is_whitespace() || c == '(' || c == ',')
            .map(|i| i + 1)
            .unwrap_or(0)
    }
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = Self::word_start(line, pos);
        let pairs = self
            .candidates(&line[start..pos])
            .into_iter()
            .map(|c| Pair {
                display: c.clone(),
                replacement: c,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        if pos < line.len() {
            return None;
        }
        let start = Self::word_start(line, pos);
        let word = &line[start..pos];
        if word.is_empty() {
            return None;
        }
        self.candidates(word)
            .into_iter()
            .find(|c| c.len() > word.len())
            .and_then(|c| c.get(word.len()..).map(str::to_string))
    }
}

impl Highlighter for ShellHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(hint.dimmed().to_string())
    }
}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}

/// Asks for confirmation on the same line editor as the prompt
struct EditorConfirm<'a>(&'a mut Editor<ShellHelper, FileHistory>);

impl Confirm for EditorConfirm<'_> {
    fn ask(&mut self, warning: &str, question: &str) -> Result<String> {
        println!("{}", warning.yellow());
        match self.0.readline(question) {
            Ok(answer) => Ok(answer),
            Err(ReadlineError::Eof) => Ok(String::new()),
            Err(err) => Err(err.into()),
        }
    }
}

pub struct Repl<S: TableStore, G: SqlEngine> {
    session: Session<S, G>,
    editor: Editor<ShellHelper, FileHistory>,
    renderer: Renderer,
    prompt: String,
    history: Option<PathBuf>,
}

impl<S: TableStore, G: SqlEngine> Repl<S, G> {
    pub fn new(session: Session<S, G>, renderer: Renderer, config: &ShellConfig) -> Result<Self> {
        let editor_config = EditorConfig::builder()
            .completion_type(CompletionType::List)
            .auto_add_history(false)
            .max_history_size(config.history_size)?
            .build();
        let mut editor: Editor<ShellHelper, FileHistory> = Editor::with_config(editor_config)?;
        editor.set_helper(Some(ShellHelper::default()));

        let history = config.history_path();
        if let Some(path) = &history {
            if let Err(err) = editor.load_history(path) {
                tracing::debug!(path = %path.display(), error = %err, "no history loaded");
            }
        }

        Ok(Self {
            session,
            editor,
            renderer,
            prompt: config.prompt.clone(),
            history,
        })
    }

    /// Reads and handles lines until `.exit`, end-of-input or Ctrl-C at the prompt
    pub fn run(&mut self, target: &str) -> Result<()> {
        println!("{}\n", self.renderer.banner(target));
        while self.session.is_running() {
            let tables = self.session.table_names();
            if let Some(helper) = self.editor.helper_mut() {
                helper.set_tables(tables);
            }

            match self.editor.readline(&self.prompt) {
                Ok(line) => {
                    self.remember(&line);
                    let mut confirm = EditorConfirm(&mut self.editor);
                    let output = match self.session.handle_line(&line, &mut confirm) {
                        Ok(reply) => self.renderer.reply(&reply),
                        Err(err) => self.renderer.error(&err),
                    };
                    if !output.is_empty() {
                        println!("{}", output);
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("\n{}", self.renderer.error(&Error::Interrupted));
                    self.session.terminate();
                }
                Err(ReadlineError::Eof) => {
                    println!("\n{}", "Goodbye!".yellow());
                    self.session.terminate();
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    fn remember(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        if let Err(err) = self.editor.add_history_entry(line) {
            tracing::debug!(error = %err, "history entry not added");
            return;
        }
        if let Some(path) = &self.history {
            if let Err(err) = self.editor.append_history(path) {
                tracing::warn!(path = %path.display(), error = %err, "could not save history");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ShellHelper;

    #[test]
    fn test_candidates() {
        let mut helper = ShellHelper::default();
        helper.set_tables(vec!["orders".into(), "Speakers".into()]);

        assert!(helper.candidates("sel").contains(&"SELECT".to_string()));
        assert_eq!(helper.candidates(".dr"), vec![".drop"]);
        assert_eq!(helper.candidates("spe"), vec!["Speakers"]);
        assert_eq!(helper.candidates("or"), vec!["ORDER BY", "OR", "orders"]);
        assert!(helper.candidates("zzz").is_empty());
    }

    #[test]
    fn test_word_start() {
        assert_eq!(ShellHelper::word_start("select * from ord", 17), 14);
        assert_eq!(ShellHelper::word_start("count(sp", 8), 6);
        assert_eq!(ShellHelper::word_start(".tab", 4), 0);
    }
}
