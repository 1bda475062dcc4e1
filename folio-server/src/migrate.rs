//! Schema migrations: a small SQL tokenizer that splits a script into
//! statements, and a runner that executes them in order.

use thiserror::Error;
use tracing::{debug, info};

use crate::db::Database;

/// Schema applied by the server at startup.
pub const SCHEMA: &str = include_str!("../migrations/schema.sql");

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("statement {index} failed ({preview}): {source}")]
    Statement {
        index: usize,
        preview: String,
        #[source]
        source: sqlx::Error,
    },
}

#[derive(Default)]
struct StatementState {
    first_word: Option<String>,
    in_trigger: bool,
    /// Open BEGIN/CASE blocks inside a trigger body
    depth: usize,
}

impl StatementState {
    fn word(&mut self, word: &str) {
        let upper = word.to_ascii_uppercase();
        if self.first_word.is_none() {
            self.first_word = Some(upper);
            return;
        }
        if upper == "TRIGGER" && self.first_word.as_deref() == Some("CREATE") {
            self.in_trigger = true;
            return;
        }
        if !self.in_trigger {
            return;
        }
        match upper.as_str() {
            "BEGIN" => self.depth += 1,
            "CASE" if self.depth > 0 => self.depth += 1,
            "END" if self.depth > 0 => self.depth -= 1,
            _ => {}
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Splits a SQL script into trimmed statements.
///
/// Semicolons only terminate a statement at top level: quoted strings and
/// identifiers, comments and `CREATE TRIGGER ... BEGIN ... END` bodies are
/// kept intact. Comments are dropped and empty statements discarded.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut word = String::new();
    let mut state = StatementState::default();
    let mut chars = sql.chars().peekable();

    fn flush_word(word: &mut String, state: &mut StatementState) {
        if !word.is_empty() {
            state.word(word);
            word.clear();
        }
    }

    fn finish(current: &mut String, state: &mut StatementState, out: &mut Vec<String>) {
        let trimmed = current.trim();
        if !trimmed.is_empty() {
            out.push(trimmed.to_string());
        }
        current.clear();
        *state = StatementState::default();
    }

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' | '[' => {
                flush_word(&mut word, &mut state);
                let close = if c == '[' { ']' } else { c };
                current.push(c);
                while let Some(q) = chars.next() {
                    current.push(q);
                    if q == close {
                        // doubled quote is an escaped quote
                        if close != ']' && chars.peek() == Some(&close) {
                            if let Some(escaped) = chars.next() {
                                current.push(escaped);
                            }
                            continue;
                        }
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                flush_word(&mut word, &mut state);
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        break;
                    }
                }
                current.push('\n');
            }
            '/' if chars.peek() == Some(&'*') => {
                flush_word(&mut word, &mut state);
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
                current.push(' ');
            }
            ';' => {
                flush_word(&mut word, &mut state);
                if state.depth > 0 {
                    current.push(';');
                } else {
                    finish(&mut current, &mut state, &mut statements);
                }
            }
            c if is_word_char(c) => {
                word.push(c);
                current.push(c);
            }
            c => {
                flush_word(&mut word, &mut state);
                current.push(c);
            }
        }
    }
    flush_word(&mut word, &mut state);
    finish(&mut current, &mut state, &mut statements);

    statements
}

fn preview(statement: &str) -> String {
    let flat: String = statement.split_whitespace().collect::<Vec<_>>().join(" ");
    flat.chars().take(60).collect()
}

/// Runs every statement of `script` in order, stopping at the first failure.
/// Returns the number of statements executed.
pub async fn run_migrations(db: &Database, script: &str) -> Result<usize, MigrationError> {
    let statements = split_statements(script);
    for (index, statement) in statements.iter().enumerate() {
        debug!(index, statement = %preview(statement), "applying");
        db.run(statement, &[])
            .await
            .map_err(|source| MigrationError::Statement {
                index,
                preview: preview(statement),
                source,
            })?;
    }
    info!(count = statements.len(), "migrations applied");
    Ok(statements.len())
}

/// Applies the embedded schema. Idempotent.
pub async fn apply_schema(db: &Database) -> Result<usize, MigrationError> {
    run_migrations(db, SCHEMA).await
}
