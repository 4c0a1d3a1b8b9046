//! SQL Policy Validator
//!
//! Screens model-generated SQL before it reaches the database. Only a
//! single, side-effect-free `SELECT` is allowed through.
//!
//! This is a denylist, not a parser. Obfuscated input (string
//! concatenation, encoded literals, `--` or `;` inside string literals)
//! can get past it or be rejected spuriously. The executor's read-only
//! transaction is the second line of defence.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::fmt;

lazy_static! {
    /// `--` runs to end of line or, with no newline after it, to end of
    /// text. `/* */` is non-greedy.
    static ref COMMENTS: Regex = Regex::new(r"(?s)--[^\n]*|/\*.*?\*/").unwrap();

    static ref DENYLIST: Vec<(&'static str, Regex)> = [
        ("insert", r"\binsert\b"),
        ("update", r"\bupdate\b"),
        ("delete", r"\bdelete\b"),
        ("drop", r"\bdrop\b"),
        ("truncate", r"\btruncate\b"),
        ("create", r"\bcreate\b"),
        ("alter", r"\balter\b"),
        ("grant", r"\bgrant\b"),
        ("revoke", r"\brevoke\b"),
        ("execute", r"\bexec(ute)?\b"),
        ("union", r"\bunion\b"),
        ("information_schema", r"\binformation_schema\b"),
        ("pg_", r"\bpg_\w*"),
        ("current_user", r"\bcurrent_user\b"),
        ("session_user", r"\bsession_user\b"),
        ("into", r#"\binto\s+(?:"|\w)"#),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(&format!("(?i){}", pattern)).unwrap()))
    .collect();
}

/// The first rule a statement failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PolicyRejection {
    /// Statement does not start with `select`.
    NotSelect,
    /// Nothing left after comments and separators were removed.
    Empty,
    /// More than one `;`-separated statement.
    MultipleStatements(usize),
    /// Matched a denylisted pattern.
    Forbidden(&'static str),
}

impl fmt::Display for PolicyRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyRejection::NotSelect => write!(f, "statement is not a SELECT"),
            PolicyRejection::Empty => write!(f, "statement is empty"),
            PolicyRejection::MultipleStatements(n) => {
                write!(f, "expected a single statement, found {}", n)
            }
            PolicyRejection::Forbidden(pattern) => {
                write!(f, "forbidden pattern '{}'", pattern)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Accepted,
    Rejected(PolicyRejection),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    pub fn rejection(&self) -> Option<&PolicyRejection> {
        match self {
            Verdict::Accepted => None,
            Verdict::Rejected(reason) => Some(reason),
        }
    }
}

/// Validate a statement returned by the translation gateway.
///
/// Pure and deterministic: the same input always yields the same verdict.
pub fn validate(statement: &str) -> Verdict {
    let lowered = statement.trim().to_lowercase();
    if !lowered.starts_with("select") {
        return Verdict::Rejected(PolicyRejection::NotSelect);
    }

    let stripped = strip_comments(&lowered);
    let fragments: Vec<&str> = stripped
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let fragment = match fragments.as_slice() {
        [] => return Verdict::Rejected(PolicyRejection::Empty),
        [single] => *single,
        many => return Verdict::Rejected(PolicyRejection::MultipleStatements(many.len())),
    };

    if !fragment.starts_with("select") {
        return Verdict::Rejected(PolicyRejection::NotSelect);
    }

    if let Some((name, _)) = DENYLIST.iter().find(|(_, re)| re.is_match(fragment)) {
        return Verdict::Rejected(PolicyRejection::Forbidden(name));
    }

    Verdict::Accepted
}

/// Remove SQL comments, leaving a space where each one was so that
/// `drop/**/table` cannot collapse into a single token.
pub fn strip_comments(sql: &str) -> String {
    COMMENTS.replace_all(sql, " ").into_owned()
}
