//! Statement Model
//!
//! One planned unit of SQL work: a human-readable title, SQL text with `$n`
//! placeholders, the ordered bound parameters, and the set of parameter
//! positions that must be redacted on display (passwords).
//!
//! Statements are produced by the planner and consumed once, either by the
//! executor or by a renderer. Fields are private; construction goes through
//! [`Statement::new`] so a statement is never mutated after planning.
//!
//! # Parameter rules
//! - All user-supplied *values* are bound via placeholders, never spliced
//!   into SQL text. Only validated table identifiers appear in the text.
//! - A `$n` placeholder may be referenced more than once in the SQL; the
//!   parameter list carries each value exactly once.
//! - SQL casts (`::text`, `::bigint`) pin the parameter types the server
//!   would otherwise have to infer.

use std::collections::BTreeSet;

use serde::Serialize;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};

/// Placeholder shown instead of a sensitive parameter value
pub const REDACTED: &str = "***";

/// A bound statement parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Param {
    /// Bound as TEXT
    Text(String),
    /// Bound as BIGINT
    Int(i64),
    /// Bound as SQL NULL
    Null,
}

impl Param {
    /// JSON rendering of the bound value (string / number / null)
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Text(v) => serde_json::Value::String(v.clone()),
            Self::Int(v) => serde_json::Value::Number((*v).into()),
            Self::Null => serde_json::Value::Null,
        }
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<Option<&str>> for Param {
    fn from(value: Option<&str>) -> Self {
        value.map_or(Self::Null, Self::from)
    }
}

impl From<Option<String>> for Param {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Null, Self::Text)
    }
}

impl ToSql for Param {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Self::Text(v) => v.to_sql(ty, out),
            Self::Int(v) => v.to_sql(ty, out),
            Self::Null => Ok(IsNull::Yes),
        }
    }

    fn accepts(ty: &Type) -> bool {
        // Union over the variants; statement SQL pins each placeholder's
        // type with an explicit cast, so a mismatched delegation cannot
        // occur in planned statements.
        matches!(
            *ty,
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::INT8
        )
    }

    to_sql_checked!();
}

/// One planned SQL operation
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    title: String,
    sql: String,
    params: Vec<Param>,
    sensitive: BTreeSet<usize>,
}

impl Statement {
    /// Create a statement with no sensitive parameters
    pub fn new(title: impl Into<String>, sql: impl Into<String>, params: Vec<Param>) -> Self {
        Self { title: title.into(), sql: sql.into(), params, sensitive: BTreeSet::new() }
    }

    /// Mark zero-based parameter positions as sensitive (redacted on display)
    #[must_use]
    pub fn with_sensitive(mut self, positions: impl IntoIterator<Item = usize>) -> Self {
        self.sensitive.extend(positions);
        self
    }

    /// Human-readable label, names the configured table it touches
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// SQL text with `$n` placeholders
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bound parameters, in placeholder order
    #[must_use]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Whether the parameter at `position` is marked sensitive
    #[must_use]
    pub fn is_sensitive(&self, position: usize) -> bool {
        self.sensitive.contains(&position)
    }

    /// Parameters as the driver's trait objects, for binding
    #[must_use]
    pub fn sql_params(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
    }

    /// Parameter values for display, sensitive positions replaced by `***`
    /// unless `reveal_secrets` is set
    #[must_use]
    pub fn display_params(&self, reveal_secrets: bool) -> Vec<serde_json::Value> {
        self.params
            .iter()
            .enumerate()
            .map(|(position, param)| {
                if !reveal_secrets && self.sensitive.contains(&position) {
                    serde_json::Value::String(REDACTED.to_string())
                } else {
                    param.to_json()
                }
            })
            .collect()
    }

    /// JSON record of the statement, parameters redacted per `reveal_secrets`
    #[must_use]
    pub fn as_json(&self, reveal_secrets: bool) -> serde_json::Value {
        serde_json::json!({
            "title": self.title,
            "sql": self.sql,
            "params": self.display_params(reveal_secrets),
        })
    }
}

/// An ordered sequence of statements implementing one administrative intent
pub type Plan = Vec<Statement>;
