//! Plan and Result Rendering
//!
//! Text and JSON renderings for the two things radctl prints: a planned
//! statement program (`--sql`) and execution results. Renderers are pure
//! string builders; callers write the returned text verbatim.
//!
//! # Output Contract
//! - Plan text: numbered `-- i/n: title` blocks, the statement SQL, and a
//!   `-- params: [...]` line for statements that bind parameters.
//! - Plan JSON: `{"statements": [{"title": ..., "sql": ..., "params": [...]}]}`.
//! - Results text: `title: rowcount=N` for statements without a result set,
//!   row listings for queries. A lone single-column multi-row result prints
//!   as a bare list without its title.
//! - Results JSON: `{"results": [{"title": ..., "rowcount": ..., "rows": ...}]}`
//!   where `rows` is present only for statements that returned a result set.
//!
//! Sensitive parameters render as `"***"` unless the caller reveals them.
//! Execution results are never redacted; plans are the only place secrets
//! could otherwise leak into terminals or shell history.

use serde_json::Value;

use crate::exec::ExecResult;
use crate::statement::Statement;

/// Render a plan as numbered SQL blocks suitable for piping into `psql`
///
/// Statement SQL is trimmed of trailing whitespace, blocks are separated by
/// a blank line, and the output ends in exactly one newline.
pub fn render_plan_text(plan: &[Statement], reveal_secrets: bool) -> String {
    let total = plan.len();
    let mut lines: Vec<String> = Vec::new();
    for (index, statement) in plan.iter().enumerate() {
        lines.push(format!("-- {}/{}: {}", index + 1, total, statement.title()));
        lines.push(statement.sql().trim_end().to_string());
        if !statement.params().is_empty() {
            let params = Value::Array(statement.display_params(reveal_secrets));
            lines.push(format!("-- params: {params}"));
        }
        lines.push(String::new());
    }
    format!("{}\n", lines.join("\n").trim_end())
}

/// Render a plan as a pretty-printed `{"statements": [...]}` document
pub fn render_plan_json(plan: &[Statement], reveal_secrets: bool) -> String {
    let statements: Vec<Value> = plan
        .iter()
        .map(|statement| statement.as_json(reveal_secrets))
        .collect();
    let payload = serde_json::json!({ "statements": statements });
    format!("{payload:#}\n")
}

/// Render execution results as a pretty-printed `{"results": [...]}` document
pub fn render_results_json(results: &[ExecResult]) -> String {
    let payload = serde_json::json!({ "results": results });
    format!("{payload:#}\n")
}

/// Render execution results as terminal text
///
/// Statements without a result set print `title: rowcount=N`. Statements
/// with rows print the title followed by one line per row, columns joined
/// by tabs with NULL as the empty string. A single result consisting of
/// more than one single-column row is a plain listing (`show users`) and
/// prints without the title line.
pub fn render_results_text(results: &[ExecResult]) -> String {
    let multi = results.len() > 1;
    let mut out = String::new();
    for result in results {
        let Some(rows) = &result.rows else {
            out.push_str(&format!("{}: rowcount={}\n", result.title, result.rowcount));
            continue;
        };
        let simple_list = !multi && rows.len() > 1 && rows.iter().all(|row| row.len() == 1);
        if multi || !simple_list {
            out.push_str(&result.title);
            out.push('\n');
        }
        for row in rows {
            let cells: Vec<String> = row.iter().map(display_value).collect();
            out.push_str(&cells.join("\t"));
            out.push('\n');
        }
    }
    out
}

/// Render `find user` results as a per-user summary
///
/// One block per matched user: the username, whether a password credential
/// exists, the comma-joined group list, and the block status. Blocks show
/// their reason, expiry timestamp (`permanent` when unbounded), and the
/// remaining seconds. User blocks are separated by blank lines.
pub fn render_find_users_text(results: &[ExecResult]) -> String {
    let rows = results
        .first()
        .and_then(|result| result.rows.as_deref())
        .unwrap_or_default();
    if rows.is_empty() {
        return "No users found.\n".to_string();
    }

    let mut out = String::new();
    for (index, row) in rows.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        out.push_str(str_cell(row, 0).unwrap_or_default());
        out.push('\n');

        let password_set = if bool_cell(row, 1) { "yes" } else { "no" };
        out.push_str(&format!("  password_set: {password_set}\n"));

        let groups = str_cell(row, 2).unwrap_or_default().trim();
        let groups = if groups.is_empty() { "-" } else { groups };
        out.push_str(&format!("  groups: {groups}\n"));

        // Row layout: reason is NULL exactly when no active block exists.
        if is_null(row, 3) {
            out.push_str("  block: -\n");
            continue;
        }
        let reason = str_cell(row, 3).unwrap_or_default();
        let expires_at = match str_cell(row, 5) {
            Some(timestamp) => timestamp.to_string(),
            None => "permanent".to_string(),
        };
        let expires_in = match int_cell(row, 6) {
            Some(seconds) => format!("{seconds}s"),
            None => "-".to_string(),
        };
        out.push_str(&format!(
            "  block: reason={reason} expires_at={expires_at} expires_in={expires_in}\n"
        ));
    }
    out
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn str_cell(row: &[Value], index: usize) -> Option<&str> {
    row.get(index).and_then(Value::as_str)
}

fn bool_cell(row: &[Value], index: usize) -> bool {
    row.get(index).and_then(Value::as_bool).unwrap_or(false)
}

fn int_cell(row: &[Value], index: usize) -> Option<i64> {
    row.get(index).and_then(Value::as_i64)
}

fn is_null(row: &[Value], index: usize) -> bool {
    row.get(index).map_or(true, Value::is_null)
}
