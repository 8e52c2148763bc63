//! Statement Planner
//!
//! The core of radctl: one pure function per administrative intent,
//! translating (schema configuration, intent parameters) into an ordered
//! [`Plan`] of SQL statements. No I/O, no side effects; identical inputs
//! produce identical plans.
//!
//! # Invariants
//! - Only validated table identifiers are spliced into SQL text; every
//!   user-supplied value is bound as a `$n` parameter.
//! - Mutating statements are idempotent: upserts write only when the stored
//!   value actually differs (`IS DISTINCT FROM`), creates use
//!   `IF NOT EXISTS`, and re-running a plan never fails or duplicates rows.
//! - Orphan safety: no plan ever leaves a previously grouped user with zero
//!   group memberships. Deleting a group or removing a user's last
//!   membership reassigns the user to a fallback group in the same
//!   statement.
//!
//! # CTE snapshot rule
//! All sub-statements of a `WITH` chain read the same pre-statement
//! snapshot; a later CTE cannot observe an earlier CTE's delete by
//! re-reading the table. Orphanhood is therefore phrased against the
//! snapshot as "has no membership row in any *other* group", and duplicate
//! guards consult the surviving snapshot rows.

use crate::duration::parse_duration;
use crate::error::{RadctlError, Result};
use crate::ident::validate_identifier;
use crate::statement::{Param, Plan, Statement};

/// Table names and default-group settings the planner builds SQL against
///
/// Constructed once at startup by the configuration layer, validated
/// eagerly, then immutable for the process lifetime. The planner never
/// knows where the values came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaConfig {
    /// Credential table (FreeRADIUS `radcheck`)
    pub radcheck_table: String,
    /// Group-membership table (FreeRADIUS `radusergroup`)
    pub radusergroup_table: String,
    /// Block-list table, created by `migrate`
    pub blocklist_table: String,
    /// Group-definition table, created by `migrate`
    pub groups_table: String,
    /// Group users fall back into when they would otherwise be orphaned
    pub default_group_name: String,
    /// Priority used for fallback memberships
    pub default_group_priority: i64,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            radcheck_table: "radcheck".to_string(),
            radusergroup_table: "radusergroup".to_string(),
            blocklist_table: "vpn_user_blocklist".to_string(),
            groups_table: "vpn_groups".to_string(),
            default_group_name: "default".to_string(),
            default_group_priority: 0,
        }
    }
}

impl SchemaConfig {
    /// Check every configured value before any SQL is built
    ///
    /// Table names must be safe SQL identifiers; the default group must be
    /// non-empty and its priority non-negative. Violations are fatal at
    /// startup.
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.radcheck_table, "radcheck_table")?;
        validate_identifier(&self.radusergroup_table, "radusergroup_table")?;
        validate_identifier(&self.blocklist_table, "blocklist_table")?;
        validate_identifier(&self.groups_table, "groups_table")?;
        if self.default_group_name.trim().is_empty() {
            return Err(RadctlError::invalid_identifier(
                "default_group_name must not be empty",
            ));
        }
        if self.default_group_priority < 0 {
            return Err(RadctlError::invalid_identifier(format!(
                "default_group_priority must be >= 0, got {}",
                self.default_group_priority
            )));
        }
        Ok(())
    }
}

/// One administrative intent, as resolved by the presentation layer
///
/// Closed set: `build_plan` matches it exhaustively, so adding or removing
/// an intent is a compile-time-checked change. Interactive concerns
/// (password prompts, reassignment confirmation) are resolved before an
/// intent is constructed; the planner never prompts.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Create the group-definition and block-list tables if missing
    Migrate,
    /// Create a user credential (or reset its password) and ensure a group
    CreateUser { username: String, password: String },
    /// Change a user's password
    ChangeUser { username: String, password: String },
    /// Remove a user's block, memberships, and credentials
    DeleteUser { username: String },
    /// Create or update a group definition
    CreateGroup { name: String, description: Option<String> },
    /// Rename a group and/or update its description
    ChangeGroup { name: String, rename_to: Option<String>, description: Option<String> },
    /// Delete a group, reassigning orphaned members
    DeleteGroup { name: String, reassign_to: Option<String>, reassign_priority: Option<i64> },
    /// Add a user to a group (or update the membership priority)
    AddMembership { username: String, groupname: String, priority: i64 },
    /// Remove a user from a group, falling back if it was their last one
    RemoveMembership {
        username: String,
        groupname: String,
        fallback_group: Option<String>,
        fallback_priority: Option<i64>,
    },
    /// Block a user, optionally for a relative duration ("2h", "30")
    BlockUser { username: String, reason: Option<String>, duration: Option<String> },
    /// Remove a user's block
    UnblockUser { username: String },
    /// List every known username
    ShowUsers,
    /// List every known group name
    ShowGroups,
    /// List blocks, expired ones included only on request
    ShowBlocks { include_expired: bool },
    /// Case-insensitive user search; `pattern` is a SQL LIKE pattern
    FindUser { pattern: String },
    /// Group summary plus member list
    FindGroup { name: String },
}

/// Translate an intent into its ordered statement plan
pub fn build_plan(schema: &SchemaConfig, intent: &Intent) -> Result<Plan> {
    match intent {
        Intent::Migrate => Ok(migrate(schema)),
        Intent::CreateUser { username, password }
        | Intent::ChangeUser { username, password } => Ok(upsert_user(schema, username, password)),
        Intent::DeleteUser { username } => Ok(delete_user(schema, username)),
        Intent::CreateGroup { name, description } => {
            Ok(create_group(schema, name, description.as_deref()))
        }
        Intent::ChangeGroup { name, rename_to, description } => {
            change_group(schema, name, rename_to.as_deref(), description.as_deref())
        }
        Intent::DeleteGroup { name, reassign_to, reassign_priority } => {
            delete_group(schema, name, reassign_to.as_deref(), *reassign_priority)
        }
        Intent::AddMembership { username, groupname, priority } => {
            Ok(add_membership(schema, username, groupname, *priority))
        }
        Intent::RemoveMembership { username, groupname, fallback_group, fallback_priority } => {
            remove_membership(schema, username, groupname, fallback_group.as_deref(), *fallback_priority)
        }
        Intent::BlockUser { username, reason, duration } => {
            block_user(schema, username, reason.as_deref(), duration.as_deref())
        }
        Intent::UnblockUser { username } => Ok(unblock_user(schema, username)),
        Intent::ShowUsers => Ok(show_users(schema)),
        Intent::ShowGroups => Ok(show_groups(schema)),
        Intent::ShowBlocks { include_expired } => Ok(show_blocks(schema, *include_expired)),
        Intent::FindUser { pattern } => Ok(find_user(schema, pattern)),
        Intent::FindGroup { name } => Ok(find_group(schema, name)),
    }
}

/// Read-only impact report for a group deletion: how many distinct members
/// the group has and how many of those would be left with no other group
///
/// Run by the presentation layer before the destructive plan so the caller
/// can confirm or redirect the reassignment target.
pub fn preview_delete_group(schema: &SchemaConfig, groupname: &str) -> Plan {
    let sql = format!(
        "\
WITH members AS (
  SELECT DISTINCT username
    FROM {rug}
   WHERE groupname = $1::text
),
counts AS (
  SELECT m.username, COUNT(DISTINCT ug.groupname) AS groups_total
    FROM members m
    JOIN {rug} ug
      ON ug.username = m.username
   GROUP BY m.username
)
SELECT
  (SELECT COUNT(*) FROM members) AS members_total,
  (SELECT COUNT(*) FROM counts WHERE groups_total <= 1) AS would_be_orphans;",
        rug = schema.radusergroup_table
    );
    vec![Statement::new(
        "Delete group impact (members/orphans)",
        sql,
        vec![Param::from(groupname)],
    )]
}

/// Read-only preflight: does this username have a password credential row?
///
/// Run by the presentation layer before `add` so a membership is never
/// attached to a user that was not created.
pub fn user_exists(schema: &SchemaConfig, username: &str) -> Plan {
    let sql = format!(
        "\
SELECT 1
  FROM {radcheck}
 WHERE username = $1
   AND attribute = 'Cleartext-Password'
   AND op = ':='
 LIMIT 1;",
        radcheck = schema.radcheck_table
    );
    vec![Statement::new(
        format!("Preflight: user exists (password in {})", schema.radcheck_table),
        sql,
        vec![Param::from(username)],
    )]
}

fn migrate(schema: &SchemaConfig) -> Plan {
    vec![
        Statement::new(
            format!("Create {} table", schema.groups_table),
            format!(
                "\
CREATE TABLE IF NOT EXISTS {groups} (
  name TEXT PRIMARY KEY,
  description TEXT,
  created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);",
                groups = schema.groups_table
            ),
            vec![],
        ),
        Statement::new(
            format!("Create {} table", schema.blocklist_table),
            format!(
                "\
CREATE TABLE IF NOT EXISTS {blocklist} (
  username TEXT PRIMARY KEY,
  reason TEXT,
  created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
  expires_at TIMESTAMPTZ
);",
                blocklist = schema.blocklist_table
            ),
            vec![],
        ),
        Statement::new(
            "Create blocklist expires index",
            format!(
                "CREATE INDEX IF NOT EXISTS idx_vpn_user_blocklist_expires ON {blocklist} (expires_at);",
                blocklist = schema.blocklist_table
            ),
            vec![],
        ),
    ]
}

/// Password upsert plus the guarantee that the user ends up in a group
///
/// The upsert writes only when the stored password differs, and inserts
/// only when no credential row exists, so re-running the plan is a no-op.
fn upsert_user(schema: &SchemaConfig, username: &str, password: &str) -> Plan {
    let upsert_sql = format!(
        "\
WITH desired AS (
  SELECT $1::text AS username, $2::text AS password
),
updated AS (
  UPDATE {radcheck}
     SET value = (SELECT password FROM desired)
   WHERE username = (SELECT username FROM desired)
     AND attribute = 'Cleartext-Password'
     AND op = ':='
     AND value IS DISTINCT FROM (SELECT password FROM desired)
  RETURNING 1
),
inserted AS (
  INSERT INTO {radcheck} (username, attribute, op, value)
  SELECT (SELECT username FROM desired), 'Cleartext-Password', ':=', (SELECT password FROM desired)
   WHERE NOT EXISTS (
     SELECT 1
       FROM {radcheck}
      WHERE username = (SELECT username FROM desired)
        AND attribute = 'Cleartext-Password'
        AND op = ':='
   )
  RETURNING 1
)
SELECT
  CASE
    WHEN EXISTS (SELECT 1 FROM updated) OR EXISTS (SELECT 1 FROM inserted) THEN 1
    ELSE 0
  END AS changed;",
        radcheck = schema.radcheck_table
    );

    let ensure_sql = format!(
        "\
INSERT INTO {rug} (username, groupname, priority)
SELECT $1::text, $2::text, $3::bigint
WHERE NOT EXISTS (
  SELECT 1
    FROM {rug}
   WHERE username = $1::text
);",
        rug = schema.radusergroup_table
    );

    vec![
        Statement::new(
            format!("Upsert user password ({})", schema.radcheck_table),
            upsert_sql,
            vec![Param::from(username), Param::from(password)],
        )
        .with_sensitive([1]),
        Statement::new(
            format!("Ensure user has at least one group ({})", schema.radusergroup_table),
            ensure_sql,
            vec![
                Param::from(username),
                Param::from(schema.default_group_name.as_str()),
                Param::from(schema.default_group_priority),
            ],
        ),
    ]
}

fn delete_user(schema: &SchemaConfig, username: &str) -> Plan {
    vec![
        Statement::new(
            format!("Unblock user ({})", schema.blocklist_table),
            format!("DELETE FROM {} WHERE username = $1;", schema.blocklist_table),
            vec![Param::from(username)],
        ),
        Statement::new(
            format!("Remove group memberships ({})", schema.radusergroup_table),
            format!("DELETE FROM {} WHERE username = $1;", schema.radusergroup_table),
            vec![Param::from(username)],
        ),
        Statement::new(
            format!("Remove user credentials ({})", schema.radcheck_table),
            format!("DELETE FROM {} WHERE username = $1;", schema.radcheck_table),
            vec![Param::from(username)],
        ),
    ]
}

fn create_group(schema: &SchemaConfig, name: &str, description: Option<&str>) -> Plan {
    let sql = format!(
        "\
INSERT INTO {groups} (name, description)
VALUES ($1, $2)
ON CONFLICT (name) DO UPDATE
  SET description = EXCLUDED.description;",
        groups = schema.groups_table
    );
    vec![Statement::new(
        format!("Create group ({})", schema.groups_table),
        sql,
        vec![Param::from(name), Param::from(description)],
    )]
}

fn change_group(
    schema: &SchemaConfig,
    name: &str,
    rename_to: Option<&str>,
    description: Option<&str>,
) -> Result<Plan> {
    if rename_to.is_none() && description.is_none() {
        return Err(RadctlError::invalid_intent(
            "change group: specify --rename or --description",
        ));
    }

    let mut plan = Plan::new();
    if let Some(new_name) = rename_to {
        plan.push(Statement::new(
            format!("Rename group memberships ({})", schema.radusergroup_table),
            format!(
                "UPDATE {} SET groupname = $1 WHERE groupname = $2;",
                schema.radusergroup_table
            ),
            vec![Param::from(new_name), Param::from(name)],
        ));
        plan.push(Statement::new(
            format!("Rename group ({})", schema.groups_table),
            format!("UPDATE {} SET name = $1 WHERE name = $2;", schema.groups_table),
            vec![Param::from(new_name), Param::from(name)],
        ));
    }

    if let Some(description) = description {
        // A rename in the same call moves the definition row first, so the
        // description update targets the new name.
        let target_name = rename_to.unwrap_or(name);
        plan.push(Statement::new(
            format!("Update group description ({})", schema.groups_table),
            format!("UPDATE {} SET description = $1 WHERE name = $2;", schema.groups_table),
            vec![Param::from(description), Param::from(target_name)],
        ));
    }

    Ok(plan)
}

/// Resolve the group orphans fall back into: explicit target if non-blank,
/// else the configured default group
fn resolve_fallback_group(schema: &SchemaConfig, explicit: Option<&str>, what: &str) -> Result<String> {
    let target = explicit
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| schema.default_group_name.trim());
    if target.is_empty() {
        return Err(RadctlError::invalid_intent(format!("{what}: fallback group is empty")));
    }
    Ok(target.to_string())
}

fn delete_group(
    schema: &SchemaConfig,
    name: &str,
    reassign_to: Option<&str>,
    reassign_priority: Option<i64>,
) -> Result<Plan> {
    let target_group = resolve_fallback_group(schema, reassign_to, "delete group")?;
    if target_group == name {
        return Err(RadctlError::invalid_intent(
            "delete group: reassignment target must differ from the deleted group",
        ));
    }
    let target_priority = reassign_priority.unwrap_or(schema.default_group_priority);

    // Orphans are members of the deleted group with no snapshot membership
    // in any other group; the duplicate guard reads the target group's
    // surviving rows.
    let sql = format!(
        "\
WITH removed AS (
  DELETE FROM {rug}
   WHERE groupname = $1::text
  RETURNING username
),
affected AS (
  SELECT DISTINCT username FROM removed
),
orphans AS (
  SELECT a.username
    FROM affected a
   WHERE NOT EXISTS (
     SELECT 1
       FROM {rug} ug
      WHERE ug.username = a.username
        AND ug.groupname <> $1::text
   )
),
inserted AS (
  INSERT INTO {rug} (username, groupname, priority)
  SELECT o.username, $2::text, $3::bigint
    FROM orphans o
   WHERE NOT EXISTS (
     SELECT 1
       FROM {rug} ug
      WHERE ug.username = o.username
        AND ug.groupname = $2::text
   )
  RETURNING 1
)
SELECT
  (SELECT COUNT(*) FROM removed) AS removed_rows,
  (SELECT COUNT(*) FROM affected) AS affected_users,
  (SELECT COUNT(*) FROM inserted) AS reassigned_users;",
        rug = schema.radusergroup_table
    );

    Ok(vec![
        Statement::new(
            format!("Delete group memberships and reassign orphans ({})", schema.radusergroup_table),
            sql,
            vec![Param::from(name), Param::from(target_group), Param::from(target_priority)],
        ),
        Statement::new(
            format!("Delete group ({})", schema.groups_table),
            format!("DELETE FROM {} WHERE name = $1;", schema.groups_table),
            vec![Param::from(name)],
        ),
    ])
}

fn add_membership(schema: &SchemaConfig, username: &str, groupname: &str, priority: i64) -> Plan {
    let sql = format!(
        "\
WITH desired AS (
  SELECT $1::text AS username, $2::text AS groupname, $3::bigint AS priority
),
updated AS (
  UPDATE {rug}
     SET priority = (SELECT priority FROM desired)
   WHERE username = (SELECT username FROM desired)
     AND groupname = (SELECT groupname FROM desired)
     AND priority IS DISTINCT FROM (SELECT priority FROM desired)
  RETURNING 1
),
inserted AS (
  INSERT INTO {rug} (username, groupname, priority)
  SELECT (SELECT username FROM desired), (SELECT groupname FROM desired), (SELECT priority FROM desired)
   WHERE NOT EXISTS (
     SELECT 1
       FROM {rug}
      WHERE username = (SELECT username FROM desired)
        AND groupname = (SELECT groupname FROM desired)
   )
  RETURNING 1
)
SELECT
  CASE
    WHEN EXISTS (SELECT 1 FROM updated) OR EXISTS (SELECT 1 FROM inserted) THEN 1
    ELSE 0
  END AS changed;",
        rug = schema.radusergroup_table
    );
    vec![Statement::new(
        format!("Upsert group membership ({})", schema.radusergroup_table),
        sql,
        vec![Param::from(username), Param::from(groupname), Param::from(priority)],
    )]
}

fn remove_membership(
    schema: &SchemaConfig,
    username: &str,
    groupname: &str,
    fallback_group: Option<&str>,
    fallback_priority: Option<i64>,
) -> Result<Plan> {
    let target_group = resolve_fallback_group(schema, fallback_group, "remove")?;
    let target_priority = fallback_priority.unwrap_or(schema.default_group_priority);

    // `remaining` is the user's snapshot rows in other groups. Phrasing the
    // duplicate guard against it keeps the statement correct even when the
    // fallback equals the removed group: the membership is re-created at
    // fallback priority, leaving exactly one row.
    let sql = format!(
        "\
WITH removed AS (
  DELETE FROM {rug}
   WHERE username = $1::text
     AND groupname = $2::text
  RETURNING username
),
remaining AS (
  SELECT ug.groupname
    FROM {rug} ug
   WHERE ug.username = $1::text
     AND ug.groupname <> $2::text
),
orphans AS (
  SELECT DISTINCT r.username
    FROM removed r
   WHERE NOT EXISTS (
     SELECT 1 FROM remaining
   )
),
inserted AS (
  INSERT INTO {rug} (username, groupname, priority)
  SELECT o.username, $3::text, $4::bigint
    FROM orphans o
   WHERE NOT EXISTS (
     SELECT 1
       FROM remaining m
      WHERE m.groupname = $3::text
   )
  RETURNING 1
)
SELECT
  (SELECT COUNT(*) FROM removed) AS removed_rows,
  (SELECT COUNT(*) FROM inserted) AS inserted_fallback;",
        rug = schema.radusergroup_table
    );

    Ok(vec![Statement::new(
        format!("Remove group membership and prevent orphans ({})", schema.radusergroup_table),
        sql,
        vec![
            Param::from(username),
            Param::from(groupname),
            Param::from(target_group),
            Param::from(target_priority),
        ],
    )])
}

/// Block upsert: re-blocking resets the reason and the whole block window
///
/// The expiration stays relative (`NOW() + seconds`) so it is computed
/// against the database clock at execution time, not the client clock at
/// planning time.
fn block_user(
    schema: &SchemaConfig,
    username: &str,
    reason: Option<&str>,
    duration: Option<&str>,
) -> Result<Plan> {
    let seconds = parse_duration(duration)?;
    let plan = match seconds {
        Some(seconds) => {
            let sql = format!(
                "\
INSERT INTO {blocklist} (username, reason, created_at, expires_at)
VALUES ($1, $2, NOW(), NOW() + $3::bigint * INTERVAL '1 second')
ON CONFLICT (username) DO UPDATE
  SET reason = EXCLUDED.reason,
      created_at = EXCLUDED.created_at,
      expires_at = EXCLUDED.expires_at;",
                blocklist = schema.blocklist_table
            );
            vec![Statement::new(
                format!("Upsert user block ({})", schema.blocklist_table),
                sql,
                vec![Param::from(username), Param::from(reason), Param::from(seconds)],
            )]
        }
        None => {
            let sql = format!(
                "\
INSERT INTO {blocklist} (username, reason, created_at, expires_at)
VALUES ($1, $2, NOW(), NULL)
ON CONFLICT (username) DO UPDATE
  SET reason = EXCLUDED.reason,
      created_at = EXCLUDED.created_at,
      expires_at = EXCLUDED.expires_at;",
                blocklist = schema.blocklist_table
            );
            vec![Statement::new(
                format!("Upsert user block ({})", schema.blocklist_table),
                sql,
                vec![Param::from(username), Param::from(reason)],
            )]
        }
    };
    Ok(plan)
}

fn unblock_user(schema: &SchemaConfig, username: &str) -> Plan {
    vec![Statement::new(
        format!("Delete user block ({})", schema.blocklist_table),
        format!("DELETE FROM {} WHERE username = $1;", schema.blocklist_table),
        vec![Param::from(username)],
    )]
}

fn show_users(schema: &SchemaConfig) -> Plan {
    let sql = format!(
        "\
SELECT username
  FROM (
    SELECT DISTINCT username FROM {radcheck}
    UNION
    SELECT DISTINCT username FROM {rug}
    UNION
    SELECT DISTINCT username FROM {blocklist}
  ) u
 WHERE username IS NOT NULL AND username <> ''
 ORDER BY username;",
        radcheck = schema.radcheck_table,
        rug = schema.radusergroup_table,
        blocklist = schema.blocklist_table
    );
    vec![Statement::new("List users", sql, vec![])]
}

fn show_groups(schema: &SchemaConfig) -> Plan {
    let sql = format!(
        "\
SELECT groupname
  FROM (
    SELECT DISTINCT groupname FROM {rug}
    UNION
    SELECT DISTINCT name AS groupname FROM {groups}
  ) g
 WHERE groupname IS NOT NULL AND groupname <> ''
 ORDER BY groupname;",
        rug = schema.radusergroup_table,
        groups = schema.groups_table
    );
    vec![Statement::new("List groups", sql, vec![])]
}

fn show_blocks(schema: &SchemaConfig, include_expired: bool) -> Plan {
    let filter = if include_expired {
        ""
    } else {
        "\n WHERE expires_at IS NULL OR expires_at > NOW()"
    };
    let sql = format!(
        "\
SELECT
  username,
  reason,
  created_at,
  expires_at,
  CASE
    WHEN expires_at IS NULL THEN NULL
    ELSE GREATEST(0, EXTRACT(EPOCH FROM (expires_at - NOW())))::bigint
  END AS expires_in_seconds
FROM {blocklist}{filter}
ORDER BY created_at DESC, username;",
        blocklist = schema.blocklist_table,
        filter = filter
    );
    vec![Statement::new("List blocks", sql, vec![])]
}

fn find_user(schema: &SchemaConfig, pattern: &str) -> Plan {
    let sql = format!(
        "\
WITH matched AS (
  SELECT username
    FROM (
      SELECT DISTINCT username FROM {radcheck}
      UNION
      SELECT DISTINCT username FROM {rug}
      UNION
      SELECT DISTINCT username FROM {blocklist}
    ) u
   WHERE username IS NOT NULL
     AND username <> ''
     AND username ILIKE $1
)
SELECT
  m.username,
  EXISTS (
    SELECT 1
      FROM {radcheck}
     WHERE username = m.username
       AND attribute = 'Cleartext-Password'
       AND op = ':='
  ) AS password_set,
  COALESCE(
    string_agg(g.groupname || '(' || g.priority::text || ')', ', ' ORDER BY g.priority, g.groupname),
    ''
  ) AS groups,
  b.reason,
  b.created_at,
  b.expires_at,
  CASE
    WHEN b.expires_at IS NULL THEN NULL
    ELSE GREATEST(0, EXTRACT(EPOCH FROM (b.expires_at - NOW())))::bigint
  END AS expires_in_seconds
FROM matched m
LEFT JOIN {rug} g
  ON g.username = m.username
LEFT JOIN {blocklist} b
  ON b.username = m.username
 AND (b.expires_at IS NULL OR b.expires_at > NOW())
GROUP BY m.username, b.reason, b.created_at, b.expires_at
ORDER BY m.username;",
        radcheck = schema.radcheck_table,
        rug = schema.radusergroup_table,
        blocklist = schema.blocklist_table
    );
    vec![Statement::new("Users", sql, vec![Param::from(pattern)])]
}

fn find_group(schema: &SchemaConfig, name: &str) -> Plan {
    let summary_sql = format!(
        "\
SELECT
  $1::text AS groupname,
  (SELECT COUNT(*) FROM {groups} WHERE name = $1) AS defined_in_{groups_label},
  (SELECT description FROM {groups} WHERE name = $1) AS description,
  (SELECT COUNT(*) FROM {rug} WHERE groupname = $1) AS members;",
        groups = schema.groups_table,
        groups_label = schema.groups_table.replace('.', "_"),
        rug = schema.radusergroup_table
    );
    let members_sql = format!(
        "\
SELECT username, priority
  FROM {rug}
 WHERE groupname = $1
 ORDER BY priority, username;",
        rug = schema.radusergroup_table
    );
    vec![
        Statement::new("Group summary", summary_sql, vec![Param::from(name)]),
        Statement::new("Group members", members_sql, vec![Param::from(name)]),
    ]
}
