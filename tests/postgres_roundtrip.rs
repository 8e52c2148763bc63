//! PostgreSQL Round-Trip Tests
//!
//! End-to-end tests against a real PostgreSQL instance. They validate the
//! behavior the planner can only promise on paper:
//! - Re-running a plan changes nothing (idempotence)
//! - Deleting a group or a last membership never orphans a user
//! - Blocks expire through the database clock and unblock cleanly
//! - `find user` aggregates groups and block status per user
//!
//! All tests are `#[ignore]`d; run them with `cargo test -- --ignored`
//! against a disposable database. Table names are unique per test so runs
//! never interfere, and every test drops its tables on success.
//!
//! DSN resolution: `RADCTL_TEST_DSN`, defaulting to a local superuser DSN.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;

use radctl::exec::{ConnectionConfig, PostgresExecutor};
use radctl::plan::{build_plan, preview_delete_group, Intent, SchemaConfig};
use radctl::statement::{Param, Statement};

// ============================================================================
// Test Helpers
// ============================================================================

fn test_dsn() -> String {
    std::env::var("RADCTL_TEST_DSN").unwrap_or_else(|_| {
        "host=localhost user=postgres password=postgres dbname=postgres".to_string()
    })
}

/// Schema with table names unique to this test invocation
fn unique_schema() -> SchemaConfig {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).expect("clock").as_nanos();
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let tag = format!("radctl_t{nanos}_{id}");
    SchemaConfig {
        radcheck_table: format!("{tag}_check"),
        radusergroup_table: format!("{tag}_usergroup"),
        blocklist_table: format!("{tag}_blocklist"),
        groups_table: format!("{tag}_groups"),
        default_group_name: "default".to_string(),
        default_group_priority: 0,
    }
}

/// Create the FreeRADIUS tables radctl expects to pre-exist, then migrate
async fn setup() -> (PostgresExecutor, SchemaConfig) {
    let executor = PostgresExecutor::new(ConnectionConfig {
        dsn: Some(test_dsn()),
        ..ConnectionConfig::default()
    });
    let schema = unique_schema();

    let bootstrap = vec![
        Statement::new(
            "create credential table",
            format!(
                "CREATE TABLE {} (\
                 id SERIAL PRIMARY KEY, \
                 username TEXT NOT NULL, \
                 attribute TEXT NOT NULL, \
                 op TEXT NOT NULL, \
                 value TEXT NOT NULL);",
                schema.radcheck_table
            ),
            vec![],
        ),
        Statement::new(
            "create membership table",
            format!(
                "CREATE TABLE {} (\
                 id SERIAL PRIMARY KEY, \
                 username TEXT NOT NULL, \
                 groupname TEXT NOT NULL, \
                 priority INT NOT NULL DEFAULT 0);",
                schema.radusergroup_table
            ),
            vec![],
        ),
    ];
    executor.run(&bootstrap).await.expect("bootstrap FreeRADIUS tables");

    let migrate = build_plan(&schema, &Intent::Migrate).expect("migrate plan");
    executor.run(&migrate).await.expect("run migrate");

    (executor, schema)
}

async fn teardown(executor: &PostgresExecutor, schema: &SchemaConfig) {
    let drop = vec![Statement::new(
        "drop test tables",
        format!(
            "DROP TABLE IF EXISTS {}, {}, {}, {};",
            schema.radcheck_table,
            schema.radusergroup_table,
            schema.blocklist_table,
            schema.groups_table
        ),
        vec![],
    )];
    executor.run(&drop).await.expect("drop test tables");
}

/// Run one ad-hoc probe statement and return its rows
async fn probe(
    executor: &PostgresExecutor,
    sql: String,
    params: Vec<Param>,
) -> Vec<Vec<serde_json::Value>> {
    let plan = vec![Statement::new("probe", sql, params)];
    let results = executor.run(&plan).await.expect("probe statement");
    results[0].rows.clone().unwrap_or_default()
}

/// The user's memberships as `(groupname, priority)` ordered by group
async fn memberships(
    executor: &PostgresExecutor,
    schema: &SchemaConfig,
    username: &str,
) -> Vec<Vec<serde_json::Value>> {
    probe(
        executor,
        format!(
            "SELECT groupname, priority FROM {} WHERE username = $1 ORDER BY groupname;",
            schema.radusergroup_table
        ),
        vec![Param::from(username)],
    )
    .await
}

async fn run_intent(executor: &PostgresExecutor, schema: &SchemaConfig, intent: &Intent) {
    let plan = build_plan(schema, intent).expect("plan");
    executor.run(&plan).await.expect("execute plan");
}

// ============================================================================
// Idempotence
// ============================================================================

#[tokio::test]
#[ignore = "Requires running PostgreSQL instance"]
async fn test_create_user_twice_changes_once() {
    let (executor, schema) = setup().await;
    let intent = Intent::CreateUser { username: "alice".into(), password: "pw1".into() };

    let plan = build_plan(&schema, &intent).expect("plan");
    let first = executor.run(&plan).await.expect("first run");
    assert_eq!(
        first[0].rows,
        Some(vec![vec![json!(1)]]),
        "first run must report the credential as changed"
    );
    assert_eq!(first[1].rowcount, 1, "first run must add the default membership");

    let second = executor.run(&plan).await.expect("second run");
    assert_eq!(
        second[0].rows,
        Some(vec![vec![json!(0)]]),
        "second run must be a no-op on the credential"
    );
    assert_eq!(second[1].rowcount, 0, "second run must not add another membership");

    let rows = probe(
        &executor,
        format!(
            "SELECT COUNT(*) FROM {} WHERE username = $1 AND attribute = 'Cleartext-Password';",
            schema.radcheck_table
        ),
        vec![Param::from("alice")],
    )
    .await;
    assert_eq!(rows, vec![vec![json!(1)]], "exactly one credential row");

    assert_eq!(
        memberships(&executor, &schema, "alice").await,
        vec![vec![json!("default"), json!(0)]]
    );

    teardown(&executor, &schema).await;
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL instance"]
async fn test_change_user_rewrites_password_in_place() {
    let (executor, schema) = setup().await;
    run_intent(
        &executor,
        &schema,
        &Intent::CreateUser { username: "alice".into(), password: "old".into() },
    )
    .await;
    run_intent(
        &executor,
        &schema,
        &Intent::ChangeUser { username: "alice".into(), password: "new".into() },
    )
    .await;

    let rows = probe(
        &executor,
        format!(
            "SELECT value FROM {} WHERE username = $1 AND attribute = 'Cleartext-Password';",
            schema.radcheck_table
        ),
        vec![Param::from("alice")],
    )
    .await;
    assert_eq!(rows, vec![vec![json!("new")]]);

    teardown(&executor, &schema).await;
}

// ============================================================================
// Orphan Safety
// ============================================================================

#[tokio::test]
#[ignore = "Requires running PostgreSQL instance"]
async fn test_delete_group_reassigns_only_orphans() {
    let (executor, schema) = setup().await;

    // alice: doomed only (will be orphaned); bob: doomed + staff (will not)
    probe(
        &executor,
        format!(
            "INSERT INTO {} (username, groupname, priority) VALUES \
             ('alice', 'doomed', 1), ('bob', 'doomed', 1), ('bob', 'staff', 2);",
            schema.radusergroup_table
        ),
        vec![],
    )
    .await;
    run_intent(
        &executor,
        &schema,
        &Intent::CreateGroup { name: "doomed".into(), description: None },
    )
    .await;

    let preview = executor
        .run(&preview_delete_group(&schema, "doomed"))
        .await
        .expect("preview");
    assert_eq!(
        preview[0].rows,
        Some(vec![vec![json!(2), json!(1)]]),
        "two members, one would be orphaned"
    );

    run_intent(
        &executor,
        &schema,
        &Intent::DeleteGroup { name: "doomed".into(), reassign_to: None, reassign_priority: None },
    )
    .await;

    assert_eq!(
        memberships(&executor, &schema, "alice").await,
        vec![vec![json!("default"), json!(0)]],
        "orphaned user lands in the fallback group"
    );
    assert_eq!(
        memberships(&executor, &schema, "bob").await,
        vec![vec![json!("staff"), json!(2)]],
        "user with another group is not reassigned"
    );

    let rows = probe(
        &executor,
        format!("SELECT COUNT(*) FROM {} WHERE name = $1;", schema.groups_table),
        vec![Param::from("doomed")],
    )
    .await;
    assert_eq!(rows, vec![vec![json!(0)]], "group definition is gone");

    // Re-running the same plan is a no-op: nothing left to remove or reassign.
    run_intent(
        &executor,
        &schema,
        &Intent::DeleteGroup { name: "doomed".into(), reassign_to: None, reassign_priority: None },
    )
    .await;
    assert_eq!(
        memberships(&executor, &schema, "alice").await,
        vec![vec![json!("default"), json!(0)]],
        "second delete does not duplicate the fallback membership"
    );

    teardown(&executor, &schema).await;
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL instance"]
async fn test_remove_last_membership_falls_back() {
    let (executor, schema) = setup().await;
    probe(
        &executor,
        format!(
            "INSERT INTO {} (username, groupname, priority) VALUES ('alice', 'staff', 3);",
            schema.radusergroup_table
        ),
        vec![],
    )
    .await;

    run_intent(
        &executor,
        &schema,
        &Intent::RemoveMembership {
            username: "alice".into(),
            groupname: "staff".into(),
            fallback_group: None,
            fallback_priority: None,
        },
    )
    .await;
    assert_eq!(
        memberships(&executor, &schema, "alice").await,
        vec![vec![json!("default"), json!(0)]],
        "last membership removal falls back to the default group"
    );

    // Removing the fallback itself re-creates it: the user is never orphaned.
    run_intent(
        &executor,
        &schema,
        &Intent::RemoveMembership {
            username: "alice".into(),
            groupname: "default".into(),
            fallback_group: None,
            fallback_priority: None,
        },
    )
    .await;
    assert_eq!(
        memberships(&executor, &schema, "alice").await,
        vec![vec![json!("default"), json!(0)]]
    );

    teardown(&executor, &schema).await;
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL instance"]
async fn test_remove_one_of_many_memberships_adds_nothing() {
    let (executor, schema) = setup().await;
    probe(
        &executor,
        format!(
            "INSERT INTO {} (username, groupname, priority) VALUES \
             ('alice', 'staff', 1), ('alice', 'lab', 2);",
            schema.radusergroup_table
        ),
        vec![],
    )
    .await;

    run_intent(
        &executor,
        &schema,
        &Intent::RemoveMembership {
            username: "alice".into(),
            groupname: "staff".into(),
            fallback_group: None,
            fallback_priority: None,
        },
    )
    .await;
    assert_eq!(
        memberships(&executor, &schema, "alice").await,
        vec![vec![json!("lab"), json!(2)]],
        "no fallback insert when other memberships remain"
    );

    teardown(&executor, &schema).await;
}

// ============================================================================
// Blocks
// ============================================================================

#[tokio::test]
#[ignore = "Requires running PostgreSQL instance"]
async fn test_block_unblock_roundtrip() {
    let (executor, schema) = setup().await;

    run_intent(
        &executor,
        &schema,
        &Intent::BlockUser {
            username: "mallory".into(),
            reason: Some("ABUSE".into()),
            duration: Some("1h".into()),
        },
    )
    .await;

    let plan = build_plan(&schema, &Intent::ShowBlocks { include_expired: false }).expect("plan");
    let results = executor.run(&plan).await.expect("show blocks");
    let rows = results[0].rows.clone().expect("block rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], json!("mallory"));
    assert_eq!(rows[0][1], json!("ABUSE"));
    let remaining = rows[0][4].as_i64().expect("expires_in_seconds");
    assert!(
        (3500..=3600).contains(&remaining),
        "1h block should have about 3600s left, got {remaining}"
    );

    // Re-blocking resets the window and the reason.
    run_intent(
        &executor,
        &schema,
        &Intent::BlockUser { username: "mallory".into(), reason: Some("MANUAL".into()), duration: None },
    )
    .await;
    let results = executor.run(&plan).await.expect("show blocks");
    let rows = results[0].rows.clone().expect("block rows");
    assert_eq!(rows.len(), 1, "re-block must not duplicate the entry");
    assert_eq!(rows[0][1], json!("MANUAL"));
    assert_eq!(rows[0][3], json!(null), "permanent block has no expiry");

    run_intent(&executor, &schema, &Intent::UnblockUser { username: "mallory".into() }).await;
    let results = executor.run(&plan).await.expect("show blocks");
    assert_eq!(results[0].rows, Some(vec![]), "unblock removes the entry");

    teardown(&executor, &schema).await;
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL instance"]
async fn test_expired_blocks_hidden_unless_requested() {
    let (executor, schema) = setup().await;

    // Insert an already expired block directly.
    probe(
        &executor,
        format!(
            "INSERT INTO {} (username, reason, created_at, expires_at) \
             VALUES ('old', 'STALE', NOW() - INTERVAL '2 hours', NOW() - INTERVAL '1 hour');",
            schema.blocklist_table
        ),
        vec![],
    )
    .await;

    let active = build_plan(&schema, &Intent::ShowBlocks { include_expired: false }).expect("plan");
    let results = executor.run(&active).await.expect("show blocks");
    assert_eq!(results[0].rows, Some(vec![]), "expired block must be hidden by default");

    let all = build_plan(&schema, &Intent::ShowBlocks { include_expired: true }).expect("plan");
    let results = executor.run(&all).await.expect("show blocks --all");
    let rows = results[0].rows.clone().expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], json!("old"));
    assert_eq!(rows[0][4], json!(0), "remaining seconds clamp to zero");

    teardown(&executor, &schema).await;
}

// ============================================================================
// Lookups
// ============================================================================

#[tokio::test]
#[ignore = "Requires running PostgreSQL instance"]
async fn test_find_user_aggregates_groups_and_block() {
    let (executor, schema) = setup().await;

    run_intent(
        &executor,
        &schema,
        &Intent::CreateUser { username: "alice".into(), password: "pw".into() },
    )
    .await;
    run_intent(
        &executor,
        &schema,
        &Intent::AddMembership { username: "alice".into(), groupname: "staff".into(), priority: 5 },
    )
    .await;
    run_intent(
        &executor,
        &schema,
        &Intent::BlockUser { username: "alice".into(), reason: Some("HOLD".into()), duration: None },
    )
    .await;

    let plan = build_plan(&schema, &Intent::FindUser { pattern: "ali%".into() }).expect("plan");
    let results = executor.run(&plan).await.expect("find user");
    let rows = results[0].rows.clone().expect("rows");
    assert_eq!(rows.len(), 1);

    let row = &rows[0];
    assert_eq!(row[0], json!("alice"));
    assert_eq!(row[1], json!(true), "password_set");
    assert_eq!(row[2], json!("default(0), staff(5)"), "groups ordered by priority");
    assert_eq!(row[3], json!("HOLD"));
    assert_eq!(row[5], json!(null), "permanent block has no expiry");

    let miss = build_plan(&schema, &Intent::FindUser { pattern: "zz%".into() }).expect("plan");
    let results = executor.run(&miss).await.expect("find user miss");
    assert_eq!(results[0].rows, Some(vec![]));

    teardown(&executor, &schema).await;
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL instance"]
async fn test_find_group_summary_and_members() {
    let (executor, schema) = setup().await;

    run_intent(
        &executor,
        &schema,
        &Intent::CreateGroup { name: "staff".into(), description: Some("Office".into()) },
    )
    .await;
    probe(
        &executor,
        format!(
            "INSERT INTO {} (username, groupname, priority) VALUES \
             ('alice', 'staff', 2), ('bob', 'staff', 1);",
            schema.radusergroup_table
        ),
        vec![],
    )
    .await;

    let plan = build_plan(&schema, &Intent::FindGroup { name: "staff".into() }).expect("plan");
    let results = executor.run(&plan).await.expect("find group");
    assert_eq!(results.len(), 2);

    let summary = results[0].rows.clone().expect("summary rows");
    assert_eq!(summary[0][0], json!("staff"));
    assert_eq!(summary[0][1], json!(1), "defined in the groups table");
    assert_eq!(summary[0][2], json!("Office"));
    assert_eq!(summary[0][3], json!(2), "member count");

    let members = results[1].rows.clone().expect("member rows");
    assert_eq!(
        members,
        vec![vec![json!("bob"), json!(1)], vec![json!("alice"), json!(2)]],
        "members ordered by priority"
    );

    teardown(&executor, &schema).await;
}
