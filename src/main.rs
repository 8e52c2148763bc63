//! radctl CLI Entry Point
//!
//! Command-line front end for the statement planner: parses a subcommand,
//! resolves interactive inputs (password prompts, orphan reassignment),
//! builds the plan, then either prints it (`--sql`) or executes it inside
//! a single transaction.
//!
//! Data output goes to stdout; warnings, prompts, and errors go to stderr.
//! Exit codes: 0 success, 2 invalid input or configuration, 1 execution
//! failure, 130 interrupted.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use dialoguer::{Input, Password};
use serde_json::Value;

use radctl::config::{load_config, Config};
use radctl::error::{RadctlError, Result};
use radctl::exec::{ExecResult, PostgresExecutor};
use radctl::output;
use radctl::plan::{build_plan, preview_delete_group, user_exists, Intent};
use radctl::statement::Plan;

/// radctl - FreeRADIUS VPN administration CLI
#[derive(Parser)]
#[command(name = "radctl")]
#[command(about = "Manage VPN users and groups via SQL (FreeRADIUS/PostgreSQL)")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the SQL plan instead of executing it
    #[arg(long, global = true)]
    sql: bool,

    /// Do not redact sensitive parameters when printing SQL (--sql)
    #[arg(long, global = true)]
    show_secrets: bool,

    /// Output format for plans and execution results
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the helper tables (idempotent)
    Migrate,

    /// Create a user or a group
    Create {
        #[command(subcommand)]
        entity: CreateEntity,
    },

    /// Delete a user or a group
    Delete {
        #[command(subcommand)]
        entity: DeleteEntity,
    },

    /// Change a user or a group
    Change {
        #[command(subcommand)]
        entity: ChangeEntity,
    },

    /// Add a user to a group
    Add {
        user: String,
        group: String,

        /// Membership priority (lower wins during authorization)
        #[arg(long, default_value_t = 0)]
        priority: i64,
    },

    /// Remove a user from a group
    Remove { user: String, group: String },

    /// Block a user
    Block {
        user: String,

        /// Reason recorded alongside the block entry
        #[arg(long, default_value = "MANUAL")]
        reason: String,

        /// Duration like 15m/2h/1d; omit for a permanent block
        #[arg(long = "for", value_name = "DURATION")]
        duration: Option<String>,
    },

    /// Unblock a user
    Unblock { user: String },

    /// Show users, groups, or blocks (read-only)
    Show {
        #[command(subcommand)]
        entity: ShowEntity,
    },

    /// Find users by pattern, or show one group in detail
    Find {
        #[command(subcommand)]
        entity: FindEntity,
    },
}

#[derive(Subcommand)]
enum CreateEntity {
    /// Create a user credential
    User {
        name: String,

        /// Password (Cleartext-Password); prompts when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Create a group definition
    Group {
        name: String,

        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
enum DeleteEntity {
    /// Delete a user: credentials, memberships, and any block
    User { name: String },

    /// Delete a group and remove its memberships
    Group {
        name: String,

        /// Group to reassign members to when deletion would leave them
        /// with no groups (default: the configured default group)
        #[arg(long = "reassign-orphans-to", value_name = "GROUP")]
        reassign_orphans_to: Option<String>,
    },
}

#[derive(Subcommand)]
enum ChangeEntity {
    /// Change a user's password
    User {
        name: String,

        /// New password; prompts when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Rename a group and/or update its description
    Group {
        name: String,

        #[arg(long)]
        rename: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
enum ShowEntity {
    /// List usernames
    Users,

    /// List group names
    Groups,

    /// List active blocks
    Blocks {
        /// Include expired blocks
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand)]
enum FindEntity {
    /// Find users and show their groups and block status ('*' wildcards)
    User { name: String },

    /// Show group details and members (exact name)
    Group { name: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message());
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    if cli.show_secrets && !cli.sql {
        eprintln!("warning: --show-secrets has effect only with --sql; ignoring.");
    }

    let config = load_config(cli.config.as_deref())?;
    let plan = resolve_plan(&cli, &config).await?;

    if cli.sql {
        let rendered = match cli.output {
            OutputFormat::Json => output::render_plan_json(&plan, cli.show_secrets),
            OutputFormat::Text => output::render_plan_text(&plan, cli.show_secrets),
        };
        print!("{rendered}");
        return Ok(());
    }

    let executor = PostgresExecutor::new(config.connection.clone());
    let results = executor.run(&plan).await?;
    let find_user = matches!(cli.command, Commands::Find { entity: FindEntity::User { .. } });
    let rendered = match cli.output {
        OutputFormat::Json => output::render_results_json(&results),
        OutputFormat::Text if find_user => output::render_find_users_text(&results),
        OutputFormat::Text => output::render_results_text(&results),
    };
    print!("{rendered}");
    Ok(())
}

/// Turn the parsed command line into a statement plan
///
/// This is where interactive resolution happens: password prompts, the
/// delete-group impact preview, and the `add` preflight all run here so
/// the planner itself stays pure.
async fn resolve_plan(cli: &Cli, config: &Config) -> Result<Plan> {
    let intent = match &cli.command {
        Commands::Migrate => Intent::Migrate,
        Commands::Create { entity } => match entity {
            CreateEntity::User { name, password } => Intent::CreateUser {
                username: name.clone(),
                password: resolve_password(password.as_deref(), &format!("Password for {name}"))?,
            },
            CreateEntity::Group { name, description } => Intent::CreateGroup {
                name: name.clone(),
                description: description.clone(),
            },
        },
        Commands::Delete { entity } => match entity {
            DeleteEntity::User { name } => Intent::DeleteUser { username: name.clone() },
            DeleteEntity::Group { name, reassign_orphans_to } => {
                let target =
                    resolve_reassignment(cli, config, name, reassign_orphans_to.as_deref()).await?;
                Intent::DeleteGroup {
                    name: name.clone(),
                    reassign_to: Some(target),
                    reassign_priority: None,
                }
            }
        },
        Commands::Change { entity } => match entity {
            ChangeEntity::User { name, password } => Intent::ChangeUser {
                username: name.clone(),
                password: resolve_password(
                    password.as_deref(),
                    &format!("New password for {name}"),
                )?,
            },
            ChangeEntity::Group { name, rename, description } => Intent::ChangeGroup {
                name: name.clone(),
                rename_to: rename.clone(),
                description: description.clone(),
            },
        },
        Commands::Add { user, group, priority } => {
            if !cli.sql {
                ensure_user_created(config, user).await?;
            }
            Intent::AddMembership {
                username: user.clone(),
                groupname: group.clone(),
                priority: *priority,
            }
        }
        Commands::Remove { user, group } => Intent::RemoveMembership {
            username: user.clone(),
            groupname: group.clone(),
            fallback_group: None,
            fallback_priority: None,
        },
        Commands::Block { user, reason, duration } => Intent::BlockUser {
            username: user.clone(),
            reason: Some(reason.clone()),
            duration: duration.clone(),
        },
        Commands::Unblock { user } => Intent::UnblockUser { username: user.clone() },
        Commands::Show { entity } => match entity {
            ShowEntity::Users => Intent::ShowUsers,
            ShowEntity::Groups => Intent::ShowGroups,
            ShowEntity::Blocks { all } => Intent::ShowBlocks { include_expired: *all },
        },
        Commands::Find { entity } => match entity {
            FindEntity::User { name } => Intent::FindUser { pattern: wildcard_to_like(name) },
            FindEntity::Group { name } => Intent::FindGroup { name: name.clone() },
        },
    };
    build_plan(&config.schema, &intent)
}

/// Use the flag value when given, otherwise prompt without echo
fn resolve_password(flag: Option<&str>, prompt: &str) -> Result<String> {
    match flag {
        Some(password) if !password.is_empty() => Ok(password.to_string()),
        _ => Password::new()
            .with_prompt(prompt)
            .interact()
            .map_err(|_| RadctlError::Interrupted),
    }
}

/// Resolve where orphaned members of a deleted group should go
///
/// The target comes from `--reassign-orphans-to` or the configured default
/// group. When executing, an impact preview runs first; if members would be
/// orphaned and no explicit target was given, an interactive session is
/// asked to confirm or override the default. The target must never equal
/// the deleted group.
async fn resolve_reassignment(
    cli: &Cli,
    config: &Config,
    groupname: &str,
    explicit: Option<&str>,
) -> Result<String> {
    let mut target = explicit
        .unwrap_or(&config.schema.default_group_name)
        .trim()
        .to_string();
    if target.is_empty() {
        return Err(RadctlError::invalid_intent("delete group: reassign group is empty"));
    }
    if target == groupname {
        return Err(RadctlError::invalid_intent(
            "delete group: --reassign-orphans-to must differ from the deleted group",
        ));
    }

    if !cli.sql {
        let executor = PostgresExecutor::new(config.connection.clone());
        let preview = executor
            .run(&preview_delete_group(&config.schema, groupname))
            .await?;
        let (members_total, would_orphan) = match first_row(&preview) {
            Some(row) => (int_value(row, 0), int_value(row, 1)),
            None => (0, 0),
        };

        if would_orphan > 0 {
            eprintln!(
                "warning: deleting group '{groupname}' affects {members_total} users; \
                 {would_orphan} would have no groups."
            );
            if explicit.is_none() && is_tty() {
                let answer: String = Input::new()
                    .with_prompt(format!("Reassign orphaned users to which group? [{target}]"))
                    .allow_empty(true)
                    .interact_text()
                    .map_err(|_| RadctlError::Interrupted)?;
                let answer = answer.trim();
                if !answer.is_empty() {
                    target = answer.to_string();
                    if target == groupname {
                        return Err(RadctlError::invalid_intent(
                            "delete group: reassign group must differ from the deleted group",
                        ));
                    }
                }
            } else if explicit.is_some() {
                eprintln!("info: orphaned users will be reassigned to '{target}'.");
            }
        }
    }

    Ok(target)
}

/// Refuse to attach a membership to a user that was never created
async fn ensure_user_created(config: &Config, username: &str) -> Result<()> {
    let executor = PostgresExecutor::new(config.connection.clone());
    let results = executor
        .run(&user_exists(&config.schema, username))
        .await?;
    if first_row(&results).is_none() {
        return Err(RadctlError::invalid_intent(format!(
            "User '{username}' does not exist (no Cleartext-Password in {}). \
             Create it first: radctl create user {username} --password '...'",
            config.schema.radcheck_table
        )));
    }
    Ok(())
}

/// Translate shell-style wildcards into a SQL LIKE pattern
///
/// `*` and `?` map to `%` and `_`. Inputs that already contain SQL
/// wildcards pass through unchanged; a plain name gets a trailing `%` so
/// `find user ali` matches `alice`. Empty input matches everything.
fn wildcard_to_like(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return "%".to_string();
    }
    if raw.contains('*') || raw.contains('?') {
        return raw.replace('*', "%").replace('?', "_");
    }
    if raw.contains('%') || raw.contains('_') {
        return raw.to_string();
    }
    format!("{raw}%")
}

fn first_row(results: &[ExecResult]) -> Option<&[Value]> {
    results.first()?.rows.as_ref()?.first().map(Vec::as_slice)
}

fn int_value(row: &[Value], index: usize) -> i64 {
    row.get(index).and_then(Value::as_i64).unwrap_or(0)
}

fn is_tty() -> bool {
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}
