//! radctl - FreeRADIUS VPN Administration CLI
//!
//! radctl manages VPN users, groups, and blocks stored in a FreeRADIUS
//! PostgreSQL schema. Nothing mutates the database ad hoc: every command is
//! first translated into an ordered plan of parameterized SQL statements,
//! which is then either printed for review (`--sql`) or executed inside a
//! single transaction.
//!
//! # Core Principles
//! - Plan first: every mutation exists as reviewable SQL before it runs
//! - Parameterized everywhere: values are bound, identifiers are validated
//! - Idempotent plans: re-running a plan never fails or duplicates rows
//! - Orphan safety: no operation leaves a grouped user with zero groups
//! - Deterministic behavior (identical inputs produce identical plans)
//!
//! # Architecture
//! The planner is a pure library with no I/O; the CLI resolves interactive
//! concerns (prompts, previews) and hands finished intents to it. The
//! executor is the only component that talks to PostgreSQL.
//!
//! # Module Organization
//! - [`error`] - Error taxonomy and exit-code mapping
//! - [`ident`] - SQL identifier validation
//! - [`duration`] - Relative duration parsing for timed blocks
//! - [`statement`] - Parameterized statement model and redaction
//! - [`plan`] - Statement planner: one pure function per intent
//! - [`config`] - Layered configuration (file, environment, defaults)
//! - [`exec`] - Transactional PostgreSQL executor
//! - [`output`] - Text and JSON renderings of plans and results

pub mod config;
pub mod duration;
pub mod error;
pub mod exec;
pub mod ident;
pub mod output;
pub mod plan;
pub mod statement;

// Re-export commonly used types for convenience
pub use config::{load_config, Config};
pub use error::{RadctlError, Result};
pub use exec::{ConnectionConfig, ExecResult, PostgresExecutor};
pub use plan::{build_plan, Intent, SchemaConfig};
pub use statement::{Param, Plan, Statement};
