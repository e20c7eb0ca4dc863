//! Migration orchestration
//!
//! `Migrator` drives a run end to end:
//!
//! ```text
//! Idle -> Validating -> Aborted              (no valid rows)
//!                    -> Done                 (dry run, nothing sent)
//!                    -> Confirming -> Migrating -> Done
//! ```
//!
//! Every API call is made sequentially through one transport. Nothing is
//! rolled back: if a call fails partway through, whatever was already created
//! in the target domain stays there.

mod domains;
mod dump;
mod group_table;
mod membership;

pub use group_table::GroupTable;

use crate::error::{ApiError, MigrationError, Result};
use crate::nerdgraph::{extract, DomainUser, NerdGraphQuery, NerdGraphTransport, UserPage, CREATED_GROUP_ID, DOMAIN_USERS};
use crate::roster::UserRecord;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default length of the abort window before the first mutation.
pub const DEFAULT_CONFIRM_DELAY: Duration = Duration::from_secs(10);

/// What a run does with the roster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum RunMode {
    /// Recreate users and groups in the destination domain and replay roles.
    #[default]
    Migrate,
    /// Add existing users of the source domain to the roster's groups.
    AddToGroup,
    /// Print the source domain's users as a roster.
    DumpUsers,
}

/// Resolved command-line options for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Validate the roster and stop; never call a mutation.
    pub dry_run: bool,
    pub mode: RunMode,
    /// Countdown before the first mutating call.
    pub confirm_delay: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            mode: RunMode::Migrate,
            confirm_delay: DEFAULT_CONFIRM_DELAY,
        }
    }
}

/// Credentials and domains a run operates on.
#[derive(Debug, Clone, Default)]
pub struct MigrationSettings {
    pub api_key: String,
    pub source_domain_id: Option<String>,
    pub destination_domain_id: Option<String>,
}

impl MigrationSettings {
    pub fn source_domain(&self) -> Result<&str> {
        non_blank(&self.source_domain_id).ok_or(MigrationError::MissingSetting("source_domain_id"))
    }

    pub fn destination_domain(&self) -> Result<&str> {
        non_blank(&self.destination_domain_id)
            .ok_or(MigrationError::MissingSetting("destination_domain_id"))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunPhase {
    Idle,
    Validating,
    Aborted,
    Confirming,
    Migrating,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::Validating => "validating",
            RunPhase::Aborted => "aborted",
            RunPhase::Confirming => "confirming",
            RunPhase::Migrating => "migrating",
            RunPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Counters for a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub phase: RunPhase,
    pub validated_users: usize,
    pub users_created: usize,
    pub users_dumped: usize,
    /// Add-to-group mode: users already in every requested group.
    pub users_unchanged: usize,
    pub groups_created: usize,
    pub groups_reused: usize,
    pub memberships_added: usize,
    pub roles_granted: usize,
    /// GraphQL errors that were logged without aborting the run.
    pub graphql_errors: usize,
}

impl Default for RunReport {
    fn default() -> Self {
        Self {
            phase: RunPhase::Idle,
            validated_users: 0,
            users_created: 0,
            users_dumped: 0,
            users_unchanged: 0,
            groups_created: 0,
            groups_reused: 0,
            memberships_added: 0,
            roles_granted: 0,
            graphql_errors: 0,
        }
    }
}

/// Runs migrations against a NerdGraph transport.
pub struct Migrator<T: NerdGraphTransport> {
    transport: T,
    settings: MigrationSettings,
    options: RunOptions,
    phase: RunPhase,
}

impl<T: NerdGraphTransport> Migrator<T> {
    pub fn new(transport: T, settings: MigrationSettings, options: RunOptions) -> Self {
        Self {
            transport,
            settings,
            options,
            phase: RunPhase::Idle,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn enter(&mut self, phase: RunPhase) {
        debug!(from = %self.phase, to = %phase, "Run phase change");
        self.phase = phase;
    }

    /// Run the configured mode over validated roster records.
    pub async fn run(&mut self, records: &[UserRecord]) -> Result<RunReport> {
        if self.options.mode == RunMode::DumpUsers {
            let mut stdout = std::io::stdout();
            return self.dump_users(&mut stdout).await;
        }

        let mut report = RunReport::default();

        self.enter(RunPhase::Validating);
        if records.is_empty() {
            self.enter(RunPhase::Aborted);
            return Err(MigrationError::NoValidRows);
        }
        info!("Found {} rows in the tsv file", records.len());
        report.validated_users = records.len();

        if self.options.dry_run {
            info!("Running in dryrun mode. Exiting after validating input");
            self.enter(RunPhase::Done);
            report.phase = RunPhase::Done;
            return Ok(report);
        }

        self.enter(RunPhase::Confirming);
        self.confirm().await;

        self.enter(RunPhase::Migrating);
        if self.options.mode == RunMode::AddToGroup {
            self.add_to_groups(records, &mut report).await?;
        } else {
            self.migrate_domains(records, &mut report).await?;
        }

        self.enter(RunPhase::Done);
        report.phase = RunPhase::Done;
        info!(
            users_created = report.users_created,
            groups_created = report.groups_created,
            memberships_added = report.memberships_added,
            roles_granted = report.roles_granted,
            graphql_errors = report.graphql_errors,
            "Done!"
        );
        Ok(report)
    }

    /// Human abort window. Interrupting the process here leaves nothing behind.
    async fn confirm(&self) {
        let seconds = self.options.confirm_delay.as_secs();
        warn!("This run will commit changes");
        for remaining in (1..=seconds).rev() {
            info!("Confirming in {} seconds", remaining);
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    /// Execute `query`. A GraphQL-level error is logged and the response is
    /// returned anyway; callers fail later only if a field they need is absent.
    async fn send(&self, query: &NerdGraphQuery, report: &mut RunReport) -> Result<Value> {
        match query
            .execute(&self.transport, &self.settings.api_key, self.options.dry_run)
            .await
        {
            Ok(response) => Ok(response),
            Err(ApiError::GraphQl {
                operation,
                message,
                response,
            }) => {
                warn!(operation = %operation, "GraphQL error: {}", message);
                report.graphql_errors += 1;
                Ok(response)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch every user of `domain`, following `nextCursor`.
    async fn fetch_all_users(&self, domain: &str, report: &mut RunReport) -> Result<Vec<DomainUser>> {
        let mut users = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let query = NerdGraphQuery::ListUsers {
                auth_domain_id: domain.to_string(),
                cursor: cursor.take(),
            };
            let response = self.send(&query, report).await?;
            let page: UserPage = extract(query.name(), &response, DOMAIN_USERS)?;
            debug!(count = page.users.len(), "Fetched user page");
            users.extend(page.users);

            match page.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(users)
    }

    /// Id of group `name` in `domain`, creating the group on first sight.
    async fn ensure_group(
        &self,
        table: &mut GroupTable,
        domain: &str,
        name: &str,
        report: &mut RunReport,
    ) -> Result<String> {
        if let Some(id) = table.get(name) {
            debug!("Group {} was seen before. Not creating ...", name);
            report.groups_reused += 1;
            return Ok(id.to_string());
        }

        let query = NerdGraphQuery::CreateGroup {
            auth_domain_id: domain.to_string(),
            group_name: name.to_string(),
        };
        let response = self.send(&query, report).await?;
        let id: String = extract(query.name(), &response, CREATED_GROUP_ID)?;
        info!("Created group {} with id {} ...", name, id);
        table.record(name, &id);
        report.groups_created += 1;
        Ok(id)
    }

    async fn add_user_to_group(&self, group_id: &str, user_id: &str, report: &mut RunReport) -> Result<()> {
        let query = NerdGraphQuery::AddUserToGroup {
            group_id: group_id.to_string(),
            user_id: user_id.to_string(),
        };
        self.send(&query, report).await?;
        report.memberships_added += 1;
        Ok(())
    }
}
