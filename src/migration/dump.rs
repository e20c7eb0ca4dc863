//! Dump a domain's users in roster format.

use super::{Migrator, RunPhase, RunReport};
use crate::error::Result;
use crate::nerdgraph::{DomainUser, NerdGraphTransport};
use crate::roster::{write_roster, UserRecord, UserType};
use std::io::Write;
use tracing::{info, warn};

/// Convert a domain user to a roster record. Users whose type display name
/// does not map to a tier are returned as `None`.
pub(super) fn to_record(user: &DomainUser) -> Option<UserRecord> {
    let user_type = UserType::parse(&user.user_type.display_name)?;
    Some(UserRecord {
        name: user.name.clone(),
        email: user.email.clone(),
        user_type,
        groups: user.group_names().map(str::to_string).collect(),
    })
}

impl<T: NerdGraphTransport> Migrator<T> {
    /// Write every user of the source domain to `out` as a TSV roster.
    pub async fn dump_users<W: Write>(&mut self, out: &mut W) -> Result<RunReport> {
        info!("Dumping users in the format the script expects for the tsv file");
        let mut report = RunReport::default();
        let domain = self.settings.source_domain()?.to_string();

        self.enter(RunPhase::Migrating);
        let users = self.fetch_all_users(&domain, &mut report).await?;

        let mut records = Vec::with_capacity(users.len());
        for user in &users {
            match to_record(user) {
                Some(record) => records.push(record),
                None => warn!(
                    "Skipping user {}: unknown user type {}",
                    user.email, user.user_type.display_name
                ),
            }
        }

        write_roster(&mut *out, &records)?;
        report.users_dumped = records.len();

        self.enter(RunPhase::Done);
        report.phase = RunPhase::Done;
        Ok(report)
    }
}
