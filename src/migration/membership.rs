//! Add existing users to the groups named in the roster.

use super::{GroupTable, Migrator, RunReport};
use crate::error::{MigrationError, Result};
use crate::nerdgraph::{extract, GroupSummary, NerdGraphQuery, NerdGraphTransport, DOMAIN_GROUPS};
use crate::roster::UserRecord;
use std::collections::HashSet;
use tracing::{debug, info};

/// Requested groups the user is not yet in, in roster order, without repeats.
pub(super) fn missing_groups<'a, I>(requested: &'a [String], current: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen: HashSet<&str> = current.into_iter().collect();
    requested
        .iter()
        .map(String::as_str)
        .filter(|g| seen.insert(*g))
        .collect()
}

impl<T: NerdGraphTransport> Migrator<T> {
    /// For each record, find the user in the source domain and add them to the
    /// groups they are missing, creating groups that do not exist yet.
    ///
    /// A user that cannot be found aborts the whole run.
    pub(super) async fn add_to_groups(&self, records: &[UserRecord], report: &mut RunReport) -> Result<()> {
        info!("Running in just add to group mode");
        let domain = self.settings.source_domain()?;

        let query = NerdGraphQuery::ListGroups {
            auth_domain_id: domain.to_string(),
        };
        let response = self.send(&query, report).await?;
        let existing: Vec<GroupSummary> = extract(query.name(), &response, DOMAIN_GROUPS)?;
        let mut groups = GroupTable::seeded(existing);
        debug!(count = groups.len(), "Loaded existing groups");

        for record in records {
            let users = self.fetch_all_users(domain, report).await?;
            let user = users
                .iter()
                .find(|u| u.email == record.email)
                .ok_or_else(|| MigrationError::UserNotFound {
                    email: record.email.clone(),
                })?;
            debug!("Found user {}", record.email);

            let missing = missing_groups(&record.groups, user.group_names());
            if missing.is_empty() {
                info!("User {} is already a member of all the groups specified", record.email);
                report.users_unchanged += 1;
                continue;
            }
            info!("Adding user {} to the following groups: {:?}", record.email, missing);

            for group in missing {
                debug!("Looking for group {}", group);
                let group_id = self.ensure_group(&mut groups, domain, group, report).await?;
                self.add_user_to_group(&group_id, &user.id, report).await?;
            }
        }

        Ok(())
    }
}
