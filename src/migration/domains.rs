//! Domain-to-domain migration: users, groups, memberships, then role replay.

use super::{GroupTable, Migrator, RunReport};
use crate::error::Result;
use crate::nerdgraph::{extract, NerdGraphQuery, NerdGraphTransport, RoleGroup, CREATED_USER_ID, DOMAIN_ROLE_GROUPS};
use crate::roster::UserRecord;
use tracing::{debug, info};

impl<T: NerdGraphTransport> Migrator<T> {
    /// Recreate `records` in the destination domain, then copy the source
    /// domain's role grants onto the groups created here.
    pub(super) async fn migrate_domains(&self, records: &[UserRecord], report: &mut RunReport) -> Result<()> {
        let destination = self.settings.destination_domain()?;
        let source = self.settings.source_domain()?;
        info!("Duplicating users in the target auth domain [{}]...", destination);

        let mut groups = GroupTable::new();

        for record in records {
            debug!("Adding user {}", record.email);
            let query = NerdGraphQuery::CreateUser {
                email: record.email.clone(),
                name: record.name.clone(),
                user_type: record.user_type,
                auth_domain_id: destination.to_string(),
            };
            let response = self.send(&query, report).await?;
            let user_id: String = extract(query.name(), &response, CREATED_USER_ID)?;
            report.users_created += 1;

            for group in &record.groups {
                let group_id = self.ensure_group(&mut groups, destination, group, report).await?;
                self.add_user_to_group(&group_id, &user_id, report).await?;
            }
        }

        self.replay_roles(source, &groups, report).await
    }

    /// Grant every role held by a source group to the destination group of the
    /// same display name. Source groups not created in this run are skipped.
    async fn replay_roles(&self, source: &str, groups: &GroupTable, report: &mut RunReport) -> Result<()> {
        let query = NerdGraphQuery::ListRoles {
            auth_domain_id: source.to_string(),
        };
        let response = self.send(&query, report).await?;
        let role_groups: Vec<RoleGroup> = extract(query.name(), &response, DOMAIN_ROLE_GROUPS)?;

        for role_group in role_groups {
            let Some(group_id) = groups.get(&role_group.display_name) else {
                debug!("Group {} was not migrated, skipping its roles", role_group.display_name);
                continue;
            };

            for role in role_group.roles.roles {
                debug!(
                    "Assigning {} ({}) Role {} AccountId {:?}",
                    role_group.display_name, group_id, role.role_id, role.account_id
                );
                let grant = NerdGraphQuery::GrantRole {
                    group_id: group_id.to_string(),
                    role_id: role.role_id,
                    account_id: role.account_id,
                };
                self.send(&grant, report).await?;
                report.roles_granted += 1;
            }
        }

        Ok(())
    }
}
