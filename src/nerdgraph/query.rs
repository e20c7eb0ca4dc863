//! NerdGraph query objects
//!
//! Each variant of `NerdGraphQuery` is one GraphQL operation. A query is
//! built from its parameters once and then rendered and executed as often as
//! needed; it never changes after construction.

use super::client::NerdGraphTransport;
use super::template::{escape_graphql_string, render, single_line};
use crate::error::ApiError;
use crate::roster::UserType;
use serde_json::{json, Value};
use tracing::{debug, info};

const LIST_USERS: &str = r#"{
  actor {
    organization {
      userManagement {
        authenticationDomains(id: "{{auth_domain_id}}") {
          authenticationDomains {
            users{{{cursor_clause}}} {
              users {
                id
                name
                email
                timeZone
                emailVerificationState
                type {
                  displayName
                  id
                }
                groups {
                  groups {
                    id
                    displayName
                  }
                }
              }
              nextCursor
            }
          }
        }
      }
    }
  }
}"#;

const LIST_GROUPS: &str = r#"{
  actor {
    organization {
      userManagement {
        authenticationDomains(id: "{{auth_domain_id}}") {
          authenticationDomains {
            groups {
              groups {
                id
                displayName
              }
            }
          }
        }
      }
    }
  }
}"#;

const LIST_ROLES: &str = r#"{
  actor {
    organization {
      authorizationManagement {
        authenticationDomains(id: "{{auth_domain_id}}") {
          authenticationDomains {
            groups {
              groups {
                id
                displayName
                roles {
                  roles {
                    id
                    roleId
                    name
                    type
                    accountId
                  }
                }
              }
            }
          }
        }
      }
    }
  }
}"#;

const CREATE_USER: &str = r#"mutation {
  userManagementCreateUser(createUserOptions: {authenticationDomainId: "{{auth_domain_id}}", userType: {{user_type}}, email: "{{email}}", name: "{{name}}"}) {
    createdUser {
      id
      email
    }
  }
}"#;

const CREATE_GROUP: &str = r#"mutation {
  userManagementCreateGroup(createGroupOptions: {authenticationDomainId: "{{auth_domain_id}}", displayName: "{{group_name}}"}) {
    group {
      id
      displayName
    }
  }
}"#;

const ADD_USER_TO_GROUP: &str = r#"mutation {
  userManagementAddUsersToGroups(addUsersToGroupsOptions: {groupIds: ["{{group_id}}"], userIds: ["{{user_id}}"]}) {
    groups {
      id
      displayName
    }
  }
}"#;

const GRANT_ACCOUNT_ROLE: &str = r#"mutation {
  authorizationManagementGrantAccess(grantAccessOptions: {groupId: "{{group_id}}", accountAccessGrants: {accountId: {{account_id}}, roleId: "{{role_id}}"}}) {
    roles {
      displayName
      accountId
    }
  }
}"#;

const GRANT_ORGANIZATION_ROLE: &str = r#"mutation {
  authorizationManagementGrantAccess(grantAccessOptions: {groupId: "{{group_id}}", organizationAccessGrants: {roleId: "{{role_id}}"}}) {
    roles {
      displayName
      accountId
    }
  }
}"#;

/// One NerdGraph operation with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NerdGraphQuery {
    /// One page of a domain's users; `cursor` selects a later page.
    ListUsers {
        auth_domain_id: String,
        cursor: Option<String>,
    },
    ListGroups {
        auth_domain_id: String,
    },
    /// Groups of a domain with their role grants.
    ListRoles {
        auth_domain_id: String,
    },
    CreateUser {
        email: String,
        name: String,
        user_type: UserType,
        auth_domain_id: String,
    },
    CreateGroup {
        auth_domain_id: String,
        group_name: String,
    },
    AddUserToGroup {
        group_id: String,
        user_id: String,
    },
    /// Grant `role_id` to a group, on one account or, when `account_id` is
    /// absent, organization-wide.
    GrantRole {
        group_id: String,
        role_id: String,
        account_id: Option<i64>,
    },
}

impl NerdGraphQuery {
    /// Stable operation name for logs and error attribution.
    pub fn name(&self) -> &'static str {
        match self {
            NerdGraphQuery::ListUsers { .. } => "ListUsers",
            NerdGraphQuery::ListGroups { .. } => "ListGroups",
            NerdGraphQuery::ListRoles { .. } => "ListRoles",
            NerdGraphQuery::CreateUser { .. } => "CreateUser",
            NerdGraphQuery::CreateGroup { .. } => "CreateGroup",
            NerdGraphQuery::AddUserToGroup { .. } => "AddUserToGroup",
            NerdGraphQuery::GrantRole { .. } => "GrantRole",
        }
    }

    /// True for operations that change state on the server.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            NerdGraphQuery::CreateUser { .. }
                | NerdGraphQuery::CreateGroup { .. }
                | NerdGraphQuery::AddUserToGroup { .. }
                | NerdGraphQuery::GrantRole { .. }
        )
    }

    fn template(&self) -> &'static str {
        match self {
            NerdGraphQuery::ListUsers { .. } => LIST_USERS,
            NerdGraphQuery::ListGroups { .. } => LIST_GROUPS,
            NerdGraphQuery::ListRoles { .. } => LIST_ROLES,
            NerdGraphQuery::CreateUser { .. } => CREATE_USER,
            NerdGraphQuery::CreateGroup { .. } => CREATE_GROUP,
            NerdGraphQuery::AddUserToGroup { .. } => ADD_USER_TO_GROUP,
            NerdGraphQuery::GrantRole {
                account_id: Some(_),
                ..
            } => GRANT_ACCOUNT_ROLE,
            NerdGraphQuery::GrantRole {
                account_id: None, ..
            } => GRANT_ORGANIZATION_ROLE,
        }
    }

    /// Required string parameters, checked for blanks before rendering.
    fn required(&self) -> Vec<(&'static str, &str)> {
        match self {
            NerdGraphQuery::ListUsers { auth_domain_id, .. }
            | NerdGraphQuery::ListGroups { auth_domain_id }
            | NerdGraphQuery::ListRoles { auth_domain_id } => {
                vec![("auth_domain_id", auth_domain_id.as_str())]
            }
            NerdGraphQuery::CreateUser {
                email,
                name,
                auth_domain_id,
                ..
            } => vec![
                ("email", email.as_str()),
                ("name", name.as_str()),
                ("auth_domain_id", auth_domain_id.as_str()),
            ],
            NerdGraphQuery::CreateGroup {
                auth_domain_id,
                group_name,
            } => vec![
                ("auth_domain_id", auth_domain_id.as_str()),
                ("group_name", group_name.as_str()),
            ],
            NerdGraphQuery::AddUserToGroup { group_id, user_id } => {
                vec![("group_id", group_id.as_str()), ("user_id", user_id.as_str())]
            }
            NerdGraphQuery::GrantRole {
                group_id, role_id, ..
            } => vec![("group_id", group_id.as_str()), ("role_id", role_id.as_str())],
        }
    }

    fn params(&self) -> Value {
        match self {
            NerdGraphQuery::ListUsers {
                auth_domain_id,
                cursor,
            } => {
                let cursor_clause = cursor
                    .as_deref()
                    .map(|c| format!("(cursor: \"{}\")", escape_graphql_string(c)))
                    .unwrap_or_default();
                json!({ "auth_domain_id": auth_domain_id, "cursor_clause": cursor_clause })
            }
            NerdGraphQuery::ListGroups { auth_domain_id }
            | NerdGraphQuery::ListRoles { auth_domain_id } => {
                json!({ "auth_domain_id": auth_domain_id })
            }
            NerdGraphQuery::CreateUser {
                email,
                name,
                user_type,
                auth_domain_id,
            } => json!({
                "email": email,
                "name": name,
                "user_type": user_type.as_token(),
                "auth_domain_id": auth_domain_id,
            }),
            NerdGraphQuery::CreateGroup {
                auth_domain_id,
                group_name,
            } => json!({ "auth_domain_id": auth_domain_id, "group_name": group_name }),
            NerdGraphQuery::AddUserToGroup { group_id, user_id } => {
                json!({ "group_id": group_id, "user_id": user_id })
            }
            NerdGraphQuery::GrantRole {
                group_id,
                role_id,
                account_id,
            } => {
                let mut params = json!({ "group_id": group_id, "role_id": role_id });
                if let Some(account_id) = account_id {
                    params["account_id"] = json!(account_id);
                }
                params
            }
        }
    }

    /// Render the GraphQL document.
    pub fn build_query(&self) -> Result<String, ApiError> {
        if let Some((param, _)) = self.required().into_iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(ApiError::MalformedQuery {
                operation: self.name().to_string(),
                reason: format!("required parameter {} is empty", param),
            });
        }
        render(self.name(), self.template(), &self.params())
    }

    /// The JSON request body: the document collapsed onto one line.
    pub fn request_body(&self) -> Result<Value, ApiError> {
        Ok(json!({ "query": single_line(&self.build_query()?) }))
    }

    /// Run the operation.
    ///
    /// With `dry_run` the rendered query is logged and echoed back as
    /// `{"dryRun": {"operation", "query"}}` without any network I/O.
    /// Otherwise exactly one request is sent. A reply carrying a top-level
    /// `errors` array is returned as `ApiError::GraphQl` with the full
    /// response attached.
    pub async fn execute<T>(&self, transport: &T, api_key: &str, dry_run: bool) -> Result<Value, ApiError>
    where
        T: NerdGraphTransport + ?Sized,
    {
        let operation = self.name();
        let body = self.request_body()?;

        if dry_run {
            info!(operation, query = %body["query"], "Dry run, request not sent");
            return Ok(json!({ "dryRun": { "operation": operation, "query": body["query"] } }));
        }

        debug!(operation, query = %body["query"], "Sending NerdGraph request");
        let reply = transport
            .post(api_key, &body)
            .await
            .map_err(|e| ApiError::Transport {
                operation: operation.to_string(),
                status: None,
                message: e.to_string(),
            })?;

        if !(200..300).contains(&reply.status) {
            return Err(ApiError::Transport {
                operation: operation.to_string(),
                status: Some(reply.status),
                message: reply.body.chars().take(200).collect(),
            });
        }

        let response: Value = serde_json::from_str(&reply.body).map_err(|e| ApiError::Decode {
            operation: operation.to_string(),
            message: format!(
                "{} (body: {})",
                e,
                reply.body.chars().take(200).collect::<String>()
            ),
        })?;

        if let Some(errors) = response.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                let message = errors
                    .iter()
                    .map(|e| {
                        e.get("message")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or_else(|| e.to_string())
                    })
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(ApiError::GraphQl {
                    operation: operation.to_string(),
                    message,
                    response,
                });
            }
        }

        debug!(operation, "NerdGraph request succeeded");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nerdgraph::client::{RawReply, TransportFailure};
    use std::sync::Mutex;

    /// Replies with a fixed answer and records what was sent.
    struct FixedTransport {
        reply: Result<RawReply, String>,
        sent: Mutex<Vec<(String, Value)>>,
    }

    impl FixedTransport {
        fn replying(status: u16, body: &str) -> Self {
            Self {
                reply: Ok(RawReply {
                    status,
                    body: body.to_string(),
                }),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl NerdGraphTransport for FixedTransport {
        async fn post(&self, api_key: &str, body: &Value) -> Result<RawReply, TransportFailure> {
            self.sent
                .lock()
                .unwrap()
                .push((api_key.to_string(), body.clone()));
            self.reply.clone().map_err(TransportFailure)
        }
    }

    fn add_alice() -> NerdGraphQuery {
        NerdGraphQuery::AddUserToGroup {
            group_id: "g-1".into(),
            user_id: "u-1".into(),
        }
    }

    fn wire(query: &NerdGraphQuery) -> String {
        query.request_body().unwrap()["query"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_grant_role_account_shape() {
        let query = NerdGraphQuery::GrantRole {
            group_id: "g-1".into(),
            role_id: "r-9".into(),
            account_id: Some(123),
        };
        assert_eq!(
            wire(&query),
            r#"mutation { authorizationManagementGrantAccess(grantAccessOptions: {groupId: "g-1", accountAccessGrants: {accountId: 123, roleId: "r-9"}}) { roles { displayName accountId } } }"#
        );
    }

    #[test]
    fn test_grant_role_organization_shape() {
        let query = NerdGraphQuery::GrantRole {
            group_id: "g-1".into(),
            role_id: "r-9".into(),
            account_id: None,
        };
        assert_eq!(
            wire(&query),
            r#"mutation { authorizationManagementGrantAccess(grantAccessOptions: {groupId: "g-1", organizationAccessGrants: {roleId: "r-9"}}) { roles { displayName accountId } } }"#
        );
    }

    #[test]
    fn test_create_user_document() {
        let query = NerdGraphQuery::CreateUser {
            email: "alice@x.com".into(),
            name: "Alice".into(),
            user_type: UserType::BasicUserTier,
            auth_domain_id: "dst".into(),
        };
        assert_eq!(
            wire(&query),
            r#"mutation { userManagementCreateUser(createUserOptions: {authenticationDomainId: "dst", userType: BASIC_USER_TIER, email: "alice@x.com", name: "Alice"}) { createdUser { id email } } }"#
        );
    }

    #[test]
    fn test_create_group_escapes_name() {
        let query = NerdGraphQuery::CreateGroup {
            auth_domain_id: "dst".into(),
            group_name: r#"SRE "Tier 1""#.into(),
        };
        assert!(wire(&query).contains(r#"displayName: "SRE \"Tier 1\"""#));
    }

    #[test]
    fn test_list_users_cursor() {
        let first = NerdGraphQuery::ListUsers {
            auth_domain_id: "src".into(),
            cursor: None,
        };
        assert!(wire(&first).contains("authenticationDomains { users { users {"));

        let next = NerdGraphQuery::ListUsers {
            auth_domain_id: "src".into(),
            cursor: Some("abc".into()),
        };
        assert!(wire(&next).contains(r#"users(cursor: "abc") { users {"#));
    }

    #[test]
    fn test_blank_parameter_is_malformed() {
        let query = NerdGraphQuery::AddUserToGroup {
            group_id: "".into(),
            user_id: "u-1".into(),
        };
        match query.build_query().unwrap_err() {
            ApiError::MalformedQuery { operation, reason } => {
                assert_eq!(operation, "AddUserToGroup");
                assert!(reason.contains("group_id"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_is_mutation() {
        assert!(add_alice().is_mutation());
        assert!(!NerdGraphQuery::ListRoles {
            auth_domain_id: "src".into()
        }
        .is_mutation());
    }

    #[tokio::test]
    async fn test_dry_run_sends_nothing() {
        let transport = FixedTransport::replying(200, "{}");
        let reply = add_alice().execute(&transport, "NRAK-1", true).await.unwrap();
        assert_eq!(reply["dryRun"]["operation"], "AddUserToGroup");
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_execute_posts_single_line_query() {
        let transport = FixedTransport::replying(200, r#"{"data": {}}"#);
        add_alice().execute(&transport, "NRAK-1", false).await.unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "NRAK-1");
        let query = sent[0].1["query"].as_str().unwrap();
        assert!(!query.contains('\n'));
        assert!(query.starts_with("mutation { userManagementAddUsersToGroups"));
    }

    #[tokio::test]
    async fn test_non_2xx_is_transport_error() {
        let transport = FixedTransport::replying(401, "Unauthorized");
        let err = add_alice().execute(&transport, "bad", false).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport { status: Some(401), .. }));
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let transport = FixedTransport::failing("connection refused");
        let err = add_alice().execute(&transport, "NRAK-1", false).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport { status: None, ref message, .. } if message == "connection refused"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_decode_error() {
        let transport = FixedTransport::replying(200, "<html>oops</html>");
        let err = add_alice().execute(&transport, "NRAK-1", false).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
        assert_eq!(err.operation(), "AddUserToGroup");
    }

    #[tokio::test]
    async fn test_graphql_errors_keep_response() {
        let body = r#"{"data": {"userManagementAddUsersToGroups": null}, "errors": [{"message": "Group not found"}]}"#;
        let transport = FixedTransport::replying(200, body);
        match add_alice().execute(&transport, "NRAK-1", false).await.unwrap_err() {
            ApiError::GraphQl {
                message, response, ..
            } => {
                assert_eq!(message, "Group not found");
                assert!(response["data"].is_object());
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
