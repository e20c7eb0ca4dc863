//! Scripted NerdGraph transport for orchestrator tests.
//!
//! Answers each request according to the operation in the query text and
//! records every query it was sent, so tests can count and inspect calls.

#![allow(dead_code)]

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Duration;
use usermig::migration::{MigrationSettings, RunMode, RunOptions};
use usermig::nerdgraph::{NerdGraphTransport, RawReply, TransportFailure};

pub const CREATE_USER: &str = "userManagementCreateUser(";
pub const CREATE_GROUP: &str = "userManagementCreateGroup(";
pub const ADD_TO_GROUP: &str = "userManagementAddUsersToGroups(";
pub const GRANT_ROLE: &str = "authorizationManagementGrantAccess(";
pub const LIST_ROLES: &str = "authorizationManagement {";
pub const LIST_USERS: &str = "nextCursor";
pub const LIST_GROUPS: &str = "userManagement { authenticationDomains";

#[derive(Default)]
struct State {
    sent: Vec<String>,
    created_users: usize,
    role_groups: Value,
    groups: Value,
    user_pages: Vec<Value>,
    overrides: Vec<(String, RawReply)>,
}

pub struct ScriptedTransport {
    state: Mutex<State>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                role_groups: json!([]),
                groups: json!([]),
                user_pages: vec![json!([])],
                ..State::default()
            }),
        }
    }

    /// Groups (with nested roles) returned by ListRoles.
    pub fn with_role_groups(self, role_groups: Value) -> Self {
        self.state.lock().unwrap().role_groups = role_groups;
        self
    }

    /// Groups returned by ListGroups.
    pub fn with_groups(self, groups: Value) -> Self {
        self.state.lock().unwrap().groups = groups;
        self
    }

    /// Users returned by ListUsers, one array per page.
    pub fn with_user_pages(self, pages: Vec<Value>) -> Self {
        self.state.lock().unwrap().user_pages = pages;
        self
    }

    /// Reply with `reply` to every query containing `marker`.
    pub fn replying(self, marker: &str, reply: RawReply) -> Self {
        self.state
            .lock()
            .unwrap()
            .overrides
            .push((marker.to_string(), reply));
        self
    }

    pub fn sent(&self) -> Vec<String> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Queries sent for the operation identified by `marker`.
    pub fn calls(&self, marker: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|q| operation_of(q) == marker)
            .collect()
    }
}

fn operation_of(query: &str) -> &'static str {
    [CREATE_USER, CREATE_GROUP, ADD_TO_GROUP, GRANT_ROLE, LIST_ROLES, LIST_USERS]
        .into_iter()
        .find(|marker| query.contains(marker))
        .unwrap_or(LIST_GROUPS)
}

fn capture(query: &str, pattern: &str) -> String {
    Regex::new(pattern)
        .unwrap()
        .captures(query)
        .map(|c| c[1].to_string())
        .unwrap_or_default()
}

fn domain_list(section: &str, payload: Value) -> Value {
    json!({ "data": { "actor": { "organization": { section: {
        "authenticationDomains": { "authenticationDomains": [ payload ] }
    } } } } })
}

#[async_trait]
impl NerdGraphTransport for ScriptedTransport {
    async fn post(&self, _api_key: &str, body: &Value) -> Result<RawReply, TransportFailure> {
        let query = body["query"].as_str().unwrap_or_default().to_string();
        let mut state = self.state.lock().unwrap();
        state.sent.push(query.clone());

        if let Some((_, reply)) = state.overrides.iter().find(|(m, _)| query.contains(m.as_str())) {
            return Ok(reply.clone());
        }

        let response = match operation_of(&query) {
            CREATE_USER => {
                state.created_users += 1;
                let email = capture(&query, r#"email: "([^"]*)""#);
                json!({ "data": { "userManagementCreateUser": {
                    "createdUser": { "id": format!("user-{}", state.created_users), "email": email }
                } } })
            }
            CREATE_GROUP => {
                let name = capture(&query, r#"displayName: "([^"]*)""#);
                json!({ "data": { "userManagementCreateGroup": {
                    "group": { "id": format!("grp-{}", name), "displayName": name }
                } } })
            }
            ADD_TO_GROUP => json!({ "data": { "userManagementAddUsersToGroups": { "groups": [] } } }),
            GRANT_ROLE => json!({ "data": { "authorizationManagementGrantAccess": { "roles": [] } } }),
            LIST_ROLES => domain_list(
                "authorizationManagement",
                json!({ "groups": { "groups": state.role_groups } }),
            ),
            LIST_USERS => {
                let page: usize = capture(&query, r#"cursor: "page-(\d+)""#).parse().unwrap_or(0);
                let next = if page + 1 < state.user_pages.len() {
                    json!(format!("page-{}", page + 1))
                } else {
                    Value::Null
                };
                domain_list(
                    "userManagement",
                    json!({ "users": { "users": state.user_pages[page], "nextCursor": next } }),
                )
            }
            _ => domain_list("userManagement", json!({ "groups": { "groups": state.groups } })),
        };

        Ok(RawReply::ok(response.to_string()))
    }
}

/// `(group_id, user_id)` of an AddUserToGroup query.
pub fn membership(query: &str) -> (String, String) {
    (
        capture(query, r#"groupIds: \["([^"]*)"\]"#),
        capture(query, r#"userIds: \["([^"]*)"\]"#),
    )
}

pub fn captured(query: &str, pattern: &str) -> String {
    capture(query, pattern)
}

pub fn settings() -> MigrationSettings {
    MigrationSettings {
        api_key: "NRAK-TEST".into(),
        source_domain_id: Some("src-domain".into()),
        destination_domain_id: Some("dst-domain".into()),
    }
}

pub fn options(mode: RunMode) -> RunOptions {
    RunOptions {
        dry_run: false,
        mode,
        confirm_delay: Duration::ZERO,
    }
}

pub fn user(id: &str, name: &str, email: &str, groups: &[(&str, &str)]) -> Value {
    json!({
        "id": id,
        "name": name,
        "email": email,
        "type": { "displayName": "Basic", "id": "0" },
        "groups": { "groups": groups
            .iter()
            .map(|(id, name)| json!({ "id": id, "displayName": name }))
            .collect::<Vec<_>>() }
    })
}
