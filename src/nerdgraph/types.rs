//! NerdGraph response types
//!
//! Only the fields usermig reads are modelled. Lists come wrapped in an
//! object (`groups { groups { ... } }`), mirrored here by the `*List` types.

use crate::error::ApiError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CREATED_USER_ID: &str = "/data/userManagementCreateUser/createdUser/id";
pub const CREATED_GROUP_ID: &str = "/data/userManagementCreateGroup/group/id";
pub const DOMAIN_USERS: &str =
    "/data/actor/organization/userManagement/authenticationDomains/authenticationDomains/0/users";
pub const DOMAIN_GROUPS: &str =
    "/data/actor/organization/userManagement/authenticationDomains/authenticationDomains/0/groups/groups";
pub const DOMAIN_ROLE_GROUPS: &str = "/data/actor/organization/authorizationManagement/authenticationDomains/authenticationDomains/0/groups/groups";

/// Deserialize the value at `pointer` in `response`.
///
/// A missing or null path, or a value of the wrong shape, is reported as
/// `UnexpectedShape` for `operation`.
pub fn extract<T: DeserializeOwned>(
    operation: &str,
    response: &Value,
    pointer: &str,
) -> Result<T, ApiError> {
    let unexpected = || ApiError::UnexpectedShape {
        operation: operation.to_string(),
        path: pointer.to_string(),
    };

    let value = response
        .pointer(pointer)
        .filter(|v| !v.is_null())
        .ok_or_else(unexpected)?;

    serde_json::from_value(value.clone()).map_err(|_| unexpected())
}

/// A group reference as returned inside user and group listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupList {
    #[serde(default)]
    pub groups: Vec<GroupSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTypeInfo {
    pub display_name: String,
    #[serde(default)]
    pub id: Option<String>,
}

/// A user of an authentication domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainUser {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(rename = "type")]
    pub user_type: UserTypeInfo,
    #[serde(default)]
    pub groups: GroupList,
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub email_verification_state: Option<String>,
}

impl DomainUser {
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.groups.iter().map(|g| g.display_name.as_str())
    }
}

/// One page of a domain's users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    #[serde(default)]
    pub users: Vec<DomainUser>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// A role assigned to a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRole {
    /// Role-assignment id.
    pub id: String,
    pub role_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub role_type: Option<String>,
    /// Absent for organization-scoped roles.
    #[serde(default)]
    pub account_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleList {
    #[serde(default)]
    pub roles: Vec<GroupRole>,
}

/// A group together with its role grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleGroup {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub roles: RoleList,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_created_user_id() {
        let response = json!({
            "data": { "userManagementCreateUser": { "createdUser": { "id": "1001" } } }
        });
        let id: String = extract("CreateUser", &response, CREATED_USER_ID).unwrap();
        assert_eq!(id, "1001");
    }

    #[test]
    fn test_extract_missing_path() {
        let response = json!({ "data": { "userManagementCreateUser": null } });
        let err = extract::<String>("CreateUser", &response, CREATED_USER_ID).unwrap_err();
        match err {
            ApiError::UnexpectedShape { operation, path } => {
                assert_eq!(operation, "CreateUser");
                assert_eq!(path, CREATED_USER_ID);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_role_group_without_account() {
        let value = json!([{
            "id": "g-1",
            "displayName": "Admins",
            "roles": { "roles": [
                { "id": "ra-1", "roleId": "1254", "name": "All product admin", "type": "STANDARD", "accountId": 42 },
                { "id": "ra-2", "roleId": "1255", "name": "Organization manager", "type": "ORGANIZATION", "accountId": null }
            ] }
        }]);
        let groups: Vec<RoleGroup> = serde_json::from_value(value).unwrap();
        let roles = &groups[0].roles.roles;
        assert_eq!(roles[0].account_id, Some(42));
        assert_eq!(roles[1].account_id, None);
        assert_eq!(roles[1].role_type.as_deref(), Some("ORGANIZATION"));
    }

    #[test]
    fn test_user_page() {
        let value = json!({
            "users": [{
                "id": "u-1",
                "name": "Alice",
                "email": "alice@x.com",
                "type": { "displayName": "Basic", "id": "0" },
                "groups": { "groups": [ { "id": "g-1", "displayName": "Admins" } ] }
            }],
            "nextCursor": null
        });
        let page: UserPage = serde_json::from_value(value).unwrap();
        assert_eq!(page.next_cursor, None);
        assert_eq!(page.users[0].group_names().collect::<Vec<_>>(), vec!["Admins"]);
    }
}
