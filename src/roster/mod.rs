//! TSV roster handling
//!
//! The roster is the tab-separated user list that drives a run:
//!
//! ```text
//! Name	Email	User type	Groups
//! Alice	alice@example.com	BASIC_USER_TIER	Admins,Observers
//! ```
//!
//! Rows are validated one at a time. A bad row is logged and skipped; it never
//! reaches the migration phase.

mod export;

pub use export::write_roster;

use crate::error::{RosterError, ValidationError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

pub const COLUMN_NAME: &str = "Name";
pub const COLUMN_EMAIL: &str = "Email";
pub const COLUMN_USER_TYPE: &str = "User type";
pub const COLUMN_GROUPS: &str = "Groups";

/// Header columns, in the order the roster is written.
pub const COLUMNS: [&str; 4] = [COLUMN_NAME, COLUMN_EMAIL, COLUMN_USER_TYPE, COLUMN_GROUPS];

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,7}$")
            .expect("email pattern is valid")
    })
}

/// Returns true when the whole string is a syntactically valid address.
pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// Platform user tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserType {
    BasicUserTier,
    CoreUserTier,
    FullUserTier,
}

impl UserType {
    /// The enum token NerdGraph expects in `userType:`.
    pub fn as_token(&self) -> &'static str {
        match self {
            UserType::BasicUserTier => "BASIC_USER_TIER",
            UserType::CoreUserTier => "CORE_USER_TIER",
            UserType::FullUserTier => "FULL_USER_TIER",
        }
    }

    /// Parse a roster value, case-insensitively.
    ///
    /// Accepts the API tokens as well as the display names the platform
    /// reports for a user's type (`Basic`, `Core`, `Full platform`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "BASIC_USER_TIER" | "BASIC" => Some(UserType::BasicUserTier),
            "CORE_USER_TIER" | "CORE" => Some(UserType::CoreUserTier),
            "FULL_USER_TIER" | "FULL PLATFORM" => Some(UserType::FullUserTier),
            _ => None,
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// One validated roster row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub name: String,
    pub email: String,
    pub user_type: UserType,
    /// Group display names, in roster order.
    pub groups: Vec<String>,
}

/// Result of parsing a roster file.
#[derive(Debug, Default)]
pub struct Roster {
    pub records: Vec<UserRecord>,
    /// `(line, reason)` for every skipped row.
    pub rejected: Vec<(u64, ValidationError)>,
}

/// Split a comma-separated groups column, trimming names and dropping blanks.
pub fn split_groups(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validate a row keyed by header name.
///
/// Checks run in a fixed order: columns present, email, user type, then
/// non-empty name and groups. The first failure is reported.
pub fn validate_row(row: &HashMap<String, String>) -> Result<UserRecord, ValidationError> {
    let field = |column: &str| {
        row.get(column)
            .map(|v| v.trim())
            .ok_or_else(|| ValidationError::MissingColumn {
                column: column.to_string(),
            })
    };

    let name = field(COLUMN_NAME)?;
    let email = field(COLUMN_EMAIL)?;
    let user_type = field(COLUMN_USER_TYPE)?;
    let groups = field(COLUMN_GROUPS)?;

    if !is_valid_email(email) {
        return Err(ValidationError::InvalidEmail);
    }
    let user_type = UserType::parse(user_type).ok_or(ValidationError::InvalidUserType)?;

    let groups = split_groups(groups);
    if name.is_empty() || groups.is_empty() {
        return Err(ValidationError::EmptyNameOrGroups);
    }

    Ok(UserRecord {
        name: name.to_string(),
        email: email.to_string(),
        user_type,
        groups,
    })
}

/// Parse a roster from any reader.
pub fn parse_reader<R: std::io::Read>(reader: R, source: &str) -> Result<Roster, RosterError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(reader);

    let read_err = |source_err: csv::Error| RosterError::Read {
        path: source.to_string(),
        source: source_err,
    };

    let headers = reader.headers().map_err(read_err)?.clone();
    let mut roster = Roster::default();

    for result in reader.records() {
        let record = result.map_err(read_err)?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let row: HashMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();

        match validate_row(&row) {
            Ok(user) => {
                debug!(line, email = %user.email, "Accepted roster row");
                roster.records.push(user);
            }
            Err(reason) => {
                warn!("Ignored line: {}. Reason: {}", line, reason);
                roster.rejected.push((line, reason));
            }
        }
    }

    Ok(roster)
}

/// Parse the roster at `path`.
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Roster, RosterError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| RosterError::Read {
        path: path.display().to_string(),
        source: e.into(),
    })?;
    parse_reader(file, &path.display().to_string())
}
