//! usermig - New Relic authentication domain migration
//!
//! Moves users, their group memberships and the groups' role grants from one
//! authentication domain to another through the NerdGraph GraphQL API.
//!
//! ## Call chain
//! TSV roster -> validated `UserRecord`s -> `Migrator` -> `NerdGraphQuery` -> transport
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use usermig::migration::{MigrationSettings, Migrator, RunOptions};
//! use usermig::nerdgraph::HttpTransport;
//! use usermig::roster;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let roster = roster::parse_file("users.tsv")?;
//! let settings = MigrationSettings {
//!     api_key: "NRAK-...".to_string(),
//!     source_domain_id: Some("source-domain".to_string()),
//!     destination_domain_id: Some("destination-domain".to_string()),
//! };
//! let mut migrator = Migrator::new(HttpTransport::new()?, settings, RunOptions::default());
//! let report = migrator.run(&roster.records).await?;
//! println!("{} users created", report.users_created);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod migration;
pub mod nerdgraph;
pub mod roster;

pub use config::UserMigConfig;
pub use error::{ApiError, MigrationError, ValidationError};
pub use migration::{Migrator, RunMode, RunOptions, RunPhase, RunReport};
pub use nerdgraph::{HttpTransport, NerdGraphQuery, NerdGraphTransport};
pub use roster::{Roster, UserRecord, UserType};
