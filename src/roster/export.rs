//! Roster export, the inverse of `parse_reader`.

use super::{UserRecord, COLUMNS};
use crate::error::RosterError;
use std::io::Write;

/// Write `records` as a roster that `parse_reader` accepts.
pub fn write_roster<W: Write>(writer: W, records: &[UserRecord]) -> Result<(), RosterError> {
    let mut out = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);

    out.write_record(COLUMNS)?;
    for record in records {
        out.write_record([
            record.name.as_str(),
            record.email.as_str(),
            record.user_type.as_token(),
            record.groups.join(",").as_str(),
        ])?;
    }
    out.flush().map_err(csv::Error::from)?;
    Ok(())
}
