pub(crate) mod backup;
pub(crate) mod health;
pub(crate) mod restore;
pub(crate) mod snapshot;
pub(crate) mod watch;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub(crate) fn timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.to_string())
}
