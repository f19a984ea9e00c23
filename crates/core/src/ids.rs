//! Identifier and clock helpers.

use rand::Rng;
use time::OffsetDateTime;

/// Current UTC time.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Milliseconds since the Unix epoch for `at`.
pub fn unix_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

/// `<prefix>_<millis>_<6 hex>`: sortable by creation time, and unique
/// even when two ids are minted in the same millisecond.
pub fn timestamped_id(prefix: &str, at: OffsetDateTime) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..0x100_0000);
    format!("{prefix}_{}_{suffix:06x}", unix_millis(at))
}

/// A short random hex id for alerts, log entries, and snapshots.
pub fn short_id() -> String {
    let n: u64 = rand::thread_rng().gen();
    format!("{n:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamped_ids_embed_millis() {
        let at = time::macros::datetime!(2024-03-01 12:00 UTC);
        let id = timestamped_id("backup", at);
        assert!(id.starts_with(&format!("backup_{}_", unix_millis(at))));
        assert_eq!(id.rsplit('_').next().map(str::len), Some(6));
    }

    #[test]
    fn same_instant_ids_differ() {
        let at = now();
        let ids: std::collections::HashSet<_> =
            (0..50).map(|_| timestamped_id("backup", at)).collect();
        assert!(ids.len() > 45);
    }
}
