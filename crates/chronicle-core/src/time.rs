// crates/chronicle-core/src/time.rs
//
// STAMP time values: epoch milliseconds, with reserved sentinels.

use chrono::{NaiveDate, TimeZone, Utc};

use crate::error::ChronicleError;

/// Time of a version that has not been committed yet. Sorts after every real time.
pub const UNCOMMITTED_TIME: i64 = i64::MAX;

/// Time of bootstrap data that predates every release.
pub const PREMUNDANE_TIME: i64 = i64::MIN + 1;

/// Parse an RF2 `effectiveTime` (`YYYYMMDD`) to epoch milliseconds at UTC midnight.
pub fn parse_effective_time(raw: &str) -> Result<i64, ChronicleError> {
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ChronicleError::MalformedRow(format!(
            "effectiveTime '{}' is not YYYYMMDD",
            raw
        )));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y%m%d").map_err(|e| {
        ChronicleError::MalformedRow(format!("effectiveTime '{}': {}", raw, e))
    })?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ChronicleError::MalformedRow(format!("effectiveTime '{}'", raw)))?;
    Ok(Utc.from_utc_datetime(&midnight).timestamp_millis())
}
