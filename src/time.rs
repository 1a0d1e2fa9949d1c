//! Wall-clock helpers.

use chrono::{DateTime, Utc};

/// The current wall-clock time.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Whole milliseconds elapsed from `earlier` to `later`.
///
/// Negative when `later` is before `earlier`. Sub-millisecond differences
/// truncate toward zero.
pub fn millis_between(earlier: &DateTime<Utc>, later: &DateTime<Utc>) -> i64 {
    later.signed_duration_since(*earlier).num_milliseconds()
}
