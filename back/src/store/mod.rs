//! Data-access functions.
//!
//! Every function takes the caller's connection, which may be a plain pool
//! connection or an open transaction. Absence is reported as `Ok(None)`.

pub mod tag;
pub mod todo;

use chrono::{DateTime, Utc};

/// Timestamp for a mutation. Never earlier than the previous `updated_at`.
fn touched(previous: DateTime<Utc>) -> DateTime<Utc> {
    Utc::now().max(previous)
}
