pub mod device;
pub mod notification;
pub mod snapshot;
pub mod sync_entry;

pub use device::*;
pub use notification::*;
pub use snapshot::*;
pub use sync_entry::*;

use chrono::{DateTime, Utc};

/// 解析数据库中的 RFC3339 时间戳
pub(crate) fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
