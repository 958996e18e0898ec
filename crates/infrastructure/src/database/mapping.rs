//! 注册表行与领域类型之间的转换
//!
//! 时间戳以毫秒级Unix时间存为INTEGER，保证按数值比较心跳的先后。

use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use watchtower_core::{WatchtowerError, WatchtowerResult};
use watchtower_domain::{WorkerRecord, WorkerStatus};

pub struct MappingHelpers;

impl MappingHelpers {
    pub fn to_millis(at: DateTime<Utc>) -> i64 {
        at.timestamp_millis()
    }

    pub fn from_millis(millis: i64) -> WatchtowerResult<DateTime<Utc>> {
        Utc.timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| WatchtowerError::Serialization(format!("无效的时间戳: {millis}")))
    }

    pub fn pid_to_db(pid: Option<u32>) -> Option<i64> {
        pid.map(i64::from)
    }

    pub fn pid_from_db(pid: Option<i64>) -> WatchtowerResult<Option<u32>> {
        pid.map(|value| {
            u32::try_from(value)
                .map_err(|_| WatchtowerError::Serialization(format!("无效的进程ID: {value}")))
        })
        .transpose()
    }

    pub fn row_to_worker_record(row: &SqliteRow) -> WatchtowerResult<WorkerRecord> {
        let status: String = row.try_get("status")?;
        let started_at: i64 = row.try_get("started_at")?;
        let last_heartbeat: Option<i64> = row.try_get("last_heartbeat")?;

        Ok(WorkerRecord {
            worker_id: row.try_get("worker_id")?,
            supervisor: row.try_get("supervisor")?,
            queue: row.try_get("queue")?,
            pid: Self::pid_from_db(row.try_get("pid")?)?,
            status: status.parse::<WorkerStatus>()?,
            started_at: Self::from_millis(started_at)?,
            last_heartbeat: last_heartbeat.map(Self::from_millis).transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_conversion() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let millis = MappingHelpers::to_millis(at);
        assert_eq!(millis, 1_700_000_000_123);
        assert_eq!(MappingHelpers::from_millis(millis).unwrap(), at);
    }

    #[test]
    fn test_pid_conversion() {
        assert_eq!(MappingHelpers::pid_to_db(None), None);
        assert_eq!(MappingHelpers::pid_from_db(Some(4242)).unwrap(), Some(4242));
        assert!(MappingHelpers::pid_from_db(Some(-1)).is_err());
    }
}
