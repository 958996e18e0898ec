//! 任务生命周期事件
//!
//! 由外部任务执行引擎产生，交给 JobMonitor 持久化或记录。

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    Queued,
    Started,
    Completed,
    Failed,
    RetryRequested,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobEvent {
    pub kind: JobEventKind,
    pub job_id: String,
    #[serde(default)]
    pub queue: Option<String>,
    /// 任务负载描述（显示名、类名、重试次数等）
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl JobEvent {
    /// 从引擎输出的一行解析事件，非事件行返回None
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with('{') {
            return None;
        }
        serde_json::from_str(line).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_line() {
        let event = JobEvent::parse_line(
            r#"{"kind":"completed","job_id":"42","queue":"emails","payload":{"displayName":"SendMail"}}"#,
        )
        .unwrap();
        assert_eq!(event.kind, JobEventKind::Completed);
        assert_eq!(event.job_id, "42");
        assert_eq!(event.queue.as_deref(), Some("emails"));
    }

    #[test]
    fn test_parse_non_event_line() {
        assert!(JobEvent::parse_line("Processing: App\\Jobs\\SendMail").is_none());
        assert!(JobEvent::parse_line(r#"{"unrelated": true}"#).is_none());
    }
}
