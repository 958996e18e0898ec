//! 控制命令与控制通道键布局

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use watchtower_core::{WatchtowerError, WatchtowerResult};

use crate::ports::ControlChannel;

/// 发给单个Worker的控制命令
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ControlCommand {
    Stop,
    Pause,
    Resume,
    Restart,
    Terminate,
}

impl ControlCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlCommand::Stop => "stop",
            ControlCommand::Pause => "pause",
            ControlCommand::Resume => "resume",
            ControlCommand::Restart => "restart",
            ControlCommand::Terminate => "terminate",
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlCommand {
    type Err = WatchtowerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "stop" => Ok(ControlCommand::Stop),
            "pause" => Ok(ControlCommand::Pause),
            "resume" => Ok(ControlCommand::Resume),
            "restart" => Ok(ControlCommand::Restart),
            "terminate" => Ok(ControlCommand::Terminate),
            other => Err(WatchtowerError::InvalidCommand(other.to_string())),
        }
    }
}

/// 控制通道中的键布局
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlKeys {
    prefix: String,
}

impl Default for ControlKeys {
    fn default() -> Self {
        Self::new("watchtower")
    }
}

impl ControlKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn command_key(&self, worker_id: &str) -> String {
        format!("{}:worker:{}:command", self.prefix, worker_id)
    }

    pub fn terminate_key(&self) -> String {
        format!("{}:terminate", self.prefix)
    }

    pub fn restart_at_key(&self) -> String {
        format!("{}:restart_at", self.prefix)
    }
}

/// 基于控制通道的类型化邮箱
///
/// 每个Worker一个槽位，后写覆盖先写；命令带过期时间。
#[derive(Clone)]
pub struct CommandMailbox {
    channel: Arc<dyn ControlChannel>,
    keys: ControlKeys,
    command_ttl: Duration,
}

impl CommandMailbox {
    pub fn new(channel: Arc<dyn ControlChannel>, keys: ControlKeys, command_ttl: Duration) -> Self {
        Self {
            channel,
            keys,
            command_ttl,
        }
    }

    pub fn keys(&self) -> &ControlKeys {
        &self.keys
    }

    pub async fn send(&self, worker_id: &str, command: ControlCommand) -> WatchtowerResult<()> {
        self.channel
            .set(
                &self.keys.command_key(worker_id),
                command.as_str(),
                Some(self.command_ttl),
            )
            .await
    }

    /// 取出并清空该Worker的命令槽
    ///
    /// 无法识别的命令同样会被消费，并以 InvalidCommand 返回。
    pub async fn take(&self, worker_id: &str) -> WatchtowerResult<Option<ControlCommand>> {
        match self.channel.take(&self.keys.command_key(worker_id)).await? {
            Some(token) => token.parse().map(Some),
            None => Ok(None),
        }
    }

    pub async fn peek(&self, worker_id: &str) -> WatchtowerResult<Option<ControlCommand>> {
        match self.channel.get(&self.keys.command_key(worker_id)).await? {
            Some(token) => token.parse().map(Some),
            None => Ok(None),
        }
    }

    pub async fn clear(&self, worker_id: &str) -> WatchtowerResult<()> {
        self.channel.delete(&self.keys.command_key(worker_id)).await
    }

    /// 设置全局终止标志
    pub async fn request_terminate(&self) -> WatchtowerResult<()> {
        self.channel.set(&self.keys.terminate_key(), "1", None).await
    }

    /// 消费全局终止标志，存在时返回true
    pub async fn take_terminate(&self) -> WatchtowerResult<bool> {
        Ok(self.channel.take(&self.keys.terminate_key()).await?.is_some())
    }

    pub async fn set_restart_at(&self, at: DateTime<Utc>) -> WatchtowerResult<()> {
        self.channel
            .set(&self.keys.restart_at_key(), &at.timestamp().to_string(), None)
            .await
    }

    pub async fn restart_at(&self) -> WatchtowerResult<Option<DateTime<Utc>>> {
        let value = self.channel.get(&self.keys.restart_at_key()).await?;
        Ok(value
            .and_then(|v| v.trim().parse::<i64>().ok())
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single()))
    }
}
