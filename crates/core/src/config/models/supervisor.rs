use std::fmt;

use serde::{Deserialize, Serialize};

/// 队列分配策略
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BalanceMode {
    /// 每个Worker处理全部队列
    #[default]
    Simple,
    /// 轮询分配，每个Worker处理一个队列
    Auto,
}

/// 队列选择器：显式列表或通配符
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQueueSelector", into = "RawQueueSelector")]
pub enum QueueSelector {
    /// `*`：自动发现当前有待处理任务的队列
    Wildcard,
    List(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawQueueSelector {
    One(String),
    Many(Vec<String>),
}

impl TryFrom<RawQueueSelector> for QueueSelector {
    type Error = String;

    fn try_from(raw: RawQueueSelector) -> Result<Self, Self::Error> {
        let names: Vec<String> = match raw {
            RawQueueSelector::One(s) => s.split(',').map(|q| q.trim().to_string()).collect(),
            RawQueueSelector::Many(v) => v.into_iter().map(|q| q.trim().to_string()).collect(),
        };
        let names: Vec<String> = names.into_iter().filter(|q| !q.is_empty()).collect();

        if names.is_empty() {
            return Err("队列配置不能为空".to_string());
        }
        if names.iter().any(|q| q == "*") {
            if names.len() > 1 {
                return Err("通配符队列 `*` 不能与其他队列混用".to_string());
            }
            return Ok(QueueSelector::Wildcard);
        }
        Ok(QueueSelector::List(names))
    }
}

impl From<QueueSelector> for RawQueueSelector {
    fn from(selector: QueueSelector) -> Self {
        match selector {
            QueueSelector::Wildcard => RawQueueSelector::One("*".to_string()),
            QueueSelector::List(names) => RawQueueSelector::Many(names),
        }
    }
}

impl fmt::Display for QueueSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueSelector::Wildcard => write!(f, "*"),
            QueueSelector::List(names) => write!(f, "{}", names.join(", ")),
        }
    }
}

fn default_connection() -> String {
    "redis".to_string()
}

/// 单个Supervisor的配置，一次运行期间不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// 队列连接名称，原样传给任务执行引擎
    #[serde(default = "default_connection")]
    pub connection: String,
    pub queue: QueueSelector,
    #[serde(default)]
    pub balance: BalanceMode,
    pub min_processes: usize,
    /// 仅读取与校验，运行期不作为上限强制执行
    pub max_processes: usize,
    pub tries: u32,
    /// 单个任务的最长执行时间（秒）
    pub timeout: u64,
    /// 内存上限（MB）
    pub memory: u64,
    /// 队列为空时的休眠时间（秒）
    pub sleep: u64,
    /// 任务之间的休息时间（秒）
    #[serde(default)]
    pub rest: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            connection: default_connection(),
            queue: QueueSelector::Wildcard,
            balance: BalanceMode::Simple,
            min_processes: 1,
            max_processes: 10,
            tries: 3,
            timeout: 60,
            memory: 128,
            sleep: 3,
            rest: 0,
        }
    }
}

impl SupervisorConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.connection.is_empty() {
            return Err(anyhow::anyhow!("队列连接名称不能为空"));
        }

        if self.max_processes < self.min_processes {
            return Err(anyhow::anyhow!(
                "最大进程数({})不能小于最小进程数({})",
                self.max_processes,
                self.min_processes
            ));
        }

        if self.timeout == 0 {
            return Err(anyhow::anyhow!("任务超时时间必须大于0"));
        }

        if self.memory == 0 {
            return Err(anyhow::anyhow!("内存上限必须大于0"));
        }

        Ok(())
    }
}
