use thiserror::Error;

/// 监管系统错误类型定义
#[derive(Debug, Error)]
pub enum WatchtowerError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("控制通道错误: {0}")]
    ControlChannel(String),

    #[error("Worker未找到: {id}")]
    WorkerNotFound { id: String },

    #[error("Worker状态不允许该操作: {id} 当前为 {status}")]
    InvalidWorkerState { id: String, status: String },

    #[error("Supervisor配置未找到: {name}")]
    SupervisorNotFound { name: String },

    #[error("无效的控制命令: {0}")]
    InvalidCommand(String),

    #[error("进程启动失败: {0}")]
    ProcessSpawn(String),

    #[error("任务执行错误: {0}")]
    JobExecution(String),

    #[error("任务执行超时")]
    ExecutionTimeout,

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl WatchtowerError {
    pub fn worker_not_found<S: Into<String>>(id: S) -> Self {
        Self::WorkerNotFound { id: id.into() }
    }
    pub fn invalid_worker_state<S: Into<String>, T: Into<String>>(id: S, status: T) -> Self {
        Self::InvalidWorkerState {
            id: id.into(),
            status: status.into(),
        }
    }
    pub fn supervisor_not_found<S: Into<String>>(name: S) -> Self {
        Self::SupervisorNotFound { name: name.into() }
    }
    pub fn control_channel<S: Into<String>>(msg: S) -> Self {
        Self::ControlChannel(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn job_execution<S: Into<String>>(msg: S) -> Self {
        Self::JobExecution(msg.into())
    }

    /// 是否为可自愈的瞬时错误（下一个轮询周期重试即可）
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            WatchtowerError::Database(_)
                | WatchtowerError::ControlChannel(_)
                | WatchtowerError::JobExecution(_)
                | WatchtowerError::ExecutionTimeout
        )
    }
}

impl From<redis::RedisError> for WatchtowerError {
    fn from(e: redis::RedisError) -> Self {
        WatchtowerError::ControlChannel(e.to_string())
    }
}

impl From<serde_json::Error> for WatchtowerError {
    fn from(e: serde_json::Error) -> Self {
        WatchtowerError::Serialization(e.to_string())
    }
}
