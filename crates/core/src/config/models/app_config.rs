use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::{
    database::DatabaseConfig, observability::ObservabilityConfig, redis::RedisConfig,
    supervisor::SupervisorConfig, worker::WorkerRuntimeConfig,
};
use crate::errors::WatchtowerError;
use crate::WatchtowerResult;

/// System configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub worker: WorkerRuntimeConfig,
    pub supervisors: HashMap<String, SupervisorConfig>,
    pub observability: ObservabilityConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut supervisors = HashMap::new();
        supervisors.insert("default".to_string(), SupervisorConfig::default());

        Self {
            database: DatabaseConfig::default(),
            redis: RedisConfig::default(),
            worker: WorkerRuntimeConfig::default(),
            supervisors,
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: WATCHTOWER, separator: `__`)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = toml::to_string(&AppConfig::default()).context("序列化默认配置失败")?;
        let mut builder =
            ConfigBuilder::builder().add_source(File::from_str(&defaults, FileFormat::Toml));

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = [
                "config/watchtower.toml",
                "watchtower.toml",
                "/etc/watchtower/config.toml",
            ];

            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("WATCHTOWER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    /// 按名称获取Supervisor配置
    pub fn supervisor(&self, name: &str) -> WatchtowerResult<&SupervisorConfig> {
        self.supervisors
            .get(name)
            .ok_or_else(|| WatchtowerError::supervisor_not_found(name))
    }

    /// Validate configuration effectiveness
    pub fn validate(&self) -> Result<()> {
        self.database.validate().context("数据库配置验证失败")?;
        self.redis.validate().context("Redis配置验证失败")?;
        self.worker.validate().context("Worker配置验证失败")?;
        for (name, supervisor) in &self.supervisors {
            supervisor
                .validate()
                .with_context(|| format!("Supervisor配置验证失败: {name}"))?;
        }
        self.observability
            .validate()
            .context("可观测性配置验证失败")?;

        Ok(())
    }
}
