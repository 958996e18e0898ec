use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::debug;
use watchtower_core::{RedisConfig, WatchtowerResult};
use watchtower_domain::ControlChannel;

use crate::redis_connection::connect_redis;

/// 基于Redis的控制通道
///
/// 命令通过 `SET key value EX ttl` 写入，过期后由Redis自动清除。
#[derive(Clone)]
pub struct RedisControlChannel {
    conn: ConnectionManager,
}

impl RedisControlChannel {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn connect(config: &RedisConfig) -> WatchtowerResult<Self> {
        Ok(Self::new(connect_redis(config).await?))
    }
}

#[async_trait]
impl ControlChannel for RedisControlChannel {
    async fn get(&self, key: &str) -> WatchtowerResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> WatchtowerResult<()> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }
        let _: () = cmd.query_async(&mut conn).await?;
        debug!("SET {} = {} (ttl: {:?})", key, value, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> WatchtowerResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> WatchtowerResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}
