use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{debug, error};
use watchtower_core::{RedisConfig, WatchtowerError, WatchtowerResult};

/// 建立带自动重连的Redis连接并做一次PING检查
pub async fn connect_redis(config: &RedisConfig) -> WatchtowerResult<ConnectionManager> {
    let client = Client::open(config.build_url()).map_err(|e| {
        WatchtowerError::control_channel(format!("Failed to create Redis client: {e}"))
    })?;

    let mut manager = ConnectionManager::new(client).await.map_err(|e| {
        WatchtowerError::control_channel(format!(
            "Failed to connect to Redis at {}:{}: {e}",
            config.host, config.port
        ))
    })?;

    let response: String = redis::cmd("PING")
        .query_async(&mut manager)
        .await
        .map_err(|e| {
            error!("Redis PING failed: {}", e);
            WatchtowerError::control_channel(format!("Redis PING failed: {e}"))
        })?;

    if response != "PONG" {
        let error_msg = format!("Unexpected PING response: {response}");
        error!("{}", error_msg);
        return Err(WatchtowerError::control_channel(error_msg));
    }

    debug!(
        "Successfully connected to Redis at {}:{}",
        config.host, config.port
    );
    Ok(manager)
}
