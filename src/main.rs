use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;
use watchtower::app::{print_workers, Application};
use watchtower::cli::{apply_worker_overrides, build_cli, required_str};
use watchtower::shutdown::{wait_for_shutdown_signal, ShutdownManager};
use watchtower_core::{init_logging, AppConfig, LogFormat, LogLevel};

/// 收到关闭信号后等待运行中组件退出的最长时间
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let config_path = matches.get_one::<String>("config").cloned();
    let config = AppConfig::load(config_path.as_deref())
        .with_context(|| format!("加载配置失败: {}", config_path.as_deref().unwrap_or("默认路径")))?;

    let log_level = matches
        .get_one::<String>("log-level")
        .unwrap_or(&config.observability.log_level)
        .parse::<LogLevel>()?;
    let log_format = matches
        .get_one::<String>("log-format")
        .unwrap_or(&config.observability.log_format)
        .parse::<LogFormat>()?;
    init_logging(log_level, log_format)?;

    let app = Application::new(config, config_path);

    match matches.subcommand() {
        Some(("supervisor", sub)) => {
            let name = required_str(sub, "supervisor")?.to_string();
            run_until_signal(|shutdown| async move {
                app.run_supervisor(&name, &shutdown).await.map(|_| ())
            })
            .await?;
        }
        Some(("worker", sub)) => {
            let queue = required_str(sub, "queue")?.to_string();
            let worker_id = sub
                .get_one::<String>("worker-id")
                .cloned()
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            let supervisor = required_str(sub, "supervisor")?;
            let options = apply_worker_overrides(sub, app.worker_options(supervisor));

            info!(worker_id = %worker_id, queue = %queue, "启动Worker");
            run_until_signal(|shutdown| async move {
                let reason = app.run_worker(worker_id, &queue, options, &shutdown).await?;
                info!("Worker退出: {:?}", reason);
                Ok(())
            })
            .await?;
        }
        Some(("start", sub)) => {
            let queue = required_str(sub, "queue")?;
            let supervisor = required_str(sub, "supervisor")?;
            let worker_id = app.start(queue, supervisor).await?;
            println!("{worker_id}");
        }
        Some(("stop", sub)) => {
            let id = required_str(sub, "id")?;
            app.stop(id).await?;
            println!("已发送停止命令: {id}");
        }
        Some(("pause", sub)) => {
            let id = required_str(sub, "id")?;
            app.pause(id).await?;
            println!("已发送暂停命令: {id}");
        }
        Some(("resume", sub)) => {
            let id = required_str(sub, "id")?;
            app.resume(id).await?;
            println!("已发送恢复命令: {id}");
        }
        Some(("list", _)) => {
            let workers = app.list().await?;
            print_workers(&workers, Utc::now());
        }
        Some(("cleanup", sub)) => {
            let threshold = sub.get_one::<i64>("threshold").copied();
            let cleaned = app.cleanup(threshold).await?;
            println!("已清理 {cleaned} 个陈旧Worker");
        }
        Some(("restart", sub)) => {
            let queue = sub.get_one::<String>("queue").map(String::as_str);
            let restarted = app.restart(queue, sub.get_flag("force")).await?;
            println!("已向 {restarted} 个Worker发送重启命令");
        }
        Some(("terminate", _)) => {
            app.terminate().await?;
            println!("已设置终止标志");
        }
        Some(("prune", sub)) => {
            let hours = sub.get_one::<i64>("older-than-hours").copied().unwrap_or(24);
            let pruned = app.prune(hours).await?;
            println!("已删除 {pruned} 条Worker记录");
        }
        Some((other, _)) => return Err(anyhow::anyhow!("不支持的子命令: {other}")),
        None => return Err(anyhow::anyhow!("缺少子命令")),
    }

    Ok(())
}

/// 运行长期任务，收到OS信号时广播关闭并等待其退出
async fn run_until_signal<F, Fut>(run: F) -> Result<()>
where
    F: FnOnce(ShutdownManager) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let shutdown_manager = ShutdownManager::new();
    let task = run(shutdown_manager.clone());
    tokio::pin!(task);

    tokio::select! {
        result = &mut task => return result,
        _ = wait_for_shutdown_signal() => {
            info!("收到关闭信号，开始优雅关闭...");
        }
    }

    shutdown_manager.shutdown().await;

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
        Ok(Ok(())) => {
            info!("已优雅关闭");
            Ok(())
        }
        Ok(Err(e)) => {
            error!("关闭时发生错误: {e}");
            Err(e)
        }
        Err(_) => {
            warn!("关闭超时，强制退出");
            Ok(())
        }
    }
}
