use tracing::{debug, warn};
use watchtower_core::{BalanceMode, QueueSelector};
use watchtower_domain::{composite_queue, QueueInspector};

/// 通配符发现不到队列时使用的队列
pub const DEFAULT_QUEUE: &str = "default";

/// 解析本轮的有效队列集合
///
/// 通配符配置通过 `inspector` 发现有待处理任务的队列，发现失败或为空时回退到 `default`。
pub async fn resolve_queues(
    selector: &QueueSelector,
    inspector: Option<&dyn QueueInspector>,
) -> Vec<String> {
    match selector {
        QueueSelector::List(queues) => queues.clone(),
        QueueSelector::Wildcard => {
            let discovered = match inspector {
                Some(inspector) => match inspector.pending_queues().await {
                    Ok(queues) => queues,
                    Err(e) => {
                        warn!("队列发现失败，回退到默认队列: {}", e);
                        Vec::new()
                    }
                },
                None => {
                    debug!("未配置队列发现，使用默认队列");
                    Vec::new()
                }
            };

            if discovered.is_empty() {
                vec![DEFAULT_QUEUE.to_string()]
            } else {
                discovered
            }
        }
    }
}

/// 为 `count` 个新Worker分配队列
///
/// simple: 每个Worker服务全部队列；auto: 按下标轮询，每个Worker一个队列。
pub fn plan_assignments(mode: BalanceMode, queues: &[String], count: usize) -> Vec<String> {
    if queues.is_empty() {
        return vec![DEFAULT_QUEUE.to_string(); count];
    }

    match mode {
        BalanceMode::Simple => vec![composite_queue(queues); count],
        BalanceMode::Auto => (0..count)
            .map(|i| queues[i % queues.len()].clone())
            .collect(),
    }
}
