//! 进程存活探测
//!
//! 统一通过 [`ProcessProbe`] 暴露，平台差异只存在于本模块。

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;
use watchtower_domain::ProcessProbe;

/// 通过 `ps` 查询进程表，僵尸进程视为已退出
#[cfg(unix)]
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixProcessProbe;

#[cfg(unix)]
#[async_trait]
impl ProcessProbe for UnixProcessProbe {
    async fn is_alive(&self, pid: Option<u32>) -> bool {
        let Some(pid) = pid else {
            return false;
        };

        match Command::new("ps")
            .args(["-o", "stat=", "-p", &pid.to_string()])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await
        {
            Ok(output) if output.status.success() => {
                let stat = String::from_utf8_lossy(&output.stdout);
                let stat = stat.trim();
                !stat.is_empty() && !stat.starts_with('Z')
            }
            Ok(_) => false,
            Err(e) => {
                debug!("执行ps命令失败: pid={}, error={}", pid, e);
                false
            }
        }
    }
}

/// 通过 `tasklist` 按PID过滤查询
#[cfg(windows)]
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsProcessProbe;

#[cfg(windows)]
#[async_trait]
impl ProcessProbe for WindowsProcessProbe {
    async fn is_alive(&self, pid: Option<u32>) -> bool {
        let Some(pid) = pid else {
            return false;
        };

        let pid_text = pid.to_string();
        match Command::new("tasklist")
            .args(["/FI", &format!("PID eq {pid_text}"), "/NH", "/FO", "CSV"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await
        {
            Ok(output) if output.status.success() => {
                let quoted = format!("\"{pid_text}\"");
                String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .any(|line| line.split(',').any(|field| field.trim() == quoted))
            }
            Ok(_) => false,
            Err(e) => {
                debug!("执行tasklist命令失败: pid={}, error={}", pid, e);
                false
            }
        }
    }
}

#[cfg(unix)]
pub type PlatformProcessProbe = UnixProcessProbe;

#[cfg(windows)]
pub type PlatformProcessProbe = WindowsProcessProbe;
