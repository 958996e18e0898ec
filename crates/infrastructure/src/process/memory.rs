use watchtower_domain::MemoryProbe;

/// 读取本进程常驻内存
///
/// Linux下解析 `/proc/self/status` 的 VmRSS，其他平台返回None。
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessMemoryProbe;

impl ProcessMemoryProbe {
    /// 解析 `VmRSS:   12345 kB` 格式的行
    pub fn parse_vm_rss(status: &str) -> Option<u64> {
        status
            .lines()
            .find_map(|line| line.strip_prefix("VmRSS:"))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|kb| kb.parse::<u64>().ok())
            .map(|kb| kb * 1024)
    }
}

impl MemoryProbe for ProcessMemoryProbe {
    #[cfg(target_os = "linux")]
    fn resident_bytes(&self) -> Option<u64> {
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|status| Self::parse_vm_rss(&status))
    }

    #[cfg(not(target_os = "linux"))]
    fn resident_bytes(&self) -> Option<u64> {
        None
    }
}
