//! mockall generated mocks for narrow ports

use async_trait::async_trait;
use mockall::mock;
use watchtower_core::WatchtowerResult;
use watchtower_domain::{ProcessProbe, QueueInspector};

mock! {
    pub QueueInspector {}

    #[async_trait]
    impl QueueInspector for QueueInspector {
        async fn pending_queues(&self) -> WatchtowerResult<Vec<String>>;
    }
}

mock! {
    pub ProcessProbe {}

    #[async_trait]
    impl ProcessProbe for ProcessProbe {
        async fn is_alive(&self, pid: Option<u32>) -> bool;
    }
}
