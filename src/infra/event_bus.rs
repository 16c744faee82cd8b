use tokio::sync::broadcast;

use crate::domain::events::DomainEvent;
use crate::error::{Result, ServerError};

/// 进程内事件总线（tokio::sync::broadcast）
///
/// 没有订阅者时 `publish` 返回 Err，调用方按需忽略。
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// 发布事件，返回收到事件的订阅者数量
    pub fn publish(&self, event: DomainEvent) -> Result<usize> {
        self.sender
            .send(event)
            .map_err(|e| ServerError::Internal(format!("Event bus error: {}", e)))
    }

    /// 订阅事件
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
