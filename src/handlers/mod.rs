pub mod continuity;
pub mod devices;
pub mod health;
pub mod poll;
pub mod sync_queue;

use crate::sync::{ContinuityStore, DeviceRegistry, NotificationDelivery, SyncQueue};

// ==================== 应用状态 ====================

#[derive(Clone)]
pub struct AppState {
    pub registry: DeviceRegistry,
    pub continuity: ContinuityStore,
    pub queue: SyncQueue,
    pub delivery: NotificationDelivery,
}
