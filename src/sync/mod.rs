pub mod continuity;
pub mod delivery;
pub mod queue;
pub mod registry;

pub use continuity::ContinuityStore;
pub use delivery::{NotificationDelivery, PollResult};
pub use queue::SyncQueue;
pub use registry::{DeviceRegistration, DeviceRegistry};
