//! veadotube instances: identity, descriptor files and discovery.

mod descriptor;
mod id;
mod manager;
mod model;

pub use descriptor::VtInstance;
pub use id::InstanceId;
pub use manager::{instances_dir, watcher_delay, InstancesListener, InstancesManager};
pub use model::Instance;
