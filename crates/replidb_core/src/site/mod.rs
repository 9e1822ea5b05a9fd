//! Sites: per-site data managers, uptime history, and the coordinator
//! that fronts them.

mod coordinator;
mod data;
mod uptime;

pub use coordinator::{SiteCoordinator, SiteWriteStatus};
pub use data::DataManager;
pub use uptime::{UptimeInterval, UptimeLog};
