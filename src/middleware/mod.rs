pub mod monitor;

pub use monitor::{monitor_requests, RouteMonitor};
