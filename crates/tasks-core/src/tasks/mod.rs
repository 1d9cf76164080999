//! Task orchestration

mod clock;
mod config;
mod manager;
mod validation;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::TaskManagerConfig;
pub use manager::{TaskManager, TASK_CACHE, TASK_PAGE_CACHE, TASK_SEQUENCE, TASK_STORE};
