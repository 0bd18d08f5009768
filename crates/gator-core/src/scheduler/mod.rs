mod service;
pub mod tasks;
mod writer;

pub use service::{PollScheduler, SchedulerEvent, SchedulerState};
pub use tasks::{run_cycle, CycleOutcome, CycleReport};
pub use writer::{write_posts, WriteReport};
