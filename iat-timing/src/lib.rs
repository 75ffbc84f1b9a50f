pub mod schedule;
pub mod timer;

pub use schedule::{Scheduler, TaskHandle, TimerSlot};
pub use timer::{Clock, HighPrecisionTimer, ManualClock, deadline_after, duration_ns};
