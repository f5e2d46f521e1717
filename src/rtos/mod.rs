pub mod alarm;
pub mod calendar;
pub mod clock;
pub mod lock;
pub mod scheduler;
pub mod time;

pub use alarm::{Alarm, AlarmListener};
pub use calendar::{DateTime, Weekday};
pub use clock::{Clock, WallTime};
pub use lock::{Lock, LockGuard};
pub use scheduler::Scheduler;
pub use time::{greater_than_or_equal, less_than, Duration, TickRate, Timestamp};
