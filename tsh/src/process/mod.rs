pub mod fork;
pub mod io;
pub mod job;
pub mod signal;
pub mod wait;

pub use fork::{Launched, Program};
pub use job::{JOBS, Job, JobTable, Jobs};
pub use signal::SignalDeferral;
pub use wait::wait_for_foreground;
