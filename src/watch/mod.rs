//! Scheduled polling of watched documents.
//!
//! - `sentinel`: the single-use pass signal and its resolution halves
//! - `watcher`: the watch state machine, its task, and stop controls

mod sentinel;
mod watcher;

pub use sentinel::PassNotice;
pub use watcher::{Watch, WatchHandle, WatchStopper};
