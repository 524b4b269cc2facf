//! Appointment slot tracker for the linkingcloud booking service.
//!
//! Watches one department or doctor, notifies push channels when open
//! slots change, and keeps failure notifications to one per error per
//! cooldown window.

pub mod client;
pub mod config;
pub mod detector;
pub mod directory;
pub mod error;
pub mod http;
pub mod monitor;
pub mod notifier;
pub mod reporter;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod throttle;
pub mod watcher;

#[cfg(test)]
mod testing;

pub use error::{TrackerError, TrackerResult};
