//! Collects Google Sheets links shared in Slack direct messages and writes
//! them, keyed by the other participant's name, to a CSV file.

pub mod config;
pub mod error;
pub mod links;
pub mod pipeline;
pub mod report;
pub mod slack;
pub mod throttle;

pub use config::Config;
pub use error::{AppError, Result};
pub use pipeline::{RunSummary, collect_rows, run};
pub use slack::{SlackApi, WebClient};
pub use throttle::{Clock, SystemClock};
