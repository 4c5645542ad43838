//! CRM vertical slice: the pure derivations each page runs over fetched
//! documents, plus the prompt templates sent to the text generator.

pub mod aggregate;
pub mod dashboard;
pub mod prompts;

pub use aggregate::{ChartPoint, UNKNOWN_BUCKET, UpcomingWindow};
pub use dashboard::{ActivityRecord, ContactRecord, DashboardInput, DashboardMetrics, DealRecord};
pub use prompts::{PromptKind, parse_tags};

/// Deal stages that take a deal out of the open pipeline.
pub const CLOSED_WON: &str = "Closed Won";
pub const CLOSED_LOST: &str = "Closed Lost";

pub const MEETING: &str = "Meeting";
pub const TASK: &str = "Task";
pub const SCHEDULED: &str = "Scheduled";
pub const COMPLETED: &str = "Completed";
pub const ACTIVE: &str = "Active";
pub const WON: &str = "won";
