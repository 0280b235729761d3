//! Attendance tracking and analytics for the departments of an academic institute.
//!
//! The [`analytics`] module holds the aggregation engine, a pure function over a [`Snapshot`] of
//! students, sessions and presence records. [`manager::AttendanceManager`] loads and stores that
//! data in SQLite, and [`roster`] imports students from CSV.

pub mod analytics;
pub mod cli;
pub mod display;
pub mod error;
pub mod manager;
pub mod models;
pub mod roster;
pub mod schema;
pub mod settings;

pub use analytics::{AnalyticsQuery, AnalyticsReport, Cohort, Criteria, FilterMode, Snapshot};
pub use error::{AcadexError, Result};
pub use manager::AttendanceManager;
pub use settings::Settings;

/// Connects to the configured database, scoped to the configured institute and department.
pub fn create_default_manager() -> Result<(AttendanceManager, Settings)> {
    let settings = Settings::load()?;
    let manager = AttendanceManager::connect(&settings)?;

    Ok((manager, settings))
}
