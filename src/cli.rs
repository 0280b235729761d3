//! This module contains the command-line interface [`Cli`] parser for managing student attendance
//! records.

use crate::analytics::FilterMode;
use crate::models::{Division, DivisionScope, RollRange, SessionKind, TargetYear, Year};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// The command line configuration struct, where the command-line interface parser is automatically
/// derived by [`clap::Parser`].
#[derive(Parser, Debug)]
#[command(name = "acadex", version, about = "Attendance tracking and analytics for departments")]
pub struct Cli {
    /// The different commands available for managing student attendance records.
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new student to the roster.
    AddStudent(NewStudent),

    /// Remove a student and their attendance from the roster.
    RemoveStudent { id: String },

    /// Add every student in a CSV file to the roster.
    ImportRoster(RosterFile),

    /// Make the roster of one cohort match a CSV file, adding, updating and dropping students.
    SyncRoster(RosterFile),

    /// Display the roster.
    Roster {
        /// Show every stored field.
        #[arg(short, long)]
        verbose: bool,
    },

    /// Record a class session.
    AddSession(NewSession),

    /// List recorded sessions.
    Sessions,

    /// Mark students as present at a session.
    MarkPresent {
        session: String,
        #[arg(required = true)]
        students: Vec<String>,
    },

    /// Mark the students listed in a file, one ID per line, as present at a session.
    BulkMarkPresent { session: String, file_path: PathBuf },

    /// Set the minimum attendance percentage for a year.
    SetCriteria {
        year: Year,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        threshold: u8,
    },

    /// Display the minimum attendance percentage of every year.
    ShowCriteria,

    /// Show safe students and defaulters for a cohort.
    Analytics(AnalyticsArgs),

    /// Show one student's attendance.
    StudentReport { id: String },
}

#[derive(Args, Debug)]
pub struct NewStudent {
    pub id: String,
    #[arg(long)]
    pub first_name: String,
    #[arg(long, default_value = "")]
    pub last_name: String,
    #[arg(long, default_value = "")]
    pub email: String,
    #[arg(long)]
    pub year: Year,
    /// Only meaningful for first-year students.
    #[arg(long)]
    pub division: Option<Division>,
    #[arg(long)]
    pub roll: String,
}

#[derive(Args, Debug)]
pub struct RosterFile {
    pub file_path: PathBuf,
    /// The year for rows without a year column.
    #[arg(long)]
    pub year: Option<Year>,
    /// The division for rows without a division column.
    #[arg(long)]
    pub division: Option<Division>,
}

#[derive(Args, Debug)]
pub struct NewSession {
    #[arg(long)]
    pub subject: String,
    /// A year, or `All`.
    #[arg(long, default_value = "All")]
    pub year: TargetYear,
    /// A division, or `All`.
    #[arg(long, default_value = "All")]
    pub division: DivisionScope,
    #[arg(long, value_enum, default_value_t = SessionKind::Theory)]
    pub kind: SessionKind,
    /// The batch of a practical, as `START-END`.
    #[arg(long)]
    pub rolls: Option<RollRange>,
    /// Defaults to today.
    #[arg(long)]
    pub date: Option<NaiveDate>,
    /// Defaults to a generated ID.
    #[arg(long)]
    pub id: Option<String>,
}

#[derive(Args, Debug)]
pub struct AnalyticsArgs {
    #[arg(long)]
    pub year: Year,
    /// Report on one first-year division.
    #[arg(long)]
    pub division: Option<Division>,
    #[arg(long, value_enum, default_value_t = FilterMode::Overall)]
    pub mode: FilterMode,
    /// Only students whose first name or roll number contains this.
    #[arg(long)]
    pub search: Option<String>,
    /// Hide students above the threshold.
    #[arg(long)]
    pub defaulters_only: bool,
}
