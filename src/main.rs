use acadex::analytics::{self, AnalyticsQuery, Cohort};
use acadex::cli::{Cli, Command, NewSession, NewStudent, RosterFile};
use acadex::models::{Session, SessionKind, Student};
use acadex::roster::{self, ImportDefaults};
use acadex::{AttendanceManager, Settings, display};
use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::Parser;
use std::fs::File;

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let (mut manager, settings) =
        acadex::create_default_manager().context("failed to open the attendance database")?;

    run(cli.command, &settings, &mut manager)
}

fn run(command: Command, settings: &Settings, manager: &mut AttendanceManager) -> Result<()> {
    match command {
        Command::AddStudent(new_student) => {
            let student = student_from_args(new_student, &settings.department);
            manager.insert_students(&[student])?;
        }
        Command::RemoveStudent { id } => {
            let student = manager.delete_student(&id)?;
            println!("Removed {} ({})", student.full_name(), student.id);
        }
        Command::ImportRoster(file) => {
            let students = read_roster(&file, settings)?;
            let written = manager.insert_students(&students)?;
            println!("Imported {written} students");
        }
        Command::SyncRoster(file) => sync_roster(&file, settings, manager)?,
        Command::Roster { verbose } => {
            let roster = manager.roster()?;
            println!("Roster:\n{}", display::roster_table(&roster, verbose));
        }
        Command::AddSession(new_session) => {
            let session = session_from_args(new_session);
            manager.insert_session(&session)?;
            println!("Added session {}", session.id);
        }
        Command::Sessions => {
            let sessions = manager.sessions()?;
            println!("Sessions:\n{}", display::sessions_table(&sessions));
        }
        Command::MarkPresent { session, students } => {
            let ids: Vec<&str> = students.iter().map(String::as_str).collect();
            let marked = manager.mark_present(&session, &ids)?;
            println!("Marked {marked} students present");
        }
        Command::BulkMarkPresent { session, file_path } => {
            let file = File::open(&file_path)
                .with_context(|| format!("failed to open {}", file_path.display()))?;
            let students = roster::read_ids(file)?;
            let ids: Vec<&str> = students.iter().map(String::as_str).collect();
            let marked = manager.mark_present(&session, &ids)?;
            println!("Marked {marked} of {} listed students present", ids.len());
        }
        Command::SetCriteria { year, threshold } => {
            manager.set_threshold(year, threshold)?;
        }
        Command::ShowCriteria => {
            let criteria = manager.criteria(settings.base_criteria())?;
            println!("Criteria:\n{}", display::criteria_table(&criteria));
        }
        Command::Analytics(args) => {
            let cohort = Cohort::new(args.year, args.division)?;
            let snapshot = manager.snapshot()?;
            let criteria = manager.criteria(settings.base_criteria())?;

            let mut query = AnalyticsQuery::new(cohort, args.mode);
            query.search = args.search;

            let report = analytics::aggregate(&snapshot, &query, &criteria);
            let heading = format!("{cohort} {} attendance", args.mode);

            println!("{}", display::analytics_summary(&report, &heading));
            println!("{}", display::analytics_table(&report, args.defaulters_only));
        }
        Command::StudentReport { id } => {
            let snapshot = manager.snapshot()?;
            let criteria = manager.criteria(settings.base_criteria())?;
            let report = analytics::student_report(&snapshot, &id, &criteria)?;
            println!("{}", display::student_report_table(&report));
        }
    }

    Ok(())
}

fn student_from_args(args: NewStudent, department: &str) -> Student {
    Student {
        id: args.id,
        first_name: args.first_name,
        last_name: args.last_name,
        email: args.email,
        department: department.to_string(),
        year: Some(args.year),
        division: args.division,
        roll_no: args.roll,
    }
}

fn session_from_args(args: NewSession) -> Session {
    if args.kind == SessionKind::Theory && args.rolls.is_some() {
        log::warn!("roll ranges only restrict practical sessions, dropping it from this session");
    }

    Session {
        id: args.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        subject: args.subject,
        target_year: args.year,
        division: args.division,
        kind: args.kind,
        roll_range: args.rolls.filter(|_| args.kind == SessionKind::Practical),
        held_on: args.date.unwrap_or_else(|| Local::now().date_naive()),
    }
}

fn read_roster(file: &RosterFile, settings: &Settings) -> Result<Vec<Student>> {
    let defaults = ImportDefaults {
        department: settings.department.clone(),
        year: file.year,
        division: file.division,
    };

    roster::load_students(&file.file_path, &defaults)
        .with_context(|| format!("failed to import {}", file.file_path.display()))
}

/// Brings the roster of the file's cohort in line with the file. Students of other cohorts are
/// left alone.
fn sync_roster(
    file: &RosterFile,
    settings: &Settings,
    manager: &mut AttendanceManager,
) -> Result<()> {
    let Some(year) = file.year else {
        bail!("sync-roster needs --year to know which cohort the file replaces");
    };
    let cohort = Cohort::new(year, file.division)?;

    let incoming: Vec<Student> = read_roster(file, settings)?
        .into_iter()
        .filter(|student| cohort.contains(student))
        .collect();
    let current: Vec<Student> = manager
        .roster()?
        .into_iter()
        .filter(|student| cohort.contains(student))
        .collect();

    let diff = roster::diff_roster(&current, &incoming);
    if diff.is_empty() {
        println!("{cohort} roster is already up to date");
        return Ok(());
    }

    println!("Students dropped: {:#?}", diff.dropped);
    for student in &diff.dropped {
        manager.delete_student(&student.id)?;
    }

    println!("Students added: {:#?}", diff.added);
    println!("Students updated: {:#?}", diff.changed);
    let upserts: Vec<Student> = diff
        .added
        .iter()
        .chain(&diff.changed)
        .map(|&student| student.clone())
        .collect();
    manager.insert_students(&upserts)?;

    Ok(())
}
