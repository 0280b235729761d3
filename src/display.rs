use crate::analytics::{AnalyticsReport, Criteria, FilterMode, Standing, StudentReport};
use crate::models::{Session, Student, Year};
use tabled::{Table, Tabled, settings::Style};

fn render(mut table: Table) -> String {
    table.with(Style::modern());
    table.to_string()
}

fn or_dash(value: Option<impl ToString>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

#[derive(Tabled)]
struct StandingRow {
    #[tabled(rename = "Roll")]
    roll: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Div")]
    division: String,
    #[tabled(rename = "Attended")]
    attended: usize,
    #[tabled(rename = "Total")]
    total: usize,
    #[tabled(rename = "%")]
    percentage: u8,
    #[tabled(rename = "Status")]
    status: &'static str,
}

impl StandingRow {
    fn new(standing: &Standing<'_>, status: &'static str) -> Self {
        Self {
            roll: standing.student.roll_no.clone(),
            name: standing.student.full_name(),
            division: or_dash(standing.student.division),
            attended: standing.attended,
            total: standing.total,
            percentage: standing.percentage,
            status,
        }
    }
}

/// Renders an attendance report, defaulters first.
pub fn analytics_table(report: &AnalyticsReport<'_>, defaulters_only: bool) -> String {
    let defaulters = report
        .defaulters
        .iter()
        .map(|standing| StandingRow::new(standing, "defaulter"));
    let safe = report
        .safe
        .iter()
        .filter(|_| !defaulters_only)
        .map(|standing| StandingRow::new(standing, "safe"));

    render(Table::new(defaulters.chain(safe)))
}

/// One line summarising a report.
pub fn analytics_summary(report: &AnalyticsReport<'_>, heading: &str) -> String {
    format!(
        "{heading}: {} students, {} safe, {} below {}%",
        report.total,
        report.safe.len(),
        report.defaulters.len(),
        report.threshold
    )
}

/// Renders the roster. The short form only shows who is who.
pub fn roster_table(roster: &[Student], verbose: bool) -> String {
    if verbose {
        #[derive(Tabled)]
        struct FullStudent {
            id: String,
            roll_no: String,
            first_name: String,
            last_name: String,
            email: String,
            department: String,
            year: String,
            division: String,
        }

        render(Table::new(roster.iter().map(|student| FullStudent {
            id: student.id.clone(),
            roll_no: student.roll_no.clone(),
            first_name: student.first_name.clone(),
            last_name: student.last_name.clone(),
            email: student.email.clone(),
            department: student.department.clone(),
            year: or_dash(student.year),
            division: or_dash(student.division),
        })))
    } else {
        #[derive(Tabled)]
        struct SimpleStudent {
            id: String,
            roll_no: String,
            name: String,
            year: String,
        }

        render(Table::new(roster.iter().map(|student| SimpleStudent {
            id: student.id.clone(),
            roll_no: student.roll_no.clone(),
            name: student.full_name(),
            year: or_dash(student.year),
        })))
    }
}

pub fn sessions_table(sessions: &[Session]) -> String {
    #[derive(Tabled)]
    struct SessionRow {
        id: String,
        date: String,
        subject: String,
        kind: String,
        year: String,
        division: String,
        rolls: String,
    }

    render(Table::new(sessions.iter().map(|session| SessionRow {
        id: session.id.clone(),
        date: session.held_on.to_string(),
        subject: session.subject.clone(),
        kind: session.kind.to_string(),
        year: session.target_year.to_string(),
        division: session.division.to_string(),
        rolls: session
            .roll_range
            .map(|range| range.to_string())
            .unwrap_or_else(|| "all".to_string()),
    })))
}

pub fn criteria_table(criteria: &Criteria) -> String {
    #[derive(Tabled)]
    struct Threshold {
        year: Year,
        #[tabled(rename = "minimum %")]
        threshold: u8,
    }

    render(Table::new(Year::ALL.into_iter().map(|year| Threshold {
        year,
        threshold: criteria.threshold(year),
    })))
}

/// Renders one student's attendance in every mode.
pub fn student_report_table(report: &StudentReport<'_>) -> String {
    #[derive(Tabled)]
    struct ModeRow {
        mode: FilterMode,
        attended: usize,
        total: usize,
        #[tabled(rename = "%")]
        percentage: u8,
        status: &'static str,
    }

    let rows = [FilterMode::Overall, FilterMode::Theory, FilterMode::Practical].map(|mode| {
        ModeRow {
            mode,
            attended: report.tally.attended(mode),
            total: report.tally.total(mode),
            percentage: report.percentage(mode),
            status: if report.is_safe(mode) { "safe" } else { "defaulter" },
        }
    });

    format!(
        "{} (roll {}, {}), minimum {}%\n{}",
        report.student.full_name(),
        report.student.roll_no,
        or_dash(report.cohort),
        report.threshold,
        render(Table::new(rows))
    )
}
