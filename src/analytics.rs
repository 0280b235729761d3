//! The attendance aggregation engine.
//!
//! Given a [`Snapshot`] of students, sessions and presence records, [`aggregate`] computes every
//! student's personal attendance percentage for one cohort. Not every session applies to every
//! student: sessions may target a single year or division, and practical sessions may be split
//! into batches by roll number. A student is only ever measured against the sessions they were
//! expected to attend.
//!
//! Everything here is a pure function of its inputs. Nothing is cached between calls, so running
//! the aggregation twice on the same snapshot gives the same report.

use crate::error::{AcadexError, Result};
use crate::models::{Division, Presence, Session, SessionKind, Student, Year, roll_order};
use clap::ValueEnum;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// The threshold used for years that have no explicit criteria.
pub const DEFAULT_THRESHOLD: u8 = 75;

/// Which kinds of session count towards a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum FilterMode {
    #[default]
    Overall,
    Theory,
    Practical,
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterMode::Overall => f.write_str("Overall"),
            FilterMode::Theory => f.write_str("Theory"),
            FilterMode::Practical => f.write_str("Practical"),
        }
    }
}

/// The group of students a report is computed for.
///
/// First-year students are reported per division, every other year as a whole. The two modes are
/// exclusive: a division cohort can only be built for [`Year::Fe`]. A year cohort for first-year
/// students lists every division, each student measured against their own division's sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cohort {
    Year(Year),
    Division { year: Year, division: Division },
}

impl Cohort {
    /// Builds the cohort for `year`, narrowed to `division` when one is given.
    ///
    /// Returns [`AcadexError::DivisionCohort`] if a division is given for a year that is not
    /// grouped by division.
    pub fn new(year: Year, division: Option<Division>) -> Result<Self> {
        match division {
            None => Ok(Cohort::Year(year)),
            Some(division) if year.is_division_based() => Ok(Cohort::Division { year, division }),
            Some(_) => Err(AcadexError::DivisionCohort(year)),
        }
    }

    /// The cohort a single student is reported in.
    pub fn of(student: &Student) -> Option<Self> {
        let year = student.year?;

        Some(if year.is_division_based() {
            Cohort::Division {
                year,
                division: student.division_or_default(),
            }
        } else {
            Cohort::Year(year)
        })
    }

    pub fn year(&self) -> Year {
        match *self {
            Cohort::Year(year) | Cohort::Division { year, .. } => year,
        }
    }

    pub fn contains(&self, student: &Student) -> bool {
        match *self {
            Cohort::Year(year) => student.year == Some(year),
            Cohort::Division { year, division } => {
                student.year == Some(year) && student.division_or_default() == division
            }
        }
    }
}

impl fmt::Display for Cohort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cohort::Year(year) => write!(f, "{year}"),
            Cohort::Division { year, division } => write!(f, "{year} division {division}"),
        }
    }
}

/// Minimum attendance percentages per year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Criteria {
    default: u8,
    thresholds: HashMap<Year, u8>,
}

impl Criteria {
    pub fn new(default: u8) -> Self {
        Self {
            default,
            thresholds: HashMap::new(),
        }
    }

    pub fn set(&mut self, year: Year, threshold: u8) {
        self.thresholds.insert(year, threshold);
    }

    pub fn with(mut self, year: Year, threshold: u8) -> Self {
        self.set(year, threshold);
        self
    }

    pub fn threshold(&self, year: Year) -> u8 {
        self.thresholds.get(&year).copied().unwrap_or(self.default)
    }
}

impl Default for Criteria {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

/// Everything the aggregation reads, already loaded into memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub students: Vec<Student>,
    pub sessions: Vec<Session>,
    pub attendance: Vec<Presence>,
}

impl Snapshot {
    /// Maps each student id to the ids of the sessions they were present at. Duplicate presence
    /// records collapse into one.
    fn presence_index(&self) -> HashMap<&str, HashSet<&str>> {
        let mut index: HashMap<&str, HashSet<&str>> = HashMap::new();

        for presence in &self.attendance {
            index
                .entry(presence.student_id.as_str())
                .or_default()
                .insert(presence.session_id.as_str());
        }

        index
    }
}

/// Returns whether `student` is expected to attend `session`.
///
/// Division restrictions only apply to years grouped by division, and are checked against the
/// student's own division whichever cohort the student is reported in. A ranged practical never
/// applies to a student whose roll number is not numeric.
pub fn session_applies(session: &Session, student: &Student) -> bool {
    let Some(year) = student.year else {
        return false;
    };

    if !session.target_year.includes(year) {
        return false;
    }

    if year.is_division_based() && !session.division.includes(student.division_or_default()) {
        return false;
    }

    match (session.kind, session.roll_range) {
        (SessionKind::Practical, Some(range)) => student.roll().is_some_and(|r| range.contains(r)),
        _ => true,
    }
}

/// Attended and expected session counts for one student, split by session kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub theory_attended: usize,
    pub theory_expected: usize,
    pub practical_attended: usize,
    pub practical_expected: usize,
}

impl Tally {
    pub fn attended(&self, mode: FilterMode) -> usize {
        match mode {
            FilterMode::Overall => self.theory_attended + self.practical_attended,
            FilterMode::Theory => self.theory_attended,
            FilterMode::Practical => self.practical_attended,
        }
    }

    pub fn total(&self, mode: FilterMode) -> usize {
        match mode {
            FilterMode::Overall => self.theory_expected + self.practical_expected,
            FilterMode::Theory => self.theory_expected,
            FilterMode::Practical => self.practical_expected,
        }
    }

    /// The rounded attendance percentage. A student with no applicable sessions is at 100%.
    pub fn percentage(&self, mode: FilterMode) -> u8 {
        percentage(self.attended(mode), self.total(mode))
    }
}

/// `round(attended / total * 100)` with halves rounded up, or 100 when `total` is zero.
pub fn percentage(attended: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }

    let attended = attended.min(total) as u64;
    let total = total as u64;

    ((attended * 200 + total) / (total * 2)) as u8
}

fn tally_with(student: &Student, sessions: &[Session], present: Option<&HashSet<&str>>) -> Tally {
    let mut tally = Tally::default();

    for session in sessions.iter().filter(|s| session_applies(s, student)) {
        let attended = present.is_some_and(|ids| ids.contains(session.id.as_str())) as usize;

        match session.kind {
            SessionKind::Theory => {
                tally.theory_expected += 1;
                tally.theory_attended += attended;
            }
            SessionKind::Practical => {
                tally.practical_expected += 1;
                tally.practical_attended += attended;
            }
        }
    }

    tally
}

/// Counts the sessions that apply to `student` and how many of them they attended.
pub fn tally(snapshot: &Snapshot, student: &Student) -> Tally {
    let index = snapshot.presence_index();

    tally_with(student, &snapshot.sessions, index.get(student.id.as_str()))
}

/// What to report on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsQuery {
    pub cohort: Cohort,
    pub mode: FilterMode,
    /// Case-insensitive substring of a first name or roll number.
    pub search: Option<String>,
}

impl AnalyticsQuery {
    pub fn new(cohort: Cohort, mode: FilterMode) -> Self {
        Self {
            cohort,
            mode,
            search: None,
        }
    }

    pub fn search(mut self, query: impl Into<String>) -> Self {
        self.search = Some(query.into());
        self
    }

    fn matches_search(&self, student: &Student) -> bool {
        let Some(query) = self.search.as_deref().map(str::trim).filter(|q| !q.is_empty()) else {
            return true;
        };

        let query = query.to_lowercase();
        student.first_name.to_lowercase().contains(&query)
            || student.roll_no.to_lowercase().contains(&query)
    }
}

/// One student's position in a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing<'a> {
    pub student: &'a Student,
    pub tally: Tally,
    pub attended: usize,
    pub total: usize,
    pub percentage: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsReport<'a> {
    /// The number of students listed, safe and defaulters together.
    pub total: usize,
    pub safe: Vec<Standing<'a>>,
    pub defaulters: Vec<Standing<'a>>,
    pub threshold: u8,
}

impl<'a> AnalyticsReport<'a> {
    /// Looks up a student's standing in either list.
    pub fn standing(&self, student_id: &str) -> Option<&Standing<'a>> {
        self.safe
            .iter()
            .chain(&self.defaulters)
            .find(|standing| standing.student.id == student_id)
    }
}

/// Computes the attendance report for the cohort, mode and search of `query`.
///
/// Students at or above the cohort year's threshold are `safe`, everyone else is a defaulter.
/// Both lists are ordered by roll number.
pub fn aggregate<'a>(
    snapshot: &'a Snapshot,
    query: &AnalyticsQuery,
    criteria: &Criteria,
) -> AnalyticsReport<'a> {
    let threshold = criteria.threshold(query.cohort.year());
    let index = snapshot.presence_index();

    let mut cohort: Vec<&Student> = snapshot
        .students
        .iter()
        .filter(|student| query.cohort.contains(student))
        .filter(|student| query.matches_search(student))
        .collect();
    cohort.sort_by(|a, b| roll_order(&a.roll_no, &b.roll_no).then_with(|| a.id.cmp(&b.id)));

    let (safe, defaulters): (Vec<_>, Vec<_>) = cohort
        .into_iter()
        .map(|student| {
            let tally = tally_with(student, &snapshot.sessions, index.get(student.id.as_str()));

            Standing {
                student,
                tally,
                attended: tally.attended(query.mode),
                total: tally.total(query.mode),
                percentage: tally.percentage(query.mode),
            }
        })
        .partition(|standing| standing.percentage >= threshold);

    log::debug!(
        "{} {} attendance: {} safe, {} defaulters at {}%",
        query.cohort,
        query.mode,
        safe.len(),
        defaulters.len(),
        threshold
    );

    AnalyticsReport {
        total: safe.len() + defaulters.len(),
        safe,
        defaulters,
        threshold,
    }
}

/// A single student's attendance, as shown on their own dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentReport<'a> {
    pub student: &'a Student,
    /// `None` if the student's year is unknown, in which case no session applies to them.
    pub cohort: Option<Cohort>,
    pub tally: Tally,
    pub threshold: u8,
}

impl StudentReport<'_> {
    pub fn percentage(&self, mode: FilterMode) -> u8 {
        self.tally.percentage(mode)
    }

    pub fn is_safe(&self, mode: FilterMode) -> bool {
        self.percentage(mode) >= self.threshold
    }
}

/// Builds the attendance report of one student, in the cohort they belong to.
pub fn student_report<'a>(
    snapshot: &'a Snapshot,
    student_id: &str,
    criteria: &Criteria,
) -> Result<StudentReport<'a>> {
    let student = snapshot
        .students
        .iter()
        .find(|s| s.id == student_id)
        .ok_or_else(|| AcadexError::UnknownStudent(student_id.to_string()))?;

    let cohort = Cohort::of(student);
    let tally = tally(snapshot, student);
    let threshold = student
        .year
        .map(|year| criteria.threshold(year))
        .unwrap_or(criteria.default);

    Ok(StudentReport {
        student,
        cohort,
        tally,
        threshold,
    })
}
