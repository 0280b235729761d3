//! The typed records of the attendance domain, and the rows they are stored as.

use crate::error::{AcadexError, Result};
use crate::schema::{attendance, sessions, students};
use chrono::{NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use diesel::prelude::*;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// The cohort a student is enrolled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Year {
    /// First year.
    Fe,
    /// Second year.
    Se,
    /// Third year.
    Te,
    /// Final (Bachelor's) year.
    Be,
}

impl Year {
    pub const ALL: [Year; 4] = [Year::Fe, Year::Se, Year::Te, Year::Be];

    pub fn as_str(self) -> &'static str {
        match self {
            Year::Fe => "FE",
            Year::Se => "SE",
            Year::Te => "TE",
            Year::Be => "BE",
        }
    }

    /// First-year students are grouped by division rather than by year.
    pub fn is_division_based(self) -> bool {
        self == Year::Fe
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Year {
    type Err = AcadexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FE" => Ok(Year::Fe),
            "SE" => Ok(Year::Se),
            "TE" => Ok(Year::Te),
            "BE" => Ok(Year::Be),
            _ => Err(AcadexError::UnknownYear(s.to_string())),
        }
    }
}

/// A lettered subgroup of first-year students, always stored uppercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Division(char);

impl Division {
    /// The division assumed for students whose record has none.
    pub const FALLBACK: Division = Division('A');

    pub fn new(letter: char) -> Result<Self> {
        if letter.is_ascii_alphabetic() {
            Ok(Division(letter.to_ascii_uppercase()))
        } else {
            Err(AcadexError::InvalidDivision(letter.to_string()))
        }
    }

    pub fn letter(self) -> char {
        self.0
    }
}

impl fmt::Display for Division {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Division {
    type Err = AcadexError;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) => Division::new(letter),
            _ => Err(AcadexError::InvalidDivision(s.to_string())),
        }
    }
}

/// The year a session is held for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetYear {
    All,
    Year(Year),
}

impl TargetYear {
    pub fn includes(self, year: Year) -> bool {
        match self {
            TargetYear::All => true,
            TargetYear::Year(target) => target == year,
        }
    }
}

impl fmt::Display for TargetYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetYear::All => f.write_str("All"),
            TargetYear::Year(year) => year.fmt(f),
        }
    }
}

impl FromStr for TargetYear {
    type Err = AcadexError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(TargetYear::All)
        } else {
            s.parse().map(TargetYear::Year)
        }
    }
}

/// The division a session is restricted to, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DivisionScope {
    All,
    Only(Division),
}

impl DivisionScope {
    pub fn includes(self, division: Division) -> bool {
        match self {
            DivisionScope::All => true,
            DivisionScope::Only(only) => only == division,
        }
    }
}

impl fmt::Display for DivisionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DivisionScope::All => f.write_str("All"),
            DivisionScope::Only(division) => division.fmt(f),
        }
    }
}

impl FromStr for DivisionScope {
    type Err = AcadexError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(DivisionScope::All)
        } else {
            s.parse().map(DivisionScope::Only)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum SessionKind {
    Theory,
    Practical,
}

impl SessionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionKind::Theory => "theory",
            SessionKind::Practical => "practical",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionKind {
    type Err = AcadexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "theory" => Ok(SessionKind::Theory),
            "practical" => Ok(SessionKind::Practical),
            _ => Err(AcadexError::UnknownSessionKind(s.to_string())),
        }
    }
}

/// An inclusive range of roll numbers forming one practical batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RollRange {
    start: u32,
    end: u32,
}

impl RollRange {
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if start > end {
            return Err(AcadexError::InvalidRollRange(format!("{start}-{end}")));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn contains(&self, roll: u32) -> bool {
        (self.start..=self.end).contains(&roll)
    }
}

impl fmt::Display for RollRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for RollRange {
    type Err = AcadexError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || AcadexError::InvalidRollRange(s.to_string());

        let (start, end) = s.split_once('-').ok_or_else(invalid)?;
        let start = start.trim().parse().map_err(|_| invalid())?;
        let end = end.trim().parse().map_err(|_| invalid())?;

        RollRange::new(start, end).map_err(|_| invalid())
    }
}

/// Parses a roll number such as `"031"` into its numeric value.
pub fn parse_roll(roll: &str) -> Option<u32> {
    roll.trim().parse().ok()
}

/// Orders roll numbers numerically where possible. Numeric rolls come first, anything else follows
/// in lexicographic order.
pub fn roll_order(a: &str, b: &str) -> Ordering {
    match (parse_roll(a), parse_roll(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department: String,
    /// `None` when the stored year is missing or unrecognised.
    pub year: Option<Year>,
    pub division: Option<Division>,
    pub roll_no: String,
}

impl Student {
    /// The student's division, falling back to [`Division::FALLBACK`] when the record has none.
    pub fn division_or_default(&self) -> Division {
        self.division.unwrap_or(Division::FALLBACK)
    }

    pub fn roll(&self) -> Option<u32> {
        parse_roll(&self.roll_no)
    }

    pub fn full_name(&self) -> String {
        if self.last_name.is_empty() {
            self.first_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }
}

/// One scheduled and held class occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub subject: String,
    pub target_year: TargetYear,
    pub division: DivisionScope,
    pub kind: SessionKind,
    /// Only meaningful for practicals. `None` means no batching is configured.
    pub roll_range: Option<RollRange>,
    pub held_on: NaiveDate,
}

/// A student was present at a session. Absence is never recorded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Presence {
    pub student_id: String,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = students)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StudentRow {
    pub id: String,
    pub institute_id: String,
    pub department: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub year: String,
    pub division: Option<String>,
    pub roll_no: String,
}

impl StudentRow {
    /// Builds the stored row of `student` within the given scope. The scope's department wins
    /// over whatever department the student record carries.
    pub fn new(student: &Student, institute_id: &str, department: &str) -> Self {
        if student.department != department {
            log::warn!(
                "storing student {} under {department} instead of {}",
                student.id,
                student.department
            );
        }

        Self {
            id: student.id.clone(),
            institute_id: institute_id.to_string(),
            department: department.to_string(),
            first_name: student.first_name.clone(),
            last_name: student.last_name.clone(),
            email: student.email.clone(),
            year: student.year.map(|y| y.to_string()).unwrap_or_default(),
            division: student.division.map(|d| d.to_string()),
            roll_no: student.roll_no.clone(),
        }
    }
}

impl From<StudentRow> for Student {
    fn from(row: StudentRow) -> Self {
        let year = row
            .year
            .parse()
            .inspect_err(|_| log::warn!("student {} has unrecognised year '{}'", row.id, row.year))
            .ok();

        let division = row.division.as_deref().and_then(|d| {
            d.parse()
                .inspect_err(|_| log::warn!("student {} has invalid division '{}'", row.id, d))
                .ok()
        });

        Student {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            department: row.department,
            year,
            division,
            roll_no: row.roll_no,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = sessions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SessionRow {
    pub id: String,
    pub institute_id: String,
    pub department: String,
    pub subject: String,
    pub target_year: String,
    pub division: String,
    pub kind: String,
    pub roll_start: Option<i32>,
    pub roll_end: Option<i32>,
    pub held_on: NaiveDate,
}

impl SessionRow {
    pub fn new(session: &Session, institute_id: &str, department: &str) -> Self {
        // Saturates at `i32::MAX`.
        let bound = |n: u32| i32::try_from(n).unwrap_or(i32::MAX);

        Self {
            id: session.id.clone(),
            institute_id: institute_id.to_string(),
            department: department.to_string(),
            subject: session.subject.clone(),
            target_year: session.target_year.to_string(),
            division: session.division.to_string(),
            kind: session.kind.to_string(),
            roll_start: session.roll_range.map(|r| bound(r.start())),
            roll_end: session.roll_range.map(|r| bound(r.end())),
            held_on: session.held_on,
        }
    }
}

impl TryFrom<SessionRow> for Session {
    type Error = AcadexError;

    fn try_from(row: SessionRow) -> Result<Self> {
        let roll_range = match (row.roll_start, row.roll_end) {
            (Some(start), Some(end)) => {
                let invalid = || AcadexError::InvalidRollRange(format!("{start}-{end}"));
                let start = u32::try_from(start).map_err(|_| invalid())?;
                let end = u32::try_from(end).map_err(|_| invalid())?;
                Some(RollRange::new(start, end)?)
            }
            _ => None,
        };

        Ok(Session {
            target_year: row.target_year.parse()?,
            division: row.division.parse()?,
            kind: row.kind.parse()?,
            roll_range,
            id: row.id,
            subject: row.subject,
            held_on: row.held_on,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = attendance)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PresenceRow {
    pub student: String,
    pub session: String,
    pub marked_at: NaiveDateTime,
}

impl From<PresenceRow> for Presence {
    fn from(row: PresenceRow) -> Self {
        Presence {
            student_id: row.student,
            session_id: row.session,
        }
    }
}
