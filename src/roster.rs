//! Bulk import of students from CSV exports.
//!
//! Roster spreadsheets come from many places and rarely agree on headers, so columns are found by
//! sniffing: headers are compared case-insensitively with spaces, underscores, dots and dashes
//! removed, against a list of known aliases.

use crate::error::{AcadexError, Result};
use crate::models::{Division, Student, Year};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

const ROLL: &[&str] = &["roll", "rollno", "rollnumber"];
const FIRST_NAME: &[&str] = &["firstname", "first", "name"];
const LAST_NAME: &[&str] = &["lastname", "last", "surname"];
const EMAIL: &[&str] = &["email", "emailid", "mail"];
const ID: &[&str] = &["id", "studentid", "uid"];
const YEAR: &[&str] = &["year", "class"];
const DIVISION: &[&str] = &["division", "div"];

/// Values used for columns a roster does not have, or leaves blank.
#[derive(Debug, Clone, Default)]
pub struct ImportDefaults {
    pub department: String,
    pub year: Option<Year>,
    pub division: Option<Division>,
}

fn normalise(header: &str) -> String {
    header
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '.' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Finds the first alias present in the headers, returning its column and the alias matched.
fn sniff(headers: &[String], aliases: &[&'static str]) -> Option<(usize, &'static str)> {
    aliases.iter().find_map(|&alias| {
        headers
            .iter()
            .position(|header| header == alias)
            .map(|column| (column, alias))
    })
}

#[derive(Debug)]
struct Columns {
    roll: usize,
    first_name: usize,
    /// The first-name column holds full names that still need splitting.
    full_name: bool,
    last_name: Option<usize>,
    email: Option<usize>,
    id: Option<usize>,
    year: Option<usize>,
    division: Option<usize>,
}

impl Columns {
    fn sniff(headers: &StringRecord) -> Result<Self> {
        let headers: Vec<String> = headers.iter().map(normalise).collect();

        let (roll, _) = sniff(&headers, ROLL).ok_or(AcadexError::MissingColumn("roll number"))?;
        let (first_name, alias) =
            sniff(&headers, FIRST_NAME).ok_or(AcadexError::MissingColumn("name"))?;
        let last_name = sniff(&headers, LAST_NAME).map(|(column, _)| column);

        Ok(Self {
            roll,
            first_name,
            full_name: alias == "name" && last_name.is_none(),
            last_name,
            email: sniff(&headers, EMAIL).map(|(column, _)| column),
            id: sniff(&headers, ID).map(|(column, _)| column),
            year: sniff(&headers, YEAR).map(|(column, _)| column),
            division: sniff(&headers, DIVISION).map(|(column, _)| column),
        })
    }
}

fn field(record: &StringRecord, column: Option<usize>) -> Option<&str> {
    column
        .and_then(|column| record.get(column))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn generated_id(department: &str, year: Option<Year>, roll: &str) -> String {
    let year = year.map(Year::as_str).unwrap_or("na");
    format!("{department}-{year}-{roll}")
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Reads students from CSV data with a header row.
///
/// Rows without a roll number are skipped. Unrecognised years or divisions are kept as missing so
/// the rest of the row still imports.
pub fn read_students<R: Read>(reader: R, defaults: &ImportDefaults) -> Result<Vec<Student>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let columns = Columns::sniff(reader.headers()?)?;
    log::debug!("sniffed roster columns: {columns:?}");

    let mut students = Vec::new();

    for (line, record) in reader.records().enumerate() {
        let record = record?;

        let Some(roll) = field(&record, Some(columns.roll)) else {
            log::warn!("skipping roster row {} without a roll number", line + 2);
            continue;
        };

        let name = field(&record, Some(columns.first_name)).unwrap_or_default();
        let (first_name, last_name) = if columns.full_name {
            name.split_once(char::is_whitespace)
                .map(|(first, last)| (first, last.trim()))
                .unwrap_or((name, ""))
        } else {
            (name, field(&record, columns.last_name).unwrap_or_default())
        };

        let year = match field(&record, columns.year) {
            Some(year) => year
                .parse::<Year>()
                .inspect_err(|e| log::warn!("roster row {}: {e}", line + 2))
                .ok(),
            None => defaults.year,
        };

        let division = match field(&record, columns.division) {
            Some(division) => division
                .parse::<Division>()
                .inspect_err(|e| log::warn!("roster row {}: {e}", line + 2))
                .ok(),
            None => defaults.division,
        };

        let id = field(&record, columns.id)
            .map(str::to_string)
            .unwrap_or_else(|| generated_id(&defaults.department, year, roll));

        students.push(Student {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: field(&record, columns.email).unwrap_or_default().to_string(),
            department: defaults.department.clone(),
            year,
            division,
            roll_no: roll.to_string(),
        });
    }

    log::info!("read {} students from roster", students.len());

    Ok(students)
}

/// Reads students from a CSV file.
pub fn load_students(path: &Path, defaults: &ImportDefaults) -> Result<Vec<Student>> {
    read_students(File::open(path)?, defaults)
}

/// Reads one ID per line, skipping blank lines and `#` comments.
pub fn read_ids<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut ids = Vec::new();

    for line in BufReader::new(reader).lines() {
        let line = line?;
        let id = line.trim();

        if !id.is_empty() && !id.starts_with('#') {
            ids.push(id.to_string());
        }
    }

    Ok(ids)
}

/// The changes that bring a stored roster in line with an imported one.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RosterDiff<'a> {
    /// Students only in the imported roster.
    pub added: Vec<&'a Student>,
    /// Students in both, whose imported record differs.
    pub changed: Vec<&'a Student>,
    /// Students no longer in the imported roster.
    pub dropped: Vec<&'a Student>,
}

impl RosterDiff<'_> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.dropped.is_empty()
    }
}

/// Compares rosters by student ID.
pub fn diff_roster<'a>(current: &'a [Student], incoming: &'a [Student]) -> RosterDiff<'a> {
    let existing: HashMap<&str, &Student> = current.iter().map(|s| (s.id.as_str(), s)).collect();
    let imported: HashMap<&str, &Student> = incoming.iter().map(|s| (s.id.as_str(), s)).collect();

    let mut diff = RosterDiff::default();

    for student in incoming {
        match existing.get(student.id.as_str()) {
            None => diff.added.push(student),
            Some(&old) if old != student => diff.changed.push(student),
            Some(_) => {}
        }
    }

    diff.dropped = current
        .iter()
        .filter(|student| !imported.contains_key(student.id.as_str()))
        .collect();

    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> ImportDefaults {
        ImportDefaults {
            department: "Computer Engg".to_string(),
            year: Some(Year::Se),
            division: None,
        }
    }

    #[test]
    fn sniffs_common_headers() {
        let csv = "\
Roll No,First Name,Last_Name,E-Mail,Student ID
1,Asha,Patil,asha@example.edu,S001
02,Rohan,Desai,rohan@example.edu,S002
";
        let students = read_students(csv.as_bytes(), &defaults()).unwrap();

        assert_eq!(students.len(), 2);
        assert_eq!(students[0].id, "S001");
        assert_eq!(students[0].first_name, "Asha");
        assert_eq!(students[0].last_name, "Patil");
        assert_eq!(students[0].email, "asha@example.edu");
        assert_eq!(students[1].roll_no, "02");
        assert_eq!(students[1].year, Some(Year::Se));
        assert_eq!(students[1].department, "Computer Engg");
    }

    #[test]
    fn splits_full_names_and_generates_ids() {
        let csv = "name,roll,division,year\nMeera Nair Iyer,7,b,fe\nKabir,8,,FE\n";
        let students = read_students(csv.as_bytes(), &defaults()).unwrap();

        assert_eq!(students[0].first_name, "Meera");
        assert_eq!(students[0].last_name, "Nair Iyer");
        assert_eq!(students[0].division, Some(Division::new('B').unwrap()));
        assert_eq!(students[0].year, Some(Year::Fe));
        assert_eq!(students[0].id, "computer-engg-fe-7");

        assert_eq!(students[1].last_name, "");
        assert_eq!(students[1].division, None);
    }

    #[test]
    fn bad_values_degrade_and_blank_rows_are_skipped() {
        let csv = "roll,firstname,year,div\n1,Asha,XE,9\n,Nobody,SE,A\n3,Ira,,\n";
        let students = read_students(csv.as_bytes(), &defaults()).unwrap();

        assert_eq!(students.len(), 2);
        assert_eq!(students[0].year, None);
        assert_eq!(students[0].division, None);
        assert_eq!(students[1].year, Some(Year::Se));
    }

    #[test]
    fn missing_required_columns() {
        let no_roll = read_students("name,email\nAsha,a@x\n".as_bytes(), &defaults());
        assert!(matches!(no_roll, Err(AcadexError::MissingColumn("roll number"))));

        let no_name = read_students("roll,email\n1,a@x\n".as_bytes(), &defaults());
        assert!(matches!(no_name, Err(AcadexError::MissingColumn("name"))));
    }

    #[test]
    fn id_lists_skip_comments() {
        let ids = read_ids("# week 3 lab\nS001\n\n  S002 \n#S003\n".as_bytes()).unwrap();
        assert_eq!(ids, ["S001", "S002"]);
    }

    fn ids<'a>(students: &[&'a Student]) -> Vec<&'a str> {
        students.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn diffs_by_id() {
        let csv = "id,roll,name\na,1,Asha\nb,2,Rohan\nc,3,Ira\n";
        let current = read_students(csv.as_bytes(), &defaults()).unwrap();

        let csv = "id,roll,name\nb,2,Rohan\nc,3,Ira K\nd,4,Dev\n";
        let incoming = read_students(csv.as_bytes(), &defaults()).unwrap();

        let diff = diff_roster(&current, &incoming);

        assert_eq!(ids(&diff.added), ["d"]);
        assert_eq!(ids(&diff.changed), ["c"]);
        assert_eq!(ids(&diff.dropped), ["a"]);
        assert!(diff_roster(&current, &current).is_empty());
    }
}
