use crate::analytics::{Criteria, Snapshot};
use crate::error::{AcadexError, Result};
use crate::models::{
    Presence, PresenceRow, Session, SessionRow, Student, StudentRow, Year, roll_order,
};
use crate::schema::{attendance, criteria, sessions, students};
use crate::settings::Settings;
use chrono::Utc;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use std::collections::HashSet;

/// Creates every table the manager needs. Safe to run against an existing database.
const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS students (
    id TEXT NOT NULL,
    institute_id TEXT NOT NULL,
    department TEXT NOT NULL,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    email TEXT NOT NULL,
    year TEXT NOT NULL,
    division TEXT,
    roll_no TEXT NOT NULL,
    PRIMARY KEY (institute_id, department, id)
);

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY NOT NULL,
    institute_id TEXT NOT NULL,
    department TEXT NOT NULL,
    subject TEXT NOT NULL,
    target_year TEXT NOT NULL,
    division TEXT NOT NULL,
    kind TEXT NOT NULL,
    roll_start INTEGER,
    roll_end INTEGER,
    held_on DATE NOT NULL
);

CREATE TABLE IF NOT EXISTS attendance (
    student TEXT NOT NULL,
    session TEXT NOT NULL,
    marked_at TIMESTAMP NOT NULL,
    PRIMARY KEY (student, session)
);

CREATE TABLE IF NOT EXISTS criteria (
    institute_id TEXT NOT NULL,
    department TEXT NOT NULL,
    year TEXT NOT NULL,
    threshold INTEGER NOT NULL,
    PRIMARY KEY (institute_id, department, year)
);
";

/// The manager for recording, modifying, and retrieving the attendance data of one department of
/// one institute.
pub struct AttendanceManager {
    db: SqliteConnection,
    institute: String,
    department: String,
}

impl AttendanceManager {
    /// Connects to the `sqlite3` database at `database_url`, creating the tables if they do not
    /// exist yet. Every operation is scoped to `institute` and `department`.
    pub fn establish(database_url: &str, institute: &str, department: &str) -> Result<Self> {
        let mut db = SqliteConnection::establish(database_url)?;
        db.batch_execute(CREATE_TABLES)?;

        log::debug!("connected to {database_url} as {institute}/{department}");

        Ok(Self {
            db,
            institute: institute.to_string(),
            department: department.to_string(),
        })
    }

    /// Connects using the configured database and scope.
    pub fn connect(settings: &Settings) -> Result<Self> {
        Self::establish(
            &settings.database_url,
            &settings.institute,
            &settings.department,
        )
    }

    /// Returns the total number of students on the roster.
    pub fn num_students(&mut self) -> Result<usize> {
        let count: i64 = students::table
            .filter(students::institute_id.eq(self.institute.as_str()))
            .filter(students::department.eq(self.department.as_str()))
            .count()
            .get_result(&mut self.db)?;

        Ok(count as usize)
    }

    /// Retrieves all students on the roster, ordered by roll number.
    pub fn roster(&mut self) -> Result<Vec<Student>> {
        let rows: Vec<StudentRow> = students::table
            .filter(students::institute_id.eq(self.institute.as_str()))
            .filter(students::department.eq(self.department.as_str()))
            .select(StudentRow::as_select())
            .load(&mut self.db)?;

        let mut roster: Vec<Student> = rows.into_iter().map(Student::from).collect();
        roster.sort_by(|a, b| roll_order(&a.roll_no, &b.roll_no).then_with(|| a.id.cmp(&b.id)));

        Ok(roster)
    }

    /// Retrieves a specific student from the roster based on their ID.
    pub fn get_student(&mut self, student_id: &str) -> Result<Student> {
        students::table
            .filter(students::id.eq(student_id))
            .filter(students::institute_id.eq(self.institute.as_str()))
            .filter(students::department.eq(self.department.as_str()))
            .select(StudentRow::as_select())
            .first::<StudentRow>(&mut self.db)
            .optional()?
            .map(Student::from)
            .ok_or_else(|| AcadexError::UnknownStudent(student_id.to_string()))
    }

    /// Inserts students into the roster, replacing any existing record with the same ID in this
    /// institute and department. Students are always stored under the manager's scope.
    ///
    /// Returns the number of students written.
    pub fn insert_students(&mut self, new_students: &[Student]) -> Result<usize> {
        let rows: Vec<StudentRow> = new_students
            .iter()
            .map(|student| StudentRow::new(student, &self.institute, &self.department))
            .collect();

        if rows.is_empty() {
            return Ok(0);
        }

        let written = diesel::replace_into(students::table)
            .values(&rows)
            .execute(&mut self.db)?;

        log::info!("wrote {written} students to the roster");

        Ok(written)
    }

    /// Removes and returns a student from the roster given their ID, together with their
    /// attendance records.
    pub fn delete_student(&mut self, student_id: &str) -> Result<Student> {
        let institute = self.institute.as_str();
        let department = self.department.as_str();

        let removed = self.db.transaction::<_, AcadexError, _>(|conn| {
            let row = diesel::delete(students::table)
                .filter(students::id.eq(student_id))
                .filter(students::institute_id.eq(institute))
                .filter(students::department.eq(department))
                .returning(StudentRow::as_returning())
                .get_result::<StudentRow>(conn)
                .optional()?
                .ok_or_else(|| AcadexError::UnknownStudent(student_id.to_string()))?;

            let in_scope = sessions::table
                .filter(sessions::institute_id.eq(institute))
                .filter(sessions::department.eq(department))
                .select(sessions::id);

            let records = diesel::delete(attendance::table)
                .filter(attendance::student.eq(student_id))
                .filter(attendance::session.eq_any(in_scope))
                .execute(conn)?;

            log::info!("removed student {student_id} and {records} attendance records");

            Ok(row)
        })?;

        Ok(Student::from(removed))
    }

    /// Records a new session.
    pub fn insert_session(&mut self, session: &Session) -> Result<()> {
        let row = SessionRow::new(session, &self.institute, &self.department);

        diesel::insert_into(sessions::table)
            .values(&row)
            .execute(&mut self.db)?;

        log::info!(
            "added {} {} session {} for {}",
            session.subject,
            session.kind,
            session.id,
            session.target_year
        );

        Ok(())
    }

    /// Retrieves every session in scope, oldest first. Sessions that cannot be read back are
    /// skipped.
    pub fn sessions(&mut self) -> Result<Vec<Session>> {
        let rows: Vec<SessionRow> = sessions::table
            .filter(sessions::institute_id.eq(self.institute.as_str()))
            .filter(sessions::department.eq(self.department.as_str()))
            .order((sessions::held_on.asc(), sessions::id.asc()))
            .select(SessionRow::as_select())
            .load(&mut self.db)?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id.clone();
                Session::try_from(row)
                    .inspect_err(|e| log::warn!("skipping unreadable session {id}: {e}"))
                    .ok()
            })
            .collect())
    }

    /// Retrieves a specific session based on its ID.
    pub fn get_session(&mut self, session_id: &str) -> Result<Session> {
        let row = sessions::table
            .filter(sessions::id.eq(session_id))
            .filter(sessions::institute_id.eq(self.institute.as_str()))
            .filter(sessions::department.eq(self.department.as_str()))
            .select(SessionRow::as_select())
            .first::<SessionRow>(&mut self.db)
            .optional()?
            .ok_or_else(|| AcadexError::UnknownSession(session_id.to_string()))?;

        Session::try_from(row)
    }

    /// Marks all of the given students as present at a session.
    ///
    /// If `student_ids` contains an ID that is not on the roster, this function will ignore it.
    /// Students already marked present stay marked once. Returns the number of new records.
    pub fn mark_present(&mut self, session_id: &str, student_ids: &[&str]) -> Result<usize> {
        self.get_session(session_id)?;

        let roster: HashSet<String> = self.roster()?.into_iter().map(|s| s.id).collect();
        let marked_at = Utc::now().naive_utc();

        let records: Vec<PresenceRow> = student_ids
            .iter()
            .filter(|&&id| {
                if roster.contains(id) {
                    true
                } else {
                    log::warn!("tried to mark unknown student {id} present at {session_id}");
                    false
                }
            })
            .map(|&id| PresenceRow {
                student: id.to_string(),
                session: session_id.to_string(),
                marked_at,
            })
            .collect();

        if records.is_empty() {
            return Ok(0);
        }

        // Existing records are left alone, so a student is never counted twice for a session.
        let inserted = diesel::insert_or_ignore_into(attendance::table)
            .values(&records)
            .execute(&mut self.db)?;

        log::info!("marked {inserted} students present at {session_id}");

        Ok(inserted)
    }

    /// Retrieves the presence records of every session in scope.
    pub fn attendance(&mut self) -> Result<Vec<Presence>> {
        let rows: Vec<PresenceRow> = attendance::table
            .inner_join(sessions::table)
            .filter(sessions::institute_id.eq(self.institute.as_str()))
            .filter(sessions::department.eq(self.department.as_str()))
            .select(PresenceRow::as_select())
            .load(&mut self.db)?;

        Ok(rows.into_iter().map(Presence::from).collect())
    }

    /// Loads everything the aggregation needs in one go.
    pub fn snapshot(&mut self) -> Result<Snapshot> {
        let snapshot = Snapshot {
            students: self.roster()?,
            sessions: self.sessions()?,
            attendance: self.attendance()?,
        };

        log::debug!(
            "loaded {} students, {} sessions and {} attendance records",
            snapshot.students.len(),
            snapshot.sessions.len(),
            snapshot.attendance.len()
        );

        Ok(snapshot)
    }

    /// Applies the stored per-year thresholds on top of `base`.
    pub fn criteria(&mut self, base: Criteria) -> Result<Criteria> {
        let stored = criteria::table
            .filter(criteria::institute_id.eq(self.institute.as_str()))
            .filter(criteria::department.eq(self.department.as_str()))
            .select((criteria::year, criteria::threshold))
            .load::<(String, i32)>(&mut self.db)?;

        let mut merged = base;
        for (year, threshold) in stored {
            match (year.parse::<Year>(), u8::try_from(threshold)) {
                (Ok(year), Ok(threshold)) if threshold <= 100 => merged.set(year, threshold),
                _ => log::warn!("ignoring invalid criteria {threshold}% for '{year}'"),
            }
        }

        Ok(merged)
    }

    /// Sets the minimum attendance percentage for a year.
    pub fn set_threshold(&mut self, year: Year, threshold: u8) -> Result<()> {
        if threshold > 100 {
            return Err(AcadexError::InvalidThreshold(threshold.into()));
        }

        diesel::replace_into(criteria::table)
            .values((
                criteria::institute_id.eq(self.institute.as_str()),
                criteria::department.eq(self.department.as_str()),
                criteria::year.eq(year.as_str()),
                criteria::threshold.eq(i32::from(threshold)),
            ))
            .execute(&mut self.db)?;

        log::info!("set {year} attendance criteria to {threshold}%");

        Ok(())
    }
}
