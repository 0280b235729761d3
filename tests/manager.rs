use acadex::analytics::{self, AnalyticsQuery, Cohort, Criteria, FilterMode};
use acadex::models::{
    Division, DivisionScope, RollRange, Session, SessionKind, Student, TargetYear, Year,
};
use acadex::roster::{self, ImportDefaults};
use acadex::{AcadexError, AttendanceManager};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn manager() -> AttendanceManager {
    AttendanceManager::establish(":memory:", "vit", "Computer").unwrap()
}

fn temp_database(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}-{nanos}.sqlite3"))
}

fn student(id: &str, year: Year, roll: &str) -> Student {
    Student {
        id: id.to_string(),
        first_name: id.to_string(),
        last_name: "Test".to_string(),
        email: format!("{id}@vit.edu"),
        department: "Computer".to_string(),
        year: Some(year),
        division: None,
        roll_no: roll.to_string(),
    }
}

fn session(id: &str, year: Year, kind: SessionKind, rolls: Option<RollRange>) -> Session {
    Session {
        id: id.to_string(),
        subject: "Operating Systems".to_string(),
        target_year: TargetYear::Year(year),
        division: DivisionScope::All,
        kind,
        roll_range: rolls,
        held_on: NaiveDate::from_ymd_opt(2024, 8, 12).unwrap(),
    }
}

#[test]
fn roster_is_scoped_and_ordered() {
    let path = temp_database("acadex-roster");
    let url = path.to_string_lossy().into_owned();

    let mut manager = AttendanceManager::establish(&url, "vit", "Computer").unwrap();
    manager
        .insert_students(&[
            student("c", Year::Se, "10"),
            student("a", Year::Se, "2"),
            student("b", Year::Te, "1"),
        ])
        .unwrap();

    let mut mechanical = AttendanceManager::establish(&url, "vit", "Mechanical").unwrap();
    mechanical.insert_students(&[student("x", Year::Se, "1")]).unwrap();
    assert_eq!(mechanical.num_students().unwrap(), 1);

    let rolls: Vec<String> = manager.roster().unwrap().into_iter().map(|s| s.roll_no).collect();
    assert_eq!(rolls, ["1", "2", "10"]);
    assert_eq!(manager.num_students().unwrap(), 3);
    assert!(matches!(
        manager.get_student("x"),
        Err(AcadexError::UnknownStudent(_))
    ));

    drop(manager);
    drop(mechanical);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn students_round_trip() {
    let mut manager = manager();
    let mut fe = student("fe1", Year::Fe, "007");
    fe.division = Some(Division::new('C').unwrap());
    manager.insert_students(std::slice::from_ref(&fe)).unwrap();

    assert_eq!(manager.get_student("fe1").unwrap(), fe);

    fe.email = "new@vit.edu".to_string();
    manager.insert_students(std::slice::from_ref(&fe)).unwrap();
    assert_eq!(manager.get_student("fe1").unwrap().email, "new@vit.edu");
    assert_eq!(manager.num_students().unwrap(), 1);
}

#[test]
fn sessions_round_trip() {
    let mut manager = manager();
    let lab = session(
        "lab",
        Year::Se,
        SessionKind::Practical,
        Some(RollRange::new(1, 20).unwrap()),
    );
    let mut lecture = session("lecture", Year::Se, SessionKind::Theory, None);
    lecture.target_year = TargetYear::All;
    lecture.division = DivisionScope::Only(Division::new('B').unwrap());

    manager.insert_session(&lab).unwrap();
    manager.insert_session(&lecture).unwrap();

    assert_eq!(manager.get_session("lab").unwrap(), lab);
    assert_eq!(manager.sessions().unwrap(), vec![lab, lecture]);
    assert!(matches!(
        manager.get_session("missing"),
        Err(AcadexError::UnknownSession(_))
    ));
}

#[test]
fn marking_present_ignores_unknown_and_repeated_students() {
    let mut manager = manager();
    manager
        .insert_students(&[student("a", Year::Se, "1"), student("b", Year::Se, "2")])
        .unwrap();
    manager
        .insert_session(&session("s1", Year::Se, SessionKind::Theory, None))
        .unwrap();

    assert_eq!(manager.mark_present("s1", &["a", "ghost"]).unwrap(), 1);
    assert_eq!(manager.mark_present("s1", &["a", "b"]).unwrap(), 1);
    assert_eq!(manager.mark_present("s1", &[]).unwrap(), 0);
    assert_eq!(manager.attendance().unwrap().len(), 2);

    assert!(matches!(
        manager.mark_present("nope", &["a"]),
        Err(AcadexError::UnknownSession(_))
    ));
}

#[test]
fn deleting_a_student_removes_their_attendance() {
    let mut manager = manager();
    manager
        .insert_students(&[student("a", Year::Se, "1"), student("b", Year::Se, "2")])
        .unwrap();
    manager
        .insert_session(&session("s1", Year::Se, SessionKind::Theory, None))
        .unwrap();
    manager.mark_present("s1", &["a", "b"]).unwrap();

    let removed = manager.delete_student("a").unwrap();
    assert_eq!(removed.id, "a");
    assert_eq!(manager.attendance().unwrap().len(), 1);
    assert!(matches!(
        manager.delete_student("a"),
        Err(AcadexError::UnknownStudent(_))
    ));
}

#[test]
fn students_are_stored_under_the_manager_scope() {
    let mut manager = manager();
    let mut elsewhere = student("s1", Year::Se, "1");
    elsewhere.department = "Mechanical".to_string();
    manager.insert_students(&[elsewhere]).unwrap();

    let stored = manager.get_student("s1").unwrap();
    assert_eq!(stored.department, "Computer");
    assert_eq!(manager.num_students().unwrap(), 1);
}

#[test]
fn scopes_sharing_a_database_keep_their_own_students() {
    let path = temp_database("acadex-scopes");
    let url = path.to_string_lossy().into_owned();

    let mut vit = AttendanceManager::establish(&url, "vit", "Computer").unwrap();
    let mut coep = AttendanceManager::establish(&url, "coep", "Computer").unwrap();

    let mut vit_student = student("s1", Year::Se, "1");
    vit_student.first_name = "Asha".to_string();
    let mut coep_student = student("s1", Year::Te, "9");
    coep_student.first_name = "Rohan".to_string();

    vit.insert_students(std::slice::from_ref(&vit_student)).unwrap();
    coep.insert_students(std::slice::from_ref(&coep_student)).unwrap();

    assert_eq!(vit.get_student("s1").unwrap(), vit_student);
    assert_eq!(coep.get_student("s1").unwrap(), coep_student);

    vit.insert_session(&session("vit-os", Year::Se, SessionKind::Theory, None)).unwrap();
    coep.insert_session(&session("coep-os", Year::Te, SessionKind::Theory, None)).unwrap();
    vit.mark_present("vit-os", &["s1"]).unwrap();
    coep.mark_present("coep-os", &["s1"]).unwrap();

    vit.delete_student("s1").unwrap();
    assert!(vit.attendance().unwrap().is_empty());
    assert_eq!(coep.get_student("s1").unwrap(), coep_student);
    assert_eq!(coep.attendance().unwrap().len(), 1);

    drop(vit);
    drop(coep);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn criteria_override_the_default() {
    let mut manager = manager();
    manager.set_threshold(Year::Te, 60).unwrap();
    manager.set_threshold(Year::Te, 65).unwrap();

    let criteria = manager.criteria(Criteria::new(80)).unwrap();
    assert_eq!(criteria.threshold(Year::Te), 65);
    assert_eq!(criteria.threshold(Year::Be), 80);

    assert!(matches!(
        manager.set_threshold(Year::Te, 120),
        Err(AcadexError::InvalidThreshold(120))
    ));
}

#[test]
fn analytics_from_stored_data() {
    let mut manager = manager();

    let csv = "Roll No,Name\n15,Asha Patil\n25,Rohan Desai\n";
    let defaults = ImportDefaults {
        department: "Computer".to_string(),
        year: Some(Year::Se),
        division: None,
    };
    let students = roster::read_students(csv.as_bytes(), &defaults).unwrap();
    manager.insert_students(&students).unwrap();

    let batch = RollRange::new(1, 20).unwrap();
    for i in 0..10 {
        manager
            .insert_session(&session(&format!("th{i}"), Year::Se, SessionKind::Theory, None))
            .unwrap();
    }
    for i in 0..5 {
        manager
            .insert_session(&session(
                &format!("pr{i}"),
                Year::Se,
                SessionKind::Practical,
                Some(batch),
            ))
            .unwrap();
    }

    let asha = "computer-se-15";
    let rohan = "computer-se-25";
    for i in 0..8 {
        manager.mark_present(&format!("th{i}"), &[asha, rohan]).unwrap();
    }
    for i in 0..3 {
        manager.mark_present(&format!("pr{i}"), &[asha, rohan]).unwrap();
    }

    let snapshot = manager.snapshot().unwrap();
    let criteria = manager.criteria(Criteria::default()).unwrap();
    let report = analytics::aggregate(
        &snapshot,
        &AnalyticsQuery::new(Cohort::Year(Year::Se), FilterMode::Overall),
        &criteria,
    );

    assert_eq!(report.total, 2);
    let asha_standing = report.standing(asha).unwrap();
    assert_eq!((asha_standing.attended, asha_standing.total), (11, 15));
    assert_eq!(asha_standing.percentage, 73);
    assert_eq!(report.defaulters.len(), 1);

    // Rohan is outside the practical batch, so his practical marks do not count.
    let rohan_standing = report.standing(rohan).unwrap();
    assert_eq!((rohan_standing.attended, rohan_standing.total), (8, 10));
    assert_eq!(rohan_standing.percentage, 80);

    manager.set_threshold(Year::Se, 70).unwrap();
    let criteria = manager.criteria(Criteria::default()).unwrap();
    let report = analytics::aggregate(
        &snapshot,
        &AnalyticsQuery::new(Cohort::Year(Year::Se), FilterMode::Overall),
        &criteria,
    );
    assert!(report.defaulters.is_empty());
}
