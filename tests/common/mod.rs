#![allow(dead_code)]

use courseflow::db::{self, repository};
use courseflow::models::{
    Batch, Course, CourseRequest, CourseSlot, NewBatch, NewCourse, NewCourseSlot, NewStudent,
    RequestKind, Student,
};
use courseflow::state_machine::RequestStatus;
use sqlx::SqlitePool;
use std::path::PathBuf;
use uuid::Uuid;

pub const YEAR: &str = "2025-26";
pub const SEMESTER: &str = "odd";

/// In-memory databases live per connection, so the pool is capped at one.
pub async fn setup_test_db() -> SqlitePool {
    db::connect("sqlite::memory:", 1)
        .await
        .expect("Failed to create test db")
}

/// File-backed database so several pooled connections write at the same time.
pub async fn setup_file_db(max_connections: u32) -> (SqlitePool, PathBuf) {
    let path = std::env::temp_dir().join(format!("courseflow-{}.db", Uuid::new_v4()));
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let pool = db::connect(&url, max_connections)
        .await
        .expect("Failed to create file db");
    (pool, path)
}

pub async fn remove_file_db(pool: SqlitePool, path: PathBuf) {
    pool.close().await;
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
    }
}

/// Makes every UPDATE of one request fail inside the database.
pub async fn break_updates_for(db: &SqlitePool, request: &CourseRequest) {
    let sql = format!(
        "CREATE TRIGGER fail_request_update BEFORE UPDATE ON course_requests \
         WHEN NEW.id = '{}' BEGIN SELECT RAISE(ABORT, 'disk gone'); END",
        request.id
    );
    sqlx::query(&sql)
        .execute(db)
        .await
        .expect("Failed to create trigger");
}

pub async fn seed_batch(db: &SqlitePool, discipline: &str, year: i32) -> Batch {
    repository::insert_batch(
        db,
        NewBatch {
            programme: "B.Tech".to_string(),
            discipline: discipline.to_string(),
            year,
        },
    )
    .await
    .expect("Failed to insert batch")
}

pub async fn seed_student(db: &SqlitePool, batch: &Batch, username: &str, semester: i32) -> Student {
    repository::insert_student(
        db,
        NewStudent {
            username: username.to_string(),
            current_batch: batch.id.clone(),
            current_batch_year: batch.year,
            current_semester_no: semester,
        },
    )
    .await
    .expect("Failed to insert student")
}

pub async fn seed_course(db: &SqlitePool, code: &str, capacity: Option<i64>) -> Course {
    repository::insert_course(
        db,
        NewCourse {
            code: code.to_string(),
            name: format!("Course {code}"),
            credit: 3,
            capacity,
        },
    )
    .await
    .expect("Failed to insert course")
}

pub async fn seed_slot(db: &SqlitePool, name: &str, year: &str, courses: &[&Course]) -> CourseSlot {
    repository::insert_slot(
        db,
        NewCourseSlot {
            name: name.to_string(),
            academic_year: year.to_string(),
            semester_type: SEMESTER.to_string(),
            course_ids: courses.iter().map(|c| c.id.clone()).collect(),
        },
    )
    .await
    .expect("Failed to insert slot")
}

/// Stores a request directly so tests control `created_at` and the starting status.
pub async fn seed_request(
    db: &SqlitePool,
    student: &Student,
    slot: &CourseSlot,
    kind: RequestKind,
    old: Option<&Course>,
    new: Option<&Course>,
    status: RequestStatus,
    created_at: &str,
) -> CourseRequest {
    let request = CourseRequest {
        id: Uuid::new_v4().to_string(),
        student_id: student.id.clone(),
        kind,
        slot_id: slot.id.clone(),
        old_course_id: old.map(|c| c.id.clone()),
        new_course_id: new.map(|c| c.id.clone()),
        academic_year: slot.academic_year.clone(),
        semester_type: slot.semester_type.clone(),
        status,
        created_at: created_at.to_string(),
        processed_at: status.is_terminal().then(|| created_at.to_string()),
        detail: None,
    };
    repository::insert_request(db, &request)
        .await
        .expect("Failed to insert request");
    request
}

pub fn at(minute: u32) -> String {
    format!("2025-07-01T09:{minute:02}:00.000000Z")
}

pub async fn reload(db: &SqlitePool, request: &CourseRequest) -> CourseRequest {
    repository::find_request_by_id(db, &request.id)
        .await
        .expect("Failed to load request")
        .expect("Request not found")
}

pub async fn occupied(db: &SqlitePool, course: &Course) -> i64 {
    repository::find_course_by_id(db, &course.id)
        .await
        .expect("Failed to load course")
        .expect("Course not found")
        .occupied
}

pub async fn set_occupied(db: &SqlitePool, course: &Course, occupied: i64) {
    sqlx::query("UPDATE courses SET occupied = ? WHERE id = ?")
        .bind(occupied)
        .bind(&course.id)
        .execute(db)
        .await
        .expect("Failed to set occupancy");
}
