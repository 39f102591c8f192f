use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::models::{
    Batch, Course, CourseRequest, CourseSlot, NewBatch, NewCourse, NewCourseSlot, NewStudent,
    RequestFilter, RequestKind, Student,
};
use crate::state_machine::RequestStatus;

const COURSE_SELECT: &str = r#"
    SELECT
        id, code, name, credit, capacity, occupied,
        CASE WHEN capacity IS NULL THEN NULL ELSE MAX(capacity - occupied, 0) END AS seats_available
    FROM courses
"#;

const REQUEST_SELECT: &str = r#"
    SELECT
        id, student_id, kind, slot_id, old_course_id, new_course_id,
        academic_year, semester_type, status, created_at, processed_at, detail
    FROM course_requests
"#;

pub async fn insert_batch(db: &SqlitePool, req: NewBatch) -> Result<Batch, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let label = req.label();

    sqlx::query(
        "INSERT INTO batches (id, label, programme, discipline, year) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&label)
    .bind(&req.programme)
    .bind(&req.discipline)
    .bind(req.year)
    .execute(db)
    .await?;

    Ok(Batch {
        id,
        label,
        programme: req.programme,
        discipline: req.discipline,
        year: req.year,
    })
}

pub async fn find_batch_by_id(db: &SqlitePool, id: &str) -> Result<Option<Batch>, sqlx::Error> {
    sqlx::query_as::<_, Batch>(
        "SELECT id, label, programme, discipline, year FROM batches WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn insert_student(db: &SqlitePool, req: NewStudent) -> Result<Student, sqlx::Error> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO students
            (id, username, current_batch, current_batch_year, current_semester_no)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&req.username)
    .bind(&req.current_batch)
    .bind(req.current_batch_year)
    .bind(req.current_semester_no)
    .execute(db)
    .await?;

    Ok(Student {
        id,
        username: req.username,
        current_batch: req.current_batch,
        current_batch_year: req.current_batch_year,
        current_semester_no: req.current_semester_no,
    })
}

pub async fn find_student_by_id(db: &SqlitePool, id: &str) -> Result<Option<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>(
        "SELECT id, username, current_batch, current_batch_year, current_semester_no FROM students WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

/// Adds one to the student's semester in a single statement.
pub async fn increment_semester(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE students SET current_semester_no = current_semester_no + 1 WHERE id = ?",
    )
    .bind(id)
    .execute(db)
    .await?
    .rows_affected();

    Ok(result > 0)
}

pub async fn update_student_batch(
    db: &SqlitePool,
    id: &str,
    batch_id: &str,
    batch_year: i32,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE students SET current_batch = ?, current_batch_year = ? WHERE id = ?",
    )
    .bind(batch_id)
    .bind(batch_year)
    .bind(id)
    .execute(db)
    .await?
    .rows_affected();

    Ok(result > 0)
}

pub async fn insert_course(db: &SqlitePool, req: NewCourse) -> Result<Course, sqlx::Error> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO courses (id, code, name, credit, capacity, occupied) VALUES (?, ?, ?, ?, ?, 0)",
    )
    .bind(&id)
    .bind(&req.code)
    .bind(&req.name)
    .bind(req.credit)
    .bind(req.capacity)
    .execute(db)
    .await?;

    find_course_by_id(db, &id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

pub async fn fetch_courses(db: &SqlitePool) -> Result<Vec<Course>, sqlx::Error> {
    let sql = format!("{COURSE_SELECT} ORDER BY code");
    sqlx::query_as::<_, Course>(&sql).fetch_all(db).await
}

pub async fn find_course_by_id(db: &SqlitePool, id: &str) -> Result<Option<Course>, sqlx::Error> {
    let sql = format!("{COURSE_SELECT} WHERE id = ?");
    sqlx::query_as::<_, Course>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Creates the slot and its admissible-course links in one transaction.
pub async fn insert_slot(db: &SqlitePool, req: NewCourseSlot) -> Result<CourseSlot, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let mut tx = db.begin().await?;

    sqlx::query(
        "INSERT INTO course_slots (id, name, academic_year, semester_type) VALUES (?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&req.name)
    .bind(&req.academic_year)
    .bind(&req.semester_type)
    .execute(&mut *tx)
    .await?;

    for course_id in &req.course_ids {
        sqlx::query("INSERT OR IGNORE INTO slot_courses (slot_id, course_id) VALUES (?, ?)")
            .bind(&id)
            .bind(course_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(CourseSlot {
        id,
        name: req.name,
        academic_year: req.academic_year,
        semester_type: req.semester_type,
    })
}

pub async fn find_slot_by_id(db: &SqlitePool, id: &str) -> Result<Option<CourseSlot>, sqlx::Error> {
    sqlx::query_as::<_, CourseSlot>(
        "SELECT id, name, academic_year, semester_type FROM course_slots WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn slot_admits(db: &SqlitePool, slot_id: &str, course_id: &str) -> Result<bool, sqlx::Error> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM slot_courses WHERE slot_id = ? AND course_id = ?")
            .bind(slot_id)
            .bind(course_id)
            .fetch_optional(db)
            .await?;

    Ok(found.is_some())
}

pub async fn fetch_slot_courses(db: &SqlitePool, slot_id: &str) -> Result<Vec<Course>, sqlx::Error> {
    let sql = format!(
        "{COURSE_SELECT} WHERE id IN (SELECT course_id FROM slot_courses WHERE slot_id = ?) ORDER BY code"
    );
    sqlx::query_as::<_, Course>(&sql)
        .bind(slot_id)
        .fetch_all(db)
        .await
}

pub async fn insert_request(db: &SqlitePool, req: &CourseRequest) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO course_requests
            (id, student_id, kind, slot_id, old_course_id, new_course_id,
            academic_year, semester_type, status, created_at, processed_at, detail)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&req.id)
    .bind(&req.student_id)
    .bind(req.kind)
    .bind(&req.slot_id)
    .bind(&req.old_course_id)
    .bind(&req.new_course_id)
    .bind(&req.academic_year)
    .bind(&req.semester_type)
    .bind(req.status)
    .bind(&req.created_at)
    .bind(&req.processed_at)
    .bind(&req.detail)
    .execute(db)
    .await?;

    Ok(())
}

pub async fn find_request_by_id(db: &SqlitePool, id: &str) -> Result<Option<CourseRequest>, sqlx::Error> {
    let sql = format!("{REQUEST_SELECT} WHERE id = ?");
    sqlx::query_as::<_, CourseRequest>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn fetch_requests(
    db: &SqlitePool,
    filter: &RequestFilter,
) -> Result<Vec<CourseRequest>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(REQUEST_SELECT);
    qb.push(" WHERE 1 = 1");

    if let Some(kind) = filter.kind {
        qb.push(" AND kind = ").push_bind(kind);
    }
    if let Some(year) = &filter.academic_year {
        qb.push(" AND academic_year = ").push_bind(year.clone());
    }
    if let Some(semester) = &filter.semester_type {
        qb.push(" AND semester_type = ").push_bind(semester.clone());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    qb.push(" ORDER BY created_at, rowid");

    qb.build_query_as::<CourseRequest>().fetch_all(db).await
}

/// Pending Add/Replacement requests of one term, first come first served.
pub async fn fetch_allocation_candidates(
    db: &SqlitePool,
    academic_year: &str,
    semester_type: &str,
) -> Result<Vec<CourseRequest>, sqlx::Error> {
    let sql = format!(
        r#"{REQUEST_SELECT}
        WHERE academic_year = ?
          AND semester_type = ?
          AND status = ?
          AND kind IN (?, ?)
          AND new_course_id IS NOT NULL
        ORDER BY created_at, rowid
        "#
    );
    sqlx::query_as::<_, CourseRequest>(&sql)
        .bind(academic_year)
        .bind(semester_type)
        .bind(RequestStatus::Pending)
        .bind(RequestKind::Add)
        .bind(RequestKind::Replacement)
        .fetch_all(db)
        .await
}

/// Compare-and-set on status. Returns false when the row is gone or no longer in `from`.
pub async fn set_status_if(
    conn: &mut SqliteConnection,
    id: &str,
    from: RequestStatus,
    to: RequestStatus,
    processed_at: Option<&str>,
    detail: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE course_requests
        SET status = ?1,
            processed_at = ?2,
            detail = ?3
        WHERE id = ?4 AND status = ?5
        "#,
    )
    .bind(to)
    .bind(processed_at)
    .bind(detail)
    .bind(id)
    .bind(from)
    .execute(conn)
    .await?
    .rows_affected();

    Ok(result > 0)
}

pub async fn delete_if_status(
    conn: &mut SqliteConnection,
    id: &str,
    from: RequestStatus,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM course_requests WHERE id = ? AND status = ?")
        .bind(id)
        .bind(from)
        .execute(conn)
        .await?
        .rows_affected();

    Ok(result > 0)
}

/// Increment-if-below-capacity. False means the course is full.
pub async fn take_seat(conn: &mut SqliteConnection, course_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE courses
        SET occupied = occupied + 1
        WHERE id = ? AND (capacity IS NULL OR occupied < capacity)
        "#,
    )
    .bind(course_id)
    .execute(conn)
    .await?
    .rows_affected();

    Ok(result > 0)
}

pub async fn release_seat(conn: &mut SqliteConnection, course_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE courses SET occupied = MAX(occupied - 1, 0) WHERE id = ?")
        .bind(course_id)
        .execute(conn)
        .await?;

    Ok(())
}
