use std::collections::HashMap;

use anyhow::Context;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    Course, GradeFilter, GradeRecord, NewCourse, NewGrade, NewStudent, Student, StudentFilter,
    StudentStatus,
};
use crate::validation::{self, GradeDraft, GradeInput};

const STUDENT_COLUMNS: &str = "id, first_name, last_name, email, grade_level, status";
const COURSE_COLUMNS: &str = "id, code, name, credit_hours, department, description";
const GRADE_COLUMNS: &str =
    "id, student_id, course_id, term, letter_grade, numerical_grade, comments, graded_on";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn student_from_row(row: &PgRow) -> anyhow::Result<Student> {
    let status: String = row.get("status");
    Ok(Student {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        grade_level: row.get("grade_level"),
        status: status.parse()?,
    })
}

fn course_from_row(row: &PgRow) -> Course {
    Course {
        id: row.get("id"),
        code: row.get("code"),
        name: row.get("name"),
        credit_hours: row.get("credit_hours"),
        department: row.get("department"),
        description: row.get("description"),
    }
}

fn grade_from_row(row: &PgRow) -> GradeRecord {
    GradeRecord {
        id: row.get("id"),
        student_id: row.get("student_id"),
        course_id: row.get("course_id"),
        term: row.get("term"),
        letter_grade: row.get("letter_grade"),
        numerical_grade: row.get("numerical_grade"),
        comments: row.get("comments"),
        date: row.get("graded_on"),
    }
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let students = vec![
        ("Emma", "Wilson", "emma.w@example.com", "11th", StudentStatus::Active),
        ("James", "Miller", "james.m@example.com", "10th", StudentStatus::Active),
        ("Ava", "Thompson", "ava.t@example.com", "12th", StudentStatus::Inactive),
        ("Michael", "Johnson", "michael.j@example.com", "11th", StudentStatus::Active),
        ("Sophia", "Garcia", "sophia.g@example.com", "9th", StudentStatus::Active),
    ];

    for (first_name, last_name, email, grade_level, status) in students {
        sqlx::query(
            r#"
            INSERT INTO gradebook.students (id, first_name, last_name, email, grade_level, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (email) DO UPDATE
            SET first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                grade_level = EXCLUDED.grade_level,
                status = EXCLUDED.status
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .bind(grade_level)
        .bind(status.as_str())
        .execute(pool)
        .await?;
    }

    let courses = vec![
        (
            "MATH101",
            "Algebra I",
            4,
            "Mathematics",
            "Introduction to algebraic expressions, equations, and inequalities.",
        ),
        (
            "ENG102",
            "English Composition",
            3,
            "English",
            "Fundamentals of writing and literary analysis.",
        ),
        (
            "HIST201",
            "World History",
            3,
            "History",
            "Survey of major historical events and civilizations.",
        ),
        (
            "SCI103",
            "Biology",
            4,
            "Science",
            "Study of living organisms and biological systems.",
        ),
        (
            "ART104",
            "Introduction to Art",
            2,
            "Arts",
            "Exploration of various art forms and artistic expressions.",
        ),
        (
            "CS201",
            "Computer Science Fundamentals",
            4,
            "Computer Science",
            "Introduction to programming and computer science concepts.",
        ),
    ];

    for (code, name, credit_hours, department, description) in courses {
        sqlx::query(
            r#"
            INSERT INTO gradebook.courses (id, code, name, credit_hours, department, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (code) DO UPDATE
            SET name = EXCLUDED.name,
                credit_hours = EXCLUDED.credit_hours,
                department = EXCLUDED.department,
                description = EXCLUDED.description
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(code)
        .bind(name)
        .bind(credit_hours)
        .bind(department)
        .bind(description)
        .execute(pool)
        .await?;
    }

    let grades = vec![
        (
            "emma.w@example.com",
            "MATH101",
            "Fall 2023",
            "A",
            95,
            "Excellent work throughout the semester.",
            NaiveDate::from_ymd_opt(2023, 12, 15).context("invalid date")?,
        ),
        (
            "emma.w@example.com",
            "ENG102",
            "Fall 2023",
            "B+",
            88,
            "Good writing skills, could improve on critical analysis.",
            NaiveDate::from_ymd_opt(2023, 12, 16).context("invalid date")?,
        ),
        (
            "james.m@example.com",
            "MATH101",
            "Fall 2023",
            "C",
            75,
            "Needs improvement in problem-solving skills.",
            NaiveDate::from_ymd_opt(2023, 12, 15).context("invalid date")?,
        ),
    ];

    for (email, code, term, letter_grade, numerical_grade, comments, graded_on) in grades {
        let student = find_student_by_email(pool, email).await?;
        let course = find_course_by_code(pool, code).await?;

        sqlx::query(
            r#"
            INSERT INTO gradebook.grades
            (id, student_id, course_id, term, letter_grade, numerical_grade, comments, graded_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (student_id, course_id, term) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student.id)
        .bind(course.id)
        .bind(term)
        .bind(letter_grade)
        .bind(numerical_grade)
        .bind(comments)
        .bind(graded_on)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn fetch_students(
    pool: &PgPool,
    filter: &StudentFilter,
) -> anyhow::Result<Vec<Student>> {
    let mut query = format!("SELECT {STUDENT_COLUMNS} FROM gradebook.students WHERE TRUE");
    let mut index = 0;

    if filter.status.is_some() {
        index += 1;
        query.push_str(&format!(" AND status = ${index}"));
    }
    if filter.search.is_some() {
        index += 1;
        query.push_str(&format!(
            " AND (first_name ILIKE ${index} OR last_name ILIKE ${index} OR email ILIKE ${index})"
        ));
    }
    query.push_str(" ORDER BY last_name, first_name");

    let mut rows = sqlx::query(&query);
    if let Some(status) = filter.status {
        rows = rows.bind(status.as_str());
    }
    if let Some(search) = &filter.search {
        rows = rows.bind(format!("%{search}%"));
    }

    let records = rows.fetch_all(pool).await?;
    let students = records
        .iter()
        .map(student_from_row)
        .collect::<anyhow::Result<Vec<_>>>()?;
    debug!(count = students.len(), "fetched students");
    Ok(students)
}

pub async fn find_student_by_email(pool: &PgPool, email: &str) -> anyhow::Result<Student> {
    let row = sqlx::query(&format!(
        "SELECT {STUDENT_COLUMNS} FROM gradebook.students WHERE email = $1"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("no student with email {email}"))?;
    student_from_row(&row)
}

pub async fn create_student(pool: &PgPool, student: &NewStudent) -> anyhow::Result<Student> {
    validation::validate_student(student)?;

    let row = sqlx::query(&format!(
        "INSERT INTO gradebook.students (id, first_name, last_name, email, grade_level, status) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING {STUDENT_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(student.first_name.trim())
    .bind(student.last_name.trim())
    .bind(student.email.trim())
    .bind(student.grade_level.trim())
    .bind(student.status.as_str())
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to create student {}", student.email))?;

    let created = student_from_row(&row)?;
    info!(student_id = %created.id, email = %created.email, "created student");
    Ok(created)
}

pub async fn fetch_student(pool: &PgPool, id: Uuid) -> anyhow::Result<Student> {
    let row = sqlx::query(&format!(
        "SELECT {STUDENT_COLUMNS} FROM gradebook.students WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("no student with id {id}"))?;
    student_from_row(&row)
}

pub async fn update_student(
    pool: &PgPool,
    id: Uuid,
    student: &NewStudent,
) -> anyhow::Result<Student> {
    validation::validate_student(student)?;

    let row = sqlx::query(&format!(
        "UPDATE gradebook.students \
         SET first_name = $2, last_name = $3, email = $4, grade_level = $5, status = $6 \
         WHERE id = $1 RETURNING {STUDENT_COLUMNS}"
    ))
    .bind(id)
    .bind(student.first_name.trim())
    .bind(student.last_name.trim())
    .bind(student.email.trim())
    .bind(student.grade_level.trim())
    .bind(student.status.as_str())
    .fetch_optional(pool)
    .await
    .with_context(|| format!("failed to update student {}", student.email))?
    .with_context(|| format!("no student with id {id}"))?;

    let updated = student_from_row(&row)?;
    info!(student_id = %updated.id, email = %updated.email, "updated student");
    Ok(updated)
}

/// Removes a student; their grades go with them through the foreign key.
pub async fn delete_student(pool: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM gradebook.students WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    let deleted = result.rows_affected() > 0;
    info!(student_id = %id, deleted, "delete student");
    Ok(deleted)
}

pub async fn fetch_courses(pool: &PgPool, search: Option<&str>) -> anyhow::Result<Vec<Course>> {
    let mut query = format!("SELECT {COURSE_COLUMNS} FROM gradebook.courses");
    if search.is_some() {
        query.push_str(" WHERE name ILIKE $1 OR code ILIKE $1 OR department ILIKE $1");
    }
    query.push_str(" ORDER BY code");

    let mut rows = sqlx::query(&query);
    if let Some(value) = search {
        rows = rows.bind(format!("%{value}%"));
    }

    let courses: Vec<Course> = rows.fetch_all(pool).await?.iter().map(course_from_row).collect();
    debug!(count = courses.len(), "fetched courses");
    Ok(courses)
}

pub async fn find_course_by_code(pool: &PgPool, code: &str) -> anyhow::Result<Course> {
    let row = sqlx::query(&format!(
        "SELECT {COURSE_COLUMNS} FROM gradebook.courses WHERE code = $1"
    ))
    .bind(code)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("no course with code {code}"))?;
    Ok(course_from_row(&row))
}

pub async fn create_course(pool: &PgPool, course: &NewCourse) -> anyhow::Result<Course> {
    validation::validate_course(course)?;

    let row = sqlx::query(&format!(
        "INSERT INTO gradebook.courses (id, code, name, credit_hours, department, description) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING {COURSE_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(course.code.trim())
    .bind(course.name.trim())
    .bind(course.credit_hours)
    .bind(course.department.trim())
    .bind(course.description.trim())
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to create course {}", course.code))?;

    let created = course_from_row(&row);
    info!(course_id = %created.id, code = %created.code, "created course");
    Ok(created)
}

pub async fn fetch_grades(pool: &PgPool, filter: &GradeFilter) -> anyhow::Result<Vec<GradeRecord>> {
    let mut query = format!("SELECT {GRADE_COLUMNS} FROM gradebook.grades WHERE TRUE");
    let mut index = 0;

    if filter.student_id.is_some() {
        index += 1;
        query.push_str(&format!(" AND student_id = ${index}"));
    }
    if filter.course_id.is_some() {
        index += 1;
        query.push_str(&format!(" AND course_id = ${index}"));
    }
    if filter.term.is_some() {
        index += 1;
        query.push_str(&format!(" AND term = ${index}"));
    }
    query.push_str(" ORDER BY graded_on DESC, term");

    let mut rows = sqlx::query(&query);
    if let Some(value) = filter.student_id {
        rows = rows.bind(value);
    }
    if let Some(value) = filter.course_id {
        rows = rows.bind(value);
    }
    if let Some(value) = &filter.term {
        rows = rows.bind(value);
    }

    let grades: Vec<GradeRecord> = rows.fetch_all(pool).await?.iter().map(grade_from_row).collect();
    debug!(count = grades.len(), "fetched grades");
    Ok(grades)
}

pub async fn fetch_grade(pool: &PgPool, id: Uuid) -> anyhow::Result<GradeRecord> {
    let row = sqlx::query(&format!(
        "SELECT {GRADE_COLUMNS} FROM gradebook.grades WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("no grade with id {id}"))?;
    Ok(grade_from_row(&row))
}

/// Grades that could collide with a new entry for this student and course.
async fn sibling_grades(
    pool: &PgPool,
    student_id: Uuid,
    course_id: Uuid,
) -> anyhow::Result<Vec<GradeRecord>> {
    fetch_grades(
        pool,
        &GradeFilter {
            student_id: Some(student_id),
            course_id: Some(course_id),
            term: None,
        },
    )
    .await
}

pub async fn create_grade(pool: &PgPool, draft: GradeDraft) -> anyhow::Result<GradeRecord> {
    let existing = sibling_grades(pool, draft.student_id, draft.course_id).await?;
    let grade = validation::validate_grade(draft, &existing, None)?;

    let row = sqlx::query(&format!(
        "INSERT INTO gradebook.grades \
         (id, student_id, course_id, term, letter_grade, numerical_grade, comments, graded_on) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {GRADE_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(grade.student_id)
    .bind(grade.course_id)
    .bind(&grade.term)
    .bind(&grade.letter_grade)
    .bind(grade.numerical_grade)
    .bind(&grade.comments)
    .bind(grade.date)
    .fetch_one(pool)
    .await
    .context("failed to create grade")?;

    let created = grade_from_row(&row);
    info!(grade_id = %created.id, letter = %created.letter_grade, "created grade");
    Ok(created)
}

pub async fn update_grade(
    pool: &PgPool,
    id: Uuid,
    draft: GradeDraft,
) -> anyhow::Result<GradeRecord> {
    let existing = sibling_grades(pool, draft.student_id, draft.course_id).await?;
    let grade: NewGrade = validation::validate_grade(draft, &existing, Some(id))?;

    let row = sqlx::query(&format!(
        "UPDATE gradebook.grades \
         SET student_id = $2, course_id = $3, term = $4, letter_grade = $5, \
             numerical_grade = $6, comments = $7, graded_on = $8 \
         WHERE id = $1 RETURNING {GRADE_COLUMNS}"
    ))
    .bind(id)
    .bind(grade.student_id)
    .bind(grade.course_id)
    .bind(&grade.term)
    .bind(&grade.letter_grade)
    .bind(grade.numerical_grade)
    .bind(&grade.comments)
    .bind(grade.date)
    .fetch_optional(pool)
    .await
    .context("failed to update grade")?
    .with_context(|| format!("no grade with id {id}"))?;

    let updated = grade_from_row(&row);
    info!(grade_id = %updated.id, letter = %updated.letter_grade, "updated grade");
    Ok(updated)
}

pub async fn delete_grade(pool: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM gradebook.grades WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    let deleted = result.rows_affected() > 0;
    info!(grade_id = %id, deleted, "delete grade");
    Ok(deleted)
}

#[derive(serde::Deserialize)]
struct CsvRow {
    student_email: String,
    course_code: String,
    term: String,
    letter_grade: Option<String>,
    numerical_grade: Option<i32>,
    comments: Option<String>,
    date: NaiveDate,
}

/// Turns CSV rows into grade drafts, keyed by their line in the file.
/// Rows that fail to parse or name an unknown student or course are skipped
/// with a warning.
fn read_grade_rows<R: std::io::Read>(
    reader: R,
    students: &HashMap<String, Uuid>,
    courses: &HashMap<String, Uuid>,
) -> Vec<(u64, GradeDraft)> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut drafts = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index as u64 + 2;
        let row = match result {
            Ok(row) => row,
            Err(error) => {
                let line = error.position().map_or(line, |position| position.line());
                warn!(line, %error, "skipping malformed row");
                continue;
            }
        };

        let Some(&student_id) = students.get(row.student_email.trim()) else {
            warn!(line, email = %row.student_email, "skipping row for unknown student");
            continue;
        };
        let Some(&course_id) = courses.get(row.course_code.trim()) else {
            warn!(line, code = %row.course_code, "skipping row for unknown course");
            continue;
        };

        let input = match (row.numerical_grade, row.letter_grade) {
            (Some(score), _) => Some(GradeInput::Score(score)),
            (None, Some(letter)) => Some(GradeInput::Letter(letter.trim().to_string())),
            (None, None) => None,
        };
        drafts.push((
            line,
            GradeDraft {
                student_id,
                course_id,
                term: row.term,
                input,
                comments: row.comments,
                date: row.date,
            },
        ));
    }

    drafts
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let students: HashMap<String, Uuid> = fetch_students(pool, &StudentFilter::default())
        .await?
        .into_iter()
        .map(|student| (student.email, student.id))
        .collect();
    let courses: HashMap<String, Uuid> = fetch_courses(pool, None)
        .await?
        .into_iter()
        .map(|course| (course.code, course.id))
        .collect();
    let mut known = fetch_grades(pool, &GradeFilter::default()).await?;

    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, draft) in read_grade_rows(file, &students, &courses) {
        let grade = match validation::validate_grade(draft, &known, None) {
            Ok(grade) => grade,
            Err(errors) => {
                warn!(line, %errors, "skipping invalid grade row");
                continue;
            }
        };

        let id = Uuid::new_v4();
        let result = sqlx::query(
            r#"
            INSERT INTO gradebook.grades
            (id, student_id, course_id, term, letter_grade, numerical_grade, comments, graded_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (student_id, course_id, term) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(grade.student_id)
        .bind(grade.course_id)
        .bind(&grade.term)
        .bind(&grade.letter_grade)
        .bind(grade.numerical_grade)
        .bind(&grade.comments)
        .bind(grade.date)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
            known.push(GradeRecord {
                id,
                student_id: grade.student_id,
                course_id: grade.course_id,
                term: grade.term,
                letter_grade: grade.letter_grade,
                numerical_grade: grade.numerical_grade,
                comments: grade.comments,
                date: grade.date,
            });
        }
    }

    info!(inserted, path = %csv_path.display(), "imported grades");
    Ok(inserted)
}
