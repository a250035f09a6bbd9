//! Checks applied before anything reaches the record store.
//!
//! The grade math stays permissive; this layer is where score bounds, the
//! letter alphabet and the one-grade-per-course-and-term rule are enforced.

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::gpa;
use crate::models::{GradeRecord, NewCourse, NewGrade, NewStudent};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("a letter or numerical grade is required")]
    MissingGrade,
    #[error("unknown letter grade `{0}`")]
    UnknownLetter(String),
    #[error("grade must be between 0 and 100, got {0}")]
    ScoreOutOfRange(i32),
    #[error("a grade for this student, course, and term ({0}) already exists")]
    Duplicate(String),
    #[error("credit hours must not be negative, got {0}")]
    NegativeCredits(i32),
    #[error("`{0}` is not an email address")]
    InvalidEmail(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join_errors(.0))]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn contains(&self, error: &ValidationError) -> bool {
        self.0.contains(error)
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn finish<T>(value: T, errors: Vec<ValidationError>) -> Result<T, ValidationErrors> {
    if errors.is_empty() {
        Ok(value)
    } else {
        Err(ValidationErrors(errors))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GradeInput {
    Letter(String),
    Score(i32),
}

#[derive(Debug, Clone)]
pub struct GradeDraft {
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub term: String,
    pub input: Option<GradeInput>,
    pub comments: Option<String>,
    pub date: NaiveDate,
}

impl GradeDraft {
    /// Starts a draft from a stored grade, keeping the numerical grade as the
    /// input when there is one.
    pub fn from_record(record: &GradeRecord) -> Self {
        let input = match record.numerical_grade {
            Some(score) => GradeInput::Score(score),
            None => GradeInput::Letter(record.letter_grade.clone()),
        };
        Self {
            student_id: record.student_id,
            course_id: record.course_id,
            term: record.term.clone(),
            input: Some(input),
            comments: record.comments.clone(),
            date: record.date,
        }
    }
}

/// Validates a grade form. `editing` names the record being updated so it
/// does not collide with itself in the duplicate check.
pub fn validate_grade(
    draft: GradeDraft,
    existing: &[GradeRecord],
    editing: Option<Uuid>,
) -> Result<NewGrade, ValidationErrors> {
    let mut errors = Vec::new();
    let term = draft.term.trim().to_string();

    if term.is_empty() {
        errors.push(ValidationError::EmptyField("term"));
    }

    let (letter_grade, numerical_grade) = match draft.input {
        None => {
            errors.push(ValidationError::MissingGrade);
            (String::new(), None)
        }
        Some(GradeInput::Letter(letter)) if letter.trim().is_empty() => {
            errors.push(ValidationError::MissingGrade);
            (String::new(), None)
        }
        Some(GradeInput::Letter(letter)) => {
            if !gpa::LETTER_GRADES.contains(&letter.as_str()) {
                errors.push(ValidationError::UnknownLetter(letter.clone()));
            }
            (letter, None)
        }
        Some(GradeInput::Score(score)) => {
            if !(0..=100).contains(&score) {
                errors.push(ValidationError::ScoreOutOfRange(score));
            }
            (
                gpa::score_to_letter(f64::from(score)).to_string(),
                Some(score),
            )
        }
    };

    if !term.is_empty() {
        let duplicate = existing.iter().any(|grade| {
            Some(grade.id) != editing
                && grade.student_id == draft.student_id
                && grade.course_id == draft.course_id
                && grade.term == term
        });
        if duplicate {
            errors.push(ValidationError::Duplicate(term.clone()));
        }
    }

    let comments = draft
        .comments
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());

    finish(
        NewGrade {
            student_id: draft.student_id,
            course_id: draft.course_id,
            term,
            letter_grade,
            numerical_grade,
            comments,
            date: draft.date,
        },
        errors,
    )
}

pub fn validate_student(student: &NewStudent) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();
    if student.first_name.trim().is_empty() {
        errors.push(ValidationError::EmptyField("first name"));
    }
    if student.last_name.trim().is_empty() {
        errors.push(ValidationError::EmptyField("last name"));
    }
    let email = student.email.trim();
    if email.is_empty() {
        errors.push(ValidationError::EmptyField("email"));
    } else if !email.contains('@') {
        errors.push(ValidationError::InvalidEmail(email.to_string()));
    }
    finish((), errors)
}

pub fn validate_course(course: &NewCourse) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();
    if course.code.trim().is_empty() {
        errors.push(ValidationError::EmptyField("course code"));
    }
    if course.name.trim().is_empty() {
        errors.push(ValidationError::EmptyField("course name"));
    }
    if course.credit_hours < 0 {
        errors.push(ValidationError::NegativeCredits(course.credit_hours));
    }
    finish((), errors)
}
