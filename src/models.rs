use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    Active,
    Inactive,
}

impl StudentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudentStatus::Active => "active",
            StudentStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for StudentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudentStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(StudentStatus::Active),
            "inactive" => Ok(StudentStatus::Inactive),
            other => anyhow::bail!("unknown student status `{other}`"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Student {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub grade_level: String,
    pub status: StudentStatus,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Course {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub credit_hours: i32,
    pub department: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub grade_level: String,
    pub status: StudentStatus,
}

impl From<&Student> for NewStudent {
    fn from(student: &Student) -> Self {
        Self {
            first_name: student.first_name.clone(),
            last_name: student.last_name.clone(),
            email: student.email.clone(),
            grade_level: student.grade_level.clone(),
            status: student.status,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewCourse {
    pub code: String,
    pub name: String,
    pub credit_hours: i32,
    pub department: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GradeRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub term: String,
    pub letter_grade: String,
    pub numerical_grade: Option<i32>,
    pub comments: Option<String>,
    pub date: NaiveDate,
}

/// A grade as it will be written to the store, after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGrade {
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub term: String,
    pub letter_grade: String,
    pub numerical_grade: Option<i32>,
    pub comments: Option<String>,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Default)]
pub struct GradeFilter {
    pub student_id: Option<Uuid>,
    pub course_id: Option<Uuid>,
    pub term: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    pub status: Option<StudentStatus>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GpaEntry {
    pub letter_grade: String,
    pub credits: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub course_code: String,
    pub course_name: String,
    pub term: String,
    pub letter_grade: String,
    pub numerical_grade: Option<i32>,
    pub credits: i32,
    pub quality_points: Option<f64>,
    pub comments: Option<String>,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GradeDistribution {
    pub a: usize,
    pub b: usize,
    pub c: usize,
    pub d: usize,
    pub f: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentReport {
    pub student_name: String,
    pub student_email: String,
    pub grade_level: String,
    pub term: String,
    pub gpa: f64,
    pub total_credits: i32,
    pub distribution: GradeDistribution,
    pub rows: Vec<ReportRow>,
}
