use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gradebook::models::{GradeFilter, NewCourse, NewStudent, StudentFilter, StudentStatus};
use gradebook::validation::{GradeDraft, GradeInput};
use gradebook::{db, report};

#[derive(Parser)]
#[command(name = "gradebook")]
#[command(about = "Student roster, course catalog and GPA reporting", long_about = None)]
struct Cli {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    #[arg(long, env = "GRADEBOOK_MAX_CONNECTIONS", default_value_t = 5, global = true)]
    max_connections: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Markdown,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load the sample roster, catalog and grades
    Seed,
    /// Import grades from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List students
    Students {
        #[arg(long, value_enum)]
        status: Option<StudentStatus>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Add a student to the roster
    AddStudent {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        grade_level: String,
        #[arg(long, value_enum, default_value_t = StudentStatus::Active)]
        status: StudentStatus,
    },
    /// Change fields of a student
    UpdateStudent {
        #[arg(long)]
        id: uuid::Uuid,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        grade_level: Option<String>,
        #[arg(long, value_enum)]
        status: Option<StudentStatus>,
    },
    /// Delete a student and their grades
    DeleteStudent {
        #[arg(long)]
        id: uuid::Uuid,
    },
    /// List courses
    Courses {
        #[arg(long)]
        search: Option<String>,
    },
    /// Add a course to the catalog
    AddCourse {
        #[arg(long)]
        code: String,
        #[arg(long)]
        name: String,
        #[arg(long, allow_negative_numbers = true)]
        credits: i32,
        #[arg(long, default_value = "")]
        department: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List grades
    Grades {
        /// Student email
        #[arg(long)]
        student: Option<String>,
        /// Course code
        #[arg(long)]
        course: Option<String>,
        #[arg(long)]
        term: Option<String>,
    },
    /// Record a grade from a letter or a 0-100 score
    #[command(group(
        ArgGroup::new("grade")
            .args(["letter", "score"])
            .required(true)
            .multiple(false)
    ))]
    AddGrade {
        #[arg(long)]
        student: String,
        #[arg(long)]
        course: String,
        #[arg(long)]
        term: String,
        #[arg(long)]
        letter: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        score: Option<i32>,
        #[arg(long)]
        comments: Option<String>,
        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Change fields of a recorded grade
    #[command(group(
        ArgGroup::new("grade")
            .args(["letter", "score"])
            .multiple(false)
    ))]
    UpdateGrade {
        #[arg(long)]
        id: uuid::Uuid,
        #[arg(long)]
        student: Option<String>,
        #[arg(long)]
        course: Option<String>,
        #[arg(long)]
        term: Option<String>,
        #[arg(long)]
        letter: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        score: Option<i32>,
        /// Replace the comments; use --clear-comments to remove them
        #[arg(long)]
        comments: Option<String>,
        #[arg(long, conflicts_with = "comments")]
        clear_comments: bool,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Delete a grade
    DeleteGrade {
        #[arg(long)]
        id: uuid::Uuid,
    },
    /// Print a student's credit-weighted GPA
    Gpa {
        #[arg(long)]
        student: String,
        #[arg(long)]
        term: Option<String>,
    },
    /// Generate a student grade report
    Report {
        #[arg(long)]
        student: String,
        #[arg(long)]
        term: Option<String>,
        #[arg(long, value_enum, default_value_t = ReportFormat::Markdown)]
        format: ReportFormat,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn grade_input(letter: Option<String>, score: Option<i32>) -> Option<GradeInput> {
    match (letter, score) {
        (_, Some(score)) => Some(GradeInput::Score(score)),
        (Some(letter), None) => Some(GradeInput::Letter(letter)),
        (None, None) => None,
    }
}

fn merged_comments(
    current: Option<String>,
    comments: Option<String>,
    clear: bool,
) -> Option<String> {
    if clear {
        None
    } else {
        comments.or(current)
    }
}

async fn student_report(
    pool: &PgPool,
    email: &str,
    term: Option<&str>,
) -> anyhow::Result<Option<gradebook::models::StudentReport>> {
    let student = db::find_student_by_email(pool, email).await?;
    let grades = db::fetch_grades(
        pool,
        &GradeFilter {
            student_id: Some(student.id),
            course_id: None,
            term: term.map(str::to_string),
        },
    )
    .await?;
    let courses = db::fetch_courses(pool, None).await?;
    Ok(report::build_student_report(&student, term, &grades, &courses))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gradebook=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let database_url = cli
        .database_url
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(cli.max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;
    info!(max_connections = cli.max_connections, "connected to Postgres");

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} grades from {}.", csv.display());
        }
        Commands::Students { status, search } => {
            let students = db::fetch_students(&pool, &StudentFilter { status, search }).await?;
            if students.is_empty() {
                println!("No students found.");
                return Ok(());
            }
            for student in students.iter() {
                println!(
                    "- {} <{}> {} [{}]",
                    student.full_name(),
                    student.email,
                    student.grade_level,
                    student.status
                );
            }
        }
        Commands::AddStudent {
            first_name,
            last_name,
            email,
            grade_level,
            status,
        } => {
            let student = db::create_student(
                &pool,
                &NewStudent {
                    first_name,
                    last_name,
                    email,
                    grade_level,
                    status,
                },
            )
            .await?;
            println!("Added {} ({}).", student.full_name(), student.id);
        }
        Commands::UpdateStudent {
            id,
            first_name,
            last_name,
            email,
            grade_level,
            status,
        } => {
            let current = db::fetch_student(&pool, id).await?;
            let mut edit = NewStudent::from(&current);
            if let Some(first_name) = first_name {
                edit.first_name = first_name;
            }
            if let Some(last_name) = last_name {
                edit.last_name = last_name;
            }
            if let Some(email) = email {
                edit.email = email;
            }
            if let Some(grade_level) = grade_level {
                edit.grade_level = grade_level;
            }
            if let Some(status) = status {
                edit.status = status;
            }
            let student = db::update_student(&pool, id, &edit).await?;
            println!("Updated {} ({}).", student.full_name(), student.id);
        }
        Commands::DeleteStudent { id } => {
            if db::delete_student(&pool, id).await? {
                println!("Deleted student {id}.");
            } else {
                println!("No student with id {id}.");
            }
        }
        Commands::Courses { search } => {
            let courses = db::fetch_courses(&pool, search.as_deref()).await?;
            if courses.is_empty() {
                println!("No courses found.");
                return Ok(());
            }
            for course in courses.iter() {
                println!(
                    "- {} {} ({} credits, {})",
                    course.code, course.name, course.credit_hours, course.department
                );
            }
        }
        Commands::AddCourse {
            code,
            name,
            credits,
            department,
            description,
        } => {
            let course = db::create_course(
                &pool,
                &NewCourse {
                    code,
                    name,
                    credit_hours: credits,
                    department,
                    description,
                },
            )
            .await?;
            println!("Added {} ({}).", course.code, course.id);
        }
        Commands::Grades {
            student,
            course,
            term,
        } => {
            let student_id = match student.as_deref() {
                Some(email) => Some(db::find_student_by_email(&pool, email).await?.id),
                None => None,
            };
            let course_id = match course.as_deref() {
                Some(code) => Some(db::find_course_by_code(&pool, code).await?.id),
                None => None,
            };
            let grades = db::fetch_grades(
                &pool,
                &GradeFilter {
                    student_id,
                    course_id,
                    term,
                },
            )
            .await?;
            if grades.is_empty() {
                println!("No grades found.");
                return Ok(());
            }
            for grade in grades.iter() {
                let score = grade
                    .numerical_grade
                    .map(|score| format!(" ({score})"))
                    .unwrap_or_default();
                println!(
                    "- {} {}{} on {} [{}]",
                    grade.term, grade.letter_grade, score, grade.date, grade.id
                );
            }
        }
        Commands::AddGrade {
            student,
            course,
            term,
            letter,
            score,
            comments,
            date,
        } => {
            let student = db::find_student_by_email(&pool, &student).await?;
            let course = db::find_course_by_code(&pool, &course).await?;
            let grade = db::create_grade(
                &pool,
                GradeDraft {
                    student_id: student.id,
                    course_id: course.id,
                    term,
                    input: grade_input(letter, score),
                    comments,
                    date: date.unwrap_or_else(|| Utc::now().date_naive()),
                },
            )
            .await?;
            println!(
                "Recorded {} for {} in {} ({}).",
                grade.letter_grade,
                student.full_name(),
                course.code,
                grade.id
            );
        }
        Commands::UpdateGrade {
            id,
            student,
            course,
            term,
            letter,
            score,
            comments,
            clear_comments,
            date,
        } => {
            let current = db::fetch_grade(&pool, id).await?;
            let mut draft = GradeDraft::from_record(&current);
            if let Some(email) = student.as_deref() {
                draft.student_id = db::find_student_by_email(&pool, email).await?.id;
            }
            if let Some(code) = course.as_deref() {
                draft.course_id = db::find_course_by_code(&pool, code).await?.id;
            }
            if let Some(term) = term {
                draft.term = term;
            }
            if let Some(input) = grade_input(letter, score) {
                draft.input = Some(input);
            }
            draft.comments = merged_comments(draft.comments, comments, clear_comments);
            if let Some(date) = date {
                draft.date = date;
            }
            let grade = db::update_grade(&pool, id, draft).await?;
            println!("Updated grade {} to {}.", grade.id, grade.letter_grade);
        }
        Commands::DeleteGrade { id } => {
            if db::delete_grade(&pool, id).await? {
                println!("Deleted grade {id}.");
            } else {
                println!("No grade with id {id}.");
            }
        }
        Commands::Gpa { student, term } => {
            match student_report(&pool, &student, term.as_deref()).await? {
                Some(report) => println!(
                    "{} GPA {:.2} over {} credits ({})",
                    report.student_name,
                    report.gpa,
                    report.total_credits,
                    report.term
                ),
                None => println!("No grades recorded for {student}."),
            }
        }
        Commands::Report {
            student,
            term,
            format,
            out,
        } => {
            let Some(report) = student_report(&pool, &student, term.as_deref()).await? else {
                println!("No grades recorded for {student}.");
                return Ok(());
            };
            let rendered = match format {
                ReportFormat::Markdown => report::render_markdown(&report),
                ReportFormat::Json => report::render_json(&report)?,
            };
            std::fs::write(&out, rendered)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn add_grade_takes_letter_or_score_not_both() {
        let base = [
            "gradebook",
            "add-grade",
            "--student",
            "emma.w@example.com",
            "--course",
            "MATH101",
            "--term",
            "Fall 2023",
        ];

        let both = Cli::try_parse_from(base.iter().copied().chain(["--letter", "A", "--score", "95"]));
        assert!(both.is_err());

        let neither = Cli::try_parse_from(base.iter().copied());
        assert!(neither.is_err());

        let score = Cli::try_parse_from(base.iter().copied().chain(["--score", "105"])).unwrap();
        match score.command {
            Commands::AddGrade { score, letter, .. } => {
                assert_eq!(grade_input(letter, score), Some(GradeInput::Score(105)));
            }
            _ => panic!("expected add-grade"),
        }
    }

    #[test]
    fn update_grade_can_clear_comments() {
        let id = uuid::Uuid::new_v4().to_string();
        let base = ["gradebook", "update-grade", "--id", id.as_str()];

        let both = Cli::try_parse_from(
            base.iter()
                .copied()
                .chain(["--comments", "Late work", "--clear-comments"]),
        );
        assert!(both.is_err());

        let cli = Cli::try_parse_from(base.iter().copied().chain(["--clear-comments"])).unwrap();
        match cli.command {
            Commands::UpdateGrade {
                comments,
                clear_comments,
                ..
            } => {
                let current = Some("Needs improvement".to_string());
                assert_eq!(merged_comments(current, comments, clear_comments), None);
            }
            _ => panic!("expected update-grade"),
        }
    }

    #[test]
    fn comments_are_kept_unless_replaced() {
        let current = Some("Needs improvement".to_string());
        assert_eq!(
            merged_comments(current.clone(), None, false),
            Some("Needs improvement".to_string())
        );
        assert_eq!(
            merged_comments(current, Some("Much better".to_string()), false),
            Some("Much better".to_string())
        );
    }

    #[test]
    fn student_commands_take_an_id() {
        let id = uuid::Uuid::new_v4().to_string();
        let cli = Cli::try_parse_from([
            "gradebook",
            "update-student",
            "--id",
            id.as_str(),
            "--status",
            "inactive",
        ])
        .unwrap();
        match cli.command {
            Commands::UpdateStudent { status, email, .. } => {
                assert_eq!(status, Some(StudentStatus::Inactive));
                assert_eq!(email, None);
            }
            _ => panic!("expected update-student"),
        }

        assert!(Cli::try_parse_from(["gradebook", "delete-student"]).is_err());
        assert!(Cli::try_parse_from(["gradebook", "delete-student", "--id", "not-a-uuid"]).is_err());
    }
}
