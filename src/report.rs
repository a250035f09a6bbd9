use std::fmt::Write;

use crate::gpa;
use crate::models::{
    Course, GpaEntry, GradeDistribution, GradeRecord, ReportRow, Student, StudentReport,
};

pub fn distribution(grades: &[GradeRecord]) -> GradeDistribution {
    let mut counts = GradeDistribution::default();

    for grade in grades {
        match grade.letter_grade.chars().next() {
            Some('A') => counts.a += 1,
            Some('B') => counts.b += 1,
            Some('C') => counts.c += 1,
            Some('D') => counts.d += 1,
            Some('F') => counts.f += 1,
            _ => {}
        }
    }

    counts
}

pub fn gpa_entries(rows: &[ReportRow]) -> Vec<GpaEntry> {
    rows.iter()
        .map(|row| GpaEntry {
            letter_grade: row.letter_grade.clone(),
            credits: f64::from(row.credits),
        })
        .collect()
}

/// Builds the report for one student, optionally narrowed to a term.
/// Returns `None` when nothing matches.
pub fn build_student_report(
    student: &Student,
    term: Option<&str>,
    grades: &[GradeRecord],
    courses: &[Course],
) -> Option<StudentReport> {
    let selected: Vec<GradeRecord> = grades
        .iter()
        .filter(|grade| grade.student_id == student.id)
        .filter(|grade| term.map_or(true, |term| grade.term == term))
        .cloned()
        .collect();

    if selected.is_empty() {
        return None;
    }

    let rows: Vec<ReportRow> = selected
        .iter()
        .map(|grade| {
            let course = courses.iter().find(|course| course.id == grade.course_id);
            let credits = course.map_or(0, |course| course.credit_hours);
            ReportRow {
                course_code: course.map_or_else(|| "N/A".to_string(), |c| c.code.clone()),
                course_name: course
                    .map_or_else(|| "Unknown Course".to_string(), |c| c.name.clone()),
                term: grade.term.clone(),
                letter_grade: grade.letter_grade.clone(),
                numerical_grade: grade.numerical_grade,
                credits,
                quality_points: gpa::letter_to_points(&grade.letter_grade)
                    .map(|points| points * f64::from(credits)),
                comments: grade.comments.clone(),
                date: grade.date,
            }
        })
        .collect();

    Some(StudentReport {
        student_name: student.full_name(),
        student_email: student.email.clone(),
        grade_level: student.grade_level.clone(),
        term: term.unwrap_or("All Terms").to_string(),
        gpa: gpa::calculate_gpa(&gpa_entries(&rows)),
        total_credits: rows.iter().map(|row| row.credits).sum(),
        distribution: distribution(&selected),
        rows,
    })
}

pub fn render_markdown(report: &StudentReport) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Grade Report");
    let _ = writeln!(
        output,
        "Generated for {} ({}, {}) covering {}",
        report.student_name, report.student_email, report.grade_level, report.term
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- GPA: {:.2}", report.gpa);
    let _ = writeln!(output, "- Total credits: {}", report.total_credits);
    let _ = writeln!(output, "- Courses graded: {}", report.rows.len());

    let _ = writeln!(output);
    let _ = writeln!(output, "## Grade Distribution");
    let counts = &report.distribution;
    for (band, count) in [
        ("A", counts.a),
        ("B", counts.b),
        ("C", counts.c),
        ("D", counts.d),
        ("F", counts.f),
    ] {
        let _ = writeln!(output, "- {band}: {count}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Courses");
    let _ = writeln!(output, "| Code | Course | Term | Grade | Credits | Points |");
    let _ = writeln!(output, "|---|---|---|---|---|---|");
    for row in report.rows.iter() {
        let points = row
            .quality_points
            .map_or_else(|| "N/A".to_string(), |points| format!("{points:.1}"));
        let grade = match row.numerical_grade {
            Some(score) => format!("{} ({score})", row.letter_grade),
            None => row.letter_grade.clone(),
        };
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} |",
            row.course_code, row.course_name, row.term, grade, row.credits, points
        );
    }

    let commented: Vec<&ReportRow> = report
        .rows
        .iter()
        .filter(|row| row.comments.is_some())
        .collect();
    if !commented.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Instructor Comments");
        for row in commented {
            let _ = writeln!(
                output,
                "- {} on {}: {}",
                row.course_code,
                row.date,
                row.comments.as_deref().unwrap_or_default()
            );
        }
    }

    output
}

pub fn render_json(report: &StudentReport) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StudentStatus;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn student() -> Student {
        Student {
            id: Uuid::new_v4(),
            first_name: "Emma".to_string(),
            last_name: "Wilson".to_string(),
            email: "emma.w@example.com".to_string(),
            grade_level: "11th".to_string(),
            status: StudentStatus::Active,
        }
    }

    fn course(code: &str, name: &str, credit_hours: i32) -> Course {
        Course {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: name.to_string(),
            credit_hours,
            department: "General".to_string(),
            description: String::new(),
        }
    }

    fn grade(student_id: Uuid, course_id: Uuid, term: &str, letter: &str) -> GradeRecord {
        GradeRecord {
            id: Uuid::new_v4(),
            student_id,
            course_id,
            term: term.to_string(),
            letter_grade: letter.to_string(),
            numerical_grade: None,
            comments: None,
            date: NaiveDate::from_ymd_opt(2023, 12, 15).unwrap(),
        }
    }

    #[test]
    fn report_weights_by_course_credits() {
        let emma = student();
        let math = course("MATH101", "Algebra I", 4);
        let english = course("ENG102", "English Composition", 3);
        let grades = vec![
            grade(emma.id, math.id, "Fall 2023", "A"),
            grade(emma.id, english.id, "Fall 2023", "B"),
            grade(Uuid::new_v4(), math.id, "Fall 2023", "F"),
        ];

        let report =
            build_student_report(&emma, None, &grades, &[math, english]).expect("report");
        assert_eq!(report.gpa, 3.57);
        assert_eq!(report.total_credits, 7);
        assert_eq!(report.term, "All Terms");
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].quality_points, Some(16.0));
    }

    #[test]
    fn term_filter_narrows_rows() {
        let emma = student();
        let math = course("MATH101", "Algebra I", 4);
        let grades = vec![
            grade(emma.id, math.id, "Fall 2023", "C"),
            grade(emma.id, math.id, "Spring 2024", "A-"),
        ];

        let report = build_student_report(&emma, Some("Spring 2024"), &grades, &[math])
            .expect("report");
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.gpa, 3.7);
        assert_eq!(report.term, "Spring 2024");

        let grades_only_fall = &grades[..1];
        assert!(build_student_report(&emma, Some("Spring 2024"), grades_only_fall, &[]).is_none());
    }

    #[test]
    fn withdrawn_courses_count_credits_but_not_gpa() {
        let emma = student();
        let art = course("ART104", "Introduction to Art", 2);
        let science = course("SCI103", "Biology", 4);
        let grades = vec![
            grade(emma.id, art.id, "Fall 2023", "W"),
            grade(emma.id, science.id, "Fall 2023", "B+"),
        ];

        let report =
            build_student_report(&emma, None, &grades, &[art, science]).expect("report");
        assert_eq!(report.gpa, 3.3);
        assert_eq!(report.total_credits, 6);
        assert_eq!(report.rows[0].quality_points, None);
    }

    #[test]
    fn missing_course_falls_back() {
        let emma = student();
        let grades = vec![grade(emma.id, Uuid::new_v4(), "Fall 2023", "A")];

        let report = build_student_report(&emma, None, &grades, &[]).expect("report");
        let row = &report.rows[0];
        assert_eq!(row.course_name, "Unknown Course");
        assert_eq!(row.course_code, "N/A");
        assert_eq!(row.credits, 0);
        assert_eq!(report.gpa, 0.0);
    }

    #[test]
    fn distribution_groups_by_band() {
        let id = Uuid::new_v4();
        let grades: Vec<GradeRecord> = ["A+", "A-", "B", "C+", "D-", "F", "I", "W"]
            .iter()
            .map(|letter| grade(id, id, "Fall 2023", letter))
            .collect();

        let counts = distribution(&grades);
        assert_eq!(
            counts,
            GradeDistribution {
                a: 2,
                b: 1,
                c: 1,
                d: 1,
                f: 1,
            }
        );
    }

    #[test]
    fn markdown_lists_courses_and_comments() {
        let emma = student();
        let math = course("MATH101", "Algebra I", 4);
        let mut graded = grade(emma.id, math.id, "Fall 2023", "A");
        graded.numerical_grade = Some(95);
        graded.comments = Some("Excellent work throughout the semester.".to_string());

        let report = build_student_report(&emma, None, &[graded], &[math]).expect("report");
        let markdown = render_markdown(&report);
        assert!(markdown.contains("- GPA: 4.00"));
        assert!(markdown.contains("| MATH101 | Algebra I | Fall 2023 | A (95) | 4 | 16.0 |"));
        assert!(markdown.contains("Excellent work throughout the semester."));

        let json = render_json(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["gpa"], 4.0);
        assert_eq!(value["distribution"]["a"], 1);
    }
}
