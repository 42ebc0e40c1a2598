//! Академический отчёт студента за учебный год и его HTML-представление для писем.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::auth::UserType;
use crate::db::{self, assignments, catalog, grades, people, predictions};
use crate::error::{CoreError, CoreResult};
use crate::grading::round2;
use crate::models::{Course, SchoolYear, StoredPrediction, Student};
use crate::prediction::classify;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubjectScore {
    pub subject_id: i64,
    pub subject_name: String,
    pub final_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TermReport {
    pub term_id: i64,
    pub term_name: String,
    pub subjects: Vec<SubjectScore>,
    pub average: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AcademicReport {
    pub student: Student,
    pub course: Option<Course>,
    pub school_year: SchoolYear,
    pub terms: Vec<TermReport>,
    pub predictions: Vec<StoredPrediction>,
    pub overall_average: Option<f64>,
    pub generated_at: NaiveDateTime,
}

fn average(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.into_iter().fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| round2(sum / count as f64))
}

pub async fn academic_report(pool: &SqlitePool, student_id: i64, school_year_id: i64) -> CoreResult<AcademicReport> {
    let student = people::get_student(pool, student_id).await?.ok_or_else(|| CoreError::not_found("Student"))?;
    let school_year = catalog::get_school_year(pool, school_year_id)
        .await?
        .ok_or_else(|| CoreError::not_found("School year"))?;

    let course = match assignments::enrollment_for_year(pool, student_id, school_year_id).await? {
        Some(enrollment) => catalog::get_course(pool, enrollment.course_id).await?,
        None => None,
    };

    // Периоды идут в порядке дат, как их возвращает запрос
    let mut terms: Vec<TermReport> = Vec::new();
    for grade in grades::student_grades_for_year(pool, student_id, school_year_id).await? {
        let score = SubjectScore {
            subject_id: grade.subject_id,
            subject_name: grade.subject_name,
            final_score: grade.final_score,
        };
        match terms.iter_mut().find(|t| t.term_id == grade.term_id) {
            Some(term) => term.subjects.push(score),
            None => terms.push(TermReport {
                term_id: grade.term_id,
                term_name: grade.term_name,
                subjects: vec![score],
                average: None,
            }),
        }
    }
    for term in &mut terms {
        term.average = average(term.subjects.iter().map(|s| s.final_score));
    }
    let overall_average = average(terms.iter().flat_map(|t| t.subjects.iter().map(|s| s.final_score)));

    let predictions = predictions::student_predictions_for_year(pool, student_id, school_year_id).await?;

    Ok(AcademicReport {
        student,
        course,
        school_year,
        terms,
        predictions,
        overall_average,
        generated_at: db::now(),
    })
}

pub fn email_subject(report: &AcademicReport, audience: UserType) -> String {
    let name = report.student.full_name();
    let year = &report.school_year.year;
    match audience {
        UserType::Student => format!("Your academic report - school year {year}"),
        UserType::Parent => format!("Academic report of {name} - school year {year}"),
        UserType::Teacher => format!("Academic report of student {name}"),
        UserType::Admin => format!("Full academic report - {name}"),
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn badge(score: f64) -> &'static str {
    match classify(score) {
        "Low" => "badge low",
        "Medium" => "badge medium",
        _ => "badge",
    }
}

const STYLE: &str = "body{font-family:Segoe UI,Tahoma,sans-serif;color:#333;max-width:800px;margin:0 auto;padding:20px}\
.header{background:#667eea;color:#fff;padding:24px;border-radius:10px;text-align:center}\
.card{background:#fff;padding:20px;border-radius:10px;border:1px solid #ddd;margin:20px 0}\
table{width:100%;border-collapse:collapse}td,th{padding:6px;border-bottom:1px solid #eee;text-align:left}\
.badge{background:#4caf50;color:#fff;padding:2px 10px;border-radius:12px}\
.badge.medium{background:#ff9800}.badge.low{background:#f44336}";

pub fn render_html(report: &AcademicReport, recipient_name: &str) -> String {
    let student = &report.student;
    let mut html = String::new();
    html.push_str("<!DOCTYPE html><html><head><meta charset=\"UTF-8\"><title>Academic report</title><style>");
    html.push_str(STYLE);
    html.push_str("</style></head><body>");
    html.push_str(&format!(
        "<div class=\"header\"><h1>Academic report</h1><p>School year {}</p></div>",
        escape(&report.school_year.year)
    ));
    html.push_str(&format!("<p>Hello {},</p>", escape(recipient_name)));

    html.push_str("<div class=\"card\"><h2>Student</h2>");
    html.push_str(&format!("<p><b>Name:</b> {}</p>", escape(&student.full_name())));
    if let Some(course) = &report.course {
        html.push_str(&format!(
            "<p><b>Course:</b> {} ({}, {})</p>",
            escape(&course.name),
            escape(&course.level),
            escape(&course.shift)
        ));
    }
    match report.overall_average {
        Some(avg) => html.push_str(&format!(
            "<p><b>Overall average:</b> <span class=\"{}\">{:.2}</span></p>",
            badge(avg),
            avg
        )),
        None => html.push_str("<p>No final grades have been computed yet.</p>"),
    }
    html.push_str("</div>");

    for term in &report.terms {
        html.push_str(&format!("<div class=\"card\"><h2>{}</h2><table>", escape(&term.term_name)));
        html.push_str("<tr><th>Subject</th><th>Final score</th></tr>");
        for subject in &term.subjects {
            html.push_str(&format!(
                "<tr><td>{}</td><td><span class=\"{}\">{:.2}</span></td></tr>",
                escape(&subject.subject_name),
                badge(subject.final_score),
                subject.final_score
            ));
        }
        html.push_str("</table>");
        if let Some(avg) = term.average {
            html.push_str(&format!("<p><b>Term average:</b> {avg:.2}</p>"));
        }
        html.push_str("</div>");
    }

    if !report.predictions.is_empty() {
        html.push_str("<div class=\"card\"><h2>Predictions</h2><table>");
        html.push_str("<tr><th>Subject</th><th>Term</th><th>Predicted</th><th>Class</th></tr>");
        for p in &report.predictions {
            let subject = report
                .terms
                .iter()
                .flat_map(|t| t.subjects.iter())
                .find(|s| s.subject_id == p.subject_id)
                .map(|s| escape(&s.subject_name))
                .unwrap_or_else(|| format!("#{}", p.subject_id));
            let term = report
                .terms
                .iter()
                .find(|t| t.term_id == p.term_id)
                .map(|t| escape(&t.term_name))
                .unwrap_or_else(|| format!("#{}", p.term_id));
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{:.2}</td><td>{}</td></tr>",
                subject,
                term,
                p.predicted_score,
                escape(&p.classification)
            ));
        }
        html.push_str("</table></div>");
    }

    html.push_str(&format!(
        "<p style=\"color:#888\">Generated at {}</p></body></html>",
        report.generated_at.format("%Y-%m-%d %H:%M")
    ));
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::compute_final_grade;
    use crate::testing;

    #[tokio::test]
    async fn report_groups_grades_by_term() {
        let school = testing::school().await;
        school.evaluation(school.student_id, school.exam_type_id, 80.0).await;
        compute_final_grade(
            &school.pool,
            school.student_id,
            school.subject_id,
            school.term_ids[0],
            school.school_year_id,
            school.teacher_id,
        )
        .await
        .unwrap();
        grades::upsert_final_grade(&school.pool, school.student_id, school.subject_id, school.term_ids[1], 60.0)
            .await
            .unwrap();

        let report = academic_report(&school.pool, school.student_id, school.school_year_id).await.unwrap();
        assert_eq!(report.course.as_ref().map(|c| c.name.as_str()), Some("1A"));
        assert_eq!(report.terms.len(), 2);
        assert_eq!(report.terms[0].term_name, "First Term");
        assert_eq!(report.terms[0].average, Some(40.0));
        assert_eq!(report.overall_average, Some(50.0));

        let html = render_html(&report, "Maria <Rojas>");
        assert!(html.contains("Mathematics"));
        assert!(html.contains("Maria &lt;Rojas&gt;"));
        assert!(email_subject(&report, UserType::Parent).contains("Ana Rojas"));
    }

    #[tokio::test]
    async fn report_without_grades_has_no_average() {
        let school = testing::school().await;
        let report = academic_report(&school.pool, school.second_student_id, school.school_year_id).await.unwrap();
        assert!(report.terms.is_empty());
        assert_eq!(report.overall_average, None);
        assert!(render_html(&report, "Luis").contains("No final grades"));

        let err = academic_report(&school.pool, 999, school.school_year_id).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
