//! Сводки по прогнозам: курс, предметы преподавателя, школа в целом.
//!
//! Все сводки строятся через [`assess_student`] и в базу ничего не пишут.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::db::{assignments, catalog, people, predictions};
use crate::error::{CoreError, CoreResult};
use crate::grading::round2;
use crate::models::Term;
use crate::prediction::{
    assess_student, students_at_risk, tagged_recommendations, Assessment, AtRiskStudent, ModelInfo,
    PerformanceModel, RecommendationKind, RiskLevel, CLASS_HIGH,
};

pub const COURSE_SAMPLE: usize = 5;
pub const INSTITUTIONAL_SAMPLE: i64 = 100;
pub const OVERVIEW_RISK_THRESHOLD: f64 = 60.0;
pub const OVERVIEW_RISK_LIMIT: usize = 5;
pub const OVERVIEW_SAMPLE: usize = 3;

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Доля в процентах с одним знаком.
fn share(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round1(part as f64 * 100.0 / whole as f64)
}

fn is_at_risk(a: &Assessment) -> bool {
    a.prediction.risk_level >= RiskLevel::High
}

fn average(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    round2(scores.iter().sum::<f64>() / scores.len() as f64)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScoreStats {
    pub average: f64,
    /// Верхняя медиана: элемент `n / 2` отсортированного ряда
    pub median: f64,
    pub max: f64,
    pub min: f64,
    /// Стандартное отклонение по генеральной совокупности
    pub std_dev: f64,
}

pub fn score_stats(scores: &[f64]) -> Option<ScoreStats> {
    if scores.is_empty() {
        return None;
    }
    let mut sorted = scores.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let variance = sorted.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    Some(ScoreStats {
        average: round2(mean),
        median: round2(sorted[sorted.len() / 2]),
        max: round2(sorted[sorted.len() - 1]),
        min: round2(sorted[0]),
        std_dev: round2(variance.sqrt()),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentOutlook {
    pub student_id: i64,
    pub student_name: String,
    pub predicted_score: f64,
    pub classification: String,
    pub risk_level: RiskLevel,
}

impl From<&Assessment> for StudentOutlook {
    fn from(a: &Assessment) -> Self {
        Self {
            student_id: a.student.id,
            student_name: format!("{} {}", a.student.first_name, a.student.last_name),
            predicted_score: a.prediction.predicted_score,
            classification: a.prediction.classification.clone(),
            risk_level: a.prediction.risk_level,
        }
    }
}

/// Оценки студентов, зачисленных в курс в учебный год периода. Сбой по студенту пропускается.
async fn assess_course(
    pool: &SqlitePool,
    model: &dyn PerformanceModel,
    course_id: i64,
    subject_id: i64,
    term: &Term,
) -> CoreResult<Vec<Assessment>> {
    let enrollments = assignments::list_enrollments(pool, None, Some(course_id), Some(term.school_year_id)).await?;
    let mut out = Vec::with_capacity(enrollments.len());
    for enrollment in enrollments {
        match assess_student(pool, model, enrollment.student_id, subject_id, term.id).await {
            Ok(assessment) => out.push(assessment),
            Err(err) => warn!("Assessment skipped for student {}: {}", enrollment.student_id, err),
        }
    }
    Ok(out)
}

// ---------- Предметы преподавателя ----------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseOutlook {
    pub course_id: i64,
    pub course_name: String,
    pub total_students: usize,
    pub average: f64,
    pub at_risk: usize,
    pub sample: Vec<StudentOutlook>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubjectOutlook {
    pub subject_id: i64,
    pub subject_name: String,
    pub total_students: usize,
    pub average: f64,
    pub at_risk: usize,
    pub risk_pct: f64,
    pub courses: Vec<CourseOutlook>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TeacherOutlook {
    pub teacher_id: i64,
    pub teacher_name: String,
    pub term_id: i64,
    pub subjects: Vec<SubjectOutlook>,
}

/// Прогнозы по всем курсам каждого предмета преподавателя.
pub async fn teacher_outlook(
    pool: &SqlitePool,
    model: &dyn PerformanceModel,
    teacher_id: i64,
    term_id: i64,
) -> CoreResult<TeacherOutlook> {
    let teacher = people::get_teacher(pool, teacher_id).await?.ok_or_else(|| CoreError::not_found("Teacher"))?;
    let term = catalog::get_term(pool, term_id).await?.ok_or_else(|| CoreError::not_found("Term"))?;
    let subjects = assignments::subjects_of_teacher(pool, teacher_id).await?;
    if subjects.is_empty() {
        return Err(CoreError::not_found("Assigned subjects"));
    }

    let mut outlooks = Vec::with_capacity(subjects.len());
    for subject in subjects {
        let mut courses = Vec::new();
        let mut scores = Vec::new();
        let mut at_risk = 0;
        for course in assignments::courses_of_subject(pool, subject.id).await? {
            let assessed = assess_course(pool, model, course.id, subject.id, &term).await?;
            if assessed.is_empty() {
                continue;
            }
            let course_scores: Vec<f64> = assessed.iter().map(|a| a.prediction.predicted_score).collect();
            let course_risk = assessed.iter().filter(|a| is_at_risk(a)).count();
            courses.push(CourseOutlook {
                course_id: course.id,
                course_name: course.name,
                total_students: assessed.len(),
                average: average(&course_scores),
                at_risk: course_risk,
                sample: assessed.iter().take(COURSE_SAMPLE).map(StudentOutlook::from).collect(),
            });
            scores.extend(course_scores);
            at_risk += course_risk;
        }
        outlooks.push(SubjectOutlook {
            subject_id: subject.id,
            subject_name: subject.name,
            total_students: scores.len(),
            average: average(&scores),
            at_risk,
            risk_pct: share(at_risk, scores.len()),
            courses,
        });
    }

    info!("Teacher {} outlook built for {} subjects", teacher_id, outlooks.len());
    Ok(TeacherOutlook {
        teacher_id,
        teacher_name: format!("{} {}", teacher.first_name, teacher.last_name),
        term_id,
        subjects: outlooks,
    })
}

// ---------- Анализ курса ----------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OutlookGroup {
    pub count: usize,
    pub pct: f64,
    pub students: Vec<StudentOutlook>,
}

impl OutlookGroup {
    fn collect<'a>(all: &'a [Assessment], keep: impl Fn(&&'a Assessment) -> bool) -> Self {
        let students: Vec<StudentOutlook> = all.iter().filter(keep).map(StudentOutlook::from).collect();
        Self { count: students.len(), pct: share(students.len(), all.len()), students }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseAnalysis {
    pub course_id: i64,
    pub course_name: String,
    pub subject_id: i64,
    pub subject_name: String,
    pub term_id: i64,
    pub total_students: usize,
    pub stats: ScoreStats,
    pub by_class: BTreeMap<String, usize>,
    pub by_risk: BTreeMap<String, usize>,
    /// Высокий или критический риск либо прогноз ниже 60
    pub needs_attention: OutlookGroup,
    /// Прогноз от 80 и класс High
    pub high_performers: OutlookGroup,
    pub recommendations: Vec<String>,
    pub students: Vec<Assessment>,
}

pub fn course_recommendations(
    stats: &ScoreStats,
    total: usize,
    needs_attention: usize,
    high_performers: usize,
) -> Vec<String> {
    let mut out = Vec::new();
    if needs_attention as f64 > total as f64 * 0.3 {
        out.push("Large share of students at risk: review the teaching methodology".to_string());
        out.push("Run a group reinforcement programme".to_string());
    }
    if stats.average < 65.0 {
        out.push("Low course average: reassess the difficulty of the content".to_string());
        out.push("Consider adjusting the study plan".to_string());
    }
    if stats.std_dev > 20.0 {
        out.push("Wide spread in performance: give individual attention".to_string());
    }
    if high_performers > 0 {
        out.push(format!("{high_performers} outstanding students: offer advanced opportunities"));
    }
    out
}

pub async fn course_analysis(
    pool: &SqlitePool,
    model: &dyn PerformanceModel,
    course_id: i64,
    subject_id: i64,
    term_id: i64,
) -> CoreResult<CourseAnalysis> {
    let course = catalog::get_course(pool, course_id).await?.ok_or_else(|| CoreError::not_found("Course"))?;
    let subject = catalog::get_subject(pool, subject_id).await?.ok_or_else(|| CoreError::not_found("Subject"))?;
    let term = catalog::get_term(pool, term_id).await?.ok_or_else(|| CoreError::not_found("Term"))?;

    let students = assess_course(pool, model, course_id, subject_id, &term).await?;
    let scores: Vec<f64> = students.iter().map(|a| a.prediction.predicted_score).collect();
    let stats = score_stats(&scores).ok_or_else(|| CoreError::not_found("Students with predictions in the course"))?;

    let mut by_class = BTreeMap::new();
    let mut by_risk = BTreeMap::new();
    for a in &students {
        *by_class.entry(a.prediction.classification.clone()).or_insert(0) += 1;
        *by_risk.entry(a.prediction.risk_level.as_str().to_string()).or_insert(0) += 1;
    }

    let needs_attention =
        OutlookGroup::collect(&students, |a| is_at_risk(a) || a.prediction.predicted_score < 60.0);
    let high_performers = OutlookGroup::collect(&students, |a| {
        a.prediction.predicted_score >= 80.0 && a.prediction.classification == CLASS_HIGH
    });
    let recommendations =
        course_recommendations(&stats, students.len(), needs_attention.count, high_performers.count);

    Ok(CourseAnalysis {
        course_id,
        course_name: course.name,
        subject_id,
        subject_name: subject.name,
        term_id,
        total_students: students.len(),
        stats,
        by_class,
        by_risk,
        needs_attention,
        high_performers,
        recommendations,
        students,
    })
}

// ---------- Школа в целом ----------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LevelStats {
    pub total: usize,
    pub average: f64,
    pub at_risk: usize,
    pub risk_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InstitutionalReport {
    pub school_year_id: i64,
    pub term_id: i64,
    pub generated_at: NaiveDateTime,
    pub sample_size: usize,
    pub average: f64,
    pub by_level: BTreeMap<String, LevelStats>,
    pub at_risk: usize,
    pub at_risk_pct: f64,
    pub alerts: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Сводка по первым [`INSTITUTIONAL_SAMPLE`] парам (студент, предмет) учебного года.
pub async fn institutional_report(
    pool: &SqlitePool,
    model: &dyn PerformanceModel,
    school_year_id: i64,
    term_id: i64,
) -> CoreResult<InstitutionalReport> {
    catalog::get_school_year(pool, school_year_id)
        .await?
        .ok_or_else(|| CoreError::not_found("School year"))?;
    let term = catalog::get_term(pool, term_id).await?.ok_or_else(|| CoreError::not_found("Term"))?;
    if term.school_year_id != school_year_id {
        return Err(CoreError::validation("term does not belong to the school year"));
    }

    let mut levels: BTreeMap<String, (Vec<f64>, usize)> = BTreeMap::new();
    for target in predictions::prediction_targets(pool, school_year_id, INSTITUTIONAL_SAMPLE).await? {
        match assess_student(pool, model, target.student_id, target.subject_id, term_id).await {
            Ok(a) => {
                let slot = levels.entry(target.level).or_default();
                slot.0.push(a.prediction.predicted_score);
                slot.1 += usize::from(is_at_risk(&a));
            }
            Err(err) => warn!(
                "Assessment skipped for student {} in subject {}: {}",
                target.student_id, target.subject_id, err
            ),
        }
    }

    let all: Vec<f64> = levels.values().flat_map(|(scores, _)| scores.iter().copied()).collect();
    if all.is_empty() {
        return Err(CoreError::not_found("Predictions for the school year"));
    }
    let at_risk: usize = levels.values().map(|(_, risk)| risk).sum();
    let by_level = levels
        .into_iter()
        .map(|(level, (scores, risk))| {
            let stats = LevelStats {
                total: scores.len(),
                average: average(&scores),
                at_risk: risk,
                risk_pct: share(risk, scores.len()),
            };
            (level, stats)
        })
        .collect();

    let avg = average(&all);
    let at_risk_pct = share(at_risk, all.len());
    let mut alerts = Vec::new();
    if avg < 65.0 {
        alerts.push("Institutional average is below the expected standard".to_string());
    }
    if at_risk_pct > 25.0 {
        alerts.push(format!("{at_risk_pct:.1}% of students are at academic risk"));
    }

    info!("Institutional report for school year {}: {} predictions", school_year_id, all.len());
    Ok(InstitutionalReport {
        school_year_id,
        term_id,
        generated_at: crate::db::now(),
        sample_size: all.len(),
        average: avg,
        by_level,
        at_risk,
        at_risk_pct,
        alerts,
        recommendations: vec![
            "Monitor performance trends monthly".to_string(),
            "Run targeted support programmes".to_string(),
            "Use predictions for early intervention".to_string(),
        ],
    })
}

// ---------- Обзор модели ----------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModelOverview {
    pub model: ModelInfo,
    pub at_risk_detected: usize,
    pub at_risk_sample: Vec<AtRiskStudent>,
}

/// Сведения о модели и краткий список студентов в риске. Вне учебных периодов список пуст.
pub async fn model_overview(
    pool: &SqlitePool,
    model: &dyn PerformanceModel,
    today: NaiveDate,
) -> CoreResult<ModelOverview> {
    let at_risk = match students_at_risk(pool, model, OVERVIEW_RISK_THRESHOLD, OVERVIEW_RISK_LIMIT, today).await {
        Ok(students) => students,
        Err(CoreError::NotFound(_)) => Vec::new(),
        Err(err) => return Err(err),
    };
    Ok(ModelOverview {
        model: model.info(),
        at_risk_detected: at_risk.len(),
        at_risk_sample: at_risk.into_iter().take(OVERVIEW_SAMPLE).collect(),
    })
}

// ---------- Рекомендации студенту ----------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecommendationPlan {
    pub student_id: i64,
    pub student_name: String,
    pub subject_id: i64,
    pub term_id: i64,
    pub predicted_score: f64,
    pub classification: String,
    pub risk_level: RiskLevel,
    pub recommendations: Vec<String>,
    pub immediate: Vec<String>,
    pub follow_up: Vec<String>,
    pub motivation: Vec<String>,
}

pub async fn recommendation_plan(
    pool: &SqlitePool,
    model: &dyn PerformanceModel,
    student_id: i64,
    subject_id: i64,
    term_id: i64,
) -> CoreResult<RecommendationPlan> {
    let a = assess_student(pool, model, student_id, subject_id, term_id).await?;
    let p = &a.prediction;
    let tagged = tagged_recommendations(p.predicted_score, &p.classification, &p.features);
    let of_kind = |kind: RecommendationKind| -> Vec<String> {
        tagged.iter().filter(|(k, _)| *k == kind).map(|(_, text)| text.to_string()).collect()
    };

    Ok(RecommendationPlan {
        student_id,
        student_name: format!("{} {}", a.student.first_name, a.student.last_name),
        subject_id,
        term_id,
        predicted_score: p.predicted_score,
        classification: p.classification.clone(),
        risk_level: p.risk_level,
        recommendations: tagged.iter().map(|(_, text)| text.to_string()).collect(),
        immediate: of_kind(RecommendationKind::Immediate),
        follow_up: of_kind(RecommendationKind::FollowUp),
        motivation: of_kind(RecommendationKind::Motivation),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateSchoolYearRequest, CreateTermRequest};
    use crate::prediction::{Features, CLASS_LOW};
    use crate::testing::{self, School};

    /// Прогноз равен взвешенной оценке за период.
    struct Echo;

    impl PerformanceModel for Echo {
        fn predict_score(&self, features: &Features) -> f64 {
            features.prior_average
        }

        fn info(&self) -> ModelInfo {
            ModelInfo {
                name: "Echo".to_string(),
                source: "test".to_string(),
                features: vec!["prior_average".to_string()],
                coefficients: BTreeMap::new(),
                intercept: 0.0,
                class_thresholds: BTreeMap::new(),
            }
        }
    }

    // Ана: 100 по всем типам. Луис: 40 за экзамен и 20 за задания, итого 26.
    async fn graded_school() -> School {
        let school = testing::school().await;
        for type_id in [school.exam_type_id, school.homework_type_id, school.participation_type_id] {
            school.evaluation(school.student_id, type_id, 100.0).await;
        }
        school.evaluation(school.second_student_id, school.exam_type_id, 40.0).await;
        school.evaluation(school.second_student_id, school.homework_type_id, 20.0).await;
        school
    }

    #[test]
    fn stats_use_upper_median_and_population_deviation() {
        let stats = score_stats(&[70.0, 50.0, 90.0, 60.0]).unwrap();
        assert_eq!(stats.average, 67.5);
        assert_eq!(stats.median, 70.0);
        assert_eq!((stats.min, stats.max), (50.0, 90.0));
        assert_eq!(stats.std_dev, 14.79);
        assert!(score_stats(&[]).is_none());
    }

    #[test]
    fn course_recommendations_by_signal() {
        let calm = ScoreStats { average: 75.0, median: 75.0, max: 80.0, min: 70.0, std_dev: 5.0 };
        assert!(course_recommendations(&calm, 10, 3, 0).is_empty());

        let rough = ScoreStats { average: 60.0, median: 55.0, max: 95.0, min: 20.0, std_dev: 25.0 };
        let recs = course_recommendations(&rough, 10, 4, 2);
        assert_eq!(recs.len(), 6);
        assert!(recs[5].starts_with("2 outstanding"));
    }

    #[tokio::test]
    async fn course_analysis_splits_students() {
        let school = graded_school().await;
        let analysis = course_analysis(&school.pool, &Echo, school.course_id, school.subject_id, school.term_ids[0])
            .await
            .unwrap();

        assert_eq!(analysis.total_students, 2);
        assert_eq!(analysis.stats, ScoreStats { average: 63.0, median: 100.0, max: 100.0, min: 26.0, std_dev: 37.0 });
        assert_eq!(analysis.by_class.get(CLASS_HIGH), Some(&1));
        assert_eq!(analysis.by_class.get(CLASS_LOW), Some(&1));
        assert_eq!(analysis.by_risk.get("critical"), Some(&1));
        assert_eq!(analysis.by_risk.get("low"), Some(&1));

        assert_eq!(analysis.needs_attention.count, 1);
        assert_eq!(analysis.needs_attention.pct, 50.0);
        assert_eq!(analysis.needs_attention.students[0].student_id, school.second_student_id);
        assert_eq!(analysis.high_performers.students[0].student_id, school.student_id);
        assert_eq!(analysis.recommendations.len(), 6);

        // Сводка не сохраняет прогнозы
        let stored = predictions::list_predictions(&school.pool, &Default::default(), 10).await.unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn empty_course_is_not_found() {
        let school = testing::school().await;
        let next = catalog::create_school_year(
            &school.pool,
            &CreateSchoolYearRequest { year: "2026".to_string(), description: "School year 2026".to_string() },
        )
        .await
        .unwrap();
        let term = catalog::create_term(
            &school.pool,
            &CreateTermRequest {
                name: "First Term".to_string(),
                start_date: testing::date(2026, 2, 1),
                end_date: testing::date(2026, 4, 30),
                school_year_id: next.id,
            },
        )
        .await
        .unwrap();

        let err = course_analysis(&school.pool, &Echo, school.course_id, school.subject_id, term.id).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
        let err = institutional_report(&school.pool, &Echo, next.id, term.id).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
        let err = institutional_report(&school.pool, &Echo, school.school_year_id, term.id).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn teacher_outlook_per_subject_and_course() {
        let school = graded_school().await;
        let outlook = teacher_outlook(&school.pool, &Echo, school.teacher_id, school.term_ids[0]).await.unwrap();
        assert_eq!(outlook.teacher_name, "Carlos Mendoza");
        assert_eq!(outlook.subjects.len(), 1);

        let math = &outlook.subjects[0];
        assert_eq!((math.total_students, math.at_risk), (2, 1));
        assert_eq!(math.average, 63.0);
        assert_eq!(math.risk_pct, 50.0);
        assert_eq!(math.courses.len(), 1);
        assert_eq!(math.courses[0].course_name, "1A");
        assert_eq!(math.courses[0].sample.len(), 2);

        let err = teacher_outlook(&school.pool, &Echo, school.admin_id, school.term_ids[0]).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(ref what) if what == "Assigned subjects"));
    }

    #[tokio::test]
    async fn institutional_report_by_level() {
        let school = graded_school().await;
        let report = institutional_report(&school.pool, &Echo, school.school_year_id, school.term_ids[0])
            .await
            .unwrap();
        assert_eq!(report.sample_size, 2);
        assert_eq!(report.average, 63.0);
        assert_eq!((report.at_risk, report.at_risk_pct), (1, 50.0));
        assert_eq!(
            report.by_level.get("Secondary"),
            Some(&LevelStats { total: 2, average: 63.0, at_risk: 1, risk_pct: 50.0 })
        );
        assert_eq!(report.alerts.len(), 2);
        assert_eq!(report.recommendations.len(), 3);
    }

    #[tokio::test]
    async fn overview_and_recommendation_plan() {
        let school = graded_school().await;
        let overview = model_overview(&school.pool, &Echo, testing::date(2025, 3, 10)).await.unwrap();
        assert_eq!(overview.model.name, "Echo");
        assert_eq!(overview.at_risk_detected, 1);
        assert_eq!(overview.at_risk_sample[0].student_id, school.second_student_id);

        let idle = model_overview(&school.pool, &Echo, testing::date(2026, 1, 15)).await.unwrap();
        assert_eq!(idle.at_risk_detected, 0);

        let plan = recommendation_plan(&school.pool, &Echo, school.second_student_id, school.subject_id, school.term_ids[0])
            .await
            .unwrap();
        assert_eq!(plan.predicted_score, 26.0);
        assert_eq!(plan.risk_level, RiskLevel::Critical);
        assert_eq!(plan.recommendations.len(), 6);
        assert_eq!((plan.immediate.len(), plan.follow_up.len(), plan.motivation.len()), (4, 2, 0));

        let top = recommendation_plan(&school.pool, &Echo, school.student_id, school.subject_id, school.term_ids[0])
            .await
            .unwrap();
        assert_eq!(top.classification, CLASS_HIGH);
        assert!(top.immediate.is_empty());
        assert_eq!(top.motivation.len(), 4);
    }
}
