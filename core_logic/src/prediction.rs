//! Прогноз успеваемости: линейная модель, классификация, риск и рекомендации.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::db::{assignments, catalog, evaluations, grades, people, predictions};
use crate::error::{CoreError, CoreResult};
use crate::grading::{round2, weighted_final_score, TypeContribution};

pub const CLASS_LOW: &str = "Low";
pub const CLASS_MEDIUM: &str = "Medium";
pub const CLASS_HIGH: &str = "High";

pub const DEFAULT_ATTENDANCE: f64 = 85.0;
pub const DEFAULT_PARTICIPATION: f64 = 70.0;
pub const MAX_RECOMMENDATIONS: usize = 6;

// Центры классов выбраны так, что середины между ними совпадают с порогами 51 и 71.
const CLASS_CENTRES: [(&str, f64); 3] = [(CLASS_LOW, 41.0), (CLASS_MEDIUM, 61.0), (CLASS_HIGH, 81.0)];
const SOFTMAX_SCALE: f64 = 10.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Features {
    pub prior_average: f64,
    pub attendance_pct: f64,
    pub participation_avg: f64,
    #[serde(default)]
    pub exam_avg: Option<f64>,
    #[serde(default)]
    pub homework_avg: Option<f64>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub male: Option<bool>,
    #[serde(default)]
    pub morning_shift: Option<bool>,
}

impl Features {
    pub fn validate(&self) -> CoreResult<()> {
        let ranged = [
            ("prior_average", Some(self.prior_average)),
            ("attendance_pct", Some(self.attendance_pct)),
            ("participation_avg", Some(self.participation_avg)),
            ("exam_avg", self.exam_avg),
            ("homework_avg", self.homework_avg),
        ];
        for (name, value) in ranged {
            if let Some(value) = value {
                if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                    return Err(CoreError::validation(format!("{name} must be between 0 and 100")));
                }
            }
        }
        Ok(())
    }
}

/// Модель, превращающая признаки студента в ожидаемый балл.
pub trait PerformanceModel: Send + Sync {
    fn predict_score(&self, features: &Features) -> f64;
    fn info(&self) -> ModelInfo;
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModelInfo {
    pub name: String,
    pub source: String,
    pub features: Vec<String>,
    pub coefficients: BTreeMap<String, f64>,
    pub intercept: f64,
    pub class_thresholds: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub prior_average: f64,
    pub attendance_pct: f64,
    pub participation_avg: f64,
    #[serde(default)]
    pub exam_avg: f64,
    #[serde(default)]
    pub homework_avg: f64,
    #[serde(default)]
    pub age: f64,
    #[serde(default)]
    pub male: f64,
    #[serde(default)]
    pub morning_shift: f64,
    #[serde(skip)]
    source: String,
}

impl Default for LinearModel {
    fn default() -> Self {
        Self {
            intercept: 2.0,
            prior_average: 0.62,
            attendance_pct: 0.18,
            participation_avg: 0.15,
            exam_avg: 0.0,
            homework_avg: 0.0,
            age: -0.05,
            male: 0.0,
            morning_shift: 0.5,
            source: "built-in".to_string(),
        }
    }
}

impl LinearModel {
    /// Коэффициенты из JSON-файла; отсутствующие необязательные признаки равны нулю.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let mut model: LinearModel = serde_json::from_str(&raw)?;
        model.source = path.display().to_string();
        Ok(model)
    }

    /// Файл из настроек, если задан, иначе встроенные коэффициенты.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let model = Self::from_file(path)?;
                info!("Prediction model loaded from {}", path);
                Ok(model)
            }
            None => Ok(Self::default()),
        }
    }

    fn terms(&self, f: &Features) -> [(&'static str, f64, f64); 8] {
        let flag = |v: Option<bool>| if v.unwrap_or(false) { 1.0 } else { 0.0 };
        [
            ("prior_average", self.prior_average, f.prior_average),
            ("attendance_pct", self.attendance_pct, f.attendance_pct),
            ("participation_avg", self.participation_avg, f.participation_avg),
            ("exam_avg", self.exam_avg, f.exam_avg.unwrap_or(0.0)),
            ("homework_avg", self.homework_avg, f.homework_avg.unwrap_or(0.0)),
            ("age", self.age, f.age.map(f64::from).unwrap_or(0.0)),
            ("male", self.male, flag(f.male)),
            ("morning_shift", self.morning_shift, flag(f.morning_shift)),
        ]
    }
}

impl PerformanceModel for LinearModel {
    fn predict_score(&self, features: &Features) -> f64 {
        let raw = self
            .terms(features)
            .iter()
            .fold(self.intercept, |acc, (_, coef, value)| acc + coef * value);
        raw.clamp(0.0, 100.0)
    }

    fn info(&self) -> ModelInfo {
        let terms = self.terms(&Features::default());
        ModelInfo {
            name: "LinearModel".to_string(),
            source: self.source.clone(),
            features: terms.iter().map(|(name, _, _)| name.to_string()).collect(),
            coefficients: terms.iter().map(|(name, coef, _)| (name.to_string(), *coef)).collect(),
            intercept: self.intercept,
            class_thresholds: BTreeMap::from([(CLASS_MEDIUM.to_string(), 51.0), (CLASS_HIGH.to_string(), 71.0)]),
        }
    }
}

pub fn classify(score: f64) -> &'static str {
    if score < 51.0 {
        CLASS_LOW
    } else if score < 71.0 {
        CLASS_MEDIUM
    } else {
        CLASS_HIGH
    }
}

/// Softmax по отрицательному расстоянию до центров классов.
pub fn probabilities(score: f64) -> BTreeMap<String, f64> {
    let logits: Vec<f64> = CLASS_CENTRES
        .iter()
        .map(|(_, centre)| -(score - centre).abs() / SOFTMAX_SCALE)
        .collect();
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    CLASS_CENTRES
        .iter()
        .zip(exps)
        .map(|((class, _), e)| (class.to_string(), e / sum))
        .collect()
}

pub fn confidence(probs: &BTreeMap<String, f64>) -> f64 {
    let max = probs.values().copied().fold(0.0, f64::max);
    (max * 10_000.0).round() / 10_000.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

pub fn risk_level(score: f64, features: &Features) -> RiskLevel {
    let mut points = 0;
    points += if score < 40.0 {
        3
    } else if score < 60.0 {
        2
    } else if score < 70.0 {
        1
    } else {
        0
    };
    points += if features.attendance_pct < 70.0 {
        2
    } else if features.attendance_pct < 85.0 {
        1
    } else {
        0
    };
    points += if features.prior_average < 50.0 {
        2
    } else if features.prior_average < 70.0 {
        1
    } else {
        0
    };

    match points {
        p if p >= 5 => RiskLevel::Critical,
        p if p >= 3 => RiskLevel::High,
        p if p >= 1 => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationKind {
    Immediate,
    FollowUp,
    Motivation,
}

/// Рекомендации вместе с категорией, не больше [`MAX_RECOMMENDATIONS`].
pub fn tagged_recommendations(score: f64, class: &str, features: &Features) -> Vec<(RecommendationKind, &'static str)> {
    use RecommendationKind::*;

    let mut out = Vec::new();
    if score < 50.0 {
        out.push((Immediate, "Immediate attention required: schedule a meeting with the student"));
        out.push((Immediate, "Arrange urgent tutoring in the weakest areas"));
    } else if score < 70.0 {
        out.push((FollowUp, "Reinforcement needed in key topics"));
        out.push((FollowUp, "Assign targeted practice exercises"));
    } else {
        out.push((Motivation, "Keep up the current performance"));
        out.push((Motivation, "Offer additional challenges to sustain motivation"));
    }

    if features.prior_average < 60.0 {
        out.push((FollowUp, "Work on study techniques and habits"));
        out.push((FollowUp, "Review the evaluation methodology used with the student"));
    }
    if features.attendance_pct < 80.0 {
        out.push((Immediate, "Improve class attendance"));
        out.push((Immediate, "Contact the parents about attendance"));
    }
    if features.participation_avg < 60.0 {
        out.push((FollowUp, "Encourage active participation in class"));
        out.push((FollowUp, "Build a trusting environment so the student speaks up"));
    }
    match class {
        CLASS_HIGH => {
            out.push((Motivation, "Consider leadership roles in group work"));
            out.push((Motivation, "Recognize the student's achievements"));
        }
        CLASS_LOW => {
            out.push((Immediate, "Prepare a personalised improvement plan"));
            out.push((Immediate, "Involve the family in the learning process"));
        }
        _ => {}
    }

    out.truncate(MAX_RECOMMENDATIONS);
    out
}

pub fn recommendations(score: f64, class: &str, features: &Features) -> Vec<String> {
    tagged_recommendations(score, class, features)
        .into_iter()
        .map(|(_, text)| text.to_string())
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PredictionResult {
    pub predicted_score: f64,
    pub classification: String,
    pub probabilities: BTreeMap<String, f64>,
    pub confidence: f64,
    pub risk_level: RiskLevel,
    pub recommendations: Vec<String>,
    pub features: Features,
    pub generated_at: chrono::NaiveDateTime,
    pub model: String,
}

/// Прогноз по готовым признакам, без обращения к базе.
pub fn predict(model: &dyn PerformanceModel, features: &Features) -> CoreResult<PredictionResult> {
    features.validate()?;
    let score = round2(model.predict_score(features).clamp(0.0, 100.0));
    let class = classify(score);
    let probs = probabilities(score);
    Ok(PredictionResult {
        predicted_score: score,
        classification: class.to_string(),
        confidence: confidence(&probs),
        probabilities: probs,
        risk_level: risk_level(score, features),
        recommendations: recommendations(score, class, features),
        features: features.clone(),
        generated_at: crate::db::now(),
        model: model.info().name,
    })
}

pub fn is_male(gender: &str) -> bool {
    let gender = gender.trim();
    gender.eq_ignore_ascii_case("masculino") || gender.eq_ignore_ascii_case("m") || gender.eq_ignore_ascii_case("male")
}

fn age_on(birth: NaiveDate, today: NaiveDate) -> u32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age.max(0) as u32
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PredictedStudent {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub gender: String,
    pub age: u32,
}

/// Прогноз без записи в базу.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Assessment {
    pub subject_id: i64,
    pub term_id: i64,
    pub prediction: PredictionResult,
    pub breakdown: Vec<TypeContribution>,
    pub student: PredictedStudent,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentPrediction {
    pub prediction_id: i64,
    pub subject_id: i64,
    pub term_id: i64,
    pub prediction: PredictionResult,
    pub breakdown: Vec<TypeContribution>,
    pub student: PredictedStudent,
}

/// Признаки из базы: взвешенная оценка за период, посещаемость и участие.
/// Ничего не записывает.
pub async fn assess_student(
    pool: &SqlitePool,
    model: &dyn PerformanceModel,
    student_id: i64,
    subject_id: i64,
    term_id: i64,
) -> CoreResult<Assessment> {
    let student = people::get_student(pool, student_id).await?.ok_or_else(|| CoreError::not_found("Student"))?;
    catalog::get_subject(pool, subject_id).await?.ok_or_else(|| CoreError::not_found("Subject"))?;
    let term = catalog::get_term(pool, term_id).await?.ok_or_else(|| CoreError::not_found("Term"))?;
    let teacher_id = assignments::assigned_teacher(pool, subject_id)
        .await?
        .ok_or_else(|| CoreError::validation("no teacher assigned to the subject"))?;

    let weights = assignments::list_weights(pool, Some(teacher_id), Some(subject_id), Some(term.school_year_id)).await?;
    let averages = evaluations::averages_by_type(pool, student_id, subject_id, term_id).await?;
    let (prior_average, breakdown) = weighted_final_score(&averages, &weights);

    let by_name = |name: &'static str| evaluations::average_for_type_name(pool, student_id, subject_id, term_id, name);
    let attendance = by_name("Attendance").await?.map(round2).unwrap_or(DEFAULT_ATTENDANCE);
    let participation = by_name("Participation").await?.map(round2).unwrap_or(DEFAULT_PARTICIPATION);
    let exam_avg = by_name("Exam").await?.map(round2);
    let homework_avg = by_name("Homework").await?.map(round2);

    let morning_shift = match assignments::enrollment_for_year(pool, student_id, term.school_year_id).await? {
        Some(enrollment) => catalog::get_course(pool, enrollment.course_id)
            .await?
            .map(|course| course.shift.to_lowercase().starts_with("morn") || course.shift.eq_ignore_ascii_case("mañana")),
        None => None,
    };

    let age = age_on(student.birth_date, Utc::now().date_naive());
    let features = Features {
        prior_average,
        attendance_pct: attendance,
        participation_avg: participation,
        exam_avg,
        homework_avg,
        age: Some(age),
        male: Some(is_male(&student.gender)),
        morning_shift: Some(morning_shift.unwrap_or(true)),
    };
    let prediction = predict(model, &features)?;

    Ok(Assessment {
        subject_id,
        term_id,
        prediction,
        breakdown,
        student: PredictedStudent {
            id: student.id,
            first_name: student.first_name,
            last_name: student.last_name,
            gender: student.gender,
            age,
        },
    })
}

/// То же, что [`assess_student`], но сохраняет прогноз и итоговую оценку за период.
pub async fn predict_for_student(
    pool: &SqlitePool,
    model: &dyn PerformanceModel,
    student_id: i64,
    subject_id: i64,
    term_id: i64,
) -> CoreResult<StudentPrediction> {
    let assessment = assess_student(pool, model, student_id, subject_id, term_id).await?;
    let features = &assessment.prediction.features;

    let stored = predictions::upsert_prediction(
        pool,
        &predictions::PredictionRow {
            student_id,
            subject_id,
            term_id,
            grade_average: features.prior_average,
            attendance_pct: features.attendance_pct,
            participation_avg: features.participation_avg,
            predicted_score: assessment.prediction.predicted_score,
            classification: &assessment.prediction.classification,
        },
    )
    .await?;
    grades::upsert_final_grade(pool, student_id, subject_id, term_id, features.prior_average).await?;

    info!(
        "Prediction stored: student={}, subject={}, term={}, score={}, class={}",
        student_id, subject_id, term_id, assessment.prediction.predicted_score, assessment.prediction.classification
    );

    Ok(StudentPrediction {
        prediction_id: stored.id,
        subject_id,
        term_id,
        prediction: assessment.prediction,
        breakdown: assessment.breakdown,
        student: assessment.student,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchItem {
    pub student_id: i64,
    pub result: Option<StudentPrediction>,
    pub error: Option<String>,
}

/// Прогноз для всех студентов курса. Ошибка по одному студенту не прерывает пакет.
pub async fn predict_course(
    pool: &SqlitePool,
    model: &dyn PerformanceModel,
    course_id: i64,
    subject_id: i64,
    term_id: i64,
) -> CoreResult<Vec<BatchItem>> {
    catalog::get_course(pool, course_id).await?.ok_or_else(|| CoreError::not_found("Course"))?;
    let student_ids = assignments::course_student_ids(pool, course_id).await?;
    let mut out = Vec::with_capacity(student_ids.len());
    for student_id in student_ids {
        match predict_for_student(pool, model, student_id, subject_id, term_id).await {
            Ok(result) => out.push(BatchItem { student_id, result: Some(result), error: None }),
            Err(err) => {
                warn!("Prediction failed for student {}: {}", student_id, err);
                out.push(BatchItem { student_id, result: None, error: Some(err.to_string()) });
            }
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AtRiskStudent {
    pub student_id: i64,
    pub student_name: String,
    pub course_id: i64,
    pub subject_id: i64,
    pub term_id: i64,
    pub predicted_score: f64,
    pub classification: String,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub recommendations: Vec<String>,
}

/// Студенты текущего периода с прогнозом ниже порога или высоким риском.
/// Для каждого студента берётся первый предмет его курса. Прогнозы не сохраняются.
pub async fn students_at_risk(
    pool: &SqlitePool,
    model: &dyn PerformanceModel,
    threshold: f64,
    limit: usize,
    today: NaiveDate,
) -> CoreResult<Vec<AtRiskStudent>> {
    let term = catalog::term_for_date(pool, today)
        .await?
        .ok_or_else(|| CoreError::not_found("Term for the current date"))?;
    let enrollments = assignments::list_enrollments(pool, None, None, Some(term.school_year_id)).await?;

    let mut at_risk = Vec::new();
    for enrollment in enrollments {
        let Some(subject) = assignments::subjects_of_course(pool, enrollment.course_id).await?.into_iter().next() else {
            continue;
        };
        let result = match assess_student(pool, model, enrollment.student_id, subject.id, term.id).await {
            Ok(result) => result,
            Err(err) => {
                warn!("Risk evaluation failed for student {}: {}", enrollment.student_id, err);
                continue;
            }
        };
        let p = result.prediction;
        if p.predicted_score < threshold || p.risk_level >= RiskLevel::High {
            at_risk.push(AtRiskStudent {
                student_id: enrollment.student_id,
                student_name: enrollment.student_name,
                course_id: enrollment.course_id,
                subject_id: subject.id,
                term_id: term.id,
                predicted_score: p.predicted_score,
                classification: p.classification,
                risk_level: p.risk_level,
                confidence: p.confidence,
                recommendations: p.recommendations.into_iter().take(3).collect(),
            });
        }
    }

    at_risk.sort_by(|a, b| {
        b.risk_level
            .cmp(&a.risk_level)
            .then(a.predicted_score.total_cmp(&b.predicted_score))
    });
    at_risk.truncate(limit);
    Ok(at_risk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PredictionFilter;
    use crate::testing;

    fn features(prior: f64, attendance: f64, participation: f64) -> Features {
        Features { prior_average: prior, attendance_pct: attendance, participation_avg: participation, ..Features::default() }
    }

    struct Fixed(f64);

    impl PerformanceModel for Fixed {
        fn predict_score(&self, _: &Features) -> f64 {
            self.0
        }

        fn info(&self) -> ModelInfo {
            ModelInfo {
                name: "Fixed".to_string(),
                source: "test".to_string(),
                features: vec![],
                coefficients: BTreeMap::new(),
                intercept: self.0,
                class_thresholds: BTreeMap::new(),
            }
        }
    }

    #[test]
    fn class_boundaries() {
        assert_eq!(classify(50.99), CLASS_LOW);
        assert_eq!(classify(51.0), CLASS_MEDIUM);
        assert_eq!(classify(70.99), CLASS_MEDIUM);
        assert_eq!(classify(71.0), CLASS_HIGH);
    }

    #[test]
    fn probabilities_sum_to_one_and_favour_the_class() {
        for score in [10.0, 55.0, 95.0] {
            let probs = probabilities(score);
            let sum: f64 = probs.values().sum();
            assert!((sum - 1.0).abs() < 1e-9);
            let best = probs.iter().max_by(|a, b| a.1.total_cmp(b.1)).unwrap().0;
            assert_eq!(best, classify(score));
        }
        let c = confidence(&probabilities(90.0));
        assert!(c > 0.8 && c <= 1.0);
        assert_eq!(c, (c * 10_000.0).round() / 10_000.0);
    }

    #[test]
    fn risk_points() {
        assert_eq!(risk_level(35.0, &features(40.0, 60.0, 50.0)), RiskLevel::Critical);
        assert_eq!(risk_level(55.0, &features(65.0, 90.0, 80.0)), RiskLevel::High);
        assert_eq!(risk_level(65.0, &features(80.0, 90.0, 80.0)), RiskLevel::Medium);
        assert_eq!(risk_level(85.0, &features(90.0, 95.0, 90.0)), RiskLevel::Low);
    }

    #[test]
    fn recommendations_are_capped() {
        let recs = recommendations(30.0, CLASS_LOW, &features(40.0, 60.0, 40.0));
        assert_eq!(recs.len(), MAX_RECOMMENDATIONS);
        assert!(recs[0].starts_with("Immediate attention"));

        let recs = recommendations(90.0, CLASS_HIGH, &features(90.0, 95.0, 90.0));
        assert_eq!(recs.len(), 4);
        assert!(recs.iter().any(|r| r.contains("leadership")));
    }

    #[test]
    fn linear_model_clamps_and_validates() {
        let model = LinearModel::default();
        let good = predict(&model, &features(80.0, 90.0, 85.0)).unwrap();
        assert!((0.0..=100.0).contains(&good.predicted_score));
        assert!(predict(&Fixed(150.0), &features(80.0, 90.0, 85.0)).unwrap().predicted_score <= 100.0);

        let bad = predict(&model, &features(120.0, 90.0, 85.0)).unwrap_err();
        assert!(matches!(bad, CoreError::Validation(_)));
    }

    #[test]
    fn model_file_overrides_coefficients() {
        let path = std::env::temp_dir().join(format!("aula-model-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{"intercept": 10.0, "prior_average": 1.0, "attendance_pct": 0.0, "participation_avg": 0.0}"#)
            .unwrap();
        let model = LinearModel::load(path.to_str()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(model.predict_score(&features(50.0, 0.0, 0.0)), 60.0);
        assert_eq!(model.info().source, path.display().to_string());
        assert!(LinearModel::load(Some("/nonexistent/model.json")).is_err());
    }

    #[test]
    fn gender_detection() {
        assert!(is_male("Masculino"));
        assert!(is_male("m"));
        assert!(!is_male("F"));
        assert!(!is_male("femenino"));
        assert_eq!(age_on(testing::date(2010, 6, 15), testing::date(2025, 6, 14)), 14);
        assert_eq!(age_on(testing::date(2010, 6, 15), testing::date(2025, 6, 15)), 15);
    }

    #[tokio::test]
    async fn predicts_from_stored_evaluations() {
        let school = testing::school().await;
        school.evaluation(school.student_id, school.exam_type_id, 80.0).await;
        school.evaluation(school.student_id, school.homework_type_id, 70.0).await;

        let model = LinearModel::default();
        let first = predict_for_student(&school.pool, &model, school.student_id, school.subject_id, school.term_ids[0])
            .await
            .unwrap();
        // 80 * 0.5 + 70 * 0.3
        assert_eq!(first.prediction.features.prior_average, 61.0);
        assert_eq!(first.prediction.features.attendance_pct, DEFAULT_ATTENDANCE);
        assert_eq!(first.prediction.features.participation_avg, DEFAULT_PARTICIPATION);
        assert_eq!(first.prediction.features.male, Some(false));
        assert_eq!(first.breakdown.len(), 2);

        school.evaluation(school.student_id, school.attendance_type_id, 50.0).await;
        let second = predict_for_student(&school.pool, &model, school.student_id, school.subject_id, school.term_ids[0])
            .await
            .unwrap();
        assert_eq!(second.prediction_id, first.prediction_id);
        assert_eq!(second.prediction.features.attendance_pct, 50.0);

        let stored = predictions::list_predictions(
            &school.pool,
            &PredictionFilter { student_id: Some(school.student_id), ..Default::default() },
            10,
        )
        .await
        .unwrap();
        assert_eq!(stored.len(), 1);
        let grade = grades::find_final_grade(&school.pool, school.student_id, school.subject_id, school.term_ids[0])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(grade.final_score, 61.0);
    }

    #[tokio::test]
    async fn batch_and_risk_listing() {
        let school = testing::school().await;
        school.evaluation(school.student_id, school.exam_type_id, 95.0).await;
        school.evaluation(school.student_id, school.homework_type_id, 100.0).await;
        school.evaluation(school.second_student_id, school.exam_type_id, 20.0).await;

        let batch = predict_course(&school.pool, &Fixed(30.0), school.course_id, school.subject_id, school.term_ids[0])
            .await
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|item| item.result.is_some()));

        let at_risk = students_at_risk(&school.pool, &Fixed(30.0), 60.0, 10, testing::date(2025, 3, 10))
            .await
            .unwrap();
        assert_eq!(at_risk.len(), 2);
        // Луис с худшей предыдущей оценкой идёт первым
        assert_eq!(at_risk[0].student_id, school.second_student_id);
        assert_eq!(at_risk[0].risk_level, RiskLevel::Critical);
        assert_eq!(at_risk[1].risk_level, RiskLevel::High);
        assert!(at_risk[0].recommendations.len() <= 3);

        let none = students_at_risk(&school.pool, &Fixed(95.0), 60.0, 10, testing::date(2025, 3, 10))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn risk_listing_leaves_no_stored_predictions() {
        let school = testing::school().await;
        school.evaluation(school.second_student_id, school.exam_type_id, 20.0).await;

        let at_risk = students_at_risk(&school.pool, &Fixed(30.0), 60.0, 10, testing::date(2025, 3, 10))
            .await
            .unwrap();
        assert!(!at_risk.is_empty());

        let stored = predictions::list_predictions(&school.pool, &PredictionFilter::default(), 10).await.unwrap();
        assert!(stored.is_empty());
        let grade = grades::find_final_grade(&school.pool, school.second_student_id, school.subject_id, school.term_ids[0])
            .await
            .unwrap();
        assert!(grade.is_none());
    }
}
