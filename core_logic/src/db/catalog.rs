use chrono::NaiveDate;
use sqlx::SqlitePool;

use super::now;
use crate::models::{
    Course, CreateCourseRequest, CreateSchoolYearRequest, CreateSubjectRequest, CreateTermRequest,
    EvaluationType, SchoolYear, Subject, Term, UpdateCourseRequest, UpdateSchoolYearRequest,
    UpdateSubjectRequest, UpdateTermRequest,
};

// ---------- Предметы ----------

pub async fn create_subject(pool: &SqlitePool, req: &CreateSubjectRequest) -> Result<Subject, sqlx::Error> {
    sqlx::query_as::<_, Subject>(
        "INSERT INTO subjects (name, description, created_at) VALUES (?, ?, ?) RETURNING *",
    )
    .bind(&req.name)
    .bind(&req.description)
    .bind(now())
    .fetch_one(pool)
    .await
}

pub async fn get_subject(pool: &SqlitePool, id: i64) -> Result<Option<Subject>, sqlx::Error> {
    sqlx::query_as::<_, Subject>("SELECT * FROM subjects WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_subjects(pool: &SqlitePool) -> Result<Vec<Subject>, sqlx::Error> {
    sqlx::query_as::<_, Subject>("SELECT * FROM subjects ORDER BY name")
        .fetch_all(pool)
        .await
}

pub async fn update_subject(
    pool: &SqlitePool,
    id: i64,
    req: &UpdateSubjectRequest,
) -> Result<Option<Subject>, sqlx::Error> {
    sqlx::query_as::<_, Subject>(
        "UPDATE subjects SET name = COALESCE(?, name), description = COALESCE(?, description), updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(&req.name)
    .bind(&req.description)
    .bind(now())
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_subject(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM subjects WHERE id = ?").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

// ---------- Курсы ----------

pub async fn create_course(pool: &SqlitePool, req: &CreateCourseRequest) -> Result<Course, sqlx::Error> {
    sqlx::query_as::<_, Course>(
        "INSERT INTO courses (name, level, section, shift, created_at) VALUES (?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(&req.name)
    .bind(&req.level)
    .bind(&req.section)
    .bind(&req.shift)
    .bind(now())
    .fetch_one(pool)
    .await
}

pub async fn get_course(pool: &SqlitePool, id: i64) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_courses(pool: &SqlitePool) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>("SELECT * FROM courses ORDER BY name")
        .fetch_all(pool)
        .await
}

pub async fn update_course(
    pool: &SqlitePool,
    id: i64,
    req: &UpdateCourseRequest,
) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(
        "UPDATE courses SET name = COALESCE(?, name), level = COALESCE(?, level),
            section = COALESCE(?, section), shift = COALESCE(?, shift), updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(&req.name)
    .bind(&req.level)
    .bind(&req.section)
    .bind(&req.shift)
    .bind(now())
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_course(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM courses WHERE id = ?").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

// ---------- Учебные годы ----------

pub async fn create_school_year(
    pool: &SqlitePool,
    req: &CreateSchoolYearRequest,
) -> Result<SchoolYear, sqlx::Error> {
    sqlx::query_as::<_, SchoolYear>(
        "INSERT INTO school_years (year, description, created_at) VALUES (?, ?, ?) RETURNING *",
    )
    .bind(&req.year)
    .bind(&req.description)
    .bind(now())
    .fetch_one(pool)
    .await
}

pub async fn get_school_year(pool: &SqlitePool, id: i64) -> Result<Option<SchoolYear>, sqlx::Error> {
    sqlx::query_as::<_, SchoolYear>("SELECT * FROM school_years WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_school_year_by_year(pool: &SqlitePool, year: &str) -> Result<Option<SchoolYear>, sqlx::Error> {
    sqlx::query_as::<_, SchoolYear>("SELECT * FROM school_years WHERE year = ?")
        .bind(year)
        .fetch_optional(pool)
        .await
}

/// Последний созданный учебный год.
pub async fn latest_school_year(pool: &SqlitePool) -> Result<Option<SchoolYear>, sqlx::Error> {
    sqlx::query_as::<_, SchoolYear>("SELECT * FROM school_years ORDER BY id DESC LIMIT 1")
        .fetch_optional(pool)
        .await
}

pub async fn list_school_years(pool: &SqlitePool) -> Result<Vec<SchoolYear>, sqlx::Error> {
    sqlx::query_as::<_, SchoolYear>("SELECT * FROM school_years ORDER BY year DESC")
        .fetch_all(pool)
        .await
}

pub async fn update_school_year(
    pool: &SqlitePool,
    id: i64,
    req: &UpdateSchoolYearRequest,
) -> Result<Option<SchoolYear>, sqlx::Error> {
    sqlx::query_as::<_, SchoolYear>(
        "UPDATE school_years SET year = COALESCE(?, year), description = COALESCE(?, description), updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(&req.year)
    .bind(&req.description)
    .bind(now())
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_school_year(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM school_years WHERE id = ?").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// Учебный год, которому принадлежит период, содержащий дату.
pub async fn current_school_year(pool: &SqlitePool, today: NaiveDate) -> Result<Option<SchoolYear>, sqlx::Error> {
    sqlx::query_as::<_, SchoolYear>(
        "SELECT sy.* FROM school_years sy
         JOIN terms t ON t.school_year_id = sy.id
         WHERE t.start_date <= ? AND t.end_date >= ?
         ORDER BY t.start_date DESC LIMIT 1",
    )
    .bind(today)
    .bind(today)
    .fetch_optional(pool)
    .await
}

// ---------- Периоды ----------

pub async fn create_term(pool: &SqlitePool, req: &CreateTermRequest) -> Result<Term, sqlx::Error> {
    sqlx::query_as::<_, Term>(
        "INSERT INTO terms (name, start_date, end_date, school_year_id, created_at)
         VALUES (?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(&req.name)
    .bind(req.start_date)
    .bind(req.end_date)
    .bind(req.school_year_id)
    .bind(now())
    .fetch_one(pool)
    .await
}

pub async fn get_term(pool: &SqlitePool, id: i64) -> Result<Option<Term>, sqlx::Error> {
    sqlx::query_as::<_, Term>("SELECT * FROM terms WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Фильтр по учебному году и поиск по фрагменту названия.
pub async fn list_terms(
    pool: &SqlitePool,
    school_year_id: Option<i64>,
    name_fragment: Option<&str>,
) -> Result<Vec<Term>, sqlx::Error> {
    let pattern = name_fragment.map(|f| format!("%{}%", f.to_lowercase()));
    sqlx::query_as::<_, Term>(
        "SELECT * FROM terms
         WHERE (? IS NULL OR school_year_id = ?) AND (? IS NULL OR LOWER(name) LIKE ?)
         ORDER BY start_date",
    )
    .bind(school_year_id)
    .bind(school_year_id)
    .bind(&pattern)
    .bind(&pattern)
    .fetch_all(pool)
    .await
}

pub async fn update_term(pool: &SqlitePool, id: i64, req: &UpdateTermRequest) -> Result<Option<Term>, sqlx::Error> {
    sqlx::query_as::<_, Term>(
        "UPDATE terms SET name = COALESCE(?, name), start_date = COALESCE(?, start_date),
            end_date = COALESCE(?, end_date), school_year_id = COALESCE(?, school_year_id), updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(&req.name)
    .bind(req.start_date)
    .bind(req.end_date)
    .bind(req.school_year_id)
    .bind(now())
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_term(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM terms WHERE id = ?").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// Период, содержащий дату.
pub async fn term_for_date(pool: &SqlitePool, date: NaiveDate) -> Result<Option<Term>, sqlx::Error> {
    sqlx::query_as::<_, Term>(
        "SELECT * FROM terms WHERE start_date <= ? AND end_date >= ? ORDER BY start_date DESC LIMIT 1",
    )
    .bind(date)
    .bind(date)
    .fetch_optional(pool)
    .await
}

// ---------- Типы оценок ----------

pub async fn create_evaluation_type(pool: &SqlitePool, name: &str) -> Result<EvaluationType, sqlx::Error> {
    sqlx::query_as::<_, EvaluationType>(
        "INSERT INTO evaluation_types (name, created_at) VALUES (?, ?) RETURNING *",
    )
    .bind(name)
    .bind(now())
    .fetch_one(pool)
    .await
}

pub async fn get_evaluation_type(pool: &SqlitePool, id: i64) -> Result<Option<EvaluationType>, sqlx::Error> {
    sqlx::query_as::<_, EvaluationType>("SELECT * FROM evaluation_types WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Поиск без учёта регистра.
pub async fn find_evaluation_type_by_name(
    pool: &SqlitePool,
    name: &str,
) -> Result<Option<EvaluationType>, sqlx::Error> {
    sqlx::query_as::<_, EvaluationType>("SELECT * FROM evaluation_types WHERE LOWER(name) = LOWER(?)")
        .bind(name)
        .fetch_optional(pool)
        .await
}

pub async fn list_evaluation_types(pool: &SqlitePool) -> Result<Vec<EvaluationType>, sqlx::Error> {
    sqlx::query_as::<_, EvaluationType>("SELECT * FROM evaluation_types ORDER BY name")
        .fetch_all(pool)
        .await
}

pub async fn update_evaluation_type(
    pool: &SqlitePool,
    id: i64,
    name: &str,
) -> Result<Option<EvaluationType>, sqlx::Error> {
    sqlx::query_as::<_, EvaluationType>(
        "UPDATE evaluation_types SET name = ?, updated_at = ? WHERE id = ? RETURNING *",
    )
    .bind(name)
    .bind(now())
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_evaluation_type(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM evaluation_types WHERE id = ?").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn term_lookup_by_date() {
        let pool = memory_pool().await.unwrap();
        let year = create_school_year(
            &pool,
            &CreateSchoolYearRequest { year: "2025".to_string(), description: "Gestion 2025".to_string() },
        )
        .await
        .unwrap();
        for (name, start, end) in [
            ("First Term", date(2025, 2, 1), date(2025, 4, 30)),
            ("Second Term", date(2025, 5, 1), date(2025, 8, 10)),
        ] {
            create_term(
                &pool,
                &CreateTermRequest { name: name.to_string(), start_date: start, end_date: end, school_year_id: year.id },
            )
            .await
            .unwrap();
        }

        let term = term_for_date(&pool, date(2025, 4, 30)).await.unwrap().unwrap();
        assert_eq!(term.name, "First Term");
        assert!(term_for_date(&pool, date(2025, 8, 15)).await.unwrap().is_none());
        assert_eq!(current_school_year(&pool, date(2025, 6, 1)).await.unwrap().unwrap().id, year.id);

        let found = list_terms(&pool, Some(year.id), Some("second")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Second Term");
    }

    #[tokio::test]
    async fn evaluation_type_lookup_ignores_case() {
        let pool = memory_pool().await.unwrap();
        create_evaluation_type(&pool, "Exam").await.unwrap();
        assert!(find_evaluation_type_by_name(&pool, "exam").await.unwrap().is_some());
        assert!(find_evaluation_type_by_name(&pool, "quiz").await.unwrap().is_none());
    }
}
