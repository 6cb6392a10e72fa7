use compintel_core::Subject;
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
struct SubjectRow {
    id: String,
    title: String,
    category: Option<String>,
    brand: Option<String>,
}

impl From<SubjectRow> for Subject {
    fn from(row: SubjectRow) -> Self {
        Subject {
            id: row.id,
            title: row.title,
            category: row.category,
            brand: row.brand,
        }
    }
}

/// Fetches one subject by its catalog id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_subject(pool: &PgPool, subject_id: &str) -> Result<Option<Subject>, DbError> {
    let row = sqlx::query_as::<_, SubjectRow>(
        "SELECT id, title, category, brand FROM subjects WHERE id = $1",
    )
    .bind(subject_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Subject::from))
}

/// Upserts every subject in one transaction.
///
/// Existing rows keep their `created_at`; all other columns are overwritten.
/// Returns the number of subjects written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails. Nothing is written in
/// that case.
pub async fn upsert_subjects(pool: &PgPool, subjects: &[Subject]) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;

    for subject in subjects {
        sqlx::query(
            "INSERT INTO subjects (id, title, category, brand) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET \
                 title = EXCLUDED.title, \
                 category = EXCLUDED.category, \
                 brand = EXCLUDED.brand, \
                 updated_at = NOW()",
        )
        .bind(&subject.id)
        .bind(&subject.title)
        .bind(subject.category.as_deref())
        .bind(subject.brand.as_deref())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(subjects.len())
}
