use std::collections::BTreeMap;

use anyhow::Context;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth;
use crate::lifecycle::StatusUpdate;
use crate::models::{AnalyticsData, Category, Grievance, NewGrievance, Priority, Role, User};
use crate::sentiment::{self, PolarityScorer, Triage};

const GRIEVANCE_COLUMNS: &str = "g.id, g.user_id, u.username AS submitter_name, g.title, g.category, \
     g.description, g.sentiment, g.priority, g.compound_score, g.impact_score, g.status, \
     g.response, g.rating, g.created_at, g.updated_at";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool, scorer: &dyn PolarityScorer) -> anyhow::Result<usize> {
    let users = [
        ("admin", "admin@campus.example.edu", Role::Admin),
        ("dana.staff", "dana.staff@campus.example.edu", Role::Staff),
        ("riley.student", "riley.student@campus.example.edu", Role::Student),
    ];

    for (username, email, role) in users {
        sqlx::query(
            r#"
            INSERT INTO grievance_triage.users (id, username, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (username) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(email)
        .bind(auth::hash_password("password123"))
        .bind(role.as_str())
        .execute(pool)
        .await?;
    }

    let student_id = find_user_id(pool, "riley.student")
        .await?
        .context("seed student account is missing")?;

    let grievances = [
        (
            "seed-001",
            Some(student_id),
            "Hostel water supply",
            Category::Hostel,
            "There has been no hot water in Block C for a week. This is absolutely terrible and nobody responds.",
        ),
        (
            "seed-002",
            Some(student_id),
            "Exam timetable clash",
            Category::Academic,
            "Two of my exams are scheduled at the same time on Friday.",
        ),
        (
            "seed-003",
            None,
            "Library wifi",
            Category::Infrastructure,
            "The new wifi in the library is great, thanks for the upgrade.",
        ),
    ];

    let mut inserted = 0usize;
    for (source_key, submitter_id, title, category, description) in grievances {
        let new = NewGrievance {
            submitter_id,
            title: title.to_string(),
            category,
            description: description.to_string(),
        };
        let triage = sentiment::analyze(scorer, &new.description);
        if insert_grievance(pool, &new, &triage, Some(source_key)).await?.is_some() {
            inserted += 1;
        }
    }

    Ok(inserted)
}

/// Returns `false` when the username or email is already taken.
pub async fn create_user(
    pool: &PgPool,
    username: &str,
    email: &str,
    password: &str,
    role: Role,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO grievance_triage.users (id, username, email, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(email)
    .bind(auth::hash_password(password))
    .bind(role.as_str())
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(true),
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Ok(false),
        Err(err) => Err(err).context("failed to create user"),
    }
}

pub async fn authenticate_user(pool: &PgPool, username: &str, password: &str) -> anyhow::Result<Option<User>> {
    let row = sqlx::query(
        "SELECT id, username, password_hash, role FROM grievance_triage.users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let password_hash: String = row.try_get("password_hash")?;
    if !auth::verify_password(password, &password_hash) {
        return Ok(None);
    }

    let role: String = row.try_get("role")?;
    Ok(Some(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        role: role.parse()?,
    }))
}

pub async fn find_user_id(pool: &PgPool, username: &str) -> anyhow::Result<Option<Uuid>> {
    let row = sqlx::query("SELECT id FROM grievance_triage.users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    Ok(match row {
        Some(row) => Some(row.try_get("id")?),
        None => None,
    })
}

pub async fn submit_grievance(pool: &PgPool, grievance: &NewGrievance, triage: &Triage) -> anyhow::Result<Uuid> {
    insert_grievance(pool, grievance, triage, None)
        .await?
        .context("grievance insert returned no id")
}

/// Inserts a scored grievance. Rows whose `source_key` already exists are
/// skipped and yield `None`.
async fn insert_grievance(
    pool: &PgPool,
    grievance: &NewGrievance,
    triage: &Triage,
    source_key: Option<&str>,
) -> anyhow::Result<Option<Uuid>> {
    let row = sqlx::query(
        r#"
        INSERT INTO grievance_triage.grievances
        (id, user_id, title, category, description, sentiment, priority,
         compound_score, impact_score, status, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'Pending', $10)
        ON CONFLICT (source_key) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(grievance.submitter_id)
    .bind(&grievance.title)
    .bind(grievance.category.as_str())
    .bind(&grievance.description)
    .bind(triage.sentiment.as_str())
    .bind(triage.priority.level())
    .bind(triage.compound_score)
    .bind(triage.impact_score)
    .bind(source_key)
    .fetch_optional(pool)
    .await?;

    Ok(match row {
        Some(row) => Some(row.try_get("id")?),
        None => None,
    })
}

/// Newest first. `submitter_id = None` returns every grievance.
pub async fn fetch_grievances(
    pool: &PgPool,
    submitter_id: Option<Uuid>,
    limit: Option<i64>,
) -> anyhow::Result<Vec<Grievance>> {
    let mut query = format!(
        "SELECT {GRIEVANCE_COLUMNS} \
         FROM grievance_triage.grievances g \
         LEFT JOIN grievance_triage.users u ON u.id = g.user_id"
    );

    if submitter_id.is_some() {
        query.push_str(" WHERE g.user_id = $1");
    }
    query.push_str(" ORDER BY g.created_at DESC");
    if let Some(limit) = limit {
        query.push_str(&format!(" LIMIT {}", limit.max(0)));
    }

    let mut rows = sqlx::query(&query);
    if let Some(value) = submitter_id {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    records.iter().map(grievance_from_row).collect()
}

pub async fn fetch_grievance(pool: &PgPool, id: Uuid) -> anyhow::Result<Option<Grievance>> {
    let query = format!(
        "SELECT {GRIEVANCE_COLUMNS} \
         FROM grievance_triage.grievances g \
         LEFT JOIN grievance_triage.users u ON u.id = g.user_id \
         WHERE g.id = $1"
    );

    let row = sqlx::query(&query).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(grievance_from_row).transpose()
}

/// Last write wins; there is no version check between concurrent editors.
pub async fn update_grievance_status(pool: &PgPool, id: Uuid, update: &StatusUpdate) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE grievance_triage.grievances
        SET status = $2, response = $3, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(update.status.as_str())
    .bind(update.response.as_deref())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_rating(pool: &PgPool, id: Uuid, rating: i32) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE grievance_triage.grievances
        SET rating = $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(rating)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch_analytics(pool: &PgPool) -> anyhow::Result<AnalyticsData> {
    let totals = sqlx::query(
        "SELECT COUNT(*) AS total, AVG(rating)::float8 AS avg_rating FROM grievance_triage.grievances",
    )
    .fetch_one(pool)
    .await?;

    Ok(AnalyticsData {
        total_count: totals.try_get("total")?,
        avg_rating: totals.try_get("avg_rating")?,
        status_counts: count_by(pool, "status").await?,
        sentiment_counts: count_by(pool, "sentiment").await?,
    })
}

async fn count_by(pool: &PgPool, column: &str) -> anyhow::Result<BTreeMap<String, i64>> {
    let query = format!(
        "SELECT {column} AS bucket, COUNT(*) AS count FROM grievance_triage.grievances GROUP BY {column}"
    );

    let mut counts = BTreeMap::new();
    for row in sqlx::query(&query).fetch_all(pool).await? {
        counts.insert(row.try_get("bucket")?, row.try_get("count")?);
    }
    Ok(counts)
}

fn grievance_from_row(row: &PgRow) -> anyhow::Result<Grievance> {
    let category: String = row.try_get("category")?;
    let sentiment: String = row.try_get("sentiment")?;
    let status: String = row.try_get("status")?;

    Ok(Grievance {
        id: row.try_get("id")?,
        submitter_id: row.try_get("user_id")?,
        submitter_name: row.try_get("submitter_name")?,
        title: row.try_get("title")?,
        category: category.parse()?,
        description: row.try_get("description")?,
        sentiment: sentiment.parse()?,
        priority: Priority::from_level(row.try_get("priority")?)?,
        compound_score: row.try_get("compound_score")?,
        impact_score: row.try_get("impact_score")?,
        status: status.parse()?,
        response: row.try_get("response")?,
        rating: row.try_get("rating")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct CsvGrievance {
    pub title: String,
    pub category: String,
    pub description: String,
    pub submitter_username: Option<String>,
    pub source_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub skipped: usize,
}

pub fn read_csv_rows<R: std::io::Read>(reader: R) -> anyhow::Result<Vec<CsvGrievance>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for (index, result) in reader.deserialize::<CsvGrievance>().enumerate() {
        rows.push(result.with_context(|| format!("invalid CSV record {}", index + 1))?);
    }
    Ok(rows)
}

pub async fn import_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
    scorer: &dyn PolarityScorer,
) -> anyhow::Result<ImportSummary> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut summary = ImportSummary::default();

    for (index, row) in read_csv_rows(file)?.into_iter().enumerate() {
        let submitter_id = match row.submitter_username.as_deref().filter(|name| !name.is_empty()) {
            Some(username) => {
                let id = find_user_id(pool, username).await?;
                if id.is_none() {
                    warn!(record = index + 1, username, "unknown submitter, importing anonymously");
                }
                id
            }
            None => None,
        };

        let category = match row.category.parse::<Category>() {
            Ok(category) => category,
            Err(err) => {
                warn!(record = index + 1, error = %err, "skipping grievance");
                summary.skipped += 1;
                continue;
            }
        };

        let new = NewGrievance {
            submitter_id,
            title: row.title,
            category,
            description: row.description,
        };
        if let Err(err) = new.validate() {
            warn!(record = index + 1, error = %err, "skipping grievance");
            summary.skipped += 1;
            continue;
        }

        let source_key = row
            .source_key
            .filter(|key| !key.is_empty())
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let triage = sentiment::analyze(scorer, &new.description);
        match insert_grievance(pool, &new, &triage, Some(&source_key)).await? {
            Some(id) => {
                info!(%id, source_key = %source_key, "imported grievance");
                summary.inserted += 1;
            }
            None => summary.skipped += 1,
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_rows_allow_missing_optional_columns() {
        let data = "title,category,description,submitter_username,source_key\n\
                    Broken projector,Infrastructure,Room 204 projector flickers,,\n\
                    Mess food,Hostel,Dinner was cold again,riley.student,csv-7\n";

        let rows = read_csv_rows(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title, "Broken projector");
        assert!(rows[0].submitter_username.as_deref().unwrap_or("").is_empty());
        assert_eq!(rows[1].submitter_username.as_deref(), Some("riley.student"));
        assert_eq!(rows[1].source_key.as_deref(), Some("csv-7"));
    }

    #[test]
    fn csv_with_missing_columns_is_rejected() {
        let data = "title,category\nOnly a title,Other\n";
        assert!(read_csv_rows(data.as_bytes()).is_err());
    }
}
