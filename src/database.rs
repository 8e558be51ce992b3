use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::ledger::{self, LedgerError};
use crate::log_db_operation;
use crate::models::*;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

/// Result of a transactional ledger mutation: the row may be missing, or the
/// addressed entry inside it may be missing.
#[derive(Debug)]
pub enum LedgerOutcome {
    Updated(StudyItem),
    MissingItem,
    MissingEntry(LedgerError),
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        // An in-memory SQLite database exists per connection; cap the pool at
        // one connection so every query sees the same database.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect(database_url)
                .await?
        } else {
            SqlitePool::connect(database_url).await?
        };
        let db = Database { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS estudos (
                id TEXT PRIMARY KEY,
                curso TEXT NOT NULL,
                unidade TEXT NOT NULL DEFAULT '',
                conteudo TEXT NOT NULL,
                data_inicio TEXT,
                data_termino TEXT,
                status TEXT NOT NULL DEFAULT 'PENDENTE',
                observacoes TEXT NOT NULL DEFAULT '[]',
                revisoes TEXT NOT NULL DEFAULT '[]',
                questoes TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        log_db_operation!(info, "migration", "estudos table ready");
        Ok(())
    }

    pub async fn insert_study(&self, item: &StudyItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO estudos (id, curso, unidade, conteudo, data_inicio, data_termino,
                                 status, observacoes, revisoes, questoes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(item.id.to_string())
        .bind(&item.curso)
        .bind(&item.unidade)
        .bind(&item.conteudo)
        .bind(item.data_inicio.map(|d| d.to_string()))
        .bind(item.data_termino.map(|d| d.to_string()))
        .bind(status_to_column(item.status))
        .bind(ledger::serialize_embedded(&item.observacoes)?)
        .bind(ledger::serialize_embedded(&item.revisoes)?)
        .bind(ledger::serialize_embedded(&item.questoes)?)
        .bind(item.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        log_db_operation!(debug, "insert_study", estudo_id = item.id);
        Ok(())
    }

    pub async fn get_study(&self, id: Uuid) -> Result<Option<StudyItem>> {
        let row = sqlx::query("SELECT * FROM estudos WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_study).transpose()
    }

    pub async fn get_all_studies(&self) -> Result<Vec<StudyItem>> {
        let rows = sqlx::query("SELECT * FROM estudos ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .iter()
            .map(row_to_study)
            .collect::<Result<Vec<StudyItem>>>()?;
        log_db_operation!(debug, "get_all_studies", count = items.len());
        Ok(items)
    }

    /// Full-row update of the editable fields. Returns false when no row
    /// matched the id.
    pub async fn update_study(&self, item: &StudyItem) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE estudos
            SET curso = ?1, unidade = ?2, conteudo = ?3, data_inicio = ?4,
                data_termino = ?5, status = ?6, observacoes = ?7,
                revisoes = ?8, questoes = ?9
            WHERE id = ?10
            "#,
        )
        .bind(&item.curso)
        .bind(&item.unidade)
        .bind(&item.conteudo)
        .bind(item.data_inicio.map(|d| d.to_string()))
        .bind(item.data_termino.map(|d| d.to_string()))
        .bind(status_to_column(item.status))
        .bind(ledger::serialize_embedded(&item.observacoes)?)
        .bind(ledger::serialize_embedded(&item.revisoes)?)
        .bind(ledger::serialize_embedded(&item.questoes)?)
        .bind(item.id.to_string())
        .execute(&self.pool)
        .await?;

        log_db_operation!(debug, "update_study", estudo_id = item.id);
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_study(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM estudos WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        log_db_operation!(debug, "delete_study", estudo_id = id);
        Ok(result.rows_affected() > 0)
    }

    /// Apply a ledger mutation to the review list of one row inside a
    /// transaction: the read-modify-write of the whole serialized array is
    /// atomic server-side, so two concurrent appends cannot drop each other.
    pub async fn mutate_reviews<F>(&self, id: Uuid, apply: F) -> Result<LedgerOutcome>
    where
        F: FnOnce(&mut Vec<Review>) -> Result<(), LedgerError>,
    {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM estudos WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(LedgerOutcome::MissingItem);
        };
        let mut item = row_to_study(&row)?;

        if let Err(e) = apply(&mut item.revisoes) {
            return Ok(LedgerOutcome::MissingEntry(e));
        }

        sqlx::query("UPDATE estudos SET revisoes = ?1 WHERE id = ?2")
            .bind(ledger::serialize_embedded(&item.revisoes)?)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        log_db_operation!(debug, "mutate_reviews", estudo_id = id);
        Ok(LedgerOutcome::Updated(item))
    }

    /// Same contract as `mutate_reviews`, over the question list.
    pub async fn mutate_questions<F>(&self, id: Uuid, apply: F) -> Result<LedgerOutcome>
    where
        F: FnOnce(&mut Vec<Question>) -> Result<(), LedgerError>,
    {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM estudos WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(LedgerOutcome::MissingItem);
        };
        let mut item = row_to_study(&row)?;

        if let Err(e) = apply(&mut item.questoes) {
            return Ok(LedgerOutcome::MissingEntry(e));
        }

        sqlx::query("UPDATE estudos SET questoes = ?1 WHERE id = ?2")
            .bind(ledger::serialize_embedded(&item.questoes)?)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        log_db_operation!(debug, "mutate_questions", estudo_id = id);
        Ok(LedgerOutcome::Updated(item))
    }

    /// Store reachability probe for `/health`.
    pub async fn ping(&self) -> bool {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => true,
            Err(e) => {
                log_db_operation!(error, "ping", error = e);
                false
            }
        }
    }
}

fn status_to_column(status: StoredStatus) -> &'static str {
    match status {
        StoredStatus::Pendente => "PENDENTE",
        StoredStatus::Concluido => "CONCLUIDO",
    }
}

fn row_to_study(row: &SqliteRow) -> Result<StudyItem> {
    // Legacy rows may carry a stored "ATRASO"; it normalizes to PENDENTE and
    // is re-derived at read time.
    let status = match row.get::<String, _>("status").as_str() {
        "CONCLUIDO" => StoredStatus::Concluido,
        _ => StoredStatus::Pendente,
    };

    Ok(StudyItem {
        id: Uuid::parse_str(&row.get::<String, _>("id"))?,
        curso: row.get("curso"),
        unidade: row.get("unidade"),
        conteudo: row.get("conteudo"),
        data_inicio: parse_date_column(row.get::<Option<String>, _>("data_inicio")),
        data_termino: parse_date_column(row.get::<Option<String>, _>("data_termino")),
        status,
        observacoes: ledger::parse_embedded(&row.get::<String, _>("observacoes")),
        revisoes: ledger::parse_embedded(&row.get::<String, _>("revisoes")),
        questoes: ledger::parse_embedded(&row.get::<String, _>("questoes")),
        created_at: DateTime::parse_from_rfc3339(&row.get::<String, _>("created_at"))?
            .with_timezone(&Utc),
    })
}

fn parse_date_column(raw: Option<String>) -> Option<NaiveDate> {
    raw.filter(|s| !s.is_empty())
        .and_then(|s| s[..10.min(s.len())].parse().ok())
}
