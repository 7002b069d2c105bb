use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::db::SqlitePool;
use crate::db::models::ProjectRecord;
use crate::error::SlateError;

/// Read/write access to the slice of project data the sync engine owns.
/// Project CRUD itself lives elsewhere; this store only carries what the
/// synchronization and share surfaces need.
#[derive(Clone)]
pub struct ProjectStore {
    pool: SqlitePool,
}

impl ProjectStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: &str) -> Result<Option<ProjectRecord>, SlateError> {
        let row = sqlx::query(
            r#"SELECT id, job_id, name, client, budget, drive_root_folder_id
               FROM projects WHERE id = ?"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_model).transpose()
    }

    /// Upsert by project id. Used by the owning application when project
    /// data changes; the sync engine only reads.
    pub async fn upsert(&self, project: &ProjectRecord) -> Result<(), SlateError> {
        sqlx::query(
            r#"
            INSERT INTO projects (id, job_id, name, client, budget, drive_root_folder_id)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                job_id=excluded.job_id,
                name=excluded.name,
                client=excluded.client,
                budget=excluded.budget,
                drive_root_folder_id=excluded.drive_root_folder_id
            "#,
        )
        .bind(&project.id)
        .bind(&project.job_id)
        .bind(&project.name)
        .bind(&project.client)
        .bind(&project.budget)
        .bind(&project.drive_root_folder_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_drive_root(&self, id: &str, root_folder_id: &str) -> Result<(), SlateError> {
        let result = sqlx::query("UPDATE projects SET drive_root_folder_id = ? WHERE id = ?")
            .bind(root_folder_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(SlateError::NotFound("project"));
        }
        Ok(())
    }

    /// Clear the mapping ahead of a forced re-synchronization.
    pub async fn clear_drive_root(&self, id: &str) -> Result<(), SlateError> {
        let result = sqlx::query("UPDATE projects SET drive_root_folder_id = NULL WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(SlateError::NotFound("project"));
        }
        Ok(())
    }

    fn row_to_model(row: SqliteRow) -> Result<ProjectRecord, SlateError> {
        Ok(ProjectRecord {
            id: row.try_get("id")?,
            job_id: row.try_get("job_id")?,
            name: row.try_get("name")?,
            client: row.try_get("client")?,
            budget: row.try_get("budget")?,
            drive_root_folder_id: row.try_get("drive_root_folder_id")?,
        })
    }
}
