use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::db::SqlitePool;
use crate::db::models::DriveConnection;
use crate::error::SlateError;

/// Persists the single OAuth credential set. One row, fixed id, never more.
#[derive(Clone)]
pub struct ConnectionStore {
    pool: SqlitePool,
}

impl ConnectionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self) -> Result<Option<DriveConnection>, SlateError> {
        let row = sqlx::query(
            r#"SELECT access_token, refresh_token, expires_at, account_email, root_folder_id
               FROM drive_connection WHERE id = 1"#,
        )
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_model).transpose()
    }

    /// Replace the stored connection after a code exchange. The root folder
    /// reference is reset: connecting never implies a folder structure
    /// exists yet.
    pub async fn connect(
        &self,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
        account_email: Option<&str>,
    ) -> Result<(), SlateError> {
        if access_token.is_empty() || refresh_token.is_empty() {
            return Err(SlateError::Validation(
                "refusing to store a half-authenticated connection".to_string(),
            ));
        }
        sqlx::query(
            r#"
            INSERT INTO drive_connection (id, access_token, refresh_token, expires_at, account_email, root_folder_id)
            VALUES (1, ?, ?, ?, ?, NULL)
            ON CONFLICT(id) DO UPDATE SET
                access_token=excluded.access_token,
                refresh_token=excluded.refresh_token,
                expires_at=excluded.expires_at,
                account_email=excluded.account_email,
                root_folder_id=NULL
            "#,
        )
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at.to_rfc3339())
        .bind(account_email)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Overwrite the token pair after a refresh. Last writer wins; a lost
    /// update costs one extra refresh later, nothing more.
    pub async fn update_tokens(
        &self,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), SlateError> {
        if access_token.is_empty() || refresh_token.is_empty() {
            return Err(SlateError::Validation(
                "refusing to store a half-authenticated connection".to_string(),
            ));
        }
        sqlx::query(
            r#"UPDATE drive_connection
               SET access_token = ?, refresh_token = ?, expires_at = ?
               WHERE id = 1"#,
        )
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_root(&self, root_folder_id: Option<&str>) -> Result<(), SlateError> {
        if matches!(root_folder_id, Some(id) if id.is_empty()) {
            return Err(SlateError::Validation(
                "root folder id must not be empty".to_string(),
            ));
        }
        let result = sqlx::query("UPDATE drive_connection SET root_folder_id = ? WHERE id = 1")
            .bind(root_folder_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(SlateError::NotConnected);
        }
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), SlateError> {
        sqlx::query("DELETE FROM drive_connection WHERE id = 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn row_to_model(row: SqliteRow) -> Result<DriveConnection, SlateError> {
        let access_token: String = row.try_get("access_token")?;
        let refresh_token: String = row.try_get("refresh_token")?;
        let expires_str: String = row.try_get("expires_at")?;
        let account_email: Option<String> = row.try_get("account_email")?;
        let root_folder_id: Option<String> = row.try_get("root_folder_id")?;

        let expires_at: DateTime<Utc> = chrono::DateTime::parse_from_rfc3339(&expires_str)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
            .with_timezone(&Utc);

        Ok(DriveConnection {
            access_token,
            refresh_token,
            expires_at,
            account_email,
            root_folder_id,
        })
    }
}
