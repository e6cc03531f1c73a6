//! Repository for the `users` table.

use safehome_core::types::DbId;
use sqlx::PgPool;

use crate::models::user::User;

/// Column list for `users` queries.
const COLUMNS: &str = "id, first_name, last_name, email, phone, created_at, updated_at";

/// Provides account lookups used for display names.
pub struct UserRepo;

impl UserRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// "First Last" for an account, if it exists.
    pub async fn display_name(pool: &PgPool, id: DbId) -> Result<Option<String>, sqlx::Error> {
        Ok(Self::find_by_id(pool, id).await?.map(|u| u.display_name()))
    }
}
