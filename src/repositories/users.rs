use sqlx::PgPool;

use crate::db::models::User;

const COLUMNS: &str = "id, username, full_name, is_active, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

#[cfg(test)]
pub(crate) struct CreateUser<'a> {
    pub(crate) id: &'a str,
    pub(crate) username: &'a str,
    pub(crate) full_name: &'a str,
    pub(crate) is_active: bool,
    pub(crate) now: time::PrimitiveDateTime,
}

/// Accounts are provisioned by the identity service; only tests insert them directly.
#[cfg(test)]
pub(crate) async fn create(pool: &PgPool, params: CreateUser<'_>) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (id, username, full_name, is_active, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$5,$6)
         RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.username)
    .bind(params.full_name)
    .bind(params.is_active)
    .bind(params.now)
    .bind(params.now)
    .fetch_one(pool)
    .await
}
