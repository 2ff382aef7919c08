//! Stored-credential lookup for request attribution and Basic auth.
//!
//! This service does not derive or verify credential material beyond a
//! byte-wise comparison; whatever form the credential arrives in at
//! registration is the form stored and matched.

use crate::models::user::User;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UserRepositoryError {
    #[error("login `{0}` is already registered")]
    DuplicateLogin(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct SqliteUserRepository {
    db: Arc<SqlitePool>,
}

impl SqliteUserRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Register a new account under a unique login.
    pub async fn register(
        &self,
        login: &str,
        password: &str,
    ) -> Result<User, UserRepositoryError> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (login, password, created_at) VALUES (?, ?, ?)
             RETURNING id, login, password, created_at",
        )
        .bind(login)
        .bind(password)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                UserRepositoryError::DuplicateLogin(login.to_string())
            } else {
                UserRepositoryError::Sqlx(err)
            }
        })
    }

    pub async fn find_by_login(&self, login: &str) -> Result<Option<User>, UserRepositoryError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, login, password, created_at FROM users WHERE login = ?",
        )
        .bind(login)
        .fetch_optional(&*self.db)
        .await?;
        Ok(user)
    }

    /// Remove an account by id. Returns rows removed.
    pub async fn delete_by_id(&self, id: i64) -> Result<u64, UserRepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn repository() -> SqliteUserRepository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        sqlx::query(
            "CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                login TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .expect("schema");
        SqliteUserRepository::new(Arc::new(pool))
    }

    #[tokio::test]
    async fn register_and_find_by_login() {
        let repo = repository().await;
        let user = repo.register("dzmitry", "opaque-credential").await.unwrap();
        let found = repo.find_by_login("dzmitry").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.password, "opaque-credential");
        assert!(repo.find_by_login("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_login_is_rejected() {
        let repo = repository().await;
        repo.register("dzmitry", "a").await.unwrap();
        assert!(matches!(
            repo.register("dzmitry", "b").await,
            Err(UserRepositoryError::DuplicateLogin(_))
        ));
    }

    #[tokio::test]
    async fn delete_by_id() {
        let repo = repository().await;
        let user = repo.register("dzmitry", "a").await.unwrap();
        assert_eq!(repo.delete_by_id(user.id).await.unwrap(), 1);
        assert_eq!(repo.delete_by_id(user.id).await.unwrap(), 0);
    }
}
