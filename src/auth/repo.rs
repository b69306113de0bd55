use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{ConfirmedUser, PendingUser};

/// Persistence for pending registrations and confirmed accounts.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<ConfirmedUser>>;
    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<ConfirmedUser>>;

    /// Insert a pending registration. An existing pending row with the same
    /// email is replaced.
    async fn create_pending(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<PendingUser>;
    async fn find_pending_by_email(&self, email: &str) -> anyhow::Result<Option<PendingUser>>;
    async fn find_pending_by_id(&self, id: Uuid) -> anyhow::Result<Option<PendingUser>>;
    /// Returns false if the pending row no longer exists.
    async fn set_pending_otp(
        &self,
        id: Uuid,
        otp: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<bool>;
    /// Delete the pending row only while it still carries the expiry that was
    /// read. A code re-issued in between keeps the row alive.
    async fn delete_expired_pending(
        &self,
        id: Uuid,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<bool>;

    /// Atomically remove the pending row (only while it still holds `otp`) and
    /// insert the confirmed account. `None` means nothing was written.
    async fn promote_pending(&self, id: Uuid, otp: &str) -> anyhow::Result<Option<ConfirmedUser>>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<ConfirmedUser>> {
        let user = sqlx::query_as::<_, ConfirmedUser>(
            r#"
            SELECT id, name, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("select user by email")?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<ConfirmedUser>> {
        let user = sqlx::query_as::<_, ConfirmedUser>(
            r#"SELECT id, name, email, password_hash, created_at FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("select user by id")?;
        Ok(user)
    }

    async fn create_pending(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<PendingUser> {
        // Single statement, so concurrent registrations for one email cannot
        // both miss the existing row and collide on the unique index.
        let pending = sqlx::query_as::<_, PendingUser>(
            r#"
            INSERT INTO pending_users (name, email, password_hash)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE
            SET id = gen_random_uuid(),
                name = EXCLUDED.name,
                password_hash = EXCLUDED.password_hash,
                otp = NULL,
                otp_expires_at = NULL,
                created_at = now()
            RETURNING id, name, email, password_hash, otp, otp_expires_at, created_at
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await
        .context("upsert pending registration")?;
        Ok(pending)
    }

    async fn find_pending_by_email(&self, email: &str) -> anyhow::Result<Option<PendingUser>> {
        let pending = sqlx::query_as::<_, PendingUser>(
            r#"
            SELECT id, name, email, password_hash, otp, otp_expires_at, created_at
            FROM pending_users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("select pending by email")?;
        Ok(pending)
    }

    async fn find_pending_by_id(&self, id: Uuid) -> anyhow::Result<Option<PendingUser>> {
        let pending = sqlx::query_as::<_, PendingUser>(
            r#"
            SELECT id, name, email, password_hash, otp, otp_expires_at, created_at
            FROM pending_users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("select pending by id")?;
        Ok(pending)
    }

    async fn set_pending_otp(
        &self,
        id: Uuid,
        otp: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"UPDATE pending_users SET otp = $2, otp_expires_at = $3 WHERE id = $1"#,
        )
        .bind(id)
        .bind(otp)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .context("store otp")?;
        Ok(res.rows_affected() == 1)
    }

    async fn delete_expired_pending(
        &self,
        id: Uuid,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"DELETE FROM pending_users WHERE id = $1 AND otp_expires_at = $2"#,
        )
        .bind(id)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .context("delete expired pending")?;
        Ok(res.rows_affected() == 1)
    }

    async fn promote_pending(&self, id: Uuid, otp: &str) -> anyhow::Result<Option<ConfirmedUser>> {
        let mut tx = self.db.begin().await.context("begin promote")?;

        // The row lock taken by DELETE makes a concurrent promotion see zero rows.
        let pending = sqlx::query_as::<_, PendingUser>(
            r#"
            DELETE FROM pending_users
            WHERE id = $1 AND otp = $2
            RETURNING id, name, email, password_hash, otp, otp_expires_at, created_at
            "#,
        )
        .bind(id)
        .bind(otp)
        .fetch_optional(&mut *tx)
        .await
        .context("claim pending registration")?;

        let Some(pending) = pending else {
            tx.rollback().await.context("rollback promote")?;
            return Ok(None);
        };

        let user = sqlx::query_as::<_, ConfirmedUser>(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, password_hash, created_at
            "#,
        )
        .bind(&pending.name)
        .bind(&pending.email)
        .bind(&pending.password_hash)
        .fetch_one(&mut *tx)
        .await
        .context("insert confirmed user")?;

        tx.commit().await.context("commit promote")?;
        Ok(Some(user))
    }
}
