use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::repo::UserRepo;
use crate::auth::repo_types::{ConfirmedUser, PendingUser};

#[derive(Default)]
struct Tables {
    pending: HashMap<Uuid, PendingUser>,
    users: HashMap<Uuid, ConfirmedUser>,
}

/// `UserRepo` over two maps behind one lock; every call is its own transaction.
#[derive(Default)]
pub struct MemoryUserRepo {
    tables: Mutex<Tables>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn pending_count(&self) -> usize {
        self.tables.lock().await.pending.len()
    }

    pub async fn user_count(&self) -> usize {
        self.tables.lock().await.users.len()
    }

    /// Seed a confirmed account directly.
    pub async fn insert_user(&self, name: &str, email: &str, password_hash: &str) -> ConfirmedUser {
        let user = ConfirmedUser {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.tables.lock().await.users.insert(user.id, user.clone());
        user
    }
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<ConfirmedUser>> {
        let t = self.tables.lock().await;
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<ConfirmedUser>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn create_pending(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<PendingUser> {
        let mut t = self.tables.lock().await;
        t.pending.retain(|_, p| p.email != email);
        let pending = PendingUser {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            otp: None,
            otp_expires_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        t.pending.insert(pending.id, pending.clone());
        Ok(pending)
    }

    async fn find_pending_by_email(&self, email: &str) -> anyhow::Result<Option<PendingUser>> {
        let t = self.tables.lock().await;
        Ok(t.pending.values().find(|p| p.email == email).cloned())
    }

    async fn find_pending_by_id(&self, id: Uuid) -> anyhow::Result<Option<PendingUser>> {
        Ok(self.tables.lock().await.pending.get(&id).cloned())
    }

    async fn set_pending_otp(
        &self,
        id: Uuid,
        otp: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let mut t = self.tables.lock().await;
        match t.pending.get_mut(&id) {
            Some(p) => {
                p.otp = Some(otp.into());
                p.otp_expires_at = Some(expires_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_expired_pending(
        &self,
        id: Uuid,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let mut t = self.tables.lock().await;
        let still_expired = t
            .pending
            .get(&id)
            .is_some_and(|p| p.otp_expires_at == Some(expires_at));
        Ok(still_expired && t.pending.remove(&id).is_some())
    }

    async fn promote_pending(&self, id: Uuid, otp: &str) -> anyhow::Result<Option<ConfirmedUser>> {
        let mut t = self.tables.lock().await;
        let holds_code = t
            .pending
            .get(&id)
            .is_some_and(|p| p.otp.as_deref() == Some(otp));
        if !holds_code {
            return Ok(None);
        }
        let Some(pending) = t.pending.remove(&id) else {
            return Ok(None);
        };
        if t.users.values().any(|u| u.email == pending.email) {
            // unique email violation: roll the pending row back
            t.pending.insert(pending.id, pending.clone());
            anyhow::bail!("duplicate key value violates unique constraint on users.email");
        }
        let user = ConfirmedUser {
            id: Uuid::new_v4(),
            name: pending.name,
            email: pending.email,
            password_hash: pending.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        t.users.insert(user.id, user.clone());
        Ok(Some(user))
    }
}
