//! Weekly-report opt-in repository.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

use domain::models::OptedAccount;

use crate::entities::OptedAccountEntity;
use crate::error::PersistenceError;

/// Storage contract for the weekly-report opt-in collection.
#[async_trait]
pub trait OptedAccountStore: Send + Sync {
    /// Inserts or fully replaces the record for the account's (account,
    /// org) pair.
    async fn upsert(&self, account: OptedAccount) -> Result<(), PersistenceError>;

    /// Removes the record for the pair. Absent pairs are not an error.
    async fn delete(&self, account_id: i64, org_id: i64) -> Result<(), PersistenceError>;

    /// Looks up one record.
    async fn get(
        &self,
        account_id: i64,
        org_id: i64,
    ) -> Result<Option<OptedAccount>, PersistenceError>;

    /// Returns every opted-in record, for scheduler reconstruction.
    async fn get_all(&self) -> Result<Vec<OptedAccount>, PersistenceError>;

    /// Returns all opted-in organizations of one account.
    async fn get_by_account(&self, account_id: i64) -> Result<Vec<OptedAccount>, PersistenceError>;
}

/// PostgreSQL-backed opt-in store.
#[derive(Debug, Clone)]
pub struct PgOptedAccountStore {
    pool: PgPool,
}

impl PgOptedAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OptedAccountStore for PgOptedAccountStore {
    async fn upsert(&self, account: OptedAccount) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO opted_accounts (account_id, org_id, org_name, email,
                                        users, opted_in_at, next_trigger_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (account_id, org_id) DO UPDATE SET
                org_name = EXCLUDED.org_name,
                email = EXCLUDED.email,
                users = EXCLUDED.users,
                opted_in_at = EXCLUDED.opted_in_at,
                next_trigger_time = EXCLUDED.next_trigger_time
            "#,
        )
        .bind(account.account_id)
        .bind(account.org_id)
        .bind(&account.org_name)
        .bind(&account.email)
        .bind(Json(&account.users))
        .bind(account.opted_in_at)
        .bind(account.next_trigger_time)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, account_id: i64, org_id: i64) -> Result<(), PersistenceError> {
        sqlx::query("DELETE FROM opted_accounts WHERE account_id = $1 AND org_id = $2")
            .bind(account_id)
            .bind(org_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(
        &self,
        account_id: i64,
        org_id: i64,
    ) -> Result<Option<OptedAccount>, PersistenceError> {
        let entity = sqlx::query_as::<_, OptedAccountEntity>(
            r#"
            SELECT account_id, org_id, org_name, email, users,
                   opted_in_at, next_trigger_time
            FROM opted_accounts
            WHERE account_id = $1 AND org_id = $2
            "#,
        )
        .bind(account_id)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entity.map(OptedAccount::from))
    }

    async fn get_all(&self) -> Result<Vec<OptedAccount>, PersistenceError> {
        let entities = sqlx::query_as::<_, OptedAccountEntity>(
            r#"
            SELECT account_id, org_id, org_name, email, users,
                   opted_in_at, next_trigger_time
            FROM opted_accounts
            ORDER BY account_id, org_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(entities.into_iter().map(OptedAccount::from).collect())
    }

    async fn get_by_account(&self, account_id: i64) -> Result<Vec<OptedAccount>, PersistenceError> {
        let entities = sqlx::query_as::<_, OptedAccountEntity>(
            r#"
            SELECT account_id, org_id, org_name, email, users,
                   opted_in_at, next_trigger_time
            FROM opted_accounts
            WHERE account_id = $1
            ORDER BY org_id
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entities.into_iter().map(OptedAccount::from).collect())
    }
}
