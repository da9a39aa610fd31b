//! PostgreSQL Gateways
//!
//! Operates on the `"Accounts"` and `"Transactions"` tables owned by the
//! account service. Every write is a single conditional `UPDATE`, which
//! Postgres serializes per row, so status and balance writes are atomic
//! compare-and-set operations.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::error::SettlementError;
use super::gateway::{AccountStore, TransferStore, check_transition};
use super::state::TransferStatus;
use super::types::{Account, AccountNumber, BalanceWrite, Transfer, TransferId};

const TRANSFER_COLUMNS: &str = r#"
    t.id, t."SenderAccountAccountNumber", t."RecipientAccountAccountNumber",
    t."Amount", t."TransactionStatusId", t."CreatedDate"
"#;

/// Account gateway over `"Accounts"`
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn get_active_account(
        &self,
        number: AccountNumber,
    ) -> Result<Option<Account>, SettlementError> {
        let row = sqlx::query(
            r#"
            SELECT a.id, a."AccountNumber", a."OwnerId"::text AS owner_id, a."Amount",
                   a."IsDeleted", a."OpenDate"
            FROM "Accounts" AS a
            WHERE a."AccountNumber" = $1 AND a."IsDeleted" = false
            "#,
        )
        .bind(number.get())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_account(&r)).transpose()
    }

    async fn set_balance(
        &self,
        number: AccountNumber,
        expected: Decimal,
        new_balance: Decimal,
    ) -> Result<BalanceWrite, SettlementError> {
        let result = sqlx::query(
            r#"
            UPDATE "Accounts"
            SET "Amount" = $1
            WHERE "AccountNumber" = $2 AND "IsDeleted" = false AND "Amount" = $3
            "#,
        )
        .bind(new_balance)
        .bind(number.get())
        .bind(expected)
        .execute(&self.pool)
        .await?;

        Ok(if result.rows_affected() > 0 {
            BalanceWrite::Applied
        } else {
            BalanceWrite::Conflict
        })
    }
}

/// Transfer gateway over `"Transactions"`
pub struct PgTransferStore {
    pool: PgPool,
}

impl PgTransferStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransferStore for PgTransferStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn get_by_id(&self, id: TransferId) -> Result<Option<Transfer>, SettlementError> {
        let sql = format!(
            r#"SELECT {} FROM "Transactions" AS t WHERE t.id = $1"#,
            TRANSFER_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id.inner())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_transfer(&r)).transpose()
    }

    async fn set_status(
        &self,
        id: TransferId,
        expected: TransferStatus,
        new_status: TransferStatus,
    ) -> Result<bool, SettlementError> {
        check_transition(expected, new_status)?;

        let result = sqlx::query(
            r#"
            UPDATE "Transactions"
            SET "TransactionStatusId" = $1
            WHERE id = $2 AND "TransactionStatusId" = $3
            "#,
        )
        .bind(new_status.id())
        .bind(id.inner())
        .bind(expected.id())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_stuck(
        &self,
        older_than: Duration,
        limit: usize,
    ) -> Result<Vec<Transfer>, SettlementError> {
        let threshold_secs = i64::try_from(older_than.as_secs())
            .map_err(|e| SettlementError::CorruptRecord(format!("threshold: {}", e)))?;
        let limit = i64::try_from(limit)
            .map_err(|e| SettlementError::CorruptRecord(format!("limit: {}", e)))?;

        // No updated-at column exists; age is measured from creation
        let sql = format!(
            r#"
            SELECT {}
            FROM "Transactions" AS t
            WHERE t."TransactionStatusId" = $1
              AND t."CreatedDate" < NOW() - INTERVAL '1 second' * $2
            ORDER BY t."CreatedDate" ASC
            LIMIT $3
            "#,
            TRANSFER_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(TransferStatus::Processing.id())
            .bind(threshold_secs)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_transfer).collect()
    }
}

fn corrupt(column: &str, e: impl std::fmt::Display) -> SettlementError {
    SettlementError::CorruptRecord(format!("{}: {}", column, e))
}

fn row_to_account(row: &sqlx::postgres::PgRow) -> Result<Account, SettlementError> {
    let raw_number: i64 = row
        .try_get("AccountNumber")
        .map_err(|e| corrupt("AccountNumber", e))?;
    let number = AccountNumber::new(raw_number)
        .ok_or_else(|| corrupt("AccountNumber", format!("non-positive {}", raw_number)))?;

    Ok(Account {
        id: row.try_get::<Uuid, _>("id").map_err(|e| corrupt("id", e))?,
        number,
        owner_id: row
            .try_get::<Option<String>, _>("owner_id")
            .map_err(|e| corrupt("OwnerId", e))?
            .unwrap_or_default(),
        balance: row.try_get("Amount").map_err(|e| corrupt("Amount", e))?,
        is_deleted: row
            .try_get("IsDeleted")
            .map_err(|e| corrupt("IsDeleted", e))?,
        opened_at: row.try_get("OpenDate").map_err(|e| corrupt("OpenDate", e))?,
    })
}

fn row_to_transfer(row: &sqlx::postgres::PgRow) -> Result<Transfer, SettlementError> {
    let id: Uuid = row.try_get("id").map_err(|e| corrupt("id", e))?;

    let account = |column: &str| -> Result<AccountNumber, SettlementError> {
        let raw: i64 = row.try_get(column).map_err(|e| corrupt(column, e))?;
        AccountNumber::new(raw).ok_or_else(|| corrupt(column, format!("non-positive {}", raw)))
    };

    let status_id: i32 = row
        .try_get("TransactionStatusId")
        .map_err(|e| corrupt("TransactionStatusId", e))?;
    let status = TransferStatus::from_id(status_id)
        .ok_or_else(|| corrupt("TransactionStatusId", format!("unknown id {}", status_id)))?;

    Ok(Transfer {
        id: TransferId::from(id),
        sender: account("SenderAccountAccountNumber")?,
        recipient: account("RecipientAccountAccountNumber")?,
        amount: row.try_get("Amount").map_err(|e| corrupt("Amount", e))?,
        status,
        created_at: row
            .try_get("CreatedDate")
            .map_err(|e| corrupt("CreatedDate", e))?,
    })
}
