use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use expensey_core::domain::expense::{Expense, ExpenseDetails, ExpenseId, ExpenseStatus};

use super::{ExpenseRepository, RepositoryError};
use crate::DbPool;

const DATE_FORMAT: &str = "%Y-%m-%d";

const SELECT_COLUMNS: &str = "SELECT id, amount, category, description, expense_date, submitted_by,
            status, created_at, updated_at
     FROM expense";

pub struct SqlExpenseRepository {
    pool: DbPool,
}

impl SqlExpenseRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode<T>(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<T, RepositoryError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{column} `{raw}`: {e}")))
}

fn row_to_expense(row: &sqlx::sqlite::SqliteRow) -> Result<Expense, RepositoryError> {
    let id: i64 = decode(row, "id")?;
    let amount_str: String = decode(row, "amount")?;
    let expense_date_str: String = decode(row, "expense_date")?;
    let status_str: String = decode(row, "status")?;
    let created_at_str: String = decode(row, "created_at")?;
    let updated_at_str: String = decode(row, "updated_at")?;

    let amount = Decimal::from_str(&amount_str)
        .map_err(|e| RepositoryError::Decode(format!("amount `{amount_str}`: {e}")))?;
    let expense_date = NaiveDate::parse_from_str(&expense_date_str, DATE_FORMAT)
        .map_err(|e| RepositoryError::Decode(format!("expense_date `{expense_date_str}`: {e}")))?;
    let status = ExpenseStatus::from_str(&status_str)
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Expense {
        id: ExpenseId(id),
        status,
        details: ExpenseDetails {
            amount,
            category: decode(row, "category")?,
            description: decode(row, "description")?,
            expense_date,
            submitted_by: decode(row, "submitted_by")?,
        },
        created_at: parse_timestamp("created_at", &created_at_str)?,
        updated_at: parse_timestamp("updated_at", &updated_at_str)?,
    })
}

#[async_trait::async_trait]
impl ExpenseRepository for SqlExpenseRepository {
    async fn create(&self, details: ExpenseDetails) -> Result<Expense, RepositoryError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO expense (amount, category, description, expense_date, submitted_by,
                                  status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(details.amount.to_string())
        .bind(&details.category)
        .bind(&details.description)
        .bind(details.expense_date.format(DATE_FORMAT).to_string())
        .bind(&details.submitted_by)
        .bind(ExpenseStatus::Pending.as_str())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(Expense {
            id: ExpenseId(result.last_insert_rowid()),
            status: ExpenseStatus::Pending,
            details,
            created_at: now,
            updated_at: now,
        })
    }

    async fn find_by_id(&self, id: ExpenseId) -> Result<Option<Expense>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_expense(r)?)),
            None => Ok(None),
        }
    }

    async fn list_all(&self) -> Result<Vec<Expense>, RepositoryError> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_expense).collect::<Result<Vec<_>, _>>()
    }

    async fn find_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Expense>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE expense_date BETWEEN ? AND ? ORDER BY expense_date ASC, id ASC"
        ))
        .bind(start.format(DATE_FORMAT).to_string())
        .bind(end.format(DATE_FORMAT).to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_expense).collect::<Result<Vec<_>, _>>()
    }

    async fn update_details(
        &self,
        id: ExpenseId,
        details: ExpenseDetails,
    ) -> Result<Expense, RepositoryError> {
        let result = sqlx::query(
            "UPDATE expense
             SET amount = ?, category = ?, description = ?, expense_date = ?,
                 submitted_by = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(details.amount.to_string())
        .bind(&details.category)
        .bind(&details.description)
        .bind(details.expense_date.format(DATE_FORMAT).to_string())
        .bind(&details.submitted_by)
        .bind(Utc::now().to_rfc3339())
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id));
        }

        self.find_by_id(id).await?.ok_or(RepositoryError::NotFound(id))
    }

    async fn delete(&self, id: ExpenseId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM expense WHERE id = ?").bind(id.0).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id));
        }
        Ok(())
    }

    async fn delete_many(&self, ids: &[ExpenseId]) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for id in ids {
            removed += sqlx::query("DELETE FROM expense WHERE id = ?")
                .bind(id.0)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;

        Ok(removed)
    }

    async fn compare_and_set_status(
        &self,
        id: ExpenseId,
        expected: ExpenseStatus,
        next: ExpenseStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE expense SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(next.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id.0)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
