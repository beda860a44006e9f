use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use expensey_core::domain::expense::{Expense, ExpenseDetails, ExpenseId, ExpenseStatus};

pub mod expense;
pub mod memory;

pub use expense::SqlExpenseRepository;
pub use memory::InMemoryExpenseRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("expense {0} was not found")]
    NotFound(ExpenseId),
}

/// Durable keyed storage of expense records.
///
/// Status is only ever changed through [`ExpenseRepository::compare_and_set_status`];
/// `update_details` leaves it untouched.
#[async_trait]
pub trait ExpenseRepository: Send + Sync {
    /// Inserts a new record in `Pending` and returns it with its assigned id.
    async fn create(&self, details: ExpenseDetails) -> Result<Expense, RepositoryError>;

    async fn find_by_id(&self, id: ExpenseId) -> Result<Option<Expense>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<Expense>, RepositoryError>;

    /// Records whose `expense_date` falls within `start..=end`, ordered by date then id.
    async fn find_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Expense>, RepositoryError>;

    async fn update_details(
        &self,
        id: ExpenseId,
        details: ExpenseDetails,
    ) -> Result<Expense, RepositoryError>;

    async fn delete(&self, id: ExpenseId) -> Result<(), RepositoryError>;

    /// Deletes every listed id that exists and returns how many rows went away.
    async fn delete_many(&self, ids: &[ExpenseId]) -> Result<u64, RepositoryError>;

    /// Moves `id` from `expected` to `next` in one atomic step. Returns `false`
    /// when the stored status is no longer `expected` (or the row is gone).
    async fn compare_and_set_status(
        &self,
        id: ExpenseId,
        expected: ExpenseStatus,
        next: ExpenseStatus,
    ) -> Result<bool, RepositoryError>;
}
