use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;

use expensey_core::domain::expense::{Expense, ExpenseDetails, ExpenseId, ExpenseStatus};

use super::{ExpenseRepository, RepositoryError};

#[derive(Default)]
struct Store {
    next_id: i64,
    expenses: BTreeMap<ExpenseId, Expense>,
}

/// Process-local test double for [`ExpenseRepository`]. The server always runs
/// on the SQL repository.
#[derive(Default)]
pub struct InMemoryExpenseRepository {
    store: RwLock<Store>,
}

#[async_trait::async_trait]
impl ExpenseRepository for InMemoryExpenseRepository {
    async fn create(&self, details: ExpenseDetails) -> Result<Expense, RepositoryError> {
        let mut store = self.store.write().await;
        store.next_id += 1;
        let now = Utc::now();
        let expense = Expense {
            id: ExpenseId(store.next_id),
            status: ExpenseStatus::Pending,
            details,
            created_at: now,
            updated_at: now,
        };
        store.expenses.insert(expense.id, expense.clone());
        Ok(expense)
    }

    async fn find_by_id(&self, id: ExpenseId) -> Result<Option<Expense>, RepositoryError> {
        let store = self.store.read().await;
        Ok(store.expenses.get(&id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Expense>, RepositoryError> {
        let store = self.store.read().await;
        Ok(store.expenses.values().cloned().collect())
    }

    async fn find_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Expense>, RepositoryError> {
        let store = self.store.read().await;
        let mut found: Vec<Expense> = store
            .expenses
            .values()
            .filter(|e| (start..=end).contains(&e.details.expense_date))
            .cloned()
            .collect();
        found.sort_by_key(|e| (e.details.expense_date, e.id));
        Ok(found)
    }

    async fn update_details(
        &self,
        id: ExpenseId,
        details: ExpenseDetails,
    ) -> Result<Expense, RepositoryError> {
        let mut store = self.store.write().await;
        let expense = store.expenses.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
        expense.details = details;
        expense.updated_at = Utc::now();
        Ok(expense.clone())
    }

    async fn delete(&self, id: ExpenseId) -> Result<(), RepositoryError> {
        let mut store = self.store.write().await;
        store.expenses.remove(&id).map(|_| ()).ok_or(RepositoryError::NotFound(id))
    }

    async fn delete_many(&self, ids: &[ExpenseId]) -> Result<u64, RepositoryError> {
        let mut store = self.store.write().await;
        let removed = ids.iter().filter(|id| store.expenses.remove(*id).is_some()).count();
        Ok(removed as u64)
    }

    async fn compare_and_set_status(
        &self,
        id: ExpenseId,
        expected: ExpenseStatus,
        next: ExpenseStatus,
    ) -> Result<bool, RepositoryError> {
        let mut store = self.store.write().await;
        match store.expenses.get_mut(&id) {
            Some(expense) if expense.status == expected => {
                expense.status = next;
                expense.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
