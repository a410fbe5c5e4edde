use {
    crate::{
        models::{Transaction, TransactionPatch},
        repository::{error::RepositoryError, interface::RepositoryInterface},
    },
    chrono::Utc,
    std::sync::Arc,
};

#[derive(Clone)]
pub struct TransactionService {
    repository: Arc<dyn RepositoryInterface<Transaction>>,
}

impl TransactionService {
    pub fn new(repository: Arc<dyn RepositoryInterface<Transaction>>) -> Self {
        TransactionService { repository }
    }

    /// Stores a new transaction, stamping `created_at` unless the caller
    /// already supplied one.
    pub fn save(&self, mut transaction: Transaction) -> Result<u64, RepositoryError> {
        transaction.created_at.get_or_insert_with(Utc::now);
        self.repository.save(transaction)
    }

    pub fn get_by_id(&self, id: u64) -> Result<Option<Transaction>, RepositoryError> {
        self.repository.find_by_id(id)
    }

    pub fn get_all(&self) -> Result<Vec<Transaction>, RepositoryError> {
        self.repository.find_all()
    }

    /// Transactions owned by `user_id`, in repository order. Sorting is left to
    /// the caller.
    pub fn get_by_user_id(&self, user_id: u64) -> Result<Vec<Transaction>, RepositoryError> {
        Ok(self
            .repository
            .find_all()?
            .into_iter()
            .filter(|transaction| transaction.user_id == user_id)
            .collect())
    }

    /// Entries add to the balance and exits subtract from it. A user without
    /// transactions has a balance of zero.
    pub fn get_user_balance(&self, user_id: u64) -> Result<f64, RepositoryError> {
        Ok(self
            .get_by_user_id(user_id)?
            .iter()
            .map(Transaction::signed_value)
            .sum())
    }

    pub fn update(
        &self,
        id: u64,
        patch: TransactionPatch,
    ) -> Result<Option<Transaction>, RepositoryError> {
        self.repository.update(id, patch)
    }

    pub fn delete(&self, id: u64) -> Result<Option<Transaction>, RepositoryError> {
        self.repository.delete(id)
    }
}
