use {
    crate::{
        models::{User, UserPatch, UserWithBalance},
        repository::{
            error::RepositoryError,
            interface::{RepositoryInterface, UserRepositoryInterface},
        },
        services::TransactionService,
    },
    std::sync::Arc,
};

#[derive(Clone)]
pub struct UserService {
    repository: Arc<dyn UserRepositoryInterface>,
    transactions: TransactionService,
}

impl UserService {
    pub fn new(
        repository: Arc<dyn UserRepositoryInterface>,
        transactions: TransactionService,
    ) -> Self {
        UserService {
            repository,
            transactions,
        }
    }

    pub fn save(&self, user: User) -> Result<u64, RepositoryError> {
        self.repository.save(user)
    }

    pub fn get_by_id(&self, id: u64) -> Result<Option<User>, RepositoryError> {
        self.repository.find_by_id(id)
    }

    pub fn get_all(&self) -> Result<Vec<User>, RepositoryError> {
        self.repository.find_all()
    }

    pub fn get_user_with_balance(
        &self,
        id: u64,
    ) -> Result<Option<UserWithBalance>, RepositoryError> {
        let Some(user) = self.repository.find_by_id(id)? else {
            return Ok(None);
        };

        let balance = self.transactions.get_user_balance(id)?;

        Ok(Some(UserWithBalance { user, balance }))
    }

    pub fn update(&self, id: u64, patch: UserPatch) -> Result<Option<User>, RepositoryError> {
        self.repository.update(id, patch)
    }

    pub fn delete(&self, id: u64) -> Result<Option<User>, RepositoryError> {
        self.repository.delete(id)
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        self.repository.find_by_email(email)
    }

    /// Exact, case-sensitive match on email and plaintext password. Unknown
    /// emails and wrong passwords both yield `None`.
    pub fn validate_login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .repository
            .find_by_email(email)?
            .filter(|user| user.password == password))
    }
}
