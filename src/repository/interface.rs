use crate::{
    models::{Entity, User},
    repository::error::RepositoryError,
};

pub trait RepositoryInterface<E: Entity>: Send + Sync {
    /// Assigns the next id to the entity, stores it and returns the id.
    fn save(&self, entity: E) -> Result<u64, RepositoryError>;

    /// Looks an entity up in memory; never touches disk.
    fn find_by_id(&self, id: u64) -> Result<Option<E>, RepositoryError>;

    /// Every entity, in ascending id order.
    fn find_all(&self) -> Result<Vec<E>, RepositoryError>;

    /// Merges `patch` onto the entity and returns the result. An unknown id is
    /// a no-op and yields `None`.
    fn update(&self, id: u64, patch: E::Patch) -> Result<Option<E>, RepositoryError>;

    /// Removes the entity, if present, and returns it.
    fn delete(&self, id: u64) -> Result<Option<E>, RepositoryError>;

    /// First entity, in id order, matching the predicate.
    fn find_first(&self, predicate: &dyn Fn(&E) -> bool) -> Result<Option<E>, RepositoryError>;
}

pub trait UserRepositoryInterface: RepositoryInterface<User> {
    /// Emails are not unique; the user with the lowest id wins.
    fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        self.find_first(&|user| user.email == email)
    }
}
