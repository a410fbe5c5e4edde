//! Use-case façades over the repositories. Services keep no state of their own.

pub mod transaction;
pub mod user;

pub use {transaction::TransactionService, user::UserService};

/// The long-lived services shared by every request handler.
#[derive(Clone)]
pub struct AppServices {
    pub users: UserService,
    pub transactions: TransactionService,
}
