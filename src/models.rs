//! Entity model: users and the transactions on their personal ledger.

pub mod error;
pub mod transaction;
pub mod user;

pub use {
    error::ModelError,
    transaction::{
        Transaction, TransactionDetails, TransactionKind, TransactionPatch, TransactionType,
    },
    user::{User, UserKind, UserKindTag, UserPatch, UserWithBalance},
};

/// Anything a repository can own: a record with a repository-assigned id that
/// can be shallow-merged with a partial update.
pub trait Entity:
    Clone + serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static
{
    type Patch: Send;

    /// Key of the entity array inside the persisted document.
    const COLLECTION: &'static str;

    fn id(&self) -> Option<u64>;

    fn set_id(&mut self, id: u64);

    /// Merges `patch` onto the record. On error the record is left untouched.
    fn apply(&mut self, patch: Self::Patch) -> Result<(), ModelError>;
}
