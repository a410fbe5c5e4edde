use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("Missing field `{0}` for {1} variant")]
    MissingVariantField(&'static str, &'static str),
    #[error("Field `{0}` does not belong to the {1} variant")]
    ConflictingVariant(&'static str, &'static str),
    #[error("Cannot infer variant: {0}")]
    AmbiguousVariant(&'static str),
    #[error("Transaction value must be a finite number")]
    NonFiniteValue,
}
