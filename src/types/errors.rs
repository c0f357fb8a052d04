use thiserror::Error;

#[derive(Debug, Error)]
pub enum AmountError {
    #[error("amount error: {0}")]
    InvalidFormat(String),
    #[error("amount error: {0}")]
    Parse(#[from] rust_decimal::Error),
    #[error("amount error: overflow")]
    Overflow
}
