use thiserror::Error;

#[derive(Error, Debug)]
pub enum BudgetError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed price record '{id}': {reason}")]
    MalformedPriceRecord { id: String, reason: String },

    #[error("Invalid decimal value '{value}' in column {column}")]
    InvalidDecimal { column: &'static str, value: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type BudgetResult<T> = Result<T, BudgetError>;
