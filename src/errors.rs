//! Unified error types for the storefront engine.
//!
//! Every fallible operation returns [`Result`]. Database errors are classified on
//! conversion so that lock timeouts and deadlocks surface as
//! [`Error::TransactionAborted`], the only variant callers may retry automatically.

use crate::models::StockUnit;
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;

/// Why a single cart line blocked a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineIssue {
    /// The line cannot be bought at all (inactive product, unapproved vendor,
    /// unknown or inactive combination).
    Unavailable {
        /// Cart line id
        item_id: i64,
        /// Product on the line
        product_id: i64,
        /// Human-readable reason
        reason: String,
    },
    /// The line asks for more units than the ledger holds.
    InsufficientStock {
        /// Cart line id
        item_id: i64,
        /// Unit the stock is tracked against
        unit: StockUnit,
        /// Quantity the cart asks for
        requested: i32,
        /// Quantity currently available
        available: i32,
    },
}

/// Main error type for the storefront engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A product, combination, cart line or other record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record that was looked up
        entity: &'static str,
        /// Identifier used for the lookup
        id: String,
    },

    /// The request contradicts existing state (duplicate ids, inactive combination, ...).
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflict
        message: String,
    },

    /// A stock unit holds fewer units than requested.
    #[error("Insufficient stock for {unit}: requested {requested}, available {available}")]
    InsufficientStock {
        /// Unit the stock is tracked against
        unit: StockUnit,
        /// Quantity that was requested
        requested: i32,
        /// Quantity that was available at the time of the check
        available: i32,
    },

    /// Vendor or product ownership mismatch.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Description of the ownership mismatch
        message: String,
    },

    /// Malformed input (variant sets, quantities, missing address).
    #[error("Validation failed: {message}")]
    Validation {
        /// Description of the failed validation
        message: String,
    },

    /// The database aborted the transaction (lock timeout, deadlock, busy).
    #[error("Transaction aborted: {message}")]
    TransactionAborted {
        /// Message reported by the database
        message: String,
    },

    /// Checkout found one or more lines that cannot be ordered.
    #[error("Checkout rejected: {} line(s) need attention", issues.len())]
    CheckoutRejected {
        /// Per-line report
        issues: Vec<LineIssue>,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration problem
        message: String,
    },

    /// Any other database error.
    #[error("Database error: {0}")]
    Database(DbErr),

    /// JSON (de)serialization of variant snapshots failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for [`Error::Conflict`].
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Only aborted transactions leave no partial state behind, so only they are retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransactionAborted { .. })
    }
}

impl From<DbErr> for Error {
    fn from(err: DbErr) -> Self {
        let message = err.to_string();
        let lowered = message.to_lowercase();
        let aborted = [
            "database is locked",
            "database table is locked",
            "deadlock",
            "lock wait timeout",
            "could not serialize",
            "pool timed out",
        ]
        .iter()
        .any(|needle| lowered.contains(needle));

        if aborted {
            Self::TransactionAborted { message }
        } else {
            Self::Database(err)
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
