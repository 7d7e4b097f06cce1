//! Project data sources: Google Sheets and a SQL database.

pub mod google_auth;
pub mod sheets;
pub mod sql;

pub use sheets::{BudgetStatistics, GoogleSheetsClient, Record, SheetValidation};
pub use sql::{ColumnInfo, QueryResult, SqlDatabaseClient, TableSchema};

use thiserror::Error;

/// Google Sheets failures.
#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("Google Sheets not configured: {0}")]
    NotConfigured(String),

    /// Credential loading or token exchange failed
    #[error("Google Sheets authentication failed: {0}")]
    Auth(String),

    #[error("Google Sheets API rate limit exceeded")]
    RateLimited,

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Invalid Sheets response: {0}")]
    InvalidResponse(String),

    #[error("Worksheet '{0}' not found")]
    WorksheetNotFound(String),
}

/// SQL data source failures.
#[derive(Debug, Error)]
pub enum SqlClientError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Safe mode rejected a statement that modifies data
    #[error("Query contains potentially harmful operations")]
    UnsafeQuery,

    #[error("Invalid table name: {0}")]
    InvalidIdentifier(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),
}
