use anyhow::Error;
use async_trait::async_trait;

/// The destination table, reduced to what the job consumes: read everything
/// back, append rows. Backed by a Google Sheets worksheet in production;
/// tests substitute in-memory implementations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Table: Send + Sync {
    /// Every value row currently in the table, in sheet order.
    async fn read_all_rows(&self) -> Result<Vec<Vec<String>>, Error>;

    async fn append_row(&self, row: Vec<String>) -> Result<(), Error>;

    async fn append_rows(&self, rows: Vec<Vec<String>>) -> Result<(), Error>;

    /// Number of value rows; zero for an empty sheet.
    async fn row_count(&self) -> Result<usize, Error>;

    /// The first row of the table, empty when the sheet has none.
    async fn first_row_values(&self) -> Result<Vec<String>, Error>;
}
