/*!
 * SQLite persistence for translation jobs.
 *
 * - `connection`: connection lifecycle and blocking-pool access
 * - `schema`: versioned table definitions
 * - `models`: job records and their status
 * - `repository`: claim, progress and completion operations
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;

pub use connection::DatabaseConnection;
pub use models::{FailureOutcome, JobInput, JobRecord, JobStats, JobStatus};
pub use repository::{ReclaimSummary, Repository};
