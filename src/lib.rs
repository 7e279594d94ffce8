//! Library exports for the media integrity monitor, shared by the binary,
//! integration tests and benchmarks.
/// Application directory resolution.
pub mod app_dirs;
/// SQLite catalog of tracked media files.
pub mod catalog;
/// Staleness detection and checksum refresh.
pub mod checksum;
/// Wall clock abstraction.
pub mod clock;
/// Monitor configuration.
pub mod config;
/// Content digests and modification times.
pub mod digest;
/// Media file discovery.
pub mod discovery;
/// Single-instance execution guard.
pub mod guard;
mod http_client;
/// Logging setup.
pub mod logging;
/// Stage sequencing for a monitoring pass.
pub mod pipeline;
/// Removal of records for deleted files.
pub mod reconcile;
/// Status, progress and invalid file reporting.
pub mod report;
/// External validator invocation.
pub mod validator;
