//! Blocking client for the test-management API.
//!
//! The interesting part is the attachment pipeline: files are validated
//! against the run's limits, the run is created, and each file then goes
//! through initialize → PUT → notify in order, stopping at the first failure.
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! use runledger_client::{Client, ClientConfig};
//! use runledger_core::{CreateRun, UnitUnderTest};
//!
//! # fn main() -> Result<(), runledger_client::ClientError> {
//! let client = Client::new(ClientConfig::from_env()?)?;
//! let run = CreateRun::new(UnitUnderTest::new("SN-0001"), true).with_procedure_id("FVT1");
//! let created = client.create_run(&run, &[PathBuf::from("scope.png")])?;
//! println!("run {}", created.id);
//! # Ok(())
//! # }
//! ```

mod batch;
mod client;
mod config;
mod error;
mod http;
mod import;
mod runs;
mod upload;

pub use batch::{AttachmentBatchUploader, BatchOutcome};
pub use client::Client;
pub use config::{ClientConfig, DEFAULT_BASE_URL};
pub use error::{ClientError, UploadError, UploadPhase};
pub use http::HttpClient;
pub use import::{ReportImporter, CLIENT_NAME};
pub use runs::{RunCreated, RunSubmitter};
pub use upload::UploadSession;
