use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use runledger_client::{ClientConfig, DEFAULT_BASE_URL};
use runledger_core::limits::{DEFAULT_MAX_ATTACHMENTS, DEFAULT_MAX_FILE_SIZE};

#[derive(Debug, Parser)]
#[command(name = "runledger", about = "Record test runs and their attachments")]
pub struct CliConfig {
    /// API base URL
    #[arg(long, env = "RUNLEDGER_URL", default_value = DEFAULT_BASE_URL)]
    pub url: String,

    /// API key sent as a bearer token
    #[arg(long, env = "RUNLEDGER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "RUNLEDGER_TIMEOUT_SECS", default_value = "30")]
    pub timeout: u64,

    /// Maximum attachments per run
    #[arg(long, env = "RUNLEDGER_MAX_ATTACHMENTS", default_value_t = DEFAULT_MAX_ATTACHMENTS)]
    pub max_attachments: usize,

    /// Maximum size of one attachment, in bytes
    #[arg(long, env = "RUNLEDGER_MAX_FILE_SIZE", default_value_t = DEFAULT_MAX_FILE_SIZE)]
    pub max_file_size: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a run from a JSON payload, then upload its attachments
    CreateRun {
        /// JSON file holding the run payload
        #[arg(long)]
        payload: PathBuf,
        /// File to attach; repeat for several
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
    },
    /// Attach files to an existing run
    Attach {
        run_id: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Import an OpenHTF JSON report
    Import { report: PathBuf },
    /// Print one run as JSON
    GetRun { run_id: String },
    /// Print the runs recorded for a unit
    ListRuns {
        #[arg(long)]
        serial_number: String,
    },
    /// Delete runs by id
    DeleteRuns {
        #[arg(required = true)]
        run_ids: Vec<String>,
    },
}

impl CliConfig {
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(&self.url)
            .with_timeout(Duration::from_secs(self.timeout))
            .with_max_attachments(self.max_attachments)
            .with_max_file_size(self.max_file_size);
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            config = config.with_api_key(key);
        }
        config
    }
}
