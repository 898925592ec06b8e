//! Route handlers for the REST API
//!
//! - [`jobs`] - Job submission, control and listing
//! - [`system`] - Queue statistics, provider tests, health, events

use crate::types::{AddOptions, JobId};
use serde::{Deserialize, Serialize};

mod jobs;
mod system;

pub use jobs::*;
pub use system::*;

/// Query parameters for GET /jobs
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ListJobsQuery {
    /// Only return jobs in this state (`queued`, `checking`, `downloading`, `paused`,
    /// `completed`, `error`)
    pub state: Option<String>,
}

/// Request body for POST /jobs/url
#[derive(Debug, Deserialize, Serialize)]
pub struct AddUrlRequest {
    /// Hoster link
    pub url: String,
    /// Save path, category, paused flag, name and priority
    #[serde(flatten)]
    pub options: AddOptions,
}

/// Request body for POST /jobs/pause and POST /jobs/resume
#[derive(Debug, Deserialize, Serialize)]
pub struct JobIdsRequest {
    /// Jobs to act on
    pub ids: Vec<JobId>,
}

/// Request body for POST /jobs/delete
#[derive(Debug, Deserialize, Serialize)]
pub struct DeleteJobsRequest {
    /// Jobs to delete
    pub ids: Vec<JobId>,
    /// Also remove the downloaded files (default: false)
    #[serde(default)]
    pub delete_files: bool,
}

/// Response for job submission
#[derive(Debug, Deserialize, Serialize)]
pub struct AddJobResponse {
    /// Id of the new (or already existing) job
    pub id: JobId,
}
