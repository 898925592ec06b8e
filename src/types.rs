//! Core types for debrid-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::path::PathBuf;

/// Unique, content-derived identifier for a job
///
/// Lowercase hex SHA-1: of the URL for direct-link jobs, of the raw `info` dictionary
/// for real torrent jobs. Submitting the same content twice yields the same id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Wrap an already computed hex digest
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id of a direct-link job: SHA-1 of the URL
    pub fn for_url(url: &str) -> Self {
        Self::from_digest(url.as_bytes())
    }

    /// SHA-1 over arbitrary bytes, lowercase hex
    pub fn from_digest(bytes: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    /// Borrow the hex string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for JobId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for JobId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for JobId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <String as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// What a job was created from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// A plain hoster URL, submitted directly or disguised as a torrent
    DirectLink,
    /// A real torrent processed on the provider side
    RealContainer,
}

impl JobKind {
    /// Convert integer kind code to JobKind
    pub fn from_i32(kind: i32) -> Self {
        match kind {
            1 => JobKind::RealContainer,
            _ => JobKind::DirectLink,
        }
    }

    /// Convert JobKind to integer kind code
    pub fn to_i32(&self) -> i32 {
        match self {
            JobKind::DirectLink => 0,
            JobKind::RealContainer => 1,
        }
    }
}

/// Job state
///
/// ```text
/// Queued -> Checking -> Downloading -> Completed
///              |             |
///              +--> Error <--+
/// Queued | Checking | Downloading -> Paused -> Queued
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    /// Waiting for a free slot
    Queued,
    /// Resolving the link or waiting for the provider to finish the torrent
    Checking,
    /// Transfer process running (includes extraction and move)
    Downloading,
    /// Paused by user
    Paused,
    /// Finished successfully
    Completed,
    /// Failed, see the job's error message
    Error,
}

impl State {
    /// Convert integer state code to State enum
    pub fn from_i32(state: i32) -> Self {
        match state {
            0 => State::Queued,
            1 => State::Checking,
            2 => State::Downloading,
            3 => State::Paused,
            4 => State::Completed,
            5 => State::Error,
            _ => State::Error, // Unknown codes surface as failures
        }
    }

    /// Convert State enum to integer state code
    pub fn to_i32(&self) -> i32 {
        match self {
            State::Queued => 0,
            State::Checking => 1,
            State::Downloading => 2,
            State::Paused => 3,
            State::Completed => 4,
            State::Error => 5,
        }
    }

    /// Whether the state is final
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Completed | State::Error)
    }

    /// Whether the job occupies an execution slot
    pub fn is_active(&self) -> bool {
        matches!(self, State::Checking | State::Downloading)
    }

    /// Whether the state graph has an edge from `self` to `next`
    pub fn can_transition_to(&self, next: State) -> bool {
        use State::*;
        matches!(
            (self, next),
            (Queued, Checking)
                | (Queued, Paused)
                | (Checking, Downloading)
                | (Checking, Error)
                | (Checking, Paused)
                | (Downloading, Completed)
                | (Downloading, Error)
                | (Downloading, Paused)
                | (Paused, Queued)
        )
    }

    /// Lowercase name, as used in the REST API and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Queued => "queued",
            State::Checking => "checking",
            State::Downloading => "downloading",
            State::Paused => "paused",
            State::Completed => "completed",
            State::Error => "error",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for State {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "queued" => Ok(State::Queued),
            "checking" => Ok(State::Checking),
            "downloading" => Ok(State::Downloading),
            "paused" => Ok(State::Paused),
            "completed" => Ok(State::Completed),
            "error" => Ok(State::Error),
            other => Err(format!("unknown state '{other}'")),
        }
    }
}

/// Job priority
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority (-1)
    Low = -1,
    /// Normal priority (0)
    #[default]
    Normal = 0,
    /// High priority (1)
    High = 1,
    /// Force start as soon as a slot frees up (2)
    Force = 2,
}

impl Priority {
    /// Convert integer priority code to Priority enum
    pub fn from_i32(priority: i32) -> Self {
        match priority {
            -1 => Priority::Low,
            0 => Priority::Normal,
            1 => Priority::High,
            2 => Priority::Force,
            _ => Priority::Normal,
        }
    }
}

/// Event broadcast to subscribers during the job lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job added to the queue (or created paused)
    Queued {
        /// Job ID
        id: JobId,
        /// Job name
        name: String,
    },

    /// Job removed
    Removed {
        /// Job ID
        id: JobId,
    },

    /// Job picked up by the scheduler and being resolved
    Checking {
        /// Job ID
        id: JobId,
    },

    /// Provider-side status of a torrent job changed
    ProviderStatus {
        /// Job ID
        id: JobId,
        /// Provider handling the torrent
        provider: String,
        /// Status line reported by the provider
        status: String,
    },

    /// Transfer progress update
    Downloading {
        /// Job ID
        id: JobId,
        /// Progress percentage (0.0 to 100.0)
        percent: f32,
        /// Current speed in bytes per second
        speed_bps: u64,
        /// Bytes on disk so far
        downloaded_bytes: u64,
        /// Total size if known
        #[serde(skip_serializing_if = "Option::is_none")]
        total_bytes: Option<u64>,
    },

    /// Server refused to continue a partial file, download restarted from zero
    Restarted {
        /// Job ID
        id: JobId,
    },

    /// Archive extraction started
    Extracting {
        /// Job ID
        id: JobId,
        /// Archive filename
        archive: String,
    },

    /// Copying the finished file to its destination
    Moving {
        /// Job ID
        id: JobId,
        /// Destination path
        destination: PathBuf,
        /// Bytes copied so far
        copied_bytes: u64,
    },

    /// Job paused
    Paused {
        /// Job ID
        id: JobId,
    },

    /// Job resumed (back in the queue)
    Resumed {
        /// Job ID
        id: JobId,
    },

    /// Job finished
    Completed {
        /// Job ID
        id: JobId,
        /// Final file or extraction folder
        path: PathBuf,
    },

    /// Job failed
    Failed {
        /// Job ID
        id: JobId,
        /// Error message
        error: String,
    },

    /// Graceful shutdown initiated
    Shutdown,
}

/// Information about a job, with live transfer progress merged in
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobInfo {
    /// Unique job identifier
    pub id: JobId,

    /// Display name (file name once known)
    pub name: String,

    /// How the job was submitted
    pub kind: JobKind,

    /// Category (if assigned)
    pub category: Option<String>,

    /// Current state
    pub state: State,

    /// Progress percentage (0.0 to 100.0)
    pub progress: f32,

    /// Current download speed in bytes per second
    pub speed_bps: u64,

    /// Total size in bytes (0 if unknown)
    pub total_bytes: u64,

    /// Downloaded bytes so far
    pub downloaded_bytes: u64,

    /// Estimated time to completion in seconds (None if unknown)
    pub eta_seconds: Option<u64>,

    /// Job priority
    pub priority: Priority,

    /// Destination directory
    pub save_path: PathBuf,

    /// Final file or extraction folder once completed
    pub output_path: Option<PathBuf>,

    /// Last status line (provider status, extraction, ...)
    pub status_message: Option<String>,

    /// Error message for failed jobs
    pub error_message: Option<String>,

    /// When the job was added
    pub added_at: DateTime<Utc>,

    /// When the job was first picked up
    pub started_at: Option<DateTime<Utc>>,

    /// When the job reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,
}

/// Options for adding a job
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AddOptions {
    /// Override the default save directory
    #[serde(default)]
    pub save_path: Option<PathBuf>,

    /// Category to assign
    #[serde(default)]
    pub category: Option<String>,

    /// Create the job paused instead of queued
    #[serde(default)]
    pub paused: bool,

    /// Display name (direct links only; defaults to the last URL segment)
    #[serde(default)]
    pub name: Option<String>,

    /// Job priority
    #[serde(default)]
    pub priority: Priority,
}

/// Queue statistics
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueStats {
    /// Total number of jobs
    pub total: usize,

    /// Jobs waiting for a slot
    pub queued: usize,

    /// Jobs being resolved
    pub checking: usize,

    /// Jobs transferring
    pub downloading: usize,

    /// Paused jobs
    pub paused: usize,

    /// Completed jobs
    pub completed: usize,

    /// Failed jobs
    pub failed: usize,

    /// Total speed across active transfers (bytes per second)
    pub total_speed_bps: u64,

    /// Whether new jobs are accepted
    pub accepting_new: bool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn state_round_trips_through_i32_for_all_variants() {
        let cases = [
            (State::Queued, 0),
            (State::Checking, 1),
            (State::Downloading, 2),
            (State::Paused, 3),
            (State::Completed, 4),
            (State::Error, 5),
        ];

        for (variant, expected_int) in cases {
            assert_eq!(variant.to_i32(), expected_int, "{variant:?} encoding");
            assert_eq!(State::from_i32(expected_int), variant, "{expected_int} decoding");
        }
    }

    #[test]
    fn state_from_unknown_integer_defaults_to_error() {
        assert_eq!(State::from_i32(42), State::Error);
        assert_eq!(State::from_i32(-1), State::Error);
    }

    #[test]
    fn state_graph_allows_only_documented_edges() {
        use State::*;
        let all = [Queued, Checking, Downloading, Paused, Completed, Error];
        let allowed = [
            (Queued, Checking),
            (Queued, Paused),
            (Checking, Downloading),
            (Checking, Error),
            (Checking, Paused),
            (Downloading, Completed),
            (Downloading, Error),
            (Downloading, Paused),
            (Paused, Queued),
        ];

        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from:?} -> {to:?}"
                );
            }
        }
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for to in [State::Queued, State::Checking, State::Paused] {
            assert!(!State::Completed.can_transition_to(to));
            assert!(!State::Error.can_transition_to(to));
        }
        assert!(State::Completed.is_terminal());
        assert!(!State::Paused.is_terminal());
    }

    #[test]
    fn state_parses_case_insensitively() {
        assert_eq!(State::from_str("Downloading").unwrap(), State::Downloading);
        assert_eq!(State::from_str("error").unwrap(), State::Error);
        assert!(State::from_str("seeding").is_err());
    }

    #[test]
    fn job_id_for_url_is_stable_sha1_hex() {
        // sha1("abc") is a well-known test vector
        let id = JobId::for_url("abc");
        assert_eq!(id.as_str(), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(JobId::for_url("abc"), id);
        assert_ne!(JobId::for_url("abd"), id);
    }

    #[test]
    fn job_kind_round_trips_through_i32() {
        for kind in [JobKind::DirectLink, JobKind::RealContainer] {
            assert_eq!(JobKind::from_i32(kind.to_i32()), kind);
        }
    }

    #[test]
    fn priority_from_unknown_integer_defaults_to_normal() {
        assert_eq!(Priority::from_i32(7), Priority::Normal);
        assert_eq!(Priority::from_i32(-1), Priority::Low);
        assert!(Priority::Force > Priority::High);
    }

    #[test]
    fn event_serializes_with_snake_case_type_tag() {
        let event = Event::Completed {
            id: JobId::new("ab"),
            path: PathBuf::from("/data/file.mkv"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "completed");
        assert_eq!(json["id"], "ab");
    }
}
