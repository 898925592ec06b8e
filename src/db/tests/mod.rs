
use crate::db::{Database, NewJob};
use crate::types::{JobId, JobKind, Priority, State};
use tempfile::NamedTempFile;

pub(super) async fn open_db() -> (Database, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (db, temp_file)
}

pub(super) fn new_job(url: &str) -> NewJob {
    NewJob {
        id: JobId::for_url(url),
        name: url.rsplit('/').next().unwrap_or("download").to_string(),
        kind: JobKind::DirectLink,
        origin: url.to_string(),
        save_path: "/downloads".to_string(),
        category: None,
        priority: Priority::Normal,
        total_size: 0,
        state: State::Queued,
    }
}
