//! Append-only JSON-lines event log.
//!
//! One [`CombatEvent`] per line:
//! ```text
//! {"sequence":1,"session":7,"timestamp":"…","context":"match",…}
//! {"sequence":2,"session":null,"timestamp":"…","context":"system",…}
//! ```
//! Retention cleanup rewrites the file through a temp file and an atomic
//! rename, then reopens the writer in append mode.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::events::{CombatEvent, EventContext};
use crate::repository::{EventLogRepository, RepositoryError, Result};

const WRITE_BUFFER: usize = 64 * 1024;

/// File-based event log for system, account and match events.
pub struct FileEventLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileEventLog {
    /// Opens the log for appending, creating the directory and file if needed.
    pub fn open_or_create(base_dir: impl AsRef<Path>, filename: impl AsRef<str>) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        fs::create_dir_all(base_dir)?;
        let path = base_dir.join(filename.as_ref());
        let writer = open_append(&path)?;

        tracing::debug!("Opened event log: {}", path.display());

        Ok(Self {
            path,
            writer: Mutex::new(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_lines(&self) -> Result<Vec<CombatEvent>> {
        let file = File::open(&self.path)?;
        let mut events = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CombatEvent>(&line) {
                Ok(event) => events.push(event),
                // A torn final line after a crash is expected; skip it.
                Err(e) => tracing::warn!(
                    "Skipping unreadable event log line {} in {}: {}",
                    index + 1,
                    self.path.display(),
                    e
                ),
            }
        }
        Ok(events)
    }
}

fn open_append(path: &Path) -> Result<BufWriter<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::with_capacity(WRITE_BUFFER, file))
}

impl EventLogRepository for FileEventLog {
    fn append(&self, event: &CombatEvent) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        serde_json::to_writer(&mut *writer, event)?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        writer.flush()?;
        Ok(())
    }

    fn purge_older_than(&self, context: EventContext, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        writer.flush()?;

        let events = self.read_lines()?;
        let before = events.len();
        let kept: Vec<&CombatEvent> = events
            .iter()
            .filter(|e| e.context != context || e.timestamp >= cutoff)
            .collect();
        let purged = before - kept.len();
        if purged == 0 {
            return Ok(0);
        }

        let temp_path = self.path.with_extension("log.tmp");
        {
            let mut temp = BufWriter::new(File::create(&temp_path)?);
            for event in kept {
                serde_json::to_writer(&mut temp, event)?;
                temp.write_all(b"\n")?;
            }
            temp.flush()?;
        }
        fs::rename(&temp_path, &self.path)?;
        *writer = open_append(&self.path)?;

        tracing::debug!(
            "Purged {} {} event(s) older than {} from {}",
            purged,
            context,
            cutoff,
            self.path.display()
        );
        Ok(purged)
    }

    fn read_all(&self) -> Result<Vec<CombatEvent>> {
        self.flush()?;
        self.read_lines()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventPayload, EventSeverity};
    use chrono::Duration;

    fn notice(context: EventContext, age_days: i64) -> CombatEvent {
        let mut event = CombatEvent::new(
            context,
            EventSeverity::Info,
            "maintenance window announced",
            EventPayload::Notice {
                text: "maintenance".into(),
            },
        );
        event.timestamp = Utc::now() - Duration::days(age_days);
        event
    }

    #[test]
    fn purge_only_touches_the_requested_context() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileEventLog::open_or_create(dir.path(), "events.log").unwrap();

        log.append(&notice(EventContext::System, 40)).unwrap();
        log.append(&notice(EventContext::System, 1)).unwrap();
        log.append(&notice(EventContext::Account, 40)).unwrap();

        let cutoff = Utc::now() - Duration::days(30);
        assert_eq!(log.purge_older_than(EventContext::System, cutoff).unwrap(), 1);

        let remaining = log.read_all().unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(
            remaining
                .iter()
                .filter(|e| e.context == EventContext::Account)
                .count(),
            1
        );

        // The writer keeps appending to the rewritten file.
        log.append(&notice(EventContext::Match, 0)).unwrap();
        assert_eq!(log.read_all().unwrap().len(), 3);
    }

    #[test]
    fn reopening_keeps_previous_entries() {
        let dir = tempfile::tempdir().unwrap();
        {
            let log = FileEventLog::open_or_create(dir.path(), "events.log").unwrap();
            log.append(&notice(EventContext::Match, 0)).unwrap();
            log.flush().unwrap();
        }
        let log = FileEventLog::open_or_create(dir.path(), "events.log").unwrap();
        assert_eq!(log.read_all().unwrap().len(), 1);
    }
}
