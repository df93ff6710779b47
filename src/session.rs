//! Import sessions hold a parsed timetable between preview and submission.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::importer::{ParsedTimetable, build_import_batch};
use crate::models::{Branch, ImportSummary, ParsedScheduleSlot, TimetableRecord};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Import session not found")]
    NotFound,
    #[error("An import is already in progress for this session")]
    InProgress,
    #[error("No valid rows to import")]
    NothingToImport,
    #[error("{0} row(s) have errors; fix the file and upload it again")]
    InvalidRows(usize),
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImportSession {
    pub id: Uuid,
    pub branch: Branch,
    pub slots: Vec<ParsedScheduleSlot>,
    pub summary: ImportSummary,
    pub submitting: bool,
    pub created_at: DateTime<Utc>,
}

/// An in-flight submission. Dropping it without calling
/// [`finish`](Submission::finish) counts as a failure.
pub struct Submission<'a> {
    sessions: &'a ImportSessions,
    id: Uuid,
    batch: Vec<TimetableRecord>,
    settled: bool,
}

impl Submission<'_> {
    pub fn batch(&self) -> &[TimetableRecord] {
        &self.batch
    }

    pub fn finish(mut self, succeeded: bool) {
        self.settled = true;
        self.sessions.settle(&self.id, succeeded);
    }
}

impl Drop for Submission<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.sessions.settle(&self.id, false);
        }
    }
}

/// Sessions left idle this long are dropped.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;

pub struct ImportSessions {
    entries: DashMap<Uuid, ImportSession>,
    ttl: Duration,
}

impl Default for ImportSessions {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportSessions {
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_SESSION_TTL_SECS as i64))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    // A session with a submission in flight never expires.
    fn is_expired(&self, session: &ImportSession, now: DateTime<Utc>) -> bool {
        !session.submitting
            && session
                .created_at
                .checked_add_signed(self.ttl)
                .is_some_and(|deadline| deadline <= now)
    }

    fn evict_if_expired(&self, id: &Uuid) {
        let now = Utc::now();
        if self
            .entries
            .remove_if(id, |_, session| self.is_expired(session, now))
            .is_some()
        {
            debug!(session_id = %id, "import session expired");
        }
    }

    /// Drops every expired session and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, session| !self.is_expired(session, now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "purged expired import sessions");
        }
        removed
    }

    pub fn create(&self, branch: Branch, parsed: ParsedTimetable) -> ImportSession {
        self.purge_expired();
        let session = ImportSession {
            id: Uuid::new_v4(),
            branch,
            slots: parsed.slots,
            summary: parsed.summary,
            submitting: false,
            created_at: Utc::now(),
        };
        self.entries.insert(session.id, session.clone());
        session
    }

    pub fn get(&self, id: &Uuid) -> Option<ImportSession> {
        self.evict_if_expired(id);
        self.entries.get(id).map(|entry| entry.clone())
    }

    /// Marks the session as submitting and hands out its batch.
    ///
    /// The map guard is released before returning, so callers can await the
    /// store write without blocking other sessions.
    pub fn begin_submit(&self, id: &Uuid) -> Result<Submission<'_>, SessionError> {
        self.evict_if_expired(id);
        let mut entry = self.entries.get_mut(id).ok_or(SessionError::NotFound)?;
        if entry.submitting {
            return Err(SessionError::InProgress);
        }
        let batch = build_import_batch(&entry.slots, entry.branch);
        if batch.is_empty() {
            return Err(SessionError::NothingToImport);
        }
        let invalid = entry.slots.iter().filter(|s| !s.valid).count();
        if invalid > 0 {
            return Err(SessionError::InvalidRows(invalid));
        }
        entry.submitting = true;
        Ok(Submission {
            sessions: self,
            id: *id,
            batch,
            settled: false,
        })
    }

    // A confirmed write clears the session; a failed one leaves its slots
    // untouched.
    fn settle(&self, id: &Uuid, succeeded: bool) {
        if succeeded {
            self.entries.remove(id);
        } else if let Some(mut entry) = self.entries.get_mut(id) {
            entry.submitting = false;
        }
    }

    pub fn discard(&self, id: &Uuid) -> bool {
        self.entries.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::parse;
    use crate::models::Classroom;

    fn parsed(csv: &str) -> ParsedTimetable {
        let rooms = vec![Classroom {
            id: "room-101".into(),
            room_number: "101".into(),
            building: "Main".into(),
        }];
        parse(csv.as_bytes(), &rooms).unwrap()
    }

    #[test]
    fn test_submit_lifecycle_success_clears() {
        let sessions = ImportSessions::new();
        let session = sessions.create(Branch::Cse, parsed("Days,1,2\nMonday,A (101),B (101)\n"));

        let submission = sessions.begin_submit(&session.id).unwrap();
        assert_eq!(submission.batch().len(), 2);
        assert!(sessions.get(&session.id).unwrap().submitting);

        submission.finish(true);
        assert!(sessions.get(&session.id).is_none());
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_second_submit_while_in_flight_is_refused() {
        let sessions = ImportSessions::new();
        let session = sessions.create(Branch::Cse, parsed("Days,1\nMonday,A (101)\n"));

        let _first = sessions.begin_submit(&session.id).unwrap();
        assert_eq!(
            sessions.begin_submit(&session.id).err(),
            Some(SessionError::InProgress)
        );
    }

    #[test]
    fn test_failed_submit_keeps_slots() {
        let sessions = ImportSessions::new();
        let session = sessions.create(Branch::It, parsed("Days,1\nMonday,A (101)\n"));

        sessions.begin_submit(&session.id).unwrap().finish(false);

        let after = sessions.get(&session.id).unwrap();
        assert!(!after.submitting);
        assert_eq!(after.slots, session.slots);
        assert!(sessions.begin_submit(&session.id).is_ok());
    }

    #[test]
    fn test_dropped_submission_is_released() {
        let sessions = ImportSessions::new();
        let session = sessions.create(Branch::It, parsed("Days,1\nMonday,A (101)\n"));

        drop(sessions.begin_submit(&session.id).unwrap());

        assert!(!sessions.get(&session.id).unwrap().submitting);
    }

    #[test]
    fn test_submit_refuses_invalid_rows() {
        let sessions = ImportSessions::new();
        let session = sessions.create(
            Branch::Mech,
            parsed("Days,1,2\nMonday,A (101),Seminar (Annex-B)\n"),
        );
        assert_eq!(
            sessions.begin_submit(&session.id).err(),
            Some(SessionError::InvalidRows(1))
        );
        assert!(!sessions.get(&session.id).unwrap().submitting);
    }

    #[test]
    fn test_submit_with_nothing_valid() {
        let sessions = ImportSessions::new();
        let session = sessions.create(Branch::Civil, parsed("Days,1\nMonday,Library\n"));
        assert_eq!(
            sessions.begin_submit(&session.id).err(),
            Some(SessionError::NothingToImport)
        );
    }

    #[test]
    fn test_expired_session_is_gone() {
        let sessions = ImportSessions::with_ttl(Duration::zero());
        let session = sessions.create(Branch::Cse, parsed("Days,1\nMonday,A (101)\n"));

        assert!(sessions.get(&session.id).is_none());
        assert_eq!(
            sessions.begin_submit(&session.id).err(),
            Some(SessionError::NotFound)
        );
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_submitting_session_does_not_expire() {
        let sessions = ImportSessions::with_ttl(Duration::zero());
        let session = sessions.create(Branch::Cse, parsed("Days,1\nMonday,A (101)\n"));
        // Flip the flag directly; begin_submit would evict the session first.
        sessions.entries.get_mut(&session.id).unwrap().submitting = true;

        assert_eq!(sessions.purge_expired(), 0);
        assert!(sessions.get(&session.id).unwrap().submitting);
    }

    #[test]
    fn test_create_purges_abandoned_sessions() {
        let sessions = ImportSessions::with_ttl(Duration::zero());
        sessions.create(Branch::Ece, parsed("Days,1\nMonday,A (101)\n"));
        sessions.create(Branch::Ece, parsed("Days,1\nMonday,A (101)\n"));
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn test_fresh_session_survives_purge() {
        let sessions = ImportSessions::new();
        let session = sessions.create(Branch::It, parsed("Days,1\nMonday,A (101)\n"));
        assert_eq!(sessions.purge_expired(), 0);
        assert!(sessions.get(&session.id).is_some());
    }

    #[test]
    fn test_unknown_and_discarded_sessions() {
        let sessions = ImportSessions::new();
        assert_eq!(
            sessions.begin_submit(&Uuid::new_v4()).err(),
            Some(SessionError::NotFound)
        );
        let session = sessions.create(Branch::Eee, parsed("Days,1\nMonday,A (101)\n"));
        assert_eq!(sessions.len(), 1);
        assert!(sessions.discard(&session.id));
        assert!(!sessions.discard(&session.id));
    }
}
