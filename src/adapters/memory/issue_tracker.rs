//! Scriptable issue tracker double.
//!
//! Keeps issues in memory and can be told to fail: `fail_next` and
//! `reject_next` consume one scripted error per call, `set_unreachable`
//! fails every call until switched off.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::models::IssueRef;
use crate::domain::ports::{IssueState, IssueTracker, TrackerError, TrackerResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteIssue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub state: IssueState,
    pub labels: Vec<String>,
    pub comments: Vec<String>,
}

#[derive(Debug, Default)]
struct TrackerState {
    issues: BTreeMap<u64, RemoteIssue>,
    next_number: u64,
    transient_failures: usize,
    permanent_failures: usize,
    unreachable: bool,
    calls: usize,
}

#[derive(Debug, Default)]
pub struct InMemoryIssueTracker {
    state: Mutex<TrackerState>,
}

impl InMemoryIssueTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The next `n` calls fail with a transient error.
    pub fn fail_next(&self, n: usize) {
        self.lock().transient_failures = n;
    }

    /// The next `n` calls fail with a permanent error.
    pub fn reject_next(&self, n: usize) {
        self.lock().permanent_failures = n;
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    pub fn issue_count(&self) -> usize {
        self.lock().issues.len()
    }

    pub fn comment_count(&self) -> usize {
        self.lock().issues.values().map(|i| i.comments.len()).sum()
    }

    /// Total calls received, failed ones included.
    pub fn call_count(&self) -> usize {
        self.lock().calls
    }

    pub fn issue(&self, external_id: &str) -> Option<RemoteIssue> {
        let number = external_id.parse::<u64>().ok()?;
        self.lock().issues.get(&number).cloned()
    }

    pub fn issues(&self) -> Vec<RemoteIssue> {
        self.lock().issues.values().cloned().collect()
    }

    /// Count a call and apply any scripted failure.
    fn enter(&self) -> TrackerResult<MutexGuard<'_, TrackerState>> {
        let mut state = self.lock();
        state.calls += 1;
        if state.unreachable {
            return Err(TrackerError::Transient("connection refused".to_string()));
        }
        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(TrackerError::Transient("503 service unavailable".to_string()));
        }
        if state.permanent_failures > 0 {
            state.permanent_failures -= 1;
            return Err(TrackerError::Permanent("422 validation failed".to_string()));
        }
        Ok(state)
    }
}

fn lookup<'a>(
    state: &'a mut TrackerState,
    external_id: &str,
) -> TrackerResult<&'a mut RemoteIssue> {
    external_id
        .parse::<u64>()
        .ok()
        .and_then(|number| state.issues.get_mut(&number))
        .ok_or_else(|| TrackerError::Permanent(format!("404 issue {external_id} not found")))
}

#[async_trait]
impl IssueTracker for InMemoryIssueTracker {
    async fn create_issue(&self, title: &str, body: &str) -> TrackerResult<IssueRef> {
        let mut state = self.enter()?;
        state.next_number += 1;
        let number = state.next_number;
        state.issues.insert(
            number,
            RemoteIssue {
                number,
                title: title.to_string(),
                body: body.to_string(),
                state: IssueState::Open,
                labels: Vec::new(),
                comments: Vec::new(),
            },
        );
        Ok(IssueRef::new(number.to_string()).with_url(format!("memory://issues/{number}")))
    }

    async fn update_issue(
        &self,
        external_id: &str,
        issue_state: IssueState,
        labels: &[String],
    ) -> TrackerResult<()> {
        let mut state = self.enter()?;
        let issue = lookup(&mut state, external_id)?;
        issue.state = issue_state;
        issue.labels = labels.to_vec();
        Ok(())
    }

    async fn add_comment(&self, external_id: &str, body: &str) -> TrackerResult<()> {
        let mut state = self.enter()?;
        lookup(&mut state, external_id)?
            .comments
            .push(body.to_string());
        Ok(())
    }

    async fn get_issue(&self, external_id: &str) -> TrackerResult<IssueState> {
        let mut state = self.enter()?;
        Ok(lookup(&mut state, external_id)?.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_failures_are_consumed() {
        let tracker = InMemoryIssueTracker::new();
        tracker.fail_next(1);
        tracker.reject_next(1);

        let first = tracker.create_issue("a", "").await.unwrap_err();
        assert!(first.is_transient());
        let second = tracker.create_issue("a", "").await.unwrap_err();
        assert!(!second.is_transient());
        let issue = tracker.create_issue("a", "").await.unwrap();
        assert_eq!(issue.external_id, "1");
        assert_eq!(tracker.call_count(), 3);
    }

    #[tokio::test]
    async fn test_unknown_issue_is_permanent() {
        let tracker = InMemoryIssueTracker::new();
        let err = tracker.get_issue("99").await.unwrap_err();
        assert!(!err.is_transient());
    }
}
