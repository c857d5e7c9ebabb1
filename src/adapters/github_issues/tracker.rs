use async_trait::async_trait;
use reqwest::Method;

use super::client::{GithubClient, GithubClientConfig};
use super::models::{CommentRequest, CreateIssueRequest, IssueResponse, UpdateIssueRequest};
use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::models::{IssueRef, TrackerConfig};
use crate::domain::ports::{IssueState, IssueTracker, TrackerError, TrackerResult};

/// [`IssueTracker`] backed by one GitHub repository.
pub struct GithubIssueTracker {
    client: GithubClient,
    owner: String,
    repo: String,
}

impl GithubIssueTracker {
    pub fn new(client: GithubClient, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            client,
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    pub fn from_config(config: &TrackerConfig) -> DomainResult<Self> {
        if config.owner.is_empty() || config.repo.is_empty() {
            return Err(OrchestrationError::Validation(
                "tracker.owner and tracker.repo are required for issue sync".to_string(),
            ));
        }
        let client = GithubClient::new(GithubClientConfig::from_tracker(config)?)?;
        Ok(Self::new(client, &config.owner, &config.repo))
    }

    fn issues_path(&self) -> String {
        format!("/repos/{}/{}/issues", self.owner, self.repo)
    }

    fn issue_path(&self, external_id: &str) -> TrackerResult<String> {
        let number: u64 = external_id
            .parse()
            .map_err(|_| TrackerError::Permanent(format!("not an issue number: {external_id}")))?;
        Ok(format!("{}/{number}", self.issues_path()))
    }
}

#[async_trait]
impl IssueTracker for GithubIssueTracker {
    async fn create_issue(&self, title: &str, body: &str) -> TrackerResult<IssueRef> {
        let created: IssueResponse = self
            .client
            .send_json(
                Method::POST,
                &self.issues_path(),
                Some(&CreateIssueRequest { title, body }),
            )
            .await?;
        let issue = IssueRef::new(created.number.to_string());
        Ok(match created.html_url {
            Some(url) => issue.with_url(url),
            None => issue,
        })
    }

    async fn update_issue(
        &self,
        external_id: &str,
        state: IssueState,
        labels: &[String],
    ) -> TrackerResult<()> {
        let body = UpdateIssueRequest {
            state: state.as_str(),
            labels,
        };
        self.client
            .send(Method::PATCH, &self.issue_path(external_id)?, Some(&body))
            .await?;
        Ok(())
    }

    async fn add_comment(&self, external_id: &str, body: &str) -> TrackerResult<()> {
        let path = format!("{}/comments", self.issue_path(external_id)?);
        self.client
            .send(Method::POST, &path, Some(&CommentRequest { body }))
            .await?;
        Ok(())
    }

    async fn get_issue(&self, external_id: &str) -> TrackerResult<IssueState> {
        let issue: IssueResponse = self
            .client
            .send_json::<(), _>(Method::GET, &self.issue_path(external_id)?, None)
            .await?;
        Ok(if issue.state == "closed" {
            IssueState::Closed
        } else {
            IssueState::Open
        })
    }
}
