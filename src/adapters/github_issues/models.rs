//! Wire types for the GitHub REST issues endpoints.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct CreateIssueRequest<'a> {
    pub title: &'a str,
    pub body: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateIssueRequest<'a> {
    pub state: &'a str,
    pub labels: &'a [String],
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentRequest<'a> {
    pub body: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueResponse {
    pub number: u64,
    #[serde(default)]
    pub html_url: Option<String>,
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub message: String,
}
