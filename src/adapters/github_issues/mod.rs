//! GitHub Issues adapter.

mod client;
mod models;
mod tracker;

pub use client::{GithubClient, GithubClientConfig};
pub use tracker::GithubIssueTracker;
