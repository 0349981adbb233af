use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{message_path, MessageMirror, MirrorDocument, MirrorReceipt};
use crate::config::GithubConfig;
use crate::message::Message;

const USER_AGENT: &str = concat!("msgmirror/", env!("CARGO_PKG_VERSION"));
const API_VERSION: &str = "2022-11-28";

/// Mirrors messages into a GitHub repository through the REST contents API.
pub struct GithubMirror {
    client: reqwest::Client,
    config: GithubConfig,
}

#[derive(Debug, Serialize)]
struct PutContentsRequest<'a> {
    message: String,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct PutContentsResponse {
    #[serde(default)]
    content: Option<ContentInfo>,
    commit: CommitInfo,
}

#[derive(Debug, Deserialize)]
struct ContentInfo {
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommitInfo {
    sha: String,
}

impl GithubMirror {
    pub fn new(config: GithubConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build GitHub HTTP client")?;
        info!(
            "GitHub mirror configured: repo={}, branch={}, dir={}",
            config.repository, config.branch, config.messages_dir
        );
        Ok(Self { client, config })
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.repository,
            path
        )
    }

    /// Browsable link used when the API response carries none.
    fn blob_url(&self, path: &str) -> String {
        format!(
            "https://github.com/{}/blob/{}/{}",
            self.config.repository, self.config.branch, path
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.config.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// Current file at `path` on the configured branch, or None if absent.
    async fn get_contents(&self, path: &str) -> Result<Option<ContentsResponse>> {
        let url = self.contents_url(path);
        debug!("Fetching GitHub contents: {}", url);

        let response = self
            .request(reqwest::Method::GET, &url)
            .query(&[("ref", self.config.branch.as_str())])
            .send()
            .await
            .context("Failed to send request to GitHub")?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("GitHub API error ({}): {}", status, error_body);
        }

        let contents: ContentsResponse = response
            .json()
            .await
            .context("Failed to parse GitHub contents response")?;
        Ok(Some(contents))
    }
}

#[async_trait]
impl MessageMirror for GithubMirror {
    async fn push(&self, message: &Message) -> Result<MirrorReceipt> {
        let at = message.timestamp_utc()?;
        let path = message_path(&self.config.messages_dir, message.id, at);
        let document = MirrorDocument::from(message).to_json()?;

        // Update when the file is already there, otherwise create it.
        let existing_sha = self
            .get_contents(&path)
            .await
            .with_context(|| format!("Failed to look up {}", path))?
            .map(|c| c.sha);

        let request = PutContentsRequest {
            message: format!("Add message {}", message.id),
            content: STANDARD.encode(document.as_bytes()),
            branch: &self.config.branch,
            sha: existing_sha,
        };
        let updating = request.sha.is_some();

        let response = self
            .request(reqwest::Method::PUT, &self.contents_url(&path))
            .json(&request)
            .send()
            .await
            .context("Failed to send request to GitHub")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to push message to GitHub ({}): {}", status, error_body);
        }

        let put: PutContentsResponse = response
            .json()
            .await
            .context("Failed to parse GitHub commit response")?;

        info!(
            "{} {} at commit {}",
            if updating { "Updated" } else { "Created" },
            path,
            put.commit.sha
        );

        let url = put
            .content
            .and_then(|c| c.html_url)
            .unwrap_or_else(|| self.blob_url(&path));

        Ok(MirrorReceipt {
            path,
            commit_sha: put.commit.sha,
            url,
        })
    }

    async fn fetch(&self, id: i64, timestamp: DateTime<Utc>) -> Result<Option<MirrorDocument>> {
        let path = message_path(&self.config.messages_dir, id, timestamp);
        let Some(contents) = self.get_contents(&path).await? else {
            return Ok(None);
        };

        // The API wraps base64 at 60 columns.
        let encoded: String = contents
            .content
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let raw = STANDARD
            .decode(encoded)
            .with_context(|| format!("Invalid base64 content in {}", path))?;
        let document = serde_json::from_slice(&raw)
            .with_context(|| format!("Invalid message JSON in {}", path))?;
        Ok(Some(document))
    }
}
