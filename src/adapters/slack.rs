use crate::domain::model::{Batch, DeliveryTarget, FileUpload};
use crate::domain::ports::Deliver;
use crate::utils::error::{Result, SlackcatError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://slack.com/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_ATTEMPTS: u32 = 3;
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);
const PAGE_LIMIT: &str = "200";

#[derive(Debug, Deserialize)]
struct Envelope {
    ok: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Named {
    id: String,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct ChannelPage {
    #[serde(default)]
    channels: Vec<Named>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
struct UserPage {
    #[serde(default)]
    members: Vec<Named>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
struct OpenedConversation {
    channel: ChannelId,
}

#[derive(Debug, Deserialize)]
struct ChannelId {
    id: String,
}

#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadTicket {
    upload_url: String,
    file_id: String,
}

#[derive(Debug, Serialize)]
struct UploadedFile<'a> {
    id: &'a str,
    title: &'a str,
}

#[derive(Debug, Serialize)]
struct CompleteUpload<'a> {
    files: [UploadedFile<'a>; 1],
    channel_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    initial_comment: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct OpenConversation<'a> {
    users: &'a str,
}

/// Thin Slack Web API client. Every call checks both the HTTP status and the
/// `ok` flag Slack puts in its JSON body.
#[derive(Debug, Clone)]
pub struct SlackClient {
    http: Client,
    base_url: String,
}

impl SlackClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("slackcat/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// Sends a request, honouring `Retry-After` on HTTP 429. `build` is called
    /// once per attempt because multipart bodies cannot be cloned.
    async fn call<T, F>(&self, method: &str, token: &str, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut attempt = 1;
        loop {
            let response = build(&self.http).bearer_auth(token).send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_ATTEMPTS {
                let wait = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(Duration::from_secs(1))
                    .min(MAX_RETRY_AFTER);
                tracing::warn!("{} rate limited, retrying in {:?}", method, wait);
                tokio::time::sleep(wait).await;
                attempt += 1;
                continue;
            }

            let text = response.text().await?;
            if !status.is_success() {
                return Err(SlackcatError::transport(format!(
                    "{} returned HTTP {}",
                    method, status
                )));
            }

            let envelope: Envelope = serde_json::from_str(&text)?;
            if !envelope.ok {
                return Err(SlackcatError::Api {
                    method: method.to_string(),
                    error: envelope.error.unwrap_or_else(|| "unknown_error".to_string()),
                });
            }
            tracing::debug!("{} ok", method);
            return Ok(serde_json::from_str(&text)?);
        }
    }

    pub async fn post_message(&self, target: &DeliveryTarget, text: &str) -> Result<()> {
        let url = self.url("chat.postMessage");
        let _: IgnoredAny = self
            .call("chat.postMessage", &target.token, |http| {
                http.post(&url).json(&PostMessage {
                    channel: &target.channel,
                    text,
                })
            })
            .await?;
        Ok(())
    }

    /// Uploads a snippet with Slack's external upload flow: reserve an
    /// upload URL, send the bytes there, then share the file in the channel.
    pub async fn upload_file(&self, target: &DeliveryTarget, upload: &FileUpload) -> Result<()> {
        let url = self.url("files.getUploadURLExternal");
        let mut params = vec![
            ("filename", upload.filename.clone()),
            ("length", upload.content.len().to_string()),
        ];
        if let Some(filetype) = &upload.filetype {
            params.push(("snippet_type", filetype.clone()));
        }
        let ticket: UploadTicket = self
            .call("files.getUploadURLExternal", &target.token, |http| {
                http.post(&url).form(&params)
            })
            .await?;

        self.send_file_bytes(&ticket.upload_url, upload).await?;

        let url = self.url("files.completeUploadExternal");
        let _: IgnoredAny = self
            .call("files.completeUploadExternal", &target.token, |http| {
                http.post(&url).json(&CompleteUpload {
                    files: [UploadedFile {
                        id: &ticket.file_id,
                        title: &upload.filename,
                    }],
                    channel_id: &target.channel,
                    initial_comment: upload.comment.as_deref(),
                })
            })
            .await?;
        tracing::debug!("shared file {} in {}", ticket.file_id, target.channel);
        Ok(())
    }

    /// The upload URL is pre-signed and answers in plain text, not the
    /// usual JSON envelope.
    async fn send_file_bytes(&self, upload_url: &str, upload: &FileUpload) -> Result<()> {
        let part = reqwest::multipart::Part::bytes(upload.content.clone())
            .file_name(upload.filename.clone());
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self.http.post(upload_url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SlackcatError::transport(format!(
                "file upload returned HTTP {}: {}",
                status,
                body.trim()
            )));
        }
        Ok(())
    }

    /// Maps a user-supplied channel to a conversation ID.
    ///
    /// IDs pass through untouched, `#name` and `name` are looked up among
    /// public and private channels, `@user` opens a direct message.
    pub async fn resolve_channel(&self, token: &str, channel: &str) -> Result<String> {
        if looks_like_id(channel) {
            return Ok(channel.to_string());
        }
        if let Some(user) = channel.strip_prefix('@') {
            let user_id = self.find_user(token, user).await?;
            return self.open_direct_message(token, &user_id).await;
        }
        let name = channel.trim_start_matches('#');
        self.find_channel(token, name).await
    }

    async fn find_channel(&self, token: &str, name: &str) -> Result<String> {
        let url = self.url("conversations.list");
        let mut cursor = String::new();
        loop {
            let page: ChannelPage = self
                .call("conversations.list", token, |http| {
                    http.get(&url).query(&[
                        ("types", "public_channel,private_channel"),
                        ("exclude_archived", "true"),
                        ("limit", PAGE_LIMIT),
                        ("cursor", cursor.as_str()),
                    ])
                })
                .await?;

            if let Some(found) = page.channels.into_iter().find(|c| c.name == name) {
                tracing::debug!("resolved #{} to {}", name, found.id);
                return Ok(found.id);
            }
            if page.response_metadata.next_cursor.is_empty() {
                return Err(SlackcatError::config(format!("no such channel: {}", name)));
            }
            cursor = page.response_metadata.next_cursor;
        }
    }

    async fn find_user(&self, token: &str, name: &str) -> Result<String> {
        let url = self.url("users.list");
        let mut cursor = String::new();
        loop {
            let page: UserPage = self
                .call("users.list", token, |http| {
                    http.get(&url)
                        .query(&[("limit", PAGE_LIMIT), ("cursor", cursor.as_str())])
                })
                .await?;

            if let Some(found) = page.members.into_iter().find(|u| u.name == name) {
                return Ok(found.id);
            }
            if page.response_metadata.next_cursor.is_empty() {
                return Err(SlackcatError::config(format!("no such user: {}", name)));
            }
            cursor = page.response_metadata.next_cursor;
        }
    }

    async fn open_direct_message(&self, token: &str, user_id: &str) -> Result<String> {
        let url = self.url("conversations.open");
        let opened: OpenedConversation = self
            .call("conversations.open", token, |http| {
                http.post(&url).json(&OpenConversation { users: user_id })
            })
            .await?;
        Ok(opened.channel.id)
    }
}

fn looks_like_id(channel: &str) -> bool {
    let mut chars = channel.chars();
    matches!(chars.next(), Some('C' | 'G' | 'D'))
        && channel.len() >= 9
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// Delivers to one resolved Slack conversation.
#[derive(Debug, Clone)]
pub struct SlackSender {
    client: SlackClient,
    target: DeliveryTarget,
}

impl SlackSender {
    pub fn new(client: SlackClient, target: DeliveryTarget) -> Self {
        Self { client, target }
    }
}

#[async_trait]
impl Deliver for SlackSender {
    async fn send_batch(&self, batch: &Batch) -> Result<()> {
        self.client.post_message(&self.target, &batch.text()).await
    }

    async fn upload_file(&self, upload: &FileUpload) -> Result<()> {
        self.client.upload_file(&self.target, upload).await
    }

    fn channel(&self) -> &str {
        &self.target.channel
    }
}
