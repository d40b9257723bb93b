use std::collections::HashMap;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{error, info};
use url::Url;

use crate::throttle::{Endpoint, Throttle};
use crate::{AppError, Result};

/// Display name used when a user has no real name or is missing from the
/// directory.
pub const UNKNOWN_USER: &str = "Unknown User";

const USER_AGENT: &str = concat!("sheet-links/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserRecord {
    pub id: String,
    #[serde(default)]
    pub real_name: Option<String>,
}

/// An IM channel and the id of the user on the other side.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DirectConversation {
    pub id: String,
    #[serde(default)]
    pub user: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub text: Option<String>,
}

impl Message {
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

/// Outcome of a remote fetch that may have stopped early.
///
/// `Partial` carries whatever was collected before the failing call, which
/// for single-call fetches is an empty collection.
#[derive(Debug)]
pub enum Fetched<T> {
    Complete(T),
    Partial { items: T, error: AppError },
}

impl<T> Fetched<T> {
    pub fn items(&self) -> &T {
        match self {
            Fetched::Complete(items) => items,
            Fetched::Partial { items, .. } => items,
        }
    }

    pub fn into_items(self) -> T {
        match self {
            Fetched::Complete(items) => items,
            Fetched::Partial { items, .. } => items,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Fetched::Complete(_))
    }

    pub fn error(&self) -> Option<&AppError> {
        match self {
            Fetched::Complete(_) => None,
            Fetched::Partial { error, .. } => Some(error),
        }
    }
}

/// The three Slack Web API methods the extractor depends on.
pub trait SlackApi {
    fn users_list(&self, limit: u16, cursor: Option<&str>) -> Result<Page<UserRecord>>;

    fn direct_conversations(
        &self,
        limit: u16,
        cursor: Option<&str>,
    ) -> Result<Page<DirectConversation>>;

    fn conversation_history(&self, channel_id: &str, limit: u16) -> Result<Vec<Message>>;
}

#[derive(Deserialize)]
struct ApiStatus {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize, Default)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct UsersListResponse {
    #[serde(default)]
    members: Vec<UserRecord>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Deserialize)]
struct UsersConversationsResponse {
    #[serde(default)]
    channels: Vec<DirectConversation>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    messages: Vec<Message>,
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    let status: ApiStatus =
        serde_json::from_str(body).map_err(|e| AppError::JsonParse(e.to_string()))?;
    if !status.ok {
        return Err(AppError::SlackApi(
            status.error.unwrap_or_else(|| "unknown_error".to_string()),
        ));
    }
    serde_json::from_str(body).map_err(|e| AppError::JsonParse(e.to_string()))
}

fn next_cursor(meta: Option<ResponseMetadata>) -> Option<String> {
    meta.and_then(|m| m.next_cursor).filter(|c| !c.is_empty())
}

pub fn parse_users_page(body: &str) -> Result<Page<UserRecord>> {
    let response: UsersListResponse = decode(body)?;
    Ok(Page {
        items: response.members,
        next_cursor: next_cursor(response.response_metadata),
    })
}

pub fn parse_conversations_page(body: &str) -> Result<Page<DirectConversation>> {
    let response: UsersConversationsResponse = decode(body)?;
    Ok(Page {
        items: response.channels,
        next_cursor: next_cursor(response.response_metadata),
    })
}

pub fn parse_history(body: &str) -> Result<Vec<Message>> {
    let response: HistoryResponse = decode(body)?;
    Ok(response.messages)
}

/// Blocking Slack Web API client authenticated with a user token.
pub struct WebClient {
    http: Client,
    token: String,
    base_url: Url,
}

impl WebClient {
    pub fn new(token: &str, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::InvalidConfig(format!("api base url: {}", e)))?;
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::Http(e.to_string()))?;

        Ok(Self {
            http,
            token: token.to_string(),
            base_url,
        })
    }

    pub fn method_url(&self, method: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut url = self
            .base_url
            .join(method)
            .map_err(|e| AppError::InvalidConfig(format!("{}: {}", method, e)))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    fn call(&self, method: &str, params: &[(&str, String)]) -> Result<String> {
        let url = self.method_url(method, params)?;

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| AppError::Http(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(1);
            return Err(AppError::SlackRateLimit { retry_after_secs });
        }
        if !status.is_success() {
            return Err(AppError::SlackApi(format!("HTTP {}", status)));
        }

        response.text().map_err(|e| AppError::Http(e.to_string()))
    }
}

fn paging_params(limit: u16, cursor: Option<&str>) -> Vec<(&'static str, String)> {
    let mut params = vec![("limit", limit.to_string())];
    if let Some(cursor) = cursor {
        params.push(("cursor", cursor.to_string()));
    }
    params
}

impl SlackApi for WebClient {
    fn users_list(&self, limit: u16, cursor: Option<&str>) -> Result<Page<UserRecord>> {
        let body = self.call(Endpoint::UsersList.method(), &paging_params(limit, cursor))?;
        parse_users_page(&body)
    }

    fn direct_conversations(
        &self,
        limit: u16,
        cursor: Option<&str>,
    ) -> Result<Page<DirectConversation>> {
        let mut params = vec![("types", "im".to_string())];
        params.extend(paging_params(limit, cursor));
        let body = self.call(Endpoint::UsersConversations.method(), &params)?;
        parse_conversations_page(&body)
    }

    fn conversation_history(&self, channel_id: &str, limit: u16) -> Result<Vec<Message>> {
        let params = [
            ("channel", channel_id.to_string()),
            ("limit", limit.to_string()),
        ];
        let body = self.call(Endpoint::ConversationsHistory.method(), &params)?;
        parse_history(&body)
    }
}

/// Walks a cursor-paginated listing, handing each page's items to `sink`.
/// Returns the error that stopped the walk, if any.
fn paginate<T, F, S>(
    throttle: &mut Throttle<'_>,
    endpoint: Endpoint,
    mut fetch_page: F,
    mut sink: S,
) -> Option<AppError>
where
    F: FnMut(Option<&str>) -> Result<Page<T>>,
    S: FnMut(Vec<T>),
{
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        throttle.wait(endpoint);
        match fetch_page(cursor.as_deref()) {
            Ok(page) => {
                pages += 1;
                info!(
                    "{}: page {} with {} entries",
                    endpoint.method(),
                    pages,
                    page.items.len()
                );
                sink(page.items);
                match page.next_cursor {
                    Some(next) => cursor = Some(next),
                    None => return None,
                }
            }
            Err(e) => return Some(e),
        }
    }
}

/// Loads every user id with its display name, falling back to
/// [`UNKNOWN_USER`] for users without a real name.
pub fn load_user_directory(
    api: &dyn SlackApi,
    throttle: &mut Throttle<'_>,
    page_size: u16,
) -> Fetched<HashMap<String, String>> {
    let mut names = HashMap::new();

    let failure = paginate(
        throttle,
        Endpoint::UsersList,
        |cursor| api.users_list(page_size, cursor),
        |members| {
            for user in members {
                let name = user.real_name.unwrap_or_else(|| UNKNOWN_USER.to_string());
                names.insert(user.id, name);
            }
        },
    );

    match failure {
        None => Fetched::Complete(names),
        Some(error) => {
            error!("Error fetching user list: {}", error);
            Fetched::Partial {
                items: names,
                error,
            }
        }
    }
}

pub fn list_direct_conversations(
    api: &dyn SlackApi,
    throttle: &mut Throttle<'_>,
    page_size: u16,
) -> Fetched<Vec<DirectConversation>> {
    let mut conversations = Vec::new();

    let failure = paginate(
        throttle,
        Endpoint::UsersConversations,
        |cursor| api.direct_conversations(page_size, cursor),
        |channels| conversations.extend(channels),
    );

    match failure {
        None => Fetched::Complete(conversations),
        Some(error) => {
            error!("Error fetching conversation list: {}", error);
            Fetched::Partial {
                items: conversations,
                error,
            }
        }
    }
}

/// Fetches up to `limit` of the most recent messages in a channel. A failed
/// call is logged and reported as a partial, empty history.
pub fn fetch_history(
    api: &dyn SlackApi,
    throttle: &mut Throttle<'_>,
    channel_id: &str,
    limit: u16,
) -> Fetched<Vec<Message>> {
    throttle.wait(Endpoint::ConversationsHistory);
    match api.conversation_history(channel_id, limit) {
        Ok(messages) => Fetched::Complete(messages),
        Err(error) => {
            error!("Error fetching history for channel {}: {}", channel_id, error);
            Fetched::Partial {
                items: Vec::new(),
                error,
            }
        }
    }
}
