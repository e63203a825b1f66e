//! Review system state.
//!
//! [`ReviewApi`] is the seam to a code-review system. [`GerritClient`] talks
//! to Gerrit's REST API; [`ReviewStateReader`] adds retries and a per-run memo
//! on top of any implementation, and is what the migrator consults before
//! transforming a change.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use log::debug;
use reqwest::blocking::Client;
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::error::{Error, ErrorClass, Result};
use crate::retry::RetryPolicy;

/// Environment variable holding the review system user name.
pub const USER_ENV: &str = "CHANGEPORT_REVIEW_USER";
/// Environment variable holding the review system password or HTTP token.
pub const PASSWORD_ENV: &str = "CHANGEPORT_REVIEW_PASSWORD";

const XSSI_PREFIX: &str = ")]}'";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Remote status of a change under review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    New,
    Merged,
    Abandoned,
}

impl ReviewStatus {
    /// Merged and abandoned changes must not be migrated again.
    pub fn is_closed(self) -> bool {
        matches!(self, ReviewStatus::Merged | ReviewStatus::Abandoned)
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewStatus::New => write!(f, "NEW"),
            ReviewStatus::Merged => write!(f, "MERGED"),
            ReviewStatus::Abandoned => write!(f, "ABANDONED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountInfo {
    #[serde(rename = "_account_id")]
    pub account_id: Option<u64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApprovalInfo {
    #[serde(flatten)]
    pub account: AccountInfo,
    pub value: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LabelInfo {
    pub approved: Option<AccountInfo>,
    pub rejected: Option<AccountInfo>,
    pub recommended: Option<AccountInfo>,
    pub disliked: Option<AccountInfo>,
    pub value: Option<i32>,
    pub default_value: Option<i32>,
    pub all: Option<Vec<ApprovalInfo>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChangeMessage {
    pub id: String,
    pub author: Option<AccountInfo>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub date: Option<DateTime<Utc>>,
    pub message: Option<String>,
    #[serde(rename = "_revision_number")]
    pub revision_number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RevisionInfo {
    pub kind: Option<String>,
    #[serde(rename = "_number")]
    pub number: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created: Option<DateTime<Utc>>,
    pub uploader: Option<AccountInfo>,
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
}

/// Read-only snapshot of a change in the review system.
///
/// Fields the server did not return stay `None`: absence means "not
/// requested", never "empty".
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReviewRecord {
    pub id: String,
    pub status: ReviewStatus,
    pub project: Option<String>,
    pub branch: Option<String>,
    pub topic: Option<String>,
    pub change_id: Option<String>,
    pub subject: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub submitted: Option<DateTime<Utc>>,
    #[serde(rename = "_number")]
    pub number: Option<u64>,
    pub owner: Option<AccountInfo>,
    pub labels: Option<BTreeMap<String, LabelInfo>>,
    pub messages: Option<Vec<ChangeMessage>>,
    pub current_revision: Option<String>,
    pub revisions: Option<BTreeMap<String, RevisionInfo>>,
    pub reviewers: Option<BTreeMap<String, Vec<AccountInfo>>>,
    #[serde(rename = "_more_changes")]
    pub more_changes: Option<bool>,
}

/// Gerrit timestamps look like `2013-02-01 09:59:32.126000000` and are UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(value) => NaiveDateTime::parse_from_str(&value, TIMESTAMP_FORMAT)
            .map(|naive| Some(naive.and_utc()))
            .map_err(serde::de::Error::custom),
    }
}

/// Parse a change-info JSON body, tolerating the anti-XSSI prefix.
pub fn parse_record(body: &str) -> Result<ReviewRecord> {
    let json = body.trim_start().strip_prefix(XSSI_PREFIX).unwrap_or(body);
    Ok(serde_json::from_str(json)?)
}

/// Read access to a review system.
pub trait ReviewApi {
    /// Fetch the current state of change `id`. `Ok(None)` means the review
    /// system does not know the change.
    fn get_change(&self, id: &str) -> Result<Option<ReviewRecord>>;
}

/// Gerrit REST client.
#[derive(Clone)]
pub struct GerritClient {
    base_url: Url,
    client: Client,
    auth: Option<(String, String)>,
}

impl fmt::Debug for GerritClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GerritClient")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth.as_ref().map(|(user, _)| (user, "[REDACTED]")))
            .finish()
    }
}

impl GerritClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url,
            client,
            auth: None,
        })
    }

    /// Create a client, picking up basic auth from the environment if set.
    pub fn from_env(base_url: &str) -> Result<Self> {
        let client = Self::new(base_url)?;
        match (std::env::var(USER_ENV), std::env::var(PASSWORD_ENV)) {
            (Ok(user), Ok(password)) => Ok(client.with_basic_auth(user, password)),
            _ => Ok(client),
        }
    }

    pub fn with_basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some((user.into(), password.into()));
        self
    }

    fn change_url(&self, id: &str) -> Result<Url> {
        // Authenticated requests go through Gerrit's `/a/` prefix.
        let prefix = if self.auth.is_some() { "a/changes/" } else { "changes/" };
        let mut url = self.base_url.join(prefix)?;
        url.path_segments_mut()
            .map_err(|_| Error::ReviewLookup {
                id: id.to_string(),
                class: ErrorClass::Permanent,
                message: format!("Review URL {} cannot have a path", self.base_url),
            })?
            .pop_if_empty()
            .push(id);
        url.query_pairs_mut()
            .append_pair("o", "LABELS")
            .append_pair("o", "DETAILED_ACCOUNTS")
            .append_pair("o", "CURRENT_REVISION")
            .append_pair("o", "MESSAGES");
        Ok(url)
    }
}

impl ReviewApi for GerritClient {
    fn get_change(&self, id: &str) -> Result<Option<ReviewRecord>> {
        let url = self.change_url(id)?;
        debug!("GET {}", url);
        let mut request = self.client.get(url);
        if let Some((user, password)) = &self.auth {
            request = request.basic_auth(user, Some(password));
        }

        let lookup_error = |class: ErrorClass, message: String| Error::ReviewLookup {
            id: id.to_string(),
            class,
            message,
        };

        let response = request
            .send()
            .map_err(|e| lookup_error(ErrorClass::Transient, format!("HTTP request failed: {}", e)))?;
        let status = response.status();
        let body = response.text().unwrap_or_default();

        if status.as_u16() == 404 {
            return Ok(None);
        }
        if status.is_success() {
            return parse_record(&body)
                .map(Some)
                .map_err(|e| lookup_error(ErrorClass::Permanent, format!("Invalid response: {}", e)));
        }

        let class = if status.as_u16() == 429 || status.is_server_error() {
            ErrorClass::Transient
        } else {
            ErrorClass::Permanent
        };
        let detail = body.trim();
        let message = if detail.is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            format!("HTTP {}: {}", status.as_u16(), detail)
        };
        Err(lookup_error(class, message))
    }
}

/// Retrying, memoizing reader over a [`ReviewApi`].
///
/// The memo lives for one run; [`discard_memo`](Self::discard_memo) is called
/// when the run ends.
pub struct ReviewStateReader {
    api: Box<dyn ReviewApi>,
    retry: RetryPolicy,
    memo: HashMap<String, Option<ReviewRecord>>,
}

impl ReviewStateReader {
    pub fn new(api: Box<dyn ReviewApi>, retry: RetryPolicy) -> Self {
        Self {
            api,
            retry,
            memo: HashMap::new(),
        }
    }

    /// Current state of `id`, at most one successful network call per run.
    ///
    /// Transient failures are retried; once the budget is exhausted the error
    /// is returned as a [`Error::ReviewLookup`].
    pub fn fetch(&mut self, id: &str) -> Result<Option<ReviewRecord>> {
        if let Some(record) = self.memo.get(id) {
            return Ok(record.clone());
        }
        let api = &self.api;
        let record = self
            .retry
            .run(&format!("Review lookup for {}", id), || api.get_change(id))
            .map_err(|e| match e {
                Error::ReviewLookup { .. } => e,
                other => Error::ReviewLookup {
                    id: id.to_string(),
                    class: other.class(),
                    message: other.to_string(),
                },
            })?;
        self.memo.insert(id.to_string(), record.clone());
        Ok(record)
    }

    pub fn discard_memo(&mut self) {
        self.memo.clear();
    }
}

impl fmt::Debug for ReviewStateReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewStateReader")
            .field("retry", &self.retry)
            .field("memoized", &self.memo.len())
            .finish()
    }
}
