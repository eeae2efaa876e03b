//! Authenticated APIC session: token lifecycle plus the request layer every
//! extraction operation goes through.

use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, Method, Response, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::ApicConfig;
use crate::error::{AciError, AciResult};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// One authenticated session against one APIC.
///
/// The token is the only shared mutable state in the crate; it is guarded by
/// an async `RwLock` so that concurrent callers take a consistent snapshot
/// per outbound call and at most one login is ever in flight.
pub struct Session {
    http: Client,
    config: ApicConfig,
    state: RwLock<TokenState>
}

#[derive(Debug, Default)]
struct TokenState {
    token: Option<String>,
    last_login: Option<DateTime<Utc>>,
    /// Token lifetime in seconds, as declared by the APIC at login.
    refresh_timeout: Option<i64>
}

impl TokenState {
    /// A token is valid only if a login has occurred and the elapsed time
    /// since then is strictly less than the declared lifetime.
    fn is_valid(&self, now: DateTime<Utc>) -> bool {
        match (self.last_login, self.refresh_timeout) {
            (Some(last), Some(timeout)) => now - last < Duration::seconds(timeout),
            _ => false
        }
    }
}

#[derive(Debug, Deserialize)]
struct AaaLoginAttributes {
    token: String,
    #[serde(rename = "refreshTimeoutSeconds")]
    refresh_timeout_seconds: String
}

impl Session {
    pub fn new(config: ApicConfig) -> AciResult<Self> {
        let endpoint = config.base_uri.clone();
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| AciError::Connect { endpoint, source: e })?;

        Ok(Self {
            http,
            config,
            state: RwLock::new(TokenState::default())
        })
    }

    pub fn config(&self) -> &ApicConfig {
        &self.config
    }

    /// Log in unconditionally, replacing any current token.
    pub async fn login(&self) -> AciResult<()> {
        let mut state = self.state.write().await;
        self.login_locked(&mut state).await
    }

    /// Make sure the session token satisfies the validity invariant,
    /// logging in when it does not. The validity check is repeated under
    /// the write lock so concurrent callers never issue duplicate logins.
    pub async fn ensure_valid(&self) -> AciResult<()> {
        if self.state.read().await.is_valid(Utc::now()) {
            return Ok(());
        }
        let mut state = self.state.write().await;
        if state.is_valid(Utc::now()) {
            return Ok(());
        }
        self.login_locked(&mut state).await
    }

    async fn login_locked(&self, state: &mut TokenState) -> AciResult<()> {
        let url = format!("{}/api/aaaLogin.json", self.config.base_uri);
        let payload = serde_json::json!({
            "aaaUser": {
                "attributes": {
                    "name": self.config.username,
                    "pwd": self.config.password
                }
            }
        });
        debug!(url = %url, "logging in to the APIC");
        let resp = self.execute(Method::POST, &url, &[], Some(&payload), None).await?;
        if !resp.status().is_success() {
            return Err(self.protocol_error("login", &resp));
        }
        let envelope = self.decode(resp, "login").await?;
        let login: Mo<AaaLoginAttributes> = envelope.first("aaaLogin", "login")?;

        state.token = Some(login.attributes.token);
        state.last_login = Some(Utc::now());
        state.refresh_timeout = login.attributes.refresh_timeout_seconds.parse().ok();
        info!(endpoint = %self.config.base_uri, "authenticated to the APIC");
        Ok(())
    }

    /// Issue one HTTP request. Transport-level failures become a
    /// connectivity error wrapping the base endpoint; any received response,
    /// success or not, is returned to the caller.
    async fn execute(
        &self,
        method: Method,
        url: &str,
        params: &[(&str, &str)],
        body: Option<&Value>,
        token: Option<&str>
    ) -> AciResult<Response> {
        let mut request = self.http.request(method, url);
        if !params.is_empty() {
            request = request.query(params);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(token) = token {
            request = request.header(header::COOKIE, format!("APIC-cookie={token}"));
        }
        request.send().await.map_err(|e| AciError::Connect {
            endpoint: self.config.base_uri.clone(),
            source: e
        })
    }

    fn protocol_error(&self, operation: &'static str, resp: &Response) -> AciError {
        let status = resp.status();
        AciError::Http {
            operation,
            endpoint: self.config.base_uri.clone(),
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("unknown").to_string()
        }
    }

    async fn decode(&self, resp: Response, operation: &'static str) -> AciResult<Envelope> {
        let body = resp.text().await.map_err(|e| AciError::Connect {
            endpoint: self.config.base_uri.clone(),
            source: e
        })?;
        serde_json::from_str(&body).map_err(|e| AciError::Decode {
            operation,
            detail: e.to_string()
        })
    }

    /// GET a managed-object or class query, refreshing the token first.
    /// A failing refresh login surfaces as the login protocol error and the
    /// original call is never attempted.
    pub(crate) async fn get(
        &self,
        operation: &'static str,
        path: &str,
        params: &[(&str, &str)]
    ) -> AciResult<Envelope> {
        self.request(Method::GET, operation, path, params, None).await
    }

    /// POST to the APIC with the same token and error handling as `get`.
    pub(crate) async fn post(
        &self,
        operation: &'static str,
        path: &str,
        body: &Value
    ) -> AciResult<Envelope> {
        self.request(Method::POST, operation, path, &[], Some(body)).await
    }

    async fn request(
        &self,
        method: Method,
        operation: &'static str,
        path: &str,
        params: &[(&str, &str)],
        body: Option<&Value>
    ) -> AciResult<Envelope> {
        self.ensure_valid().await?;
        let token = self.state.read().await.token.clone();
        let url = format!("{}{}", self.config.base_uri, path);
        debug!(operation, url = %url, "APIC request");
        let resp = self
            .execute(method, &url, params, body, token.as_deref())
            .await?;
        if !resp.status().is_success() {
            return Err(self.protocol_error(operation, &resp));
        }
        self.decode(resp, operation).await
    }
}

/// The APIC response envelope: a string-typed row count and a list of rows,
/// each keyed by its object-class name.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    #[serde(rename = "totalCount", default)]
    pub total_count: String,
    #[serde(default)]
    pub imdata: Vec<serde_json::Map<String, Value>>
}

/// One managed object: typed attributes plus untyped children rows.
#[derive(Debug, Deserialize)]
pub(crate) struct Mo<T> {
    pub attributes: T,
    #[serde(default)]
    pub children: Vec<serde_json::Map<String, Value>>
}

impl Envelope {
    pub fn total(&self) -> usize {
        self.total_count.parse().unwrap_or(0)
    }

    /// Typed rows of one object class. Rows of any other class are skipped,
    /// matching the APIC convention that responses are interpreted by class
    /// name, never by position.
    pub fn rows<T: DeserializeOwned>(&self, class: &'static str) -> AciResult<Vec<Mo<T>>> {
        self.imdata
            .iter()
            .filter_map(|row| row.get(class))
            .map(|value| decode_mo(value, class))
            .collect()
    }

    /// The first row of the given class, required to exist.
    pub fn first<T: DeserializeOwned>(
        &self,
        class: &'static str,
        operation: &'static str
    ) -> AciResult<Mo<T>> {
        self.rows(class)?
            .into_iter()
            .next()
            .ok_or(AciError::Decode {
                operation,
                detail: format!("no {class} object in response")
            })
    }
}

pub(crate) fn decode_mo<T: DeserializeOwned>(
    value: &Value,
    class: &'static str
) -> AciResult<Mo<T>> {
    serde_json::from_value(value.clone()).map_err(|e| AciError::Decode {
        operation: class,
        detail: e.to_string()
    })
}

/// Look up one child object by class inside an untyped children list.
pub(crate) fn child_mo<T: DeserializeOwned>(
    children: &[serde_json::Map<String, Value>],
    class: &'static str
) -> AciResult<Option<Mo<T>>> {
    children
        .iter()
        .find_map(|child| child.get(class))
        .map(|value| decode_mo(value, class))
        .transpose()
}
