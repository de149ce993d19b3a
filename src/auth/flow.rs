//! Implicit-grant authorization requests and redirect parsing

use async_trait::async_trait;
use url::Url;
use crate::Result;
use crate::error::Error;

/// Google OAuth2 authorization endpoint
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Scopes requested on every authorization, interactive or silent
pub const GOOGLE_SCOPES: &[&str] = &[
    "openid",
    "email",
    "profile",
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/userinfo.email",
];

/// Lifetime assumed when the provider omits `expires_in`
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Longest lifetime taken at face value; anything above is treated as garbage
pub const MAX_EXPIRES_IN_SECS: i64 = 86_400;

/// The `prompt` hint sent to the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// Always show the consent screen
    Consent,
    /// Fail instead of showing any UI
    None,
}

impl Prompt {
    pub fn as_str(&self) -> &'static str {
        match self {
            Prompt::Consent => "consent",
            Prompt::None => "none",
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, Prompt::Consent)
    }
}

/// Something that can run a web authorization flow and hand back the final redirect URL.
///
/// This is the host's equivalent of launching a web auth flow: it opens `url`, waits for
/// the provider to redirect to [`IdentityFlow::redirect_uri`], and returns the full redirect
/// URL including its fragment.
#[async_trait]
pub trait IdentityFlow: Send + Sync {
    /// Redirect URI registered with the provider for this host
    fn redirect_uri(&self) -> String;

    /// Run the flow. `interactive == false` must never prompt the user.
    async fn launch(&self, url: &str, interactive: bool) -> Result<String>;
}

/// Build the implicit-grant authorization URL
pub fn build_auth_url(client_id: &str, redirect_uri: &str, prompt: Prompt) -> Result<String> {
    let mut url = Url::parse(GOOGLE_AUTH_URL)
        .map_err(|e| Error::OAuth(format!("Invalid auth URL: {}", e)))?;

    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("response_type", "token")
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", &GOOGLE_SCOPES.join(" "))
        .append_pair("include_granted_scopes", "true")
        .append_pair("prompt", prompt.as_str());

    Ok(url.to_string())
}

/// Parameters carried in the redirect fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: Option<String>,
    pub expires_in: i64,
    pub scope: Option<String>,
}

/// Parse the fragment of a redirect URL.
///
/// Missing, zero, oversized or unparseable `expires_in` falls back to [`DEFAULT_EXPIRES_IN_SECS`].
pub fn parse_redirect(redirect_url: &str) -> Result<TokenGrant> {
    let url = Url::parse(redirect_url)
        .map_err(|e| Error::OAuth(format!("Invalid redirect URL: {}", e)))?;

    Ok(parse_fragment(url.fragment().unwrap_or("")))
}

pub fn parse_fragment(fragment: &str) -> TokenGrant {
    let fragment = fragment.strip_prefix('#').unwrap_or(fragment);

    let mut grant = TokenGrant {
        access_token: None,
        expires_in: DEFAULT_EXPIRES_IN_SECS,
        scope: None,
    };

    for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
        match key.as_ref() {
            "access_token" if !value.is_empty() => grant.access_token = Some(value.into_owned()),
            "expires_in" => {
                grant.expires_in = value
                    .trim()
                    .parse::<i64>()
                    .ok()
                    .filter(|secs| (1..=MAX_EXPIRES_IN_SECS).contains(secs))
                    .unwrap_or(DEFAULT_EXPIRES_IN_SECS);
            }
            "scope" => grant.scope = Some(value.into_owned()),
            _ => {}
        }
    }

    grant
}

/// Identity flow that replays canned redirect URLs.
#[cfg(test)]
pub struct FakeIdentityFlow {
    outcomes: std::sync::Mutex<std::collections::VecDeque<std::result::Result<String, String>>>,
    launched: std::sync::Mutex<Vec<(String, bool)>>,
}

#[cfg(test)]
impl FakeIdentityFlow {
    pub fn new(outcomes: Vec<std::result::Result<&str, &str>>) -> Self {
        Self {
            outcomes: std::sync::Mutex::new(
                outcomes
                    .into_iter()
                    .map(|o| o.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            launched: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// URLs launched so far, with their interactive flag
    pub fn launched(&self) -> Vec<(String, bool)> {
        self.launched.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl IdentityFlow for FakeIdentityFlow {
    fn redirect_uri(&self) -> String {
        "http://127.0.0.1:8085/callback".to_string()
    }

    async fn launch(&self, url: &str, interactive: bool) -> Result<String> {
        self.launched.lock().unwrap().push((url.to_string(), interactive));
        match self.outcomes.lock().unwrap().pop_front() {
            Some(Ok(redirect)) => Ok(redirect),
            Some(Err(message)) => Err(Error::OAuth(message)),
            None => Err(Error::OAuth("No more fake redirects".to_string())),
        }
    }
}
