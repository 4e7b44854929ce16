//! Credentials handed over through a URL.
//!
//! The dashboard handoff carries `token` (or `auth_token`) and a
//! URL-encoded `user` profile JSON in the query string. An offer is
//! consumed at most once: its fingerprint is recorded in the Credential
//! Store and the parameters are scrubbed from their origin.

use sha2::{Digest, Sha256};
use std::sync::{Mutex, MutexGuard};
use url::Url;

use crate::auth::UserProfile;
use crate::error::{SyncError, SyncResult};

const TOKEN_PARAM: &str = "token";
const TOKEN_FALLBACK_PARAM: &str = "auth_token";
const USER_PARAM: &str = "user";

/// A credential arriving through a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalOffer {
    pub token: String,
    pub profile: Option<UserProfile>,
}

impl ExternalOffer {
    /// Extract an offer from `url`.
    ///
    /// Returns `Ok(None)` when the URL carries no token, and
    /// [`SyncError::MalformedOffer`] when the offer is present but unusable.
    pub fn from_url(url: &Url) -> SyncResult<Option<Self>> {
        let mut token = None;
        let mut fallback = None;
        let mut user = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                TOKEN_PARAM => token = Some(value.into_owned()),
                TOKEN_FALLBACK_PARAM => fallback = Some(value.into_owned()),
                USER_PARAM => user = Some(value.into_owned()),
                _ => {}
            }
        }

        let Some(token) = token.or(fallback) else {
            return Ok(None);
        };
        let token = token.trim().to_string();
        if token.is_empty() {
            return Err(SyncError::MalformedOffer("empty token".to_string()));
        }

        let profile = match user {
            Some(raw) => Some(
                serde_json::from_str::<UserProfile>(&raw)
                    .map_err(|e| SyncError::MalformedOffer(format!("user profile: {}", e)))?,
            ),
            None => None,
        };

        Ok(Some(Self { token, profile }))
    }

    /// Build the handoff URL for `base`.
    pub fn to_url(&self, base: &str) -> SyncResult<Url> {
        let mut link = format!(
            "{}?{}={}",
            base,
            TOKEN_PARAM,
            urlencoding::encode(&self.token)
        );
        if let Some(profile) = &self.profile {
            let json = serde_json::to_string(profile)?;
            link.push_str(&format!("&{}={}", USER_PARAM, urlencoding::encode(&json)));
        }
        Url::parse(&link).map_err(|e| SyncError::MalformedOffer(e.to_string()))
    }

    /// Stable fingerprint recorded once the offer is consumed.
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.token.as_bytes()))
    }

    /// `url` without the offer parameters.
    pub fn scrub(url: &Url) -> Url {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| {
                !matches!(key.as_ref(), TOKEN_PARAM | TOKEN_FALLBACK_PARAM | USER_PARAM)
            })
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let mut scrubbed = url.clone();
        if kept.is_empty() {
            scrubbed.set_query(None);
        } else {
            scrubbed.query_pairs_mut().clear().extend_pairs(kept);
        }
        scrubbed
    }
}

/// Where an offer was found, and where it is scrubbed from.
pub trait OfferOrigin: Send + Sync {
    /// The current address.
    fn current(&self) -> Option<Url>;

    /// Replace the visible address.
    fn replace(&self, url: Url);
}

/// An origin holding a single address, such as a URL passed on the command line.
#[derive(Debug)]
pub struct StaticLocation {
    url: Mutex<Option<Url>>,
}

impl StaticLocation {
    pub fn new(url: Url) -> Self {
        Self {
            url: Mutex::new(Some(url)),
        }
    }

    pub fn parse(raw: &str) -> SyncResult<Self> {
        let url = Url::parse(raw).map_err(|e| SyncError::MalformedOffer(e.to_string()))?;
        Ok(Self::new(url))
    }

    fn slot(&self) -> MutexGuard<'_, Option<Url>> {
        self.url.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl OfferOrigin for StaticLocation {
    fn current(&self) -> Option<Url> {
        self.slot().clone()
    }

    fn replace(&self, url: Url) {
        *self.slot() = Some(url);
    }
}
