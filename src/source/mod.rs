//! Marketplace sources and their client contract.

pub mod error;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::model::Promotion;
use crate::source::error::SourceError;

/// Secrets a subscriber stored for one source. Opaque to the engine.
#[derive(Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    /// Some marketplaces identify the seller separately from the key.
    #[serde(default)]
    pub client_id: Option<String>,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client_id: None,
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("client_id", &self.client_id)
            .finish()
    }
}

/// Client of one marketplace API.
///
/// Implementations must report rejected credentials as
/// [`SourceError::InvalidCredentials`] so they are not retried.
#[async_trait]
pub trait SourceClient: Send + Sync {
    async fn list_current_promotions(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<Promotion>, SourceError>;
}

/// Registry of all source clients, keyed by source name.
#[derive(Clone, Default)]
pub struct Sources {
    clients: Vec<(String, Arc<dyn SourceClient>)>,
}

impl Sources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a client. A later registration under the same name replaces the earlier one.
    pub fn register(&mut self, name: impl Into<String>, client: Arc<dyn SourceClient>) -> &mut Self {
        let name = name.into();
        match self.clients.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = client,
            None => self.clients.push((name, client)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn SourceClient>> {
        self.clients
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, client)| client)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.clients.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn SourceClient>)> {
        self.clients.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
