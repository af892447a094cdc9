//! Cached directory of mail domains.

use crate::context::Endpoints;
use crate::models::Domain;
use crate::transport::Transport;
use crate::{Error, Result};
use rand::seq::IndexedRandom;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Domains available for new accounts.
///
/// Each refresh replaces the whole cache. Refreshes from different callers
/// are not coordinated; the last one to finish wins.
#[derive(Debug)]
pub struct DomainDirectory {
    transport: Transport,
    endpoints: Arc<Endpoints>,
    cache: RwLock<Vec<Domain>>,
}

impl DomainDirectory {
    pub(crate) fn new(transport: Transport, endpoints: Arc<Endpoints>) -> Self {
        Self {
            transport,
            endpoints,
            cache: RwLock::new(Vec::new()),
        }
    }

    /// Reload page 1 of the domain list.
    ///
    /// Returns `false` when the request or decoding failed, in which case the
    /// cache is left empty.
    pub async fn refresh(&self) -> bool {
        let fetched = self.fetch_page().await;
        let ok = fetched.is_ok();
        let domains = fetched.unwrap_or_else(|err| {
            warn!(error = %err, "failed to refresh domains");
            Vec::new()
        });
        debug!(count = domains.len(), "domain cache replaced");
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = domains;
        ok
    }

    /// Snapshot of the cached domains.
    pub fn list(&self) -> Vec<Domain> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Refresh, then return the new snapshot.
    pub async fn fetch(&self) -> Vec<Domain> {
        self.refresh().await;
        self.list()
    }

    /// Refresh, then pick one active domain at random.
    pub async fn get_random(&self) -> Result<Domain> {
        self.refresh().await;
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        let active: Vec<&Domain> = cache.iter().filter(|domain| domain.is_active).collect();
        active
            .choose(&mut rand::rng())
            .map(|domain| (*domain).clone())
            .ok_or(Error::NoDomainAvailable)
    }

    /// `GET /domains/{id}`.
    pub async fn fetch_by_id(&self, id: &str) -> Result<Domain> {
        let response = self
            .transport
            .get(&self.endpoints.api(&format!("/domains/{id}")), None)
            .await;

        if !response.is_success() {
            return Err(Error::DomainNotFound(format!(
                "domain `{id}` returned status {}",
                response.status
            )));
        }
        response
            .json()
            .map_err(|err| Error::DomainNotFound(format!("domain `{id}`: {err}")))
    }

    async fn fetch_page(&self) -> Result<Vec<Domain>> {
        let response = self
            .transport
            .get(&self.endpoints.api("/domains?page=1"), None)
            .await;

        if response.status != 200 {
            return Err(Error::UnexpectedResponse {
                status: response.status,
            });
        }
        response.json()
    }
}
