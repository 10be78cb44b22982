//! Application and grant lookups
//!
//! The protocol core never owns applications or grants; it borrows them
//! through a [`Store`] supplied by the resource server.

use crate::{
    application::Application,
    error::Result,
    grant::Grant,
    ticket::TicketExt,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Collaborator lookups.
///
/// `Ok(None)` means the record does not exist; `Err` is reserved for the
/// lookup itself failing and should be an [`OzError::LookupFailed`].
///
/// [`OzError::LookupFailed`]: crate::error::OzError::LookupFailed
#[async_trait]
pub trait Store: Send + Sync {
    /// Load an application by id
    async fn load_app(&self, id: &str) -> Result<Option<Application>>;

    /// Load a grant by id, with server data for tickets issued from it
    async fn load_grant(&self, id: &str) -> Result<Option<(Grant, Option<TicketExt>)>>;
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    apps: RwLock<HashMap<String, Application>>,
    grants: RwLock<HashMap<String, (Grant, Option<TicketExt>)>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an application
    pub async fn insert_app(&self, app: Application) {
        self.apps.write().await.insert(app.id.clone(), app);
    }

    /// Add or replace a grant
    pub async fn insert_grant(&self, grant: Grant, ext: Option<TicketExt>) {
        self.grants
            .write()
            .await
            .insert(grant.id.clone(), (grant, ext));
    }

    /// Remove a grant, returning whether it existed
    pub async fn remove_grant(&self, id: &str) -> bool {
        self.grants.write().await.remove(id).is_some()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load_app(&self, id: &str) -> Result<Option<Application>> {
        Ok(self.apps.read().await.get(id).cloned())
    }

    async fn load_grant(&self, id: &str) -> Result<Option<(Grant, Option<TicketExt>)>> {
        Ok(self.grants.read().await.get(id).cloned())
    }
}
