//! Maps an inbound entry id to a tenant and its messaging channel.

use crate::middleware::error_handling::Result;
use crate::models::{Channel, ChatbotSettings, Store};
use crate::repositories::StoreRepository;

/// A resolved tenant: the store row, the channel the entry arrived on, the
/// access token to use for outbound sends, and the validated chatbot
/// settings.
#[derive(Debug, Clone)]
pub struct ResolvedTenant {
    pub store: Store,
    pub channel: Channel,
    /// Tenant token, else the global fallback. `None` means outbound sends
    /// are skipped while inbound processing still proceeds.
    pub access_token: Option<String>,
    pub settings: ChatbotSettings,
}

pub struct TenantResolver {
    stores: StoreRepository,
    fallback_token: Option<String>,
}

impl TenantResolver {
    pub fn new(stores: StoreRepository, fallback_token: Option<String>) -> Self {
        Self {
            stores,
            fallback_token,
        }
    }

    /// Match the entry id against page ids first, then Instagram account
    /// ids. `None` is not an error: entries for uninstalled integrations are
    /// routine and silently skipped.
    pub async fn resolve(&self, entry_id: &str) -> Result<Option<ResolvedTenant>> {
        let (store, channel) = match self.stores.find_by_page_id(entry_id).await? {
            Some(store) => (store, Channel::Messenger),
            None => match self.stores.find_by_instagram_id(entry_id).await? {
                Some(store) => (store, Channel::Instagram),
                None => return Ok(None),
            },
        };

        let access_token = store
            .page_access_token
            .clone()
            .or_else(|| self.fallback_token.clone());

        if access_token.is_none() {
            tracing::debug!(
                store_id = %store.id,
                "No access token for store; outbound sends will be skipped"
            );
        }

        let settings = ChatbotSettings::from_value(store.chatbot_settings.as_ref());

        Ok(Some(ResolvedTenant {
            store,
            channel,
            access_token,
            settings,
        }))
    }
}
