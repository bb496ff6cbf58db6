//! Application State

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, Notify, RwLock};
use tutor_core::{ConversationStore, PromptLibrary, ToolCatalog};
use tutor_runtime::ProviderSelector;

/// One store per conversation; the per-store mutex serializes turns
pub type SharedStore = Arc<Mutex<ConversationStore>>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Active provider and persisted settings
    pub selector: Arc<RwLock<ProviderSelector>>,

    /// Sandboxed file tools
    pub tools: Arc<ToolCatalog>,

    pub conversations: Arc<ConversationRegistry>,

    /// System prompt fragments
    pub prompts: Arc<Mutex<PromptLibrary>>,

    /// Signalled on shutdown to cancel in-flight turns
    pub shutdown: Arc<Notify>,
}

impl AppState {
    pub fn new(selector: ProviderSelector, tools: ToolCatalog, prompts: PromptLibrary) -> Self {
        Self {
            selector: Arc::new(RwLock::new(selector)),
            tools: Arc::new(tools),
            conversations: Arc::new(ConversationRegistry::default()),
            prompts: Arc::new(Mutex::new(prompts)),
            shutdown: Arc::new(Notify::new()),
        }
    }
}

/// Conversations kept before the least recently used one is evicted
pub const DEFAULT_MAX_CONVERSATIONS: usize = 1000;

struct Entry {
    store: SharedStore,
    last_used: Instant,
}

/// Conversation stores keyed by conversation ID, bounded in number
pub struct ConversationRegistry {
    stores: Mutex<HashMap<String, Entry>>,
    capacity: usize,
}

impl Default for ConversationRegistry {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_CONVERSATIONS)
    }
}

impl ConversationRegistry {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            stores: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub async fn get(&self, id: &str) -> Option<SharedStore> {
        let mut stores = self.stores.lock().await;
        let entry = stores.get_mut(id)?;
        entry.last_used = Instant::now();
        Some(entry.store.clone())
    }

    pub async fn get_or_create(&self, id: &str) -> SharedStore {
        let mut stores = self.stores.lock().await;
        if let Some(entry) = stores.get_mut(id) {
            entry.last_used = Instant::now();
            return entry.store.clone();
        }

        if stores.len() >= self.capacity {
            evict_oldest(&mut stores);
        }
        tracing::debug!(conversation = %id, "New conversation");
        let store: SharedStore = Arc::new(Mutex::new(ConversationStore::new()));
        stores.insert(
            id.to_string(),
            Entry {
                store: store.clone(),
                last_used: Instant::now(),
            },
        );
        store
    }

    /// Overwrite the conversation under `id` with `store`.
    ///
    /// An existing conversation is updated in place once any running turn
    /// releases it, so that turn's writes are never sent to a detached store.
    pub async fn replace(&self, id: &str, store: ConversationStore) -> SharedStore {
        let shared = self.get_or_create(id).await;
        *shared.lock().await = store;
        shared
    }

    /// Forget `id`; false if it was unknown
    pub async fn remove(&self, id: &str) -> bool {
        self.stores.lock().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.stores.lock().await.len()
    }
}

fn evict_oldest(stores: &mut HashMap<String, Entry>) {
    let oldest = stores
        .iter()
        .min_by_key(|(_, entry)| entry.last_used)
        .map(|(id, _)| id.clone());
    if let Some(id) = oldest {
        tracing::debug!(conversation = %id, "Evicting least recently used conversation");
        stores.remove(&id);
    }
}
