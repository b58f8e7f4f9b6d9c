#![allow(dead_code)]

use docshape::{async_trait, memory::InMemoryStore, prelude::*};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Serialize, Deserialize, Document)]
#[document(collection = "users")]
pub struct User {
    #[serde(flatten)]
    pub base: Base,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub level: i32,
}

impl User {
    pub fn new(first_name: &str, last_name: &str, level: i32) -> Self {
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: format!("{}@example.com", first_name.to_lowercase()),
            level,
            ..Default::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0} rejected")]
pub struct Rejected(pub HookStage);

/// Records every hook it runs and fails on request.
#[derive(Debug, Default, Clone, Serialize, Deserialize, Document)]
#[document(collection = "audited", hooks)]
pub struct Audited {
    #[document(base)]
    #[serde(flatten)]
    pub base: Base,
    pub name: String,
    #[serde(skip)]
    pub calls: Vec<HookStage>,
    #[serde(skip)]
    pub fail_at: Option<HookStage>,
}

impl Audited {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Default::default() }
    }

    fn record(&mut self, stage: HookStage) -> HookResult {
        self.calls.push(stage);

        match self.fail_at {
            Some(failing) if failing == stage => Err(Rejected(stage).into()),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentHooks for Audited {
    async fn pre_create(&mut self, _store: &dyn DynStoreBackend) -> HookResult {
        self.record(HookStage::PreCreate)
    }

    async fn post_create(&mut self, _store: &dyn DynStoreBackend) -> HookResult {
        self.record(HookStage::PostCreate)
    }

    async fn pre_update(&mut self, _store: &dyn DynStoreBackend) -> HookResult {
        self.record(HookStage::PreUpdate)
    }

    async fn post_update(&mut self, _store: &dyn DynStoreBackend) -> HookResult {
        self.record(HookStage::PostUpdate)
    }

    async fn pre_soft_delete(&mut self, store: &dyn DynStoreBackend) -> HookResult {
        // The document is already marked when this runs, but not yet stored.
        let stored = store
            .count_documents(
                QueryFilter::including_deleted().into_filters(),
                Self::collection_name(),
            )
            .await?;
        if !self.is_deleted() || stored != 0 {
            return Err("soft delete hook saw an unexpected state".into());
        }

        self.record(HookStage::PreSoftDelete)
    }

    async fn post_soft_delete(&mut self, _store: &dyn DynStoreBackend) -> HookResult {
        self.record(HookStage::PostSoftDelete)
    }

    async fn pre_hard_delete(&mut self, _store: &dyn DynStoreBackend) -> HookResult {
        self.record(HookStage::PreHardDelete)
    }

    async fn post_hard_delete(&mut self, _store: &dyn DynStoreBackend) -> HookResult {
        self.record(HookStage::PostHardDelete)
    }

    async fn pre_find_one(&mut self, _store: &dyn DynStoreBackend) -> HookResult {
        self.record(HookStage::PreFindOne)
    }

    async fn post_find_one(&mut self, _store: &dyn DynStoreBackend) -> HookResult {
        self.record(HookStage::PostFindOne)
    }
}

pub fn store() -> DocumentStore<InMemoryStore> {
    DocumentStore::new(InMemoryStore::new())
}

/// Saves `users` in order; later users get larger identities.
pub async fn seed(store: &DocumentStore<InMemoryStore>, users: &mut [User]) {
    for user in users.iter_mut() {
        user.setup().unwrap();
        store.save_document(user).await.unwrap();
    }
}

pub fn trio() -> Vec<User> {
    vec![
        User::new("Ivy", "Cobhams", 1),
        User::new("Asari", "Cobhams", 2),
        User::new("Joseph", "Okafor", 3),
    ]
}
