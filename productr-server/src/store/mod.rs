//! Storage for users and products.
//!
//! Every operation runs against one of two backends chosen once at startup:
//! [`memory`] keeps ordered collections inside the process (demo mode) and
//! [`postgres`] talks to a database. Business logic only ever sees the
//! [`UserStore`] / [`ProductStore`] traits through a [`Store`].
//!
//! Ids are opaque strings in both modes. The memory backend hands out
//! monotonically increasing numbers, the database backend UUIDs.
//!
//! Listing order differs between the two: the database returns newest first,
//! the memory backend returns insertion order.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::product::{Category, NewProduct, Product, ProductPatch};
use crate::models::user::{NewUser, User, UserPatch};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique key (user email) is already taken.
    #[error("duplicate key: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be mapped back to a record.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A 1-indexed page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Missing or zero values fall back to the defaults; `limit` is capped.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE);
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT);
        Self { page, limit }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }

    /// Number of pages needed to show `total` records.
    pub fn pages(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.limit))
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserFilter {
    All,
    Id(String),
    /// Compared against the normalized (lowercase) email.
    Email(String),
    Ids(Vec<String>),
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        match self {
            UserFilter::All => true,
            UserFilter::Id(id) => &user.id == id,
            UserFilter::Email(email) => &user.email == email,
            UserFilter::Ids(ids) => ids.iter().any(|id| id == &user.id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub id: Option<String>,
    pub seller: Option<String>,
    pub category: Option<Category>,
    /// Case-insensitive substring of title or description.
    pub search: Option<String>,
    pub active_only: bool,
}

impl ProductFilter {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, p: &Product) -> bool {
        if self.active_only && !p.is_active {
            return false;
        }
        if self.id.as_ref().is_some_and(|id| &p.id != id) {
            return false;
        }
        if self.seller.as_ref().is_some_and(|s| &p.seller != s) {
            return false;
        }
        if self.category.is_some_and(|c| p.category != c) {
            return false;
        }
        match &self.search {
            Some(needle) => {
                let needle = needle.to_lowercase();
                p.title.to_lowercase().contains(&needle)
                    || p.description.to_lowercase().contains(&needle)
            }
            None => true,
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_one(&self, filter: &UserFilter) -> StoreResult<Option<User>>;

    async fn find_many(
        &self,
        filter: &UserFilter,
        page: Option<PageRequest>,
    ) -> StoreResult<Vec<User>>;

    /// Fails with [`StoreError::Conflict`] when the email is taken. The check
    /// and the write happen atomically.
    async fn insert(&self, user: NewUser) -> StoreResult<User>;

    async fn update_by_id(&self, id: &str, patch: &UserPatch) -> StoreResult<Option<User>>;

    async fn delete_by_id(&self, id: &str) -> StoreResult<bool>;

    async fn count(&self, filter: &UserFilter) -> StoreResult<u64>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn find_one(&self, filter: &ProductFilter) -> StoreResult<Option<Product>>;

    async fn find_many(
        &self,
        filter: &ProductFilter,
        page: Option<PageRequest>,
    ) -> StoreResult<Vec<Product>>;

    async fn insert(&self, product: NewProduct) -> StoreResult<Product>;

    async fn update_by_id(&self, id: &str, patch: &ProductPatch)
        -> StoreResult<Option<Product>>;

    async fn delete_by_id(&self, id: &str) -> StoreResult<bool>;

    async fn count(&self, filter: &ProductFilter) -> StoreResult<u64>;
}

/// The storage backend selected at startup.
#[derive(Clone)]
pub struct Store {
    users: Arc<dyn UserStore>,
    products: Arc<dyn ProductStore>,
    persistent: bool,
}

impl Store {
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(memory::MemoryUserStore::new()),
            products: Arc::new(memory::MemoryProductStore::new()),
            persistent: false,
        }
    }

    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self {
            users: Arc::new(postgres::PgUserStore::new(pool.clone())),
            products: Arc::new(postgres::PgProductStore::new(pool)),
            persistent: true,
        }
    }

    /// Fixed for the lifetime of the process.
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn mode(&self) -> &'static str {
        if self.persistent {
            "persistent"
        } else {
            "demo"
        }
    }

    pub fn users(&self) -> &dyn UserStore {
        self.users.as_ref()
    }

    pub fn products(&self) -> &dyn ProductStore {
        self.products.as_ref()
    }
}
