//! Process-local backend used in demo mode.
//!
//! Each collection is an ordered `Vec` behind its own lock, so every
//! check-then-write (email uniqueness, id assignment) happens under a single
//! write guard. Nothing survives a restart.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{
    PageRequest, ProductFilter, ProductStore, StoreError, StoreResult, UserFilter, UserStore,
};
use crate::models::product::{NewProduct, Product, ProductPatch};
use crate::models::user::{NewUser, User, UserPatch};

const FIRST_USER_ID: u64 = 100;
const FIRST_PRODUCT_ID: u64 = 1000;

struct Collection<T> {
    records: Vec<T>,
    next_id: u64,
}

impl<T> Collection<T> {
    fn new(first_id: u64) -> Self {
        Self {
            records: Vec::new(),
            next_id: first_id,
        }
    }

    /// Ids are never reused, even after a delete.
    fn allocate_id(&mut self) -> String {
        let id = self.next_id;
        self.next_id += 1;
        id.to_string()
    }
}

fn window<T: Clone>(matched: Vec<&T>, page: Option<PageRequest>) -> Vec<T> {
    match page {
        Some(page) => matched
            .into_iter()
            .skip(page.offset())
            .take(page.limit as usize)
            .cloned()
            .collect(),
        None => matched.into_iter().cloned().collect(),
    }
}

pub struct MemoryUserStore {
    inner: RwLock<Collection<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Collection::new(FIRST_USER_ID)),
        }
    }
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_one(&self, filter: &UserFilter) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.records.iter().find(|u| filter.matches(u)).cloned())
    }

    async fn find_many(
        &self,
        filter: &UserFilter,
        page: Option<PageRequest>,
    ) -> StoreResult<Vec<User>> {
        let inner = self.inner.read().await;
        let matched = inner.records.iter().filter(|u| filter.matches(u)).collect();
        Ok(window(matched, page))
    }

    async fn insert(&self, user: NewUser) -> StoreResult<User> {
        let mut inner = self.inner.write().await;
        if inner.records.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!("email {}", user.email)));
        }

        let now = Utc::now();
        let record = User {
            id: inner.allocate_id(),
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            phone_number: user.phone_number,
            profile_image: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        inner.records.push(record.clone());
        Ok(record)
    }

    async fn update_by_id(&self, id: &str, patch: &UserPatch) -> StoreResult<Option<User>> {
        let mut inner = self.inner.write().await;
        Ok(inner.records.iter_mut().find(|u| u.id == id).map(|u| {
            patch.apply(u, Utc::now());
            u.clone()
        }))
    }

    async fn delete_by_id(&self, id: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.records.len();
        inner.records.retain(|u| u.id != id);
        Ok(inner.records.len() != before)
    }

    async fn count(&self, filter: &UserFilter) -> StoreResult<u64> {
        let inner = self.inner.read().await;
        Ok(inner.records.iter().filter(|u| filter.matches(u)).count() as u64)
    }
}

pub struct MemoryProductStore {
    inner: RwLock<Collection<Product>>,
}

impl MemoryProductStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Collection::new(FIRST_PRODUCT_ID)),
        }
    }
}

impl Default for MemoryProductStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductStore for MemoryProductStore {
    async fn find_one(&self, filter: &ProductFilter) -> StoreResult<Option<Product>> {
        let inner = self.inner.read().await;
        Ok(inner.records.iter().find(|p| filter.matches(p)).cloned())
    }

    async fn find_many(
        &self,
        filter: &ProductFilter,
        page: Option<PageRequest>,
    ) -> StoreResult<Vec<Product>> {
        let inner = self.inner.read().await;
        let matched = inner.records.iter().filter(|p| filter.matches(p)).collect();
        Ok(window(matched, page))
    }

    async fn insert(&self, product: NewProduct) -> StoreResult<Product> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let record = Product {
            id: inner.allocate_id(),
            title: product.title,
            description: product.description,
            price: product.price,
            mrp: product.mrp,
            brand: product.brand,
            category: product.category,
            images: product.images,
            stock: product.stock,
            seller: product.seller,
            rating: product.rating,
            reviews: Vec::new(),
            exchange_or_return_eligibility: product.exchange_or_return_eligibility,
            published: product.published,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        inner.records.push(record.clone());
        Ok(record)
    }

    async fn update_by_id(
        &self,
        id: &str,
        patch: &ProductPatch,
    ) -> StoreResult<Option<Product>> {
        let mut inner = self.inner.write().await;
        Ok(inner.records.iter_mut().find(|p| p.id == id).map(|p| {
            patch.apply(p, Utc::now());
            p.clone()
        }))
    }

    async fn delete_by_id(&self, id: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.records.len();
        inner.records.retain(|p| p.id != id);
        Ok(inner.records.len() != before)
    }

    async fn count(&self, filter: &ProductFilter) -> StoreResult<u64> {
        let inner = self.inner.read().await;
        Ok(inner.records.iter().filter(|p| filter.matches(p)).count() as u64)
    }
}
