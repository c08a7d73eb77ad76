//! Postgres backend. Schema lives in `migrations/`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
    PageRequest, ProductFilter, ProductStore, StoreError, StoreResult, UserFilter, UserStore,
};
use crate::models::product::{Category, NewProduct, Product, ProductPatch, Review};
use crate::models::user::{NewUser, User, UserPatch};

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, phone_number, \
     profile_image, is_active, created_at, updated_at";

const PRODUCT_COLUMNS: &str = "id, title, description, price, mrp, brand, category, images, \
     stock, seller, rating, reviews, exchange_or_return_eligibility, published, is_active, \
     created_at, updated_at";

/// Emits `WHERE` for the first condition and `AND` for the rest.
#[derive(Default)]
struct Conditions {
    started: bool,
}

impl Conditions {
    fn next<'q, 'b>(
        &mut self,
        qb: &'b mut QueryBuilder<'q, Postgres>,
    ) -> &'b mut QueryBuilder<'q, Postgres> {
        qb.push(if self.started { " AND " } else { " WHERE " });
        self.started = true;
        qb
    }
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, page: Option<PageRequest>) {
    if let Some(page) = page {
        qb.push(" LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);
    }
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn map_insert_error(e: sqlx::Error, key: &str) -> StoreError {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(key.to_string())
        }
        other => StoreError::Database(other),
    }
}

fn push_user_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    match filter {
        UserFilter::All => {}
        UserFilter::Id(id) => {
            qb.push(" WHERE id = ").push_bind(id.clone());
        }
        UserFilter::Email(email) => {
            qb.push(" WHERE email = ").push_bind(email.clone());
        }
        UserFilter::Ids(ids) => {
            qb.push(" WHERE id = ANY(").push_bind(ids.clone()).push(")");
        }
    }
}

fn push_product_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    let mut conditions = Conditions::default();
    if filter.active_only {
        conditions.next(qb).push("is_active = TRUE");
    }
    if let Some(id) = &filter.id {
        conditions.next(qb).push("id = ").push_bind(id.clone());
    }
    if let Some(seller) = &filter.seller {
        conditions.next(qb).push("seller = ").push_bind(seller.clone());
    }
    if let Some(category) = filter.category {
        conditions
            .next(qb)
            .push("category = ")
            .push_bind(category.as_str());
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", escape_like(search));
        conditions
            .next(qb)
            .push("(title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_one(&self, filter: &UserFilter) -> StoreResult<Option<User>> {
        let mut qb = QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users"));
        push_user_filter(&mut qb, filter);
        qb.push(" LIMIT 1");
        Ok(qb.build_query_as::<User>().fetch_optional(&self.pool).await?)
    }

    async fn find_many(
        &self,
        filter: &UserFilter,
        page: Option<PageRequest>,
    ) -> StoreResult<Vec<User>> {
        let mut qb = QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users"));
        push_user_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC");
        push_page(&mut qb, page);
        Ok(qb.build_query_as::<User>().fetch_all(&self.pool).await?)
    }

    async fn insert(&self, user: NewUser) -> StoreResult<User> {
        let sql = format!(
            "INSERT INTO users (id, email, password_hash, first_name, last_name, phone_number)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.phone_number)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_insert_error(e, &format!("email {}", user.email)))
    }

    async fn update_by_id(&self, id: &str, patch: &UserPatch) -> StoreResult<Option<User>> {
        let sql = format!(
            "UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                phone_number = COALESCE($4, phone_number),
                profile_image = COALESCE($5, profile_image),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(patch.first_name.as_deref())
            .bind(patch.last_name.as_deref())
            .bind(patch.phone_number.as_deref())
            .bind(patch.profile_image.as_deref())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_by_id(&self, id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, filter: &UserFilter) -> StoreResult<u64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM users");
        push_user_filter(&mut qb, filter);
        let total = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(total.max(0) as u64)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    title: String,
    description: String,
    price: f64,
    mrp: f64,
    brand: String,
    category: String,
    images: Vec<String>,
    stock: i32,
    seller: String,
    rating: f64,
    reviews: Json<Vec<Review>>,
    exchange_or_return_eligibility: bool,
    published: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let category = row
            .category
            .parse::<Category>()
            .map_err(|e| StoreError::Corrupt(format!("product {}: {e}", row.id)))?;
        Ok(Product {
            id: row.id,
            title: row.title,
            description: row.description,
            price: row.price,
            mrp: row.mrp,
            brand: row.brand,
            category,
            images: row.images,
            stock: row.stock,
            seller: row.seller,
            rating: row.rating,
            reviews: row.reviews.0,
            exchange_or_return_eligibility: row.exchange_or_return_eligibility,
            published: row.published,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn find_one(&self, filter: &ProductFilter) -> StoreResult<Option<Product>> {
        let mut qb = QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        push_product_filter(&mut qb, filter);
        qb.push(" LIMIT 1");
        qb.build_query_as::<ProductRow>()
            .fetch_optional(&self.pool)
            .await?
            .map(Product::try_from)
            .transpose()
    }

    async fn find_many(
        &self,
        filter: &ProductFilter,
        page: Option<PageRequest>,
    ) -> StoreResult<Vec<Product>> {
        let mut qb = QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        push_product_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC");
        push_page(&mut qb, page);
        qb.build_query_as::<ProductRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Product::try_from)
            .collect()
    }

    async fn insert(&self, product: NewProduct) -> StoreResult<Product> {
        let sql = format!(
            "INSERT INTO products (id, title, description, price, mrp, brand, category, images,
                                   stock, seller, rating, exchange_or_return_eligibility, published)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(&product.title)
            .bind(&product.description)
            .bind(product.price)
            .bind(product.mrp)
            .bind(&product.brand)
            .bind(product.category.as_str())
            .bind(&product.images)
            .bind(product.stock)
            .bind(&product.seller)
            .bind(product.rating)
            .bind(product.exchange_or_return_eligibility)
            .bind(product.published)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn update_by_id(
        &self,
        id: &str,
        patch: &ProductPatch,
    ) -> StoreResult<Option<Product>> {
        let sql = format!(
            "UPDATE products SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                mrp = COALESCE($5, mrp),
                brand = COALESCE($6, brand),
                category = COALESCE($7, category),
                images = COALESCE($8, images),
                stock = COALESCE($9, stock),
                exchange_or_return_eligibility = COALESCE($10, exchange_or_return_eligibility),
                published = COALESCE($11, published),
                is_active = COALESCE($12, is_active),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {PRODUCT_COLUMNS}"
        );
        sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .bind(patch.title.as_deref())
            .bind(patch.description.as_deref())
            .bind(patch.price)
            .bind(patch.mrp)
            .bind(patch.brand.as_deref())
            .bind(patch.category.map(|c| c.as_str()))
            .bind(patch.images.as_deref())
            .bind(patch.stock)
            .bind(patch.exchange_or_return_eligibility)
            .bind(patch.published)
            .bind(patch.is_active)
            .fetch_optional(&self.pool)
            .await?
            .map(Product::try_from)
            .transpose()
    }

    async fn delete_by_id(&self, id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, filter: &ProductFilter) -> StoreResult<u64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM products");
        push_product_filter(&mut qb, filter);
        let total = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(total.max(0) as u64)
    }
}
