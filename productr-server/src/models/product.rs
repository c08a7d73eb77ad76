use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// Brand stored when the seller leaves it blank.
pub const DEFAULT_BRAND: &str = "Not specified";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Category {
    Electronics,
    Fashion,
    Home,
    Sports,
    Books,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Electronics,
        Category::Fashion,
        Category::Home,
        Category::Sports,
        Category::Books,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Electronics => "Electronics",
            Category::Fashion => "Fashion",
            Category::Home => "Home",
            Category::Sports => "Sports",
            Category::Books => "Books",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category '{}'", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub user_id: String,
    pub comment: String,
    /// 1 to 5
    pub rating: u8,
    pub created_at: DateTime<Utc>,
}

// ── Records ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub mrp: f64,
    pub brand: String,
    pub category: Category,
    pub images: Vec<String>,
    pub stock: i32,
    /// Id of the owning user.
    pub seller: String,
    pub rating: f64,
    pub reviews: Vec<Review>,
    pub exchange_or_return_eligibility: bool,
    pub published: bool,
    /// Cleared by soft removal; distinct from `published`.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product ready to be stored, with every default already applied.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub mrp: f64,
    pub brand: String,
    pub category: Category,
    pub images: Vec<String>,
    pub stock: i32,
    pub seller: String,
    pub rating: f64,
    pub exchange_or_return_eligibility: bool,
    pub published: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub mrp: Option<f64>,
    pub brand: Option<String>,
    pub category: Option<Category>,
    pub images: Option<Vec<String>>,
    pub stock: Option<i32>,
    pub exchange_or_return_eligibility: Option<bool>,
    pub published: Option<bool>,
    pub is_active: Option<bool>,
}

impl ProductPatch {
    pub fn deactivate() -> Self {
        Self {
            is_active: Some(false),
            ..Self::default()
        }
    }

    pub fn apply(&self, p: &mut Product, now: DateTime<Utc>) {
        if let Some(v) = &self.title {
            p.title = v.clone();
        }
        if let Some(v) = &self.description {
            p.description = v.clone();
        }
        if let Some(v) = self.price {
            p.price = v;
        }
        if let Some(v) = self.mrp {
            p.mrp = v;
        }
        if let Some(v) = &self.brand {
            p.brand = v.clone();
        }
        if let Some(v) = self.category {
            p.category = v;
        }
        if let Some(v) = &self.images {
            p.images = v.clone();
        }
        if let Some(v) = self.stock {
            p.stock = v;
        }
        if let Some(v) = self.exchange_or_return_eligibility {
            p.exchange_or_return_eligibility = v;
        }
        if let Some(v) = self.published {
            p.published = v;
        }
        if let Some(v) = self.is_active {
            p.is_active = v;
        }
        p.updated_at = now;
    }
}

// ── API types ────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: Option<f64>,
    /// One of Electronics, Fashion, Home, Sports, Books, Other
    #[serde(default)]
    pub category: String,
    pub stock: Option<i64>,
    /// Defaults to `price`
    pub mrp: Option<f64>,
    pub brand: Option<String>,
    pub images: Option<Vec<String>>,
    pub exchange_or_return_eligibility: Option<bool>,
    /// Defaults to true
    pub published: Option<bool>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub stock: Option<i64>,
    pub mrp: Option<f64>,
    pub brand: Option<String>,
    pub images: Option<Vec<String>>,
    pub exchange_or_return_eligibility: Option<bool>,
    pub published: Option<bool>,
}

#[derive(Debug, Default, Deserialize, ToSchema, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductListQuery {
    /// Exact category match
    pub category: Option<String>,
    /// Case-insensitive substring of title or description
    pub search: Option<String>,
    /// 1-indexed page (default 1)
    #[serde(default, deserialize_with = "lenient_count")]
    pub page: Option<u32>,
    /// Page size (default 10, max 100)
    #[serde(default, deserialize_with = "lenient_count")]
    pub limit: Option<u32>,
}

/// Anything that is not a non-negative integer reads as absent, so the
/// paging defaults apply.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.trim().parse().ok()))
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SellerSummary {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_image: Option<String>,
}

impl From<&crate::models::user::User> for SellerSummary {
    fn from(u: &crate::models::user::User) -> Self {
        Self {
            id: u.id.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            profile_image: u.profile_image.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub mrp: f64,
    pub brand: String,
    pub category: Category,
    pub images: Vec<String>,
    pub stock: i32,
    pub seller: String,
    /// Public profile of the seller, when it resolves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller_details: Option<SellerSummary>,
    pub rating: f64,
    pub reviews: Vec<Review>,
    pub exchange_or_return_eligibility: bool,
    pub published: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductResponse {
    pub fn new(p: Product, seller_details: Option<SellerSummary>) -> Self {
        Self {
            id: p.id,
            title: p.title,
            description: p.description,
            price: p.price,
            mrp: p.mrp,
            brand: p.brand,
            category: p.category,
            images: p.images,
            stock: p.stock,
            seller: p.seller,
            seller_details,
            rating: p.rating,
            reviews: p.reviews,
            exchange_or_return_eligibility: p.exchange_or_return_eligibility,
            published: p.published,
            is_active: p.is_active,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self::new(p, None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub pages: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductListResponse {
    pub message: String,
    pub products: Vec<ProductResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductEnvelope {
    pub success: bool,
    pub message: String,
    pub product: ProductResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductDetailResponse {
    pub message: String,
    pub product: ProductResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MyProductsResponse {
    pub message: String,
    pub products: Vec<ProductResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}
