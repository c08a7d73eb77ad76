//! Product listings: creation, browsing, and seller-only mutation.

use std::collections::HashMap;
use std::str::FromStr;

use thiserror::Error;
use tracing::{info, instrument};

use crate::models::product::{
    Category, CreateProductRequest, NewProduct, Pagination, Product, ProductListQuery,
    ProductPatch, ProductResponse, SellerSummary, UpdateProductRequest, DEFAULT_BRAND,
};
use crate::store::{PageRequest, ProductFilter, Store, StoreError, UserFilter};
use crate::AppState;

/// Whether `get_by_id` returns products whose active flag is cleared.
/// Inactive products are reported as not found everywhere.
pub const INACTIVE_VISIBLE_BY_ID: bool = false;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    Validation(String),

    #[error("product not found")]
    NotFound,

    /// The caller is authenticated but does not own the product.
    #[error("not authorized to {0} this product")]
    Forbidden(&'static str),

    /// The token's subject no longer resolves to a user.
    #[error("seller not found")]
    UnknownSeller,

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// What `remove` does to a product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RemovalPolicy {
    /// Delete the record.
    #[default]
    Hard,
    /// Clear the active flag and keep the record.
    Soft,
}

impl FromStr for RemovalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hard" => Ok(RemovalPolicy::Hard),
            "soft" => Ok(RemovalPolicy::Soft),
            other => Err(format!("unknown removal policy '{other}' (expected hard or soft)")),
        }
    }
}

fn required_text(value: &str, field: &str) -> Result<String, CatalogError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CatalogError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn checked_amount(value: f64, field: &str) -> Result<f64, CatalogError> {
    if !value.is_finite() || value < 0.0 {
        return Err(CatalogError::Validation(format!(
            "{field} must be a non-negative number"
        )));
    }
    Ok(value)
}

fn checked_stock(value: i64) -> Result<i32, CatalogError> {
    i32::try_from(value)
        .ok()
        .filter(|v| *v >= 0)
        .ok_or_else(|| CatalogError::Validation("Stock must be a non-negative integer".into()))
}

fn checked_category(value: &str) -> Result<Category, CatalogError> {
    let value = required_text(value, "Category")?;
    value.parse().map_err(|_| {
        let allowed: Vec<_> = Category::ALL.iter().map(|c| c.as_str()).collect();
        CatalogError::Validation(format!("Category must be one of {}", allowed.join(", ")))
    })
}

fn checked_mrp(mrp: f64, price: f64) -> Result<(), CatalogError> {
    if mrp < price {
        return Err(CatalogError::Validation(
            "MRP must not be lower than price".to_string(),
        ));
    }
    Ok(())
}

pub struct CatalogService<'a> {
    store: &'a Store,
    removal: RemovalPolicy,
}

impl<'a> CatalogService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            store: &state.store,
            removal: state.policies.removal,
        }
    }

    #[instrument(name = "catalog::create", skip(self, req))]
    pub async fn create(
        &self,
        seller_id: &str,
        req: CreateProductRequest,
    ) -> Result<Product, CatalogError> {
        let title = required_text(&req.title, "Title")?;
        let description = required_text(&req.description, "Description")?;
        let price = checked_amount(
            req.price
                .ok_or_else(|| CatalogError::Validation("Price is required".into()))?,
            "Price",
        )?;
        let category = checked_category(&req.category)?;
        let stock = checked_stock(
            req.stock
                .ok_or_else(|| CatalogError::Validation("Stock is required".into()))?,
        )?;
        let mrp = match req.mrp {
            Some(mrp) => checked_amount(mrp, "MRP")?,
            None => price,
        };
        checked_mrp(mrp, price)?;
        let brand = req
            .brand
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_BRAND.to_string());

        self.store
            .users()
            .find_one(&UserFilter::Id(seller_id.to_string()))
            .await?
            .ok_or(CatalogError::UnknownSeller)?;

        let product = self
            .store
            .products()
            .insert(NewProduct {
                title,
                description,
                price,
                mrp,
                brand,
                category,
                images: req.images.unwrap_or_default(),
                stock,
                seller: seller_id.to_string(),
                rating: 0.0,
                exchange_or_return_eligibility: req.exchange_or_return_eligibility.unwrap_or(false),
                published: req.published.unwrap_or(true),
            })
            .await?;

        info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// Active products matching the query, one page at a time.
    pub async fn list(
        &self,
        query: ProductListQuery,
    ) -> Result<(Vec<ProductResponse>, Pagination), CatalogError> {
        let page = PageRequest::new(query.page, query.limit);
        let mut filter = ProductFilter {
            search: query
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            active_only: true,
            ..ProductFilter::default()
        };

        if let Some(raw) = query.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            match raw.parse::<Category>() {
                Ok(category) => filter.category = Some(category),
                // No product can carry an unknown category.
                Err(_) => {
                    return Ok((
                        Vec::new(),
                        Pagination {
                            total: 0,
                            page: page.page,
                            limit: page.limit,
                            pages: 0,
                        },
                    ))
                }
            }
        }

        let total = self.store.products().count(&filter).await?;
        let products = self.store.products().find_many(&filter, Some(page)).await?;
        let products = self.with_sellers(products).await?;

        Ok((
            products,
            Pagination {
                total,
                page: page.page,
                limit: page.limit,
                pages: page.pages(total),
            },
        ))
    }

    pub async fn get_by_id(&self, id: &str) -> Result<ProductResponse, CatalogError> {
        let product = self.find_visible(id).await?;
        let mut with_seller = self.with_sellers(vec![product]).await?;
        with_seller.pop().ok_or(CatalogError::NotFound)
    }

    #[instrument(name = "catalog::update", skip(self, req))]
    pub async fn update(
        &self,
        id: &str,
        caller_id: &str,
        req: UpdateProductRequest,
    ) -> Result<Product, CatalogError> {
        let existing = self.owned(id, caller_id, "update").await?;

        let patch = ProductPatch {
            title: req.title.as_deref().map(|t| required_text(t, "Title")).transpose()?,
            description: req
                .description
                .as_deref()
                .map(|d| required_text(d, "Description"))
                .transpose()?,
            price: req.price.map(|p| checked_amount(p, "Price")).transpose()?,
            mrp: req.mrp.map(|m| checked_amount(m, "MRP")).transpose()?,
            brand: req.brand.map(|b| {
                let b = b.trim();
                if b.is_empty() {
                    DEFAULT_BRAND.to_string()
                } else {
                    b.to_string()
                }
            }),
            category: req.category.as_deref().map(checked_category).transpose()?,
            images: req.images,
            stock: req.stock.map(checked_stock).transpose()?,
            exchange_or_return_eligibility: req.exchange_or_return_eligibility,
            published: req.published,
            is_active: None,
        };
        checked_mrp(
            patch.mrp.unwrap_or(existing.mrp),
            patch.price.unwrap_or(existing.price),
        )?;

        let product = self
            .store
            .products()
            .update_by_id(id, &patch)
            .await?
            .ok_or(CatalogError::NotFound)?;

        info!(product_id = %product.id, published = product.published, "Product updated");
        Ok(product)
    }

    #[instrument(name = "catalog::remove", skip(self))]
    pub async fn remove(&self, id: &str, caller_id: &str) -> Result<(), CatalogError> {
        self.owned(id, caller_id, "delete").await?;

        let removed = match self.removal {
            RemovalPolicy::Hard => self.store.products().delete_by_id(id).await?,
            RemovalPolicy::Soft => self
                .store
                .products()
                .update_by_id(id, &ProductPatch::deactivate())
                .await?
                .is_some(),
        };
        if !removed {
            return Err(CatalogError::NotFound);
        }

        info!(product_id = %id, policy = ?self.removal, "Product removed");
        Ok(())
    }

    /// Every active product the seller owns, published or not.
    pub async fn list_mine(&self, seller_id: &str) -> Result<Vec<Product>, CatalogError> {
        let filter = ProductFilter {
            seller: Some(seller_id.to_string()),
            active_only: true,
            ..ProductFilter::default()
        };
        Ok(self.store.products().find_many(&filter, None).await?)
    }

    /// The product `id` if it exists and belongs to `caller_id`. Existence is
    /// checked first, so a missing product is `NotFound` for everyone.
    pub async fn owned(
        &self,
        id: &str,
        caller_id: &str,
        action: &'static str,
    ) -> Result<Product, CatalogError> {
        let product = self.find_visible(id).await?;
        if product.seller != caller_id {
            return Err(CatalogError::Forbidden(action));
        }
        Ok(product)
    }

    async fn find_visible(&self, id: &str) -> Result<Product, CatalogError> {
        let filter = ProductFilter {
            active_only: !INACTIVE_VISIBLE_BY_ID,
            ..ProductFilter::by_id(id)
        };
        self.store
            .products()
            .find_one(&filter)
            .await?
            .ok_or(CatalogError::NotFound)
    }

    /// Attach the public seller profile to each product.
    async fn with_sellers(
        &self,
        products: Vec<Product>,
    ) -> Result<Vec<ProductResponse>, CatalogError> {
        let mut ids: Vec<String> = products.iter().map(|p| p.seller.clone()).collect();
        ids.sort();
        ids.dedup();

        let sellers: HashMap<String, SellerSummary> = if ids.is_empty() {
            HashMap::new()
        } else {
            self.store
                .users()
                .find_many(&UserFilter::Ids(ids), None)
                .await?
                .iter()
                .map(|u| (u.id.clone(), SellerSummary::from(u)))
                .collect()
        };

        Ok(products
            .into_iter()
            .map(|p| {
                let seller = sellers.get(&p.seller).cloned();
                ProductResponse::new(p, seller)
            })
            .collect())
    }
}
