use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::error::{ApiJson, ApiQuery, AppError, ErrorBody, Result};
use crate::middleware::auth::AuthUser;
use crate::models::product::{
    CreateProductRequest, DeleteResponse, MyProductsResponse, ProductDetailResponse,
    ProductEnvelope, ProductListQuery, ProductListResponse, ProductResponse, UpdateProductRequest,
};
use crate::services::catalog::CatalogService;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/my-products", get(my_products))
        .route(
            "/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
}

#[utoipa::path(
    get,
    path = "/products",
    params(ProductListQuery),
    responses(
        (status = 200, description = "One page of active products", body = ProductListResponse),
    ),
    tag = "Products"
)]
pub(crate) async fn list_products(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductListQuery>,
) -> Result<Json<ProductListResponse>> {
    let (products, pagination) = CatalogService::new(&state).list(query).await?;
    Ok(Json(ProductListResponse {
        message: "Products retrieved successfully".to_string(),
        products,
        pagination,
    }))
}

#[utoipa::path(
    post,
    path = "/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductEnvelope),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "Products"
)]
pub(crate) async fn create_product(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductEnvelope>)> {
    let product = CatalogService::new(&state)
        .create(&auth.user_id, req)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ProductEnvelope {
            success: true,
            message: "Product created successfully".to_string(),
            product: product.into(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/products/my-products",
    responses(
        (status = 200, description = "Products owned by the caller", body = MyProductsResponse),
        (status = 401, description = "Unauthorized", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "Products"
)]
pub(crate) async fn my_products(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<MyProductsResponse>> {
    let products = CatalogService::new(&state)
        .list_mine(&auth.user_id)
        .await?;
    Ok(Json(MyProductsResponse {
        message: "Your products retrieved successfully".to_string(),
        products: products.into_iter().map(ProductResponse::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/products/{id}",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product with seller summary", body = ProductDetailResponse),
        (status = 404, description = "Product not found", body = ErrorBody),
    ),
    tag = "Products"
)]
pub(crate) async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductDetailResponse>> {
    let product = CatalogService::new(&state).get_by_id(&id).await?;
    Ok(Json(ProductDetailResponse {
        message: "Product retrieved successfully".to_string(),
        product,
    }))
}

#[utoipa::path(
    put,
    path = "/products/{id}",
    params(("id" = String, Path, description = "Product id")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ProductEnvelope),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "Caller does not own the product", body = ErrorBody),
        (status = 404, description = "Product not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "Products"
)]
pub(crate) async fn update_product(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ProductEnvelope>> {
    let catalog = CatalogService::new(&state);
    // Ownership is settled before the body is decoded.
    catalog.owned(&id, &auth.user_id, "update").await?;
    let req: UpdateProductRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid product data: {e}")))?;
    let product = catalog.update(&id, &auth.user_id, req).await?;
    Ok(Json(ProductEnvelope {
        success: true,
        message: "Product updated successfully".to_string(),
        product: product.into(),
    }))
}

#[utoipa::path(
    delete,
    path = "/products/{id}",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product removed", body = DeleteResponse),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "Caller does not own the product", body = ErrorBody),
        (status = 404, description = "Product not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "Products"
)]
pub(crate) async fn delete_product(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    CatalogService::new(&state)
        .remove(&id, &auth.user_id)
        .await?;
    Ok(Json(DeleteResponse {
        success: true,
        message: "Product deleted successfully".to_string(),
    }))
}
