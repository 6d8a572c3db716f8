use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::services::Product;
use crate::AppState;

use super::AppError;

#[derive(Debug, Deserialize)]
pub struct StockAdjustment {
    pub delta: i64,
}

#[derive(Debug, Serialize)]
pub struct StockLevel {
    pub id: String,
    pub stock: i64,
}

// ─── GET /api/products/:id ───────────────────────────────────────

pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(state.products.find_product(&id).await?))
}

// ─── PUT /api/products/:id/stock ─────────────────────────────────

pub async fn adjust_stock(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(adj): Json<StockAdjustment>,
) -> Result<Json<StockLevel>, AppError> {
    let stock = state.products.adjust_stock(&id, adj.delta).await?;
    Ok(Json(StockLevel { id, stock }))
}
