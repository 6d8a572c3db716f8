use std::collections::HashMap;
use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use crate::method_identity;
use crate::monitor::Interceptor;

use super::ServiceError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    /// Price in cents (e.g. 12999 = $129.99)
    pub price: u64,
    pub stock: i64,
    pub category: String,
}

/// Products stored as redis hashes under `product:{id}`.
#[derive(Clone)]
pub struct ProductService {
    redis: ConnectionManager,
    interceptor: Arc<Interceptor>,
}

impl ProductService {
    pub fn new(redis: ConnectionManager, interceptor: Arc<Interceptor>) -> Self {
        Self { redis, interceptor }
    }

    pub async fn find_product(&self, id: &str) -> Result<Product, ServiceError> {
        let identity = method_identity!("ProductService", "find_product", 1);
        self.interceptor
            .observe_service(&identity, self.load(id))
            .await
    }

    /// Add `delta` (may be negative) to the stock level; returns the new level.
    pub async fn adjust_stock(&self, id: &str, delta: i64) -> Result<i64, ServiceError> {
        let identity = method_identity!("ProductService", "adjust_stock", 2);
        self.interceptor
            .observe_service(&identity, self.increment_stock(id, delta))
            .await
    }

    async fn load(&self, id: &str) -> Result<Product, ServiceError> {
        let mut conn = self.redis.clone();
        let map: HashMap<String, String> = conn.hgetall(format!("product:{id}")).await?;
        if map.is_empty() {
            return Err(ServiceError::NotFound(format!("product '{id}'")));
        }
        Ok(product_from_map(&map))
    }

    async fn increment_stock(&self, id: &str, delta: i64) -> Result<i64, ServiceError> {
        let key = format!("product:{id}");
        let mut conn = self.redis.clone();
        let exists: bool = conn.exists(&key).await?;
        if !exists {
            return Err(ServiceError::NotFound(format!("product '{id}'")));
        }
        let stock: i64 = conn.hincr(&key, "stock", delta).await?;
        Ok(stock)
    }
}

fn product_from_map(map: &HashMap<String, String>) -> Product {
    let num = |field: &str| -> Option<i64> { map.get(field).and_then(|v| v.parse().ok()) };
    Product {
        id: map.get("id").cloned().unwrap_or_default(),
        title: map.get("title").cloned().unwrap_or_default(),
        price: num("price").unwrap_or_default().max(0) as u64,
        stock: num("stock").unwrap_or_default(),
        category: map.get("category").cloned().unwrap_or_default(),
    }
}
