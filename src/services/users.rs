use std::collections::HashMap;
use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use crate::method_identity;
use crate::monitor::Interceptor;

use super::ServiceError;

// ─── Domain types ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "viewer".into()
}

// ─── Service ─────────────────────────────────────────────────────

/// Users stored as redis hashes under `user:{id}`.
#[derive(Clone)]
pub struct UserService {
    redis: ConnectionManager,
    interceptor: Arc<Interceptor>,
}

impl UserService {
    pub fn new(redis: ConnectionManager, interceptor: Arc<Interceptor>) -> Self {
        Self { redis, interceptor }
    }

    pub async fn find_user(&self, id: &str) -> Result<User, ServiceError> {
        let identity = method_identity!("UserService", "find_user", 1);
        self.interceptor
            .observe_service(&identity, self.load(id))
            .await
    }

    pub async fn create_user(&self, req: CreateUser) -> Result<User, ServiceError> {
        let identity = method_identity!("UserService", "create_user", 1);
        self.interceptor
            .observe_service(&identity, self.store(req))
            .await
    }

    /// `true` if a user was removed.
    pub async fn delete_user(&self, id: &str) -> Result<bool, ServiceError> {
        let identity = method_identity!("UserService", "delete_user", 1);
        self.interceptor
            .observe_service(&identity, self.remove(id))
            .await
    }

    async fn load(&self, id: &str) -> Result<User, ServiceError> {
        let mut conn = self.redis.clone();
        let map: HashMap<String, String> = conn.hgetall(format!("user:{id}")).await?;
        if map.is_empty() {
            return Err(ServiceError::NotFound(format!("user '{id}'")));
        }
        Ok(user_from_map(&map))
    }

    async fn store(&self, req: CreateUser) -> Result<User, ServiceError> {
        if req.name.trim().is_empty() || !req.email.contains('@') {
            return Err(ServiceError::Invalid(
                "name must be non-empty and email must contain '@'".into(),
            ));
        }

        let user = User {
            id: format!("usr_{}", &uuid::Uuid::new_v4().simple().to_string()[..8]),
            name: req.name,
            email: req.email,
            role: req.role,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let mut conn = self.redis.clone();
        let _: () = redis::cmd("HSET")
            .arg(format!("user:{}", user.id))
            .arg("id")
            .arg(&user.id)
            .arg("name")
            .arg(&user.name)
            .arg("email")
            .arg(&user.email)
            .arg("role")
            .arg(&user.role)
            .arg("created_at")
            .arg(&user.created_at)
            .query_async(&mut conn)
            .await?;
        Ok(user)
    }

    async fn remove(&self, id: &str) -> Result<bool, ServiceError> {
        let mut conn = self.redis.clone();
        let removed: i64 = conn.del(format!("user:{id}")).await?;
        Ok(removed > 0)
    }
}

// ─── Helpers ─────────────────────────────────────────────────────

fn user_from_map(map: &HashMap<String, String>) -> User {
    User {
        id: map.get("id").cloned().unwrap_or_default(),
        name: map.get("name").cloned().unwrap_or_default(),
        email: map.get("email").cloned().unwrap_or_default(),
        role: map.get("role").cloned().unwrap_or_default(),
        created_at: map.get("created_at").cloned().unwrap_or_default(),
    }
}
