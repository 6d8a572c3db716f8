use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::seed::{NUM_PRODUCTS, NUM_USERS};
use crate::services::{CreateUser, ProductService, UserService};

/// Shape of one synthetic load run. Missing fields take the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadPlan {
    pub concurrency: u32,
    pub duration_secs: u64,
    /// Share of calls that are lookups, 0 to 100.
    pub read_pct: u8,
}

impl Default for LoadPlan {
    fn default() -> Self {
        Self {
            concurrency: 10,
            duration_secs: 90,
            read_pct: 70,
        }
    }
}

impl LoadPlan {
    pub const MAX_CONCURRENCY: u32 = 500;
    pub const MAX_DURATION_SECS: u64 = 600;

    /// Why the plan is unusable, if it is.
    pub fn problem(&self) -> Option<String> {
        if !(1..=Self::MAX_CONCURRENCY).contains(&self.concurrency) {
            return Some(format!("concurrency must be 1..={}", Self::MAX_CONCURRENCY));
        }
        if !(1..=Self::MAX_DURATION_SECS).contains(&self.duration_secs) {
            return Some(format!("duration_secs must be 1..={}", Self::MAX_DURATION_SECS));
        }
        if self.read_pct > 100 {
            return Some("read_pct must be 0..=100".into());
        }
        None
    }
}

// ─── Public entry point ──────────────────────────────────────────

/// Spawns `concurrency` Tokio tasks that call the instrumented service
/// layer until the deadline or until `running` is cleared.
pub async fn run(
    running: Arc<AtomicBool>,
    users: UserService,
    products: ProductService,
    plan: LoadPlan,
) {
    let deadline = Instant::now() + Duration::from_secs(plan.duration_secs);

    let mut handles = Vec::with_capacity(plan.concurrency as usize);

    for worker_id in 0..plan.concurrency {
        let running = running.clone();
        let users = users.clone();
        let products = products.clone();

        handles.push(tokio::spawn(async move {
            worker(worker_id, running, users, products, deadline, plan.read_pct).await;
        }));
    }

    for h in handles {
        let _ = h.await;
    }

    running.store(false, Ordering::SeqCst);
}

// ─── Worker loop ─────────────────────────────────────────────────

async fn worker(
    id: u32,
    running: Arc<AtomicBool>,
    users: UserService,
    products: ProductService,
    deadline: Instant,
    read_pct: u8,
) {
    // Each worker gets its own deterministic RNG seeded uniquely.
    let mut rng = StdRng::seed_from_u64(1000 + id as u64);
    let mut calls = 0u64;
    let mut failures = 0u64;

    while running.load(Ordering::Relaxed) && Instant::now() < deadline {
        let is_read = rng.gen_range(0u8..100) < read_pct;
        let ok = if is_read {
            do_read(&mut rng, &users, &products).await
        } else {
            do_write(&mut rng, &users, &products).await
        };
        calls += 1;
        if !ok {
            failures += 1;
        }
    }

    debug!(worker = id, calls, failures, "load worker finished");
}

// ─── Operations ──────────────────────────────────────────────────

async fn do_read(rng: &mut StdRng, users: &UserService, products: &ProductService) -> bool {
    // 60 % user lookups, 40 % product lookups
    if rng.gen_bool(0.6) {
        let id = format!("usr_{:08}", rng.gen_range(1..=NUM_USERS));
        users.find_user(&id).await.is_ok()
    } else {
        let id = format!("prod_{:04}", rng.gen_range(1..=NUM_PRODUCTS));
        products.find_product(&id).await.is_ok()
    }
}

/// One synthetic write. User writes always come in create/delete pairs so a
/// run leaves no `user:*` hashes behind.
#[derive(Debug, Clone, PartialEq, Eq)]
enum WriteOp {
    AdjustStock { product: String, delta: i64 },
    ChurnUser { email: String },
}

fn plan_write(rng: &mut StdRng) -> WriteOp {
    if rng.gen_bool(0.5) {
        WriteOp::AdjustStock {
            product: format!("prod_{:04}", rng.gen_range(1..=NUM_PRODUCTS)),
            delta: rng.gen_range(-3i64..=5),
        }
    } else {
        WriteOp::ChurnUser {
            email: format!("load{}@test.com", rng.gen::<u32>()),
        }
    }
}

async fn do_write(rng: &mut StdRng, users: &UserService, products: &ProductService) -> bool {
    match plan_write(rng) {
        WriteOp::AdjustStock { product, delta } => {
            products.adjust_stock(&product, delta).await.is_ok()
        }
        WriteOp::ChurnUser { email } => {
            let created = users
                .create_user(CreateUser {
                    name: "Load User".into(),
                    email,
                    role: "viewer".into(),
                })
                .await;
            match created {
                Ok(user) => matches!(users.delete_user(&user.id).await, Ok(true)),
                Err(_) => false,
            }
        }
    }
}
