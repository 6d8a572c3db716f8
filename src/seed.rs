use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use redis::aio::ConnectionManager;
use redis::RedisResult;
use std::time::Instant;
use tracing::info;

use crate::services::{Product, User};

pub const NUM_USERS: u32 = 2_000;
pub const NUM_PRODUCTS: u32 = 300;
/// Hashes written per pipeline round trip.
const BATCH: usize = 500;
const RNG_SEED: u64 = 42;

static GIVEN: &[&str] = &["Ada", "Grace", "Linus", "Barbara", "Ken", "Radia", "Dennis", "Frances"];
static FAMILY: &[&str] = &["Lovelace", "Hopper", "Torvalds", "Liskov", "Thompson", "Perlman"];
static ROLES: &[&str] = &["admin", "editor", "viewer"];
static KINDS: &[&str] = &["Cable", "Adapter", "Charger", "Stand", "Sleeve", "Hub"];
static TRAITS: &[&str] = &["Braided", "Slim", "Fast", "Rugged", "Travel"];
static CATEGORIES: &[&str] = &["accessories", "power", "storage", "desk"];

/// Deterministic demo data so that the load generator's random ids exist.
pub async fn seed(conn: &ConnectionManager) -> RedisResult<()> {
    let start = Instant::now();
    let mut conn = conn.clone();
    let mut rng = StdRng::seed_from_u64(RNG_SEED);

    let users: Vec<_> = (1..=NUM_USERS).map(|n| demo_user(n, &mut rng)).collect();
    for chunk in users.chunks(BATCH) {
        let mut pipe = redis::pipe();
        for user in chunk {
            pipe.hset_multiple(format!("user:{}", user.id), &user_fields(user))
                .ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
    }

    let mut pipe = redis::pipe();
    for n in 1..=NUM_PRODUCTS {
        let product = demo_product(n, &mut rng);
        pipe.hset_multiple(format!("product:{}", product.id), &product_fields(&product))
            .ignore();
    }
    let _: () = pipe.query_async(&mut conn).await?;

    info!(
        users = NUM_USERS,
        products = NUM_PRODUCTS,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "demo data seeded"
    );
    Ok(())
}

fn pick<'a>(rng: &mut StdRng, pool: &[&'a str]) -> &'a str {
    pool[rng.gen_range(0..pool.len())]
}

fn demo_user(n: u32, rng: &mut StdRng) -> User {
    let given = pick(rng, GIVEN);
    let family = pick(rng, FAMILY);
    User {
        id: format!("usr_{n:08}"),
        name: format!("{given} {family}"),
        email: format!("{}.{}{n}@example.com", given.to_lowercase(), family.to_lowercase()),
        role: pick(rng, ROLES).to_owned(),
        created_at: "2025-01-15T09:23:11Z".to_owned(),
    }
}

fn demo_product(n: u32, rng: &mut StdRng) -> Product {
    Product {
        id: format!("prod_{n:04}"),
        title: format!("{} {}", pick(rng, TRAITS), pick(rng, KINDS)),
        price: rng.gen_range(499..=24_999),
        stock: rng.gen_range(0..=500),
        category: pick(rng, CATEGORIES).to_owned(),
    }
}

fn user_fields(user: &User) -> [(&'static str, String); 5] {
    [
        ("id", user.id.clone()),
        ("name", user.name.clone()),
        ("email", user.email.clone()),
        ("role", user.role.clone()),
        ("created_at", user.created_at.clone()),
    ]
}

fn product_fields(product: &Product) -> [(&'static str, String); 5] {
    [
        ("id", product.id.clone()),
        ("title", product.title.clone()),
        ("price", product.price.to_string()),
        ("stock", product.stock.to_string()),
        ("category", product.category.clone()),
    ]
}
