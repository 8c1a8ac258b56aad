//! Admin seeder: creates or refreshes the admin account.
//!
//! Usage: `cargo run --bin seed`
//!
//! Requires `DATABASE_URL`, `ADMIN_EMAIL` and `ADMIN_PASSWORD` (reads .env).
//! `ADMIN_FIRST_NAME` / `ADMIN_LAST_NAME` default to "Admin" / "User".

use anyhow::Context;
use sqlx::PgPool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let db_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let email = std::env::var("ADMIN_EMAIL")
        .context("ADMIN_EMAIL must be set")?
        .trim()
        .to_lowercase();
    let password = std::env::var("ADMIN_PASSWORD").context("ADMIN_PASSWORD must be set")?;
    anyhow::ensure!(!password.is_empty(), "ADMIN_PASSWORD must not be empty");

    let first_name = std::env::var("ADMIN_FIRST_NAME").unwrap_or_else(|_| "Admin".to_string());
    let last_name = std::env::var("ADMIN_LAST_NAME").unwrap_or_else(|_| "User".to_string());

    let pool = driver_intake::db::create_pool(&db_url, 5).await?;

    // Run migrations first
    sqlx::migrate!("./migrations").run(&pool).await?;

    println!("=== Driver Intake Seed Script ===");
    seed_admin_user(&pool, &email, &password, &first_name, &last_name).await?;
    println!("\n=== Seed complete! ===");
    println!("Admin login: {email}");

    Ok(())
}

async fn seed_admin_user(
    pool: &PgPool,
    email: &str,
    password: &str,
    first_name: &str,
    last_name: &str,
) -> anyhow::Result<()> {
    let hash = driver_intake::services::auth::hash_password(password)?;

    let created: bool = sqlx::query_scalar(
        r#"
        INSERT INTO users (email, password_hash, first_name, last_name, role, is_active)
        VALUES ($1, $2, $3, $4, 'admin', TRUE)
        ON CONFLICT (email) DO UPDATE
            SET password_hash = EXCLUDED.password_hash,
                role = 'admin',
                is_active = TRUE,
                updated_at = NOW()
        RETURNING (xmax = 0)
        "#,
    )
    .bind(email)
    .bind(&hash)
    .bind(first_name)
    .bind(last_name)
    .fetch_one(pool)
    .await?;

    if created {
        println!("[done] Created admin user {email}");
    } else {
        println!("[done] Updated admin user {email}");
    }
    Ok(())
}
