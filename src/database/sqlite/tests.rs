use super::*;
use tempfile::TempDir;

#[tokio::test]
async fn new_creates_database_and_runs_migrations() {
    let dir = TempDir::new().expect("tempdir should be created");
    let db_path = dir.path().join("test.db");

    let database = Database::new(&db_path).await.expect("database should open");
    assert!(db_path.exists());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(database.pool())
        .await
        .expect("products table should exist");
    assert_eq!(count, 0);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM page_contexts")
        .fetch_one(database.pool())
        .await
        .expect("page_contexts table should exist");
    assert_eq!(count, 0);
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let dir = TempDir::new().expect("tempdir should be created");
    let database = Database::new(dir.path().join("test.db"))
        .await
        .expect("database should open");

    database
        .run_migrations()
        .await
        .expect("second migration run should be a no-op");
}

#[tokio::test]
async fn initialize_from_config_dir_creates_missing_directories() {
    let dir = TempDir::new().expect("tempdir should be created");
    let nested = dir.path().join("deeply").join("nested");

    let database = Database::initialize_from_config_dir(&nested)
        .await
        .expect("database should initialize");

    assert!(nested.join("admatch.db").exists());
    drop(database);
}
