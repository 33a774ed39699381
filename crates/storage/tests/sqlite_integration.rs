use lesson_core::model::Role;
use lesson_core::time::fixed_now;
use storage::repository::{Storage, StorageError, StoredToken, TokenRepository};
use storage::sqlite::SqliteRepository;

#[tokio::test]
async fn sqlite_roundtrips_tokens_per_role() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_tokens?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    repo.save_token(&StoredToken::new(Role::Admin, "a-1", fixed_now()))
        .await
        .unwrap();
    repo.save_token(&StoredToken::new(Role::User, "u-1", fixed_now()))
        .await
        .unwrap();
    repo.save_token(&StoredToken::new(Role::User, "u-2", fixed_now()))
        .await
        .unwrap();

    let tokens = repo.load_tokens().await.unwrap();
    assert_eq!(tokens.len(), 2);
    let user = repo.get_token(Role::User).await.unwrap();
    assert_eq!(user.token, "u-2");
    assert_eq!(user.stored_at, fixed_now());

    repo.clear_token(Role::User).await.unwrap();
    assert!(matches!(
        repo.get_token(Role::User).await,
        Err(StorageError::NotFound)
    ));
    assert_eq!(repo.get_token(Role::Admin).await.unwrap().token, "a-1");
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_migrate_twice?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.migrate().await.expect("second migrate");

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schema_migrations")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(count.0, 1);
}

#[tokio::test]
async fn storage_sqlite_builder_migrates() {
    let storage = Storage::sqlite("sqlite:file:memdb_storage_builder?mode=memory&cache=shared")
        .await
        .expect("storage");
    storage
        .tokens
        .save_token(&StoredToken::new(Role::Teacher, "t", fixed_now()))
        .await
        .unwrap();
    assert_eq!(storage.tokens.load_tokens().await.unwrap().len(), 1);
}
