use storage::keys::{AUTH_TOKEN, USER_ID};
use storage::repository::{KeyValueStore, Storage};
use storage::sqlite::SqliteStore;

#[tokio::test]
async fn sqlite_store_upserts_and_removes() {
    let store = SqliteStore::connect("sqlite:file:memdb_kv_upsert?mode=memory&cache=shared")
        .await
        .expect("connect");
    store.migrate().await.expect("migrate");

    store.set(AUTH_TOKEN, "first").await.unwrap();
    store.set(AUTH_TOKEN, "second").await.unwrap();
    assert_eq!(
        store.get(AUTH_TOKEN).await.unwrap().as_deref(),
        Some("second")
    );

    store.remove(AUTH_TOKEN).await.unwrap();
    assert_eq!(store.get(AUTH_TOKEN).await.unwrap(), None);
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let store = SqliteStore::connect("sqlite:file:memdb_kv_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    store.migrate().await.expect("first migrate");
    store.set(USER_ID, "7").await.unwrap();
    store.migrate().await.expect("second migrate");

    assert_eq!(store.get(USER_ID).await.unwrap().as_deref(), Some("7"));
}

#[tokio::test]
async fn clear_empties_persistent_scope() {
    let storage = Storage::sqlite("sqlite:file:memdb_kv_clear?mode=memory&cache=shared")
        .await
        .expect("storage");
    storage.persistent.set(AUTH_TOKEN, "t").await.unwrap();
    storage.persistent.set(USER_ID, "1").await.unwrap();

    storage.persistent.clear().await.unwrap();
    assert_eq!(storage.persistent.get(AUTH_TOKEN).await.unwrap(), None);
    assert_eq!(storage.persistent.get(USER_ID).await.unwrap(), None);
}
