
use encore_storage::settings::{self, SETTING_DEVICE_ID};
use encore_sync::{device_id, DeviceIdentity};
use test_helpers::*;

#[tokio::test]
async fn test_device_id_is_generated_once() {
    let db = TestDb::new().await;

    let first = device_id(&db.pool).await.unwrap();
    let second = device_id(&db.pool).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 36);
}

#[tokio::test]
async fn test_device_id_survives_restart() {
    let db = TestDb::new().await;
    let first = device_id(&db.pool).await.unwrap();

    let reopened = db.reopen().await;
    assert_eq!(device_id(&reopened).await.unwrap(), first);
}

#[tokio::test]
async fn test_corrupt_device_id_is_replaced() {
    let db = TestDb::new().await;
    settings::set(&db.pool, SETTING_DEVICE_ID, &serde_json::json!(42))
        .await
        .unwrap();

    let id = device_id(&db.pool).await.unwrap();

    assert_eq!(id.len(), 36);
    assert_eq!(
        settings::get(&db.pool, SETTING_DEVICE_ID).await.unwrap(),
        Some(serde_json::Value::String(id))
    );
}

#[tokio::test]
async fn test_identity_combines_id_and_name() {
    let db = TestDb::new().await;

    let identity = DeviceIdentity::load(&db.pool, "Encore/0.1.0 (linux)").await.unwrap();

    assert_eq!(identity.name, "Encore on Linux");
    assert_eq!(identity.id, device_id(&db.pool).await.unwrap());
}
