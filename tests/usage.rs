mod util;

use aws_sdk_dynamodb::model::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType,
};
use std::time::Duration;
use util::*;
use uuid::Uuid;

#[tokio::test]
async fn try_acquire() {
    let table = "test-locks";
    let db_client = localhost_dynamodb().await;
    create_lock_table(table, &db_client).await;

    let client = dynamodb_lock::Client::builder()
        .table_name(table)
        .build(db_client)
        .await
        .unwrap();

    let name = format!("try_acquire:{}", Uuid::new_v4());

    let lock1 = client.try_acquire(&name, None).await;
    assert!(lock1.is_some());

    // subsequent attempts should fail
    assert!(client.try_acquire(&name, None).await.is_none());
    assert!(client.try_acquire(&name, None).await.is_none());

    assert!(client.release(&lock1.unwrap(), None).await);

    // in shortish order the key should be acquirable again
    retry::until_ok(|| async {
        client
            .try_acquire(&name, None)
            .await
            .ok_or_else(|| anyhow::anyhow!("did not acquire"))
    })
    .await;
}

#[tokio::test]
async fn acquire_waits_for_release() {
    let table = "test-locks";
    let db_client = localhost_dynamodb().await;
    create_lock_table(table, &db_client).await;

    let client = dynamodb_lock::Client::builder()
        .table_name(table)
        .build(db_client)
        .await
        .unwrap();

    let name = format!("acquire:{}", Uuid::new_v4());

    let lock1 = client.acquire(&name, None).await.unwrap();

    // a contender should not acquire while lock1 is alive
    let contender = tokio::time::timeout(Duration::from_millis(100), client.acquire(&name, None)).await;
    assert!(contender.is_err(), "should not acquire while lock1 is alive");

    assert!(client.release(&lock1, None).await);

    tokio::time::timeout(TEST_WAIT, client.acquire(&name, None))
        .await
        .expect("could not acquire after release")
        .expect("failed to acquire");
}

#[tokio::test]
async fn guard_releases_on_drop() {
    let table = "test-locks";
    let db_client = localhost_dynamodb().await;
    create_lock_table(table, &db_client).await;

    let client = dynamodb_lock::Client::builder()
        .table_name(table)
        .build(db_client)
        .await
        .unwrap();

    let name = format!("guard:{}", Uuid::new_v4());

    let guard = client.acquire_guarded(&name, None).await.unwrap();
    assert!(client.try_acquire(&name, None).await.is_none());

    drop(guard);

    retry::until_ok(|| async {
        client
            .try_acquire(&name, None)
            .await
            .ok_or_else(|| anyhow::anyhow!("did not acquire"))
    })
    .await;
}

#[tokio::test]
async fn retrieve_sees_foreign_owner_without_version() {
    let table = "test-locks";
    let db_client = localhost_dynamodb().await;
    create_lock_table(table, &db_client).await;

    let client_a = dynamodb_lock::Client::builder()
        .table_name(table)
        .build(db_client.clone())
        .await
        .unwrap();
    let client_b = dynamodb_lock::Client::builder()
        .table_name(table)
        .build(db_client)
        .await
        .unwrap();

    let name = format!("retrieve:{}", Uuid::new_v4());
    client_a.acquire(&name, None).await.unwrap();

    let seen = client_b.retrieve(&name).await.expect("record exists");
    assert_ne!(seen.owner(), "");
    assert!(client_b.exists(&name).await);
}

#[tokio::test]
async fn init_should_check_table_exists() {
    let db_client = localhost_dynamodb().await;

    let err = dynamodb_lock::Client::builder()
        .table_name("test-locks-not-exists")
        .build(db_client)
        .await
        .expect_err("should check table exists");
    assert!(!err.to_string().is_empty());
}

#[tokio::test]
async fn init_should_check_hash_key() {
    let table_name = "table-with-wrong-key";
    let db_client = localhost_dynamodb().await;

    let _ = db_client
        .create_table()
        .table_name(table_name)
        .billing_mode(BillingMode::PayPerRequest)
        .attribute_definitions(
            AttributeDefinition::builder()
                .attribute_name("wrong")
                .attribute_type(ScalarAttributeType::S)
                .build(),
        )
        .key_schema(
            KeySchemaElement::builder()
                .attribute_name("wrong")
                .key_type(KeyType::Hash)
                .build(),
        )
        .send()
        .await;

    let err = dynamodb_lock::Client::builder()
        .table_name(table_name)
        .build(db_client)
        .await
        .expect_err("should check hash key");
    assert!(
        err.to_string().to_ascii_lowercase().contains("hash key"),
        "{}",
        err
    );
}
