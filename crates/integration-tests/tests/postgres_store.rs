//! `PostgreSQL` store tests.
//!
//! These tests require a migratable database in `DATABASE_URL`.
//!
//! Run with: `cargo test -p handover-integration-tests -- --ignored`

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use secrecy::SecretString;
use sqlx::PgPool;

use handover_core::{DeliveryId, DeliveryStatus, MagicToken, PrincipalId, Quantity};
use handover_server::db::{
    self, DeliveryStore, PgDeliveryStore, PgPrincipalStore, PrincipalStore, RepositoryError,
};
use handover_server::models::{
    Completion, DeliveryFilter, ItemDelivered, NewDelivery, NewDeliveryItem, NewPrincipal,
};

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = db::create_pool(&SecretString::from(url)).await.unwrap();
    sqlx::migrate!("../server/migrations").run(&pool).await.unwrap();
    pool
}

fn new_delivery(driver: Option<PrincipalId>) -> NewDelivery {
    NewDelivery {
        customer_name: "Acme Co".to_string(),
        invoice_number: format!("INV-{}", PrincipalId::generate()),
        order_ref: None,
        delivery_date_time: None,
        notes: None,
        assigned_driver_id: driver,
        invoice_file_path: None,
        items: vec![
            NewDeliveryItem {
                name: "Box".to_string(),
                qty: Quantity::new(5).unwrap(),
            },
            NewDeliveryItem {
                name: "Tape".to_string(),
                qty: Quantity::new(2).unwrap(),
            },
        ],
    }
}

fn completion(items: Vec<ItemDelivered>) -> Completion {
    Completion {
        items,
        signature_path: "signatures/abc.png".to_string(),
        photo_path: None,
        delivered_at: Utc::now(),
    }
}

async fn driver(principals: &PgPrincipalStore) -> PrincipalId {
    principals
        .create(NewPrincipal::driver(Some("Dana".to_string()), None))
        .await
        .unwrap()
        .id
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_create_preserves_item_order() {
    let pool = pool().await;
    let deliveries = PgDeliveryStore::new(pool);

    let created = deliveries.create(new_delivery(None)).await.unwrap();
    let names: Vec<&str> = created.items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["Box", "Tape"]);
    assert_eq!(created.status, DeliveryStatus::Pending);

    let found = deliveries.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(found.items.len(), 2);
    assert_eq!(found.items[0].id, created.items[0].id);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_create_with_unknown_driver_persists_nothing() {
    let pool = pool().await;
    let deliveries = PgDeliveryStore::new(pool);

    let ghost = PrincipalId::generate();
    let result = deliveries.create(new_delivery(Some(ghost))).await;
    assert!(matches!(result, Err(RepositoryError::NotFound)));

    let filter = DeliveryFilter {
        status: None,
        driver_id: Some(ghost),
    };
    assert!(deliveries.list(&filter).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_concurrent_completion_has_one_winner() {
    let pool = pool().await;
    let principals = PgPrincipalStore::new(pool.clone());
    let deliveries = PgDeliveryStore::new(pool);
    let d1 = driver(&principals).await;
    let created = deliveries.create(new_delivery(Some(d1))).await.unwrap();

    let item = created.items[0].id;
    let first = completion(vec![ItemDelivered {
        item_id: item,
        delivered_qty: Quantity::new(5).unwrap(),
    }]);
    let second = completion(vec![ItemDelivered {
        item_id: item,
        delivered_qty: Quantity::new(1).unwrap(),
    }]);

    let (a, b) = tokio::join!(
        deliveries.complete(created.id, &first),
        deliveries.complete(created.id, &second),
    );
    let wins = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    assert!(
        [&a, &b]
            .iter()
            .any(|r| matches!(r, Err(RepositoryError::StaleState(DeliveryStatus::Delivered))))
    );

    let winner = a.as_ref().or(b.as_ref()).unwrap();
    let stored = deliveries.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(stored.items[0].delivered_qty, winner.items[0].delivered_qty);
    assert_eq!(stored.items[1].delivered_qty, None);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_assign_after_delivery_is_stale() {
    let pool = pool().await;
    let principals = PgPrincipalStore::new(pool.clone());
    let deliveries = PgDeliveryStore::new(pool);
    let d1 = driver(&principals).await;
    let d2 = driver(&principals).await;
    let created = deliveries.create(new_delivery(None)).await.unwrap();

    let assigned = deliveries.assign_driver(created.id, Some(d1)).await.unwrap();
    assert_eq!(assigned.assigned_driver_id, Some(d1));

    deliveries
        .complete(created.id, &completion(Vec::new()))
        .await
        .unwrap();
    assert!(matches!(
        deliveries.assign_driver(created.id, Some(d2)).await,
        Err(RepositoryError::StaleState(DeliveryStatus::Delivered))
    ));
    assert!(matches!(
        deliveries.assign_driver(DeliveryId::generate(), None).await,
        Err(RepositoryError::NotFound)
    ));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_driver_filter_isolation() {
    let pool = pool().await;
    let principals = PgPrincipalStore::new(pool.clone());
    let deliveries = PgDeliveryStore::new(pool);
    let d1 = driver(&principals).await;
    let d2 = driver(&principals).await;

    let older = deliveries.create(new_delivery(Some(d1))).await.unwrap();
    let newer = deliveries.create(new_delivery(Some(d1))).await.unwrap();
    deliveries.create(new_delivery(Some(d2))).await.unwrap();

    let filter = DeliveryFilter {
        status: Some(DeliveryStatus::Pending),
        driver_id: Some(d1),
    };
    let ids: Vec<_> = deliveries
        .list(&filter)
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(ids, [newer.id, older.id]);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_magic_token_lookup_and_uniqueness() {
    let pool = pool().await;
    let principals = PgPrincipalStore::new(pool);
    let d1 = driver(&principals).await;
    let d2 = driver(&principals).await;

    let token: MagicToken = format!("{}-test", PrincipalId::generate().as_uuid().simple())
        .parse()
        .unwrap();
    principals.set_magic_token(d1, Some(&token)).await.unwrap();
    let found = principals
        .find_driver_by_magic_token(&token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, d1);

    assert!(matches!(
        principals.set_magic_token(d2, Some(&token)).await,
        Err(RepositoryError::Conflict(_))
    ));

    principals.set_magic_token(d1, None).await.unwrap();
    assert!(
        principals
            .find_driver_by_magic_token(&token)
            .await
            .unwrap()
            .is_none()
    );
}
