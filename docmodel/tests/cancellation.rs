mod common;

use std::time::Duration;

use common::{User, model};
use docmodel::{error::DocumentStoreError, query::Query};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn cancelled_token_stops_every_call() {
    let token = CancellationToken::new();
    token.cancel();
    let model = model().with_cancellation(token);

    let err = model.find::<User>(Query::new()).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::Cancelled(_)));

    let err = model
        .save(&mut User::new("a@example.com", "A", 1), None)
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::Cancelled(_)));
}

#[tokio::test]
async fn cancellation_applies_to_later_calls() {
    let token = CancellationToken::new();
    let model = model().with_cancellation(token.clone());

    model.save(&mut User::new("a@example.com", "A", 1), None).await.unwrap();
    token.cancel();

    let err = model.find::<User>(Query::new()).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::Cancelled(_)));
}

#[tokio::test]
async fn passed_deadline_is_reported_as_cancelled() {
    let model = model().with_deadline(Instant::now() - Duration::from_millis(1));

    let err = model.count_documents::<User>(&Default::default()).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::Cancelled(_)));
}

#[tokio::test]
async fn future_deadline_lets_calls_through() {
    let model = model().with_deadline(Instant::now() + Duration::from_secs(30));

    model.save(&mut User::new("a@example.com", "A", 1), None).await.unwrap();
    assert_eq!(model.find::<User>(Query::new()).await.unwrap().len(), 1);
}
