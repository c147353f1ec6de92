mod common;

use common::{User, model};
use docmodel::{error::DocumentStoreError, query::Filter};

#[tokio::test]
async fn aborted_writes_are_discarded() {
    let model = model();
    model.save(&mut User::new("kept@example.com", "Kept", 1), None).await.unwrap();

    assert!(model.begin_transaction().await.unwrap());
    model.save(&mut User::new("gone@example.com", "Gone", 2), None).await.unwrap();
    assert_eq!(model.count_documents::<User>(&Filter::all()).await.unwrap(), 2);

    model.abort_transaction().await.unwrap();
    assert_eq!(model.count_documents::<User>(&Filter::all()).await.unwrap(), 1);
}

#[tokio::test]
async fn committed_writes_stay() {
    let model = model();

    assert!(model.begin_transaction().await.unwrap());
    model.save(&mut User::new("a@example.com", "A", 1), None).await.unwrap();
    model.commit_transaction().await.unwrap();

    assert_eq!(model.count_documents::<User>(&Filter::all()).await.unwrap(), 1);
}

#[tokio::test]
async fn begin_twice_is_not_an_error_but_finishing_twice_is() {
    let model = model();

    assert!(model.begin_transaction().await.unwrap());
    assert!(!model.begin_transaction().await.unwrap());
    model.commit_transaction().await.unwrap();

    let err = model.commit_transaction().await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::Transaction(_)));
    let err = model.abort_transaction().await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::Transaction(_)));
}

#[tokio::test]
async fn clones_share_the_transaction() {
    let model = model();
    let other = model.clone();

    assert!(model.begin_transaction().await.unwrap());
    other.save(&mut User::new("b@example.com", "B", 2), None).await.unwrap();
    other.abort_transaction().await.unwrap();

    assert_eq!(model.count_documents::<User>(&Filter::all()).await.unwrap(), 0);
}
