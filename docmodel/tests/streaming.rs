mod common;

use common::{AdultView, User, model, seed};
use docmodel::{
    datasource::DataSource,
    error::DocumentStoreError,
    pipeline::AggregateOptions,
    query::{Filter, Query, SortDirection},
};

fn by_age() -> Query {
    Query::builder().sort("age", SortDirection::Asc).build()
}

#[tokio::test]
async fn rows_arrive_in_cursor_order_and_the_last_is_kept() {
    let model = model();
    seed(&model, 5).await;

    let mut prototype = User::new("", "", 0);
    let mut ages = Vec::new();
    model
        .find_and_exec(&mut prototype, by_age(), |user: &User| {
            ages.push(user.age);
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(ages, vec![1, 2, 3, 4, 5]);
    assert_eq!(prototype.age, 5);
}

#[tokio::test]
async fn a_failing_callback_stops_the_stream() {
    let model = model();
    seed(&model, 5).await;

    let mut prototype = User::new("proto@example.com", "proto", 0);
    let mut seen = 0;
    let err = model
        .find_and_exec(&mut prototype, by_age(), |user: &User| {
            seen += 1;
            if user.age == 3 {
                return Err(DocumentStoreError::callback(std::io::Error::other("stop")));
            }
            Ok(())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::Callback(_)));
    assert_eq!(seen, 3);
    assert_eq!(prototype.name, "proto");
}

#[tokio::test]
async fn csv_export_writes_one_header_then_each_row() {
    let model = model();
    seed(&model, 3).await;

    let mut source = model.find_data_source(User::new("", "", 0), by_age());
    let mut out = Vec::new();
    source
        .export_csv(&mut out, &["email", "age"], |writer, user: &User| {
            let age = user.age.to_string();
            writer.write_record([user.email.as_str(), age.as_str()])?;
            Ok(())
        })
        .await
        .unwrap();

    let text = String::from_utf8(out).unwrap();
    assert_eq!(
        text,
        "email,age\nuser001@example.com,1\nuser002@example.com,2\nuser003@example.com,3\n"
    );
    assert_eq!(source.prototype().age, 3);
}

#[tokio::test]
async fn data_sources_can_run_again() {
    let model = model();
    seed(&model, 4).await;

    let mut source = model.find_data_source(User::new("", "", 0), Query::filtered(Filter::gt("age", 2)));
    let mut first = 0;
    source
        .exec(|_| {
            first += 1;
            Ok(())
        })
        .await
        .unwrap();
    let mut second = 0;
    source
        .exec(|_| {
            second += 1;
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!((first, second), (2, 2));
}

#[tokio::test]
async fn pipeline_rows_stream_through_the_handle() {
    let model = model();
    for age in [12, 18, 30, 45] {
        model
            .save(&mut User::new(&format!("{age}@example.com"), "x", age), None)
            .await
            .unwrap();
    }

    let mut source = model.pipe_data_source(AdultView::default(), Filter::all(), AggregateOptions::new());
    let mut emails = Vec::new();
    source
        .exec(|row: &AdultView| {
            emails.push(row.email.clone());
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(emails, vec!["18@example.com", "30@example.com", "45@example.com"]);
    assert_eq!(source.into_prototype().age, 45);

    let mut first = AdultView::default();
    model.pipe_find_one(&mut first, &Filter::gt("age", 20)).await.unwrap();
    assert_eq!(first.age, 30);
}
