mod common;

use common::{AdultView, User, model, seed};
use docmodel::{
    page::{DEFAULT_LIMIT, paginate},
    query::{Filter, Query, Sort, SortDirection},
};

#[tokio::test]
async fn pages_are_clamped_to_what_exists() {
    let model = model();
    seed(&model, 25).await;

    let source = model.pagination_source::<User>(Query::builder().sort("age", SortDirection::Asc).build());

    let first = paginate(&source, 10, 1, |user: User| Some(user.age)).await.unwrap().unwrap();
    assert_eq!((first.total, first.all_pages, first.page, first.limit), (25, 3, 1, 10));
    assert_eq!(first.rows, (1..=10).collect::<Vec<_>>());

    let beyond = paginate(&source, 10, 10, |user: User| Some(user.age)).await.unwrap().unwrap();
    assert_eq!(beyond.page, 3);
    assert_eq!(beyond.rows, vec![21, 22, 23, 24, 25]);

    let oversized = paginate(&source, 1000, 1, Some).await.unwrap().unwrap();
    assert_eq!(oversized.limit, DEFAULT_LIMIT);
    assert_eq!(oversized.all_pages, 1);
}

#[tokio::test]
async fn empty_sources_have_no_pages() {
    let model = model();
    let source = model.pagination_source::<User>(Query::new());

    assert!(paginate(&source, 10, 1, Some).await.unwrap().is_none());
}

#[tokio::test]
async fn mapper_can_drop_rows() {
    let model = model();
    seed(&model, 6).await;

    let source = model.pagination_source::<User>(Query::filtered(Filter::lte("age", 6)));
    let page = paginate(&source, 6, 1, |user: User| (user.age % 2 == 0).then_some(user.email))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(page.total, 6);
    assert_eq!(page.rows.len(), 3);
}

#[tokio::test]
async fn pipeline_sources_count_two_ways() {
    let model = model();
    seed(&model, 30).await;

    let sort = vec![Sort::desc("age")];

    // Counting on the collection ignores the pipeline's own adult filter.
    let direct = model.pipe_pagination_source(AdultView::default(), Filter::all(), sort.clone());
    let page = paginate(&direct, 5, 1, Some).await.unwrap().unwrap();
    assert_eq!(page.total, 30);
    assert_eq!(page.all_pages, 6);
    assert_eq!(page.rows.iter().map(|row| row.age).collect::<Vec<_>>(), vec![30, 29, 28, 27, 26]);

    let matched = model.pipe_match_pagination_source(AdultView::default(), Filter::all(), sort);
    let page = paginate(&matched, 5, 3, Some).await.unwrap().unwrap();
    assert_eq!(page.total, 13);
    assert_eq!(page.all_pages, 3);
    assert_eq!(page.rows.iter().map(|row| row.age).collect::<Vec<_>>(), vec![20, 19, 18]);
}

#[tokio::test]
async fn paged_finds_use_defaults_for_bad_input() {
    let model = model();
    seed(&model, 60).await;

    let query = Query::builder().sort("age", SortDirection::Asc).build();
    let rows: Vec<User> = model.page_find(query.clone(), 0, 0).await.unwrap();
    assert_eq!(rows.len(), 50);
    assert_eq!(rows[0].age, 1);

    let rows: Vec<User> = model.page_find(query, 25, 3).await.unwrap();
    assert_eq!(rows.iter().map(|u| u.age).collect::<Vec<_>>(), (51..=60).collect::<Vec<_>>());

    let adults = model
        .page_pipe_find(&AdultView::default(), &Filter::all(), &[], 10, 1)
        .await
        .unwrap();
    assert_eq!(adults.first().map(|row| row.age), Some(18));

    let counted = model
        .count_aggr_documents(&AdultView::default(), &Filter::lt("age", 20))
        .await
        .unwrap();
    assert_eq!(counted, 2);

    let none = model
        .count_aggr_documents(&AdultView::default(), &Filter::lt("age", 10))
        .await
        .unwrap();
    assert_eq!(none, 0);
}

#[tokio::test]
async fn huge_page_requests_come_back_empty() {
    let model = model();
    seed(&model, 3).await;

    let rows: Vec<User> = model.page_find(Query::new(), 1_000_000_000_000, 100_000_000).await.unwrap();
    assert!(rows.is_empty());

    let rows = model
        .page_pipe_find(&AdultView::default(), &Filter::all(), &[], i64::MAX, i64::MAX)
        .await
        .unwrap();
    assert!(rows.is_empty());
}
