use bson::oid::ObjectId;

use docmodel_core::{
    error::DocumentStoreError,
    model::Model,
    query::{Filter, Query},
};
use docmodel_memory::InMemoryStore;
use docmodel_stock::{
    CommonStockProduct, Formula, ShapeType, SimpleProduct, StockItem, StockProduct, StockState,
    StockVariant, Volume,
};

fn paint() -> StockProduct {
    StockProduct::new(StockVariant::material(
        CommonStockProduct::new("paint", ShapeType::Bucket, Volume::new(30, 30, 40))
            .with_bucket_height(12.5)
            .with_weight(1.0),
        SimpleProduct::new(ObjectId::new(), "kg"),
    ))
}

fn kit() -> StockProduct {
    StockProduct::new(StockVariant::formulas(
        CommonStockProduct::new("kit", ShapeType::Solid, Volume::new(10, 10, 5)),
        vec![
            Formula::new(2, SimpleProduct::new(ObjectId::new(), "pcs")),
            Formula::new(1, SimpleProduct::new(ObjectId::new(), "kg")),
        ],
    ))
}

#[tokio::test]
async fn basic_product_round_trips_through_the_model() {
    let model = Model::new(InMemoryStore::new());

    let mut product = paint();
    product.validate().unwrap();
    let id = model.save(&mut product, None).await.unwrap();
    assert_eq!(product.id, id);

    let mut found = StockProduct::new(kit().payload);
    found.id = id;
    model.find_by_id(&mut found).await.unwrap();

    assert_eq!(found, product);
    assert_eq!(found.kind(), "basic");
    assert_eq!(found.payload.as_material().and_then(|p| p.material.as_ref()).map(|m| m.unit.as_str()), Some("kg"));
}

#[tokio::test]
async fn mixed_shapes_decode_from_one_collection() {
    let model = Model::new(InMemoryStore::new());
    model.save(&mut paint(), None).await.unwrap();
    model.save(&mut kit(), None).await.unwrap();

    let all: Vec<StockProduct> = model.find(Query::new()).await.unwrap();
    let kinds: Vec<&str> = all.iter().map(|p| p.kind()).collect();
    assert_eq!(kinds, vec!["basic", "formula"]);

    let formulas: Vec<StockProduct> = model
        .find(Query::filtered(Filter::eq("typ", "formula")))
        .await
        .unwrap();
    assert_eq!(formulas.len(), 1);
    assert_eq!(formulas[0].payload.as_formulas().map(|p| p.formulas.len()), Some(2));
}

#[tokio::test]
async fn update_fields_rewrite_the_stored_record() {
    let model = Model::new(InMemoryStore::new());
    let mut product = paint();
    model.save(&mut product, None).await.unwrap();

    product.payload.common_mut().state = StockState::Stop;
    let fields = product.update_fields().unwrap();
    assert_eq!(model.update_one(&mut product, fields, None).await.unwrap(), 1);

    let stopped: Vec<StockProduct> = model
        .find(Query::filtered(Filter::eq("state", "stop")))
        .await
        .unwrap();
    assert_eq!(stopped.len(), 1);
    assert_eq!(stopped[0].state(), &StockState::Stop);
}

#[tokio::test]
async fn unknown_type_in_storage_is_reported() {
    let model = Model::new(InMemoryStore::new());
    model.save(&mut paint(), None).await.unwrap();

    let mut stray = paint();
    stray.payload.common_mut().typ = "widget".into();
    model.save(&mut stray, None).await.unwrap();

    let err = model.find::<StockProduct>(Query::new()).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::UnknownKind(ref kind) if kind == "widget"));

    let mut found = paint();
    found.id = stray.id.clone();
    let err = model.find_by_id(&mut found).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::UnknownKind(ref kind) if kind == "widget"));

    let mut prototype = paint();
    let err = model
        .find_and_exec(&mut prototype, Query::filtered(Filter::eq("typ", "widget")), |_| Ok(()))
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::UnknownKind(ref kind) if kind == "widget"));
}
