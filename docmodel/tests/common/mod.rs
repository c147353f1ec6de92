#![allow(dead_code)]

use docmodel::{
    audit::{Actor, AuditLog},
    bson::{Bson, doc, oid::ObjectId},
    document::{Aggregate, Collection, Document, IndexSpec},
    memory::InMemoryStore,
    model::Model,
    pipeline::{Pipeline, Stage},
    query::{Expr, Filter},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    pub name: String,
    pub age: i32,
    #[serde(default)]
    pub records: AuditLog,
}

impl User {
    pub fn new(email: &str, name: &str, age: i32) -> Self {
        Self {
            id: None,
            email: email.to_string(),
            name: name.to_string(),
            age,
            records: AuditLog::new(),
        }
    }

    pub fn numbered(n: i32) -> Self {
        Self::new(&format!("user{n:03}@example.com"), &format!("user {n}"), n)
    }
}

impl Collection for User {
    fn collection_name() -> &'static str {
        "users"
    }
}

impl Document for User {
    fn id(&self) -> Bson {
        self.id.map(Bson::ObjectId).unwrap_or(Bson::Null)
    }

    fn set_id(&mut self, id: Bson) {
        if let Bson::ObjectId(oid) = id {
            self.id = Some(oid);
        }
    }

    fn indexes() -> Vec<IndexSpec> {
        vec![IndexSpec::ascending("email").unique()]
    }

    fn audit_log(&mut self) -> Option<&mut AuditLog> {
        Some(&mut self.records)
    }
}

/// Email and age of users, adults only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdultView {
    pub email: String,
    pub age: i32,
}

impl Collection for AdultView {
    fn collection_name() -> &'static str {
        "users"
    }
}

impl Aggregate for AdultView {
    fn pipeline(&self, filter: &Expr) -> Pipeline {
        vec![
            Stage::Match(filter.clone()),
            Stage::Match(Filter::gte("age", 18)),
            Stage::Project(doc! { "_id": 0, "email": 1, "age": 1 }),
        ]
    }
}

pub struct Clerk;

impl Actor for Clerk {
    fn name(&self) -> &str {
        "Clerk"
    }

    fn account(&self) -> &str {
        "clerk@example.com"
    }
}

pub fn model() -> Model<InMemoryStore> {
    Model::new(InMemoryStore::new())
}

/// Saves users aged `1..=count`.
pub async fn seed(model: &Model<InMemoryStore>, count: i32) {
    let users: Vec<User> = (1..=count).map(User::numbered).collect();
    let saved = model.batch_save(users, None).await.unwrap();
    assert!(saved.failed.is_empty());
}
