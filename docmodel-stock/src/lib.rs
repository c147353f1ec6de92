//! Stock products stored as a polymorphic document family.
//!
//! All products live in the `stockproduct` collection. A record's `typ` field
//! decides its shape: `basic` products reference one raw material and `formula`
//! products list the products they are made of. [`StockProduct`] wraps either
//! shape with its identity and can be handed to a `Model` like any other
//! document.
//!
//! ```ignore
//! use docmodel_stock::{CommonStockProduct, ShapeType, SimpleProduct, StockItem, StockProduct, StockVariant, Volume};
//!
//! let product = StockProduct::new(StockVariant::material(
//!     CommonStockProduct::new("paint", ShapeType::Bucket, Volume::new(30, 30, 40)).with_bucket_height(12.0),
//!     SimpleProduct::new(material_id, "kg"),
//! ));
//! product.validate()?;
//! model.save(&mut product.clone(), Some(&clerk)).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_stock;

pub mod error;
pub mod kinds;
pub mod product;

pub use error::ValidationError;
pub use kinds::{ProductType, ShapeType, StockState};
pub use product::{
    CommonStockProduct, Formula, STOCK_PRODUCT_COLLECTION, SimpleProduct, StockItem, StockProduct,
    StockProductFormulas, StockProductMaterial, StockVariant, Volume,
};
