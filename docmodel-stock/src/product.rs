//! Stock products: one collection, two shapes.
//!
//! Every record carries the [`CommonStockProduct`] fields. The `typ` field picks
//! the rest: `basic` records hold a single `material`, `formula` records hold a
//! list of `formulas`.

use bson::{Document as BsonDocument, de::deserialize_from_document, oid::ObjectId, ser::serialize_to_bson};
use serde::{Deserialize, Deserializer, Serialize};

use docmodel_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    variant::{Envelope, Polymorphic},
};

use crate::{
    error::ValidationError,
    kinds::{ProductType, ShapeType, StockState},
};

/// Collection holding every stock product.
pub const STOCK_PRODUCT_COLLECTION: &str = "stockproduct";

/// A stored stock product of either shape.
pub type StockProduct = Envelope<StockVariant>;

/// Package dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Volume {
    pub length: i64,
    pub width: i64,
    pub height: i64,
}

impl Volume {
    pub fn new(length: i64, width: i64, height: i64) -> Self {
        Self { length, width, height }
    }
}

/// Fields shared by both shapes, including the `typ` discriminator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonStockProduct {
    pub name: String,
    pub typ: ProductType,
    pub volume: Option<Volume>,
    pub shape: ShapeType,
    /// Height added by each extra bucket. Only meaningful for bucket shapes.
    #[serde(rename = "bucketheight")]
    pub bucket_height: f64,
    pub weight: f64,
    pub state: StockState,
}

impl CommonStockProduct {
    pub fn new(name: impl Into<String>, shape: ShapeType, volume: Volume) -> Self {
        Self {
            name: name.into(),
            volume: Some(volume),
            shape,
            state: StockState::Supply,
            ..Default::default()
        }
    }

    pub fn with_bucket_height(mut self, height: f64) -> Self {
        self.bucket_height = height;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_state(mut self, state: StockState) -> Self {
        self.state = state;
        self
    }

    /// Checks the shared fields, stopping at the first problem.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::MissingName);
        }

        if !matches!(self.typ, ProductType::Basic | ProductType::Formula) {
            return Err(ValidationError::UnsupportedType(self.typ.clone()));
        }

        let volume = self.volume.as_ref().ok_or(ValidationError::MissingVolume)?;
        for (dimension, value) in [("height", volume.height), ("length", volume.length), ("width", volume.width)] {
            if value < 0 {
                return Err(ValidationError::NegativeDimension(dimension));
            }
        }

        if !self.shape.is_known() {
            return Err(ValidationError::UnknownShape(self.shape.clone()));
        }

        if self.shape == ShapeType::Bucket {
            if self.bucket_height < 0.0 {
                return Err(ValidationError::NegativeBucketHeight);
            }
        } else if self.bucket_height != 0.0 {
            return Err(ValidationError::BucketHeightNotAllowed(self.shape.clone()));
        }

        if self.weight < 0.0 {
            return Err(ValidationError::NegativeWeight);
        }

        if !self.state.is_known() {
            return Err(ValidationError::UnknownState(self.state.clone()));
        }

        Ok(())
    }

    /// The shared fields as a `$set` body, in stored order.
    pub fn update_fields(&self) -> DocumentStoreResult<BsonDocument> {
        let mut fields = BsonDocument::new();
        fields.insert("name", self.name.as_str());
        fields.insert("typ", self.typ.clone());
        fields.insert("volume", serialize_to_bson(&self.volume)?);
        fields.insert("shape", self.shape.clone());
        fields.insert("bucketheight", self.bucket_height);
        fields.insert("weight", self.weight);
        fields.insert("state", self.state.clone());
        Ok(fields)
    }
}

/// A reference to a raw material.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleProduct {
    #[serde(rename = "materialid", skip_serializing_if = "Option::is_none")]
    pub material_id: Option<ObjectId>,
    pub unit: String,
    pub remark: String,
}

impl SimpleProduct {
    pub fn new(material_id: ObjectId, unit: impl Into<String>) -> Self {
        Self {
            material_id: Some(material_id),
            unit: unit.into(),
            remark: String::new(),
        }
    }

    fn has_material_id(&self) -> bool {
        self.material_id.is_some_and(|id| id.bytes() != [0; 12])
    }
}

/// One line of a formula product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Formula {
    pub number: i64,
    pub product: Option<SimpleProduct>,
}

impl Formula {
    pub fn new(number: i64, product: SimpleProduct) -> Self {
        Self { number, product: Some(product) }
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
struct MaterialFields {
    #[serde(default)]
    material: Option<SimpleProduct>,
}

#[derive(Deserialize)]
struct FormulaFields {
    #[serde(default, deserialize_with = "null_as_empty")]
    formulas: Vec<Formula>,
}

/// A `basic` stock product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockProductMaterial {
    #[serde(flatten)]
    pub common: CommonStockProduct,
    pub material: Option<SimpleProduct>,
}

/// A `formula` stock product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockProductFormulas {
    #[serde(flatten)]
    pub common: CommonStockProduct,
    pub formulas: Vec<Formula>,
}

/// The concrete shape of a stock product.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StockVariant {
    Material(StockProductMaterial),
    Formulas(StockProductFormulas),
}

impl StockVariant {
    /// A `basic` product; the discriminator is set to match.
    pub fn material(mut common: CommonStockProduct, material: SimpleProduct) -> Self {
        common.typ = ProductType::Basic;
        StockVariant::Material(StockProductMaterial { common, material: Some(material) })
    }

    /// A `formula` product; the discriminator is set to match.
    pub fn formulas(mut common: CommonStockProduct, formulas: Vec<Formula>) -> Self {
        common.typ = ProductType::Formula;
        StockVariant::Formulas(StockProductFormulas { common, formulas })
    }

    pub fn common(&self) -> &CommonStockProduct {
        match self {
            StockVariant::Material(product) => &product.common,
            StockVariant::Formulas(product) => &product.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut CommonStockProduct {
        match self {
            StockVariant::Material(product) => &mut product.common,
            StockVariant::Formulas(product) => &mut product.common,
        }
    }

    pub fn as_material(&self) -> Option<&StockProductMaterial> {
        match self {
            StockVariant::Material(product) => Some(product),
            StockVariant::Formulas(_) => None,
        }
    }

    pub fn as_formulas(&self) -> Option<&StockProductFormulas> {
        match self {
            StockVariant::Formulas(product) => Some(product),
            StockVariant::Material(_) => None,
        }
    }
}

impl Polymorphic for StockVariant {
    type Common = CommonStockProduct;

    fn collection_name() -> &'static str {
        STOCK_PRODUCT_COLLECTION
    }

    fn kind(&self) -> &str {
        self.common().typ.as_str()
    }

    fn select(common: CommonStockProduct, raw: &BsonDocument) -> DocumentStoreResult<Self> {
        match common.typ {
            ProductType::Basic => {
                let MaterialFields { material } = deserialize_from_document(raw.clone())?;
                Ok(StockVariant::Material(StockProductMaterial { common, material }))
            }
            ProductType::Formula => {
                let FormulaFields { formulas } = deserialize_from_document(raw.clone())?;
                Ok(StockVariant::Formulas(StockProductFormulas { common, formulas }))
            }
            other => Err(DocumentStoreError::UnknownKind(other.to_string())),
        }
    }
}

/// Read and check operations shared by every stock product shape.
pub trait StockItem {
    fn product_type(&self) -> &ProductType;

    fn shape(&self) -> &ShapeType;

    fn name(&self) -> &str;

    fn state(&self) -> &StockState;

    /// Checks the shared fields, then the shape's own fields.
    fn validate(&self) -> Result<(), ValidationError>;

    /// The `$set` body for an update: shared fields first, then the shape's own.
    fn update_fields(&self) -> DocumentStoreResult<BsonDocument>;
}

impl StockItem for StockProductMaterial {
    fn product_type(&self) -> &ProductType {
        &self.common.typ
    }

    fn shape(&self) -> &ShapeType {
        &self.common.shape
    }

    fn name(&self) -> &str {
        &self.common.name
    }

    fn state(&self) -> &StockState {
        &self.common.state
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.common.validate()?;

        let material = self.material.as_ref().ok_or(ValidationError::MissingMaterial)?;
        if !material.has_material_id() {
            return Err(ValidationError::MissingMaterialId);
        }
        if material.unit.is_empty() {
            return Err(ValidationError::MissingMaterialUnit);
        }
        Ok(())
    }

    fn update_fields(&self) -> DocumentStoreResult<BsonDocument> {
        let mut fields = self.common.update_fields()?;
        fields.insert("material", serialize_to_bson(&self.material)?);
        Ok(fields)
    }
}

impl StockItem for StockProductFormulas {
    fn product_type(&self) -> &ProductType {
        &self.common.typ
    }

    fn shape(&self) -> &ShapeType {
        &self.common.shape
    }

    fn name(&self) -> &str {
        &self.common.name
    }

    fn state(&self) -> &StockState {
        &self.common.state
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.common.validate()?;

        if self.formulas.is_empty() {
            return Err(ValidationError::EmptyFormulas);
        }
        for (index, formula) in self.formulas.iter().enumerate() {
            let product = formula
                .product
                .as_ref()
                .ok_or(ValidationError::MissingFormulaProduct(index))?;
            if !product.has_material_id() {
                return Err(ValidationError::MissingFormulaProductId(index));
            }
            if product.unit.is_empty() {
                return Err(ValidationError::MissingFormulaUnit(index));
            }
        }
        Ok(())
    }

    fn update_fields(&self) -> DocumentStoreResult<BsonDocument> {
        let mut fields = self.common.update_fields()?;
        fields.insert("formulas", serialize_to_bson(&self.formulas)?);
        Ok(fields)
    }
}

impl StockItem for StockVariant {
    fn product_type(&self) -> &ProductType {
        &self.common().typ
    }

    fn shape(&self) -> &ShapeType {
        &self.common().shape
    }

    fn name(&self) -> &str {
        &self.common().name
    }

    fn state(&self) -> &StockState {
        &self.common().state
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            StockVariant::Material(product) => product.validate(),
            StockVariant::Formulas(product) => product.validate(),
        }
    }

    fn update_fields(&self) -> DocumentStoreResult<BsonDocument> {
        match self {
            StockVariant::Material(product) => product.update_fields(),
            StockVariant::Formulas(product) => product.update_fields(),
        }
    }
}

impl StockItem for StockProduct {
    fn product_type(&self) -> &ProductType {
        self.payload.product_type()
    }

    fn shape(&self) -> &ShapeType {
        self.payload.shape()
    }

    fn name(&self) -> &str {
        self.payload.name()
    }

    fn state(&self) -> &StockState {
        self.payload.state()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.payload.validate()
    }

    fn update_fields(&self) -> DocumentStoreResult<BsonDocument> {
        self.payload.update_fields()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{Bson, doc};

    fn bucket() -> CommonStockProduct {
        CommonStockProduct::new("paint", ShapeType::Bucket, Volume::new(30, 30, 40))
            .with_bucket_height(12.5)
            .with_weight(3.0)
    }

    #[test]
    fn valid_products_pass() {
        let material = StockVariant::material(bucket(), SimpleProduct::new(ObjectId::new(), "kg"));
        assert_eq!(material.validate(), Ok(()));
        assert_eq!(material.kind(), "basic");

        let formulas = StockVariant::formulas(
            CommonStockProduct::new("kit", ShapeType::Solid, Volume::new(10, 10, 10)),
            vec![Formula::new(2, SimpleProduct::new(ObjectId::new(), "pcs"))],
        );
        assert_eq!(formulas.validate(), Ok(()));
        assert_eq!(formulas.kind(), "formula");
    }

    #[test]
    fn bucket_height_rules_depend_on_shape() {
        let negative = StockVariant::material(
            bucket().with_bucket_height(-1.0),
            SimpleProduct::new(ObjectId::new(), "kg"),
        );
        assert_eq!(negative.validate(), Err(ValidationError::NegativeBucketHeight));

        let mut alone = bucket().with_bucket_height(5.0);
        alone.shape = ShapeType::Alone;
        let alone = StockVariant::material(alone, SimpleProduct::new(ObjectId::new(), "kg"));
        let err = alone.validate().unwrap_err();
        assert_eq!(err, ValidationError::BucketHeightNotAllowed(ShapeType::Alone));
        assert_eq!(err.field(), "bucketheight");
    }

    #[test]
    fn checks_run_in_order() {
        let mut common = bucket();
        common.name.clear();
        common.volume = None;
        let product = StockVariant::material(common, SimpleProduct::default());
        assert_eq!(product.validate(), Err(ValidationError::MissingName));

        let mut common = bucket();
        common.volume = Some(Volume::new(-1, 2, -3));
        let product = StockVariant::material(common, SimpleProduct::default());
        assert_eq!(product.validate(), Err(ValidationError::NegativeDimension("height")));

        let product = StockVariant::material(bucket(), SimpleProduct::default());
        assert_eq!(product.validate(), Err(ValidationError::MissingMaterialId));

        let product = StockVariant::formulas(bucket(), vec![Formula::default()]);
        assert_eq!(product.validate(), Err(ValidationError::MissingFormulaProduct(0)));
    }

    #[test]
    fn update_fields_list_shared_fields_first() {
        let product = StockVariant::formulas(bucket(), Vec::new());
        let fields = product.update_fields().unwrap();
        let keys: Vec<&str> = fields.keys().map(String::as_str).collect();

        assert_eq!(
            keys,
            vec!["name", "typ", "volume", "shape", "bucketheight", "weight", "state", "formulas"]
        );
        assert_eq!(fields.get_str("typ").unwrap(), "formula");
    }

    #[test]
    fn unknown_type_is_named() {
        let raw = doc! { "_id": ObjectId::new(), "name": "x", "typ": "widget" };
        let err = StockProduct::from_document(raw).unwrap_err();

        assert!(matches!(err, DocumentStoreError::UnknownKind(ref kind) if kind == "widget"));
        assert!(err.to_string().contains("widget"));
    }

    #[test]
    fn null_formulas_decode_as_empty() {
        let raw = doc! { "name": "kit", "typ": "formula", "shape": "solid", "formulas": Bson::Null };
        let product = StockProduct::from_document(raw).unwrap();

        assert_eq!(product.payload.as_formulas().map(|p| p.formulas.len()), Some(0));
        assert_eq!(product.validate(), Err(ValidationError::MissingVolume));
    }
}
