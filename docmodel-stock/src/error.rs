use thiserror::Error;

use docmodel_core::error::DocumentStoreError;

use crate::kinds::{ProductType, ShapeType, StockState};

/// Why a stock product cannot be stored.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("name is required")]
    MissingName,
    #[error("unsupported product type: {0}")]
    UnsupportedType(ProductType),
    #[error("volume is required")]
    MissingVolume,
    #[error("volume {0} must not be negative")]
    NegativeDimension(&'static str),
    #[error("unknown shape: {0}")]
    UnknownShape(ShapeType),
    #[error("bucketheight must not be negative")]
    NegativeBucketHeight,
    #[error("bucketheight is only allowed for bucket shapes, not {0}")]
    BucketHeightNotAllowed(ShapeType),
    #[error("weight must not be negative")]
    NegativeWeight,
    #[error("unknown state: {0}")]
    UnknownState(StockState),
    #[error("material is required")]
    MissingMaterial,
    #[error("material id is required")]
    MissingMaterialId,
    #[error("material unit is required")]
    MissingMaterialUnit,
    #[error("formulas must not be empty")]
    EmptyFormulas,
    #[error("formula {0} has no product")]
    MissingFormulaProduct(usize),
    #[error("formula {0} product id is required")]
    MissingFormulaProductId(usize),
    #[error("formula {0} unit is required")]
    MissingFormulaUnit(usize),
}

impl ValidationError {
    /// The stored field the error is about.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingName => "name",
            ValidationError::UnsupportedType(_) => "typ",
            ValidationError::MissingVolume => "volume",
            ValidationError::NegativeDimension(dimension) => match *dimension {
                "length" => "volume.length",
                "width" => "volume.width",
                _ => "volume.height",
            },
            ValidationError::UnknownShape(_) => "shape",
            ValidationError::NegativeBucketHeight | ValidationError::BucketHeightNotAllowed(_) => {
                "bucketheight"
            }
            ValidationError::NegativeWeight => "weight",
            ValidationError::UnknownState(_) => "state",
            ValidationError::MissingMaterial => "material",
            ValidationError::MissingMaterialId => "material.materialid",
            ValidationError::MissingMaterialUnit => "material.unit",
            ValidationError::EmptyFormulas | ValidationError::MissingFormulaProduct(_) => "formulas",
            ValidationError::MissingFormulaProductId(_) => "formulas.product.materialid",
            ValidationError::MissingFormulaUnit(_) => "formulas.product.unit",
        }
    }
}

impl From<ValidationError> for DocumentStoreError {
    fn from(err: ValidationError) -> Self {
        DocumentStoreError::InvalidDocument(err.to_string())
    }
}
