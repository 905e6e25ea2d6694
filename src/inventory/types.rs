use crate::store::{Document, PartitionKey, Result, StoreError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(StoreError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

fn generated_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================================
// Product
// ============================================================

/// Lifecycle state of a product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
}

/// A catalogue product, partitioned by `category`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Product {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: String,
    pub price: Decimal,
    pub sku: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Product {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        price: Decimal,
        sku: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            category: category.into(),
            price,
            sku: sku.into(),
            quantity: 0,
            status: ProductStatus::Active,
            last_updated: None,
        }
    }

    pub fn in_stock(&self) -> bool {
        self.status == ProductStatus::Active && self.quantity > 0
    }
}

/// Partial product update. `category` is the partition key and cannot change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProductStatus>,
}

impl Document for Product {
    type Patch = ProductPatch;
    const COLLECTION: &'static str = "products";
    const PARTITION_KEY_FIELD: &'static str = "category";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn assign_id(&mut self) -> Result<()> {
        if self.id.is_none() {
            self.id = Some(generated_id());
        }
        Ok(())
    }

    fn partition_key(&self) -> Result<PartitionKey> {
        PartitionKey::new(self.category.clone())
    }

    fn validate(&self) -> Result<()> {
        require("name", &self.name)?;
        require("category", &self.category)?;
        require("sku", &self.sku)?;
        if self.price < Decimal::ZERO {
            return Err(StoreError::Validation(format!(
                "price must not be negative, got {}",
                self.price
            )));
        }
        Ok(())
    }

    fn apply_patch(&mut self, patch: ProductPatch) -> Result<()> {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(sku) = patch.sku {
            self.sku = sku;
        }
        if let Some(quantity) = patch.quantity {
            self.quantity = quantity;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        Ok(())
    }

    fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.last_updated = Some(now);
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated = Some(match self.last_updated {
            Some(previous) if previous > now => previous,
            _ => now,
        });
    }
}

// ============================================================
// Location
// ============================================================

/// A store location. Its own id is the partition key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
}

impl Location {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            address: address.into(),
            manager: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
}

impl Document for Location {
    type Patch = LocationPatch;
    const COLLECTION: &'static str = "locations";
    const PARTITION_KEY_FIELD: &'static str = "id";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn assign_id(&mut self) -> Result<()> {
        if self.id.is_none() {
            self.id = Some(generated_id());
        }
        Ok(())
    }

    fn partition_key(&self) -> Result<PartitionKey> {
        PartitionKey::new(self.id.clone().ok_or(StoreError::MissingPartitionKey)?)
    }

    fn validate(&self) -> Result<()> {
        require("name", &self.name)?;
        require("address", &self.address)
    }

    fn apply_patch(&mut self, patch: LocationPatch) -> Result<()> {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(address) = patch.address {
            self.address = address;
        }
        if let Some(manager) = patch.manager {
            self.manager = Some(manager);
        }
        Ok(())
    }
}

// ============================================================
// Inventory item
// ============================================================

/// Stock of one product at one location, partitioned by `locationId`.
///
/// The identifier is always `"{productId}:{locationId}"`, so a product has at
/// most one inventory item per location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InventoryItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub product_id: String,
    pub location_id: String,
    pub quantity: u32,
}

impl InventoryItem {
    pub fn new(product_id: impl Into<String>, location_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            id: None,
            product_id: product_id.into(),
            location_id: location_id.into(),
            quantity,
        }
    }

    pub fn derived_id(product_id: &str, location_id: &str) -> String {
        format!("{product_id}:{location_id}")
    }

    fn check_id(&self) -> Result<()> {
        let derived = Self::derived_id(&self.product_id, &self.location_id);
        match &self.id {
            Some(id) if *id != derived => Err(StoreError::Validation(format!(
                "inventory item id '{id}' does not match '{derived}'"
            ))),
            _ => Ok(()),
        }
    }
}

/// Only the quantity of an inventory item can change; both ids are its identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InventoryItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

impl Document for InventoryItem {
    type Patch = InventoryItemPatch;
    const COLLECTION: &'static str = "inventory";
    const PARTITION_KEY_FIELD: &'static str = "locationId";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn assign_id(&mut self) -> Result<()> {
        require("productId", &self.product_id)?;
        require("locationId", &self.location_id)?;
        self.check_id()?;
        self.id = Some(Self::derived_id(&self.product_id, &self.location_id));
        Ok(())
    }

    fn partition_key(&self) -> Result<PartitionKey> {
        PartitionKey::new(self.location_id.clone())
    }

    fn validate(&self) -> Result<()> {
        require("productId", &self.product_id)?;
        require("locationId", &self.location_id)?;
        if self.product_id.contains(':') || self.location_id.contains(':') {
            return Err(StoreError::Validation(
                "productId and locationId must not contain ':'".into(),
            ));
        }
        self.check_id()
    }

    fn apply_patch(&mut self, patch: InventoryItemPatch) -> Result<()> {
        if let Some(quantity) = patch.quantity {
            self.quantity = quantity;
        }
        Ok(())
    }
}
