// =============================================================================
// VENDOR MODULE
// =============================================================================
// Column layouts of the supported vendor exports and the mapping of one
// spreadsheet row onto a Product.
//
// Mapping is total: every field has a default when its column is missing or
// empty, unknown columns are ignored, and boolean-like columns are true only
// when they hold exactly "1".
// =============================================================================

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use uuid::Uuid;

use crate::classify::{technical_from_attributes, Attribute, VehicleClassifier};
use crate::models::{Availability, Product, ProductStatus, TechnicalSpecs, Visibility};

/// Highest "Attribute N" index scanned in a row.
pub const MAX_ATTRIBUTES: usize = 15;

const TRUE_FLAG: &str = "1";

// -----------------------------------------------------------------------------
// ROW
// -----------------------------------------------------------------------------
/// One data row, keyed by header text.
#[derive(Debug, Clone, Default)]
pub struct VendorRow(HashMap<String, String>);

impl VendorRow {
    /// Trimmed cell value, or "" when the column is absent.
    pub fn get(&self, column: &str) -> &str {
        self.0.get(column).map(|v| v.trim()).unwrap_or("")
    }

    fn flag(&self, column: &str) -> bool {
        self.get(column) == TRUE_FLAG
    }

    fn count(&self, column: &str) -> i64 {
        let raw = self.get(column);
        raw.parse::<i64>()
            .ok()
            .or_else(|| raw.parse::<f64>().ok().map(|v| v as i64))
            .unwrap_or(0)
    }

    fn list(&self, column: &str) -> Vec<String> {
        self.get(column)
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Non-empty "Attribute {i} name" / "Attribute {i} value(s)" pairs.
    fn attribute_pairs(&self) -> Vec<Attribute> {
        (1..=MAX_ATTRIBUTES)
            .filter_map(|i| {
                let name = self.get(&format!("Attribute {i} name"));
                if name.is_empty() {
                    return None;
                }
                let value = self.get(&format!("Attribute {i} value(s)"));
                Some(Attribute::new(name, value))
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VendorRow {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// -----------------------------------------------------------------------------
// COLUMN MAPS
// -----------------------------------------------------------------------------

struct TechnicalColumns {
    fcc_id: &'static str,
    frequency: &'static str,
    battery: &'static str,
    chip: &'static str,
    buttons: &'static str,
    clonable: &'static str,
    reusable: &'static str,
}

struct VehicleColumns {
    make: &'static str,
    model: &'static str,
    years: &'static str,
}

struct ColumnMap {
    sku: &'static str,
    title: &'static str,
    description: &'static str,
    short_description: &'static str,
    categories: &'static str,
    tags: &'static str,
    images: &'static str,
    regular_price: &'static str,
    sale_price: &'static str,
    stock: &'static str,
    in_stock: &'static str,
    low_stock: &'static str,
    /// Row is visible only when this flag is "1"
    published: Option<&'static str>,
    /// Row is hidden when this column says "hidden"
    catalog_visibility: Option<&'static str>,
    attribute_pairs: bool,
    vehicle: Option<VehicleColumns>,
    technical: Option<TechnicalColumns>,
}

const WOOCOMMERCE: ColumnMap = ColumnMap {
    sku: "SKU",
    title: "Name",
    description: "Description",
    short_description: "Short description",
    categories: "Categories",
    tags: "Tags",
    images: "Images",
    regular_price: "Regular price",
    sale_price: "Sale price",
    stock: "Stock",
    in_stock: "In stock?",
    low_stock: "Low stock amount",
    published: Some("Published"),
    catalog_visibility: Some("Visibility in catalog"),
    attribute_pairs: true,
    vehicle: None,
    technical: None,
};

const KEY_CATALOG: ColumnMap = ColumnMap {
    sku: "Item Number",
    title: "Product Name",
    description: "Long Description",
    short_description: "Summary",
    categories: "Category",
    tags: "Keywords",
    images: "Image URLs",
    regular_price: "List Price",
    sale_price: "Promo Price",
    stock: "Qty",
    in_stock: "Available",
    low_stock: "Reorder Level",
    published: None,
    catalog_visibility: None,
    attribute_pairs: false,
    vehicle: Some(VehicleColumns {
        make: "Make",
        model: "Model",
        years: "Years",
    }),
    technical: Some(TechnicalColumns {
        fcc_id: "FCC ID",
        frequency: "Frequency",
        battery: "Battery",
        chip: "Chip",
        buttons: "Buttons",
        clonable: "Clonable",
        reusable: "Reusable",
    }),
};

/// Supported export layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum VendorSchema {
    /// Storefront product export ("Regular price", "In stock?", "Attribute N ...")
    #[default]
    Woocommerce,
    /// Locksmith supplier price list ("Item Number", "List Price", "Make", ...)
    KeyCatalog,
}

impl VendorSchema {
    fn columns(self) -> &'static ColumnMap {
        match self {
            VendorSchema::Woocommerce => &WOOCOMMERCE,
            VendorSchema::KeyCatalog => &KEY_CATALOG,
        }
    }

    /// Maps one row onto a new Product. Never fails.
    pub fn map_row(
        self,
        row: &VendorRow,
        classifier: &dyn VehicleClassifier,
        now: DateTime<Utc>,
    ) -> Product {
        let columns = self.columns();

        let categories = row.list(columns.categories);
        let attributes = attributes_for(row, columns);
        let technical = technical_for(row, columns, &attributes);
        let compatibility = classifier.classify(&categories, &attributes);

        let in_stock = row.flag(columns.in_stock);
        let visible = columns.published.map_or(true, |c| row.flag(c))
            && columns
                .catalog_visibility
                .map_or(true, |c| !row.get(c).eq_ignore_ascii_case("hidden"));

        let regular_price = row.get(columns.regular_price);
        let price = if regular_price.is_empty() { "0" } else { regular_price };

        Product {
            id: Uuid::new_v4(),
            sku: row.get(columns.sku).to_string(),
            title: row.get(columns.title).to_string(),
            description: row.get(columns.description).to_string(),
            short_description: row.get(columns.short_description).to_string(),
            category: categories.first().cloned().unwrap_or_default(),
            tags: row.list(columns.tags),
            images: row.list(columns.images),
            price: price.to_string(),
            regular_price: regular_price.to_string(),
            sale_price: row.get(columns.sale_price).to_string(),
            discount_info: None,
            stock: row.count(columns.stock),
            low_stock_threshold: row.count(columns.low_stock),
            status: if in_stock {
                ProductStatus::Active
            } else {
                ProductStatus::OutOfStock
            },
            availability: if in_stock {
                Availability::InStock
            } else {
                Availability::OutOfStock
            },
            visibility: if visible {
                Visibility::Visible
            } else {
                Visibility::Hidden
            },
            technical,
            compatibility,
            created_at: now,
            updated_at: now,
        }
    }
}

fn attributes_for(row: &VendorRow, columns: &ColumnMap) -> Vec<Attribute> {
    let mut attributes = if columns.attribute_pairs {
        row.attribute_pairs()
    } else {
        Vec::new()
    };

    if let Some(vehicle) = &columns.vehicle {
        for (name, column) in [
            ("Make", vehicle.make),
            ("Model", vehicle.model),
            ("Year", vehicle.years),
        ] {
            let value = row.get(column);
            if !value.is_empty() {
                attributes.push(Attribute::new(name, value));
            }
        }
    }

    attributes
}

fn technical_for(row: &VendorRow, columns: &ColumnMap, attributes: &[Attribute]) -> TechnicalSpecs {
    let mut specs = TechnicalSpecs::default();

    if let Some(tech) = &columns.technical {
        specs.fcc_id = row.get(tech.fcc_id).to_string();
        specs.frequency = row.get(tech.frequency).to_string();
        specs.battery_type = row.get(tech.battery).to_string();
        specs.chip_type = row.get(tech.chip).to_string();
        specs.buttons = row.get(tech.buttons).to_string();
        specs.clonable = row.flag(tech.clonable);
        specs.reusable = row.flag(tech.reusable);
    }

    technical_from_attributes(attributes, &mut specs);
    specs
}
