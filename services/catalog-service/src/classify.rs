// =============================================================================
// CLASSIFY MODULE
// =============================================================================
// Infers vehicle compatibility and key attributes from free text found in
// vendor spreadsheets.
//
// This is keyword matching, not parsing. It never fails: anything it cannot
// make sense of is left out.
// =============================================================================

use lazy_regex::regex;

use crate::models::{CompatibilityEntry, TechnicalSpecs};

/// One "Attribute N name" / "Attribute N value(s)" pair from a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Strategy that turns category text and attributes into compatibility
/// entries. The importer only depends on this trait.
pub trait VehicleClassifier: Send + Sync {
    fn classify(&self, categories: &[String], attributes: &[Attribute]) -> Vec<CompatibilityEntry>;
}

// -----------------------------------------------------------------------------
// KEYWORD CLASSIFIER
// -----------------------------------------------------------------------------

const VEHICLE_KEYWORDS: &[&str] = &["car", "truck", "suv"];

const KEY_TYPE_KEYWORDS: &[(&str, &str)] = &[
    ("remote", "remote"),
    ("smart", "smart-key"),
    ("flip", "flip-key"),
    ("transponder", "transponder"),
    ("blade", "blade"),
    ("fob", "fob"),
];

/// Default classifier: case-insensitive substring checks.
///
/// - vehicle types: "car" / "truck" / "suv" in any category
/// - key types: remote, smart, flip, transponder, blade, fob in any category
/// - brand / model / years: attributes named like "brand" or "make", "model",
///   "year"
///
/// One entry is produced per vehicle type. Brand, model and years are merged
/// into the first entry only; multiple brands are never cross-multiplied.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl VehicleClassifier for KeywordClassifier {
    fn classify(&self, categories: &[String], attributes: &[Attribute]) -> Vec<CompatibilityEntry> {
        let lowered: Vec<String> = categories.iter().map(|c| c.to_lowercase()).collect();

        let mut vehicle_types: Vec<&str> = Vec::new();
        let mut key_types: Vec<String> = Vec::new();
        for category in &lowered {
            for keyword in VEHICLE_KEYWORDS {
                if category.contains(keyword) && !vehicle_types.contains(keyword) {
                    vehicle_types.push(*keyword);
                }
            }
            for (keyword, key_type) in KEY_TYPE_KEYWORDS {
                if category.contains(keyword) && !key_types.iter().any(|k| k == key_type) {
                    key_types.push((*key_type).to_string());
                }
            }
        }

        let mut entries: Vec<CompatibilityEntry> = vehicle_types
            .iter()
            .map(|vehicle_type| CompatibilityEntry {
                vehicle_type: (*vehicle_type).to_string(),
                key_types: key_types.clone(),
                ..CompatibilityEntry::default()
            })
            .collect();

        let enrichment = vehicle_details(attributes);
        if enrichment.is_empty() {
            return entries;
        }

        if entries.is_empty() {
            entries.push(CompatibilityEntry {
                key_types,
                ..CompatibilityEntry::default()
            });
        }
        if let Some(first) = entries.first_mut() {
            enrichment.merge_into(first);
        }

        entries
    }
}

#[derive(Debug, Default)]
struct VehicleDetails {
    brand: Option<String>,
    model: Option<String>,
    years: Option<(i32, i32)>,
}

impl VehicleDetails {
    fn is_empty(&self) -> bool {
        self.brand.is_none() && self.model.is_none() && self.years.is_none()
    }

    fn merge_into(self, entry: &mut CompatibilityEntry) {
        if let Some(brand) = self.brand {
            entry.brand = brand;
        }
        if let Some(model) = self.model {
            entry.model = model;
        }
        if let Some((start, end)) = self.years {
            entry.year_start = Some(start);
            entry.year_end = Some(end);
        }
    }
}

fn vehicle_details(attributes: &[Attribute]) -> VehicleDetails {
    let mut details = VehicleDetails::default();

    for attribute in attributes {
        let name = attribute.name.to_lowercase();
        // "Model Year" is a year, so years are checked first
        if name.contains("year") {
            if details.years.is_none() {
                details.years = parse_year_range(&attribute.value);
            }
        } else if name.contains("brand") || name.contains("make") {
            if details.brand.is_none() {
                details.brand = first_value(&attribute.value);
            }
        } else if name.contains("model") && details.model.is_none() {
            details.model = first_value(&attribute.value);
        }
    }

    details
}

/// Vendors separate multiple values with "|" or ",".
fn first_value(raw: &str) -> Option<String> {
    raw.split(['|', ','])
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Smallest and largest plausible model year mentioned in `raw`.
///
/// "2015-2020", "2015 – 2020", "2018" and "2014, 2016, 2017" are all
/// understood.
pub fn parse_year_range(raw: &str) -> Option<(i32, i32)> {
    let years: Vec<i32> = regex!(r"\b(?:19|20)\d{2}\b")
        .find_iter(raw)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();

    let start = years.iter().min()?;
    let end = years.iter().max()?;
    Some((*start, *end))
}

// -----------------------------------------------------------------------------
// TECHNICAL ATTRIBUTES
// -----------------------------------------------------------------------------

/// Fills technical specs from attribute names. Later attributes never
/// overwrite a value already found.
pub fn technical_from_attributes(attributes: &[Attribute], specs: &mut TechnicalSpecs) {
    for attribute in attributes {
        let name = attribute.name.to_lowercase();
        let value = attribute.value.trim();
        if value.is_empty() {
            continue;
        }

        let slot = if name.contains("fcc") {
            &mut specs.fcc_id
        } else if name.contains("frequency") || name.contains("mhz") {
            &mut specs.frequency
        } else if name.contains("battery") {
            &mut specs.battery_type
        } else if name.contains("chip") || name.contains("transponder") {
            &mut specs.chip_type
        } else if name.contains("button") {
            &mut specs.buttons
        } else {
            continue;
        };

        if slot.is_empty() {
            *slot = value.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cats(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn seeds_vehicle_types_from_categories() {
        let entries = KeywordClassifier.classify(&cats(&["Car Remotes", "Truck Keys", "SUV"]), &[]);
        let types: Vec<&str> = entries.iter().map(|e| e.vehicle_type.as_str()).collect();
        assert_eq!(types, vec!["car", "truck", "suv"]);
        assert!(entries[0].key_types.contains(&"remote".to_string()));
    }

    #[test]
    fn merges_details_into_first_entry_only() {
        let attributes = vec![
            Attribute::new("Brand", "Toyota | Lexus"),
            Attribute::new("Model", "Camry"),
            Attribute::new("Years", "2018-2022"),
        ];
        let entries = KeywordClassifier.classify(&cats(&["Car Keys", "Truck Keys"]), &attributes);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].brand, "Toyota");
        assert_eq!(entries[0].model, "Camry");
        assert_eq!(entries[0].year_start, Some(2018));
        assert_eq!(entries[0].year_end, Some(2022));
        assert!(entries[1].brand.is_empty());
        assert_eq!(entries[1].year_start, None);
    }

    #[test]
    fn details_without_vehicle_type_create_one_entry() {
        let attributes = vec![Attribute::new("Vehicle Make", "Honda")];
        let entries = KeywordClassifier.classify(&cats(&["Smart Keys"]), &attributes);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].vehicle_type, "");
        assert_eq!(entries[0].brand, "Honda");
        assert_eq!(entries[0].key_types, vec!["smart-key".to_string()]);
    }

    #[test]
    fn model_year_is_treated_as_year() {
        let attributes = vec![Attribute::new("Model Year", "2011")];
        let entries = KeywordClassifier.classify(&cats(&["Car"]), &attributes);
        assert_eq!(entries[0].model, "");
        assert_eq!(entries[0].year_start, Some(2011));
        assert_eq!(entries[0].year_end, Some(2011));
    }

    #[test]
    fn tolerates_garbage() {
        let attributes = vec![
            Attribute::new("Year", "sometime"),
            Attribute::new("", ""),
            Attribute::new("Colour", "Black"),
        ];
        assert!(KeywordClassifier.classify(&[], &attributes).is_empty());
    }

    #[test]
    fn parses_year_ranges() {
        assert_eq!(parse_year_range("2015-2020"), Some((2015, 2020)));
        assert_eq!(parse_year_range("2015 – 2020"), Some((2015, 2020)));
        assert_eq!(parse_year_range("2017, 2014, 2016"), Some((2014, 2017)));
        assert_eq!(parse_year_range("1999"), Some((1999, 1999)));
        assert_eq!(parse_year_range("12345"), None);
        assert_eq!(parse_year_range(""), None);
    }

    #[test]
    fn reads_technical_attributes() {
        let attributes = vec![
            Attribute::new("FCC ID", "HYQ14FBA"),
            Attribute::new("Frequency", "315 MHz"),
            Attribute::new("Battery", "CR2032"),
            Attribute::new("Chip", "H / 8A"),
            Attribute::new("Buttons", "4"),
            Attribute::new("FCC ID (alt)", "HYQ14FBB"),
        ];
        let mut specs = TechnicalSpecs::default();
        technical_from_attributes(&attributes, &mut specs);

        assert_eq!(specs.fcc_id, "HYQ14FBA");
        assert_eq!(specs.frequency, "315 MHz");
        assert_eq!(specs.battery_type, "CR2032");
        assert_eq!(specs.chip_type, "H / 8A");
        assert_eq!(specs.buttons, "4");
    }
}
