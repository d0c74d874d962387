//! Variant-aware pricing
//!
//! A catalog product carries one base MRP. Each variant (pack size) of a
//! category has a fixed ratio to that base, expressed in per-mille, and the
//! variant's MRP is `base_mrp * ratio / 1000`, rounded half up to the minor
//! unit. A store may sell below that MRP but never above it.

use serde::Serialize;

/// Ratio of a variant to the base MRP, in per-mille (1000 = 1x)
pub type Ratio = u32;

/// Default label for products whose category has no pack sizes
pub const STANDARD_VARIANT: &str = "standard";

const WEIGHT_RATIOS: &[(&str, Ratio)] = &[
    ("250g", 250),
    ("500g", 500),
    ("1kg", 1000),
    ("2kg", 2000),
    ("5kg", 5000),
];

const VOLUME_RATIOS: &[(&str, Ratio)] = &[
    ("200ml", 200),
    ("500ml", 500),
    ("1l", 1000),
    ("2l", 2000),
];

const SIZE_RATIOS: &[(&str, Ratio)] = &[("small", 500), ("medium", 1000), ("large", 1800)];

const PACK_RATIOS: &[(&str, Ratio)] = &[
    ("single", 1000),
    ("pack of 2", 2000),
    ("pack of 3", 3000),
];

const STANDARD_RATIOS: &[(&str, Ratio)] = &[(STANDARD_VARIANT, 1000)];

/// Variant labels and ratios allowed for a category
pub fn category_ratios(category: &str) -> &'static [(&'static str, Ratio)] {
    match category.trim().to_ascii_lowercase().as_str() {
        "grocery" | "staples" | "fruits & vegetables" => WEIGHT_RATIOS,
        "dairy" | "beverages" => VOLUME_RATIOS,
        "snacks" => SIZE_RATIOS,
        "personal care" | "household" => PACK_RATIOS,
        _ => STANDARD_RATIOS,
    }
}

/// Canonical form of a variant label: trimmed, lowercase, single spaces
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

/// Ratio of `label` within `category`
pub fn ratio_for(category: &str, label: &str) -> Result<Ratio, PricingError> {
    let label = normalize_label(label);
    category_ratios(category)
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, ratio)| *ratio)
        .ok_or_else(|| PricingError::UnknownVariant {
            category: category.to_string(),
            label,
        })
}

/// `base_mrp * ratio / 1000`, rounded half up
pub fn derived_mrp(base_mrp: i64, ratio: Ratio) -> Result<i64, PricingError> {
    if base_mrp <= 0 {
        return Err(PricingError::InvalidBaseMrp(base_mrp));
    }
    base_mrp
        .checked_mul(i64::from(ratio))
        .and_then(|scaled| scaled.checked_add(500))
        .map(|scaled| scaled / 1000)
        .ok_or(PricingError::Overflow)
}

/// Selling price must be positive and not above the variant MRP
pub fn validate_price(selling_price: i64, mrp: i64) -> Result<(), PricingError> {
    if selling_price <= 0 {
        return Err(PricingError::NonPositive(selling_price));
    }
    if selling_price > mrp {
        return Err(PricingError::ExceedsMrp { selling_price, mrp });
    }
    Ok(())
}

/// One row of a product's price sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantPrice {
    pub label: &'static str,
    pub ratio: Ratio,
    pub mrp: i64,
}

/// Every variant the category allows, with its derived MRP
pub fn price_sheet(category: &str, base_mrp: i64) -> Result<Vec<VariantPrice>, PricingError> {
    category_ratios(category)
        .iter()
        .map(|&(label, ratio)| {
            Ok(VariantPrice {
                label,
                ratio,
                mrp: derived_mrp(base_mrp, ratio)?,
            })
        })
        .collect()
}

/// Pricing rule violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("Variant '{label}' is not available for category '{category}'")]
    UnknownVariant { category: String, label: String },

    #[error("Base MRP must be positive, got {0}")]
    InvalidBaseMrp(i64),

    #[error("Selling price must be positive, got {0}")]
    NonPositive(i64),

    #[error("Selling price {selling_price} exceeds MRP {mrp}")]
    ExceedsMrp { selling_price: i64, mrp: i64 },

    #[error("Price is too large")]
    Overflow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_mrp_from_ratio() {
        assert_eq!(derived_mrp(12_000, 500), Ok(6_000));
        assert_eq!(derived_mrp(12_000, 2000), Ok(24_000));
        assert_eq!(derived_mrp(12_000, 1000), Ok(12_000));
    }

    #[test]
    fn rounds_half_up() {
        // 999 * 0.25 = 249.75
        assert_eq!(derived_mrp(999, 250), Ok(250));
        // 1002 * 0.25 = 250.5
        assert_eq!(derived_mrp(1002, 250), Ok(251));
        // 1001 * 0.25 = 250.25
        assert_eq!(derived_mrp(1001, 250), Ok(250));
    }

    #[test]
    fn rejects_bad_base_and_overflow() {
        assert_eq!(derived_mrp(0, 1000), Err(PricingError::InvalidBaseMrp(0)));
        assert_eq!(derived_mrp(i64::MAX, 2000), Err(PricingError::Overflow));
    }

    #[test]
    fn selling_price_capped_by_mrp() {
        assert_eq!(validate_price(6_000, 6_000), Ok(()));
        assert_eq!(validate_price(5_500, 6_000), Ok(()));
        assert_eq!(
            validate_price(6_001, 6_000),
            Err(PricingError::ExceedsMrp {
                selling_price: 6_001,
                mrp: 6_000
            })
        );
        assert_eq!(validate_price(0, 6_000), Err(PricingError::NonPositive(0)));
    }

    #[test]
    fn category_lookup_is_case_insensitive() {
        assert_eq!(ratio_for("Dairy", " 500ML "), Ok(500));
        assert_eq!(ratio_for("Fruits & Vegetables", "1KG"), Ok(1000));
        assert_eq!(ratio_for("Personal Care", "Pack  of 2"), Ok(2000));
    }

    #[test]
    fn unknown_category_only_has_standard() {
        assert_eq!(ratio_for("electronics", "standard"), Ok(1000));
        assert!(matches!(
            ratio_for("electronics", "500g"),
            Err(PricingError::UnknownVariant { .. })
        ));
        assert!(ratio_for("dairy", "1kg").is_err());
    }

    #[test]
    fn price_sheet_lists_all_variants() {
        let sheet = price_sheet("snacks", 4_000).unwrap();
        let mrps: Vec<(&str, i64)> = sheet.iter().map(|v| (v.label, v.mrp)).collect();
        assert_eq!(mrps, vec![("small", 2_000), ("medium", 4_000), ("large", 7_200)]);
    }
}
