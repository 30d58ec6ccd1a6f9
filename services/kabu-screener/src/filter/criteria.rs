//! Filter criterion definitions and the criterion catalog.

use serde::Serialize;

// ============================================================================
// Criterion Kind & Unit Conversion
// ============================================================================

/// How a criterion's raw input is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionKind {
    /// Lower or upper bound of a numeric range
    NumericBound,
    /// Checkbox; only ever sent as `true`
    Flag,
    /// Drop-down; sent only when something is selected
    Select,
}

/// Conversion from the unit a user types to the unit the backend stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitConversion {
    /// Millions of shares → shares
    MillionShares,
    /// 億円 (100 million yen) → 百万円 (million yen)
    HundredMillionYen,
}

impl UnitConversion {
    /// Multiplier applied before transmission.
    pub fn factor(&self) -> f64 {
        match self {
            Self::MillionShares => 1_000_000.0,
            Self::HundredMillionYen => 100.0,
        }
    }

    /// Unit the user enters values in.
    pub fn input_unit(&self) -> &'static str {
        match self {
            Self::MillionShares => "百万株",
            Self::HundredMillionYen => "億円",
        }
    }
}

// ============================================================================
// Filter Criterion
// ============================================================================

/// One named filter constraint and the raw value the user entered for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterCriterion {
    pub key: String,
    pub label: String,
    pub kind: CriterionKind,
    pub conversion: Option<UnitConversion>,
    pub raw_value: String,
}

impl FilterCriterion {
    fn new(key: impl Into<String>, label: impl Into<String>, kind: CriterionKind) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind,
            conversion: None,
            raw_value: String::new(),
        }
    }

    /// Whether the raw value counts as "nothing entered".
    pub fn is_empty(&self) -> bool {
        self.raw_value.trim().is_empty()
    }

    /// Query-ready value, or `None` when the criterion must be omitted.
    ///
    /// Numeric input that does not parse to a finite number is dropped,
    /// never defaulted to zero.
    pub fn query_value(&self) -> Option<String> {
        let raw = self.raw_value.trim();
        if raw.is_empty() {
            return None;
        }

        match self.kind {
            CriterionKind::NumericBound => {
                let value: f64 = raw.parse().ok().filter(|v: &f64| v.is_finite())?;
                let factor = self.conversion.map_or(1.0, |c| c.factor());
                Some(format_query_number(value * factor))
            }
            CriterionKind::Flag => is_truthy(raw).then(|| "true".to_string()),
            CriterionKind::Select => Some(raw.to_string()),
        }
    }
}

/// Checkbox-style truthiness of a raw flag value.
pub fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "true" | "1" | "on" | "yes" | "checked"
    )
}

/// Render a number for a query string: integral values without a
/// fractional part, everything else in shortest round-trip form.
pub fn format_query_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// A numeric column that is filtered by a `min_`/`max_` pair.
#[derive(Debug, Clone, Copy)]
pub struct RangeFamily {
    pub name: &'static str,
    pub label: &'static str,
    pub conversion: Option<UnitConversion>,
}

const fn family(name: &'static str, label: &'static str) -> RangeFamily {
    RangeFamily { name, label, conversion: None }
}

const fn converted(
    name: &'static str,
    label: &'static str,
    conversion: UnitConversion,
) -> RangeFamily {
    RangeFamily { name, label, conversion: Some(conversion) }
}

/// Numeric range filters accepted by the screening endpoint.
pub const RANGE_FAMILIES: &[RangeFamily] = &[
    family("price", "株価"),
    family("change_percent", "騰落率(%)"),
    family("volume", "出来高"),
    family("volume_ratio", "出来高率"),
    converted("market_cap", "時価総額(億円)", UnitConversion::HundredMillionYen),
    family("per", "PER"),
    family("pbr", "PBR"),
    family("roe", "ROE(%)"),
    family("dividend_yield", "配当利回り(%)"),
    family("vwap", "VWAP"),
    converted("shares_issued", "発行済株式数(百万株)", UnitConversion::MillionShares),
    family("margin_ratio", "信用倍率"),
    family("rsi14", "RSI(14)"),
    family("price_deviation_20", "20日乖離率(%)"),
    family("price_deviation_100", "100日乖離率(%)"),
    family("volume_deviation_20", "出来高20日乖離(%)"),
    family("volume_deviation_100", "出来高100日乖離(%)"),
    family("stock_lending_repayment_ratio", "貸株返済比率"),
    family("jsf_diff_ratio", "日証金差引比率"),
    family("short_ratio", "空売り比率"),
    family("margin_buying_deviation_20", "信用買残20日乖離(%)"),
    family("margin_buying_volume_ratio", "信用買残÷出来高"),
    converted("jsf_loan_balance", "日証金融資残(百万株)", UnitConversion::MillionShares),
    converted("jsf_stock_lending_balance", "日証金貸株残(百万株)", UnitConversion::MillionShares),
    converted("jsf_net_balance", "日証金差引残(百万株)", UnitConversion::MillionShares),
];

/// Drop-down filters.
pub const SELECTS: &[(&str, &str)] = &[
    ("market", "市場"),
    ("sector", "業種"),
    ("is_credit_issue", "信用銘柄"),
];

/// Checkbox filters.
pub const FLAGS: &[(&str, &str)] = &[
    ("pattern_vwap_golden_cross", "VWAPゴールデンクロス"),
    ("pattern_upper_shadow", "上髭陰線"),
    ("pattern_volume_golden_cross", "出来高ゴールデンクロス"),
    ("pattern_price_golden_cross", "株価ゴールデンクロス"),
    ("margin_lending_only", "貸借銘柄のみ"),
];

/// Build the full criterion list with empty raw values.
pub fn catalog() -> Vec<FilterCriterion> {
    let mut criteria = Vec::with_capacity(SELECTS.len() + FLAGS.len() + RANGE_FAMILIES.len() * 2);

    for (key, label) in SELECTS {
        criteria.push(FilterCriterion::new(*key, *label, CriterionKind::Select));
    }

    for fam in RANGE_FAMILIES {
        for (prefix, bound) in [("min", "下限"), ("max", "上限")] {
            let mut criterion = FilterCriterion::new(
                format!("{}_{}", prefix, fam.name),
                format!("{} {}", fam.label, bound),
                CriterionKind::NumericBound,
            );
            criterion.conversion = fam.conversion;
            criteria.push(criterion);
        }
    }

    for (key, label) in FLAGS {
        criteria.push(FilterCriterion::new(*key, *label, CriterionKind::Flag));
    }

    criteria
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn numeric(key: &str, conversion: Option<UnitConversion>, raw: &str) -> FilterCriterion {
        FilterCriterion {
            key: key.into(),
            label: key.into(),
            kind: CriterionKind::NumericBound,
            conversion,
            raw_value: raw.into(),
        }
    }

    #[test]
    fn test_catalog_keys_unique() {
        let criteria = catalog();
        let keys: HashSet<_> = criteria.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys.len(), criteria.len());
        assert!(keys.contains("min_market_cap"));
        assert!(keys.contains("max_jsf_net_balance"));
        assert!(keys.contains("margin_lending_only"));
    }

    #[test]
    fn test_catalog_conversions() {
        let criteria = catalog();
        let conversion_of = |key: &str| {
            criteria.iter().find(|c| c.key == key).and_then(|c| c.conversion)
        };
        assert_eq!(conversion_of("min_shares_issued"), Some(UnitConversion::MillionShares));
        assert_eq!(conversion_of("max_market_cap"), Some(UnitConversion::HundredMillionYen));
        assert_eq!(conversion_of("min_jsf_loan_balance"), Some(UnitConversion::MillionShares));
        assert_eq!(conversion_of("max_jsf_stock_lending_balance"), Some(UnitConversion::MillionShares));
        assert_eq!(conversion_of("min_per"), None);
    }

    #[test]
    fn test_unit_conversions_are_exact() {
        let shares = numeric("min_shares_issued", Some(UnitConversion::MillionShares), "10");
        assert_eq!(shares.query_value().as_deref(), Some("10000000"));

        let cap = numeric("min_market_cap", Some(UnitConversion::HundredMillionYen), "5");
        assert_eq!(cap.query_value().as_deref(), Some("500"));

        let half = numeric("max_jsf_net_balance", Some(UnitConversion::MillionShares), "0.5");
        assert_eq!(half.query_value().as_deref(), Some("500000"));
    }

    #[test]
    fn test_passthrough_keeps_value() {
        assert_eq!(numeric("min_per", None, " 12.5 ").query_value().as_deref(), Some("12.5"));
        assert_eq!(numeric("min_roe", None, "-3").query_value().as_deref(), Some("-3"));
        assert_eq!(numeric("min_roe", None, "0").query_value().as_deref(), Some("0"));
    }

    #[test]
    fn test_empty_and_malformed_numeric_dropped() {
        assert_eq!(numeric("min_per", None, "").query_value(), None);
        assert_eq!(numeric("min_per", None, "   ").query_value(), None);
        assert_eq!(numeric("min_per", None, "abc").query_value(), None);
        assert_eq!(numeric("min_per", None, "NaN").query_value(), None);
        assert_eq!(numeric("min_per", None, "inf").query_value(), None);
    }

    #[test]
    fn test_flag_and_select_values() {
        let mut flag = FilterCriterion::new("pattern_upper_shadow", "上髭", CriterionKind::Flag);
        assert_eq!(flag.query_value(), None);
        flag.raw_value = "false".into();
        assert_eq!(flag.query_value(), None);
        flag.raw_value = "on".into();
        assert_eq!(flag.query_value().as_deref(), Some("true"));

        let mut select = FilterCriterion::new("market", "市場", CriterionKind::Select);
        assert_eq!(select.query_value(), None);
        select.raw_value = "プライム".into();
        assert_eq!(select.query_value().as_deref(), Some("プライム"));
    }

    #[test]
    fn test_format_query_number() {
        assert_eq!(format_query_number(1_000_000.0), "1000000");
        assert_eq!(format_query_number(-0.0), "0");
        assert_eq!(format_query_number(1.25), "1.25");
    }
}
