//! Display projection of screening results.
//!
//! Every formatter falls back to [`MISSING_DISPLAY`] for null, blank or
//! non-numeric values. Nothing here fails.

use serde::Serialize;

use crate::record::{FieldValue, StockField, StockRecord};

/// Shown in place of any value that cannot be displayed.
pub const MISSING_DISPLAY: &str = "-";

/// Placeholder text for a screen with no matches.
pub const NO_MATCHES_MESSAGE: &str = "条件に一致する銘柄が見つかりませんでした";

/// Unit label for market capitalization as displayed.
pub const MARKET_CAP_UNIT: &str = "億円";

/// Default table layout.
pub const TABLE_COLUMNS: &[StockField] = &[
    StockField::Code,
    StockField::Name,
    StockField::Market,
    StockField::Sector,
    StockField::Price,
    StockField::ChangePercent,
    StockField::Volume,
    StockField::VolumeRatio,
    StockField::MarketCap,
    StockField::Per,
    StockField::Pbr,
    StockField::Roe,
    StockField::DividendYield,
    StockField::Vwap,
    StockField::Rsi14,
    StockField::PriceDeviation20,
    StockField::MarginRatio,
    StockField::MarginBuyingVolumeRatio,
    StockField::JsfNetBalance,
];

// ============================================================================
// Formatters
// ============================================================================

/// Up/down classification of a change value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeClass {
    Positive,
    Negative,
    Neutral,
}

fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Round to two decimals, halves away from zero, with `-0.0` folded to `0.0`.
fn round2(value: f64) -> f64 {
    // Beyond this the scaled value has no fractional part left to round
    let rounded = if value.abs() < 1.0e13 {
        (value * 100.0).round() / 100.0
    } else {
        value
    };
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Two decimals plus an optional suffix, e.g. `12.30%`.
pub fn format_number(value: Option<f64>, suffix: &str) -> String {
    match usable(value) {
        Some(v) => format!("{:.2}{}", round2(v), suffix),
        None => MISSING_DISPLAY.to_string(),
    }
}

/// Insert `,` every three digits of an unsigned integer string.
fn group_digits(digits: &str) -> String {
    let len = digits.len();
    let mut grouped = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

fn grouped(value: f64, max_fraction_digits: usize) -> String {
    let formatted = format!("{:.*}", max_fraction_digits, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, f.trim_end_matches('0')),
        None => (formatted.as_str(), ""),
    };

    let mut out = String::new();
    let is_zero = int_part.bytes().all(|b| b == b'0') && frac_part.is_empty();
    if value.is_sign_negative() && !is_zero {
        out.push('-');
    }
    out.push_str(&group_digits(int_part));
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}

/// Price with thousands separators and up to three fraction digits.
pub fn format_price(value: Option<f64>) -> String {
    usable(value).map_or_else(|| MISSING_DISPLAY.to_string(), |v| grouped(v, 3))
}

/// Whole counts (volume, shares, balances) with thousands separators.
pub fn format_count(value: Option<f64>) -> String {
    usable(value).map_or_else(|| MISSING_DISPLAY.to_string(), |v| grouped(v, 0))
}

/// Change percent: `+` for zero and up, sign kept below zero.
///
/// The class follows the displayed value, so `-0.001` shows as `+0.00%`.
pub fn format_change_percent(value: Option<f64>) -> (String, ChangeClass) {
    match usable(value).map(round2) {
        Some(v) if v >= 0.0 => (format!("+{:.2}%", v), ChangeClass::Positive),
        Some(v) => (format!("{:.2}%", v), ChangeClass::Negative),
        None => (MISSING_DISPLAY.to_string(), ChangeClass::Neutral),
    }
}

/// Market cap stored in million yen, displayed in 億円 (÷100).
pub fn format_market_cap(value: Option<f64>) -> String {
    match usable(value) {
        Some(v) => format!("{:.2}{}", round2(v / 100.0), MARKET_CAP_UNIT),
        None => MISSING_DISPLAY.to_string(),
    }
}

fn format_text(value: FieldValue<'_>) -> String {
    match value {
        FieldValue::Text(s) if !s.trim().is_empty() => s.to_string(),
        FieldValue::Number(n) if n.is_finite() => n.to_string(),
        _ => MISSING_DISPLAY.to_string(),
    }
}

/// Display string for one field of a record.
pub fn format_field(field: StockField, record: &StockRecord) -> String {
    use StockField::*;

    let value = field.value(record);
    let number = value.as_number();
    match field {
        Code | Name | Market | Sector => format_text(value),
        Price | Open | High | Low | Vwap | YearlyHigh | YearlyLow | Ma5 | Ma25 | Ma50 | Ma75
        | BbUpper | BbMiddle | BbLower => format_price(number),
        ChangePercent => format_change_percent(number).0,
        MarketCap => format_market_cap(number),
        Volume | SharesIssued | MarginBuying | MarginSelling | JsfLoanBalance
        | JsfStockLendingBalance | JsfNetBalance => format_count(number),
        Roe | DividendYield | PriceDeviation5 | PriceDeviation20 | PriceDeviation100
        | VolumeDeviation5 | VolumeDeviation20 | VolumeDeviation100
        | MarginBuyingDeviation20 => format_number(number, "%"),
        VolumeGoldenCross | PriceGoldenCross | VwapGoldenCross => match number {
            Some(n) if n != 0.0 && !n.is_nan() => "○".to_string(),
            _ => MISSING_DISPLAY.to_string(),
        },
        _ => format_number(number, ""),
    }
}

/// Short badges for the pattern flags a record carries.
pub fn pattern_badges(record: &StockRecord) -> Vec<&'static str> {
    [
        (record.vwap_golden_cross, "VWAP-GC"),
        (record.volume_golden_cross, "出来高GC"),
        (record.price_golden_cross, "株価GC"),
        (record.upper_shadow, "上髭"),
    ]
    .into_iter()
    .filter_map(|(flag, badge)| (flag == Some(true)).then_some(badge))
    .collect()
}

// ============================================================================
// Rendered Table
// ============================================================================

/// One displayed security.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockRow {
    pub code: String,
    /// Cells aligned with the projector's columns
    pub cells: Vec<String>,
    pub change_class: ChangeClass,
    pub patterns: Vec<&'static str>,
}

/// A table row: a security, or the zero-match placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableRow {
    Stock(StockRow),
    NoMatches { message: &'static str },
}

/// Output of [`ResultProjector::render`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedTable {
    pub columns: Vec<StockField>,
    pub rows: Vec<TableRow>,
    /// False for an empty screen; the analysis hand-off is suppressed.
    pub analysis_enabled: bool,
}

impl RenderedTable {
    pub fn is_no_matches(&self) -> bool {
        matches!(self.rows.as_slice(), [TableRow::NoMatches { .. }])
    }

    pub fn stock_rows(&self) -> impl Iterator<Item = &StockRow> {
        self.rows.iter().filter_map(|row| match row {
            TableRow::Stock(stock) => Some(stock),
            TableRow::NoMatches { .. } => None,
        })
    }
}

/// Formats a result set into display rows.
#[derive(Debug, Clone)]
pub struct ResultProjector {
    columns: Vec<StockField>,
}

impl Default for ResultProjector {
    fn default() -> Self {
        Self::new(TABLE_COLUMNS.to_vec())
    }
}

impl ResultProjector {
    pub fn new(columns: Vec<StockField>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[StockField] {
        &self.columns
    }

    pub fn render_row(&self, record: &StockRecord) -> StockRow {
        StockRow {
            code: record.code().to_string(),
            cells: self.columns.iter().map(|f| format_field(*f, record)).collect(),
            change_class: format_change_percent(record.change_percent).1,
            patterns: pattern_badges(record),
        }
    }

    /// Render every record, or a single placeholder row when there are none.
    pub fn render(&self, results: &[StockRecord]) -> RenderedTable {
        if results.is_empty() {
            return RenderedTable {
                columns: self.columns.clone(),
                rows: vec![TableRow::NoMatches {
                    message: NO_MATCHES_MESSAGE,
                }],
                analysis_enabled: false,
            };
        }

        RenderedTable {
            columns: self.columns.clone(),
            rows: results
                .iter()
                .map(|r| TableRow::Stock(self.render_row(r)))
                .collect(),
            analysis_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(None, "" => "-" ; "null")]
    #[test_case(Some(f64::NAN), "%" => "-" ; "nan")]
    #[test_case(Some(12.345), "%" => "12.35%" ; "percent suffix")]
    #[test_case(Some(-0.5), "" => "-0.50" ; "negative")]
    #[test_case(Some(0.0), "" => "0.00" ; "zero is a value")]
    #[test_case(Some(-0.0), "%" => "0.00%" ; "negative zero")]
    #[test_case(Some(-0.001), "" => "0.00" ; "rounds to zero without sign")]
    #[test_case(Some(0.125), "" => "0.13" ; "half rounds away from zero")]
    #[test_case(Some(-0.125), "" => "-0.13" ; "negative half rounds away from zero")]
    fn test_format_number(value: Option<f64>, suffix: &str) -> String {
        format_number(value, suffix)
    }

    #[test_case(None => "-" ; "null")]
    #[test_case(Some(2500.0) => "2,500" ; "integral")]
    #[test_case(Some(1234567.5) => "1,234,567.5" ; "fraction kept")]
    #[test_case(Some(999.0) => "999" ; "no separator needed")]
    #[test_case(Some(-1500.25) => "-1,500.25" ; "negative")]
    #[test_case(Some(0.1234) => "0.123" ; "three fraction digits")]
    fn test_format_price(value: Option<f64>) -> String {
        format_price(value)
    }

    #[test_case(Some(1.5) => ("+1.50%".to_string(), ChangeClass::Positive) ; "up")]
    #[test_case(Some(0.0) => ("+0.00%".to_string(), ChangeClass::Positive) ; "zero is positive")]
    #[test_case(Some(-2.25) => ("-2.25%".to_string(), ChangeClass::Negative) ; "down")]
    #[test_case(Some(-0.0) => ("+0.00%".to_string(), ChangeClass::Positive) ; "negative zero")]
    #[test_case(Some(-0.004) => ("+0.00%".to_string(), ChangeClass::Positive) ; "tiny loss rounds to zero")]
    #[test_case(Some(1.005) => ("+1.00%".to_string(), ChangeClass::Positive) ; "binary value below half")]
    #[test_case(None => ("-".to_string(), ChangeClass::Neutral) ; "null")]
    fn test_format_change_percent(value: Option<f64>) -> (String, ChangeClass) {
        format_change_percent(value)
    }

    #[test]
    fn test_market_cap_is_inverse_of_ingestion() {
        assert_eq!(format_market_cap(Some(500.0)), "5.00億円");
        assert_eq!(format_market_cap(Some(123_456.0)), "1234.56億円");
        assert_eq!(format_market_cap(None), "-");
        assert_eq!(format_market_cap(Some(-0.0)), "0.00億円");
        assert_eq!(format_market_cap(Some(12.5)), "0.13億円");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(Some(12_345_678.0)), "12,345,678");
        assert_eq!(format_count(Some(-2_000_000.0)), "-2,000,000");
        assert_eq!(format_count(Some(f64::NAN)), "-");
    }

    #[test]
    fn test_zero_results_single_placeholder() {
        let table = ResultProjector::default().render(&[]);
        assert_eq!(table.rows.len(), 1);
        assert!(table.is_no_matches());
        assert!(!table.analysis_enabled);
        assert_eq!(table.stock_rows().count(), 0);
    }

    #[test]
    fn test_render_rows() {
        let records = vec![
            StockRecord {
                code: Some("7203".into()),
                name: Some("トヨタ自動車".into()),
                price: Some(2500.5),
                change_percent: Some(-1.2),
                market_cap: Some(4_000_000.0),
                per: Some(f64::NAN),
                vwap_golden_cross: Some(true),
                ..Default::default()
            },
            StockRecord::default(),
        ];
        let projector = ResultProjector::new(vec![
            StockField::Code,
            StockField::Price,
            StockField::ChangePercent,
            StockField::MarketCap,
            StockField::Per,
            StockField::Sector,
        ]);
        let table = projector.render(&records);
        assert!(table.analysis_enabled);
        assert_eq!(table.rows.len(), 2);

        let rows: Vec<_> = table.stock_rows().collect();
        assert_eq!(
            rows[0].cells,
            vec!["7203", "2,500.5", "-1.20%", "40000.00億円", "-", "-"]
        );
        assert_eq!(rows[0].change_class, ChangeClass::Negative);
        assert_eq!(rows[0].patterns, vec!["VWAP-GC"]);
        assert!(rows[1].cells.iter().all(|c| c == "-"));
        assert_eq!(rows[1].change_class, ChangeClass::Neutral);
    }

    #[test]
    fn test_format_field_flags_and_percent() {
        let record = StockRecord {
            volume_golden_cross: Some(true),
            price_golden_cross: Some(false),
            roe: Some(8.0),
            ..Default::default()
        };
        assert_eq!(format_field(StockField::VolumeGoldenCross, &record), "○");
        assert_eq!(format_field(StockField::PriceGoldenCross, &record), "-");
        assert_eq!(format_field(StockField::Roe, &record), "8.00%");
    }
}
