//! Screened security records.
//!
//! The backend schema is owned by the screening service, so every field is
//! optional and decoded leniently: numbers may arrive as JSON numbers,
//! numeric strings, booleans or null. Anything that is present but not
//! numeric decodes to `NaN` and is handled by the sort and format rules.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// ============================================================================
// Lenient decoding
// ============================================================================

/// Interpret a JSON value as a number.
///
/// `null` and blank strings are absent; non-numeric text is `NaN`.
pub fn numeric_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Null => None,
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.parse().unwrap_or(f64::NAN))
            }
        }
        Value::Array(_) | Value::Object(_) => Some(f64::NAN),
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(numeric_from_value))
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::Bool(b)) => Some(b),
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "" => None,
            "true" | "1" => Some(true),
            _ => Some(false),
        },
        Some(other) => numeric_from_value(&other).map(|n| n != 0.0 && !n.is_nan()),
    })
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

// ============================================================================
// Stock Record
// ============================================================================

/// One screened security as returned by the screening service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    // === Identity ===
    #[serde(default, deserialize_with = "lenient_text")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub market: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub sector: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub industry: Option<String>,
    /// Trading date the row was computed for
    #[serde(default, deserialize_with = "lenient_text")]
    pub stock_date: Option<String>,
    /// 貸借銘柄 / 信用銘柄 classification
    #[serde(default, deserialize_with = "lenient_text")]
    pub margin_category: Option<String>,

    // === Prices ===
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub open: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub high: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub low: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub vwap: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub change_amount: Option<f64>,
    /// Day-over-day change (%)
    #[serde(default, deserialize_with = "lenient_f64")]
    pub change_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub yearly_high: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub yearly_low: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub yearly_low_date: Option<String>,

    // === Volume & size ===
    #[serde(default, deserialize_with = "lenient_f64")]
    pub volume: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub volume_ratio: Option<f64>,
    /// Market capitalization in million yen
    #[serde(default, deserialize_with = "lenient_f64")]
    pub market_cap: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub shares_issued: Option<f64>,

    // === Fundamentals ===
    #[serde(default, deserialize_with = "lenient_f64")]
    pub per: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub pbr: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub roe: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub dividend_yield: Option<f64>,

    // === Deviations (%) ===
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price_deviation_5: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price_deviation_20: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price_deviation_100: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub volume_deviation_5: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub volume_deviation_20: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub volume_deviation_100: Option<f64>,

    // === Technical indicators ===
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ma5: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ma25: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ma50: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ma75: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub rsi14: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub macd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub macd_signal: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub macd_histogram: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub bb_upper: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub bb_middle: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub bb_lower: Option<f64>,

    // === Margin & lending ===
    #[serde(default, deserialize_with = "lenient_f64")]
    pub margin_buying: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub margin_selling: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub margin_ratio: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub margin_buying_deviation: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub margin_buying_deviation_20: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub margin_buying_volume_ratio: Option<f64>,
    /// Older name of `margin_buying_volume_ratio`
    #[serde(default, deserialize_with = "lenient_f64")]
    pub credit_volume_ratio: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub stock_lending_repayment_ratio: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub jsf_diff_ratio: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub short_ratio: Option<f64>,
    /// 日証金 balances, in shares
    #[serde(default, deserialize_with = "lenient_f64")]
    pub jsf_loan_balance: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub jsf_stock_lending_balance: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub jsf_net_balance: Option<f64>,

    // === Pattern flags ===
    #[serde(default, deserialize_with = "lenient_flag")]
    pub volume_golden_cross: Option<bool>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub price_golden_cross: Option<bool>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub vwap_golden_cross: Option<bool>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub upper_shadow: Option<bool>,

    /// Fields this crate does not interpret, kept for re-export.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl StockRecord {
    /// Security code, or an empty string when the backend omitted it.
    pub fn code(&self) -> &str {
        self.code.as_deref().unwrap_or("")
    }

    /// Display name, or an empty string when absent.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

// ============================================================================
// Field Access
// ============================================================================

/// A field value read through [`StockField::value`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Number(f64),
    Text(&'a str),
    Missing,
}

impl<'a> FieldValue<'a> {
    fn from_number(value: Option<f64>) -> Self {
        value.map_or(Self::Missing, Self::Number)
    }

    fn from_text(value: &'a Option<String>) -> Self {
        value.as_deref().map_or(Self::Missing, Self::Text)
    }

    fn from_flag(value: Option<bool>) -> Self {
        value.map_or(Self::Missing, |b| Self::Number(if b { 1.0 } else { 0.0 }))
    }

    /// Numeric view of the value; text is parsed, failing to `NaN`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => Some(s.trim().parse().unwrap_or(f64::NAN)),
            Self::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

macro_rules! stock_fields {
    ($( $variant:ident => $key:literal, $label:literal, |$r:ident| $access:expr; )*) => {
        /// Sortable and formattable columns of a [`StockRecord`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StockField {
            $( $variant, )*
        }

        impl StockField {
            /// Every column, in table order.
            pub const ALL: &'static [StockField] = &[ $( StockField::$variant, )* ];

            /// Wire key of the column (the backend's JSON field name).
            pub fn key(&self) -> &'static str {
                match self {
                    $( Self::$variant => $key, )*
                }
            }

            /// Column header.
            pub fn label(&self) -> &'static str {
                match self {
                    $( Self::$variant => $label, )*
                }
            }

            /// Parse a column from its wire key.
            pub fn from_key(key: &str) -> Option<Self> {
                match key {
                    $( $key => Some(Self::$variant), )*
                    _ => None,
                }
            }

            /// Read this column from a record.
            pub fn value<'a>(&self, record: &'a StockRecord) -> FieldValue<'a> {
                match self {
                    $( Self::$variant => { let $r = record; $access } )*
                }
            }
        }
    };
}

stock_fields! {
    Code => "code", "コード", |r| FieldValue::from_text(&r.code);
    Name => "name", "銘柄名", |r| FieldValue::from_text(&r.name);
    Market => "market", "市場", |r| FieldValue::from_text(&r.market);
    Sector => "sector", "業種", |r| FieldValue::from_text(&r.sector);
    Price => "price", "株価", |r| FieldValue::from_number(r.price);
    ChangeAmount => "change_amount", "前日比", |r| FieldValue::from_number(r.change_amount);
    ChangePercent => "change_percent", "騰落率", |r| FieldValue::from_number(r.change_percent);
    Open => "open", "始値", |r| FieldValue::from_number(r.open);
    High => "high", "高値", |r| FieldValue::from_number(r.high);
    Low => "low", "安値", |r| FieldValue::from_number(r.low);
    Vwap => "vwap", "VWAP", |r| FieldValue::from_number(r.vwap);
    YearlyHigh => "yearly_high", "年初来高値", |r| FieldValue::from_number(r.yearly_high);
    YearlyLow => "yearly_low", "年初来安値", |r| FieldValue::from_number(r.yearly_low);
    Volume => "volume", "出来高", |r| FieldValue::from_number(r.volume);
    VolumeRatio => "volume_ratio", "出来高率", |r| FieldValue::from_number(r.volume_ratio);
    MarketCap => "market_cap", "時価総額", |r| FieldValue::from_number(r.market_cap);
    SharesIssued => "shares_issued", "発行済株式数", |r| FieldValue::from_number(r.shares_issued);
    Per => "per", "PER", |r| FieldValue::from_number(r.per);
    Pbr => "pbr", "PBR", |r| FieldValue::from_number(r.pbr);
    Roe => "roe", "ROE", |r| FieldValue::from_number(r.roe);
    DividendYield => "dividend_yield", "配当利回り", |r| FieldValue::from_number(r.dividend_yield);
    PriceDeviation5 => "price_deviation_5", "5日乖離率", |r| FieldValue::from_number(r.price_deviation_5);
    PriceDeviation20 => "price_deviation_20", "20日乖離率", |r| FieldValue::from_number(r.price_deviation_20);
    PriceDeviation100 => "price_deviation_100", "100日乖離率", |r| FieldValue::from_number(r.price_deviation_100);
    VolumeDeviation5 => "volume_deviation_5", "出来高5日乖離", |r| FieldValue::from_number(r.volume_deviation_5);
    VolumeDeviation20 => "volume_deviation_20", "出来高20日乖離", |r| FieldValue::from_number(r.volume_deviation_20);
    VolumeDeviation100 => "volume_deviation_100", "出来高100日乖離", |r| FieldValue::from_number(r.volume_deviation_100);
    Ma5 => "ma5", "MA5", |r| FieldValue::from_number(r.ma5);
    Ma25 => "ma25", "MA25", |r| FieldValue::from_number(r.ma25);
    Ma50 => "ma50", "MA50", |r| FieldValue::from_number(r.ma50);
    Ma75 => "ma75", "MA75", |r| FieldValue::from_number(r.ma75);
    Rsi14 => "rsi14", "RSI14", |r| FieldValue::from_number(r.rsi14);
    Macd => "macd", "MACD", |r| FieldValue::from_number(r.macd);
    MacdSignal => "macd_signal", "MACDシグナル", |r| FieldValue::from_number(r.macd_signal);
    MacdHistogram => "macd_histogram", "MACDヒストグラム", |r| FieldValue::from_number(r.macd_histogram);
    BbUpper => "bb_upper", "BB上限", |r| FieldValue::from_number(r.bb_upper);
    BbMiddle => "bb_middle", "BB中心", |r| FieldValue::from_number(r.bb_middle);
    BbLower => "bb_lower", "BB下限", |r| FieldValue::from_number(r.bb_lower);
    MarginBuying => "margin_buying", "信用買残", |r| FieldValue::from_number(r.margin_buying);
    MarginSelling => "margin_selling", "信用売残", |r| FieldValue::from_number(r.margin_selling);
    MarginRatio => "margin_ratio", "信用倍率", |r| FieldValue::from_number(r.margin_ratio);
    MarginBuyingDeviation20 => "margin_buying_deviation_20", "信用買残20日乖離", |r| FieldValue::from_number(r.margin_buying_deviation_20);
    MarginBuyingVolumeRatio => "margin_buying_volume_ratio", "信用買残÷出来高", |r| FieldValue::from_number(r.margin_buying_volume_ratio);
    StockLendingRepaymentRatio => "stock_lending_repayment_ratio", "貸株返済比率", |r| FieldValue::from_number(r.stock_lending_repayment_ratio);
    JsfDiffRatio => "jsf_diff_ratio", "日証金差引比率", |r| FieldValue::from_number(r.jsf_diff_ratio);
    ShortRatio => "short_ratio", "空売り比率", |r| FieldValue::from_number(r.short_ratio);
    JsfLoanBalance => "jsf_loan_balance", "日証金融資残", |r| FieldValue::from_number(r.jsf_loan_balance);
    JsfStockLendingBalance => "jsf_stock_lending_balance", "日証金貸株残", |r| FieldValue::from_number(r.jsf_stock_lending_balance);
    JsfNetBalance => "jsf_net_balance", "日証金差引残", |r| FieldValue::from_number(r.jsf_net_balance);
    VolumeGoldenCross => "volume_golden_cross", "出来高GC", |r| FieldValue::from_flag(r.volume_golden_cross);
    PriceGoldenCross => "price_golden_cross", "株価GC", |r| FieldValue::from_flag(r.price_golden_cross);
    VwapGoldenCross => "vwap_golden_cross", "VWAP GC", |r| FieldValue::from_flag(r.vwap_golden_cross);
}

impl std::fmt::Display for StockField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for StockField {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lenient_decoding() {
        let record: StockRecord = serde_json::from_value(json!({
            "code": 7203,
            "name": "トヨタ自動車",
            "price": "2500.5",
            "per": "12.3倍",
            "pbr": null,
            "roe": "",
            "volume_golden_cross": 1,
            "price_golden_cross": 0,
            "vwap_golden_cross": "true",
        }))
        .unwrap();

        assert_eq!(record.code(), "7203");
        assert_eq!(record.price, Some(2500.5));
        assert!(record.per.unwrap().is_nan());
        assert_eq!(record.pbr, None);
        assert_eq!(record.roe, None);
        assert_eq!(record.volume_golden_cross, Some(true));
        assert_eq!(record.price_golden_cross, Some(false));
        assert_eq!(record.vwap_golden_cross, Some(true));
        assert_eq!(record.upper_shadow, None);
    }

    #[test]
    fn test_missing_fields_are_none() {
        let record: StockRecord = serde_json::from_value(json!({})).unwrap();
        assert_eq!(record.code(), "");
        assert!(record.market_cap.is_none());
        assert!(StockField::MarketCap.value(&record).is_missing());
    }

    #[test]
    fn test_unknown_fields_are_kept() {
        let record: StockRecord =
            serde_json::from_value(json!({"code": "6758", "ichimoku_span_a": 120.5})).unwrap();
        assert_eq!(record.extra.get("ichimoku_span_a"), Some(&json!(120.5)));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["ichimoku_span_a"], json!(120.5));
    }

    #[test]
    fn test_field_keys_round_trip() {
        for field in StockField::ALL {
            assert_eq!(StockField::from_key(field.key()), Some(*field));
        }
        assert_eq!(StockField::from_key("no_such_column"), None);
    }

    #[test]
    fn test_field_value_access() {
        let record = StockRecord {
            name: Some("ソニーG".into()),
            rsi14: Some(71.2),
            vwap_golden_cross: Some(true),
            ..Default::default()
        };
        assert_eq!(StockField::Rsi14.value(&record), FieldValue::Number(71.2));
        assert_eq!(StockField::Name.value(&record), FieldValue::Text("ソニーG"));
        assert_eq!(StockField::VwapGoldenCross.value(&record), FieldValue::Number(1.0));
        assert_eq!(StockField::Macd.value(&record), FieldValue::Missing);
    }

    #[test]
    fn test_text_as_number() {
        assert_eq!(FieldValue::Text(" 42.5 ").as_number(), Some(42.5));
        assert!(FieldValue::Text("N/A").as_number().unwrap().is_nan());
        assert_eq!(FieldValue::Missing.as_number(), None);
    }
}
