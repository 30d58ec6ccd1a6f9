//! Analysis snapshot: a reduced copy of the last displayed result set.
//!
//! The snapshot lives in a small SQLite key/value table under two entries,
//! [`RESULTS_KEY`] and [`TIMESTAMP_KEY`], which the analysis view reads back.
//! Each capture replaces the previous one.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::record::StockRecord;

/// Entry holding the JSON array of [`SnapshotRecord`]s.
pub const RESULTS_KEY: &str = "screeningResults";

/// Entry holding the RFC 3339 capture time.
pub const TIMESTAMP_KEY: &str = "screeningTimestamp";

// ============================================================================
// Projection
// ============================================================================

/// Analysis-oriented subset of a [`StockRecord`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    pub code: Option<String>,
    pub name: Option<String>,
    pub market: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub stock_date: Option<String>,

    pub price: Option<f64>,
    pub change_amount: Option<f64>,
    pub change_percent: Option<f64>,
    pub volume: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub market_cap: Option<f64>,
    pub shares_issued: Option<f64>,
    pub per: Option<f64>,
    pub pbr: Option<f64>,
    pub roe: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub vwap: Option<f64>,
    pub yearly_high: Option<f64>,
    pub yearly_low: Option<f64>,

    pub price_deviation_5: Option<f64>,
    pub price_deviation_20: Option<f64>,
    pub volume_deviation_5: Option<f64>,
    pub volume_deviation_20: Option<f64>,

    pub ma5: Option<f64>,
    pub ma25: Option<f64>,
    pub ma75: Option<f64>,
    pub rsi14: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_lower: Option<f64>,

    pub margin_ratio: Option<f64>,
    pub margin_buying_deviation: Option<f64>,
    pub margin_buying_volume_ratio: Option<f64>,
    pub stock_lending_repayment_ratio: Option<f64>,
    pub short_ratio: Option<f64>,
    pub jsf_net_balance: Option<f64>,

    pub vwap_golden_cross: Option<bool>,
    pub volume_golden_cross: Option<bool>,
    pub price_golden_cross: Option<bool>,
    pub upper_shadow: Option<bool>,
}

impl SnapshotRecord {
    /// Project a full record.
    ///
    /// Four fields fall back to an older column when the current one is
    /// absent: 5-day price and volume deviation fall back to the 20-day
    /// values, margin-buying deviation to its 20-day variant, and the
    /// margin-buying/volume ratio to `credit_volume_ratio`.
    pub fn project(record: &StockRecord) -> Self {
        Self {
            code: record.code.clone(),
            name: record.name.clone(),
            market: record.market.clone(),
            sector: record.sector.clone(),
            industry: record.industry.clone(),
            stock_date: record.stock_date.clone(),

            price: record.price,
            change_amount: record.change_amount,
            change_percent: record.change_percent,
            volume: record.volume,
            volume_ratio: record.volume_ratio,
            market_cap: record.market_cap,
            shares_issued: record.shares_issued,
            per: record.per,
            pbr: record.pbr,
            roe: record.roe,
            dividend_yield: record.dividend_yield,
            vwap: record.vwap,
            yearly_high: record.yearly_high,
            yearly_low: record.yearly_low,

            price_deviation_5: record.price_deviation_5.or(record.price_deviation_20),
            price_deviation_20: record.price_deviation_20,
            volume_deviation_5: record.volume_deviation_5.or(record.volume_deviation_20),
            volume_deviation_20: record.volume_deviation_20,

            ma5: record.ma5,
            ma25: record.ma25,
            ma75: record.ma75,
            rsi14: record.rsi14,
            macd: record.macd,
            macd_signal: record.macd_signal,
            bb_upper: record.bb_upper,
            bb_lower: record.bb_lower,

            margin_ratio: record.margin_ratio,
            margin_buying_deviation: record
                .margin_buying_deviation
                .or(record.margin_buying_deviation_20),
            margin_buying_volume_ratio: record
                .margin_buying_volume_ratio
                .or(record.credit_volume_ratio),
            stock_lending_repayment_ratio: record.stock_lending_repayment_ratio,
            short_ratio: record.short_ratio,
            jsf_net_balance: record.jsf_net_balance,

            vwap_golden_cross: record.vwap_golden_cross,
            volume_golden_cross: record.volume_golden_cross,
            price_golden_cross: record.price_golden_cross,
            upper_shadow: record.upper_shadow,
        }
    }
}

/// The persisted snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub records: Vec<SnapshotRecord>,
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ============================================================================
// Store
// ============================================================================

/// SQLite-backed holder of the single current snapshot.
pub struct SnapshotStore {
    conn: Arc<Mutex<Connection>>,
}

impl SnapshotStore {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create snapshot directory {:?}", parent))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open snapshot database at {:?}", path))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;

        info!(path = ?path, "Snapshot store opened");
        Ok(store)
    }

    /// Create an in-memory store.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;

        debug!("In-memory snapshot store created");
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("snapshot store lock poisoned"))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS snapshot_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        debug!("Snapshot schema initialized");
        Ok(())
    }

    /// Project and persist `results`, replacing any previous snapshot.
    pub fn capture(&self, results: &[StockRecord]) -> Result<Snapshot> {
        let snapshot = Snapshot {
            records: results.iter().map(SnapshotRecord::project).collect(),
            captured_at: Utc::now(),
        };
        let payload =
            serde_json::to_string(&snapshot.records).context("Failed to serialize snapshot")?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO snapshot_entries (key, value) VALUES (?1, ?2)",
            params![RESULTS_KEY, payload],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO snapshot_entries (key, value) VALUES (?1, ?2)",
            params![TIMESTAMP_KEY, snapshot.captured_at.to_rfc3339()],
        )?;
        tx.commit()?;

        info!(
            records = snapshot.records.len(),
            captured_at = %snapshot.captured_at,
            "Snapshot captured"
        );
        Ok(snapshot)
    }

    /// Raw value of one entry.
    pub fn entry(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM snapshot_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Read back the current snapshot, if one has been captured.
    pub fn load(&self) -> Result<Option<Snapshot>> {
        let Some(payload) = self.entry(RESULTS_KEY)? else {
            return Ok(None);
        };
        let timestamp = self
            .entry(TIMESTAMP_KEY)?
            .with_context(|| format!("Snapshot has {} but no {}", RESULTS_KEY, TIMESTAMP_KEY))?;

        let records: Vec<SnapshotRecord> =
            serde_json::from_str(&payload).context("Failed to parse snapshot records")?;
        let captured_at = DateTime::parse_from_rfc3339(&timestamp)
            .with_context(|| format!("Invalid snapshot timestamp {:?}", timestamp))?
            .with_timezone(&Utc);

        Ok(Some(Snapshot {
            records,
            captured_at,
        }))
    }

    /// Remove the current snapshot.
    pub fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM snapshot_entries WHERE key IN (?1, ?2)",
            params![RESULTS_KEY, TIMESTAMP_KEY],
        )?;
        debug!(removed, "Snapshot cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str) -> StockRecord {
        StockRecord {
            code: Some(code.into()),
            price: Some(1000.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_fallback_pairs() {
        let legacy = StockRecord {
            price_deviation_20: Some(3.2),
            volume_deviation_20: Some(-12.0),
            margin_buying_deviation_20: Some(4.4),
            credit_volume_ratio: Some(0.8),
            ..Default::default()
        };
        let projected = SnapshotRecord::project(&legacy);
        assert_eq!(projected.price_deviation_5, Some(3.2));
        assert_eq!(projected.volume_deviation_5, Some(-12.0));
        assert_eq!(projected.margin_buying_deviation, Some(4.4));
        assert_eq!(projected.margin_buying_volume_ratio, Some(0.8));
    }

    #[test]
    fn test_primary_wins_over_fallback() {
        let current = StockRecord {
            price_deviation_5: Some(1.0),
            price_deviation_20: Some(2.0),
            margin_buying_volume_ratio: Some(0.5),
            credit_volume_ratio: Some(0.9),
            ..Default::default()
        };
        let projected = SnapshotRecord::project(&current);
        assert_eq!(projected.price_deviation_5, Some(1.0));
        assert_eq!(projected.price_deviation_20, Some(2.0));
        assert_eq!(projected.margin_buying_volume_ratio, Some(0.5));
    }

    #[test]
    fn test_camel_case_wire_names() {
        let projected = SnapshotRecord::project(&StockRecord {
            price_deviation_5: Some(1.0),
            ..Default::default()
        });
        let json = serde_json::to_value(&projected).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 42);
        assert_eq!(object["priceDeviation5"], 1.0);
        assert!(object.contains_key("marginBuyingVolumeRatio"));
        assert!(object.contains_key("jsfNetBalance"));
    }

    #[test]
    fn test_capture_and_load() {
        let store = SnapshotStore::in_memory().unwrap();
        assert!(store.load().unwrap().is_none());

        let captured = store.capture(&[record("7203"), record("6758")]).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.records[0].code.as_deref(), Some("7203"));
        assert_eq!(loaded.captured_at, captured.captured_at);
        assert!(store.entry(TIMESTAMP_KEY).unwrap().is_some());
    }

    #[test]
    fn test_capture_overwrites() {
        let store = SnapshotStore::in_memory().unwrap();
        store.capture(&[record("1"), record("2"), record("3")]).unwrap();
        store.capture(&[record("9")]).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.records[0].code.as_deref(), Some("9"));
    }

    #[test]
    fn test_nan_is_stored_as_null() {
        let store = SnapshotStore::in_memory().unwrap();
        let mut odd = record("1");
        odd.per = Some(f64::NAN);
        store.capture(&[odd]).unwrap();

        let raw = store.entry(RESULTS_KEY).unwrap().unwrap();
        assert!(raw.contains("\"per\":null"));
        assert_eq!(store.load().unwrap().unwrap().records[0].per, None);
    }

    #[test]
    fn test_clear() {
        let store = SnapshotStore::in_memory().unwrap();
        store.capture(&[record("1")]).unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }
}
