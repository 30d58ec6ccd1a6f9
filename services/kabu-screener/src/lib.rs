//! Kabu Screener Library
//!
//! Client-side screening console for Japanese equities. It gathers filter
//! criteria, runs them against the screening service, and sorts, renders and
//! snapshots the returned rows for the analysis view.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        ScreeningSession                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌─────────────────┐    ┌───────────────┐    │
//! │  │ FilterModel  │───▶│ ScreeningClient │───▶│  result set   │    │
//! │  │ (unit conv.) │    │ GET /api/enh... │    └──────┬────────┘    │
//! │  └──────────────┘    └─────────────────┘           │             │
//! │                 ┌─────────────────┬────────────────┤             │
//! │                 ▼                 ▼                ▼             │
//! │          ┌────────────┐   ┌────────────────┐  ┌──────────────┐   │
//! │          │ SortEngine │   │ResultProjector │  │SnapshotStore │   │
//! │          └────────────┘   └────────────────┘  └──────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Units
//!
//! Share counts and JSF balances are entered in millions of shares, market
//! cap in 億円. The backend expects shares and 百万円, so the filter model
//! scales on the way out and the projector scales market cap back for
//! display.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod client;
pub mod filter;
pub mod navigation;
pub mod record;
pub mod render;
pub mod session;
pub mod snapshot;
pub mod sort;

pub use client::{HttpScreeningClient, ScreeningClient, ScreeningError, ScreeningResponse};
pub use filter::{DateScope, FilterError, FilterModel, FilterSet};
pub use navigation::Navigator;
pub use record::{StockField, StockRecord};
pub use render::{RenderedTable, ResultProjector, TableRow};
pub use session::{QueryStatus, ScreeningSession, SubmitState};
pub use snapshot::{Snapshot, SnapshotRecord, SnapshotStore};
pub use sort::{SortDirection, SortEngine, SortState};
