//! Filter criteria with unit normalization.
//!
//! Raw values are kept exactly as the user typed them. Conversion to backend
//! units happens only when a `FilterSet` is collected for a submission:
//!
//! | Inputs | Entered as | Sent as | Factor |
//! |---|---|---|---|
//! | shares issued | 百万株 | shares | ×1,000,000 |
//! | market cap | 億円 | 百万円 | ×100 |
//! | JSF balances | 百万株 | shares | ×1,000,000 |
//! | everything else | native | native | ×1 |

pub mod criteria;
pub mod model;
pub mod set;

pub use criteria::{CriterionKind, FilterCriterion, UnitConversion};
pub use model::{DateScope, FilterError, FilterModel};
pub use set::{FilterSet, TARGET_DATE_KEY};
