//! Links from the result table to the chart and analysis views.

use url::Url;

use crate::client::{parse_base_url, ScreeningError};

/// Builds view URLs against the screening service base.
#[derive(Debug, Clone)]
pub struct Navigator {
    base: Url,
}

impl Navigator {
    /// The base must be a hierarchical URL such as `http://host:port/prefix`.
    pub fn new(base_url: &str) -> Result<Self, ScreeningError> {
        let base = parse_base_url(base_url)?;
        if base.cannot_be_a_base() {
            return Err(ScreeningError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn with_segments(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Chart view for one security: `{base}/chart/{code}`.
    pub fn chart_url(&self, code: &str) -> Url {
        self.with_segments(&["chart", code])
    }

    /// Analysis view that reads the captured snapshot: `{base}/ai-analysis`.
    pub fn analysis_url(&self) -> Url {
        self.with_segments(&["ai-analysis"])
    }
}
