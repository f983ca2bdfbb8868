//! Template scanner.
//!
//! Correlates every template against the captured region and keeps all
//! placements at or above the confidence threshold.

use data::{Finding, Findings, Location};
use imageproc::template_matching::find_extremes;

use crate::correlation::PreparedRegion;
use crate::{Error, Image, Template, TemplateSet};

/// Default minimum correlation score for a finding.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.94;

/// Highest-scoring placement of one template, kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestMatch {
    pub location: Location,
    pub score: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    /// Items with at least one placement above the threshold.
    pub findings: Findings,
    /// Best placement per template in template order; `None` when the
    /// template did not fit inside the region.
    pub best: Vec<(String, Option<BestMatch>)>,
}

impl ScanReport {
    pub fn total(&self) -> usize {
        self.findings.values().map(Vec::len).sum()
    }

    /// Every finding as `(location, item)`, sorted by location.
    pub fn sorted_by_location(&self) -> Vec<(Location, &str)> {
        let mut out = self
            .findings
            .iter()
            .flat_map(|(name, v)| v.iter().map(move |f| (f.location, name.as_str())))
            .collect::<Vec<_>>();
        out.sort();
        out
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Scanner {
    threshold: f32,
}

impl Default for Scanner {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

impl Scanner {
    pub fn new(threshold: f32) -> Result<Self, Error> {
        let mut s = Self::default();
        s.set_threshold(threshold)?;
        Ok(s)
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f32) -> Result<(), Error> {
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(Error::InvalidThreshold(threshold));
        }
        self.threshold = threshold;
        Ok(())
    }

    /// Locate every template of `templates` inside `region`.
    ///
    /// Locations are relative to the region's top-left corner and listed in
    /// raster order. Items without a placement at or above the threshold are
    /// left out of the findings.
    pub fn scan(&self, templates: &TemplateSet, region: Image) -> ScanReport {
        #[cfg(feature = "parallel")]
        let report = {
            use rayon::prelude::*;
            let prepared = PreparedRegion::new(region);
            let results = templates
                .as_slice()
                .par_iter()
                .map(|t| self.scan_one(t, prepared.as_ref()))
                .collect::<Vec<_>>();
            merge(results)
        };
        #[cfg(not(feature = "parallel"))]
        let report = self.scan_sequential(templates, region);

        log::info!(
            "scan: {} instances of {} items (threshold {})",
            report.total(),
            report.findings.len(),
            self.threshold
        );
        report
    }

    #[cfg(any(test, not(feature = "parallel")))]
    fn scan_sequential(&self, templates: &TemplateSet, region: Image) -> ScanReport {
        let prepared = PreparedRegion::new(region);
        let results = templates
            .iter()
            .map(|t| self.scan_one(t, prepared.as_ref()))
            .collect();
        merge(results)
    }

    fn scan_one(&self, template: &Template, region: Option<&PreparedRegion>) -> ItemResult {
        let item = template.item().to_owned();
        let Some(heat) = region.and_then(|r| r.match_template(template.centered())) else {
            log::debug!("{item}: template larger than region");
            return (item, None, Vec::new());
        };

        let extremes = find_extremes(&heat);
        let (x, y) = extremes.max_value_location;
        let best = BestMatch {
            location: Location::new(x, y),
            score: extremes.max_value,
        };
        log::debug!("best match for {item}: x={x}, y={y} = {}", best.score);

        let found = heat
            .enumerate_pixels()
            .filter(|(_, _, v)| v.0[0] >= self.threshold)
            .map(|(x, y, v)| Finding {
                location: Location::new(x, y),
                score: v.0[0],
            })
            .collect();

        (item, Some(best), found)
    }
}

type ItemResult = (String, Option<BestMatch>, Vec<Finding>);

/// Collect per-template results, kept in template order.
fn merge(results: Vec<ItemResult>) -> ScanReport {
    let mut report = ScanReport::default();
    for (item, best, found) in results {
        if !found.is_empty() {
            report.findings.insert(item.clone(), found);
        }
        report.best.push((item, best));
    }
    report
}
