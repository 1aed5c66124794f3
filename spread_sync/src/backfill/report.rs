use std::{collections::BTreeMap, fmt};

use chrono::NaiveDate;

use crate::{
    backfill::plan::FetchSpan,
    store::{Gap, GapKind},
};

/// What a backfill did (or, in dry-run mode, would do) for one commodity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackfillReport {
    /// Commodity root.
    pub commodity: String,
    /// Requested range.
    pub range: Option<(NaiveDate, NaiveDate)>,
    /// Nothing was fetched or written.
    pub dry_run: bool,
    /// (spread, date) pairs already complete.
    pub already_complete: usize,
    /// Raw price requests.
    pub fetches: Vec<FetchSpan>,
    /// Spread label -> dates to compute.
    pub planned_compute: BTreeMap<String, usize>,
    /// Spread label -> dates where only the rate-adjusted value is retried.
    pub planned_rate: BTreeMap<String, usize>,
    /// New raw prices merged into the store.
    pub new_prices: usize,
    /// New raw volumes merged into the store.
    pub new_volumes: usize,
    /// Curve dates added or completed.
    pub curve_updates: usize,
    /// Spread label -> values appended across all variants.
    pub written: BTreeMap<String, usize>,
    /// Per-date failures of this run.
    pub gaps: Vec<Gap>,
}

impl BackfillReport {
    /// True when the run had nothing to do.
    pub fn is_noop(&self) -> bool {
        self.fetches.is_empty() && self.planned_compute.is_empty() && self.planned_rate.is_empty()
    }

    /// Total values appended.
    pub fn values_written(&self) -> usize {
        self.written.values().sum()
    }
}

impl fmt::Display for BackfillReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.commodity)?;
        if let Some((start, end)) = self.range {
            write!(f, " {start}..{end}")?;
        }
        if self.dry_run {
            write!(f, " (dry run)")?;
        }
        writeln!(f)?;

        let mut wrote_any = false;
        let mut section = |title: &str,
                           body: &mut dyn FnMut(&mut fmt::Formatter<'_>) -> fmt::Result|
         -> fmt::Result {
            if wrote_any {
                writeln!(f)?;
            }
            writeln!(f, "{title}")?;
            for _ in 0..title.len() {
                write!(f, "-")?;
            }
            writeln!(f)?;
            body(f)?;
            wrote_any = true;
            Ok(())
        };

        if !self.fetches.is_empty() {
            section("Fetch", &mut |f| {
                for span in &self.fetches {
                    let codes: Vec<String> = span.contracts.iter().map(|c| c.to_string()).collect();
                    writeln!(f, "+ {}  {}..{}", codes.join(", "), span.start, span.end)?;
                }
                Ok(())
            })?;
        }
        if !self.planned_compute.is_empty() {
            section("Compute", &mut |f| {
                for (label, n) in &self.planned_compute {
                    writeln!(f, "+ {label}  {n} dates")?;
                }
                Ok(())
            })?;
        }
        if !self.planned_rate.is_empty() {
            section("Rate retry", &mut |f| {
                for (label, n) in &self.planned_rate {
                    writeln!(f, "~ {label}  {n} dates")?;
                }
                Ok(())
            })?;
        }
        if !self.written.is_empty() {
            section("Written", &mut |f| {
                for (label, n) in &self.written {
                    writeln!(f, "+ {label}  {n} values")?;
                }
                if self.new_prices > 0 {
                    writeln!(f, "+ raw prices  {}", self.new_prices)?;
                }
                if self.new_volumes > 0 {
                    writeln!(f, "+ raw volumes  {}", self.new_volumes)?;
                }
                if self.curve_updates > 0 {
                    writeln!(f, "+ curve  {} dates", self.curve_updates)?;
                }
                Ok(())
            })?;
        }
        if !self.gaps.is_empty() {
            section("Gaps", &mut |f| {
                for g in &self.gaps {
                    let kind = match g.kind {
                        GapKind::NoData => "no data",
                        GapKind::MissingRate => "missing rate",
                    };
                    writeln!(f, "! {} {}  {kind}: {}", g.label, g.date, g.detail)?;
                }
                Ok(())
            })?;
        }

        if !wrote_any {
            write!(f, "No changes")
        } else {
            Ok(())
        }
    }
}
