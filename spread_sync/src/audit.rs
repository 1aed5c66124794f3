//! Coverage and integrity report over the raw price store.
//!
//! For one commodity: what every stored contract covers, which contracts were
//! quoted on the latest stored date, and what looks wrong. Nothing is fetched
//! or written.

use std::fmt;

use chrono::NaiveDate;
use futures_ingestor::{io::price_store::PriceStore, models::contract::ContractCode};
use tracing::{info, warn};

use crate::error::SpreadError;

/// Share of zero prices above which the store is flagged.
pub const MAX_ZERO_SHARE: f64 = 0.01;

/// What one stored contract covers.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractCoverage {
    /// Contract code.
    pub contract: ContractCode,
    /// First and last priced date.
    pub span: Option<(NaiveDate, NaiveDate)>,
    /// Priced dates.
    pub prices: usize,
    /// Dates with a volume.
    pub volumes: usize,
}

/// Something wrong with the stored data.
#[derive(Debug, Clone, PartialEq)]
pub enum Issue {
    /// No contract has a stored price.
    NoData,
    /// Volumes stored for dates without a price.
    VolumesWithoutPrices {
        /// Contract code.
        contract: ContractCode,
        /// Affected dates.
        dates: usize,
    },
    /// Too many prices are exactly zero.
    ZeroPrices {
        /// Zero prices.
        zeros: usize,
        /// All prices.
        total: usize,
    },
}

impl Issue {
    /// Whether the issue fails the integrity check. Zero prices only warn.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Issue::ZeroPrices { .. })
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::NoData => write!(f, "no stored prices"),
            Issue::VolumesWithoutPrices { contract, dates } => {
                write!(f, "{contract}: {dates} volume dates have no price")
            }
            Issue::ZeroPrices { zeros, total } => {
                let share = *zeros as f64 / *total as f64 * 100.0;
                write!(f, "{zeros} of {total} prices are zero ({share:.2}%)")
            }
        }
    }
}

/// Coverage and integrity of one commodity's raw prices.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditReport {
    /// Commodity root.
    pub commodity: String,
    /// Stored contracts in contract order.
    pub contracts: Vec<ContractCoverage>,
    /// Latest stored date and the contracts priced on it.
    pub latest: Option<(NaiveDate, Vec<(ContractCode, f64)>)>,
    /// Problems found.
    pub issues: Vec<Issue>,
}

impl AuditReport {
    /// No fatal issue was found.
    pub fn passed(&self) -> bool {
        !self.issues.iter().any(Issue::is_fatal)
    }
}

/// Reads every stored contract of `root` and checks it.
pub fn audit_commodity(store: &PriceStore, root: &str) -> Result<AuditReport, SpreadError> {
    let mut series = Vec::new();
    for code in store.contracts(root)? {
        let s = store.load(&code)?;
        series.push((code, s));
    }

    let mut issues = Vec::new();
    let mut contracts = Vec::with_capacity(series.len());
    let (mut zeros, mut total) = (0, 0);
    for (code, s) in &series {
        let orphans = s.volumes().filter(|(d, _)| !s.contains(*d)).count();
        if orphans > 0 {
            issues.push(Issue::VolumesWithoutPrices {
                contract: code.clone(),
                dates: orphans,
            });
        }
        zeros += s.points().filter(|p| p.price == 0.0).count();
        total += s.len();
        contracts.push(ContractCoverage {
            contract: code.clone(),
            span: s.first_date().zip(s.last_date()),
            prices: s.len(),
            volumes: s.volume_len(),
        });
    }

    if total == 0 {
        issues.insert(0, Issue::NoData);
    } else if zeros as f64 / total as f64 > MAX_ZERO_SHARE {
        issues.push(Issue::ZeroPrices { zeros, total });
    }

    let latest = series.iter().filter_map(|(_, s)| s.last_date()).max().map(|date| {
        let active = series
            .iter()
            .filter_map(|(code, s)| s.get(date).map(|p| (code.clone(), p)))
            .collect();
        (date, active)
    });

    for issue in &issues {
        warn!(commodity = root, %issue, "integrity issue");
    }
    info!(
        commodity = root,
        contracts = contracts.len(),
        prices = total,
        issues = issues.len(),
        "audit finished"
    );
    Ok(AuditReport {
        commodity: root.to_string(),
        contracts,
        latest,
        issues,
    })
}

fn underline(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f, "{title}")?;
    writeln!(f, "{}", "-".repeat(title.len()))
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.commodity)?;
        writeln!(f)?;
        underline(f, "Coverage")?;
        if self.contracts.is_empty() {
            writeln!(f, "(none stored)")?;
        }
        for c in &self.contracts {
            match c.span {
                Some((first, last)) => write!(f, "{:<8} {first}..{last}", c.contract.to_string())?,
                None => write!(f, "{:<8} {:<22}", c.contract.to_string(), "-")?,
            }
            writeln!(f, "  {} prices, {} volumes", c.prices, c.volumes)?;
        }

        if let Some((date, active)) = &self.latest {
            writeln!(f)?;
            underline(f, &format!("Active on {date}"))?;
            for (code, price) in active {
                writeln!(f, "{:<12} {price:>10.2}", code.to_string())?;
            }
        }

        writeln!(f)?;
        underline(f, "Integrity")?;
        for issue in &self.issues {
            let mark = if issue.is_fatal() { '!' } else { '~' };
            writeln!(f, "{mark} {issue}")?;
        }
        write!(f, "{}", if self.passed() { "ok" } else { "failed" })
    }
}

#[cfg(test)]
mod tests {
    use futures_ingestor::{io::sink::PriceSink, models::price_series::PriceSeries};

    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, day).unwrap()
    }

    fn series(code: &str, prices: &[(u32, f64)]) -> PriceSeries {
        let mut s = PriceSeries::new(code);
        for (day, p) in prices {
            s.append(d(*day), *p);
        }
        s
    }

    #[test]
    fn empty_store_fails() {
        let dir = tempfile::tempdir().unwrap();
        let report = audit_commodity(&PriceStore::new(dir.path()), "CL").unwrap();
        assert_eq!(report.issues, vec![Issue::NoData]);
        assert!(!report.passed());
        assert!(report.latest.is_none());
        assert!(report.to_string().ends_with("! no stored prices\nfailed"));
    }

    #[test]
    fn coverage_and_latest_quotes() {
        let dir = tempfile::tempdir().unwrap();
        let store = PriceStore::new(dir.path());
        let mut g = series("CLG23", &[(3, 80.0), (4, 80.5)]);
        g.append_volume(d(3), 1000.0);
        let h = series("CLH23", &[(3, 81.0), (4, 81.25), (5, 81.5)]);
        let j = series("CLJ23", &[(4, 82.0), (5, 82.5)]);
        store.write(&[g, h, j]).unwrap();

        let report = audit_commodity(&store, "CL").unwrap();
        assert!(report.passed());
        assert!(report.issues.is_empty());
        assert_eq!(report.contracts.len(), 3);
        assert_eq!(report.contracts[0].span, Some((d(3), d(4))));
        assert_eq!((report.contracts[0].prices, report.contracts[0].volumes), (2, 1));

        let (date, active) = report.latest.clone().unwrap();
        assert_eq!(date, d(5));
        assert_eq!(
            active,
            vec![("CLH23".parse().unwrap(), 81.5), ("CLJ23".parse().unwrap(), 82.5)]
        );

        let text = report.to_string();
        assert!(text.contains("Coverage\n--------\nCLG23    2023-01-03..2023-01-04  2 prices, 1 volumes\n"));
        assert!(text.contains("Active on 2023-01-05\n--------------------\nCLH23             81.50\n"));
        assert!(text.ends_with("Integrity\n---------\nok"));
    }

    #[test]
    fn orphan_volumes_fail_and_zero_prices_warn() {
        let dir = tempfile::tempdir().unwrap();
        let store = PriceStore::new(dir.path());
        let mut g = series("CLG23", &[(3, 0.0), (4, 80.5), (5, 80.0)]);
        g.append_volume(d(6), 10.0);
        store.write(&[g]).unwrap();

        let report = audit_commodity(&store, "CL").unwrap();
        assert_eq!(
            report.issues,
            vec![
                Issue::VolumesWithoutPrices {
                    contract: "CLG23".parse().unwrap(),
                    dates: 1,
                },
                Issue::ZeroPrices { zeros: 1, total: 3 },
            ]
        );
        assert!(!report.passed());
        assert!(report.to_string().contains("~ 1 of 3 prices are zero (33.33%)\n"));
    }
}
