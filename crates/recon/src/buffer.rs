use crate::config::{ReconConfig, ToleranceConfig, ToleranceMode};
use crate::error::ReconError;
use crate::matcher::{DeferredGroup, EXACT_EPSILON_PAISE};
use crate::model::{InvoiceRecord, MatchClass, Pairing};

/// Tolerance in integer form. Exactly one mode is active per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tolerance {
    Absolute { paise: i64 },
    /// Fraction of the larger total, in parts per million (1% = 10_000).
    Percentage { ppm: i64 },
}

impl Tolerance {
    pub fn from_config(config: &ToleranceConfig) -> Result<Self, ReconError> {
        config.validate()?;
        Ok(match config.mode {
            ToleranceMode::Absolute => Self::Absolute {
                paise: (config.value * 100.0).round() as i64,
            },
            ToleranceMode::Percentage => Self::Percentage {
                ppm: (config.value * 10_000.0).round() as i64,
            },
        })
    }

    /// Whether two totals differ by no more than the tolerance.
    pub fn accepts(&self, company_paise: i64, portal_paise: i64) -> bool {
        let delta = (i128::from(company_paise) - i128::from(portal_paise)).abs();
        match *self {
            Self::Absolute { paise } => delta <= i128::from(paise),
            Self::Percentage { ppm } => {
                let larger = i128::from(company_paise.max(portal_paise)).max(0);
                delta * 1_000_000 <= larger * i128::from(ppm)
            }
        }
    }
}

/// Acceptance rule for the buffer pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferRule {
    pub tolerance: Tolerance,
    pub require_same_date: bool,
}

impl BufferRule {
    pub fn from_config(config: &ReconConfig) -> Result<Self, ReconError> {
        Ok(Self {
            tolerance: Tolerance::from_config(&config.tolerance)?,
            require_same_date: config.buffer.require_same_date,
        })
    }

    pub fn accepts(&self, company: &InvoiceRecord, portal: &InvoiceRecord) -> bool {
        if self.require_same_date {
            if let (Some(c), Some(p)) = (company.invoice_date, portal.invoice_date) {
                if c != p {
                    return false;
                }
            }
        }
        let delta = portal.total_tax_paise - company.total_tax_paise;
        delta.abs() <= EXACT_EPSILON_PAISE
            || self.tolerance.accepts(company.total_tax_paise, portal.total_tax_paise)
    }
}

#[derive(Debug, Default)]
pub struct BufferMatchOutput {
    /// Re-paired records that turned out to agree exactly.
    pub matched: Vec<Pairing>,
    pub buffer_matched: Vec<Pairing>,
    pub unmatched_company: Vec<usize>,
    pub unmatched_portal: Vec<usize>,
}

/// Resolve the deferred records of each identity key within tolerance.
///
/// Greedy, not optimal: company records are taken in input order and each
/// claims the earliest unconsumed portal record of its key that the rule
/// accepts. Nothing is matched across keys.
pub fn match_buffer(
    groups: &[DeferredGroup],
    company: &[InvoiceRecord],
    portal: &[InvoiceRecord],
    rule: &BufferRule,
) -> BufferMatchOutput {
    let mut out = BufferMatchOutput::default();

    for group in groups {
        let mut portal_used = vec![false; group.portal.len()];

        for &c in &group.company {
            let candidate = group
                .portal
                .iter()
                .enumerate()
                .find(|&(slot, &p)| !portal_used[slot] && rule.accepts(&company[c], &portal[p]));

            match candidate {
                Some((slot, &p)) => {
                    portal_used[slot] = true;
                    let discrepancy_paise = portal[p].total_tax_paise - company[c].total_tax_paise;
                    let class = if discrepancy_paise.abs() <= EXACT_EPSILON_PAISE {
                        MatchClass::Matched
                    } else {
                        MatchClass::BufferMatched
                    };
                    let pairing = Pairing {
                        company: c,
                        portal: p,
                        class,
                        discrepancy_paise,
                    };
                    match class {
                        MatchClass::Matched => out.matched.push(pairing),
                        _ => out.buffer_matched.push(pairing),
                    }
                }
                None => out.unmatched_company.push(c),
            }
        }

        out.unmatched_portal.extend(
            group
                .portal
                .iter()
                .zip(&portal_used)
                .filter(|(_, used)| !**used)
                .map(|(&p, _)| p),
        );
    }

    out
}
