use crate::classify::Classification;
use crate::model::{ClassShare, ReconSummary, SourceSummary};
use crate::normalize::NormalizedSource;

/// Compute summary statistics from the verified classification.
pub fn compute_summary(
    classification: &Classification,
    company: &NormalizedSource,
    portal: &NormalizedSource,
) -> ReconSummary {
    let matched = classification.matched.len();
    let buffer_matched = classification.buffer_matched.len();

    let company_summary = source_summary(
        company,
        matched,
        buffer_matched,
        classification.unmatched_company.len(),
    );
    let portal_summary = source_summary(
        portal,
        matched,
        buffer_matched,
        classification.unmatched_portal.len(),
    );

    let buffer_discrepancy_paise: i64 = classification
        .buffer_matched
        .iter()
        .map(|p| p.discrepancy_paise)
        .sum();
    let buffer_discrepancy_abs_paise: i64 = classification
        .buffer_matched
        .iter()
        .map(|p| p.discrepancy_paise.abs())
        .sum();
    let matched_discrepancy_abs_paise: i64 = classification
        .matched
        .iter()
        .map(|p| p.discrepancy_paise.abs())
        .sum();

    let flagged_records = company
        .records
        .iter()
        .chain(&portal.records)
        .filter(|r| !r.flags.is_empty())
        .count();

    ReconSummary {
        match_rate: percent(matched + buffer_matched, company.records.len()),
        company: company_summary,
        portal: portal_summary,
        matched_pairs: matched,
        buffer_matched_pairs: buffer_matched,
        buffer_discrepancy_paise,
        buffer_discrepancy_abs_paise,
        matched_discrepancy_abs_paise,
        flagged_records,
    }
}

fn source_summary(
    normalized: &NormalizedSource,
    matched: usize,
    buffer_matched: usize,
    unmatched: usize,
) -> SourceSummary {
    let records = normalized.records.len();
    let share = |count| ClassShare {
        count,
        percent: percent(count, records),
    };
    SourceSummary {
        rows: normalized.rows,
        skipped: normalized.skipped.len(),
        records,
        matched: share(matched),
        buffer_matched: share(buffer_matched),
        unmatched: share(unmatched),
    }
}

/// Percentage rounded to two decimals; zero when there is nothing to count.
fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 * 10_000.0 / total as f64).round() / 100.0
}
