use tracing::{debug, info};

use crate::buffer::{match_buffer, BufferRule};
use crate::classify::{classify, materialize_pairs, materialize_records};
use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::evidence::compute_summary;
use crate::matcher::match_exact;
use crate::model::{ReconInput, ReconMeta, ReconResult, Source};
use crate::normalize::normalize_rows;

/// Run reconciliation per config. Returns classified results + summary.
///
/// Configuration problems abort before any row is read. Rows that cannot be
/// normalized are reported in `skipped`; everything else lands in exactly one
/// of the four result sets.
pub fn run(config: &ReconConfig, input: &ReconInput) -> Result<ReconResult, ReconError> {
    config.validate()?;
    let rule = BufferRule::from_config(config)?;

    let company = normalize_rows(Source::Company, input.rows(Source::Company), config)?;
    let portal = normalize_rows(Source::Portal, input.rows(Source::Portal), config)?;
    info!(
        company_rows = company.rows,
        company_records = company.records.len(),
        portal_rows = portal.rows,
        portal_records = portal.records.len(),
        "normalized inputs"
    );

    let exact = match_exact(&company.records, &portal.records);
    debug!(
        matched = exact.matched.len(),
        deferred_keys = exact.deferred.len(),
        company_only = exact.company_only.len(),
        portal_only = exact.portal_only.len(),
        "exact pass"
    );

    let buffer = match_buffer(&exact.deferred, &company.records, &portal.records, &rule);
    debug!(
        matched = buffer.matched.len(),
        buffer_matched = buffer.buffer_matched.len(),
        "buffer pass"
    );

    let classification = classify(exact, buffer, &company.records, &portal.records)?;
    let summary = compute_summary(&classification, &company, &portal);
    info!(
        matched = summary.matched_pairs,
        buffer_matched = summary.buffer_matched_pairs,
        unmatched_company = summary.company.unmatched.count,
        unmatched_portal = summary.portal.unmatched.count,
        match_rate = summary.match_rate,
        "reconciliation complete"
    );

    let mut skipped = company.skipped;
    skipped.extend(portal.skipped);

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            tolerance: config.tolerance.clone(),
            require_same_date: config.buffer.require_same_date,
        },
        summary,
        matched: materialize_pairs(&classification.matched, &company.records, &portal.records),
        buffer_matched: materialize_pairs(
            &classification.buffer_matched,
            &company.records,
            &portal.records,
        ),
        unmatched_company: materialize_records(&classification.unmatched_company, &company.records),
        unmatched_portal: materialize_records(&classification.unmatched_portal, &portal.records),
        skipped,
    })
}
