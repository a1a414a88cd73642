use tracing::error;

use crate::buffer::BufferMatchOutput;
use crate::error::{AggregationFault, ReconError};
use crate::matcher::ExactMatchOutput;
use crate::model::{InvoiceRecord, MatchClass, MatchedPair, Pairing, Source};

/// The four result sets, by arena index, in deterministic order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Classification {
    pub matched: Vec<Pairing>,
    pub buffer_matched: Vec<Pairing>,
    pub unmatched_company: Vec<usize>,
    pub unmatched_portal: Vec<usize>,
}

/// Merge both matcher outputs and verify every record landed exactly once.
pub fn classify(
    exact: ExactMatchOutput,
    buffer: BufferMatchOutput,
    company: &[InvoiceRecord],
    portal: &[InvoiceRecord],
) -> Result<Classification, ReconError> {
    let mut matched = exact.matched;
    matched.extend(buffer.matched);
    matched.sort_unstable_by_key(|p| (p.company, p.portal));

    let mut buffer_matched = buffer.buffer_matched;
    buffer_matched.sort_unstable_by_key(|p| (p.company, p.portal));

    let mut unmatched_company = exact.company_only;
    unmatched_company.extend(buffer.unmatched_company);
    unmatched_company.sort_unstable();

    let mut unmatched_portal = exact.portal_only;
    unmatched_portal.extend(buffer.unmatched_portal);
    unmatched_portal.sort_unstable();

    let classification = Classification {
        matched,
        buffer_matched,
        unmatched_company,
        unmatched_portal,
    };

    verify(&classification, company, portal).map_err(|fault| {
        error!(%fault, "classification invariant violated");
        ReconError::Aggregation(fault)
    })?;

    Ok(classification)
}

/// Every record must appear in exactly one set.
pub fn verify(
    classification: &Classification,
    company: &[InvoiceRecord],
    portal: &[InvoiceRecord],
) -> Result<(), AggregationFault> {
    let mut company_seen: Vec<Option<MatchClass>> = vec![None; company.len()];
    let mut portal_seen: Vec<Option<MatchClass>> = vec![None; portal.len()];

    for (pairs, class) in [
        (&classification.matched, MatchClass::Matched),
        (&classification.buffer_matched, MatchClass::BufferMatched),
    ] {
        for pair in pairs {
            mark(&mut company_seen, company, Source::Company, pair.company, class)?;
            mark(&mut portal_seen, portal, Source::Portal, pair.portal, class)?;
        }
    }
    for &i in &classification.unmatched_company {
        mark(&mut company_seen, company, Source::Company, i, MatchClass::UnmatchedCompany)?;
    }
    for &i in &classification.unmatched_portal {
        mark(&mut portal_seen, portal, Source::Portal, i, MatchClass::UnmatchedPortal)?;
    }

    for (seen, records, source) in [
        (&company_seen, company, Source::Company),
        (&portal_seen, portal, Source::Portal),
    ] {
        if let Some(i) = seen.iter().position(Option::is_none) {
            return Err(AggregationFault::Unassigned {
                source,
                raw_row_id: records[i].raw_row_id.clone(),
            });
        }
    }

    Ok(())
}

fn mark(
    seen: &mut [Option<MatchClass>],
    records: &[InvoiceRecord],
    source: Source,
    index: usize,
    class: MatchClass,
) -> Result<(), AggregationFault> {
    let slot = seen
        .get_mut(index)
        .ok_or(AggregationFault::UnknownIndex { source, index })?;
    if let Some(first) = *slot {
        return Err(AggregationFault::AssignedTwice {
            source,
            raw_row_id: records[index].raw_row_id.clone(),
            first,
            second: class,
        });
    }
    *slot = Some(class);
    Ok(())
}

/// Resolve index pairs into owned records for output.
pub fn materialize_pairs(
    pairs: &[Pairing],
    company: &[InvoiceRecord],
    portal: &[InvoiceRecord],
) -> Vec<MatchedPair> {
    pairs
        .iter()
        .map(|p| {
            let company = company[p.company].clone();
            MatchedPair {
                class: p.class,
                key: company.key().to_string(),
                company,
                portal: portal[p.portal].clone(),
                discrepancy_paise: p.discrepancy_paise,
            }
        })
        .collect()
}

pub fn materialize_records(indices: &[usize], records: &[InvoiceRecord]) -> Vec<InvoiceRecord> {
    indices.iter().map(|&i| records[i].clone()).collect()
}
