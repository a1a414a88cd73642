use std::collections::BTreeMap;

use crate::model::{IdentityKey, InvoiceRecord, MatchClass, Pairing};

/// Totals within one paisa count as equal.
pub const EXACT_EPSILON_PAISE: i64 = 1;

/// Records of one identity key left for the buffer pass, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredGroup {
    pub key: IdentityKey,
    pub company: Vec<usize>,
    pub portal: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct ExactMatchOutput {
    pub matched: Vec<Pairing>,
    pub deferred: Vec<DeferredGroup>,
    /// Company records whose key never appears on the portal side.
    pub company_only: Vec<usize>,
    /// Portal records whose key never appears on the company side.
    pub portal_only: Vec<usize>,
}

/// Identity key -> arena indices, each list in input order.
pub fn group_by_key(records: &[InvoiceRecord]) -> BTreeMap<IdentityKey, Vec<usize>> {
    let mut groups: BTreeMap<IdentityKey, Vec<usize>> = BTreeMap::new();
    for (i, record) in records.iter().enumerate() {
        groups.entry(record.key()).or_default().push(i);
    }
    groups
}

/// Pair records sharing an identity key, i-th company with i-th portal.
///
/// Pairs agreeing within `EXACT_EPSILON_PAISE` are `Matched`. Pairs that
/// disagree, and the surplus on the longer side of a duplicated key, are
/// deferred to the buffer pass instead of being paired arbitrarily.
pub fn match_exact(company: &[InvoiceRecord], portal: &[InvoiceRecord]) -> ExactMatchOutput {
    let company_map = group_by_key(company);
    let portal_map = group_by_key(portal);

    let mut out = ExactMatchOutput::default();

    for (key, company_idx) in &company_map {
        let Some(portal_idx) = portal_map.get(key) else {
            out.company_only.extend(company_idx);
            continue;
        };

        let mut group = DeferredGroup {
            key: key.clone(),
            company: Vec::new(),
            portal: Vec::new(),
        };

        for (&c, &p) in company_idx.iter().zip(portal_idx) {
            let discrepancy_paise = portal[p].total_tax_paise - company[c].total_tax_paise;
            if discrepancy_paise.abs() <= EXACT_EPSILON_PAISE {
                out.matched.push(Pairing {
                    company: c,
                    portal: p,
                    class: MatchClass::Matched,
                    discrepancy_paise,
                });
            } else {
                group.company.push(c);
                group.portal.push(p);
            }
        }

        let paired = company_idx.len().min(portal_idx.len());
        group.company.extend(&company_idx[paired..]);
        group.portal.extend(&portal_idx[paired..]);

        if !group.company.is_empty() || !group.portal.is_empty() {
            out.deferred.push(group);
        }
    }

    for (key, portal_idx) in &portal_map {
        if !company_map.contains_key(key) {
            out.portal_only.extend(portal_idx);
        }
    }

    out.company_only.sort_unstable();
    out.portal_only.sort_unstable();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Source;

    fn rec(source: Source, id: &str, gstin: &str, invoice: &str, total: i64) -> InvoiceRecord {
        InvoiceRecord {
            source,
            raw_row_id: id.into(),
            gstin: gstin.into(),
            invoice_number: invoice.into(),
            invoice_number_raw: invoice.into(),
            invoice_date: None,
            central_tax_paise: total,
            state_tax_paise: 0,
            integrated_tax_paise: 0,
            total_tax_paise: total,
            party_name: None,
            accounting_doc: None,
            flags: Vec::new(),
        }
    }

    #[test]
    fn exact_key_match() {
        let company = vec![
            rec(Source::Company, "c1", "G1", "INV1", 118000),
            rec(Source::Company, "c2", "G1", "INV2", 5000),
        ];
        let portal = vec![
            rec(Source::Portal, "p1", "G1", "INV1", 118000),
            rec(Source::Portal, "p2", "G1", "INV3", 3000),
        ];
        let out = match_exact(&company, &portal);
        assert_eq!(out.matched.len(), 1);
        assert_eq!((out.matched[0].company, out.matched[0].portal), (0, 0));
        assert_eq!(out.matched[0].discrepancy_paise, 0);
        assert_eq!(out.company_only, vec![1]);
        assert_eq!(out.portal_only, vec![1]);
        assert!(out.deferred.is_empty());
    }

    #[test]
    fn one_paisa_is_still_exact() {
        let company = vec![rec(Source::Company, "c1", "G1", "INV1", 10000)];
        let portal = vec![rec(Source::Portal, "p1", "G1", "INV1", 10001)];
        let out = match_exact(&company, &portal);
        assert_eq!(out.matched.len(), 1);
        assert_eq!(out.matched[0].discrepancy_paise, 1);
    }

    #[test]
    fn amount_disagreement_is_deferred() {
        let company = vec![rec(Source::Company, "c1", "G1", "INV1", 118000)];
        let portal = vec![rec(Source::Portal, "p1", "G1", "INV1", 117500)];
        let out = match_exact(&company, &portal);
        assert!(out.matched.is_empty());
        assert_eq!(out.deferred.len(), 1);
        assert_eq!(out.deferred[0].company, vec![0]);
        assert_eq!(out.deferred[0].portal, vec![0]);
    }

    #[test]
    fn duplicate_surplus_is_deferred_in_input_order() {
        let company = vec![
            rec(Source::Company, "c1", "G1", "INV1", 100),
            rec(Source::Company, "c2", "G9", "INV9", 100),
            rec(Source::Company, "c3", "G1", "INV1", 100),
        ];
        let portal = vec![rec(Source::Portal, "p1", "G1", "INV1", 100)];
        let out = match_exact(&company, &portal);
        assert_eq!(out.matched.len(), 1);
        assert_eq!(out.matched[0].company, 0);
        assert_eq!(out.deferred[0].company, vec![2]);
        assert!(out.deferred[0].portal.is_empty());
        assert_eq!(out.company_only, vec![1]);
    }

    #[test]
    fn grouping_keeps_input_order() {
        let records = vec![
            rec(Source::Portal, "p1", "G2", "A", 1),
            rec(Source::Portal, "p2", "G1", "A", 1),
            rec(Source::Portal, "p3", "G2", "A", 1),
        ];
        let groups = group_by_key(&records);
        assert_eq!(groups.len(), 2);
        let key = records[0].key();
        assert_eq!(groups[&key], vec![0, 2]);
    }
}
