use std::collections::BTreeMap;

use crate::model::{Amount, DetailRow, DetailedRow, GroupedRow, RowIdentity, UnitMetric};

/// Group detail rows by (identity, NLSR group) and sum their totals.
///
/// Totals are integer minor units and groups are keyed in a `BTreeMap`, so
/// both the sums and the output order are independent of input order.
pub fn group_rows(rows: &[DetailRow]) -> Vec<GroupedRow> {
    let mut groups: BTreeMap<(&RowIdentity, &str), (Amount, usize)> = BTreeMap::new();

    for row in rows {
        let entry = groups
            .entry((&row.identity, row.group.as_str()))
            .or_insert((Amount::ZERO, 0));
        entry.0 += row.total;
        entry.1 += 1;
    }

    groups
        .into_iter()
        .map(|((identity, group), (total, count))| GroupedRow {
            identity: identity.clone(),
            group: group.to_string(),
            total,
            record_count: count,
            unit: UnitMetric::Blank,
        })
        .collect()
}

/// Narrow copy of the detail rows, input order preserved.
pub fn project_rows(rows: &[DetailRow]) -> Vec<DetailedRow> {
    rows.iter()
        .map(|row| DetailedRow {
            identity: row.identity.clone(),
            total: row.total,
            unit: UnitMetric::Blank,
        })
        .collect()
}
