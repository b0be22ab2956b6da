//! Unit economics: TEP coefficients keyed by object identity, and the
//! per-unit metric (`Kvadrat`) derived from a total.

use std::collections::HashMap;

use crate::model::{Amount, DetailedRow, GroupedRow, RowIdentity, UnitMetric};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TepKey {
    object_type: String,
    name: String,
    /// `None` for the base key, `Some` for the Name2-qualified key.
    name2: Option<String>,
    num1: String,
    num2: String,
}

/// Coefficient table. Read-only once loaded.
#[derive(Debug, Clone, Default)]
pub struct TepTable {
    entries: HashMap<TepKey, f64>,
}

impl TepTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one table row. A non-empty `name2` registers the qualified key,
    /// otherwise the base key. A later row for the same key replaces an
    /// earlier one.
    pub fn insert(
        &mut self,
        object_type: &str,
        name: &str,
        name2: &str,
        num1: &str,
        num2: &str,
        tep: f64,
    ) {
        let name2 = name2.trim();
        let key = TepKey {
            object_type: object_type.trim().to_string(),
            name: name.trim().to_string(),
            name2: (!name2.is_empty()).then(|| name2.to_string()),
            num1: num1.trim().to_string(),
            num2: num2.trim().to_string(),
        };
        self.entries.insert(key, tep);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Qualified `(Type, Name, Name2, Num1, Num2)` first, then
    /// `(Type, Name, Num1, Num2)`.
    pub fn lookup(&self, identity: &RowIdentity) -> Option<f64> {
        let mut key = TepKey {
            object_type: identity.object_type.trim().to_string(),
            name: identity.name.trim().to_string(),
            name2: None,
            num1: identity.num1.trim().to_string(),
            num2: identity.num2.trim().to_string(),
        };

        let name2 = identity.name2.trim();
        if !name2.is_empty() {
            key.name2 = Some(name2.to_string());
            if let Some(&tep) = self.entries.get(&key) {
                return Some(tep);
            }
            key.name2 = None;
        }
        self.entries.get(&key).copied()
    }
}

/// `total / tep`, or blank when the coefficient is absent or exactly zero.
/// The zero check is what keeps the division safe.
pub fn unit_metric(total: Amount, tep: Option<f64>) -> UnitMetric {
    match tep {
        Some(tep) if tep != 0.0 && tep.is_finite() => UnitMetric::Computed {
            tep,
            metric: total.to_f64() / tep,
        },
        _ => UnitMetric::Blank,
    }
}

/// Rows the unit metric can be attached to.
pub trait UnitEconomics {
    fn identity(&self) -> &RowIdentity;
    fn total(&self) -> Amount;
    fn set_unit(&mut self, unit: UnitMetric);
}

impl UnitEconomics for GroupedRow {
    fn identity(&self) -> &RowIdentity {
        &self.identity
    }
    fn total(&self) -> Amount {
        self.total
    }
    fn set_unit(&mut self, unit: UnitMetric) {
        self.unit = unit;
    }
}

impl UnitEconomics for DetailedRow {
    fn identity(&self) -> &RowIdentity {
        &self.identity
    }
    fn total(&self) -> Amount {
        self.total
    }
    fn set_unit(&mut self, unit: UnitMetric) {
        self.unit = unit;
    }
}

/// Attach TEP and metric to every row.
pub fn apply_unit_metrics<R: UnitEconomics>(rows: &mut [R], table: &TepTable) {
    for row in rows {
        let tep = table.lookup(row.identity());
        let unit = unit_metric(row.total(), tep);
        row.set_unit(unit);
    }
}
