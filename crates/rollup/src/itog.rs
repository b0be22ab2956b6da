//! Itog: the fixed financial breakdown of one estimate.
//!
//! Every quantity is read from the flattened `Summary` block. Quantities that
//! documents spell in more than one way are resolved through an ordered list
//! of accessors; the first one that yields a number wins.

use serde::Serialize;

use crate::model::{Amount, PriceLevel};
use crate::tree::FlatRecord;

/// Reads one quantity from a flat summary at a price level.
pub type Accessor = fn(&FlatRecord, PriceLevel) -> Option<Amount>;

fn materials_total_level(summary: &FlatRecord, level: PriceLevel) -> Option<Amount> {
    summary.amount(&format!("Materials_Total_{}", level.suffix()))
}

fn materials_level_total(summary: &FlatRecord, level: PriceLevel) -> Option<Amount> {
    summary.amount(&format!("Materials_{}_Total", level.suffix()))
}

fn level_materials_total(summary: &FlatRecord, level: PriceLevel) -> Option<Amount> {
    summary.amount(&format!("{}_Materials_Total", level.suffix()))
}

fn materials_total_plain(summary: &FlatRecord, _: PriceLevel) -> Option<Amount> {
    summary.amount("Materials_Total")
}

fn priced_items_sum(summary: &FlatRecord, level: PriceLevel) -> Option<Amount> {
    summary.amount(level.item_sum_key())
}

fn totals_items_level(summary: &FlatRecord, level: PriceLevel) -> Option<Amount> {
    summary.amount(&format!("Totals_Items_{}", level.suffix()))
}

fn totals_items_plain(summary: &FlatRecord, _: PriceLevel) -> Option<Amount> {
    summary.amount("Totals_Items")
}

/// Gross materials cost.
pub const MATERIALS: &[Accessor] = &[
    materials_total_level,
    materials_level_total,
    level_materials_total,
    materials_total_plain,
];

/// Coefficient-adjusted priced materials (КАЦ). The item-level sum comes
/// first so the summary figure is only used when no priced item was found.
pub const PRICED_MATERIALS: &[Accessor] = &[
    priced_items_sum,
    totals_items_level,
    totals_items_plain,
];

/// First accessor that yields a number.
pub fn resolve(summary: &FlatRecord, level: PriceLevel, accessors: &[Accessor]) -> Option<Amount> {
    accessors.iter().find_map(|accessor| accessor(summary, level))
}

/// `{key}_{PriceCurrent|PriceBase}`, zero when absent.
fn level_amount(summary: &FlatRecord, key: &str, level: PriceLevel) -> Amount {
    summary
        .amount(&format!("{key}_{}", level.suffix()))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Category blocks
// ---------------------------------------------------------------------------

/// Flattened EstimatePrice children other than `Summary`, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EstimateBlocks {
    blocks: Vec<(String, FlatRecord)>,
}

impl EstimateBlocks {
    pub fn new(blocks: Vec<(String, FlatRecord)>) -> Self {
        Self { blocks }
    }

    pub fn get(&self, name: &str) -> Option<&FlatRecord> {
        self.blocks.iter().find(|(n, _)| n == name).map(|(_, b)| b)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlatRecord)> {
        self.blocks.iter().map(|(n, b)| (n.as_str(), b))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// `Building`, `Mounting` and `Equipment` keep their figure under
    /// `Total_{level}`; `OtherTotal` and `Total` directly under `{level}`.
    fn category(&self, name: &str, level: PriceLevel) -> Amount {
        let field = match name {
            "OtherTotal" | "Total" => level.suffix().to_string(),
            _ => format!("Total_{}", level.suffix()),
        };
        self.get(name)
            .and_then(|block| block.amount(&field))
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Rollup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FinancialRollup {
    /// Материалы
    pub materials: Amount,
    /// КАЦ
    pub priced_materials: Amount,
    /// СНБ; may be negative.
    pub materials_difference: Amount,
    /// Перевозка
    pub transport: Amount,
    /// ФОТ
    pub payroll: Amount,
    /// ЭММ
    pub machine_net: Amount,
    /// Прямые затраты
    pub direct: Amount,
    /// НР
    pub overhead: Amount,
    /// СР
    pub profit: Amount,
    /// Косвенные затраты
    pub indirect: Amount,
    pub building: Amount,
    pub mounting: Amount,
    pub equipment: Amount,
    pub other: Amount,
    /// Total as stated by the document's own `Total` block.
    pub estimate_total: Amount,
    /// Итого по смете: direct + indirect + equipment.
    pub grand_total: Amount,
}

impl FinancialRollup {
    /// Categories under their report labels, in report order.
    pub fn labelled(&self) -> [(&'static str, Amount); 16] {
        [
            ("Материалы", self.materials),
            ("КАЦ", self.priced_materials),
            ("СНБ", self.materials_difference),
            ("Перевозка", self.transport),
            ("ФОТ", self.payroll),
            ("ЭММ", self.machine_net),
            ("Прямые затраты", self.direct),
            ("НР", self.overhead),
            ("СР", self.profit),
            ("Косвенные затраты", self.indirect),
            ("Строительные работы", self.building),
            ("Монтажные работы", self.mounting),
            ("Оборудование", self.equipment),
            ("Прочие", self.other),
            ("Смета Total", self.estimate_total),
            ("Итого по смете", self.grand_total),
        ]
    }
}

/// Compute the rollup for one price level.
///
/// Missing or unparseable figures count as zero; this never fails.
pub fn compute_rollup(
    summary: &FlatRecord,
    blocks: &EstimateBlocks,
    level: PriceLevel,
) -> FinancialRollup {
    let materials = resolve(summary, level, MATERIALS).unwrap_or_default();
    let priced_materials = resolve(summary, level, PRICED_MATERIALS).unwrap_or_default();
    let materials_difference = materials - priced_materials;

    let transport = level_amount(summary, "Transport", level);
    let payroll =
        level_amount(summary, "Salary", level) - level_amount(summary, "MachinistSalaryExtra", level);
    let machine_net =
        level_amount(summary, "MachinesTotal", level) - level_amount(summary, "MachinistSalary", level);

    let direct = priced_materials + materials_difference + transport + payroll + machine_net;

    let overhead = level_amount(summary, "Overhead", level);
    let profit = level_amount(summary, "Profit", level);
    let indirect = overhead + profit;

    let equipment = blocks.category("Equipment", level);

    FinancialRollup {
        materials,
        priced_materials,
        materials_difference,
        transport,
        payroll,
        machine_net,
        direct,
        overhead,
        profit,
        indirect,
        building: blocks.category("Building", level),
        mounting: blocks.category("Mounting", level),
        equipment,
        other: blocks.category("OtherTotal", level),
        estimate_total: blocks.category("Total", level),
        grand_total: direct + indirect + equipment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount(text: &str) -> Amount {
        Amount::parse(text).unwrap()
    }

    fn worked_summary() -> FlatRecord {
        [
            ("Materials_Total_PriceCurrent", "1200,50"),
            ("Totals_Current_Items", "700.00"),
            ("Transport_PriceCurrent", "50"),
            ("Salary_PriceCurrent", "100"),
            ("MachinesTotal_PriceCurrent", "45"),
            ("MachinistSalary_PriceCurrent", "15"),
            ("Overhead_PriceCurrent", "80"),
            ("Profit_PriceCurrent", "20"),
        ]
        .into_iter()
        .collect()
    }

    fn worked_blocks() -> EstimateBlocks {
        EstimateBlocks::new(vec![
            (
                "Equipment".into(),
                [("Total_PriceCurrent", "200")].into_iter().collect(),
            ),
            (
                "Building".into(),
                [("Total_PriceCurrent", "900,25")].into_iter().collect(),
            ),
            ("Total".into(), [("PriceCurrent", "1680,5")].into_iter().collect()),
        ])
    }

    #[test]
    fn worked_example() {
        let r = compute_rollup(&worked_summary(), &worked_blocks(), PriceLevel::Current);
        assert_eq!(r.materials, amount("1200.50"));
        assert_eq!(r.priced_materials, amount("700"));
        assert_eq!(r.materials_difference, amount("500.50"));
        assert_eq!(r.transport, amount("50"));
        assert_eq!(r.payroll, amount("100"));
        assert_eq!(r.machine_net, amount("30"));
        assert_eq!(r.direct, amount("1380.50"));
        assert_eq!(r.indirect, amount("100"));
        assert_eq!(r.equipment, amount("200"));
        assert_eq!(r.building, amount("900.25"));
        assert_eq!(r.grand_total, amount("1680.50"));
        assert_eq!(r.estimate_total, amount("1680.50"));
        assert_eq!(r.grand_total.to_string(), "1680.50");
    }

    #[test]
    fn materials_fallback_spellings_agree() {
        let spellings = [
            "Materials_Total_PriceCurrent",
            "Materials_PriceCurrent_Total",
            "PriceCurrent_Materials_Total",
            "Materials_Total",
        ];
        let results: Vec<FinancialRollup> = spellings
            .iter()
            .map(|key| {
                let summary: FlatRecord = [(*key, "1200,50"), ("Totals_Items", "700")]
                    .into_iter()
                    .collect();
                compute_rollup(&summary, &EstimateBlocks::default(), PriceLevel::Current)
            })
            .collect();
        for r in &results {
            assert_eq!(r, &results[0]);
            assert_eq!(r.materials, amount("1200.50"));
        }
    }

    #[test]
    fn first_parseable_spelling_wins() {
        let summary: FlatRecord = [
            ("Materials_Total_PriceCurrent", "n/a"),
            ("Materials_PriceCurrent_Total", "10"),
            ("Materials_Total", "99"),
        ]
        .into_iter()
        .collect();
        assert_eq!(resolve(&summary, PriceLevel::Current, MATERIALS), Some(amount("10")));
    }

    #[test]
    fn priced_materials_fall_back_to_summary_totals() {
        let summary: FlatRecord = [("Totals_Items_PriceBase", "40"), ("Totals_Items", "41")]
            .into_iter()
            .collect();
        assert_eq!(
            resolve(&summary, PriceLevel::Base, PRICED_MATERIALS),
            Some(amount("40"))
        );
        assert_eq!(
            resolve(&summary, PriceLevel::Current, PRICED_MATERIALS),
            Some(amount("41"))
        );
    }

    #[test]
    fn negative_difference_is_kept() {
        let summary: FlatRecord = [("Materials_Total", "100"), ("Totals_Current_Items", "250")]
            .into_iter()
            .collect();
        let r = compute_rollup(&summary, &EstimateBlocks::default(), PriceLevel::Current);
        assert_eq!(r.materials_difference, amount("-150"));
        assert_eq!(r.direct, amount("100"));
    }

    #[test]
    fn payroll_minus_extra_machinist_salary() {
        let summary: FlatRecord = [
            ("Salary_PriceBase", "100"),
            ("MachinistSalaryExtra_PriceBase", "12,5"),
        ]
        .into_iter()
        .collect();
        let r = compute_rollup(&summary, &EstimateBlocks::default(), PriceLevel::Base);
        assert_eq!(r.payroll, amount("87.50"));
    }

    #[test]
    fn empty_summary_is_all_zero() {
        let r = compute_rollup(&FlatRecord::new(), &EstimateBlocks::default(), PriceLevel::Current);
        assert_eq!(r, FinancialRollup::default());
    }

    #[test]
    fn price_levels_read_their_own_fields() {
        let summary: FlatRecord = [
            ("Transport_PriceCurrent", "50"),
            ("Transport_PriceBase", "5"),
        ]
        .into_iter()
        .collect();
        let blocks = EstimateBlocks::new(vec![(
            "OtherTotal".into(),
            [("PriceCurrent", "7"), ("PriceBase", "3")].into_iter().collect(),
        )]);
        let current = compute_rollup(&summary, &blocks, PriceLevel::Current);
        let base = compute_rollup(&summary, &blocks, PriceLevel::Base);
        assert_eq!(current.transport, amount("50"));
        assert_eq!(base.transport, amount("5"));
        assert_eq!(current.other, amount("7"));
        assert_eq!(base.other, amount("3"));
    }

    #[test]
    fn labels_in_report_order() {
        let r = compute_rollup(&worked_summary(), &worked_blocks(), PriceLevel::Current);
        let labels: Vec<&str> = r.labelled().iter().map(|(l, _)| *l).collect();
        assert_eq!(labels[0], "Материалы");
        assert_eq!(labels[6], "Прямые затраты");
        assert_eq!(labels[15], "Итого по смете");
        assert_eq!(r.labelled()[15].1, r.grand_total);
    }
}
