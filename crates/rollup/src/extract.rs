//! Per-document extraction: header, summary, blocks, priced items, both
//! rollups and the local-estimate line the corpus report is built from.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::DocumentError;
use crate::items::{select_priced_items, sum_items, CostItem, PRICE_TAG_PREFIX};
use crate::itog::{compute_rollup, EstimateBlocks, FinancialRollup};
use crate::model::{DetailRow, PriceLevel, RowIdentity};
use crate::tree::{find, flatten, qualified_entries, FlatRecord, Node};

/// `ЛС-02-01-01`, `ЛСР 02-01-03`, `лср-12-34-` → ("02","01"), ("12","34").
static ESTIMATE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)ЛС(?:Р)?[\s-]*(\d{2})-(\d{2})-").expect("static pattern")
});

/// Where a document came from, as seen by the corpus walker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSource {
    /// File name without directories, e.g. `ЛС-02-01-01.gge`.
    pub file_name: String,
    /// First folder below the corpus root; empty for files at the root.
    pub object_type: String,
}

impl DocumentSource {
    pub fn new(file_name: impl Into<String>, object_type: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            object_type: object_type.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Material-code prefix of priced items.
    pub item_prefix: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            item_prefix: PRICE_TAG_PREFIX.to_string(),
        }
    }
}

/// Year / month / quarter of one price level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriceLevelInfo {
    pub year: Option<u32>,
    pub month: Option<u32>,
    pub quarter: Option<u32>,
}

impl PriceLevelInfo {
    /// Quarter comes from `Month` when given, otherwise from `Quarter`.
    fn from_node(node: &Node) -> Self {
        let year = parse_u32(node.text_at(&["Year"]));
        let month = parse_u32(node.text_at(&["Month"])).filter(|m| (1..=12).contains(m));
        let quarter = match month {
            Some(m) => Some(quarter_of(m)),
            None => parse_u32(node.text_at(&["Quarter"])),
        };
        Self { year, month, quarter }
    }
}

pub fn quarter_of(month: u32) -> u32 {
    (month - 1) / 3 + 1
}

fn parse_u32(text: &str) -> Option<u32> {
    text.trim().parse().ok()
}

fn opt_text(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentHeader {
    pub file_num: String,
    pub file_name: String,
    pub object_num: String,
    pub object_name: String,
    pub region_code: String,
    pub region_name: String,
    pub sub_region: String,
    pub estimate_num: String,
    pub estimate_name: String,
    pub estimate_type: String,
    pub index_type: String,
    pub date_year: String,
    pub date_month: String,
    pub date_day: String,
    pub date_quarter: Option<u32>,
    pub reason: String,
    pub base: Option<PriceLevelInfo>,
    pub current: Option<PriceLevelInfo>,
}

impl DocumentHeader {
    /// Header as ordered field/value pairs, the way the `Header` sheet and the
    /// LSR summary name them. Price-level fields only appear when the
    /// document declares that level.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("FileNum", self.file_num.clone()),
            ("FileName", self.file_name.clone()),
            ("ObjectNum", self.object_num.clone()),
            ("ObjectName", self.object_name.clone()),
            ("RegionCode", self.region_code.clone()),
            ("RegionName", self.region_name.clone()),
            ("SubRegion", self.sub_region.clone()),
            ("EstNum", self.estimate_num.clone()),
            ("EstName", self.estimate_name.clone()),
            ("EstType", self.estimate_type.clone()),
            ("IndexType", self.index_type.clone()),
            ("EstDateYear", self.date_year.clone()),
            ("EstDateMonth", self.date_month.clone()),
            ("EstDateDay", self.date_day.clone()),
            ("EstDateQuarter", opt_text(self.date_quarter)),
            ("Reason", self.reason.clone()),
        ];
        if let Some(base) = self.base {
            fields.push(("BaseYear", opt_text(base.year)));
            if base.month.is_some() {
                fields.push(("BaseMonth", opt_text(base.month)));
            }
            fields.push(("BaseQuarter", opt_text(base.quarter)));
        }
        if let Some(cur) = self.current {
            fields.push(("CurYear", opt_text(cur.year)));
            if cur.month.is_some() {
                fields.push(("CurMonth", opt_text(cur.month)));
            }
            fields.push(("CurQuarter", opt_text(cur.quarter)));
        }
        fields
    }

    /// Header value by field name, empty when absent.
    pub fn field(&self, name: &str) -> String {
        self.fields()
            .into_iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v)
            .unwrap_or_default()
    }

    /// Year and quarter of the report period: current price level first,
    /// base price level as fallback.
    pub fn period(&self) -> (Option<u32>, Option<u32>) {
        let cur = self.current.unwrap_or_default();
        let base = self.base.unwrap_or_default();
        (cur.year.or(base.year), cur.quarter.or(base.quarter))
    }
}

/// Everything extracted from one document.
#[derive(Debug, Clone)]
pub struct DocumentSummary {
    pub source: DocumentSource,
    pub header: DocumentHeader,
    /// Flattened `Summary`, with the priced-item sums injected.
    pub flat_summary: FlatRecord,
    pub blocks: EstimateBlocks,
    pub items: Vec<CostItem>,
    pub rollup_current: FinancialRollup,
    pub rollup_base: FinancialRollup,
    /// Local-estimate lines; empty when the only line was a summary line.
    pub lines: Vec<DetailRow>,
}

impl DocumentSummary {
    pub fn rollup(&self, level: PriceLevel) -> &FinancialRollup {
        match level {
            PriceLevel::Current => &self.rollup_current,
            PriceLevel::Base => &self.rollup_base,
        }
    }
}

/// Extract one parsed document.
pub fn extract_document(
    tree: &Node,
    source: &DocumentSource,
    options: &ExtractOptions,
) -> Result<DocumentSummary, DocumentError> {
    let root = tree.get("Construction").unwrap_or(tree);

    let object = find(root, "Object").ok_or(DocumentError::MissingNode("Object"))?;
    let estimate = object
        .get("Estimate")
        .ok_or(DocumentError::MissingNode("Estimate"))?;
    let estimate_price = estimate
        .get("EstimatePrice")
        .ok_or(DocumentError::MissingNode("EstimatePrice"))?;
    let summary = estimate_price
        .get("Summary")
        .ok_or(DocumentError::MissingNode("Summary"))?;

    let header = read_header(root, object, estimate);

    let mut flat_summary = flatten(summary, "");
    let blocks = EstimateBlocks::new(
        qualified_entries(estimate_price.entries())
            .into_iter()
            .filter(|(key, node)| key != "Summary" && matches!(node, Node::Composite(_)))
            .map(|(key, node)| (key, flatten(node, "")))
            .collect(),
    );

    let items = select_priced_items(estimate, &options.item_prefix);
    for level in [PriceLevel::Current, PriceLevel::Base] {
        if let Some(total) = sum_items(&items, level.item_total_field()) {
            flat_summary.insert(level.item_sum_key(), total.to_string());
        }
    }
    debug!(
        file = %source.file_name,
        items = items.len(),
        blocks = blocks.len(),
        "extracted estimate"
    );

    let rollup_current = compute_rollup(&flat_summary, &blocks, PriceLevel::Current);
    let rollup_base = compute_rollup(&flat_summary, &blocks, PriceLevel::Base);

    let lines = local_estimate_line(root, &header, &rollup_current, source)
        .into_iter()
        .collect();

    Ok(DocumentSummary {
        source: source.clone(),
        header,
        flat_summary,
        blocks,
        items,
        rollup_current,
        rollup_base,
        lines,
    })
}

fn read_header(root: &Node, object: &Node, estimate: &Node) -> DocumentHeader {
    let date_month = estimate.text_at(&["Date", "Month"]);
    DocumentHeader {
        file_num: root.text_at(&["Num"]).to_string(),
        file_name: root.text_at(&["Name"]).to_string(),
        object_num: object.text_at(&["Num"]).to_string(),
        object_name: object.text_at(&["Name"]).to_string(),
        region_code: object.text_at(&["Region", "Code"]).to_string(),
        region_name: object.text_at(&["Region", "Name"]).to_string(),
        sub_region: object.text_at(&["SubRegion", "Name"]).to_string(),
        estimate_num: estimate.text_at(&["Num"]).to_string(),
        estimate_name: estimate.text_at(&["Name"]).to_string(),
        estimate_type: estimate.text_at(&["EstimateType"]).to_string(),
        index_type: estimate.text_at(&["IndexType"]).to_string(),
        date_year: estimate.text_at(&["Date", "Year"]).to_string(),
        date_month: date_month.to_string(),
        date_day: estimate.text_at(&["Date", "Day"]).to_string(),
        date_quarter: parse_u32(date_month)
            .filter(|m| (1..=12).contains(m))
            .map(quarter_of),
        reason: estimate.text_at(&["Reason"]).to_string(),
        base: estimate.get("PriceLevelBase").map(PriceLevelInfo::from_node),
        current: estimate.get("PriceLevelCur").map(PriceLevelInfo::from_node),
    }
}

/// The document's single local-estimate line, or `None` for a summary line.
fn local_estimate_line(
    root: &Node,
    header: &DocumentHeader,
    rollup: &FinancialRollup,
    source: &DocumentSource,
) -> Option<DetailRow> {
    if is_summary_line(&header.reason) {
        return None;
    }

    let (num1, num2) = estimate_numbers(&header.reason).unwrap_or_default();
    let (year, quarter) = header.period();

    Some(DetailRow {
        line_number: header.estimate_num.clone(),
        reason: header.reason.clone(),
        description: header.estimate_name.clone(),
        building: rollup.building,
        mounting: rollup.mounting,
        equipment: rollup.equipment,
        other: rollup.other,
        total: rollup.grand_total,
        identity: RowIdentity {
            object_type: source.object_type.clone(),
            name: construction_name(root.text_at(&["Name"])),
            name2: header.object_name.clone(),
            num1,
            num2,
            year,
            quarter,
        },
        group: String::new(),
        keyword: String::new(),
        file_name: source.file_name.clone(),
    })
}

/// Lines whose reason mentions "итого" are subtotals, not estimates.
pub fn is_summary_line(reason: &str) -> bool {
    reason.to_lowercase().contains("итого")
}

/// The two code groups of an estimate number found in a reason string.
pub fn estimate_numbers(reason: &str) -> Option<(String, String)> {
    let caps = ESTIMATE_NUMBER.captures(reason)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// Text inside the first «…» pair, else the whole name trimmed.
pub fn construction_name(raw: &str) -> String {
    raw.split_once('«')
        .and_then(|(_, rest)| rest.split_once('»'))
        .map(|(inner, _)| inner.trim().to_string())
        .unwrap_or_else(|| raw.trim().to_string())
}
