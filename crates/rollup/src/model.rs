use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

use serde::{Serialize, Serializer};

use crate::extract::DocumentSummary;

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// A money amount in minor units (kopecks).
///
/// Decimals are rounded to two places once, when they enter the system.
/// Everything downstream is integer arithmetic, so sums are exact and
/// independent of the order they are taken in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i64);

/// Largest magnitude accepted from a document, in kopecks (10 trillion
/// roubles). Keeps corpus-wide sums far from `i64` limits.
pub const MAX_PARSED_MINOR: i64 = 1_000_000_000_000_000;

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Round a decimal to kopecks. Non-finite values and magnitudes above
    /// [`MAX_PARSED_MINOR`] are rejected.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let scaled = (value * 100.0).round();
        if scaled.abs() > MAX_PARSED_MINOR as f64 {
            return None;
        }
        Some(Self(scaled as i64))
    }

    /// Lenient parse: comma decimal separator, inner spaces ignored.
    pub fn parse(text: &str) -> Option<Self> {
        parse_decimal(text).and_then(Self::from_f64)
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

// Arithmetic saturates at the `i64` bounds.
impl Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Amount {
    type Output = Amount;
    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_sub(rhs.0))
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

/// Parse a decimal the way estimate documents write them: `1200,50`,
/// `1 200.50` (with ordinary or non-breaking spaces) and `1200.5` are all
/// accepted. Returns `None` for empty or non-numeric text.
pub fn parse_decimal(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Price level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceLevel {
    Current,
    Base,
}

impl PriceLevel {
    /// Field-name suffix used by the Summary and category blocks.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Current => "PriceCurrent",
            Self::Base => "PriceBase",
        }
    }

    /// Per-item total field (`Totals_Current` / `Totals_Base`).
    pub fn item_total_field(self) -> &'static str {
        match self {
            Self::Current => "Totals_Current",
            Self::Base => "Totals_Base",
        }
    }

    /// Key under which the item-level sum is injected into the flat summary.
    pub fn item_sum_key(self) -> &'static str {
        match self {
            Self::Current => "Totals_Current_Items",
            Self::Base => "Totals_Base_Items",
        }
    }
}

impl fmt::Display for PriceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => write!(f, "Current"),
            Self::Base => write!(f, "Base"),
        }
    }
}

// ---------------------------------------------------------------------------
// Report rows
// ---------------------------------------------------------------------------

/// Identity fields shared by every report view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RowIdentity {
    /// Top-level corpus folder the document came from.
    pub object_type: String,
    /// Construction name.
    pub name: String,
    /// Object name.
    pub name2: String,
    pub num1: String,
    pub num2: String,
    pub year: Option<u32>,
    pub quarter: Option<u32>,
}

/// One local-estimate line of one document (the `MainData` view).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRow {
    pub line_number: String,
    pub reason: String,
    pub description: String,
    pub building: Amount,
    pub mounting: Amount,
    pub equipment: Amount,
    pub other: Amount,
    pub total: Amount,
    pub identity: RowIdentity,
    /// NLSR group, empty when unclassified.
    pub group: String,
    pub keyword: String,
    pub file_name: String,
}

/// Per-unit coefficient and the metric derived from it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitMetric {
    /// No coefficient, or a zero coefficient: not computable.
    #[default]
    Blank,
    Computed { tep: f64, metric: f64 },
}

/// Summed totals for one identity (the `GroupedData` view).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedRow {
    pub identity: RowIdentity,
    pub group: String,
    pub total: Amount,
    pub record_count: usize,
    pub unit: UnitMetric,
}

/// Narrow per-line projection (the `DetailedData` view).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedRow {
    pub identity: RowIdentity,
    pub total: Amount,
    pub unit: UnitMetric,
}

// ---------------------------------------------------------------------------
// Run output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentOutcome {
    Processed { file: String, rows: usize },
    Skipped { file: String, reason: String },
}

impl DocumentOutcome {
    pub fn file(&self) -> &str {
        match self {
            Self::Processed { file, .. } | Self::Skipped { file, .. } => file,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub documents: usize,
    pub processed: usize,
    pub skipped: usize,
    pub empty: usize,
    pub detail_rows: usize,
    pub grouped_rows: usize,
    pub classified_rows: usize,
}

/// Everything a corpus run produces. Written out by the caller only after the
/// whole corpus has been processed.
#[derive(Debug, Clone)]
pub struct CorpusReport {
    pub meta: RunMeta,
    pub outcomes: Vec<DocumentOutcome>,
    pub documents: Vec<DocumentSummary>,
    pub main: Vec<DetailRow>,
    pub grouped: Vec<GroupedRow>,
    pub detailed: Vec<DetailedRow>,
}

impl CorpusReport {
    pub fn summary(&self) -> RunSummary {
        let skipped = self.outcomes.iter().filter(|o| o.is_skipped()).count();
        let empty = self
            .outcomes
            .iter()
            .filter(|o| matches!(o, DocumentOutcome::Processed { rows: 0, .. }))
            .count();
        RunSummary {
            documents: self.outcomes.len(),
            processed: self.outcomes.len() - skipped,
            skipped,
            empty,
            detail_rows: self.main.len(),
            grouped_rows: self.grouped.len(),
            classified_rows: self.main.iter().filter(|r| !r.group.is_empty()).count(),
        }
    }
}
