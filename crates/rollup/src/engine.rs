use tracing::{debug, info, warn};

use crate::aggregate::{group_rows, project_rows};
use crate::classify::ClassificationTable;
use crate::error::{DocumentError, RollupError};
use crate::extract::{extract_document, DocumentSource, ExtractOptions};
use crate::model::{CorpusReport, DocumentOutcome, RunMeta};
use crate::tep::{apply_unit_metrics, TepTable};
use crate::tree::Node;

/// One corpus document as handed over by the reader: where it came from and
/// either its parsed tree or the reason it could not be parsed.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub source: DocumentSource,
    pub tree: Result<Node, DocumentError>,
}

/// Lookup tables applied to the whole corpus. Either may be empty.
#[derive(Debug, Clone, Default)]
pub struct Mappings {
    pub classification: ClassificationTable,
    pub unit_economics: TepTable,
}

/// Run the corpus pipeline.
///
/// `inputs` is pulled one document at a time; each is extracted and rolled up
/// before the next is read. Failures are local to their document and end up
/// in `outcomes`. Only an empty corpus fails the run.
pub fn run<I>(
    inputs: I,
    mappings: &Mappings,
    options: &ExtractOptions,
) -> Result<CorpusReport, RollupError>
where
    I: IntoIterator<Item = DocumentInput>,
{
    let mut outcomes = Vec::new();
    let mut documents = Vec::new();
    let mut main = Vec::new();

    for input in inputs {
        let file = input.source.file_name.clone();
        let extracted = input
            .tree
            .and_then(|tree| extract_document(&tree, &input.source, options));

        match extracted {
            Ok(summary) => {
                let rows = summary.lines.len();
                if rows == 0 {
                    warn!(file = %file, "document has no local-estimate lines");
                } else {
                    info!(
                        file = %file,
                        rows,
                        total = %summary.rollup_current.grand_total,
                        "processed document"
                    );
                }
                main.extend(summary.lines.iter().cloned());
                documents.push(summary);
                outcomes.push(DocumentOutcome::Processed { file, rows });
            }
            Err(err) => {
                warn!(file = %file, error = %err, "skipping document");
                outcomes.push(DocumentOutcome::Skipped {
                    file,
                    reason: err.to_string(),
                });
            }
        }
    }

    if outcomes.is_empty() {
        return Err(RollupError::NoDocuments);
    }

    for row in &mut main {
        let found = mappings.classification.classify(&row.description);
        row.group = found.group;
        row.keyword = found.keyword;
    }

    let mut grouped = group_rows(&main);
    let mut detailed = project_rows(&main);
    apply_unit_metrics(&mut grouped, &mappings.unit_economics);
    apply_unit_metrics(&mut detailed, &mappings.unit_economics);

    debug!(
        detail_rows = main.len(),
        grouped_rows = grouped.len(),
        "aggregated corpus"
    );

    Ok(CorpusReport {
        meta: RunMeta {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        outcomes,
        documents,
        main,
        grouped,
        detailed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::NlsrEntry;
    use crate::model::{Amount, UnitMetric};

    fn document(reason: &str, name: &str, materials: &str) -> Node {
        Node::composite([(
            "Construction",
            Node::composite([
                ("Name", Node::leaf("Школа")),
                (
                    "Object",
                    Node::composite([
                        ("Name", Node::leaf("Корпус")),
                        (
                            "Estimate",
                            Node::composite([
                                ("Num", Node::leaf("1")),
                                ("Name", Node::leaf(name)),
                                ("Reason", Node::leaf(reason)),
                                (
                                    "EstimatePrice",
                                    Node::composite([(
                                        "Summary",
                                        Node::composite([("Materials_Total", Node::leaf(materials))]),
                                    )]),
                                ),
                            ]),
                        ),
                    ]),
                ),
            ]),
        )])
    }

    fn input(file: &str, tree: Result<Node, DocumentError>) -> DocumentInput {
        DocumentInput {
            source: DocumentSource::new(file, "Школы"),
            tree,
        }
    }

    #[test]
    fn empty_corpus_is_fatal() {
        let inputs: Vec<DocumentInput> = Vec::new();
        let err = run(inputs, &Mappings::default(), &ExtractOptions::default()).unwrap_err();
        assert!(matches!(err, RollupError::NoDocuments));
    }

    #[test]
    fn failures_are_isolated() {
        let inputs = vec![
            input("a.gge", Ok(document("ЛС-02-01-01", "Кровля", "100"))),
            input("b.gge", Err(DocumentError::Parse("unexpected EOF".into()))),
            input("c.gge", Ok(Node::composite([("Construction", Node::leaf(""))]))),
            input("d.gge", Ok(document("ЛС-02-02-01", "Фасад", "50"))),
        ];
        let report = run(inputs, &Mappings::default(), &ExtractOptions::default()).unwrap();

        assert_eq!(report.main.len(), 2);
        assert_eq!(report.documents.len(), 2);
        let summary = report.summary();
        assert_eq!(summary.documents, 4);
        assert_eq!(summary.skipped, 2);
        assert_eq!(
            report.outcomes[2],
            DocumentOutcome::Skipped {
                file: "c.gge".into(),
                reason: "node <Object> not found".into(),
            }
        );
    }

    #[test]
    fn summary_line_documents_count_as_empty() {
        let inputs = vec![input("a.gge", Ok(document("Итого", "x", "1")))];
        let report = run(inputs, &Mappings::default(), &ExtractOptions::default()).unwrap();
        assert!(report.main.is_empty());
        assert_eq!(report.summary().empty, 1);
        assert_eq!(report.summary().skipped, 0);
    }

    #[test]
    fn classification_and_unit_metric_applied() {
        let mut tep = TepTable::new();
        tep.insert("Школы", "Школа", "", "02", "01", 4.0);
        let mappings = Mappings {
            classification: ClassificationTable::new([NlsrEntry::new("Кровля", "кровл")]),
            unit_economics: tep,
        };
        let inputs = vec![
            input("a.gge", Ok(document("ЛС-02-01-01", "Ремонт кровли", "100"))),
            input("b.gge", Ok(document("ЛС-02-01-02", "Ремонт кровли", "20"))),
            input("c.gge", Ok(document("ЛС-03-01-01", "Электрика", "7"))),
        ];
        let report = run(inputs, &mappings, &ExtractOptions::default()).unwrap();

        assert_eq!(report.main[0].group, "Кровля");
        assert_eq!(report.main[2].group, "");
        assert_eq!(report.summary().classified_rows, 2);

        assert_eq!(report.grouped.len(), 2);
        let roof = &report.grouped[0];
        assert_eq!(roof.identity.num1, "02");
        assert_eq!(roof.total, Amount::from_minor(12_000));
        assert_eq!(roof.record_count, 2);
        assert_eq!(roof.unit, UnitMetric::Computed { tep: 4.0, metric: 30.0 });
        assert_eq!(report.grouped[1].unit, UnitMetric::Blank);

        assert_eq!(report.detailed.len(), 3);
        assert_eq!(
            report.detailed[1].unit,
            UnitMetric::Computed { tep: 4.0, metric: 5.0 }
        );
    }
}
