// `smeta run`: corpus in, reports out

use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use smeta_io::{
    load_classification, load_corpus, load_unit_economics, write_combined_report,
    write_document_workbook, write_lsr_summary,
};
use smeta_rollup::model::{GroupedRow, RunMeta, RunSummary};
use smeta_rollup::{
    run, ClassificationTable, CorpusReport, DocumentOutcome, ExtractOptions, Mappings,
    SmetaConfig, TepTable,
};

use crate::{load_config, CliError, RunArgs};

#[derive(Serialize)]
struct RunOutput<'a> {
    meta: &'a RunMeta,
    summary: RunSummary,
    output: PathBuf,
    outcomes: &'a [DocumentOutcome],
    groups: &'a [GroupedRow],
}

/// Config file (if any) first, then flag overrides, then validation.
fn effective_config(args: &RunArgs) -> Result<SmetaConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => SmetaConfig::default(),
    };

    if let Some(input) = &args.input {
        config.input_dir = input.clone();
    }
    if let Some(output) = &args.output {
        config.output = output.clone();
    }
    let overrides = [
        (&args.classification, &mut config.classification),
        (&args.unit_economics, &mut config.unit_economics),
        (&args.per_document_dir, &mut config.per_document_dir),
        (&args.lsr_summary, &mut config.lsr_summary),
    ];
    for (flag, field) in overrides {
        if flag.is_some() {
            field.clone_from(flag);
        }
    }

    config
        .validate()
        .map_err(|e| CliError::config(e.to_string()))?;
    Ok(config)
}

/// Missing or unreadable tables leave the corresponding mapping empty.
fn load_mappings(config: &SmetaConfig) -> Mappings {
    let classification = match &config.classification {
        Some(path) => load_classification(path).unwrap_or_else(|e| {
            warn!(error = %e, "classification table unavailable, rows stay unclassified");
            ClassificationTable::default()
        }),
        None => {
            warn!("no classification table configured, rows stay unclassified");
            ClassificationTable::default()
        }
    };
    let unit_economics = match &config.unit_economics {
        Some(path) => load_unit_economics(path).unwrap_or_else(|e| {
            warn!(error = %e, "unit-economics table unavailable, TEP columns stay blank");
            TepTable::default()
        }),
        None => {
            warn!("no unit-economics table configured, TEP columns stay blank");
            TepTable::default()
        }
    };
    Mappings {
        classification,
        unit_economics,
    }
}

fn write_reports(config: &SmetaConfig, report: &CorpusReport) -> Result<(), CliError> {
    write_combined_report(report, &config.output)
        .map_err(|e| CliError::write(e.to_string()))?;

    if let Some(dir) = &config.per_document_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!(dir = %dir.display(), error = %e, "cannot create per-document directory");
        } else {
            let mut written = 0usize;
            for doc in &report.documents {
                match write_document_workbook(doc, dir) {
                    Ok(_) => written += 1,
                    Err(e) => warn!(file = %doc.source.file_name, error = %e, "per-document workbook not written"),
                }
            }
            info!(dir = %dir.display(), written, "wrote per-document workbooks");
        }
    }

    if let Some(path) = &config.lsr_summary {
        write_lsr_summary(&report.documents, path).map_err(|e| CliError::write(e.to_string()))?;
    }
    Ok(())
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let config = effective_config(&args)?;
    let mappings = load_mappings(&config);
    let options = ExtractOptions {
        item_prefix: config.item_prefix.clone(),
    };

    info!(input = %config.input_dir.display(), "starting corpus run");
    let inputs = load_corpus(&config.input_dir, &config.skip_dirs).map_err(|e| {
        CliError::general(e.to_string()).with_hint("check input_dir or pass --input")
    })?;
    let report = run(inputs, &mappings, &options).map_err(CliError::rollup)?;

    write_reports(&config, &report)?;

    let summary = report.summary();
    eprintln!(
        "processed {} of {} documents ({} skipped, {} without lines): {} rows, {} groups -> {}",
        summary.processed,
        summary.documents,
        summary.skipped,
        summary.empty,
        summary.detail_rows,
        summary.grouped_rows,
        config.output.display(),
    );

    if args.json {
        let out = RunOutput {
            meta: &report.meta,
            summary,
            output: config.output.clone(),
            outcomes: &report.outcomes,
            groups: &report.grouped,
        };
        let text = serde_json::to_string_pretty(&out)
            .map_err(|e| CliError::general(format!("JSON serialization failed: {e}")))?;
        println!("{text}");
    }
    Ok(())
}
