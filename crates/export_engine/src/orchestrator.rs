use std::path::{Path, PathBuf};

use export_core::{
    ledger_text, plan_item, Candidate, ExportMode, ExportOutcome, ItemPlan, LedgerEntry,
    LedgerStatus, NameSource, PlanContext, SessionCredential,
};
use export_logging::{export_debug, export_error, export_info, export_warn};
use url::Url;

use crate::fetch::ResourceFetcher;
use crate::ledger::Ledger;
use crate::pdf::PageExporter;

/// Where each exportable candidate is sent.
pub enum Dispatcher<'a> {
    Fetch {
        fetcher: &'a dyn ResourceFetcher,
        credentials: &'a [SessionCredential],
    },
    Pdf {
        exporter: &'a dyn PageExporter,
    },
}

impl Dispatcher<'_> {
    pub fn mode(&self) -> ExportMode {
        match self {
            Dispatcher::Fetch { .. } => ExportMode::Fetch,
            Dispatcher::Pdf { .. } => ExportMode::Pdf,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunReport {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// One entry per non-skipped candidate, in candidate order.
    pub entries: Vec<LedgerEntry>,
}

/// Sequential export loop: plan, dispatch, record, next.
///
/// A single candidate's failure never stops the run; it becomes a ledger
/// row. Each row is appended as soon as its outcome is known.
pub struct Orchestrator<'a> {
    dispatcher: Dispatcher<'a>,
    ledger: &'a Ledger,
    output_dir: PathBuf,
    plan: PlanContext,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        dispatcher: Dispatcher<'a>,
        ledger: &'a Ledger,
        output_dir: impl Into<PathBuf>,
        page_url: Url,
    ) -> Self {
        let plan = PlanContext::new(page_url, dispatcher.mode());
        Self {
            dispatcher,
            ledger,
            output_dir: output_dir.into(),
            plan,
        }
    }

    pub fn with_name_source(mut self, name_source: NameSource) -> Self {
        self.plan = self.plan.with_name_source(name_source);
        self
    }

    pub async fn run(&self, candidates: &[Candidate]) -> RunReport {
        let mut report = RunReport::default();

        for (ordinal, candidate) in candidates.iter().enumerate() {
            let (file_name, outcome) = match plan_item(candidate, ordinal, &self.plan) {
                ItemPlan::Skip(reason) => {
                    export_info!("Skipping {}: {}", candidate.source_ref, reason);
                    report.skipped += 1;
                    continue;
                }
                ItemPlan::Reject { file_name, reason } => {
                    (file_name, ExportOutcome::Failure(reason))
                }
                ItemPlan::Export { target, file_name } => {
                    let path = self.output_dir.join(&file_name);
                    let outcome = self.dispatch(&target.absolute_url, &path).await;
                    (file_name, outcome)
                }
            };

            match &outcome {
                ExportOutcome::Success => {
                    report.succeeded += 1;
                    export_info!("Saved: {}", self.output_dir.join(&file_name).display());
                }
                ExportOutcome::Failure(reason) => {
                    report.failed += 1;
                    export_warn!("Failed to handle {}: {}", candidate.source_ref, reason);
                }
            }

            let entry = LedgerEntry {
                text: ledger_text(candidate, &file_name),
                file_name,
                status: LedgerStatus::from(&outcome),
            };
            if let Err(err) = self.ledger.append(&entry) {
                export_error!("{}", err);
            }
            report.entries.push(entry);
        }

        report
    }

    async fn dispatch(&self, url: &str, path: &Path) -> ExportOutcome {
        let result = match &self.dispatcher {
            Dispatcher::Fetch {
                fetcher,
                credentials,
            } => fetcher.fetch_to_file(url, path, credentials).await,
            Dispatcher::Pdf { exporter } => exporter.export_pdf(url, path).await,
        };
        match result {
            Ok(bytes) => {
                export_debug!("Wrote {} bytes to {}", bytes, path.display());
                ExportOutcome::Success
            }
            Err(err) => ExportOutcome::Failure(err.to_string()),
        }
    }
}
