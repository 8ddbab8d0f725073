// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine: runs jobs end to end.
//
// A job loads its inputs, scans and plans every page in parallel, applies
// the edits in page order, and serialises the result. Each async job runs on
// a blocking task under a timeout; the synchronous entry point checks the
// same deadline between pages.

use std::sync::Arc;

use chrono::Utc;
use lopdf::ObjectId;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use unmark_core::config::EngineConfig;
use unmark_core::error::{Result, UnmarkError};
use unmark_core::types::{
    ImageHit, JobReport, JobState, Operation, ProcessOptions, RedactionResult, RedactionWarning, ScanReport,
    TextHit, TextSpan,
};
use unmark_document::{
    MatchTarget, Page, PageRedaction, Pattern, PatternCatalog, PdfDocument, Redactor, merge, merge_bytes, scan,
};

use crate::job::{Budget, Job};

/// Output bytes of a finished job and what was done to produce them.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub bytes: Vec<u8>,
    pub report: JobReport,
}

/// Per-page plan, computed in parallel and applied serially.
type PagePlan = (ObjectId, PageRedaction);

/// Image count, hits and short text spans of one scanned page.
type PageScan = (usize, Vec<TextHit>, Vec<ImageHit>, Vec<TextSpan>);

/// Runs watermark removal, merge and scan jobs.
///
/// Cheap to clone: the catalog, configuration and worker pool are shared.
#[derive(Clone)]
pub struct Engine {
    catalog: Arc<PatternCatalog>,
    config: Arc<EngineConfig>,
    pool: Arc<rayon::ThreadPool>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("workers", &self.pool.current_num_threads())
            .finish()
    }
}

impl Engine {
    // -- Construction ---------------------------------------------------------

    /// Build the catalog and the page worker pool from `config`.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let catalog = PatternCatalog::new(&config.catalog);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|index| format!("unmark-page-{index}"))
            .build()
            .map_err(|err| UnmarkError::Internal(format!("cannot start page workers: {err}")))?;
        info!(
            workers = pool.current_num_threads(),
            timeout_secs = config.job_timeout_secs,
            "engine ready"
        );
        Ok(Self {
            catalog: Arc::new(catalog),
            config: Arc::new(config),
            pool: Arc::new(pool),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &PatternCatalog {
        &self.catalog
    }

    // -- Async entry points ---------------------------------------------------

    /// Run one operation. `extra_inputs` are the documents appended after
    /// `input` by [`Operation::Merge`]; the removal operations take none.
    #[instrument(skip_all, fields(operation = operation.keyword(), extra = extra_inputs.len()))]
    pub async fn process(
        &self,
        input: Vec<u8>,
        operation: Operation,
        extra_inputs: Vec<Vec<u8>>,
    ) -> Result<ProcessOutput> {
        let engine = self.clone();
        self.run_blocking(move |budget| engine.run_operation(input, operation, extra_inputs, budget))
            .await
    }

    /// Clean every input with the selected pattern classes, then merge them.
    #[instrument(skip_all, fields(files = inputs.len(), options = ?options))]
    pub async fn process_batch(&self, inputs: Vec<Vec<u8>>, options: ProcessOptions) -> Result<ProcessOutput> {
        let engine = self.clone();
        self.run_blocking(move |budget| engine.run_batch(inputs, options, budget))
            .await
    }

    /// Read-only watermark analysis of one document.
    #[instrument(skip_all, fields(input_bytes = input.len()))]
    pub async fn scan_report(&self, input: Vec<u8>) -> Result<ScanReport> {
        let engine = self.clone();
        self.run_blocking(move |budget| engine.run_scan_report(&input, budget))
            .await
    }

    /// Run `work` on a blocking task, giving up after the job timeout.
    ///
    /// On expiry the budget is cancelled so the worker stops at its next page.
    async fn run_blocking<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&Budget) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let limit = self.config.job_timeout();
        let budget = Budget::new(limit);
        let handle = budget.clone();
        let task = tokio::task::spawn_blocking(move || work(&budget));

        match tokio::time::timeout(limit, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(UnmarkError::Internal(format!("job worker failed: {join_err}"))),
            Err(_) => {
                handle.cancel();
                warn!(timeout_secs = limit.as_secs(), "job timed out");
                Err(UnmarkError::Timeout {
                    seconds: limit.as_secs(),
                })
            }
        }
    }

    // -- Sync entry points ----------------------------------------------------

    /// [`Engine::process`] for callers without a runtime.
    pub fn process_blocking(
        &self,
        input: Vec<u8>,
        operation: Operation,
        extra_inputs: Vec<Vec<u8>>,
    ) -> Result<ProcessOutput> {
        let budget = Budget::new(self.config.job_timeout());
        self.run_operation(input, operation, extra_inputs, &budget)
    }

    /// [`Engine::scan_report`] for callers without a runtime.
    pub fn scan_report_blocking(&self, input: &[u8]) -> Result<ScanReport> {
        let budget = Budget::new(self.config.job_timeout());
        self.run_scan_report(input, &budget)
    }

    // -- Jobs -----------------------------------------------------------------

    fn run_operation(
        &self,
        input: Vec<u8>,
        operation: Operation,
        extra_inputs: Vec<Vec<u8>>,
        budget: &Budget,
    ) -> Result<ProcessOutput> {
        let mut job = Job::new(Some(operation));
        info!(job_id = %job.id(), operation = operation.keyword(), "job started");

        let mut inputs = Vec::with_capacity(1 + extra_inputs.len());
        inputs.push(input);
        inputs.extend(extra_inputs);

        let result = match operation {
            Operation::Merge => self.merge_job(&mut job, &inputs, budget),
            Operation::RemoveWatermark | Operation::RemoveQrcode => {
                self.redaction_job(&mut job, &inputs, self.catalog.for_operation(operation), budget)
            }
        };
        finish(job, result)
    }

    fn run_batch(&self, inputs: Vec<Vec<u8>>, options: ProcessOptions, budget: &Budget) -> Result<ProcessOutput> {
        let mut job = Job::new(None);
        info!(job_id = %job.id(), files = inputs.len(), "batch job started");
        let result = self.batch_job(&mut job, &inputs, options, budget);
        finish(job, result)
    }

    fn redaction_job(
        &self,
        job: &mut Job,
        inputs: &[Vec<u8>],
        patterns: &[Pattern],
        budget: &Budget,
    ) -> Result<(Vec<u8>, JobReport)> {
        let [input] = inputs else {
            return Err(UnmarkError::InvalidInput(format!(
                "watermark removal takes one document, got {}",
                inputs.len()
            )));
        };
        let mut doc = PdfDocument::from_bytes(input)?;

        job.advance(JobState::Scanning)?;
        let plans = self.plan(&doc, patterns, budget)?;

        job.advance(JobState::Redacting)?;
        let results = apply(&mut doc, plans, budget)?;

        let bytes = doc.to_bytes()?;
        job.advance(JobState::Finalized)?;
        let report = report(job, inputs, doc.page_count(), results, &bytes);
        Ok((bytes, report))
    }

    fn merge_job(&self, job: &mut Job, inputs: &[Vec<u8>], budget: &Budget) -> Result<(Vec<u8>, JobReport)> {
        job.advance(JobState::Merging)?;
        let sources: Vec<&[u8]> = inputs.iter().map(Vec::as_slice).collect();
        let mut merged = merge_bytes(&sources)?;
        budget.check()?;

        let bytes = merged.to_bytes()?;
        job.advance(JobState::Finalized)?;
        let report = report(job, inputs, merged.page_count(), Vec::new(), &bytes);
        Ok((bytes, report))
    }

    fn batch_job(
        &self,
        job: &mut Job,
        inputs: &[Vec<u8>],
        options: ProcessOptions,
        budget: &Budget,
    ) -> Result<(Vec<u8>, JobReport)> {
        if inputs.is_empty() {
            return Err(UnmarkError::InvalidInput("no documents given".into()));
        }
        if inputs.len() > 1 && !options.merge {
            return Err(UnmarkError::InvalidInput(
                "several documents can only be processed together when merging".into(),
            ));
        }

        let mut docs = inputs
            .iter()
            .enumerate()
            .map(|(index, input)| {
                PdfDocument::from_bytes(input).map_err(|err| match err {
                    UnmarkError::InvalidInput(reason) if inputs.len() > 1 => {
                        UnmarkError::InvalidInput(format!("input #{}: {reason}", index + 1))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let patterns = self.catalog.select(options.remove_text, options.remove_qr);
        let mut results = Vec::new();
        let cleaning = !patterns.is_empty() || docs.len() == 1;
        if cleaning {
            job.advance(JobState::Scanning)?;
            let plans = docs
                .iter()
                .map(|doc| self.plan(doc, &patterns, budget))
                .collect::<Result<Vec<_>>>()?;

            job.advance(JobState::Redacting)?;
            let mut offset = 0;
            for (doc, plan) in docs.iter_mut().zip(plans) {
                for result in apply(doc, plan, budget)? {
                    results.push(renumber(result, offset));
                }
                offset += doc.page_count() as u32;
            }
        }

        let mut output = if docs.len() > 1 {
            job.advance(JobState::Merging)?;
            let merged = merge(&docs)?;
            budget.check()?;
            merged
        } else {
            docs.remove(0)
        };

        if options.compress {
            output.compress();
        }
        let bytes = output.to_bytes()?;
        job.advance(JobState::Finalized)?;
        let report = report(job, inputs, output.page_count(), results, &bytes);
        Ok((bytes, report))
    }

    fn run_scan_report(&self, input: &[u8], budget: &Budget) -> Result<ScanReport> {
        let doc = PdfDocument::from_bytes(input)?;
        let patterns = self.catalog.select(true, true);

        let pages = self.pool.install(|| {
            doc.page_ids()
                .into_par_iter()
                .map(|(number, page_id)| -> Result<PageScan> {
                    budget.check()?;
                    let page = match doc.load_page_by_id(number, page_id) {
                        Ok(page) => page,
                        Err(err) => {
                            warn!(page = number, error = %err, "page skipped during scan");
                            return Ok((0, Vec::new(), Vec::new(), Vec::new()));
                        }
                    };
                    let (width, height) = page.display_size();
                    let mut text_hits = Vec::new();
                    let mut image_hits = Vec::new();
                    for found in scan(&page, &patterns) {
                        match found.target {
                            MatchTarget::Placement => {
                                let display = page.to_display(&found.bbox);
                                image_hits.push(ImageHit {
                                    page: number,
                                    position: (display.x0 / width, display.y0 / height),
                                    size: (display.width(), display.height()),
                                });
                            }
                            MatchTarget::Glyphs { .. } | MatchTarget::BakedText { .. } => text_hits.push(TextHit {
                                page: number,
                                text: found.pattern.label().to_string(),
                                bbox: found.bbox,
                            }),
                        }
                    }
                    let details = if number == 1 { text_details(&page) } else { Vec::new() };
                    Ok((page.images().count(), text_hits, image_hits, details))
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let mut report = ScanReport {
            pages: doc.page_count(),
            ..Default::default()
        };
        for (images, text_hits, image_hits, details) in pages {
            report.images += images;
            report.text_hits.extend(text_hits);
            report.image_hits.extend(image_hits);
            report.text_details.extend(details);
        }
        report.has_text_watermark = !report.text_hits.is_empty();
        report.has_qr_watermark = !report.image_hits.is_empty();
        info!(
            pages = report.pages,
            text_hits = report.text_hits.len(),
            image_hits = report.image_hits.len(),
            "scan finished"
        );
        Ok(report)
    }

    // -- Page work ------------------------------------------------------------

    /// Scan every page and plan its redaction, in parallel.
    ///
    /// A page whose content cannot be decoded is left as it is and reported.
    fn plan(&self, doc: &PdfDocument, patterns: &[Pattern], budget: &Budget) -> Result<Vec<PagePlan>> {
        let sampler = doc.sampler(self.config.sample_ring_px);
        let redactor = Redactor::new(self.config.fallback_fill);

        self.pool.install(|| {
            doc.page_ids()
                .into_par_iter()
                .map(|(number, page_id)| -> Result<PagePlan> {
                    budget.check()?;
                    let redaction = match doc.load_page_by_id(number, page_id) {
                        Ok(page) => {
                            let matches = scan(&page, patterns);
                            debug!(page = number, matches = matches.len(), "page scanned");
                            redactor.redact(&page, &matches, &sampler)
                        }
                        Err(err) if !patterns.is_empty() => {
                            warn!(page = number, error = %err, "page skipped");
                            let mut result = RedactionResult::for_page(number);
                            result.warnings.push(RedactionWarning::PageSkipped {
                                page: number,
                                reason: err.to_string(),
                            });
                            PageRedaction { content: None, result }
                        }
                        Err(_) => PageRedaction {
                            content: None,
                            result: RedactionResult::for_page(number),
                        },
                    };
                    Ok((page_id, redaction))
                })
                .collect()
        })
    }
}

/// Write planned content streams back, in page order.
fn apply(doc: &mut PdfDocument, plans: Vec<PagePlan>, budget: &Budget) -> Result<Vec<RedactionResult>> {
    let mut results = Vec::with_capacity(plans.len());
    for (page_id, redaction) in plans {
        budget.check()?;
        if let Some(content) = redaction.content {
            doc.replace_page_content(page_id, content)?;
        }
        results.push(redaction.result);
    }
    Ok(results)
}

/// Trimmed spans of 2 to 29 characters, in content order.
fn text_details(page: &Page) -> Vec<TextSpan> {
    page.text_runs()
        .flat_map(|(_, run)| run.spans())
        .filter_map(|(text, size)| {
            let text = text.trim();
            let chars = text.chars().count();
            (chars > 1 && chars < 30).then(|| TextSpan {
                text: text.to_string(),
                size,
            })
        })
        .collect()
}

/// Shift a per-document page number into the merged numbering.
fn renumber(mut result: RedactionResult, offset: u32) -> RedactionResult {
    result.page += offset;
    for warning in &mut result.warnings {
        match warning {
            RedactionWarning::PartialRedaction { page, .. } | RedactionWarning::PageSkipped { page, .. } => {
                *page += offset
            }
        }
    }
    result
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn report(job: &Job, inputs: &[Vec<u8>], pages: usize, results: Vec<RedactionResult>, output: &[u8]) -> JobReport {
    let page_results: Vec<RedactionResult> = results
        .into_iter()
        .filter(|r| r.total() > 0 || r.is_partial())
        .collect();
    JobReport {
        job_id: job.id(),
        operation: job.operation(),
        files: inputs.len(),
        pages,
        pages_with_matches: page_results.iter().filter(|r| r.total() > 0).count(),
        matches_removed: page_results.iter().map(|r| r.removed).sum(),
        regions_covered: page_results.iter().map(|r| r.covered).sum(),
        page_results,
        input_hashes: inputs.iter().map(|input| sha256_hex(input)).collect(),
        output_hash: sha256_hex(output),
        output_bytes: output.len(),
        started_at: job.started_at(),
        finished_at: Utc::now(),
    }
}

/// Close out a job: mark it failed on error, log the outcome.
fn finish(mut job: Job, result: Result<(Vec<u8>, JobReport)>) -> Result<ProcessOutput> {
    match result {
        Ok((bytes, report)) => {
            info!(
                job_id = %job.id(),
                pages = report.pages,
                watermarks = report.watermarks(),
                partial_pages = report.partial_pages().len(),
                output_bytes = report.output_bytes,
                "job finished"
            );
            Ok(ProcessOutput { bytes, report })
        }
        Err(err) => {
            job.fail(&err);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unmark_document::testing::{PdfBuilder, cjk_text, image_op, page_text, text_op};

    fn engine() -> Engine {
        Engine::new(EngineConfig::default()).unwrap()
    }

    fn watermarked() -> Vec<u8> {
        let page1 = format!(
            "{}{}{}",
            text_op(72.0, 700.0, 12.0, "Quarterly figures"),
            text_op(400.0, 30.0, 8.0, "Scanned with CamScanner"),
            cjk_text(72.0, 30.0, 8.0, "扫描全能王"),
        );
        let page2 = text_op(72.0, 700.0, 12.0, "Appendix without branding");
        PdfBuilder::new().page(&page1).page(&page2).build()
    }

    fn content_of(bytes: &[u8], number: u32) -> Vec<u8> {
        let doc = lopdf::Document::load_mem(bytes).unwrap();
        let id = doc.get_pages()[&number];
        doc.get_page_content(id).unwrap()
    }

    #[tokio::test]
    async fn removes_text_watermarks_and_reports_them() {
        let output = engine()
            .process(watermarked(), Operation::RemoveWatermark, vec![])
            .await
            .unwrap();

        let text = page_text(&output.bytes, 1);
        assert!(text.contains("Quarterly figures"));
        assert!(!text.contains("CamScanner"));
        assert!(!text.contains("扫描全能王"));

        let report = output.report;
        assert_eq!(report.operation, Some(Operation::RemoveWatermark));
        assert_eq!(report.pages, 2);
        assert_eq!(report.pages_with_matches, 1);
        assert_eq!(report.matches_removed, 2);
        assert_eq!(report.regions_covered, 0);
        assert!(report.partial_pages().is_empty());
        assert_eq!(report.input_hashes.len(), 1);
        assert_eq!(report.output_hash.len(), 64);
        assert_eq!(report.output_bytes, output.bytes.len());
        assert!(report.finished_at >= report.started_at);
    }

    #[tokio::test]
    async fn removing_twice_changes_nothing_more() {
        let engine = engine();
        let once = engine
            .process(watermarked(), Operation::RemoveWatermark, vec![])
            .await
            .unwrap();
        let twice = engine
            .process(once.bytes.clone(), Operation::RemoveWatermark, vec![])
            .await
            .unwrap();

        assert_eq!(twice.report.watermarks(), 0);
        for number in 1..=2 {
            assert_eq!(content_of(&once.bytes, number), content_of(&twice.bytes, number));
        }
    }

    #[tokio::test]
    async fn pages_without_matches_keep_their_content() {
        let input = watermarked();
        let output = engine()
            .process(input.clone(), Operation::RemoveWatermark, vec![])
            .await
            .unwrap();
        assert_eq!(content_of(&input, 2), content_of(&output.bytes, 2));
        assert_ne!(content_of(&input, 1), content_of(&output.bytes, 1));
    }

    #[tokio::test]
    async fn removes_the_corner_stamp_only() {
        let content = format!(
            "{}{}{}",
            image_op("Qr", 40.0, 700.0, 60.0, 60.0),
            image_op("Qr", 520.0, 40.0, 60.0, 60.0),
            text_op(72.0, 400.0, 12.0, "CamScanner"),
        );
        let input = PdfBuilder::new().page(&content).build();
        let output = engine()
            .process(input, Operation::RemoveQrcode, vec![])
            .await
            .unwrap();

        assert_eq!(output.report.matches_removed, 1);
        let page = PdfDocument::from_bytes(&output.bytes).unwrap().load_page(1).unwrap();
        let images: Vec<_> = page.images().map(|(_, image)| image.bbox).collect();
        assert_eq!(images.len(), 1);
        assert!(images[0].x0 < 100.0);
        // Text watermarks are not this operation's business.
        assert!(page.text().contains("CamScanner"));
    }

    #[tokio::test]
    async fn merge_keeps_document_and_page_order() {
        let a = PdfBuilder::new()
            .page(&text_op(72.0, 700.0, 12.0, "A one"))
            .page(&text_op(72.0, 700.0, 12.0, "A two"))
            .build();
        let b = PdfBuilder::new().page(&text_op(72.0, 700.0, 12.0, "B one")).build();

        let output = engine().process(a, Operation::Merge, vec![b]).await.unwrap();
        assert_eq!(output.report.files, 2);
        assert_eq!(output.report.pages, 3);
        assert_eq!(page_text(&output.bytes, 1), "A one");
        assert_eq!(page_text(&output.bytes, 2), "A two");
        assert_eq!(page_text(&output.bytes, 3), "B one");
    }

    #[tokio::test]
    async fn corrupt_merge_input_fails_the_job() {
        let a = PdfBuilder::new().page(&text_op(72.0, 700.0, 12.0, "A")).build();
        let err = engine()
            .process(a, Operation::Merge, vec![b"not a pdf".to_vec()])
            .await
            .unwrap_err();
        assert!(matches!(err, UnmarkError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn removal_rejects_extra_documents() {
        let a = watermarked();
        let err = engine()
            .process(a.clone(), Operation::RemoveWatermark, vec![a])
            .await
            .unwrap_err();
        assert!(err.is_input_error());
    }

    #[tokio::test]
    async fn encrypted_input_is_unsupported() {
        let mut doc = PdfBuilder::new().page(&text_op(72.0, 700.0, 12.0, "secret")).into_document();
        doc.trailer.set(
            "Encrypt",
            lopdf::dictionary! { "Filter" => "Standard", "V" => 1, "R" => 2 },
        );
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        let err = engine()
            .process(bytes, Operation::RemoveWatermark, vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, UnmarkError::UnsupportedStructure(_)));
    }

    #[tokio::test]
    async fn exhausted_budget_times_out() {
        let config = EngineConfig {
            job_timeout_secs: 0,
            ..EngineConfig::default()
        };
        let engine = Engine::new(config).unwrap();
        let err = engine
            .process(watermarked(), Operation::RemoveWatermark, vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, UnmarkError::Timeout { seconds: 0 }));

        let err = engine
            .process_blocking(watermarked(), Operation::RemoveWatermark, vec![])
            .unwrap_err();
        assert!(matches!(err, UnmarkError::Timeout { .. }));
    }

    #[tokio::test]
    async fn concurrent_jobs_do_not_interfere() {
        let engine = engine();
        let plain = PdfBuilder::new().page(&text_op(72.0, 700.0, 12.0, "clean page")).build();
        let (first, second) = tokio::join!(
            engine.process(watermarked(), Operation::RemoveWatermark, vec![]),
            engine.process(plain, Operation::RemoveWatermark, vec![]),
        );
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_eq!(first.report.matches_removed, 2);
        assert_eq!(second.report.matches_removed, 0);
        assert_ne!(first.report.job_id, second.report.job_id);
    }

    #[tokio::test]
    async fn batch_cleans_then_merges() {
        let stamped = PdfBuilder::new()
            .page(&format!(
                "{}{}",
                text_op(72.0, 700.0, 12.0, "Second file"),
                image_op("Qr", 520.0, 40.0, 60.0, 60.0)
            ))
            .build();
        let output = engine()
            .process_batch(vec![watermarked(), stamped], ProcessOptions::default())
            .await
            .unwrap();

        let report = &output.report;
        assert_eq!(report.operation, None);
        assert_eq!(report.files, 2);
        assert_eq!(report.pages, 3);
        assert_eq!(report.watermarks(), 3);
        // The stamp sits on the merged document's third page.
        assert!(report.page_results.iter().any(|r| r.page == 3 && r.removed == 1));

        assert!(!page_text(&output.bytes, 1).contains("CamScanner"));
        assert_eq!(page_text(&output.bytes, 3), "Second file");
        let third = PdfDocument::from_bytes(&output.bytes).unwrap().load_page(3).unwrap();
        assert_eq!(third.images().count(), 0);
    }

    #[tokio::test]
    async fn batch_needs_merge_for_several_files() {
        let options = ProcessOptions {
            merge: false,
            ..ProcessOptions::default()
        };
        let err = engine()
            .process_batch(vec![watermarked(), watermarked()], options)
            .await
            .unwrap_err();
        assert!(matches!(err, UnmarkError::InvalidInput(_)));

        let err = engine()
            .process_batch(Vec::new(), ProcessOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, UnmarkError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn batch_input_errors_name_the_file() {
        let err = engine()
            .process_batch(vec![watermarked(), b"junk".to_vec()], ProcessOptions::default())
            .await
            .unwrap_err();
        let UnmarkError::InvalidInput(reason) = err else { panic!("expected invalid input") };
        assert!(reason.starts_with("input #2"));
    }

    #[tokio::test]
    async fn scan_report_lists_every_hit() {
        let content = format!(
            "{}{}{}",
            image_op("Bg", 0.0, 0.0, 612.0, 792.0),
            text_op(400.0, 30.0, 8.0, "CamScanner"),
            image_op("Qr", 532.0, 20.0, 60.0, 60.0),
        );
        let input = PdfBuilder::new()
            .page(&content)
            .page(&text_op(72.0, 700.0, 12.0, "plain"))
            .build();
        let report = engine().scan_report(input).await.unwrap();

        assert_eq!(report.pages, 2);
        assert_eq!(report.images, 2);
        assert!(report.has_text_watermark);
        assert!(report.has_qr_watermark);
        assert_eq!(report.text_hits.len(), 1);
        assert_eq!(report.text_hits[0].text, "CamScanner");

        let hit = &report.image_hits[0];
        assert_eq!(hit.page, 1);
        assert!((hit.position.0 - 532.0 / 612.0).abs() < 1e-3);
        assert!((hit.position.1 - (792.0 - 80.0) / 792.0).abs() < 1e-3);
        assert!((hit.size.0 - 60.0).abs() < 1e-3);
    }

    #[tokio::test]
    async fn scan_report_lists_short_first_page_spans() {
        let content = format!(
            "{}{}{}{}",
            text_op(72.0, 700.0, 14.0, "  Invoice 2026  "),
            text_op(72.0, 600.0, 10.0, "This sentence is far too long to be listed as a detail"),
            text_op(72.0, 500.0, 10.0, "x"),
            cjk_text(300.0, 30.0, 12.0, "扫描全能王"),
        );
        let input = PdfBuilder::new()
            .page(&content)
            .page(&text_op(72.0, 700.0, 12.0, "Second page"))
            .build();
        let report = engine().scan_report(input).await.unwrap();

        let details: Vec<_> = report.text_details.iter().map(|d| (d.text.as_str(), d.size)).collect();
        assert_eq!(details, vec![("Invoice 2026", 14.0), ("扫描全能王", 12.0)]);
    }

    #[test]
    fn blocking_entry_points_need_no_runtime() {
        let engine = engine();
        let report = engine.scan_report_blocking(&watermarked()).unwrap();
        assert_eq!(report.text_hits.len(), 2);
        assert!(!report.has_qr_watermark);

        let output = engine
            .process_blocking(watermarked(), Operation::RemoveWatermark, vec![])
            .unwrap();
        assert_eq!(output.report.matches_removed, 2);
    }

    #[test]
    fn renumbering_shifts_warnings_too() {
        let mut result = RedactionResult::for_page(2);
        result.covered = 1;
        result.warnings.push(RedactionWarning::PageSkipped {
            page: 2,
            reason: "x".into(),
        });
        let shifted = renumber(result, 3);
        assert_eq!(shifted.page, 5);
        assert_eq!(shifted.warnings[0].page(), 5);
    }
}
