use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, error, info, info_span, warn};

use crate::heuristics::{self, ReadingFragment, UtilityType};
use crate::mailbox::{self, Mailbox};
use crate::message_processor::{self, Attachment, ParsedMessage};
use crate::pdf_extract::PageTextExtractor;
use crate::sink::{self, ConsumptionSink};

/// A parsed consumption value together with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    #[serde(flatten)]
    pub fragment: ReadingFragment,
    pub source_filename: String,
    pub email_subject: String,
    pub email_sender: String,
    pub email_date: String,
}

/// What happened to one attachment.
#[derive(Debug)]
pub enum AttachmentOutcome {
    Matched(Reading),
    /// Text was extracted but no rule recognised it.
    NoMatch,
    /// Not a PDF; not looked at.
    Skipped,
    /// Extraction failed; the run carries on with the next attachment.
    Failed(String),
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub messages_processed: usize,
    pub pdfs_seen: usize,
    /// Messages that could not be parsed as MIME.
    pub message_failures: usize,
    /// PDF attachments whose text could not be extracted.
    pub failures: usize,
    pub readings: Vec<Reading>,
}

/// Drives one run: mailbox → attachments → page text → readings.
pub struct Pipeline<'a> {
    extractor: &'a dyn PageTextExtractor,
    scratch_dir: Option<PathBuf>,
}

impl<'a> Pipeline<'a> {
    pub fn new(extractor: &'a dyn PageTextExtractor, scratch_dir: Option<PathBuf>) -> Self {
        Self {
            extractor,
            scratch_dir,
        }
    }

    /// Process the `limit` most recent messages, most recent first.
    ///
    /// Mailbox errors abort the run; anything that goes wrong with a single
    /// message or attachment is logged and skipped.
    pub fn collect(
        &self,
        mailbox: &mut dyn Mailbox,
        limit: usize,
    ) -> crate::error::Result<RunReport> {
        let messages = mailbox::fetch_recent(mailbox, limit)?;
        let mut report = RunReport::default();

        for (i, fetched) in messages.iter().enumerate() {
            let span = info_span!("email", n = i + 1, seq = fetched.seq);
            let _guard = span.enter();

            let msg = match message_processor::parse_message(&fetched.raw) {
                Ok(m) => m,
                Err(e) => {
                    error!(error = %e, "Could not parse message, skipped");
                    report.message_failures += 1;
                    continue;
                }
            };
            report.messages_processed += 1;
            info!(subject = %msg.subject, from = %msg.sender, date = %msg.date, "Processing email");

            if msg.attachments.is_empty() {
                info!("No attachments found");
            }

            for attachment in &msg.attachments {
                if let Some(dir) = &self.scratch_dir {
                    if let Err(e) = message_processor::save_attachment(dir, attachment) {
                        warn!(error = %e, filename = %attachment.filename, "Could not save attachment");
                    }
                }

                match self.process_attachment(&msg, attachment) {
                    AttachmentOutcome::Matched(reading) => {
                        report.pdfs_seen += 1;
                        report.readings.push(reading);
                    }
                    AttachmentOutcome::NoMatch => report.pdfs_seen += 1,
                    AttachmentOutcome::Failed(reason) => {
                        debug!(filename = %attachment.filename, reason = %reason, "Attachment skipped");
                        report.pdfs_seen += 1;
                        report.failures += 1;
                    }
                    AttachmentOutcome::Skipped => {}
                }
            }
        }

        info!(
            messages = report.messages_processed,
            pdfs = report.pdfs_seen,
            readings = report.readings.len(),
            failures = report.failures,
            unparsed_messages = report.message_failures,
            "Run complete"
        );
        Ok(report)
    }

    pub fn process_attachment(&self, msg: &ParsedMessage, attachment: &Attachment) -> AttachmentOutcome {
        if !attachment.is_pdf() {
            return AttachmentOutcome::Skipped;
        }
        let span = info_span!("pdf", filename = %attachment.filename);
        let _guard = span.enter();

        let pages = match self.extractor.page_texts(&attachment.data) {
            Ok(pages) => pages,
            Err(e) => {
                error!(error = %e, "Error processing PDF");
                return AttachmentOutcome::Failed(e.to_string());
            }
        };

        match heuristics::parse_pages(&pages) {
            Some(fragment) => {
                info!(
                    utility = ?fragment.utility_type,
                    value = %fragment.raw_value,
                    unit = fragment.utility_type.unit(),
                    numeric = fragment.numeric_value,
                    invoice_date = ?fragment.invoice_date.map(|d| d.to_string()),
                    "Consumption found"
                );
                AttachmentOutcome::Matched(Reading {
                    fragment,
                    source_filename: attachment.filename.clone(),
                    email_subject: msg.subject.clone(),
                    email_sender: msg.sender.clone(),
                    email_date: msg.date.clone(),
                })
            }
            None => {
                info!(pages = pages.len(), "No consumption value found in PDF");
                AttachmentOutcome::NoMatch
            }
        }
    }
}

/// Hand the batch to the sink. With no sink configured the batch is dropped.
///
/// Returns the number of rows written.
pub async fn persist(
    sink: Option<&mut (dyn ConsumptionSink + '_)>,
    facility_id: i64,
    readings: &[Reading],
) -> usize {
    if readings.is_empty() {
        return 0;
    }
    let Some(sink) = sink else {
        warn!(readings = readings.len(), "No store configured, readings not saved");
        return 0;
    };
    info!(readings = readings.len(), "Saving readings");
    sink::insert_batch(sink, facility_id, readings).await
}

/// Console summary of what a run found.
pub fn print_summary(report: &RunReport) {
    if report.readings.is_empty() {
        println!("\nNo consumption values found in any PDFs");
    } else {
        println!("\nCONSUMPTION SUMMARY:");
        println!("{}", "=".repeat(60));
    }
    for (i, r) in report.readings.iter().enumerate() {
        let f = &r.fragment;
        println!("\nResult #{}:", i + 1);
        println!("  Email: {}", r.email_subject);
        println!("  PDF: {}", r.source_filename);
        let label = match f.utility_type {
            UtilityType::Water => "Water",
            UtilityType::Electricity => "Electricity",
            UtilityType::Unknown => "Consumption",
        };
        println!("  {label}: {} {}", f.raw_value, f.utility_type.unit());
        println!("  Numeric: {}", f.numeric_value);
        if let Some(date) = f.invoice_date {
            let note = if f.month_defaulted { " (month assumed)" } else { "" };
            println!("  Invoice Date: {date}{note}");
        }
    }
    println!("\n{}", summary_line(report));
}

fn summary_line(report: &RunReport) -> String {
    let count = |kind: UtilityType| {
        report
            .readings
            .iter()
            .filter(|r| r.fragment.utility_type == kind)
            .count()
    };
    format!(
        "Processed {} emails: {} water, {} electricity, {} failed PDFs, {} unreadable emails",
        report.messages_processed,
        count(UtilityType::Water),
        count(UtilityType::Electricity),
        report.failures,
        report.message_failures,
    )
}
