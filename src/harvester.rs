//! Attachment harvester
//!
//! Runs one harvest as a straight line of awaited stages:
//!
//! ```text
//! Idle -> Connecting -> InboxOpen -> Searching -> Fetching -> Closing -> Ended
//!                       (any fatal error)  ------------------------->  Aborted
//! ```
//!
//! Message bodies are fetched one at a time over the single IMAP
//! session. Parsing and saving happen on a `JoinSet` gated by a
//! semaphore, and every task is joined before the session is closed.

use crate::attachment::{AttachmentFilter, extract_attachments};
use crate::config::{HarvestOptions, ImapConfig};
use crate::connection::{self, ImapSession};
use crate::error::{Error, Result};
use crate::store::{AttachmentStore, SaveOutcome};
use crate::summary::{MessageReport, Summary};
use futures::StreamExt;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Connecting,
    InboxOpen,
    Searching,
    Fetching,
    Closing,
    Ended,
    Aborted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::InboxOpen => "mailbox open",
            Self::Searching => "searching",
            Self::Fetching => "fetching",
            Self::Closing => "closing",
            Self::Ended => "ended",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

fn enter(stage: Stage) {
    debug!("Harvest stage: {}", stage);
}

type TaskOutput = (u32, Result<MessageReport>);

/// Downloads whitelisted attachments from one mailbox
pub struct Harvester {
    config: ImapConfig,
    options: HarvestOptions,
}

impl Harvester {
    #[must_use]
    pub const fn new(config: ImapConfig, options: HarvestOptions) -> Self {
        Self { config, options }
    }

    #[must_use]
    pub const fn options(&self) -> &HarvestOptions {
        &self.options
    }

    /// Run a full harvest and report what was done
    ///
    /// Messages that cannot be fetched or parsed are counted in
    /// [`Summary::messages_failed`] and skipped, unless
    /// [`HarvestOptions::fail_fast`] is set.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error: configuration, connection, TLS,
    /// mailbox, search, filesystem, or (in fail-fast mode) a fetch or
    /// parse failure or a crashed message worker.
    pub async fn run(&self) -> Result<Summary> {
        let result = self.run_stages().await;
        enter(if result.is_ok() {
            Stage::Ended
        } else {
            Stage::Aborted
        });
        result
    }

    async fn run_stages(&self) -> Result<Summary> {
        let store = Arc::new(AttachmentStore::open(&self.options.output_dir).await?);

        enter(Stage::Connecting);
        let mut session = connection::connect(&self.config).await?;

        let result = self.harvest(&mut session, store).await;

        enter(Stage::Closing);
        session.logout().await.ok();
        info!("Connection ended");

        result
    }

    async fn harvest(
        &self,
        session: &mut ImapSession,
        store: Arc<AttachmentStore>,
    ) -> Result<Summary> {
        connection::examine(session, &self.options.mailbox).await?;
        enter(Stage::InboxOpen);

        enter(Stage::Searching);
        let seqs = self.search(session).await?;
        let mut summary = Summary {
            messages_found: seqs.len(),
            ..Summary::default()
        };
        if seqs.is_empty() {
            return Ok(summary);
        }

        enter(Stage::Fetching);
        let filter = Arc::new(self.options.attachments.clone());
        let permits = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut tasks: JoinSet<TaskOutput> = JoinSet::new();

        // Dropping `tasks` on an early return aborts whatever is still
        // running.
        for seq in seqs {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };

            match fetch_raw(session, seq).await {
                Ok(raw) => {
                    let store = Arc::clone(&store);
                    let filter = Arc::clone(&filter);
                    tasks.spawn(async move {
                        let outcome = process_message(seq, &raw, &store, &filter).await;
                        drop(permit);
                        (seq, outcome)
                    });
                }
                Err(e) => self.settle(&mut summary, seq, Err(e))?,
            }

            while let Some(joined) = tasks.try_join_next() {
                self.settle_joined(&mut summary, joined)?;
            }
        }

        while let Some(joined) = tasks.join_next().await {
            self.settle_joined(&mut summary, joined)?;
        }

        info!(
            "Scanned {} of {} messages: {} saved, {} duplicate, {} unsupported, {} failed",
            summary.messages_scanned,
            summary.messages_found,
            summary.attachments_saved,
            summary.skipped_duplicate,
            summary.skipped_unsupported,
            summary.messages_failed
        );
        Ok(summary)
    }

    async fn search(&self, session: &mut ImapSession) -> Result<Vec<u32>> {
        let query = self.options.filter.to_imap_query();
        let found = session
            .search(&query)
            .await
            .map_err(|e| Error::Search(format!("Search '{query}' failed: {e}")))?;

        let mut seqs: Vec<u32> = found.into_iter().collect();
        seqs.sort_unstable();

        if let Some(limit) = self.options.limit {
            let start = seqs.len().saturating_sub(limit);
            seqs.drain(..start);
        }

        info!("Found {} messages matching '{}'", seqs.len(), query);
        Ok(seqs)
    }

    /// Fold one message outcome into the summary. Per-message failures
    /// are absorbed unless running fail-fast.
    fn settle(
        &self,
        summary: &mut Summary,
        seq: u32,
        outcome: Result<MessageReport>,
    ) -> Result<()> {
        match outcome {
            Ok(report) => {
                *summary += report;
                Ok(())
            }
            Err(e) if e.is_per_message() && !self.options.fail_fast => {
                warn!("Skipping message {}: {}", seq, e);
                summary.messages_failed += 1;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn settle_joined(
        &self,
        summary: &mut Summary,
        joined: std::result::Result<TaskOutput, JoinError>,
    ) -> Result<()> {
        match joined {
            Ok((seq, outcome)) => self.settle(summary, seq, outcome),
            Err(e) => {
                let err = Error::Worker(e.to_string());
                if self.options.fail_fast {
                    return Err(err);
                }
                warn!("{}", err);
                summary.messages_failed += 1;
                Ok(())
            }
        }
    }
}

/// Fetch the full raw body of one message without setting `\Seen`.
async fn fetch_raw(session: &mut ImapSession, seq: u32) -> Result<Vec<u8>> {
    let mut messages = session
        .fetch(seq.to_string(), "BODY.PEEK[]")
        .await
        .map_err(|e| Error::Fetch(format!("Fetch of message {seq} failed: {e}")))?;

    let mut body = None;
    while let Some(item) = messages.next().await {
        let fetched = item.map_err(|e| Error::Fetch(format!("Fetch of message {seq} failed: {e}")))?;
        if body.is_none() {
            body = fetched.body().map(<[u8]>::to_vec);
        }
    }

    body.ok_or_else(|| Error::Fetch(format!("No body found for message {seq}")))
}

/// Parse one message and save its supported attachments.
async fn process_message(
    seq: u32,
    raw: &[u8],
    store: &AttachmentStore,
    filter: &AttachmentFilter,
) -> Result<MessageReport> {
    let attachments = extract_attachments(seq, raw)?;
    let mut report = MessageReport::default();

    if attachments.is_empty() {
        info!("No attachments found in message {}", seq);
        return Ok(report);
    }

    info!("Saving attachments from message {}", seq);
    for (index, attachment) in attachments.iter().enumerate() {
        if !filter.is_supported(attachment) {
            info!(
                "Skipped unsupported attachment: {}",
                attachment.filename.as_deref().unwrap_or("<unnamed>")
            );
            report.skipped_unsupported += 1;
            continue;
        }

        let filename = attachment.target_filename(seq, index);
        match store.save(&filename, &attachment.content).await? {
            SaveOutcome::Saved(path) => {
                info!("Saved supported attachment: {}", path.display());
                report.saved += 1;
            }
            SaveOutcome::Duplicate => {
                info!("Skipped duplicate attachment: {}", filename);
                report.skipped_duplicate += 1;
            }
        }
    }

    Ok(report)
}
