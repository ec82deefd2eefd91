//! Email attachment harvester
//!
//! Connects to an IMAP server over TLS, opens a mailbox read-only,
//! searches it (everything, or everything since a date) and saves
//! attachments whose filename extension is on a whitelist into a
//! local directory. Attachments whose filename already exists there
//! are skipped.
//!
//! ```no_run
//! use attachment_harvester::{HarvestOptions, Harvester, ImapConfig};
//!
//! # async fn run() -> attachment_harvester::Result<()> {
//! let harvester = Harvester::new(ImapConfig::from_env()?, HarvestOptions::from_env()?);
//! let summary = harvester.run().await?;
//! println!("{} attachments saved", summary.attachments_saved);
//! # Ok(())
//! # }
//! ```

mod attachment;
mod config;
mod connection;
mod error;
mod harvester;
mod search;
mod store;
mod summary;

pub use attachment::{Attachment, AttachmentFilter, SUPPORTED_EXTENSIONS, extract_attachments};
pub use config::{HarvestOptions, ImapConfig};
pub use error::{Error, Result};
pub use harvester::Harvester;
pub use search::{SearchFilter, parse_date};
pub use store::{AttachmentStore, SaveOutcome};
pub use summary::{MessageReport, Summary};
