//! Fake IMAP server for integration testing
//!
//! This module provides an in-process IMAP server that speaks enough
//! of the protocol to test the harvester end-to-end:
//!
//! TCP -> TLS (implicit, or after STARTTLS) -> greeting -> LOGIN ->
//! EXAMINE -> SEARCH -> FETCH ... -> LOGOUT
//!
//! ## Module layout
//!
//! - `server` -- TCP listener, TLS setup, and connection dispatch
//! - `handlers/` -- one file per IMAP command (EXAMINE, SEARCH, etc.)
//! - `mailbox` -- test data model (folders, emails, builder)
//! - `io` -- shared write helpers


pub use mailbox::MailboxBuilder;
pub use server::{FakeImapServer, Security};
