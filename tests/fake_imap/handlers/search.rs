//! SEARCH command handler.
//!
//! Matches emails against parsed `SearchKey` criteria from imap-types
//! and answers with sequence numbers (this is plain SEARCH, not UID
//! SEARCH). We support:
//!
//! - `All` -- every message in the opened folder
//! - `Since(date)` -- messages whose Date header is >= date
//! - `Before(date)` -- messages whose Date header is < date
//! - `And`, `Or`, `Not` -- logical combinators
//!
//! Any other key (FROM, SUBJECT, ...) matches everything.
//!
//! The response format (RFC 3501 Section 7.2.5):
//!
//! ```text
//! * SEARCH 1 2 3
//! A0003 OK SEARCH completed
//! ```

use crate::fake_imap::io::write_line;
use crate::fake_imap::mailbox::{Mailbox, TestEmail};
use chrono::NaiveDate;
use imap_codec::imap_types::search::SearchKey;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Handle the SEARCH command. Returns matching sequence numbers from
/// the opened folder.
pub async fn handle_search<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    criteria: &[SearchKey<'_>],
    mailbox: &Mailbox,
    selected_folder: Option<&str>,
    stream: &mut BufReader<S>,
) {
    let Some(folder_name) = selected_folder else {
        let resp = format!("{tag} BAD No folder selected\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };

    let Some(folder) = mailbox.get_folder(folder_name) else {
        let resp = format!("{tag} BAD Folder not found\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };

    let mut search_line = String::from("* SEARCH");
    for (idx, _) in folder
        .emails
        .iter()
        .enumerate()
        .filter(|(_, e)| criteria.iter().all(|key| matches_key(e, key)))
    {
        search_line.push_str(&format!(" {}", idx + 1));
    }
    search_line.push_str("\r\n");
    let _ = write_line(stream, &search_line).await;
    let resp = format!("{tag} OK SEARCH completed\r\n");
    let _ = write_line(stream, &resp).await;
}

/// Check if a test email matches a single `SearchKey`.
fn matches_key(email: &TestEmail, key: &SearchKey<'_>) -> bool {
    match key {
        SearchKey::Since(date) => parse_email_date(&email.raw).is_some_and(|d| d >= *date.as_ref()),
        SearchKey::Before(date) => parse_email_date(&email.raw).is_some_and(|d| d < *date.as_ref()),
        SearchKey::And(keys) => keys.as_ref().iter().all(|k| matches_key(email, k)),
        SearchKey::Or(a, b) => matches_key(email, a) || matches_key(email, b),
        SearchKey::Not(k) => !matches_key(email, k),
        _ => true,
    }
}

/// Extract the `Date:` header from raw RFC 2822 email bytes and parse
/// it into a `NaiveDate`.
fn parse_email_date(raw: &[u8]) -> Option<NaiveDate> {
    let text = String::from_utf8_lossy(raw);
    let value = text
        .lines()
        .take_while(|line| !line.is_empty())
        .find_map(|line| line.strip_prefix("Date:"))?;
    chrono::DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::mailbox::MailboxBuilder;
    use imap_codec::imap_types::datetime::NaiveDate as ImapDate;
    use tokio::io::BufReader;

    fn make_dated_email(date: &str) -> Vec<u8> {
        format!(
            "From: a@b.com\r\n\
             Date: {date}\r\n\
             Subject: Test\r\n\
             \r\n\
             Body"
        )
        .into_bytes()
    }

    async fn run(
        tag: &str,
        criteria: &[SearchKey<'_>],
        mailbox: &Mailbox,
        selected: Option<&str>,
    ) -> String {
        let (client, server) = tokio::io::duplex(4096);
        let mut stream = BufReader::new(server);

        handle_search(tag, criteria, mailbox, selected, &mut stream).await;
        drop(stream);

        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut BufReader::new(client), &mut buf)
            .await
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> ImapDate {
        ImapDate::unvalidated(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[tokio::test]
    async fn search_all_returns_sequence_numbers() {
        let raw = make_dated_email("Mon, 01 Jan 2024 10:00:00 +0000");
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .email(&raw)
            .email(&raw)
            .email(&raw)
            .build();

        let output = run("A1", &[SearchKey::All], &mailbox, Some("INBOX")).await;

        assert!(output.contains("* SEARCH 1 2 3\r\n"));
        assert!(output.contains("A1 OK SEARCH completed"));
    }

    #[tokio::test]
    async fn no_folder_selected_returns_bad() {
        let mailbox = MailboxBuilder::new().folder("INBOX").build();

        let output = run("A1", &[SearchKey::All], &mailbox, None).await;

        assert!(output.contains("A1 BAD No folder selected"));
    }

    #[tokio::test]
    async fn empty_folder_returns_empty_search() {
        let mailbox = MailboxBuilder::new().folder("INBOX").build();

        let output = run("A1", &[SearchKey::All], &mailbox, Some("INBOX")).await;

        assert!(output.contains("* SEARCH\r\n"));
    }

    #[tokio::test]
    async fn since_excludes_older_and_keeps_same_day() {
        let nov20 = make_dated_email("Wed, 20 Nov 2024 09:00:00 +0000");
        let nov24 = make_dated_email("Sun, 24 Nov 2024 23:59:00 +0000");
        let nov25 = make_dated_email("Mon, 25 Nov 2024 08:00:00 +0000");

        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .email(&nov20)
            .email(&nov24)
            .email(&nov25)
            .build();

        let output = run(
            "A1",
            &[SearchKey::Since(date(2024, 11, 24))],
            &mailbox,
            Some("INBOX"),
        )
        .await;

        assert!(output.contains("* SEARCH 2 3\r\n"));
    }

    #[tokio::test]
    async fn before_is_exclusive() {
        let exact = make_dated_email("Wed, 10 Jan 2024 10:00:00 +0000");

        let mailbox = MailboxBuilder::new().folder("INBOX").email(&exact).build();

        let output = run(
            "A1",
            &[SearchKey::Before(date(2024, 1, 10))],
            &mailbox,
            Some("INBOX"),
        )
        .await;

        assert!(output.contains("* SEARCH\r\n"));
    }

    #[test]
    fn parse_email_date_ignores_body() {
        let raw = b"From: a@b.com\r\n\r\nDate: Mon, 01 Jan 2024 12:00:00 +0000";
        assert!(parse_email_date(raw).is_none());
    }

    #[test]
    fn parse_email_date_reads_header() {
        let raw = make_dated_email("Mon, 01 Jan 2024 12:00:00 +0000");
        assert_eq!(
            parse_email_date(&raw),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
    }
}
