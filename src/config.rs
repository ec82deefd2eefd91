//! Mail session and harvest configuration

use crate::attachment::AttachmentFilter;
use crate::error::{Error, Result};
use crate::search::{SearchFilter, parse_date};
use std::env;
use std::path::PathBuf;

/// IMAP connection configuration
#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// `true` for TLS from the first byte (IMAPS), `false` to upgrade
    /// a plain connection with STARTTLS.
    pub tls: bool,
    /// Skip server certificate validation (self-signed servers).
    pub accept_invalid_certs: bool,
}

impl ImapConfig {
    /// Load IMAP configuration from environment variables
    ///
    /// Reads from `.env` file if present. Required variables:
    /// - `IMAP_HOST`
    /// - `IMAP_USERNAME`
    /// - `IMAP_PASSWORD`
    ///
    /// Optional (with defaults):
    /// - `IMAP_PORT` (default: `993`)
    /// - `IMAP_TLS` (default: `true`)
    /// - `IMAP_ACCEPT_INVALID_CERTS` (default: `false`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing or
    /// a value cannot be parsed.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`ImapConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            host: required(&lookup, "IMAP_HOST")?,
            port: lookup("IMAP_PORT")
                .unwrap_or_else(|| "993".to_string())
                .parse()
                .map_err(|e| Error::Config(format!("Invalid IMAP_PORT: {e}")))?,
            username: required(&lookup, "IMAP_USERNAME")?,
            password: required(&lookup, "IMAP_PASSWORD")?,
            tls: flag(&lookup, "IMAP_TLS", true)?,
            accept_invalid_certs: flag(&lookup, "IMAP_ACCEPT_INVALID_CERTS", false)?,
        })
    }
}

/// What to harvest and where to put it
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    /// Mailbox opened read-only.
    pub mailbox: String,
    pub filter: SearchFilter,
    pub output_dir: PathBuf,
    /// Only the most recent N matching messages, if set.
    pub limit: Option<usize>,
    /// Messages parsed and saved at the same time.
    pub concurrency: usize,
    pub attachments: AttachmentFilter,
    /// Abort on the first message that cannot be fetched or parsed.
    pub fail_fast: bool,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            mailbox: "INBOX".to_string(),
            filter: SearchFilter::all(),
            output_dir: PathBuf::from("./attachments"),
            limit: None,
            concurrency: 4,
            attachments: AttachmentFilter::default(),
            fail_fast: false,
        }
    }
}

impl HarvestOptions {
    /// Load harvest options from environment variables
    ///
    /// Reads from `.env` file if present. All variables are optional:
    /// - `HARVEST_DIR` (default: `./attachments`)
    /// - `HARVEST_MAILBOX` (default: `INBOX`)
    /// - `HARVEST_SINCE`, e.g. `Nov 24, 2024` or `2024-11-24`
    /// - `HARVEST_FROM`, a sender address or fragment
    /// - `HARVEST_CONCURRENCY` (default: `4`)
    /// - `HARVEST_EXTENSIONS`, comma separated, replaces the whitelist
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a value cannot be parsed.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the options from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`HarvestOptions::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut options = Self::default();

        if let Some(dir) = lookup("HARVEST_DIR") {
            options.output_dir = PathBuf::from(dir);
        }
        if let Some(mailbox) = lookup("HARVEST_MAILBOX") {
            options.mailbox = mailbox;
        }
        if let Some(since) = lookup("HARVEST_SINCE") {
            let date = parse_date(&since)
                .map_err(|_| Error::Config(format!("Invalid HARVEST_SINCE: '{since}'")))?;
            options.filter = SearchFilter::since(date);
        }
        if let Some(from) = lookup("HARVEST_FROM") {
            options.filter = options.filter.from_sender(from);
        }
        if let Some(n) = lookup("HARVEST_CONCURRENCY") {
            options.concurrency = n
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    Error::Config(format!(
                        "Invalid HARVEST_CONCURRENCY '{n}': expected a positive integer"
                    ))
                })?;
        }
        if let Some(exts) = lookup("HARVEST_EXTENSIONS") {
            let filter = AttachmentFilter::new(exts.split(','));
            if filter.is_empty() {
                return Err(Error::Config(format!(
                    "Invalid HARVEST_EXTENSIONS '{exts}': expected at least one extension"
                )));
            }
            options.attachments = filter;
        }

        Ok(options)
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key).ok_or_else(|| Error::Config(format!("{key} not set")))
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> Result<bool> {
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("Invalid {key}: '{other}'"))),
    }
}
