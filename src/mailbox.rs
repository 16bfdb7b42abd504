use native_tls::TlsStream;
use std::net::TcpStream;
use tracing::{info, info_span, warn};

use crate::config::{Credentials, MailboxConfig};
use crate::error::{Error, Result};

/// One message as fetched from the server.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    /// Mailbox sequence number.
    pub seq: u32,
    /// Full RFC 822 payload.
    pub raw: Vec<u8>,
}

/// The two mailbox operations a run needs.
pub trait Mailbox {
    /// Every message id in the selected folder, in any order.
    fn message_ids(&mut self) -> Result<Vec<u32>>;
    /// Full RFC 822 payload of one message.
    fn fetch(&mut self, id: u32) -> Result<Vec<u8>>;
}

/// Keep the `limit` highest ids and return them newest first.
pub fn select_recent(mut ids: Vec<u32>, limit: usize) -> Vec<u32> {
    ids.sort_unstable();
    let keep = ids.len().saturating_sub(limit);
    let mut recent = ids.split_off(keep);
    recent.reverse();
    recent
}

/// Fetch the `limit` most recent messages, most recent first.
///
/// Any mailbox error aborts the whole fetch.
pub fn fetch_recent(mailbox: &mut dyn Mailbox, limit: usize) -> Result<Vec<FetchedMessage>> {
    let ids = mailbox.message_ids()?;
    info!(total = ids.len(), "Messages in folder");

    let recent = select_recent(ids, limit);
    let mut messages = Vec::with_capacity(recent.len());
    for seq in recent {
        let span = info_span!("fetch", seq);
        let _guard = span.enter();

        let raw = mailbox.fetch(seq)?;
        info!(bytes = raw.len(), "Fetched message");
        messages.push(FetchedMessage { seq, raw });
    }
    Ok(messages)
}

// ---------------------------------------------------------------------------
// IMAP over TLS
// ---------------------------------------------------------------------------

/// A logged-in IMAP session with the configured folder selected.
///
/// The session is logged out when this value is dropped.
pub struct ImapMailbox {
    session: imap::Session<TlsStream<TcpStream>>,
}

impl ImapMailbox {
    pub fn connect(cfg: &MailboxConfig, creds: &Credentials) -> Result<Self> {
        let tls = native_tls::TlsConnector::builder()
            .build()
            .map_err(|e| Error::Mailbox(format!("build TLS connector: {e}")))?;

        info!(host = %cfg.host, port = cfg.port, user = %creds.user, "Connecting to IMAP");
        let client = imap::connect((cfg.host.as_str(), cfg.port), cfg.host.as_str(), &tls)
            .map_err(|e| Error::Mailbox(format!("connect {}:{}: {e}", cfg.host, cfg.port)))?;

        let mut session = client
            .login(&creds.user, &creds.password)
            .map_err(|(e, _client)| Error::Mailbox(format!("login: {e}")))?;

        let mailbox = session
            .select(&cfg.folder)
            .map_err(|e| Error::Mailbox(format!("select folder {}: {e}", cfg.folder)))?;
        info!(folder = %cfg.folder, exists = mailbox.exists, "Folder selected");

        Ok(Self { session })
    }
}

impl Mailbox for ImapMailbox {
    fn message_ids(&mut self) -> Result<Vec<u32>> {
        let ids = self.session.search("ALL")?;
        Ok(ids.into_iter().collect())
    }

    fn fetch(&mut self, id: u32) -> Result<Vec<u8>> {
        let fetches = self.session.fetch(id.to_string(), "RFC822")?;
        fetches
            .iter()
            .find_map(|f| f.body())
            .map(<[u8]>::to_vec)
            .ok_or_else(|| Error::Mailbox(format!("message {id} has no body")))
    }
}

impl Drop for ImapMailbox {
    fn drop(&mut self) {
        match self.session.logout() {
            Ok(()) => info!("IMAP session logged out"),
            Err(e) => warn!(error = %e, "IMAP logout failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeMailbox {
        messages: HashMap<u32, Vec<u8>>,
        fetched: Vec<u32>,
    }

    impl FakeMailbox {
        fn with_count(n: u32) -> Self {
            Self {
                messages: (1..=n).map(|i| (i, format!("msg {i}").into_bytes())).collect(),
                fetched: Vec::new(),
            }
        }
    }

    impl Mailbox for FakeMailbox {
        fn message_ids(&mut self) -> Result<Vec<u32>> {
            Ok(self.messages.keys().copied().collect())
        }

        fn fetch(&mut self, id: u32) -> Result<Vec<u8>> {
            self.fetched.push(id);
            self.messages
                .get(&id)
                .cloned()
                .ok_or_else(|| Error::Mailbox(format!("no message {id}")))
        }
    }

    #[test]
    fn test_select_recent_newest_first() {
        assert_eq!(select_recent(vec![4, 1, 5, 2, 3], 3), vec![5, 4, 3]);
    }

    #[test]
    fn test_select_recent_fewer_than_limit() {
        assert_eq!(select_recent(vec![2, 1], 3), vec![2, 1]);
        assert!(select_recent(vec![], 3).is_empty());
    }

    #[test]
    fn test_fetch_recent_five_messages() {
        let mut mb = FakeMailbox::with_count(5);
        let msgs = fetch_recent(&mut mb, 3).unwrap();
        let seqs: Vec<u32> = msgs.iter().map(|m| m.seq).collect();
        assert_eq!(seqs, vec![5, 4, 3]);
        assert_eq!(msgs[0].raw, b"msg 5");
        assert_eq!(mb.fetched, vec![5, 4, 3]);
    }

    #[test]
    fn test_fetch_error_aborts() {
        struct Broken;
        impl Mailbox for Broken {
            fn message_ids(&mut self) -> Result<Vec<u32>> {
                Ok(vec![1, 2])
            }
            fn fetch(&mut self, id: u32) -> Result<Vec<u8>> {
                Err(Error::Mailbox(format!("connection reset fetching {id}")))
            }
        }
        assert!(matches!(fetch_recent(&mut Broken, 3), Err(Error::Mailbox(_))));
    }
}
