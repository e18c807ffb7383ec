use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;

use async_imap::imap_proto::types::SectionPath;
use async_imap::types::{Fetch, Flag};
use async_imap::Session;
use async_trait::async_trait;
use futures::TryStreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;

use shared::models::EmailMessage;

use super::mime::{decode_transfer, MimePart};
use super::{parse, Attachment, ImapSettings, MailError, MailFetcher};
use crate::config::AppConfig;

/// Byte stream an IMAP client can run over, TLS or plain TCP
trait ImapTransport: AsyncRead + AsyncWrite + Unpin + Send + Debug {}

impl<T> ImapTransport for T where T: AsyncRead + AsyncWrite + Unpin + Send + Debug {}

type ImapSession = Session<Box<dyn ImapTransport>>;

const INBOX: &str = "INBOX";

/// [`MailFetcher`] that talks to the account's IMAP server
#[derive(Debug, Clone)]
pub struct ImapFetcher {
    connect_timeout: Duration,
    auth_timeout: Duration,
    accept_invalid_certs: bool,
}

impl ImapFetcher {
    pub fn new(connect_timeout: Duration, auth_timeout: Duration, accept_invalid_certs: bool) -> Self {
        Self {
            connect_timeout,
            auth_timeout,
            accept_invalid_certs,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.imap_connect_timeout(),
            config.imap_auth_timeout(),
            config.imap_accept_invalid_certs,
        )
    }

    async fn open(&self, settings: &ImapSettings) -> Result<MailSession, MailError> {
        tracing::debug!(
            host = %settings.host,
            port = settings.port,
            tls = settings.tls,
            "Connecting to IMAP server"
        );

        let tcp = timeout(
            self.connect_timeout,
            TcpStream::connect((settings.host.as_str(), settings.port)),
        )
        .await
        .map_err(|_| MailError::Connect(format!("timed out connecting to {}", settings.host)))?
        .map_err(|e| MailError::Connect(format!("TCP connection failed: {}", e)))?;

        let stream: Box<dyn ImapTransport> = if settings.tls {
            let connector = async_native_tls::TlsConnector::new()
                .danger_accept_invalid_certs(self.accept_invalid_certs);
            let tls = timeout(self.connect_timeout, connector.connect(&settings.host, tcp))
                .await
                .map_err(|_| MailError::Connect("timed out during TLS handshake".to_string()))?
                .map_err(|e| MailError::Connect(format!("TLS handshake failed: {}", e)))?;
            Box::new(tls)
        } else {
            Box::new(tcp)
        };

        let client = async_imap::Client::new(stream);
        let session = timeout(
            self.auth_timeout,
            client.login(&settings.username, &settings.password),
        )
        .await
        .map_err(|_| MailError::Connect("timed out during login".to_string()))?
        .map_err(|(e, _)| MailError::Connect(format!("Login failed: {}", e)))?;

        tracing::debug!(user = %settings.username, "IMAP session established");
        Ok(MailSession { session })
    }
}

/// One logged-in connection. Callers must finish with [`MailSession::close`].
struct MailSession {
    session: ImapSession,
}

impl MailSession {
    async fn select_inbox(&mut self) -> Result<(), MailError> {
        let mailbox = self
            .session
            .select(INBOX)
            .await
            .map_err(|e| MailError::MailboxUnavailable(e.to_string()))?;

        tracing::debug!(exists = mailbox.exists, "Opened INBOX");
        Ok(())
    }

    async fn search(&mut self, query: &str) -> Result<Vec<u32>, MailError> {
        let uids = self
            .session
            .uid_search(query)
            .await
            .map_err(|e| MailError::Search(e.to_string()))?;

        Ok(uids.into_iter().collect())
    }

    /// Fail with `MessageNotFound` unless `uid` exists in the selected mailbox
    async fn require_uid(&mut self, uid: u32) -> Result<(), MailError> {
        let found = self.search(&format!("UID {}", uid)).await?;
        if found.contains(&uid) {
            Ok(())
        } else {
            Err(MailError::MessageNotFound)
        }
    }

    async fn fetch(&mut self, uid_set: &str, query: &str) -> Result<Vec<Fetch>, MailError> {
        let stream = self
            .session
            .uid_fetch(uid_set, query)
            .await
            .map_err(|e| MailError::Fetch(e.to_string()))?;

        stream
            .try_collect()
            .await
            .map_err(|e| MailError::Fetch(e.to_string()))
    }

    async fn close(mut self) {
        if let Err(e) = self.session.logout().await {
            tracing::warn!("IMAP logout failed: {}", e);
        }
    }

    async fn list_recent(&mut self, limit: usize, offset: usize) -> Result<Vec<EmailMessage>, MailError> {
        self.select_inbox().await?;

        let uids = page_uids(self.search("ALL").await?, limit, offset);
        if uids.is_empty() {
            return Ok(Vec::new());
        }

        let uid_set = uids
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let fetches = self
            .fetch(&uid_set, "(UID FLAGS RFC822.SIZE BODY.PEEK[])")
            .await?;

        let mut by_uid: HashMap<u32, EmailMessage> = HashMap::new();
        for fetch in &fetches {
            let (Some(uid), Some(body)) = (fetch.uid, fetch.body()) else {
                continue;
            };
            match parse::parse_message(uid, body, flag_names(fetch)) {
                Ok(message) => {
                    by_uid.insert(uid, message);
                }
                Err(e) => tracing::warn!(uid, "Skipping unparseable message: {}", e),
            }
        }

        Ok(uids.iter().filter_map(|uid| by_uid.remove(uid)).collect())
    }

    async fn fetch_detail(&mut self, uid: u32) -> Result<EmailMessage, MailError> {
        self.select_inbox().await?;
        self.require_uid(uid).await?;

        let fetches = self
            .fetch(&uid.to_string(), "(UID FLAGS BODY.PEEK[])")
            .await?;
        let fetch = fetches
            .iter()
            .find(|f| f.body().is_some())
            .ok_or(MailError::MessageNotFound)?;

        parse::parse_message(uid, fetch.body().unwrap_or_default(), flag_names(fetch))
    }

    async fn fetch_attachment(&mut self, uid: u32, part_id: &str) -> Result<Attachment, MailError> {
        self.select_inbox().await?;
        self.require_uid(uid).await?;

        let structures = self.fetch(&uid.to_string(), "(UID BODYSTRUCTURE)").await?;
        let tree = structures
            .iter()
            .find_map(|f| f.bodystructure())
            .map(MimePart::from_body_structure)
            .ok_or_else(|| MailError::Fetch("server returned no BODYSTRUCTURE".to_string()))?;

        let part = tree
            .find_attachment(part_id)
            .cloned()
            .ok_or(MailError::PartNotFound)?;
        tracing::debug!(uid, part_id, content_type = %part.content_type, "Fetching attachment");

        let section = section_path(part_id).ok_or(MailError::PartNotFound)?;
        let bodies = self
            .fetch(&uid.to_string(), &format!("(UID BODY.PEEK[{}])", part_id))
            .await?;
        let raw = bodies
            .iter()
            .find_map(|f| f.section(&section))
            .filter(|raw| !raw.is_empty())
            .ok_or(MailError::EmptyPart)?;

        let bytes = decode_transfer(raw, &part.encoding).map_err(|e| MailError::Parse(e.to_string()))?;

        Ok(Attachment {
            bytes,
            content_type: part.content_type,
            filename: part.filename.unwrap_or_else(|| "attachment".to_string()),
        })
    }
}

#[async_trait]
impl MailFetcher for ImapFetcher {
    async fn list_recent(
        &self,
        settings: &ImapSettings,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<EmailMessage>, MailError> {
        let mut session = self.open(settings).await?;
        let result = session.list_recent(limit, offset).await;
        session.close().await;
        result
    }

    async fn fetch_detail(&self, settings: &ImapSettings, uid: u32) -> Result<EmailMessage, MailError> {
        let mut session = self.open(settings).await?;
        let result = session.fetch_detail(uid).await;
        session.close().await;
        result
    }

    async fn fetch_attachment(
        &self,
        settings: &ImapSettings,
        uid: u32,
        part_id: &str,
    ) -> Result<Attachment, MailError> {
        let mut session = self.open(settings).await?;
        let result = session.fetch_attachment(uid, part_id).await;
        session.close().await;
        result
    }
}

/// Newest first: sort descending, then take `offset..offset + limit`.
fn page_uids(mut uids: Vec<u32>, limit: usize, offset: usize) -> Vec<u32> {
    uids.sort_unstable_by(|a, b| b.cmp(a));
    uids.into_iter().skip(offset).take(limit).collect()
}

/// `2.1` -> `[2, 1]`; `None` if any component is not a positive number
fn section_path(part_id: &str) -> Option<SectionPath> {
    let parts = part_id
        .split('.')
        .map(|p| p.parse::<u32>().ok().filter(|n| *n > 0))
        .collect::<Option<Vec<_>>>()?;
    Some(SectionPath::Part(parts, None))
}

fn flag_names(fetch: &Fetch) -> Vec<String> {
    fetch
        .flags()
        .map(|flag| match flag {
            Flag::Custom(name) => name.to_string(),
            Flag::MayCreate => "\\*".to_string(),
            other => format!("\\{:?}", other),
        })
        .collect()
}
