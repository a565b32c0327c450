use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use log::{trace, warn};
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

use crate::codec::SentenceCodec;
use crate::error::{Error, Result};
use crate::notification::ReplyRouter;

pub type Attributes = HashMap<String, String>;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ReplyKind {
    Re,
    Done,
    Trap,
    Empty,
    Fatal,
}

/// One sentence received from the device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub kind: ReplyKind,
    pub tag: Option<String>,
    pub attributes: Attributes,
}

impl Reply {
    pub(crate) fn parse(words: Vec<String>) -> Result<Self> {
        let mut words = words.into_iter();
        let kind = match words.next().as_deref() {
            Some("!re") => ReplyKind::Re,
            Some("!done") => ReplyKind::Done,
            Some("!trap") => ReplyKind::Trap,
            Some("!empty") => ReplyKind::Empty,
            Some("!fatal") => ReplyKind::Fatal,
            Some(other) => {
                return Err(Error::MalformedReply(format!("unknown reply type {other}")))
            }
            None => return Err(Error::MalformedReply("empty sentence".into())),
        };

        let mut tag = None;
        let mut attributes = Attributes::new();
        for word in words {
            if let Some(value) = word.strip_prefix(".tag=") {
                tag = Some(value.to_string());
            } else if let Some(pair) = word.strip_prefix('=') {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                attributes.insert(key.to_string(), value.to_string());
            } else if kind == ReplyKind::Fatal {
                attributes.insert("message".into(), word);
            }
        }
        Ok(Self {
            kind,
            tag,
            attributes,
        })
    }

    pub fn message(&self) -> Option<&str> {
        self.attributes.get("message").map(String::as_str)
    }
}

/// Everything a finished command produced: its `!re` rows and the attributes
/// carried by the closing `!done`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Response {
    pub rows: Vec<Attributes>,
    pub done: Attributes,
}

pub(super) struct Listener<R> {
    reader: FramedRead<R, SentenceCodec>,
    router: Arc<ReplyRouter>,
}

impl<R: AsyncRead + Unpin> Listener<R> {
    pub(super) fn new(reader: R, router: Arc<ReplyRouter>) -> Self {
        Self {
            reader: FramedRead::new(reader, SentenceCodec),
            router,
        }
    }

    pub(super) async fn listen(&mut self) {
        while let Some(sentence) = self.reader.next().await {
            match sentence {
                Ok(words) => match Reply::parse(words) {
                    Ok(reply) => self.router.dispatch(reply).await,
                    Err(err) => warn!("discarding reply: {}", err),
                },
                Err(err) => {
                    self.router
                        .record_fault(format!("failed to read from device, reason: {}", err))
                        .await;
                    return;
                }
            }
        }
        trace!("device closed the connection");
        self.router
            .record_fault("connection closed by device".into())
            .await;
    }
}
