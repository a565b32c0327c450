use std::{collections::HashMap, sync::OnceLock};

use log::{debug, trace};
use tokio::sync::{mpsc, Mutex};

use crate::response::{Reply, ReplyKind};

/// Routes tagged replies to the command waiting on them and keeps the first
/// fault observed on the connection.
#[derive(Debug, Default)]
pub(super) struct ReplyRouter {
    routes: Mutex<HashMap<String, mpsc::UnboundedSender<Reply>>>,
    fault: OnceLock<String>,
}

impl ReplyRouter {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// The receiver is closed straight away when the session already faulted.
    pub(super) async fn register(&self, tag: &str) -> mpsc::UnboundedReceiver<Reply> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut routes = self.routes.lock().await;
        if self.fault.get().is_none() {
            routes.insert(tag.to_string(), sender);
        }
        receiver
    }

    pub(super) async fn deregister(&self, tag: &str) {
        self.routes.lock().await.remove(tag);
    }

    pub(super) async fn dispatch(&self, reply: Reply) {
        if reply.kind == ReplyKind::Fatal {
            let reason = reply.message().unwrap_or("fatal reply").to_string();
            self.record_fault(reason).await;
            return;
        }
        let Some(tag) = reply.tag.as_deref() else {
            trace!("ignoring untagged {:?} reply", reply.kind);
            return;
        };
        match self.routes.lock().await.get(tag) {
            Some(route) => {
                let _ = route.send(reply);
            }
            None => trace!("discarding reply for abandoned tag {}", tag),
        }
    }

    /// Marks the session unusable and wakes every waiting command.
    pub(super) async fn record_fault(&self, reason: String) {
        if self.fault.set(reason).is_ok() {
            debug!("session fault: {}", self.fault.get().map_or("", String::as_str));
        }
        self.routes.lock().await.clear();
    }

    pub(super) fn fault(&self) -> Option<&str> {
        self.fault.get().map(String::as_str)
    }
}
