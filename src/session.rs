use std::{
    future::Future,
    io,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::SinkExt;
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncWrite, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;

use crate::codec::SentenceCodec;
use crate::constants::QUIT_GRACE;
use crate::descriptor::{Credentials, DeviceDescriptor};
use crate::error::{Error, Result};
use crate::notification::ReplyRouter;
use crate::request::Command;
use crate::response::{Listener, Reply, ReplyKind, Response};

/// Opens the byte stream a [`Session`] runs over.
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Plain TCP connection to the API service.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// One authenticated API connection, owned by a single request.
///
/// Replies are read by a background listener and routed to the waiting
/// command by their `.tag`, so several commands may be in flight at once.
/// Faults reported asynchronously by the device (`!fatal`, a dropped
/// connection) are recorded and make every later command fail with
/// [`Error::SessionFault`]; check [`Session::fault`] to observe them.
///
/// Dropping a session releases the connection. [`Session::close`] additionally
/// asks the device to end the session.
pub struct Session<S> {
    writer: Mutex<FramedWrite<WriteHalf<S>, SentenceCodec>>,
    router: Arc<ReplyRouter>,
    next_tag: AtomicU64,
    timeout: Duration,
    listener: ListenerTask,
    closed: bool,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    /// Connects and logs in, both bounded by the descriptor's timeout.
    ///
    /// # Errors
    /// Returns [`Error::Connection`] if the device cannot be reached in time and
    /// [`Error::Authentication`] if it rejects the credentials. No connection is
    /// left open on failure.
    pub async fn open<C>(connector: &C, descriptor: &DeviceDescriptor) -> Result<Self>
    where
        C: Connector<Stream = S>,
    {
        let attempt = async {
            let stream = connector
                .connect(&descriptor.host, descriptor.port)
                .await
                .map_err(|err| Error::Connection(Box::new(err)))?;
            let session = Self::attach(stream, descriptor.timeout);
            session.login(&descriptor.credentials).await?;
            Ok::<_, Error>(session)
        };
        match tokio::time::timeout(descriptor.timeout, attempt).await {
            Ok(Ok(session)) => {
                debug!("session opened to {}:{}", descriptor.host, descriptor.port);
                Ok(session)
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(Error::Connection(
                format!(
                    "no answer from {}:{} within {:?}",
                    descriptor.host, descriptor.port, descriptor.timeout
                )
                .into(),
            )),
        }
    }

    pub(crate) fn attach(stream: S, timeout: Duration) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        let router = Arc::new(ReplyRouter::new());
        let mut listener = ListenerTask::new();
        listener.spawn(Listener::new(reader, Arc::clone(&router)));
        Self {
            writer: Mutex::new(FramedWrite::new(writer, SentenceCodec)),
            router,
            next_tag: AtomicU64::new(1),
            timeout,
            listener,
            closed: false,
        }
    }

    async fn login(&self, credentials: &Credentials) -> Result<()> {
        let command = Command::new("/login")
            .with_attribute("name", &credentials.username)
            .with_attribute("password", &credentials.password);
        match self.execute(&command, self.timeout).await {
            // a challenge in `ret` means the device only speaks the pre-6.43 login
            Ok(response) if response.done.contains_key("ret") => Err(Error::Authentication(
                "device requires the legacy challenge login".into(),
            )),
            Ok(_) => Ok(()),
            Err(Error::Command { message, .. }) => Err(Error::Authentication(message)),
            Err(Error::SessionFault(reason)) => Err(Error::Connection(reason.into())),
            Err(err) => Err(err),
        }
    }

    /// Sends one command and waits until the device reports it done.
    ///
    /// There are no retries. `timeout` bounds both writing the command and
    /// waiting for its completion. When it elapses first the command is
    /// cancelled on the device and whatever it still sends is discarded.
    ///
    /// # Errors
    /// [`Error::Command`] when the device answers with a trap,
    /// [`Error::ResponseTimeout`] when no completion arrives in time and
    /// [`Error::SessionFault`] once the session became unusable.
    pub async fn execute(&self, command: &Command, timeout: Duration) -> Result<Response> {
        if self.closed {
            return Err(Error::SessionFault("session closed".into()));
        }
        if let Some(reason) = self.router.fault() {
            return Err(Error::SessionFault(reason.into()));
        }

        let tag = self.next_tag.fetch_add(1, Ordering::Relaxed).to_string();
        let mut replies = self.router.register(&tag).await;
        let exchange = async {
            self.send(command.to_words(Some(&tag))).await?;
            self.collect(command, &mut replies).await
        };
        let outcome = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| Error::ResponseTimeout)
            .and_then(|collected| collected);
        self.router.deregister(&tag).await;

        if matches!(outcome, Err(Error::ResponseTimeout)) {
            debug!("{} timed out after {:?}, cancelling", command.path(), timeout);
            self.cancel(&tag).await;
        }
        outcome
    }

    async fn collect(
        &self,
        command: &Command,
        replies: &mut mpsc::UnboundedReceiver<Reply>,
    ) -> Result<Response> {
        let mut response = Response::default();
        let mut trap = None;
        while let Some(reply) = replies.recv().await {
            match reply.kind {
                ReplyKind::Re => response.rows.push(reply.attributes),
                ReplyKind::Trap => {
                    if trap.is_none() {
                        trap = Some(reply.message().unwrap_or("unknown failure").to_string());
                    }
                }
                ReplyKind::Done => {
                    return match trap {
                        Some(message) => Err(Error::Command {
                            command: command.path().into(),
                            message,
                        }),
                        None => {
                            response.done = reply.attributes;
                            Ok(response)
                        }
                    };
                }
                ReplyKind::Empty | ReplyKind::Fatal => {}
            }
        }
        Err(Error::SessionFault(
            self.router
                .fault()
                .unwrap_or("reply stream ended")
                .to_string(),
        ))
    }

    /// Stops a running command. The device's answer is not awaited.
    ///
    /// A device that does not take the request within [`QUIT_GRACE`] has
    /// stopped reading, so the session is marked faulty.
    pub(crate) async fn cancel(&self, tag: &str) {
        let command = Command::new("/cancel").with_attribute("tag", tag);
        match tokio::time::timeout(QUIT_GRACE, self.send(command.to_words(None))).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!("failed to cancel command {}: {}", tag, err),
            Err(_) => {
                let reason = format!("device stopped reading, cancel of command {} not sent", tag);
                warn!("{}", reason);
                self.router.record_fault(reason).await;
            }
        }
    }

    async fn send(&self, words: Vec<String>) -> Result<()> {
        if let Err(err) = self.writer.lock().await.send(words).await {
            let reason = format!("failed to write to device, reason: {}", err);
            self.router.record_fault(reason.clone()).await;
            return Err(Error::SessionFault(reason));
        }
        Ok(())
    }

    /// The fault that made this session unusable, if any.
    pub fn fault(&self) -> Option<&str> {
        self.router.fault()
    }

    /// General command timeout inherited from the descriptor.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Ends the session. Safe to call more than once and never fails.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.router.fault().is_none() {
            let quit = self.send(Command::new("/quit").to_words(None));
            if tokio::time::timeout(QUIT_GRACE, quit).await.is_err() {
                debug!("device did not accept /quit in time");
            }
        }
        self.listener.stop();
        let _ = tokio::time::timeout(QUIT_GRACE, self.writer.get_mut().close()).await;
        debug!("session closed");
    }
}

#[derive(Debug)]
struct ListenerTask {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ListenerTask {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            handle: None,
        }
    }

    fn spawn<R>(&mut self, mut listener: Listener<R>)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let token = self.token.clone();
        let handle = tokio::task::spawn(async move {
            tokio::select! {
                _ = listener.listen() => {},
                _ = token.cancelled() => {},
            }
        });
        self.handle = Some(handle);
    }

    fn stop(&mut self) {
        if self.handle.take().is_some() {
            self.token.cancel();
        }
    }
}

impl Drop for ListenerTask {
    fn drop(&mut self) {
        self.stop();
    }
}
