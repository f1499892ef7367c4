use crate::core::errors::ClientError;
use crate::core::transport::{Transport, TransportSink, TransportStream, WsConfig};
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, error, info, instrument, warn};

/// Frame dispatcher - the seam between the generic session machinery and a
/// concrete protocol. The listener loop hands every inbound frame to exactly
/// one dispatcher.
///
/// A dispatch error means the frame was semantically invalid or undeliverable;
/// the listener logs it and keeps running. Only transport-level receive
/// failures terminate the loop.
pub trait Dispatch: Send + Sync + 'static {
    fn dispatch(&self, frame: Message) -> Result<(), ClientError>;
}

/// Terminal state of a listener loop, observed by every waiter on the session.
#[derive(Debug, Clone)]
enum ListenerState {
    Running,
    Terminated(ClientError),
}

/// One physical connection plus its dedicated background listener task.
///
/// Sessions are never repaired in place: a connection failure kills the
/// session wholesale, and the next `open()` on the owning client builds a
/// brand-new one.
pub struct Session<S: TransportSink> {
    sink: Mutex<S>,
    listener: JoinHandle<()>,
    status: watch::Receiver<ListenerState>,
}

impl<S: TransportSink> Session<S> {
    /// Send one encoded frame over the connection.
    pub async fn send(&self, msg: Message) -> Result<(), ClientError> {
        self.sink.lock().await.send(msg).await
    }

    /// Race `fut` against the health of this session's listener loop.
    ///
    /// Whichever finishes first wins: if the listener terminates (connection
    /// drop, or abort during close) while `fut` is still pending, the wait is
    /// abandoned and the listener's failure is returned instead of hanging
    /// forever. Every suspension on a pending reply or subscription item goes
    /// through here.
    pub async fn wait_with_listener<F, O>(&self, fut: F) -> Result<O, ClientError>
    where
        F: Future<Output = O>,
    {
        let mut status = self.status.clone();
        tokio::select! {
            out = fut => Ok(out),
            err = Self::listener_terminated(&mut status) => Err(err),
        }
    }

    async fn listener_terminated(status: &mut watch::Receiver<ListenerState>) -> ClientError {
        loop {
            if let ListenerState::Terminated(e) = &*status.borrow_and_update() {
                return e.clone();
            }
            if status.changed().await.is_err() {
                // Sender dropped without a terminal state: the task was
                // aborted as part of session close.
                return ClientError::connectivity("listener task terminated");
            }
        }
    }
}

impl<S: TransportSink> Drop for Session<S> {
    fn drop(&mut self) {
        // The listener task borrows nothing from us, but it must not outlive
        // the session it serves.
        self.listener.abort();
    }
}

/// Single-flight slot holding the session lifecycle state.
enum SessionSlot<S: TransportSink> {
    Unopened,
    Opening(watch::Receiver<OpenResult<S>>),
    Opened(Arc<Session<S>>),
}

type OpenResult<S> = Option<Result<Arc<Session<S>>, ClientError>>;

enum OpenRole<S: TransportSink> {
    Leader(watch::Sender<OpenResult<S>>),
    Follower(watch::Receiver<OpenResult<S>>),
    Done(Arc<Session<S>>),
}

/// Generic socket client: connection lifecycle plus a protocol-supplied
/// dispatcher. The request/response and subscription facades are built on top
/// of this.
pub struct SocketClient<T: Transport, D: Dispatch> {
    url: String,
    config: WsConfig,
    transport: T,
    dispatcher: Arc<D>,
    slot: StdMutex<SessionSlot<T::Sink>>,
    close_lock: Mutex<()>,
}

impl<T: Transport, D: Dispatch> SocketClient<T, D> {
    pub fn new(url: impl Into<String>, transport: T, dispatcher: Arc<D>) -> Self {
        Self {
            url: url.into(),
            config: WsConfig::default(),
            transport,
            dispatcher,
            slot: StdMutex::new(SessionSlot::Unopened),
            close_lock: Mutex::new(()),
        }
    }

    pub fn with_config(mut self, config: WsConfig) -> Self {
        self.config = config;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn dispatcher(&self) -> &Arc<D> {
        &self.dispatcher
    }

    /// Open the session, lazily and single-flight.
    ///
    /// The first caller performs the physical connect; every concurrent caller
    /// awaits the same attempt and shares its outcome, success or failure. A
    /// failed attempt resets the slot so a later `open()` may try again;
    /// nothing retries automatically.
    pub async fn open(&self) -> Result<Arc<Session<T::Sink>>, ClientError> {
        let role = {
            let mut slot = self.slot.lock().unwrap();
            match &*slot {
                SessionSlot::Opened(s) => OpenRole::Done(Arc::clone(s)),
                SessionSlot::Opening(rx) => OpenRole::Follower(rx.clone()),
                SessionSlot::Unopened => {
                    let (tx, rx) = watch::channel(None);
                    *slot = SessionSlot::Opening(rx);
                    OpenRole::Leader(tx)
                }
            }
        };

        match role {
            OpenRole::Done(session) => Ok(session),
            OpenRole::Follower(rx) => self.follow_open(rx).await,
            OpenRole::Leader(tx) => {
                let res = self.force_open().await;
                {
                    let mut slot = self.slot.lock().unwrap();
                    *slot = match &res {
                        Ok(session) => SessionSlot::Opened(Arc::clone(session)),
                        Err(_) => SessionSlot::Unopened,
                    };
                }
                let _ = tx.send(Some(res.clone()));
                res
            }
        }
    }

    async fn follow_open(
        &self,
        mut rx: watch::Receiver<OpenResult<T::Sink>>,
    ) -> Result<Arc<Session<T::Sink>>, ClientError> {
        loop {
            if let Some(res) = rx.borrow_and_update().clone() {
                return res;
            }
            if rx.changed().await.is_err() {
                // The leader was cancelled mid-connect. Reset the slot if it
                // still points at this dead attempt, then report the abort.
                let mut slot = self.slot.lock().unwrap();
                if matches!(&*slot, SessionSlot::Opening(r) if r.same_channel(&rx)) {
                    *slot = SessionSlot::Unopened;
                }
                return Err(ClientError::connectivity("connection attempt aborted"));
            }
        }
    }

    /// Establish a fresh connection and listener unconditionally, bypassing
    /// the single-flight guard. `open()` calls this internally; it is not the
    /// normal entry point.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn force_open(&self) -> Result<Arc<Session<T::Sink>>, ClientError> {
        info!("connecting");
        let (sink, stream) = self
            .transport
            .connect(&self.url, self.config.connect_timeout())
            .await?;
        info!("connected");

        let (status_tx, status_rx) = watch::channel(ListenerState::Running);
        let listener = tokio::spawn(listen(stream, Arc::clone(&self.dispatcher), status_tx));

        Ok(Arc::new(Session {
            sink: Mutex::new(sink),
            listener,
            status: status_rx,
        }))
    }

    /// Close the session, idempotently. Concurrent closes collapse into one;
    /// closing a never-opened client is a no-op. The listener task is
    /// cancelled, the transport closed, and the slot reset so a future
    /// `open()` builds a brand-new session.
    pub async fn close(&self) -> Result<(), ClientError> {
        let _guard = self.close_lock.lock().await;
        let session = {
            let mut slot = self.slot.lock().unwrap();
            match std::mem::replace(&mut *slot, SessionSlot::Unopened) {
                SessionSlot::Opened(s) => Some(s),
                // An open is in flight; leave it to its leader.
                SessionSlot::Opening(rx) => {
                    *slot = SessionSlot::Opening(rx);
                    None
                }
                SessionSlot::Unopened => None,
            }
        };
        if let Some(session) = session {
            session.listener.abort();
            session.sink.lock().await.close().await?;
            info!("closed");
        }
        Ok(())
    }
}

/// The listener loop: drain the read half for the lifetime of one session.
///
/// Inbound frames go to the dispatcher; dispatch failures are logged and the
/// loop keeps going. A receive error or server-side close terminates the loop
/// with a connectivity error published as its terminal state.
async fn listen<R: TransportStream, D: Dispatch>(
    mut stream: R,
    dispatcher: Arc<D>,
    status: watch::Sender<ListenerState>,
) {
    let err = loop {
        match stream.next().await {
            Some(Ok(frame)) => {
                debug!(len = frame.len(), "received frame");
                if let Err(e) = dispatcher.dispatch(frame) {
                    warn!(error = %e, "dropping undeliverable frame");
                }
            }
            Some(Err(e)) => {
                error!(error = %e, "error receiving message");
                break e;
            }
            None => break ClientError::connectivity("connection closed by server"),
        }
    };
    let _ = status.send(ListenerState::Terminated(err));
}
