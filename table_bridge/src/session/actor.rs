//! Tracker actor: the single writer of a table's hardware state.
//!
//! Log lines and console commands both arrive through the same inbox, so
//! they are applied strictly one at a time.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::{
    device::{DeviceLink, echo_with_ack},
    errors::{SessionError, SessionResult},
    messages::{LineOrigin, LineOutcome, SessionEvent, SessionOutcome, TrackerMessage},
};
use crate::hardware::{HardwareState, HardwareTracker};

const INBOX_CAPACITY: usize = 100;

/// Tracker actor handle for sending messages
#[derive(Clone)]
pub struct TrackerHandle {
    sender: mpsc::Sender<TrackerMessage>,
    table: String,
    session_id: Uuid,
}

impl TrackerHandle {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Whether the actor has stopped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Send a raw message to the actor
    pub async fn send(&self, message: TrackerMessage) -> SessionResult<()> {
        self.sender
            .send(message)
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Classify and apply one line, waiting for the result
    pub async fn process_line(
        &self,
        line: impl Into<String>,
        origin: LineOrigin,
    ) -> SessionResult<LineOutcome> {
        let (response, rx) = oneshot::channel();
        self.send(TrackerMessage::Line {
            line: line.into(),
            origin,
            response,
        })
        .await?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    pub async fn snapshot(&self) -> SessionResult<HardwareState> {
        let (response, rx) = oneshot::channel();
        self.send(TrackerMessage::Snapshot { response }).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Subscribe to session events.
    ///
    /// The channel is unbounded: round calls are driven from these events,
    /// so a slow subscriber lags behind instead of losing any.
    pub async fn subscribe(&self) -> SessionResult<(Uuid, mpsc::UnboundedReceiver<SessionEvent>)> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let subscriber_id = Uuid::new_v4();
        self.send(TrackerMessage::Subscribe {
            subscriber_id,
            sender,
        })
        .await?;
        Ok((subscriber_id, receiver))
    }

    pub async fn unsubscribe(&self, subscriber_id: Uuid) -> SessionResult<()> {
        self.send(TrackerMessage::Unsubscribe { subscriber_id })
            .await
    }

    /// Ask the actor to stop; returns once it has acknowledged
    pub async fn close(&self) -> SessionResult<()> {
        let (response, rx) = oneshot::channel();
        self.send(TrackerMessage::Close { response }).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }
}

/// Actor owning one table's [`HardwareTracker`]
pub struct TrackerActor {
    session_id: Uuid,

    tracker: HardwareTracker,

    /// Message inbox
    inbox: mpsc::Receiver<TrackerMessage>,

    /// Echo target for processed lines
    device: Box<dyn DeviceLink>,

    ack_timeout: Duration,

    /// Subscribers for session events
    subscribers: HashMap<Uuid, mpsc::UnboundedSender<SessionEvent>>,

    lines_processed: u64,

    /// Set on the first fault; the session ends with it
    fault: Option<crate::hardware::ProtocolFault>,

    is_closed: bool,
}

impl TrackerActor {
    /// Create a new actor for `table` in the default hardware state
    pub fn new(
        table: impl Into<String>,
        device: Box<dyn DeviceLink>,
        ack_timeout: Duration,
    ) -> (Self, TrackerHandle) {
        Self::with_tracker(HardwareTracker::new(table), device, ack_timeout)
    }

    /// Create an actor around an existing tracker
    pub fn with_tracker(
        tracker: HardwareTracker,
        device: Box<dyn DeviceLink>,
        ack_timeout: Duration,
    ) -> (Self, TrackerHandle) {
        let (sender, inbox) = mpsc::channel(INBOX_CAPACITY);
        let session_id = Uuid::new_v4();

        let handle = TrackerHandle {
            sender,
            table: tracker.table().to_string(),
            session_id,
        };

        let actor = Self {
            session_id,
            tracker,
            inbox,
            device,
            ack_timeout,
            subscribers: HashMap::new(),
            lines_processed: 0,
            fault: None,
            is_closed: false,
        };

        (actor, handle)
    }

    /// Run the actor until it is closed, every handle is dropped, or a
    /// protocol fault ends the session
    pub async fn run(mut self) -> SessionOutcome {
        log::info!(
            "Table {}: hardware session {} starting",
            self.tracker.table(),
            self.session_id
        );

        while let Some(message) = self.inbox.recv().await {
            self.handle_message(message).await;

            if self.is_closed || self.fault.is_some() {
                break;
            }
        }

        log::info!(
            "Table {}: hardware session {} ended after {} lines",
            self.tracker.table(),
            self.session_id,
            self.lines_processed
        );

        SessionOutcome {
            session_id: self.session_id,
            lines_processed: self.lines_processed,
            fault: self.fault,
            final_state: self.tracker.snapshot(),
        }
    }

    async fn handle_message(&mut self, message: TrackerMessage) {
        match message {
            TrackerMessage::Line {
                line,
                origin,
                response,
            } => {
                let result = self.handle_line(&line, origin).await;
                let _ = response.send(result);
            }

            TrackerMessage::Snapshot { response } => {
                let _ = response.send(self.tracker.snapshot());
            }

            TrackerMessage::Subscribe {
                subscriber_id,
                sender,
            } => {
                self.subscribers.insert(subscriber_id, sender);
                log::debug!(
                    "Subscriber {} attached to table {}",
                    subscriber_id,
                    self.tracker.table()
                );
            }

            TrackerMessage::Unsubscribe { subscriber_id } => {
                self.subscribers.remove(&subscriber_id);
                log::debug!(
                    "Subscriber {} detached from table {}",
                    subscriber_id,
                    self.tracker.table()
                );
            }

            TrackerMessage::Close { response } => {
                self.is_closed = true;
                let _ = response.send(());
            }
        }
    }

    async fn handle_line(&mut self, line: &str, origin: LineOrigin) -> SessionResult<LineOutcome> {
        let result = self.tracker.process_line(line);

        for event in self.tracker.drain_events() {
            self.notify(SessionEvent::Hardware(event));
        }

        match result {
            Ok(command) => {
                self.lines_processed += 1;
                log::debug!(
                    "Table {} [{}]: {} -> {}",
                    self.tracker.table(),
                    origin,
                    line.trim(),
                    self.tracker.state().game_state
                );

                if let Err(e) =
                    echo_with_ack(self.device.as_mut(), line.trim(), self.ack_timeout).await
                {
                    log::warn!("Table {}: device echo failed: {}", self.tracker.table(), e);
                }

                Ok(LineOutcome {
                    command,
                    state: self.tracker.snapshot(),
                })
            }
            Err(fault) => {
                log::error!(
                    "Table {} [{}]: {:?} ended the session: {}",
                    self.tracker.table(),
                    origin,
                    line.trim(),
                    fault
                );
                self.notify(SessionEvent::Terminated(fault.clone()));
                self.fault = Some(fault.clone());
                Err(SessionError::Fault(fault))
            }
        }
    }

    /// Push an event to every subscriber, dropping the ones that went away
    fn notify(&mut self, event: SessionEvent) {
        self.subscribers.retain(|subscriber_id, sender| {
            if sender.send(event.clone()).is_ok() {
                return true;
            }
            log::debug!("Subscriber {} disconnected, removing", subscriber_id);
            false
        });
    }
}
