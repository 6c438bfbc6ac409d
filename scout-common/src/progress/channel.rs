//! Reconnecting progress channel for one research run
//!
//! [`ProgressChannel::open`] spawns a single worker task that owns the
//! [`ProgressSession`] and the live connection. The handle talks to it through
//! a command queue; the worker reports back through a typed
//! [`ChannelEvent`] stream and a `watch` of the session.
//!
//! State machine:
//!
//! ```text
//! disconnected -> connecting -> connected
//!                     ^             | unexpected close
//!                     |             v
//!                     +------ reconnecting --(attempts exhausted)--> error
//! ```
//!
//! Completion, cancel and close are manual closes: the worker stops without
//! scheduling a reconnect and finishes in `disconnected`.

use super::policy::ChannelConfig;
use super::session::{ConnectionStatus, ProgressSession};
use super::transport::{CancelEndpoint, Connection, Connector, TransportError};
use crate::events::{
    ChannelMessage, CompletionPayload, Envelope, ErrorCategory, ErrorPayload, MessageKind,
    ProgressSnapshot, StageData,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

// ============================================================================
// Public types
// ============================================================================

/// Events delivered to the channel owner, in the order they happened
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    StatusChanged(ConnectionStatus),
    /// A full progress snapshot replaced the previous one
    Progress(ProgressSnapshot),
    /// A stage delta was merged; `data` is the merged stage
    Stage { stage_id: String, data: StageData },
    Error(ErrorPayload),
    Completed(CompletionPayload),
    /// The run was cancelled; the channel closes without reconnecting
    Cancelled(CompletionPayload),
    /// An inbound handler ran longer than the configured threshold
    PerformanceWarning { kind: MessageKind, elapsed: Duration },
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Progress channel worker has stopped")]
    Closed,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

enum Command {
    Send(ChannelMessage),
    Cancel(oneshot::Sender<Result<(), ChannelError>>),
    Retry,
    Close,
}

/// Handle to a running progress channel
///
/// Dropping the handle closes the channel.
pub struct ProgressChannel {
    search_id: Uuid,
    commands: mpsc::UnboundedSender<Command>,
    session: watch::Receiver<ProgressSession>,
    cancel_endpoint: Arc<dyn CancelEndpoint>,
    worker: JoinHandle<()>,
}

impl ProgressChannel {
    /// Spawn the worker and start connecting
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        search_id: Uuid,
        connector: Arc<dyn Connector>,
        cancel_endpoint: Arc<dyn CancelEndpoint>,
        config: ChannelConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (session_tx, session_rx) = watch::channel(ProgressSession::new(search_id));

        let worker = Worker {
            search_id,
            connector,
            cancel_endpoint: Arc::clone(&cancel_endpoint),
            config,
            session: ProgressSession::new(search_id),
            session_tx,
            events: event_tx,
            commands: command_rx,
            outbox: VecDeque::new(),
            attempts: 0,
        };
        let worker = tokio::spawn(worker.run());

        let channel = Self {
            search_id,
            commands: command_tx,
            session: session_rx,
            cancel_endpoint,
            worker,
        };
        (channel, event_rx)
    }

    pub fn search_id(&self) -> Uuid {
        self.search_id
    }

    /// Send a message, queueing it while not connected
    pub fn send(&self, message: ChannelMessage) -> Result<(), ChannelError> {
        self.commands
            .send(Command::Send(message))
            .map_err(|_| ChannelError::Closed)
    }

    /// Ask the server for a fresh snapshot
    pub fn request_progress(&self) -> Result<(), ChannelError> {
        self.send(ChannelMessage::GetProgress)
    }

    /// Call the cancel endpoint, then close without reconnecting
    ///
    /// Works in every state. If the worker has already stopped the endpoint
    /// is still called.
    pub async fn cancel(&self) -> Result<(), ChannelError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.commands.send(Command::Cancel(reply_tx)).is_ok() {
            if let Ok(result) = reply_rx.await {
                return result;
            }
        }

        self.cancel_endpoint
            .cancel(self.search_id)
            .await
            .map_err(ChannelError::from)
    }

    /// Leave the `error` state and start connecting again
    pub fn retry(&self) -> Result<(), ChannelError> {
        self.commands
            .send(Command::Retry)
            .map_err(|_| ChannelError::Closed)
    }

    /// Manual close; no reconnect is scheduled
    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }

    /// Snapshot of the session as last published by the worker
    pub fn session(&self) -> ProgressSession {
        self.session.borrow().clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.session.borrow().connection_status
    }

    /// Watch receiver for session changes
    pub fn watch_session(&self) -> watch::Receiver<ProgressSession> {
        self.session.clone()
    }

    /// Wait until the connection reaches `status`
    ///
    /// Returns `ChannelError::Closed` if the worker stops first.
    pub async fn wait_for_status(&self, status: ConnectionStatus) -> Result<(), ChannelError> {
        let mut rx = self.session.clone();
        rx.wait_for(|session| session.connection_status == status)
            .await
            .map(|_| ())
            .map_err(|_| ChannelError::Closed)
    }

    /// Wait for the worker task to finish
    pub async fn closed(self) {
        let _ = self.worker.await;
    }
}

// ============================================================================
// Worker
// ============================================================================

enum Phase {
    Connect,
    Backoff,
    Failed,
    Done,
}

struct Worker {
    search_id: Uuid,
    connector: Arc<dyn Connector>,
    cancel_endpoint: Arc<dyn CancelEndpoint>,
    config: ChannelConfig,
    session: ProgressSession,
    session_tx: watch::Sender<ProgressSession>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    /// Outbound messages waiting for a connection, oldest first
    outbox: VecDeque<ChannelMessage>,
    /// Consecutive unexpected closes since the last successful connect
    attempts: u32,
}

impl Worker {
    async fn run(mut self) {
        debug!(search_id = %self.search_id, "Progress channel worker started");

        let mut phase = Phase::Connect;
        loop {
            phase = match phase {
                Phase::Connect => self.connect().await,
                Phase::Backoff => self.backoff().await,
                Phase::Failed => self.failed().await,
                Phase::Done => break,
            };
        }

        self.set_status(ConnectionStatus::Disconnected);
        debug!(search_id = %self.search_id, "Progress channel worker stopped");
    }

    async fn connect(&mut self) -> Phase {
        self.set_status(ConnectionStatus::Connecting);

        let connector = Arc::clone(&self.connector);
        let connecting = connector.connect(self.search_id);
        tokio::pin!(connecting);

        let result = loop {
            tokio::select! {
                result = &mut connecting => break result,
                command = self.commands.recv() => {
                    if let Some(next) = self.on_idle_command(command).await {
                        return next;
                    }
                }
            }
        };

        match result {
            Ok(connection) => self.connected(connection).await,
            Err(e) => {
                warn!(search_id = %self.search_id, error = %e, "Progress channel connect failed");
                self.on_unexpected_close()
            }
        }
    }

    async fn connected(&mut self, mut connection: Box<dyn Connection>) -> Phase {
        self.attempts = 0;
        self.set_status(ConnectionStatus::Connected);
        info!(search_id = %self.search_id, queued = self.outbox.len(), "Progress channel connected");

        while let Some(message) = self.outbox.pop_front() {
            if let Err(e) = transmit(self.search_id, &mut connection, &message).await {
                warn!(search_id = %self.search_id, error = %e, "Flush of queued message failed");
                self.outbox.push_front(message);
                connection.close().await;
                return self.on_unexpected_close();
            }
        }

        if let Err(e) = transmit(self.search_id, &mut connection, &ChannelMessage::GetProgress).await {
            warn!(search_id = %self.search_id, error = %e, "Progress request failed");
            connection.close().await;
            return self.on_unexpected_close();
        }

        let period = self.config.heartbeat_interval();
        let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if let Err(e) = transmit(self.search_id, &mut connection, &ChannelMessage::Heartbeat).await {
                        warn!(search_id = %self.search_id, error = %e, "Heartbeat failed");
                        connection.close().await;
                        return self.on_unexpected_close();
                    }
                }
                frame = connection.recv() => match frame {
                    Some(Ok(text)) => {
                        if self.handle_frame(&text) {
                            info!(search_id = %self.search_id, "Run finished, closing progress channel");
                            connection.close().await;
                            return Phase::Done;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(search_id = %self.search_id, error = %e, "Progress channel receive failed");
                        connection.close().await;
                        return self.on_unexpected_close();
                    }
                    None => {
                        warn!(search_id = %self.search_id, "Progress channel closed by peer");
                        return self.on_unexpected_close();
                    }
                },
                command = self.commands.recv() => match command {
                    Some(Command::Send(message)) => {
                        if let Err(e) = transmit(self.search_id, &mut connection, &message).await {
                            warn!(search_id = %self.search_id, error = %e, "Send failed, message queued");
                            self.outbox.push_back(message);
                            connection.close().await;
                            return self.on_unexpected_close();
                        }
                    }
                    Some(Command::Retry) => {
                        debug!(search_id = %self.search_id, "Retry ignored while connected");
                    }
                    Some(Command::Cancel(reply)) => {
                        self.cancel_remote(reply).await;
                        connection.close().await;
                        return Phase::Done;
                    }
                    Some(Command::Close) | None => {
                        info!(search_id = %self.search_id, "Progress channel closed manually");
                        connection.close().await;
                        return Phase::Done;
                    }
                },
            }
        }
    }

    async fn backoff(&mut self) -> Phase {
        let delay = self.config.reconnect.delay(self.attempts);
        info!(
            search_id = %self.search_id,
            attempt = self.attempts,
            delay_ms = delay.as_millis() as u64,
            "Scheduling progress channel reconnect"
        );

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return Phase::Connect,
                command = self.commands.recv() => {
                    if let Some(next) = self.on_idle_command(command).await {
                        return next;
                    }
                }
            }
        }
    }

    async fn failed(&mut self) -> Phase {
        loop {
            match self.commands.recv().await {
                Some(Command::Retry) => {
                    info!(search_id = %self.search_id, "Manual retry requested");
                    self.attempts = 0;
                    return Phase::Connect;
                }
                other => {
                    if let Some(next) = self.on_idle_command(other).await {
                        return next;
                    }
                }
            }
        }
    }

    /// Handle a command while no connection is open
    ///
    /// Returns the next phase when the command ends the current one.
    async fn on_idle_command(&mut self, command: Option<Command>) -> Option<Phase> {
        match command {
            Some(Command::Send(message)) => {
                trace!(search_id = %self.search_id, kind = message.kind().as_str(), "Queued outbound message");
                self.outbox.push_back(message);
                None
            }
            Some(Command::Retry) => {
                debug!(search_id = %self.search_id, "Retry ignored outside error state");
                None
            }
            Some(Command::Cancel(reply)) => {
                self.cancel_remote(reply).await;
                Some(Phase::Done)
            }
            Some(Command::Close) | None => {
                info!(search_id = %self.search_id, "Progress channel closed manually");
                Some(Phase::Done)
            }
        }
    }

    async fn cancel_remote(&mut self, reply: oneshot::Sender<Result<(), ChannelError>>) {
        info!(search_id = %self.search_id, "Cancelling run");
        let result = self
            .cancel_endpoint
            .cancel(self.search_id)
            .await
            .map_err(ChannelError::from);

        if let Err(e) = &result {
            warn!(search_id = %self.search_id, error = %e, "Cancel endpoint failed");
        }
        let _ = reply.send(result);
    }

    fn on_unexpected_close(&mut self) -> Phase {
        self.attempts += 1;

        if self.config.reconnect.is_exhausted(self.attempts) {
            error!(
                search_id = %self.search_id,
                attempts = self.attempts,
                "Reconnect attempts exhausted"
            );
            let payload = ErrorPayload::new(
                ErrorCategory::ChannelTerminal,
                format!("Connection lost after {} attempts", self.attempts),
            );
            self.session.record_error(payload.clone());
            self.set_status(ConnectionStatus::Error);
            self.emit(ChannelEvent::Error(payload));
            Phase::Failed
        } else {
            self.set_status(ConnectionStatus::Reconnecting);
            Phase::Backoff
        }
    }

    /// Decode and apply one inbound frame; true when the run finished
    fn handle_frame(&mut self, text: &str) -> bool {
        let envelope = match Envelope::from_json(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(search_id = %self.search_id, error = %e, "Discarding undecodable frame");
                return false;
            }
        };

        if envelope.search_id != self.search_id {
            warn!(
                search_id = %self.search_id,
                frame_search_id = %envelope.search_id,
                "Discarding frame for another search"
            );
            return false;
        }

        let kind = envelope.kind();
        let started = Instant::now();
        let completed = self.apply(envelope.message);
        let elapsed = started.elapsed();

        if elapsed >= self.config.slow_handler_threshold() {
            warn!(
                search_id = %self.search_id,
                kind = kind.as_str(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Slow progress handler"
            );
            self.emit(ChannelEvent::PerformanceWarning { kind, elapsed });
        }

        completed
    }

    fn apply(&mut self, message: ChannelMessage) -> bool {
        match message {
            ChannelMessage::ProgressUpdate(snapshot) => {
                self.session.apply_progress(snapshot.clone());
                self.publish();
                self.emit(ChannelEvent::Progress(snapshot));
                false
            }
            ChannelMessage::StageUpdate(update) => {
                let data = self.session.apply_stage_update(&update);
                self.publish();
                self.emit(ChannelEvent::Stage {
                    stage_id: update.stage_id,
                    data,
                });
                false
            }
            ChannelMessage::Error(payload) => {
                warn!(
                    search_id = %self.search_id,
                    category = payload.category.as_str(),
                    message = %payload.message,
                    "Run reported error"
                );
                self.session.record_error(payload.clone());
                self.publish();
                self.emit(ChannelEvent::Error(payload));
                false
            }
            ChannelMessage::Completion(results) => {
                self.session.complete(results.clone());
                self.publish();
                if results.cancelled {
                    self.emit(ChannelEvent::Cancelled(results));
                } else {
                    self.emit(ChannelEvent::Completed(results));
                }
                true
            }
            ChannelMessage::Heartbeat => {
                trace!(search_id = %self.search_id, "Heartbeat received");
                false
            }
            ChannelMessage::GetProgress => {
                debug!(search_id = %self.search_id, "Ignoring get_progress sent to client");
                false
            }
        }
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.session.connection_status == status {
            return;
        }
        debug!(search_id = %self.search_id, status = ?status, "Connection status changed");
        self.session.connection_status = status;
        self.publish();
        self.emit(ChannelEvent::StatusChanged(status));
    }

    fn publish(&self) {
        self.session_tx.send_replace(self.session.clone());
    }

    fn emit(&self, event: ChannelEvent) {
        // Owner may have dropped the receiver; the channel keeps running
        let _ = self.events.send(event);
    }
}

async fn transmit(
    search_id: Uuid,
    connection: &mut Box<dyn Connection>,
    message: &ChannelMessage,
) -> Result<(), TransportError> {
    let text = Envelope::new(search_id, message.clone())
        .to_json()
        .map_err(|e| TransportError::Send(e.to_string()))?;
    connection.send(text).await
}
