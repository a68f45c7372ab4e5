//! Long-lived subscriber session.
//!
//! [`spawn_session`] runs a background task that connects through
//! [`reconnect_loop`], sends subscribe/unsubscribe control messages, and
//! turns server frames into [`SessionEvent`]s. The set of jobs the caller
//! asked for is kept locally and re-sent after every reconnect, because the
//! hub keeps nothing for a subscriber whose socket it has dropped.
//!
//! Notifications sent while the socket was down are not replayed; callers
//! that need the current state re-fetch it after [`SessionEvent::Connected`].

use std::collections::BTreeSet;

use futures::{SinkExt, StreamExt};
use mediscan_core::protocol::{ClientMessage, ServerMessage, ServerReply};
use mediscan_core::types::JobId;
use mediscan_core::{JobStatus, Notification};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::client::{ClientError, HubClient, HubConnection};
use crate::reconnect::{reconnect_loop, ReconnectConfig, ReconnectError, Reconnector};

/// What the session reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A socket is open. Subscriptions are being re-sent.
    Connected,
    /// The server confirmed a subscription.
    Subscribed { job_id: JobId, status: JobStatus },
    Unsubscribed { job_id: JobId },
    /// The server refused a request (e.g. unknown job).
    Rejected {
        job_id: Option<JobId>,
        code: String,
        message: String,
    },
    Notification(Notification),
    /// The socket dropped. A reconnect follows unless the budget is spent.
    Disconnected,
    /// Reconnection was abandoned. The session task has exited.
    GaveUp { attempts: u32 },
}

#[derive(Debug)]
enum SessionCommand {
    Subscribe(JobId),
    Unsubscribe(JobId),
}

/// Control handle for a running session.
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Ask for updates on `job_id`. Kept across reconnects until the job
    /// reaches a terminal state or is unsubscribed.
    pub fn subscribe(&self, job_id: impl Into<JobId>) -> Result<(), ClientError> {
        self.commands
            .send(SessionCommand::Subscribe(job_id.into()))
            .map_err(|_| ClientError::SessionClosed)
    }

    pub fn unsubscribe(&self, job_id: impl Into<JobId>) -> Result<(), ClientError> {
        self.commands
            .send(SessionCommand::Unsubscribe(job_id.into()))
            .map_err(|_| ClientError::SessionClosed)
    }

    /// Close the socket and wait for the session task to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// Start a session against `client`.
///
/// Returns the control handle and the stream of session events.
pub fn spawn_session(
    client: HubClient,
    config: ReconnectConfig,
) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let task = tokio::spawn(run_session(
        client,
        config,
        command_rx,
        event_tx,
        cancel.clone(),
    ));

    (
        SessionHandle {
            commands: command_tx,
            cancel,
            task,
        },
        event_rx,
    )
}

// ---------------------------------------------------------------------------
// Session task
// ---------------------------------------------------------------------------

/// Why a connected phase ended.
enum PhaseEnd {
    /// Owner cancelled or dropped the handle.
    Stopped,
    /// Socket closed or errored.
    Dropped,
}

async fn run_session(
    client: HubClient,
    config: ReconnectConfig,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    events: mpsc::UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
) {
    let mut reconnector = Reconnector::new(config);
    let mut jobs: BTreeSet<JobId> = BTreeSet::new();

    loop {
        let conn = match reconnect_loop(&client, &mut reconnector, &cancel).await {
            Ok(conn) => conn,
            Err(ReconnectError::GaveUp { attempts }) => {
                let _ = events.send(SessionEvent::GaveUp { attempts });
                return;
            }
            Err(e) => {
                tracing::debug!(client_id = client.client_id(), error = %e, "Session stopped");
                return;
            }
        };
        let _ = events.send(SessionEvent::Connected);

        match run_connected(conn, &mut jobs, &mut commands, &events, &cancel).await {
            PhaseEnd::Stopped => {
                tracing::info!(client_id = client.client_id(), "Session closed");
                return;
            }
            PhaseEnd::Dropped => {
                tracing::warn!(
                    client_id = client.client_id(),
                    pending_jobs = jobs.len(),
                    "Connection to hub lost",
                );
                let _ = events.send(SessionEvent::Disconnected);
                if let Err(e) = reconnector.disconnected() {
                    tracing::error!(error = %e, "Reconnect state out of sync");
                    return;
                }
            }
        }
    }
}

async fn run_connected(
    conn: HubConnection,
    jobs: &mut BTreeSet<JobId>,
    commands: &mut mpsc::UnboundedReceiver<SessionCommand>,
    events: &mpsc::UnboundedSender<SessionEvent>,
    cancel: &CancellationToken,
) -> PhaseEnd {
    let (mut sink, mut stream) = conn.split();

    for job_id in jobs.iter() {
        let msg = ClientMessage::Subscribe {
            job_id: job_id.clone(),
        };
        if send_control(&mut sink, &msg).await.is_err() {
            return PhaseEnd::Dropped;
        }
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                return PhaseEnd::Stopped;
            }
            command = commands.recv() => {
                let msg = match command {
                    Some(SessionCommand::Subscribe(job_id)) => {
                        jobs.insert(job_id.clone());
                        ClientMessage::Subscribe { job_id }
                    }
                    Some(SessionCommand::Unsubscribe(job_id)) => {
                        jobs.remove(&job_id);
                        ClientMessage::Unsubscribe { job_id }
                    }
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        return PhaseEnd::Stopped;
                    }
                };
                if send_control(&mut sink, &msg).await.is_err() {
                    return PhaseEnd::Dropped;
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_frame(&text, jobs, events),
                Some(Ok(Message::Close(_))) | None => return PhaseEnd::Dropped,
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "Hub socket error");
                    return PhaseEnd::Dropped;
                }
                Some(Ok(_)) => {}
            },
        }
    }
}

async fn send_control<S>(sink: &mut S, msg: &ClientMessage) -> Result<(), ClientError>
where
    S: futures::Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let text = serde_json::to_string(msg).map_err(|e| ClientError::Protocol(e.to_string()))?;
    sink.send(Message::Text(text))
        .await
        .map_err(|e| ClientError::Protocol(e.to_string()))
}

/// Translate one server frame into a session event, pruning local
/// subscriptions that can no longer produce updates.
fn handle_frame(text: &str, jobs: &mut BTreeSet<JobId>, events: &mpsc::UnboundedSender<SessionEvent>) {
    let message = match serde_json::from_str::<ServerMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(error = %e, "Unrecognised frame from hub");
            return;
        }
    };

    let event = match message {
        ServerMessage::Reply(ServerReply::SubscriptionConfirmed { job_id, status }) => {
            if status.is_terminal() {
                jobs.remove(&job_id);
            }
            SessionEvent::Subscribed { job_id, status }
        }
        ServerMessage::Reply(ServerReply::UnsubscriptionConfirmed { job_id }) => {
            SessionEvent::Unsubscribed { job_id }
        }
        ServerMessage::Reply(ServerReply::Error {
            code,
            message,
            job_id,
        }) => {
            if let Some(job_id) = &job_id {
                jobs.remove(job_id);
            }
            SessionEvent::Rejected {
                job_id,
                code,
                message,
            }
        }
        ServerMessage::Reply(other) => {
            tracing::trace!(reply = ?other, "Ignoring reply");
            return;
        }
        ServerMessage::Notification(notification) => {
            if notification.is_terminal() {
                if let Some(job_id) = &notification.job_id {
                    jobs.remove(job_id);
                }
            }
            SessionEvent::Notification(notification)
        }
    };

    let _ = events.send(event);
}
