use futures::{channel::mpsc, select, FutureExt, StreamExt};

use crate::{
    api::CommentId, ConnectionError, ConnectionManager, IdentityChanges, SyncController, Transport,
};

/// What the embedding UI can ask of a running feed
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    /// Send the current top-reply buffer
    SubmitTopReply,
    SubmitReply { parent_id: CommentId, text: String },
    SetComposing(bool),
    SetTopReply(String),
    Close,
}

/// Drive an already-connected feed until told to stop.
///
/// This is the only place where messages reach the controller, so they are
/// merged one at a time, in delivery order. Each identity change triggers
/// exactly one reconnect. Transport failures are not retried: the
/// connection is closed and the error returned.
pub async fn run<T: Transport>(
    conn: &mut ConnectionManager<T>,
    controller: &mut SyncController,
    identity_changes: &mut IdentityChanges,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> Result<(), ConnectionError> {
    loop {
        select! {
            cmd = commands.next() => match cmd {
                None | Some(Command::Close) => {
                    conn.close().await;
                    return Ok(());
                }
                Some(Command::SetComposing(composing)) => controller.set_composing(composing),
                Some(Command::SetTopReply(text)) => controller.set_top_reply(text),
                Some(Command::SubmitTopReply) => {
                    let text = controller.top_reply().to_owned();
                    if let Err(err) = controller.submit_top_reply(conn, text).await {
                        tracing::warn!(?err, "failed submitting top reply");
                    }
                }
                Some(Command::SubmitReply { parent_id, text }) => {
                    if let Err(err) = controller.submit_reply(conn, parent_id, text).await {
                        tracing::warn!(?err, %parent_id, "failed submitting reply");
                    }
                }
            },
            user = identity_changes.next() => {
                if let Some(user) = user {
                    tracing::info!(user_id = ?user.id, "identity changed, reconnecting feed");
                    conn.reconnect().await?;
                    controller.reset();
                }
            },
            msg = conn.next_message().fuse() => match msg {
                None => {
                    tracing::warn!("lost discussion feed");
                    conn.close().await;
                    return Err(ConnectionError::StreamEnded);
                }
                Some(Err(err)) => {
                    tracing::warn!(?err, "discussion feed failed");
                    conn.close().await;
                    return Err(ConnectionError::Transport(err));
                }
                Some(Ok(raw)) => match controller.handle_message(&raw) {
                    Ok(outcomes) => tracing::trace!(?outcomes, "merged feed message"),
                    Err(err) => tracing::warn!(%err, "dropping malformed feed message"),
                },
            },
        }
    }
}
