//! WebSocket read pump: forwards text frames to the service loop.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tracing::{debug, trace, warn};

use zilink_device_link::StreamEvent;
use zilink_protocol::constants::WS_PONG_WAIT;

/// Why the read side of a session ended.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ReadExit {
    /// Peer closed the socket or the stream ended.
    Closed,
    /// Read error or keepalive timeout.
    Failed(String),
}

/// Reads frames until the socket closes or goes silent.
///
/// Any incoming frame resets the pong deadline; if nothing arrives within
/// [`WS_PONG_WAIT`] the connection is considered dead.
pub(crate) async fn read_pump<S>(
    mut read: S,
    events: mpsc::UnboundedSender<StreamEvent>,
    control_tx: mpsc::Sender<tungstenite::Message>,
) -> ReadExit
where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    let pong_deadline = tokio::time::sleep(WS_PONG_WAIT);
    tokio::pin!(pong_deadline);

    loop {
        tokio::select! {
            () = &mut pong_deadline => {
                warn!("pong timeout, closing stream");
                return ReadExit::Failed("pong timeout".into());
            }

            msg = read.next() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        warn!(error = %e, "stream read error");
                        return ReadExit::Failed(e.to_string());
                    }
                    None => {
                        debug!("stream ended");
                        return ReadExit::Closed;
                    }
                };

                pong_deadline.as_mut().reset(tokio::time::Instant::now() + WS_PONG_WAIT);

                match msg {
                    tungstenite::Message::Text(text) => {
                        trace!(text = %text.as_str(), "frame received");
                        if events.send(StreamEvent::Text(text.as_str().to_owned())).is_err() {
                            return ReadExit::Closed;
                        }
                    }
                    tungstenite::Message::Ping(data) => {
                        trace!("received ping, sending pong");
                        let _ = control_tx.send(tungstenite::Message::Pong(data)).await;
                    }
                    tungstenite::Message::Pong(_) => trace!("received pong"),
                    tungstenite::Message::Close(frame) => {
                        debug!(?frame, "received close frame");
                        return ReadExit::Closed;
                    }
                    _ => debug!("ignoring binary frame"),
                }
            }
        }
    }
}
