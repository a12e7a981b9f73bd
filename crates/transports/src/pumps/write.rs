//! WebSocket write pump: serialises outbound and control frames.

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tracing::{debug, error, trace};

use crate::ws::OutboundFrame;

/// Writes frames until either channel closes or a write fails.
///
/// `outbound` outlives the session, so it may still hold frames sent for
/// an earlier one; those are dropped so nothing precedes this session's
/// auth request. `control` carries pings and pongs for this session only.
pub(crate) async fn write_pump<S>(
    mut write: S,
    session: u64,
    outbound: &mut mpsc::Receiver<OutboundFrame>,
    mut control: mpsc::Receiver<tungstenite::Message>,
) -> Result<(), tungstenite::Error>
where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        let msg = tokio::select! {
            frame = outbound.recv() => match frame {
                Some((sent_for, text)) if sent_for == session => {
                    trace!(%text, "frame sent");
                    tungstenite::Message::Text(text.into())
                }
                Some((sent_for, _)) => {
                    debug!(sent_for, session, "dropped frame from previous session");
                    continue;
                }
                None => break,
            },
            msg = control.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        if let Err(e) = write.send(msg).await {
            error!(error = %e, "stream write error");
            return Err(e);
        }
    }

    let _ = write.send(tungstenite::Message::Close(None)).await;
    Ok(())
}
