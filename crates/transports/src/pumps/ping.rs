//! WebSocket ping pump: periodic keepalive pings.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;

/// Sends a ping every `period` until the control channel closes.
pub(crate) async fn ping_pump(control_tx: mpsc::Sender<tungstenite::Message>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // Skip immediate first tick.

    loop {
        interval.tick().await;
        let ping = tungstenite::Message::Ping(vec![].into());
        if control_tx.send(ping).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pings_on_period() {
        tokio::time::pause();

        let (tx, mut rx) = mpsc::channel(16);
        let handle = tokio::spawn(ping_pump(tx, Duration::from_secs(5)));

        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_secs(5)).await;
        let msg = rx.recv().await;
        assert!(matches!(msg, Some(tungstenite::Message::Ping(_))));

        handle.abort();
    }

    #[tokio::test]
    async fn stops_when_channel_closes() {
        tokio::time::pause();

        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = tokio::spawn(ping_pump(tx, Duration::from_secs(5)));

        tokio::time::advance(Duration::from_secs(6)).await;
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("should stop")
            .expect("no panic");
    }
}
