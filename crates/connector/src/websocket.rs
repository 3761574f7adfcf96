use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::ConnectorError;
use crate::traits::Connector;

const READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Frames buffered between the socket reader and the adapter
const CHANNEL_CAPACITY: usize = 1024;

/// WebSocket transport for one market stream.
///
/// Each `connect` opens a fresh socket, sends the subscribe frames and spawns
/// a reader that forwards text and binary frames. The reader answers pings
/// and ends the session on close, error or read timeout.
pub struct WebSocketConnector {
    url: String,
    subscriptions: Vec<String>,
    reader: Option<JoinHandle<()>>,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>, subscriptions: Vec<String>) -> Self {
        Self {
            url: url.into(),
            subscriptions,
            reader: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn abort_reader(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&mut self) -> Result<mpsc::Receiver<Vec<u8>>, ConnectorError> {
        self.abort_reader();

        Url::parse(&self.url).map_err(|e| ConnectorError::ConnectionFailed(e.to_string()))?;

        info!(url = %self.url, "Connecting to WebSocket");
        let (ws_stream, _) = connect_async(self.url.as_str()).await?;

        let (mut write, mut read) = ws_stream.split();
        for msg in &self.subscriptions {
            debug!(cmd = %msg, "Sending subscribe frame");
            write
                .send(WsMessage::Text(msg.clone()))
                .await
                .map_err(|e| ConnectorError::SubscribeFailed(e.to_string()))?;
        }

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let url = self.url.clone();

        self.reader = Some(tokio::spawn(async move {
            loop {
                match tokio::time::timeout(READ_TIMEOUT, read.next()).await {
                    Err(_) => {
                        warn!(url = %url, timeout_secs = READ_TIMEOUT.as_secs(), "WebSocket read timeout");
                        break;
                    }
                    Ok(Some(Ok(WsMessage::Text(text)))) => {
                        if tx.send(text.into_bytes()).await.is_err() {
                            break;
                        }
                    }
                    Ok(Some(Ok(WsMessage::Binary(data)))) => {
                        if tx.send(data).await.is_err() {
                            break;
                        }
                    }
                    Ok(Some(Ok(WsMessage::Ping(data)))) => {
                        trace!("Received WS ping, sending pong");
                        if write.send(WsMessage::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Some(Ok(WsMessage::Close(frame)))) => {
                        info!(url = %url, frame = ?frame, "WebSocket closed by peer");
                        break;
                    }
                    Ok(Some(Ok(_))) => continue,
                    Ok(Some(Err(e))) => {
                        warn!(url = %url, error = %e, "WebSocket read error");
                        break;
                    }
                    Ok(None) => break,
                }
            }
            let _ = write.close().await;
        }));

        Ok(rx)
    }

    async fn close(&mut self) -> Result<(), ConnectorError> {
        self.abort_reader();
        Ok(())
    }
}

impl Drop for WebSocketConnector {
    fn drop(&mut self) {
        self.abort_reader();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    #[tokio::test]
    async fn test_invalid_url() {
        let mut connector = WebSocketConnector::new("not a url", Vec::new());
        let result = connector.connect().await;
        assert!(matches!(result, Err(ConnectorError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut connector = WebSocketConnector::new(format!("ws://{}", addr), Vec::new());
        assert!(connector.connect().await.is_err());
    }

    #[tokio::test]
    async fn test_subscribes_and_forwards_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let subscribe = ws.next().await.unwrap().unwrap();
            ws.send(WsMessage::Text(r#"{"event_type":"depthUpdate"}"#.to_string()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
            subscribe.into_text().unwrap()
        });

        let mut connector = WebSocketConnector::new(
            format!("ws://{}", addr),
            vec![r#"{"op":"subscribe"}"#.to_string()],
        );
        let mut rx = connector.connect().await.unwrap();

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame, br#"{"event_type":"depthUpdate"}"#.to_vec());
        // Peer close ends the session
        assert!(rx.recv().await.is_none());

        let subscribe = server.await.unwrap();
        assert_eq!(subscribe, r#"{"op":"subscribe"}"#);
        connector.close().await.unwrap();
    }
}
