use agora_api::{FeedConnector, FeedStream, PostId};
use anyhow::{anyhow, Context};
use futures::{future, StreamExt};
use tokio_tungstenite::tungstenite::{
    client::IntoClientRequest,
    http::{header::AUTHORIZATION, HeaderValue},
    Message,
};

/// `FeedConnector` opening one websocket per viewed post
pub struct WsConnector {
    base: String,
    token: Option<String>,
}

impl WsConnector {
    /// `host` is the http(s) base url of the server
    pub fn new(host: &str, token: Option<String>) -> anyhow::Result<WsConnector> {
        let base = host
            .strip_prefix("http")
            .map(|rest| format!("ws{rest}"))
            .ok_or_else(|| anyhow!("host {host:?} is not an http(s) url"))?;
        Ok(WsConnector { base, token })
    }
}

fn frame_text(
    msg: Result<Message, tokio_tungstenite::tungstenite::Error>,
) -> Option<anyhow::Result<String>> {
    match msg {
        Ok(Message::Text(text)) => Some(Ok(text)),
        Ok(Message::Binary(bin)) => {
            Some(String::from_utf8(bin).context("binary frame is not utf-8"))
        }
        Ok(Message::Close(frame)) => {
            tracing::info!(?frame, "server closed the live channel");
            None
        }
        Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
        Err(err) => Some(Err(anyhow::Error::new(err).context("reading live channel"))),
    }
}

#[async_trait::async_trait]
impl FeedConnector for WsConnector {
    async fn connect(&self, post: PostId) -> anyhow::Result<FeedStream> {
        let url = format!("{}/ws/{post}", self.base);
        let mut req = url
            .as_str()
            .into_client_request()
            .with_context(|| format!("building websocket request for {url}"))?;
        if let Some(tok) = &self.token {
            let auth = HeaderValue::from_str(&format!("Bearer {tok}"))
                .context("auth token is not a valid header value")?;
            req.headers_mut().insert(AUTHORIZATION, auth);
        }
        let (sock, _) = tokio_tungstenite::connect_async(req)
            .await
            .with_context(|| format!("connecting to {url}"))?;
        tracing::info!(%url, "connected to live channel");
        Ok(Box::pin(sock.filter_map(|msg| future::ready(frame_text(msg)))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_base() {
        let c = WsConnector::new("https://example.org", None).unwrap();
        assert_eq!(c.base, "wss://example.org");
        let c = WsConnector::new("http://127.0.0.1:8000", None).unwrap();
        assert_eq!(c.base, "ws://127.0.0.1:8000");
        assert!(WsConnector::new("example.org", None).is_err());
    }

    #[test]
    fn control_frames_are_skipped() {
        assert!(frame_text(Ok(Message::Ping(vec![1]))).is_none());
        assert_eq!(
            frame_text(Ok(Message::Text(String::from("{}")))).unwrap().unwrap(),
            "{}"
        );
        assert!(frame_text(Ok(Message::Binary(vec![0xff]))).unwrap().is_err());
    }
}
