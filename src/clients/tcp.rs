use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::error::ClientError;
use crate::resources::{ClientOptions, Endpoint, ServiceClient};

/// Options for [`TcpClient`].
#[derive(Clone, Debug)]
pub struct TcpOptions {
    /// Address to connect to; set per instance by the client factory.
    pub endpoint: Option<Endpoint>,
    /// Bound on establishing the connection.
    pub connect_timeout: Duration,
}

impl TcpOptions {
    /// Options for a fixed endpoint.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint: Some(endpoint),
            ..Self::default()
        }
    }

    /// Replaces the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for TcpOptions {
    fn default() -> Self {
        Self {
            endpoint: None,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientOptions for TcpOptions {
    fn set_endpoint(&mut self, endpoint: &Endpoint) {
        self.endpoint = Some(endpoint.clone());
    }

    fn endpoint(&self) -> Option<Endpoint> {
        self.endpoint.clone()
    }
}

/// An open TCP connection to a service.
#[derive(Debug)]
pub struct TcpClient {
    endpoint: Endpoint,
    stream: Mutex<Option<TcpStream>>,
}

impl TcpClient {
    /// The endpoint this client is connected to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// True until [`ServiceClient::close`] has run.
    pub async fn is_open(&self) -> bool {
        self.stream.lock().await.is_some()
    }
}

#[async_trait]
impl ServiceClient for TcpClient {
    type Options = TcpOptions;

    async fn connect(options: TcpOptions) -> Result<Self, ClientError> {
        let endpoint = options.endpoint.ok_or(ClientError::NoEndpoint)?;
        let connect_err = |error: String| ClientError::Connect {
            endpoint: endpoint.to_string(),
            error,
        };

        let addr = (endpoint.host.as_str(), endpoint.port);
        let stream = tokio::time::timeout(options.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| connect_err(format!("timed out after {:?}", options.connect_timeout)))?
            .map_err(|e| connect_err(e.to_string()))?;

        Ok(Self {
            endpoint,
            stream: Mutex::new(Some(stream)),
        })
    }

    async fn close(&self) -> Result<(), ClientError> {
        let Some(mut stream) = self.stream.lock().await.take() else {
            return Ok(());
        };
        stream.shutdown().await.map_err(|e| ClientError::Close { error: e.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn connects_and_closes_once() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();

        let client = TcpClient::connect(TcpOptions::new(Endpoint::new("127.0.0.1", port)))
            .await
            .expect("connect");
        assert_eq!(client.endpoint().port, port);
        assert!(client.is_open().await);

        client.close().await.expect("close");
        assert!(!client.is_open().await);
        client.close().await.expect("second close is a no-op");
    }

    #[tokio::test]
    async fn refuses_without_endpoint_or_listener() {
        let err = TcpClient::connect(TcpOptions::default()).await.expect_err("no endpoint");
        assert!(matches!(err, ClientError::NoEndpoint));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let err = TcpClient::connect(TcpOptions::new(Endpoint::new("127.0.0.1", port)))
            .await
            .expect_err("nothing listening");
        assert!(matches!(err, ClientError::Connect { .. }));
    }
}
