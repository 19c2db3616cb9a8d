// RPC transport client
//
// Posts `<methodCall>` documents to one controller interface endpoint and
// unwraps the `<methodResponse>`. Faults surface as `Error::Fault` so
// callers can match on the code without inspecting the envelope.

use std::future::Future;
use std::io;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::envelope::{Request, Response};
use crate::error::Error;
use crate::transport::{DEFAULT_TIMEOUT, TransportConfig};
use crate::value::Value;

/// Calls methods on one remote XML-RPC endpoint.
///
/// The synchronization engine only talks to interfaces through this trait,
/// so tests can substitute scripted fakes.
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Invoke `method` and return the response params.
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Vec<Value>, Error>;

    /// The local IP address the controller can reach this host on.
    async fn local_ip(&self) -> Result<IpAddr, Error>;
}

/// HTTP implementation of [`RpcClient`].
pub struct HttpRpcClient {
    http: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl HttpRpcClient {
    /// Create a client for `url` from a `TransportConfig`.
    pub fn new(url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            url,
            timeout: transport.timeout,
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    ///
    /// `local_ip` connects are bounded by [`DEFAULT_TIMEOUT`].
    pub fn with_client(http: reqwest::Client, url: Url) -> Self {
        Self {
            http,
            url,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Convenience constructor for `http://<host>:<port>`.
    pub fn for_host(host: &str, port: u16, transport: &TransportConfig) -> Result<Self, Error> {
        let url = Url::parse(&format!("http://{host}:{port}"))?;
        Self::new(url, transport)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn post(&self, request: &Request) -> Result<Response, Error> {
        let resp = self
            .http
            .post(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(request.to_xml())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: self.url.to_string(),
            });
        }

        let body = resp.bytes().await?;
        Response::parse(&body)
    }
}

#[async_trait]
impl RpcClient for HttpRpcClient {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Vec<Value>, Error> {
        debug!(url = %self.url, method, params = params.len(), "rpc call");
        params.iter().try_for_each(Value::check_encodable)?;
        let request = Request::new(method, params);
        let response = self.post(&request).await?;
        if let Some(fault) = &response.fault {
            debug!(method, code = fault.code, message = %fault.message, "rpc fault");
        }
        response.into_result()
    }

    async fn local_ip(&self) -> Result<IpAddr, Error> {
        let host = self
            .url
            .host_str()
            .ok_or(Error::InvalidUrl(url::ParseError::EmptyHost))?;
        let port = self.url.port_or_known_default().unwrap_or(80);
        let host = host.trim_start_matches('[').trim_end_matches(']');

        let stream = within(self.timeout, tokio::net::TcpStream::connect((host, port))).await?;
        Ok(stream.local_addr()?.ip())
    }
}

/// Await an I/O future for at most `limit`; elapsing yields `TimedOut`.
async fn within<T>(limit: Duration, fut: impl Future<Output = io::Result<T>>) -> Result<T, Error> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(Error::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("no connection within {limit:?}"),
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn for_host_builds_plain_http_url() {
        let client = HttpRpcClient::for_host("192.168.1.10", 2001, &TransportConfig::default())
            .unwrap();
        assert_eq!(client.url().as_str(), "http://192.168.1.10:2001/");
    }

    #[tokio::test]
    async fn local_ip_uses_outgoing_socket_address() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let client =
            HttpRpcClient::for_host("127.0.0.1", port, &TransportConfig::default()).unwrap();
        let ip = client.local_ip().await.unwrap();
        assert_eq!(ip, "127.0.0.1".parse::<IpAddr>().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_connect_times_out() {
        let err = within(
            Duration::from_secs(5),
            std::future::pending::<io::Result<()>>(),
        )
        .await
        .unwrap_err();
        assert!(
            matches!(&err, Error::Io(e) if e.kind() == io::ErrorKind::TimedOut),
            "{err}"
        );
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn completed_connect_passes_through() {
        let value = within(Duration::from_secs(5), async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
