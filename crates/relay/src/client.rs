use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument};

use crate::resolver::{self, MxLookup, ResolveError};

#[derive(Debug, Clone)]
pub struct Config {
    /// Name presented in the outbound HELO.
    pub helo_hostname: String,
    /// Destination port on the resolved exchanger.
    pub port: u16,
    /// Deadline applied to each connect, query, send and receive.
    pub timeout: Duration,
    /// Parse reply codes and fail on 4xx/5xx instead of treating any
    /// readable reply as a go-ahead.
    pub check_replies: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            helo_hostname: "localhost".to_owned(),
            port: 25,
            timeout: Duration::from_secs(60),
            check_replies: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("recipient {0:?} has no domain part")]
    BadRecipient(String),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("operation timed out")]
    Timeout,
    #[error("remote closed the connection")]
    Disconnected,
    #[error("remote rejected: {0}")]
    Rejected(String),
}

/// Delivers one message per call by driving a scripted SMTP conversation
/// with the recipient domain's preferred exchanger.
pub struct Relay<R> {
    resolver: R,
    config: Config,
}

impl<R: MxLookup> Relay<R> {
    pub fn new(resolver: R, config: Config) -> Self {
        Self { resolver, config }
    }

    /// One delivery attempt: resolve, connect, converse. The first
    /// transport failure at any step abandons the whole attempt; there are
    /// no retries.
    #[instrument(skip_all)]
    pub async fn relay(
        &self,
        mail_from: &str,
        rcpt_to: &str,
        body: &str,
    ) -> Result<(), RelayError> {
        let domain = recipient_domain(rcpt_to)?;
        let host = self
            .bounded(resolver::resolve_exchanger(&self.resolver, &domain))
            .await?;
        debug!(%host, port = self.config.port, "connecting to exchanger");

        let mut stream = self
            .bounded(TcpStream::connect((host.as_str(), self.config.port)))
            .await?;
        self.converse(&mut stream, mail_from, rcpt_to, body).await
    }

    /// The fixed command script, one send and one receive per step. The
    /// body must already be normalized.
    async fn converse<S: AsyncRead + AsyncWrite + Unpin>(
        &self,
        stream: &mut S,
        mail_from: &str,
        rcpt_to: &str,
        body: &str,
    ) -> Result<(), RelayError> {
        self.recv(stream).await?; // banner
        self.send_recv(stream, &format!("HELO {}\r\n", self.config.helo_hostname))
            .await?;
        self.send_recv(stream, &format!("MAIL FROM:{mail_from}\r\n"))
            .await?;
        self.send_recv(stream, &format!("RCPT TO:{rcpt_to}\r\n"))
            .await?;
        self.send_recv(stream, "DATA\r\n").await?;
        self.send_recv(stream, &format!("{body}\r\n.\r\n")).await?;
        self.send_recv(stream, "QUIT\r\n").await?;
        Ok(())
    }

    async fn send_recv<S: AsyncRead + AsyncWrite + Unpin>(
        &self,
        stream: &mut S,
        payload: &str,
    ) -> Result<(), RelayError> {
        self.bounded(async {
            stream.write_all(payload.as_bytes()).await?;
            stream.flush().await
        })
        .await?;
        self.recv(stream).await
    }

    /// One receive. Any non-empty read is a go-ahead unless reply checking
    /// is on, in which case the leading 3-digit code must be below 400.
    async fn recv<S: AsyncRead + Unpin>(&self, stream: &mut S) -> Result<(), RelayError> {
        let mut buf = [0u8; 1024];
        let n = self.bounded(stream.read(&mut buf)).await?;
        if n == 0 {
            return Err(RelayError::Disconnected);
        }

        let reply = String::from_utf8_lossy(&buf[..n]);
        debug!(reply = %reply.trim_end(), "remote");

        if self.config.check_replies {
            check_code(&reply)?;
        }

        Ok(())
    }

    async fn bounded<T, E>(
        &self,
        fut: impl Future<Output = Result<T, E>>,
    ) -> Result<T, RelayError>
    where
        RelayError: From<E>,
    {
        match timeout(self.config.timeout, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(RelayError::from(e)),
            Err(_) => Err(RelayError::Timeout),
        }
    }
}

fn check_code(reply: &str) -> Result<(), RelayError> {
    let code = reply
        .get(..3)
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| RelayError::Rejected(reply.trim_end().to_owned()))?;

    if code >= 400 {
        return Err(RelayError::Rejected(reply.trim_end().to_owned()));
    }

    Ok(())
}

/// Domain part of the forward path: everything after `@`, with a closing
/// `>` and anything following it dropped.
fn recipient_domain(rcpt_to: &str) -> Result<String, RelayError> {
    let at = rcpt_to
        .find('@')
        .ok_or_else(|| RelayError::BadRecipient(rcpt_to.to_owned()))?;
    let after = &rcpt_to[at + 1..];

    let domain = match after.find('>') {
        Some(end) => &after[..end],
        None => after,
    };

    Ok(domain.to_owned())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

    use crate::resolver::{MxLookup, MxRecord, ResolveError};

    use super::{recipient_domain, Config, Relay, RelayError};

    struct StaticMx(Vec<MxRecord>);

    #[async_trait]
    impl MxLookup for StaticMx {
        async fn lookup(&self, _domain: &str) -> Result<Vec<MxRecord>, ResolveError> {
            Ok(self.0.clone())
        }
    }

    fn relay(config: Config) -> Relay<StaticMx> {
        Relay::new(StaticMx(Vec::new()), config)
    }

    #[test]
    fn extracts_the_recipient_domain() {
        assert_eq!(recipient_domain("<b@y.com>").unwrap(), "y.com");
        assert_eq!(recipient_domain("b@y.com").unwrap(), "y.com");
        assert_eq!(recipient_domain("<b@y.com> SIZE=100").unwrap(), "y.com");
        assert!(matches!(
            recipient_domain("<nobody>"),
            Err(RelayError::BadRecipient(_))
        ));
    }

    /// Play the server side of the script, answering each step with the
    /// given replies, and return every line the client sent.
    async fn script_server(stream: DuplexStream, replies: &[&str]) -> anyhow::Result<Vec<String>> {
        let mut stream = BufReader::new(stream);
        let mut received = Vec::new();
        let mut in_data = false;

        stream.write_all(b"220 mx.y.com ready\r\n").await?;
        stream.flush().await?;

        for reply in replies {
            // One step: a single command line, or (after DATA) the whole
            // payload up to the terminating dot.
            loop {
                let mut line = String::new();
                if stream.read_line(&mut line).await? == 0 {
                    return Ok(received);
                }
                let line = line.trim_end().to_owned();
                let done = !in_data || line == ".";

                if line == "." {
                    in_data = false;
                } else if line == "DATA" {
                    in_data = true;
                }

                received.push(line);
                if done {
                    break;
                }
            }

            stream.write_all(reply.as_bytes()).await?;
            stream.flush().await?;
        }

        Ok(received)
    }

    #[tokio::test]
    async fn lenient_mode_runs_the_full_script() -> anyhow::Result<()> {
        let (mut client, server) = tokio::io::duplex(8192);
        let task = tokio::spawn(async move {
            script_server(
                server,
                &[
                    "250 hello\r\n",
                    "250 ok\r\n",
                    "550 no such user\r\n", // ignored in lenient mode
                    "354 go\r\n",
                    "250 accepted\r\n",
                    "221 bye\r\n",
                ],
            )
            .await
        });

        let relay = relay(Config::default());
        relay
            .converse(&mut client, "<a@x.com>", "<b@y.com>", "Hello\r\n")
            .await?;

        let received = task.await??;
        assert_eq!(
            received,
            vec![
                "HELO localhost",
                "MAIL FROM:<a@x.com>",
                "RCPT TO:<b@y.com>",
                "DATA",
                "Hello",
                "",
                ".",
                "QUIT",
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn strict_mode_fails_on_rejection() -> anyhow::Result<()> {
        let (mut client, server) = tokio::io::duplex(8192);
        let task = tokio::spawn(async move {
            script_server(server, &["250 hello\r\n", "250 ok\r\n", "550 no such user\r\n"]).await
        });

        let relay = relay(Config {
            check_replies: true,
            ..Config::default()
        });
        let err = relay
            .converse(&mut client, "<a@x.com>", "<b@y.com>", "Hello\r\n")
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Rejected(_)));
        drop(client);
        task.await??;

        Ok(())
    }

    #[tokio::test]
    async fn early_disconnect_aborts() {
        let (mut client, server) = tokio::io::duplex(1024);
        drop(server);

        let relay = relay(Config::default());
        let err = relay
            .converse(&mut client, "<a@x.com>", "<b@y.com>", "Hello\r\n")
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Disconnected));
    }

    #[tokio::test]
    async fn silent_remote_times_out() {
        let (mut client, _server) = tokio::io::duplex(1024);

        let relay = relay(Config {
            timeout: Duration::from_millis(50),
            ..Config::default()
        });
        let err = relay
            .converse(&mut client, "<a@x.com>", "<b@y.com>", "Hello\r\n")
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Timeout));
    }

    #[tokio::test]
    async fn no_mx_records_is_a_resolution_failure() {
        let relay = relay(Config::default());
        let err = relay
            .relay("<a@x.com>", "<b@y.com>", "Hello\r\n")
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Resolve(ResolveError::NoRecords)));
    }

    #[tokio::test]
    async fn connect_failure_aborts_the_attempt() -> anyhow::Result<()> {
        // Bind to grab a port nothing listens on, then release it.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        drop(listener);

        let relay = Relay::new(
            StaticMx(vec![MxRecord {
                host: "127.0.0.1".to_owned(),
                preference: 10,
            }]),
            Config {
                port,
                timeout: Duration::from_secs(1),
                ..Config::default()
            },
        );

        let err = relay
            .relay("<a@x.com>", "<b@y.com>", "Hello\r\n")
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Io(_) | RelayError::Timeout));

        Ok(())
    }
}
