use std::sync::Arc;

use line::{Connection, ReadLineError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tracing::{debug, instrument};

use crate::{
    command::Command,
    forward::Forward,
    server::Config,
    transaction::{Mode, Transaction},
};

/// SMTP session with a client.
///
/// Lines are handled strictly in arrival order, one reply per line; there
/// is no pipelining. Completing a transaction blocks the session on the
/// [`Forward`] hook before the reply goes out.
pub struct Session<IO: AsyncRead + AsyncWrite + Unpin, F: Forward> {
    connection: Connection<IO>,
    transaction: Transaction,
    config: Config,
    forward: Arc<F>,
    closed: bool,
}

impl<IO: AsyncRead + AsyncWrite + Unpin, F: Forward> Session<IO, F> {
    pub fn new(stream: IO, config: Config, forward: Arc<F>) -> Self {
        Self {
            connection: Connection::new(stream),
            transaction: Transaction::default(),
            config,
            forward,
            closed: false,
        }
    }

    /// Drive the session to completion: greet, then read and answer lines
    /// until the client quits, disconnects or the read deadline expires.
    #[instrument(skip_all)]
    pub async fn run(&mut self) -> std::io::Result<()> {
        self.connection
            .write_flush(format!("220 {} SMTP Service Ready\r\n", self.config.hostname))
            .await?;

        let mut buf = Vec::new();
        while !self.closed {
            buf.clear();
            match timeout(self.config.command_timeout, self.connection.read_line(&mut buf)).await {
                Ok(Ok(())) => (),
                Ok(Err(ReadLineError::Eof)) => {
                    debug!("client disconnected");
                    break;
                }
                Ok(Err(ReadLineError::Io(e))) => return Err(e),
                Err(_) => {
                    debug!("timed out waiting for the next line");
                    return Err(std::io::ErrorKind::TimedOut.into());
                }
            }

            let line = String::from_utf8_lossy(&buf).into_owned();
            match self.transaction.mode() {
                Mode::Command => self.dispatch(&line).await?,
                Mode::DataCapture => self.capture(&line).await?,
            }
        }

        Ok(())
    }

    async fn dispatch(&mut self, line: &str) -> std::io::Result<()> {
        match line.parse::<Command>() {
            Ok(Command::Helo) => self.connection.write_flush("250 Hello\r\n").await,
            Ok(Command::Mail { reverse_path }) => {
                self.transaction.mail_from = reverse_path;
                self.connection.write_flush("250 OK\r\n").await
            }
            Ok(Command::Rcpt { forward_path }) => {
                self.transaction.rcpt_to = forward_path;
                self.connection.write_flush("250 OK\r\n").await
            }
            Ok(Command::Data) => {
                if self.transaction.ready_for_data() {
                    self.transaction.begin_data();
                    self.connection
                        .write_flush("354 End data with <CR><LF>.<CR><LF>\r\n")
                        .await
                } else {
                    self.connection
                        .write_flush("503 Bad sequence of commands\r\n")
                        .await
                }
            }
            Ok(Command::Rset) => {
                self.transaction.reset();
                self.connection.write_flush("250 OK\r\n").await
            }
            Ok(Command::Noop) => self.connection.write_flush("250 OK\r\n").await,
            Ok(Command::Quit) => {
                self.closed = true;
                self.connection.write_flush("221 Bye\r\n").await?;
                self.connection.shutdown().await
            }
            Err(_) => {
                self.connection
                    .write_flush("500 Unrecognized command\r\n")
                    .await
            }
        }
    }

    /// One line of message data. `.` completes the transaction and triggers
    /// delivery; `RSET` abandons the capture; everything else is body.
    async fn capture(&mut self, line: &str) -> std::io::Result<()> {
        if line == "." {
            let result = self
                .forward
                .forward(
                    &self.transaction.mail_from,
                    &self.transaction.rcpt_to,
                    self.transaction.body(),
                )
                .await;
            self.transaction.reset();

            match result {
                Ok(()) => {
                    self.connection
                        .write_flush("250 OK: Email relayed\r\n")
                        .await
                }
                Err(e) => {
                    debug!(%e, "delivery failed");
                    self.connection
                        .write_flush("550 Failed to relay email\r\n")
                        .await
                }
            }
        } else if line.eq_ignore_ascii_case("RSET") {
            self.transaction.reset();
            self.connection.write_flush("250 OK\r\n").await
        } else {
            self.transaction.push_line(line);
            Ok(())
        }
    }
}
