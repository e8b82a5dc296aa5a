use std::{sync::Arc, time::Duration};

use tokio::io::{AsyncRead, AsyncWrite};

use crate::forward::Forward;

use self::session::Session;

pub mod session;

#[derive(Debug, Clone)]
pub struct Config {
    /// Name announced in the service-ready banner.
    pub hostname: String,
    /// How long to wait for the next line from the client.
    pub command_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_owned(),
            command_timeout: Duration::from_secs(300),
        }
    }
}

pub struct Server<F> {
    config: Config,
    forward: Arc<F>,
}

impl<F: Forward> Server<F> {
    pub fn new(config: Config, forward: Arc<F>) -> Self {
        Self { config, forward }
    }

    pub fn accept<IO: AsyncRead + AsyncWrite + Unpin>(&self, stream: IO) -> Session<IO, F> {
        Session::new(stream, self.config.clone(), self.forward.clone())
    }
}
