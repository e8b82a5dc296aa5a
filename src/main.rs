use std::sync::Arc;
use std::time::SystemTime;

use tokio::net::TcpListener;
use tracing::{error, info};

mod config;

/// Bridges completed inbound transactions to the outbound relay engine.
struct Outbound {
    relay: relay::Relay<relay::DnsResolver>,
}

#[async_trait::async_trait]
impl smtp::Forward for Outbound {
    async fn forward(
        &self,
        mail_from: &str,
        rcpt_to: &str,
        body: &str,
    ) -> Result<(), smtp::ForwardError> {
        let body = relay::ensure_headers(body, mail_from, SystemTime::now());
        self.relay
            .relay(mail_from, rcpt_to, &body)
            .await
            .map_err(|e| {
                error!("failed to relay: {e}");
                smtp::ForwardError(e.to_string())
            })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::Config::from_env()?;

    let resolver = relay::DnsResolver::new()?;
    let outbound = Arc::new(Outbound {
        relay: relay::Relay::new(resolver, config.relay.clone()),
    });
    let server = smtp::Server::new(config.smtp.clone(), outbound);

    let listener = TcpListener::bind(&config.listen).await?;
    info!("Listening on {}", listener.local_addr()?);

    loop {
        let (socket, addr) = listener.accept().await?;
        info!("Got connection from: {}", addr);

        let mut session = server.accept(socket);
        tokio::spawn(async move {
            if let Err(e) = session.run().await {
                error!("session error: {e:?}");
            }
        });
    }
}
