use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub smtp: smtp::server::Config,
    pub relay: relay::Config,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let smtp = smtp::server::Config {
            hostname: var("MAILRELAY_HOSTNAME", "localhost"),
            command_timeout: Duration::from_secs(parsed(
                "MAILRELAY_COMMAND_TIMEOUT_SECS",
                300,
            )?),
        };

        let relay = relay::Config {
            helo_hostname: var("MAILRELAY_HELO_HOSTNAME", "localhost"),
            port: parsed("MAILRELAY_OUTBOUND_PORT", 25)?,
            timeout: Duration::from_secs(parsed("MAILRELAY_RELAY_TIMEOUT_SECS", 60)?),
            check_replies: parsed("MAILRELAY_CHECK_REPLIES", false)?,
        };

        Ok(Self {
            listen: var("MAILRELAY_LISTEN", "0.0.0.0:25"),
            smtp,
            relay,
        })
    }
}

fn var(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_owned())
}

fn parsed<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("invalid {name}")),
    }
}
