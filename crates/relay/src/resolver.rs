use async_trait::async_trait;
use hickory_resolver::TokioResolver;
use tracing::debug;

/// One mail-exchanger record, in resolver-returned order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxRecord {
    pub host: String,
    pub preference: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("resolver init failed: {0}")]
    Init(String),
    #[error("mx query failed: {0}")]
    Query(String),
    #[error("no mx records found")]
    NoRecords,
}

/// DNS seam: one MX-type query for a domain.
#[async_trait]
pub trait MxLookup: Send + Sync {
    async fn lookup(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError>;
}

/// System-configured resolver.
pub struct DnsResolver {
    inner: TokioResolver,
}

impl DnsResolver {
    pub fn new() -> Result<Self, ResolveError> {
        let inner = TokioResolver::builder_tokio()
            .map_err(|e| ResolveError::Init(e.to_string()))?
            .build();
        Ok(Self { inner })
    }
}

#[async_trait]
impl MxLookup for DnsResolver {
    async fn lookup(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError> {
        let response = self
            .inner
            .mx_lookup(domain)
            .await
            .map_err(|e| ResolveError::Query(e.to_string()))?;

        Ok(response
            .iter()
            .map(|mx| MxRecord {
                host: mx.exchange().to_string(),
                preference: mx.preference(),
            })
            .collect())
    }
}

/// Pick the exchanger to deliver to: the record with the strictly smallest
/// preference wins, and on a tie the record seen first keeps the slot.
/// One trailing `.` is stripped from the winning host.
pub fn select_preferred(records: &[MxRecord]) -> Option<String> {
    let mut best: Option<&MxRecord> = None;
    for record in records {
        match best {
            Some(b) if record.preference >= b.preference => (),
            _ => best = Some(record),
        }
    }

    best.map(|b| b.host.strip_suffix('.').unwrap_or(&b.host).to_owned())
}

/// Resolve a domain to its preferred mail exchanger.
pub async fn resolve_exchanger<R: MxLookup + ?Sized>(
    resolver: &R,
    domain: &str,
) -> Result<String, ResolveError> {
    let records = resolver.lookup(domain).await?;
    debug!(domain, records = records.len(), "mx lookup");
    select_preferred(&records).ok_or(ResolveError::NoRecords)
}
