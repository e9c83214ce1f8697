//! Outbound fetch gatekeeper.
//!
//! A caller-supplied URL goes through admission before any socket is opened:
//!
//! 1. Parse. Unparseable input or a URL without a host is `MalformedUrl`.
//! 2. Scheme must be in the policy's permitted set.
//! 3. Userinfo (`user:pass@host`) is refused outright.
//! 4. Host must equal one allowlist entry exactly (both sides normalized by
//!    the `url` parser).
//! 5. Host is resolved. Unless the host is exempted, every resolved address
//!    must be publicly routable.
//!
//! Only an admitted URL is fetched, with redirects disabled and the
//! connection pinned to the addresses checked in step 5. One deadline, set
//! when the request arrives, bounds resolution and the exchange together; the
//! body is bounded by the policy byte cap.

use crate::config::FetchPolicy;
use crate::errors::AccountError;
use crate::models::FetchResult;
use crate::observability::metrics::record_fetch;
use reqwest::{redirect, Client};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, instrument, warn};
use url::{Host, Url};

/// A URL that passed admission, with the addresses it may connect to.
#[derive(Debug)]
struct AdmittedRequest {
    url: Url,
    host: String,
    /// Set for domain hosts; IP literals need no pinning.
    pinned_addrs: Option<Vec<SocketAddr>>,
}

#[derive(Debug, Clone)]
pub struct FetchGatekeeper {
    policy: Arc<FetchPolicy>,
}

impl FetchGatekeeper {
    pub fn new(policy: Arc<FetchPolicy>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Admit and, if allowed, perform one GET for `raw_url`.
    ///
    /// # Errors
    ///
    /// - `AccountError::MalformedUrl` if the URL cannot be parsed or has no host
    /// - `AccountError::NotAllowed` if any admission check fails
    /// - `AccountError::Timeout` if resolution or the exchange exceeds the bound
    /// - `AccountError::TransportFailure` for any other network failure
    #[instrument(skip_all, name = "account.fetch")]
    pub async fn fetch(&self, raw_url: &str) -> Result<FetchResult, AccountError> {
        let start = Instant::now();

        let result = self.fetch_by(raw_url, start + self.policy.timeout()).await;

        record_fetch(outcome_label(&result), start.elapsed());
        result
    }

    async fn fetch_by(
        &self,
        raw_url: &str,
        deadline: Instant,
    ) -> Result<FetchResult, AccountError> {
        let admitted = self.admit(raw_url, deadline).await?;
        self.execute(admitted, deadline).await
    }

    async fn admit(
        &self,
        raw_url: &str,
        deadline: Instant,
    ) -> Result<AdmittedRequest, AccountError> {
        let url = Url::parse(raw_url.trim())
            .map_err(|e| AccountError::MalformedUrl(e.to_string()))?;

        if !self.policy.is_scheme_allowed(url.scheme()) {
            return Err(reject(format!(
                "scheme '{}' is not permitted",
                url.scheme()
            )));
        }

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => return Err(AccountError::MalformedUrl("URL has no host".to_string())),
        };

        if !url.username().is_empty() || url.password().is_some() {
            return Err(reject("credentials in URL are not permitted".to_string()));
        }

        if !self.policy.is_host_allowed(&host) {
            warn!(target: "account.services.fetch", host = %host, "Host not in allowlist");
            return Err(reject(format!("host '{}' is not in the allowlist", host)));
        }

        let port = url
            .port_or_known_default()
            .ok_or_else(|| AccountError::MalformedUrl("URL has no port".to_string()))?;

        let (addrs, pin) = match url.host() {
            Some(Host::Ipv4(ip)) => (vec![SocketAddr::new(IpAddr::V4(ip), port)], false),
            Some(Host::Ipv6(ip)) => (vec![SocketAddr::new(IpAddr::V6(ip), port)], false),
            Some(Host::Domain(domain)) => (resolve(domain, port, deadline).await?, true),
            None => return Err(AccountError::MalformedUrl("URL has no host".to_string())),
        };

        if !self.policy.is_private_exempt(&host) {
            if let Some(addr) = addrs.iter().find(|addr| is_non_public(addr.ip())) {
                warn!(
                    target: "account.services.fetch",
                    host = %host,
                    addr = %addr.ip(),
                    "Host resolves to a non-public address"
                );
                return Err(reject(format!("host '{}' resolves to a non-public address", host)));
            }
        }

        Ok(AdmittedRequest {
            url,
            host,
            pinned_addrs: pin.then_some(addrs),
        })
    }

    async fn execute(
        &self,
        admitted: AdmittedRequest,
        deadline: Instant,
    ) -> Result<FetchResult, AccountError> {
        let mut builder = Client::builder()
            .redirect(redirect::Policy::none())
            .no_proxy()
            .timeout(self.policy.timeout());

        if let Some(addrs) = &admitted.pinned_addrs {
            builder = builder.resolve_to_addrs(&admitted.host, addrs);
        }

        let client = builder.build().map_err(|e| {
            error!(target: "account.services.fetch", error = %e, "Failed to build HTTP client");
            AccountError::Internal
        })?;

        let exchange = read_capped(&client, admitted.url, self.policy.max_response_bytes());

        let result = timeout_at(deadline, exchange)
            .await
            .map_err(|_| AccountError::Timeout)
            .and_then(|r| r);

        match &result {
            Ok(fetched) => debug!(
                target: "account.services.fetch",
                host = %admitted.host,
                status_code = fetched.status_code,
                truncated = fetched.truncated,
                "Fetch completed"
            ),
            Err(e) => warn!(
                target: "account.services.fetch",
                host = %admitted.host,
                error = %e,
                "Fetch failed"
            ),
        }

        result
    }
}

async fn resolve(
    domain: &str,
    port: u16,
    deadline: Instant,
) -> Result<Vec<SocketAddr>, AccountError> {
    let lookup = tokio::net::lookup_host((domain, port));

    let addrs: Vec<SocketAddr> = timeout_at(deadline, lookup)
        .await
        .map_err(|_| AccountError::Timeout)?
        .map_err(|e| {
            AccountError::TransportFailure(format!("failed to resolve '{}': {}", domain, e))
        })?
        .collect();

    if addrs.is_empty() {
        return Err(AccountError::TransportFailure(format!(
            "'{}' resolved to no addresses",
            domain
        )));
    }

    Ok(addrs)
}

/// Send the request and keep at most `max_bytes` of the body.
async fn read_capped(
    client: &Client,
    url: Url,
    max_bytes: usize,
) -> Result<FetchResult, AccountError> {
    let mut response = client.get(url).send().await.map_err(transport_error)?;
    let status_code = response.status().as_u16();

    let mut body: Vec<u8> = Vec::with_capacity(max_bytes.min(8 * 1024));
    let mut truncated = false;

    while let Some(chunk) = response.chunk().await.map_err(transport_error)? {
        let remaining = max_bytes.saturating_sub(body.len());
        if chunk.len() > remaining {
            body.extend_from_slice(chunk.get(..remaining).unwrap_or_default());
            truncated = true;
            break;
        }
        body.extend_from_slice(&chunk);
    }

    Ok(FetchResult {
        body_prefix: String::from_utf8_lossy(&body).into_owned(),
        status_code,
        truncated,
    })
}

fn transport_error(e: reqwest::Error) -> AccountError {
    if e.is_timeout() {
        AccountError::Timeout
    } else {
        AccountError::TransportFailure(e.to_string())
    }
}

fn reject(reason: String) -> AccountError {
    AccountError::NotAllowed(reason)
}

fn outcome_label(result: &Result<FetchResult, AccountError>) -> &'static str {
    match result {
        Ok(_) => "completed",
        Err(AccountError::MalformedUrl(_)) => "rejected_malformed",
        Err(AccountError::NotAllowed(_)) => "rejected_not_allowed",
        Err(AccountError::Timeout) => "failed_timeout",
        Err(_) => "failed_transport",
    }
}

/// Whether `ip` is anything other than a publicly routable unicast address.
pub fn is_non_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_non_public_v4(v4),
        IpAddr::V6(v6) => is_non_public_v6(v6),
    }
}

fn is_non_public_v4(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();

    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_multicast()
        // 0.0.0.0/8 "this network"
        || a == 0
        // 100.64.0.0/10 shared address space (CGNAT)
        || (a == 100 && (b & 0xc0) == 64)
        // 198.18.0.0/15 benchmarking
        || (a == 198 && (b & 0xfe) == 18)
        // 240.0.0.0/4 reserved
        || a >= 240
}

fn is_non_public_v6(ip: Ipv6Addr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() {
        return true;
    }

    if let Some(v4) = embedded_ipv4(ip) {
        return is_non_public_v4(v4);
    }

    let [s0, s1, s2, ..] = ip.segments();

    // 64:ff9b:1::/48 local-use NAT64
    (s0 == 0x0064 && s1 == 0xff9b && s2 == 0x0001)
        || ip.is_multicast()
        // fc00::/7 unique local
        || (s0 & 0xfe00) == 0xfc00
        // fe80::/10 link-local
        || (s0 & 0xffc0) == 0xfe80
        // fec0::/10 deprecated site-local
        || (s0 & 0xffc0) == 0xfec0
        // 2001:db8::/32 documentation
        || (s0 == 0x2001 && s1 == 0x0db8)
}

/// The IPv4 address a translation or tunnelling prefix carries, if any.
///
/// Covers IPv4-mapped `::ffff:0:0/96`, IPv4-compatible `::/96`, NAT64
/// `64:ff9b::/96` and 6to4 `2002::/16`.
fn embedded_ipv4(ip: Ipv6Addr) -> Option<Ipv4Addr> {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return Some(v4);
    }

    let [_, _, t0, t1, t2, t3, .., l0, l1, l2, l3] = ip.octets();

    match ip.segments() {
        [0, 0, 0, 0, 0, 0, _, _] | [0x0064, 0xff9b, 0, 0, 0, 0, _, _] => {
            Some(Ipv4Addr::new(l0, l1, l2, l3))
        }
        [0x2002, ..] => Some(Ipv4Addr::new(t0, t1, t2, t3)),
        _ => None,
    }
}
