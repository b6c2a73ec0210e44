// Real probes: ICMP via surge-ping, TCP connect, reverse DNS.

use super::{PingReply, Prober};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use surge_ping::{Client, Config, IcmpPacket, PingIdentifier, PingSequence};
use tokio::net::TcpStream;

const REVERSE_DNS_TIMEOUT: Duration = Duration::from_secs(2);

pub struct SystemProber {
    /// None when the ICMP socket cannot be opened (missing privileges);
    /// liveness then relies on the TCP fallback ports.
    client: Option<Client>,
}

impl Default for SystemProber {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProber {
    pub fn new() -> Self {
        let client = match Client::new(&Config::default()) {
            Ok(c) => Some(c),
            Err(e) => {
                tracing::warn!(error = %e, "ICMP client unavailable, ping probes disabled");
                None
            }
        };
        Self { client }
    }
}

impl Prober for SystemProber {
    async fn ping(&self, ip: Ipv4Addr, timeout: Duration) -> Option<PingReply> {
        let client = self.client.as_ref()?;
        let payload = [0u8; 56];
        let mut pinger = client
            .pinger(IpAddr::V4(ip), PingIdentifier(rand::random::<u16>()))
            .await;
        pinger.timeout(timeout);
        match pinger.ping(PingSequence(0), &payload).await {
            Ok((packet, rtt)) => {
                let ttl = match packet {
                    IcmpPacket::V4(p) => p.get_ttl(),
                    IcmpPacket::V6(_) => None,
                };
                Some(PingReply { latency: rtt, ttl })
            }
            Err(_) => None,
        }
    }

    async fn tcp_probe(&self, ip: Ipv4Addr, port: u16, timeout: Duration) -> bool {
        matches!(
            tokio::time::timeout(timeout, TcpStream::connect((ip, port))).await,
            Ok(Ok(_))
        )
    }

    async fn reverse_dns(&self, ip: Ipv4Addr) -> Option<String> {
        // lookup_addr is synchronous; run it off the async worker threads.
        let task = tokio::task::spawn_blocking(move || {
            dns_lookup::lookup_addr(&IpAddr::V4(ip)).ok()
        });
        match tokio::time::timeout(REVERSE_DNS_TIMEOUT, task).await {
            Ok(Ok(Some(hostname))) if hostname != ip.to_string() => Some(hostname),
            _ => None,
        }
    }
}
