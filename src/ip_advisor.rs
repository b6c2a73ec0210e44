// IP inventory advisor: per-address occupancy map over a subnet, plus
// free-address suggestions for allocation.

use crate::device_repo::DeviceRepo;
use crate::models::{
    Device, IpMap, IpMapEntry, IpMapStats, IpStatus, ONLINE_CUTOFF_MINUTES,
};
use crate::probe::Prober;
use chrono::{DateTime, Utc};
use ipnetwork::Ipv4Network;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Addresses seen within this many days count as in use.
pub const DEFAULT_DAYS_THRESHOLD: i64 = 7;

const SUGGESTION_PING_TIMEOUT: Duration = Duration::from_millis(500);

fn status_of(device: Option<&Device>, days_threshold: i64, now: DateTime<Utc>) -> IpStatus {
    match device {
        None => IpStatus::Free,
        Some(d) => {
            let age = now.signed_duration_since(d.last_seen);
            if age <= chrono::Duration::minutes(ONLINE_CUTOFF_MINUTES) {
                IpStatus::Online
            } else if age.num_days() <= days_threshold {
                IpStatus::InUse
            } else {
                // Stale, but a sighting is never forgotten entirely.
                IpStatus::ProbablyFree
            }
        }
    }
}

fn usable_addresses(net: Ipv4Network) -> impl Iterator<Item = Ipv4Addr> {
    let network = net.network();
    let broadcast = net.broadcast();
    net.iter()
        .filter(move |ip| net.prefix() >= 31 || (*ip != network && *ip != broadcast))
}

/// Builds the occupancy map for every usable address of the subnet.
pub async fn compute_ip_map(
    repo: &DeviceRepo,
    net: Ipv4Network,
    days_threshold: i64,
    now: DateTime<Utc>,
) -> anyhow::Result<IpMap> {
    let devices = repo.list().await?;
    let by_ip: HashMap<&str, &Device> =
        devices.iter().map(|d| (d.ip.as_str(), d)).collect();

    let mut ips = Vec::new();
    let mut stats = IpMapStats {
        total: 0,
        free: 0,
        probably_free: 0,
        in_use: 0,
        online: 0,
        subnet: net.to_string(),
        days_threshold,
    };

    for ip in usable_addresses(net) {
        let ip_str = ip.to_string();
        let device = by_ip.get(ip_str.as_str()).copied();
        let status = status_of(device, days_threshold, now);
        match status {
            IpStatus::Free => stats.free += 1,
            IpStatus::ProbablyFree => stats.probably_free += 1,
            IpStatus::InUse => stats.in_use += 1,
            IpStatus::Online => stats.online += 1,
        }
        stats.total += 1;
        ips.push(IpMapEntry {
            ip: ip_str,
            status,
            hostname: device.and_then(|d| d.hostname.clone()),
            last_seen: device.map(|d| d.last_seen),
            last_seen_days: device.map(|d| now.signed_duration_since(d.last_seen).num_days()),
            mac: device.and_then(|d| d.mac.clone()),
            device_type: device.map(|d| d.device_type),
            vendor: device.and_then(|d| d.vendor.clone()),
        });
    }
    Ok(IpMap { ips, stats })
}

/// Picks up to `count` candidate addresses for allocation. Never-seen
/// addresses are preferred over stale ones, both drawn in random order so
/// repeated callers do not pile onto the same address. With a prober, each
/// candidate is pinged and responders are discarded.
pub async fn suggest_free_ips<P: Prober>(
    repo: &DeviceRepo,
    net: Ipv4Network,
    days_threshold: i64,
    count: usize,
    now: DateTime<Utc>,
    prober: Option<&P>,
) -> anyhow::Result<Vec<IpMapEntry>> {
    let map = compute_ip_map(repo, net, days_threshold, now).await?;
    let mut free: Vec<IpMapEntry> = Vec::new();
    let mut probably: Vec<IpMapEntry> = Vec::new();
    for entry in map.ips {
        match entry.status {
            IpStatus::Free => free.push(entry),
            IpStatus::ProbablyFree => probably.push(entry),
            _ => {}
        }
    }
    // ThreadRng is not Send; keep it out of scope across the awaits below.
    {
        let mut rng = rand::thread_rng();
        free.shuffle(&mut rng);
        probably.shuffle(&mut rng);
    }

    let mut suggestions = Vec::with_capacity(count);
    for entry in free.into_iter().chain(probably) {
        if suggestions.len() >= count {
            break;
        }
        if let Some(prober) = prober {
            let ip: Ipv4Addr = entry.ip.parse()?;
            if prober.ping(ip, SUGGESTION_PING_TIMEOUT).await.is_some() {
                tracing::debug!(ip = %entry.ip, "suggested address answered a ping, discarded");
                continue;
            }
        }
        suggestions.push(entry);
    }
    Ok(suggestions)
}

/// Guesses the network to map from the inventory: the /24 holding the most
/// known devices.
pub fn infer_subnet(devices: &[Device]) -> Option<Ipv4Network> {
    let mut counts: HashMap<Ipv4Addr, usize> = HashMap::new();
    for device in devices {
        let Ok(ip) = device.ip.parse::<Ipv4Addr>() else {
            continue;
        };
        let octets = ip.octets();
        let base = Ipv4Addr::new(octets[0], octets[1], octets[2], 0);
        *counts.entry(base).or_default() += 1;
    }
    let (base, _) = counts.into_iter().max_by_key(|(_, n)| *n)?;
    Ipv4Network::new(base, 24).ok()
}
