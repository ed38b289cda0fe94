//! Candidate generation
//!
//! Turns a connection snapshot into the ordered lists offered to the user.
//! The primary order is shared with the `default_target` setting, so entries
//! must never be reordered.

use super::users::UserDirectory;
use crate::types::{operand, Candidate, ConnectionDescriptor, Field, Operator, OperatorType};
use ipnet::IpNet;
use std::net::IpAddr;
use std::sync::Arc;

/// IPv4 prefixes offered as network candidates, widest last
const IPV4_PREFIXES: [u8; 3] = [24, 16, 8];
const IPV6_PREFIXES: [u8; 2] = [64, 128];

/// Candidates for one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidates {
    /// Entries of the main selector
    pub primary: Vec<Candidate>,
    /// Destination-only entries for the advanced dst-ip selector
    pub destination: Vec<Candidate>,
}

/// Builds candidate lists from connection snapshots
#[derive(Clone)]
pub struct CandidateGenerator {
    users: Arc<dyn UserDirectory>,
}

impl CandidateGenerator {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }

    /// Generate both candidate lists.
    ///
    /// `is_local` controls whether the user id is resolved to a name; remote
    /// peers have their own user database.
    pub fn generate(&self, conn: &ConnectionDescriptor, is_local: bool) -> Candidates {
        let dst_ip = conn.dst_ip.parse::<IpAddr>().ok();
        if dst_ip.is_none() {
            tracing::debug!("Unparsable destination {:?}, skipping IP candidates", conn.dst_ip);
        }

        let mut primary = Vec::new();

        if conn.process_id > 0 {
            primary.push(Candidate::new(
                Field::ProcPath,
                "from this executable",
                Operator::simple(operand::PROCESS_PATH, conn.process_path.clone()),
            ));
        }

        primary.push(Candidate::new(
            Field::ProcArgs,
            "from this command line",
            Operator::simple(operand::PROCESS_COMMAND, conn.command_line()),
        ));

        primary.push(Candidate::new(
            Field::DstPort,
            format!("to port {}", conn.dst_port),
            Operator::simple(operand::DEST_PORT, conn.dst_port.to_string()),
        ));
        primary.push(dst_ip_candidate(conn));

        if conn.user_id >= 0 {
            primary.push(Candidate::new(
                Field::UserId,
                format!("from user {}", self.user_label(conn.user_id, is_local)),
                Operator::simple(operand::USER_ID, conn.user_id.to_string()),
            ));
        }

        primary.extend(network_candidates(dst_ip));
        primary.extend(host_candidates(conn));
        primary.extend(regex_ip_candidates(dst_ip, &conn.dst_ip));

        let mut destination = vec![dst_ip_candidate(conn)];
        destination.extend(network_candidates(dst_ip));
        destination.extend(host_candidates(conn));
        destination.extend(regex_ip_candidates(dst_ip, &conn.dst_ip));

        Candidates {
            primary,
            destination,
        }
    }

    /// "1000 (alice)" for resolvable local users, bare id otherwise
    pub fn user_label(&self, user_id: i64, is_local: bool) -> String {
        let name = u32::try_from(user_id)
            .ok()
            .filter(|_| is_local)
            .and_then(|uid| self.users.user_name(uid));

        match name {
            Some(name) => format!("{} ({})", user_id, name),
            None => user_id.to_string(),
        }
    }
}

fn dst_ip_candidate(conn: &ConnectionDescriptor) -> Candidate {
    Candidate::new(
        Field::DstIp,
        format!("to {}", conn.dst_ip),
        Operator::simple(operand::DEST_IP, conn.dst_ip.clone()),
    )
}

fn network_candidates(dst_ip: Option<IpAddr>) -> Vec<Candidate> {
    let Some(ip) = dst_ip else {
        return Vec::new();
    };

    let prefixes: &[u8] = match ip {
        IpAddr::V4(_) => &IPV4_PREFIXES,
        IpAddr::V6(_) => &IPV6_PREFIXES,
    };

    prefixes
        .iter()
        .filter_map(|&prefix| IpNet::new(ip, prefix).ok())
        .map(|net| {
            let net = net.trunc().to_string();
            Candidate::new(
                Field::DstNetwork,
                format!("to {}", net),
                Operator::new(OperatorType::Network, operand::DEST_NETWORK, net),
            )
        })
        .collect()
}

fn host_candidates(conn: &ConnectionDescriptor) -> Vec<Candidate> {
    let host = conn.dst_host.as_str();
    if host.is_empty() || host == conn.dst_ip {
        return Vec::new();
    }

    let mut candidates = vec![Candidate::new(
        Field::DstHost,
        host,
        Operator::simple(operand::DEST_HOST, host),
    )];

    candidates.extend(host_wildcards(host).into_iter().map(|pattern| {
        Candidate::new(
            Field::RegexHost,
            format!("to {}", pattern),
            Operator::new(
                OperatorType::Regexp,
                operand::DEST_HOST,
                wildcard_to_regex(&pattern),
            ),
        )
    }));

    candidates
}

/// Wildcards widening from the host's parent domain towards its root.
///
/// Neither the host itself nor the bare two-label root is produced; a
/// two-label host gets a single `*host` pattern.
pub fn host_wildcards(host: &str) -> Vec<String> {
    let parents: Vec<&str> = host.split('.').skip(1).collect();

    match parents.len() {
        0 => Vec::new(),
        1 => vec![format!("*{}", host)],
        n => (0..n - 1)
            .map(|i| format!("*.{}", parents[i..].join(".")))
            .collect(),
    }
}

fn regex_ip_candidates(dst_ip: Option<IpAddr>, raw: &str) -> Vec<Candidate> {
    if !matches!(dst_ip, Some(IpAddr::V4(_))) {
        return Vec::new();
    }

    let octets: Vec<&str> = raw.split('.').collect();
    (1..octets.len())
        .map(|len| {
            let pattern = format!("{}.*", octets[..len].join("."));
            Candidate::new(
                Field::RegexIp,
                format!("to {}", pattern),
                Operator::new(OperatorType::Regexp, operand::DEST_IP, wildcard_to_regex(&pattern)),
            )
        })
        .collect()
}

/// Escape dots and expand `*` into `.*`
pub fn wildcard_to_regex(pattern: &str) -> String {
    pattern.replace('.', "\\.").replace('*', ".*")
}
