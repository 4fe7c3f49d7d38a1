//! Decoder for network-interface enumeration.
//!
//! Produces the addresses worth acting on: loopback interfaces are skipped
//! entirely, and only non-loopback IPv4 literals that are not known
//! infrastructure addresses survive. Each survivor gets a display label of the
//! form `{address}_{hostname}.`, cut to the rename length ceiling.

use super::{malformed, DecodedResult, ResultDecoder};
use crate::agent::Agent;
use crate::config::DecodeConfig;
use crate::dispatch::CommandKind;
use crate::error::FleetError;
use serde::Deserialize;
use std::net::Ipv4Addr;

#[derive(Debug, Deserialize)]
struct IfconfigPayload {
    #[serde(default, alias = "NetInterfaces", alias = "interfaces")]
    net_interfaces: Vec<NetInterface>,
}

#[derive(Debug, Deserialize)]
struct NetInterface {
    #[serde(alias = "Name")]
    name: String,
    #[serde(default, alias = "IPAddresses", alias = "addresses")]
    ip_addresses: Vec<String>,
}

/// An address that passed filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressCandidate {
    pub interface: String,
    pub address: Ipv4Addr,
    pub label: String,
}

/// Filtered interface enumeration for one agent
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InterfaceReport {
    pub candidates: Vec<AddressCandidate>,
}

/// Compose the `{address}_{hostname}.` label, truncated to `max_len` characters.
pub fn display_label(address: Ipv4Addr, hostname: &str, max_len: usize) -> String {
    format!("{}_{}.", address, hostname)
        .chars()
        .take(max_len)
        .collect()
}

pub struct InterfaceDecoder {
    loopback_interfaces: Vec<String>,
    excluded_addresses: Vec<String>,
    max_label_len: usize,
}

impl InterfaceDecoder {
    pub fn new(config: &DecodeConfig) -> Self {
        Self {
            loopback_interfaces: config.loopback_interfaces.clone(),
            excluded_addresses: config.excluded_addresses.clone(),
            max_label_len: config.max_label_len,
        }
    }

    fn accept(&self, raw: &str) -> Option<Ipv4Addr> {
        let literal = raw.split_once('/').map(|(addr, _)| addr).unwrap_or(raw);
        if self.excluded_addresses.iter().any(|x| x == literal) {
            return None;
        }
        let address: Ipv4Addr = literal.parse().ok()?;
        if address.is_loopback() {
            return None;
        }
        Some(address)
    }

    fn candidates(&self, hostname: &str, interfaces: &[NetInterface]) -> Vec<AddressCandidate> {
        interfaces
            .iter()
            .filter(|iface| !self.loopback_interfaces.contains(&iface.name))
            .flat_map(|iface| {
                iface.ip_addresses.iter().filter_map(move |raw| {
                    self.accept(raw).map(|address| AddressCandidate {
                        interface: iface.name.clone(),
                        address,
                        label: display_label(address, hostname, self.max_label_len),
                    })
                })
            })
            .collect()
    }
}

impl ResultDecoder for InterfaceDecoder {
    fn kind(&self) -> CommandKind {
        CommandKind::Ifconfig
    }

    fn decode(&self, agent: &Agent, payload: &[u8]) -> Result<DecodedResult, FleetError> {
        let parsed: IfconfigPayload = serde_json::from_slice(payload)
            .map_err(|e| malformed(agent, CommandKind::Ifconfig, e))?;
        Ok(DecodedResult::Interfaces(InterfaceReport {
            candidates: self.candidates(agent.hostname(), &parsed.net_interfaces),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentInfo, AgentKind};
    use crate::types::AgentId;

    fn agent(hostname: &str) -> Agent {
        Agent::new(
            AgentKind::StoreAndForward,
            AgentInfo {
                id: AgentId::from("b1"),
                name: "B1".to_string(),
                hostname: hostname.to_string(),
                is_dead: false,
            },
        )
    }

    fn decode(hostname: &str, payload: &str) -> InterfaceReport {
        let decoder = InterfaceDecoder::new(&DecodeConfig::default());
        match decoder.decode(&agent(hostname), payload.as_bytes()).unwrap() {
            DecodedResult::Interfaces(report) => report,
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_filters_loopback_and_bridge() {
        let report = decode(
            "web1",
            r#"{"net_interfaces":[
                {"name":"lo","ip_addresses":["127.0.0.1/8"]},
                {"name":"eth0","ip_addresses":["10.0.0.5/24","172.17.0.1/16"]}
            ]}"#,
        );
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].label, "10.0.0.5_web1.");
        assert_eq!(report.candidates[0].interface, "eth0");
    }

    #[test]
    fn test_excludes_ipv6_and_loopback_addresses_on_other_interfaces() {
        let report = decode(
            "db",
            r#"{"NetInterfaces":[
                {"Name":"ens3","IPAddresses":["fe80::1/64","127.0.1.1/8","192.168.4.20/24","not-an-ip"]}
            ]}"#,
        );
        let labels: Vec<&str> = report.candidates.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["192.168.4.20_db."]);
    }

    #[test]
    fn test_bridge_exclusion_is_exact() {
        let report = decode(
            "h",
            r#"{"net_interfaces":[{"name":"eth0","ip_addresses":["172.17.0.10/16"]}]}"#,
        );
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].address, Ipv4Addr::new(172, 17, 0, 10));
    }

    #[test]
    fn test_long_labels_are_truncated() {
        let hostname = "a-very-long-hostname-in-the-datacenter";
        let report = decode(
            hostname,
            r#"{"net_interfaces":[{"name":"eth0","ip_addresses":["10.200.100.250/16"]}]}"#,
        );
        let label = &report.candidates[0].label;
        assert_eq!(label.chars().count(), 32);
        assert!(label.starts_with("10.200.100.250_a-very-long"));
    }

    #[test]
    fn test_display_label_short_is_untouched() {
        assert_eq!(
            display_label(Ipv4Addr::new(10, 0, 0, 5), "web1", 32),
            "10.0.0.5_web1."
        );
    }

    #[test]
    fn test_empty_enumeration_is_not_an_error() {
        let report = decode("h", r#"{"net_interfaces":[]}"#);
        assert!(report.candidates.is_empty());
    }
}
