//! Port and VLAN allocation records handed out by the router-management
//! layer and consumed (never generated) by the orchestrator (see
//! Non-goals: "router provisioning").

use serde::{Deserialize, Serialize};

use crate::model::ids::InstanceId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortAllocation {
    pub instance_id: InstanceId,
    pub port: u16,
    pub protocol: PortProtocol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortProtocol {
    Tcp,
    Udp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VlanAllocation {
    pub instance_id: InstanceId,
    pub vlan_id: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_allocation_carries_protocol() {
        let allocation = PortAllocation {
            instance_id: InstanceId::new("tor-1").unwrap(),
            port: 9050,
            protocol: PortProtocol::Tcp,
        };
        assert_eq!(allocation.protocol, PortProtocol::Tcp);
    }
}
