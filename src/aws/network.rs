/// VPC declaration: CIDR partitioning into subnet groups across AZs
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::str::FromStr;
use tracing::debug;

use crate::error::ContractViolation;

/// Smallest subnet AWS accepts
const MAX_SUBNET_PREFIX: u8 = 28;

/// AZ suffixes available for generated zone names
const AZ_SUFFIXES: &[char] = &['a', 'b', 'c', 'd', 'e', 'f'];

/// IPv4 CIDR block with no host bits set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Cidr {
    addr: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self, ContractViolation> {
        let cidr = Self { addr, prefix };
        if prefix > 32 || u32::from(addr) & !cidr.mask() != 0 {
            return Err(ContractViolation::InvalidCidr(format!("{}/{}", addr, prefix)));
        }
        Ok(cidr)
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Number of addresses in the block
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix))
    }

    /// First address as an integer
    fn start(&self) -> u64 {
        u64::from(u32::from(self.addr))
    }

    /// One past the last address
    fn end(&self) -> u64 {
        self.start() + self.size()
    }

    fn mask(&self) -> u32 {
        if self.prefix == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(self.prefix))
        }
    }

    pub fn contains(&self, other: &Ipv4Cidr) -> bool {
        other.start() >= self.start() && other.end() <= self.end()
    }

    pub fn overlaps(&self, other: &Ipv4Cidr) -> bool {
        self.start() < other.end() && other.start() < self.end()
    }
}

impl FromStr for Ipv4Cidr {
    type Err = ContractViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ContractViolation::InvalidCidr(s.to_string());
        let (addr, prefix) = s.split_once('/').ok_or_else(invalid)?;
        let addr = Ipv4Addr::from_str(addr).map_err(|_| invalid())?;
        let prefix = prefix.parse::<u8>().map_err(|_| invalid())?;
        Self::new(addr, prefix).map_err(|_| invalid())
    }
}

impl TryFrom<String> for Ipv4Cidr {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Ipv4Cidr> for String {
    fn from(cidr: Ipv4Cidr) -> Self {
        cidr.to_string()
    }
}

impl std::fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

/// Subnet tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubnetKind {
    /// Routable from and to the internet
    Public,
    /// Outbound only, through a NAT gateway
    PrivateWithEgress,
}

/// How traffic leaves a subnet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EgressPolicy {
    InternetGateway,
    NatGateway,
}

impl SubnetKind {
    pub fn egress(&self) -> EgressPolicy {
        match self {
            SubnetKind::Public => EgressPolicy::InternetGateway,
            SubnetKind::PrivateWithEgress => EgressPolicy::NatGateway,
        }
    }
}

/// Requested subnet group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetGroupSpec {
    pub name: String,
    pub kind: SubnetKind,
    pub cidr_mask: u8,
}

/// Parameters for declaring a network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
    pub id: String,
    pub cidr: Ipv4Cidr,
    pub region: String,
    pub max_azs: u32,
    pub nat_gateways: Option<u32>,
    pub subnet_groups: Vec<SubnetGroupSpec>,
}

/// Single subnet in one availability zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subnet {
    pub availability_zone: String,
    pub cidr: Ipv4Cidr,
}

/// Named group of subnets, one per availability zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetGroup {
    pub name: String,
    pub kind: SubnetKind,
    pub egress: EgressPolicy,
    pub cidr_mask: u8,
    pub subnets: Vec<Subnet>,
}

/// Declared VPC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkResource {
    pub id: String,
    pub cidr: Ipv4Cidr,
    pub availability_zones: Vec<String>,
    pub nat_gateways: u32,
    pub subnet_groups: Vec<SubnetGroup>,
}

impl NetworkResource {
    /// Declare a network and allocate its subnets
    ///
    /// Subnets are allocated sequentially and aligned to their own size:
    /// groups in declaration order, zones in order within each group.
    pub fn new(params: NetworkParams) -> Result<Self, ContractViolation> {
        if params.id.is_empty() {
            return Err(ContractViolation::EmptyField { field: "network id" });
        }
        if params.region.is_empty() {
            return Err(ContractViolation::EmptyField { field: "region" });
        }
        let max_zones = AZ_SUFFIXES.len() as u32;
        if params.max_azs == 0 || params.max_azs > max_zones {
            return Err(ContractViolation::InvalidZoneCount {
                requested: params.max_azs,
                max: max_zones,
            });
        }
        if params.subnet_groups.is_empty() {
            return Err(ContractViolation::EmptyField {
                field: "subnet groups",
            });
        }

        let availability_zones: Vec<String> = AZ_SUFFIXES
            .iter()
            .take(params.max_azs as usize)
            .map(|suffix| format!("{}{}", params.region, suffix))
            .collect();

        let mut names = HashSet::new();
        for group in &params.subnet_groups {
            if group.name.is_empty() {
                return Err(ContractViolation::EmptyField {
                    field: "subnet group name",
                });
            }
            if !names.insert(group.name.as_str()) {
                return Err(ContractViolation::DuplicateSubnetGroup(group.name.clone()));
            }
            if group.cidr_mask < params.cidr.prefix() || group.cidr_mask > MAX_SUBNET_PREFIX {
                return Err(ContractViolation::InvalidSubnetMask {
                    mask: group.cidr_mask,
                    min: params.cidr.prefix(),
                });
            }
        }

        let mut cursor = params.cidr.start();
        let mut subnet_groups = Vec::with_capacity(params.subnet_groups.len());
        for group in &params.subnet_groups {
            let block = 1u64 << (32 - u32::from(group.cidr_mask));
            let mut subnets = Vec::with_capacity(availability_zones.len());

            for zone in &availability_zones {
                let start = cursor.div_ceil(block) * block;
                if start + block > params.cidr.end() {
                    return Err(ContractViolation::AddressSpaceExhausted {
                        cidr: params.cidr.to_string(),
                        mask: group.cidr_mask,
                    });
                }
                // start < 2^32 because it lies inside the VPC block
                let cidr = Ipv4Cidr::new(Ipv4Addr::from(start as u32), group.cidr_mask)?;
                debug!("Allocated {} subnet {} in {}", group.name, cidr, zone);
                subnets.push(Subnet {
                    availability_zone: zone.clone(),
                    cidr,
                });
                cursor = start + block;
            }

            subnet_groups.push(SubnetGroup {
                name: group.name.clone(),
                kind: group.kind,
                egress: group.kind.egress(),
                cidr_mask: group.cidr_mask,
                subnets,
            });
        }

        check_disjoint(&params.cidr, &subnet_groups)?;

        let has_private = subnet_groups
            .iter()
            .any(|g| g.egress == EgressPolicy::NatGateway);
        let nat_gateways = match (has_private, params.nat_gateways) {
            (false, None | Some(0)) => 0,
            (false, Some(count)) => {
                return Err(ContractViolation::InvalidNatGatewayCount {
                    requested: count,
                    max: 0,
                })
            }
            (true, Some(0)) => {
                return Err(ContractViolation::ZeroValue {
                    field: "nat_gateways",
                })
            }
            (true, Some(count)) if count > params.max_azs => {
                return Err(ContractViolation::InvalidNatGatewayCount {
                    requested: count,
                    max: params.max_azs,
                })
            }
            (true, Some(count)) => count,
            (true, None) => params.max_azs,
        };

        Ok(Self {
            id: params.id,
            cidr: params.cidr,
            availability_zones,
            nat_gateways,
            subnet_groups,
        })
    }

    /// Look up a subnet group by name
    #[cfg(test)]
    pub fn subnet_group(&self, name: &str) -> Option<&SubnetGroup> {
        self.subnet_groups.iter().find(|g| g.name == name)
    }

    /// All subnets across every group
    pub fn subnets(&self) -> impl Iterator<Item = &Subnet> {
        self.subnet_groups.iter().flat_map(|g| g.subnets.iter())
    }
}

/// Every subnet must sit inside the VPC and no two subnets may overlap
pub fn check_disjoint(vpc: &Ipv4Cidr, groups: &[SubnetGroup]) -> Result<(), ContractViolation> {
    let subnets: Vec<&Subnet> = groups.iter().flat_map(|g| g.subnets.iter()).collect();

    for (i, subnet) in subnets.iter().enumerate() {
        if !vpc.contains(&subnet.cidr) {
            return Err(ContractViolation::SubnetOutsideNetwork {
                subnet: subnet.cidr.to_string(),
                network: vpc.to_string(),
            });
        }
        if let Some(other) = subnets[i + 1..].iter().find(|o| o.cidr.overlaps(&subnet.cidr)) {
            return Err(ContractViolation::OverlappingSubnets {
                first: subnet.cidr.to_string(),
                second: other.cidr.to_string(),
            });
        }
    }

    Ok(())
}
