/// Construction-time contract violations
use thiserror::Error;

/// An invariant of the stack or manifest model was violated while assembling.
///
/// Assembly stops at the first violation and no partial graph is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("invalid AWS account id: {0:?} (expected 12 digits)")]
    InvalidAccount(String),

    #[error("health check path {0:?} must start with '/'")]
    InvalidHealthPath(String),

    #[error("invalid ECR repository name: {0:?}")]
    InvalidRepositoryName(String),

    #[error("invalid CIDR block: {0:?}")]
    InvalidCidr(String),

    #[error("subnet mask /{mask} must be between /{min} and /28")]
    InvalidSubnetMask { mask: u8, min: u8 },

    #[error("duplicate subnet group name: {0}")]
    DuplicateSubnetGroup(String),

    #[error("subnets {first} and {second} overlap")]
    OverlappingSubnets { first: String, second: String },

    #[error("subnet {subnet} lies outside network {network}")]
    SubnetOutsideNetwork { subnet: String, network: String },

    #[error("network {cidr} has no room left for another /{mask} subnet")]
    AddressSpaceExhausted { cidr: String, mask: u8 },

    #[error("NAT gateway count {requested} exceeds {max} (one per zone with private subnets)")]
    InvalidNatGatewayCount { requested: u32, max: u32 },

    #[error("availability zone count {requested} is outside 1..={max}")]
    InvalidZoneCount { requested: u32, max: u32 },

    #[error("node pool {name}: expected min <= desired <= max, got min={min} desired={desired} max={max}")]
    NodePoolBounds {
        name: String,
        min: u32,
        desired: u32,
        max: u32,
    },

    #[error("node pool {0} must list at least one instance type")]
    NoInstanceTypes(String),

    #[error("duplicate node pool name: {0}")]
    DuplicateNodePool(String),

    #[error("cluster {cluster} has default capacity {capacity} alongside explicit node pools")]
    DefaultCapacityConflict { cluster: String, capacity: u32 },

    #[error("duplicate graph node: {0}")]
    DuplicateNode(String),

    #[error("unknown graph node: {0}")]
    UnknownNode(String),

    #[error("{0} cannot depend on itself")]
    SelfDependency(String),

    #[error("dependency {from} -> {to} is already recorded")]
    DuplicateDependency { from: String, to: String },

    #[error("dependency {from} -> {to} would create a cycle")]
    DependencyCycle { from: String, to: String },

    #[error("service selector {selector:?} does not match pod template labels {labels:?}")]
    SelectorMismatch { selector: String, labels: String },
}
