/// AWS resource declarations: VPC, ECR, EKS cluster and node group
pub mod cluster;
pub mod network;
pub mod registry;
pub mod stack;

pub use cluster::ComputeCluster;
pub use stack::{build_stack, Stack};
