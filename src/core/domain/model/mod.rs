pub mod boot_disk;
pub mod cluster;
pub mod instance;
pub mod node;
pub mod page;
pub mod tenancy;
pub mod zone;

pub use boot_disk::{BootDisk, BootDiskSpec, DiskType};
pub use cluster::{Cluster, ClusterCredentials, HypervisorVendor};
pub use instance::{Instance, InstanceStatus};
pub use node::Node;
pub use page::{InstanceFilter, Page};
pub use tenancy::{Folder, Organization, Project};
pub use zone::{Price, PricedResource, Zone};
