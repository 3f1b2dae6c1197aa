mod proxmox_api_token;
mod proxmox_host;
mod proxmox_port;
mod proxmox_uri;
mod remote_id;
pub(crate) mod serde_helpers;

pub use proxmox_api_token::ProxmoxApiToken;
pub use proxmox_host::ProxmoxHost;
pub use proxmox_port::{DEFAULT_PROXMOX_PORT, ProxmoxPort};
pub use proxmox_uri::ProxmoxUrl;
pub use remote_id::RemoteId;

