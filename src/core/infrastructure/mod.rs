pub mod api_client;
pub mod default_project_resolver;
pub mod hypervisor_factory;
pub mod memory_store;
pub mod proxmox;
