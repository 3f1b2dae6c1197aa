pub mod error;
pub mod hypervisor;
pub mod model;
pub mod repository;
pub mod value_object;
