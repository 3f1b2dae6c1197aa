pub mod create_instance_request;
pub mod update_instance_request;
