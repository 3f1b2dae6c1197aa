pub mod instance_service;
