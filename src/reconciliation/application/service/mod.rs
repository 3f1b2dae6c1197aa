pub mod synchronization_service;
