pub mod config_dto;
pub mod topology_dto;
