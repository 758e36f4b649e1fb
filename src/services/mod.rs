pub mod chain_service;
pub mod port_service;

pub use chain_service::{ChainAssembler, ChainEndpoint, ChainError, CreateEndpointRequest, UserInfo};
pub use port_service::{CreatePort, PortError, PortService, UpdatePort};
