pub mod port;

pub use port::{Port, PortChanges, Protocol};
