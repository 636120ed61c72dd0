//! Inbound port remapping for proxy engine configs.
//!
//! Nodes behind NAT are reachable on different ports than the ones the panel
//! assigns to their inbounds. Before a config is handed to the engine, every
//! inbound whose `port` appears in the node's [`PortMap`] is rewritten to the
//! mapped port so the engine binds what the NAT forwards to.

pub mod document;
mod remap;

pub use document::{Inbound, InboundEntry, Inbounds, PortValue, ProxyConfigDocument};
pub use node_config::PortMap;
pub use remap::{
    SerializationError, apply_port_map, apply_port_map_to_bytes, apply_port_map_to_value,
};
