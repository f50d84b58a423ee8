//! Integration flows.

pub mod flows;
pub mod node_e2e;
pub mod relay_ws;
