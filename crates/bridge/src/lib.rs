//! Media Bridge: owns both legs of a live call (carrier media stream and
//! realtime model socket), forwards audio and transcript events between
//! them, and drives barge-in (spec.md §4.3).

pub mod barge_in;
pub mod bridge;
pub mod state_machine;
pub mod wire_carrier;
pub mod wire_model;

pub use bridge::{run_carrier_bridge, BridgeDeps};

