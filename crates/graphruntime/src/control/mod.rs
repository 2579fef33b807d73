//! Composite nodes owning nested systems

mod branch;
mod for_loop;
mod relay;

pub use branch::{If, IfInput, IfOutput};
pub use for_loop::For;
pub use relay::{Accumulator, AccumulatorPorts, IterationRelay, Relay, RelayPorts};
