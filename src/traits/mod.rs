pub mod heartbeat;
pub mod node;

pub use heartbeat::HeartBeat;
pub use node::{NodeKind, Outcome, Processor, Source};
