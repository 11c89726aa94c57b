//! Client side: the command sequencer and the interactive prompt on top.

pub mod prompt;
pub mod sequencer;

pub use sequencer::CommandSequencer;
