//! Live audio input

pub mod input;

pub use input::{input_device_names, Deinterleaver, InputMonitor};
