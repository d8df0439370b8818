//! Sample storage
//!
//! The logical buffer shared between the transfer engine and the run controller.

pub mod sample_buffer;

pub use sample_buffer::SampleBuffer;
