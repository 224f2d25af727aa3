//! Execution Engine
//!
//! Everything that moves audio through a node tree:
//! - Audio buffers, pending-frame queues and WAV I/O
//! - The per-call lock table
//! - Execution plans snapshotted from the live tree
//! - The top-level `process` / `render` drivers

pub mod buffer;
pub mod io;
pub mod lock;
pub mod plan;
pub mod queue;
pub mod stream;

pub use buffer::{db_to_linear, linear_to_db, AudioBuffer};
pub use io::{generate_noise, generate_test_tone, read_wav, write_wav};
pub use lock::LockSet;
pub use plan::ExecContext;
pub use queue::FrameQueue;
pub use stream::{process, process_with, render, render_with};
