mod buffer;
mod pool;
mod reserve;
mod sequence;

pub use buffer::FrameBuffer;
pub use pool::{BufferPool, PoolStats};
pub use reserve::{ReserveLayout, TICK_BYTES};
pub use sequence::FrameSequence;
