mod fragmenter;
mod reassembler;

pub use fragmenter::Fragmenter;
pub use reassembler::Reassembler;
