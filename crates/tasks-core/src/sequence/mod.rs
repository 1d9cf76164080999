//! Range-based unique id allocation
//!
//! Every named sequence keeps its last reserved [`IdRange`] in the reserved
//! `id_generator` store and serves ids from memory until that range runs out.

mod allocator;
mod range;
mod registry;

pub use allocator::SequenceAllocator;
pub use range::IdRange;
pub use registry::{SequenceRegistry, SEQUENCE_STORE};
