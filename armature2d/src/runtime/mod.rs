mod adapter;
mod armature;
mod bone;
mod pose_cache;
mod slot;

pub use adapter::*;
pub use armature::*;
pub use bone::*;
pub use pose_cache::*;
pub use slot::*;

#[cfg(test)]
pub(crate) mod test_support;


#[cfg(test)]
mod pose_cache_tests;


#[cfg(test)]
mod slot_cache_tests;
