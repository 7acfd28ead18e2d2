//! Internal containers.

mod registry;

pub(crate) use registry::{Key, Registry};
