pub mod layout;
pub mod patcher;

pub use patcher::{PatchError, Patcher, Stats};
