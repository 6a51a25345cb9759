pub mod backend;
pub mod volume;
