pub mod config;
pub mod detection;
pub mod estimation;
pub mod flags;
pub mod sampling;
pub mod shared;
pub mod video;
