pub mod brightness;
pub mod sample;
