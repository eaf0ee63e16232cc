pub mod cycle_logger;
pub mod domain;
pub mod frame_scheduler;
