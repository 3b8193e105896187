pub mod face;
pub mod imaging;
pub mod json_repair;
pub mod processor;
pub mod report;
pub mod vision;

pub use processor::*;
