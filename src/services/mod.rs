pub mod aggregation;
pub mod import;
pub mod period;
pub mod source;
pub mod state;
