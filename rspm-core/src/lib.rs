pub mod constants;
pub mod environment;
pub mod functions;
pub mod memory_effect;
pub mod scaler;
pub mod timeseries;
pub mod water;

pub mod errors;
