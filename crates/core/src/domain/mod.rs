pub mod features;
pub mod instrument;
pub mod prediction;
