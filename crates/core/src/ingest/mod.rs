pub mod lag_return;
pub mod market;
pub mod provider;
pub mod types;
