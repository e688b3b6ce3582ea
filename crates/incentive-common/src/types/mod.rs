pub mod activity_config;
pub mod contract;
pub mod record;
pub mod reward;
pub mod stats;
