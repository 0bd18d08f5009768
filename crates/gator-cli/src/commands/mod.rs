pub mod agg;
pub mod browse;
pub mod feeds;
pub mod users;
