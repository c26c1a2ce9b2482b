pub mod id;
pub mod rate_limit;
