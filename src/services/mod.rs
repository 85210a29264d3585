pub mod authorization;
pub mod clock;
pub mod email;
pub mod hashing;
pub mod jwt;
pub mod metrics;
pub mod otp;
pub mod rate_limit;
pub mod security;
