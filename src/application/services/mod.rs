//! Application services - Business logic orchestration

pub mod channel_service;
pub mod command_service;
pub mod permission_service;
pub mod rate_limiter;
pub mod verification;

pub use channel_service::ChannelPolicies;
pub use command_service::{CommandRouter, RouteOutcome};
pub use permission_service::{NickLevelChange, PermissionResolver};
pub use rate_limiter::{Flood, RateLimitParam, RateLimitSettings, RateLimiter, Verdict};
pub use verification::OwnerVerification;
