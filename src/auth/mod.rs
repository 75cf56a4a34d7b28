//! Authentication and rate limiting.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                         AuthGate                          │
//! │  ┌──────────────────┐ ┌─────────────────┐ ┌────────────┐  │
//! │  │CredentialVerifier│ │ RevocationStore │ │RateLimiter │  │
//! │  │  (HS256 JWT)     │ │ valid:{id}:{r}  │ │rl:{id}:{r}:│  │
//! │  └──────────────────┘ └────────┬────────┘ └─────┬──────┘  │
//! └────────────────────────────────┼────────────────┼─────────┘
//!                                  ▼                ▼
//!                          ┌────────────────────────────┐
//!                          │   KeyValueStore (Redis)    │
//!                          └────────────────────────────┘
//! ```

mod credential;
mod gate;
mod rate_limit;
mod revocation;

pub use credential::{Claims, CredentialVerifier, MAX_TOKEN_SIZE};
pub use gate::{AuthGate, GateStage, Identity, API_KEY_HEADER};
pub use rate_limit::{
    rate_limit_key, window_position, Clock, FixedClock, RateLimiter, SystemClock, WINDOW_SECONDS,
};
pub use revocation::{revocation_key, RevocationStore};
