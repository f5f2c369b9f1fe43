//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Request cookies
//!     → cookie.rs (SessionStorage over Cookie / Set-Cookie)
//!     → client.rs (session load + refresh, OAuth, sign-out)
//!     → token.rs (access token → verified TokenPayload)
//!     → middleware.rs (RequestContext insert, Set-Cookie flush)
//! ```
//!
//! # Design Decisions
//! - The provider client is created per request and owns no global state
//! - An invalid or expired token means "no user", never an error page

pub mod client;
pub mod cookie;
pub mod error;
pub mod middleware;
pub mod session;
pub mod token;

pub use client::{AuthClient, AuthSettings, OAuthProvider, ProviderUser};
pub use self::cookie::{CookieStorage, SessionStorage};
pub use error::{AuthError, ProviderError, StorageError};
pub use middleware::auth_middleware;
pub use session::Session;
pub use token::{TokenPayload, TokenVerifier, VerificationMode, VerifyError};
