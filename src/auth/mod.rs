//! JWT-Bearer Authentication and Middleware
//!
//! A thin passwordless layer: registration, password policy, and session storage are carried
//! over from the host application's existing auth stack unmodified (SPEC_FULL.md §1). This
//! module only mints, verifies, and refreshes the claims the rest of the core consumes.
//!
//! # Module Structure
//!
//! - [`auth::jwt`](crate::auth::jwt) - Token generation, verification, and claims
//! - [`auth::middleware`](crate::auth::middleware) - Axum layer and extractor for protected routes
//!
//! # Usage
//!
//! ```ignore
//! use retrieva::auth::jwt::AuthService;
//!
//! let auth_service = AuthService::new(jwt_secret, access_expiry, refresh_expiry);
//! let tokens = auth_service.generate_tokens(&user.id, &user.email)?;
//! ```
//!
//! ## Middleware
//!
//! ```ignore
//! use axum::middleware::from_fn_with_state;
//! use retrieva::auth::middleware::auth_middleware;
//!
//! let app = Router::new()
//!     .route("/upload", post(handler))
//!     .layer(from_fn_with_state(auth_service, auth_middleware));
//! ```
//!
//! ## Extracting claims in handlers
//!
//! ```ignore
//! use retrieva::auth::middleware::AuthUser;
//!
//! async fn protected_handler(AuthUser(claims): AuthUser) -> impl IntoResponse {
//!     format!("Hello, {}!", claims.email)
//! }
//! ```

/// JWT token generation, validation, and refresh.
pub mod jwt;
/// Authentication middleware and extractors for protected routes.
pub mod middleware;
