// handlers/protected/mod.rs - session-protected endpoints
//
// Every route here is wrapped by `session_auth_middleware`, so handlers
// can rely on an `Extension<SessionUser>` being present.
pub mod ports;
