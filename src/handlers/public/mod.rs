// handlers/public/mod.rs - endpoints reachable without a session
//
// The chain endpoint identifies its caller from the request body
// (`userInfo`), not from a session token.
pub mod chain;
pub mod system;
