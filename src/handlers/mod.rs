// handlers/mod.rs - two security tiers
//
// Public (no session) → Protected (session token required)
pub mod public;    // /, /health, /api/create-endpoint
pub mod protected; // /api/ports[/:id]
