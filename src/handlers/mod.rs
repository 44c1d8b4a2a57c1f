// handlers/mod.rs - three security tiers
//
// Public (no auth) → Protected (JWT auth, /api/*) → Elevated (JWT auth + admin
// or procurement officer role, /api/root/*)
pub mod elevated;
pub mod protected;
pub mod public;
