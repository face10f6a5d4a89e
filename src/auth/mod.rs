//! Bitmask authorization: rights, caller tokens, and the per-route gate.

mod gate;
mod rights;
mod token;

pub use gate::{authorize, gate, GateState};
pub use rights::Rights;
pub use token::{Caller, JwtVerifier, TokenClaims, TokenVerifier};
