//! The Warden Policy Decision Point.
//!
//! A `Pdp` is built once from Policy/PolicySet XML documents and is
//! immutable afterwards: evaluation is a pure function of the loaded tree
//! and the request, safe to run from many threads at once. All failure
//! modes surface as `Indeterminate` decisions — nothing escapes
//! [`Pdp::evaluate`] as an error or panic.

pub mod engine;
pub mod error;
pub mod prefilter;
pub mod store;

pub use engine::{Pdp, PdpBuilder};
pub use error::{PdpError, PdpResult};
pub use prefilter::{RequestFilter, TargetPrefilter};
pub use store::PolicyStore;
