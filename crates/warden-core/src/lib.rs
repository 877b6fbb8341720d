//! Warden core data model
//!
//! Typed XACML 3.0 attribute values and the decision vocabulary shared by the
//! whole engine:
//!
//! - Per-dataType parsing, canonical equality, and optional ordering
//! - Unordered multisets ("bags") of one dataType
//! - `Status` / `Decision` with the three Indeterminate flavours
//! - The Request/Response wire model and opaque `<Content>` fragments
//!
//! Evaluation failures are values, not errors: every expression in the engine
//! produces an [`EvalResult`], and an `Indeterminate` is a `Status` carried in
//! the `Err` arm. Nothing in this crate panics on untrusted input.

pub mod bag;
pub mod content;
pub mod decision;
pub mod error;
pub mod eval;
pub mod request;
pub mod response;
pub mod status;
pub mod temporal;
pub mod values;

pub use bag::Bag;
pub use content::ContentNode;
pub use decision::{Decision, Effect, IndeterminateKind};
pub use error::{ValueError, ValueResult};
pub use eval::{EvalResult, Evaluated};
pub use request::{attribute_ids, categories, AttributeCategory, Request, RequestAttribute};
pub use response::{Advice, AttributeAssignment, Obligation, Response, ResultItem};
pub use status::{MissingAttributeDetail, Status, StatusCode};
pub use temporal::{utc_offset, Date, DateTime, DayTimeDuration, Time, YearMonthDuration};
pub use values::{AttributeValue, DataType};
