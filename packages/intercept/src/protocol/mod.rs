// packages/intercept/src/protocol/mod.rs
//! Wire protocol
//!
//! One message per connection. Requests are a command tag followed by
//! separator-delimited fields:
//!
//! ```text
//! IMPORT:<module>
//! GETATTR:<owner><SEP><attr>
//! SETATTR:<owner><SEP><attr><SEP><valueLiteral>
//! CALL:<owner><SEP><attr><SEP><argsLiteral><SEP><kwargsLiteral>
//! ```
//!
//! Responses are empty, a literal, a deferred-instance marker, or any of
//! those prefixed with `raise `. See [`response`] for the grammar.

pub mod literal;
pub mod request;
pub mod response;

pub use request::{Request, RequestKind, WireCodec};
pub use response::{Expr, InstanceStyle, Response};
