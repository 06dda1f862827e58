//! Editor features computed from the last successful analysis.
//!
//! All inputs and outputs are in raw coordinates; positions are translated
//! into the compiled text only to look things up in the analysis.

mod completion;
mod hover;
mod signature;

pub use completion::completion;
pub use hover::hover;
pub use signature::{builtin_function, signature_help, BuiltinFunction, BUILTIN_FUNCTIONS};
