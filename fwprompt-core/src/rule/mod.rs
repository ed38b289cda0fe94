//! Rule construction from resolved decisions

pub mod builder;
pub mod slug;

pub use builder::{RuleBuilder, MAX_NAME_LEN};
pub use slug::slugify;
