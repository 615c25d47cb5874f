mod fetch;

pub use fetch::{Outcome, fetch};
