pub mod key_bindings;

pub use key_bindings::{KeyParseError, command_for_key, parse_key, parse_key_list};
