mod format;

pub(crate) use format::{parse_key_value, print_json};
