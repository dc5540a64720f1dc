mod actions;
pub(crate) mod args;
mod store;
pub(crate) mod types;

pub(crate) use actions::{handle_login, handle_logout, handle_whoami};
pub(crate) use store::{delete_session_token, load_session_token, store_session_token};
#[cfg(test)]
pub(crate) use store::{clear_keyring_mock, lock_keyring_tests_async, lock_keyring_tests_sync};
