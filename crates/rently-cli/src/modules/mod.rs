pub(crate) mod auth;
pub(crate) mod resources;
pub(crate) mod shared;
pub(crate) mod system;
