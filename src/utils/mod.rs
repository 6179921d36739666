pub mod constants;
pub mod url_utils;

pub use constants::*;
pub use url_utils::{base_url, directory_base, is_non_navigational, make_absolute};
