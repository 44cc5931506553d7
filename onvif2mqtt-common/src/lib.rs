mod config_file;
pub mod mqtt;
mod throttled_error;
mod version;

pub use self::{
    config_file::{load_config_file, parse_config_str},
    throttled_error::ThrottledErrorLogger,
};
