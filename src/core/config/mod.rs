pub mod data;
pub mod io;
pub mod printing;


pub use data::{Config, API_URL_ENV, DEFAULT_API_BASE_URL};
pub use io::ConfigError;
