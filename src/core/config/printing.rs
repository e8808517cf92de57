use crate::core::config::data::{Config, DEFAULT_API_BASE_URL, KEY_API_URL, KEY_REQUEST_TIMEOUT};

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        match &self.api_base_url {
            Some(url) => println!("  {KEY_API_URL}: {url}"),
            None => println!("  {KEY_API_URL}: (unset, default {DEFAULT_API_BASE_URL})"),
        }
        match self.request_timeout_secs {
            Some(secs) => println!("  {KEY_REQUEST_TIMEOUT}: {secs}s"),
            None => println!("  {KEY_REQUEST_TIMEOUT}: (unset)"),
        }
    }
}
