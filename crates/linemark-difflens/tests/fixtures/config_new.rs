use std::path::Path;
use std::time::Duration;

pub struct Config {
    pub name: String,
    pub retries: u32,
}

impl Config {
    pub fn load(path: &Path) -> Self {
        let _ = path;
        Self {
            name: "linemark".into(),
            retries: 3,
        }
    }
}
