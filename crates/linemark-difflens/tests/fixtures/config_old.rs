use std::path::Path;

pub struct Config {
    pub name: String,
    pub retries: u32,
}

impl Config {
    pub fn load(path: &Path) -> Self {
        let _ = path;
        Self {
            name: "default".into(),
            retries: 3,
        }
    }
}

pub fn legacy() {}
