use std::fs;
use std::process;

use sylime_core::settings::{self, DictSettings};

macro_rules! die {
    ($result:expr, $($arg:tt)*) => {
        $result.unwrap_or_else(|e| {
            eprintln!($($arg)*, e);
            process::exit(1);
        })
    };
}

pub fn settings_export() {
    print!("{}", settings::default_toml());
}

pub fn settings_validate(file: &str) {
    let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
    let s = die!(settings::parse_settings_toml(&content), "Error: {}");
    println!(
        "OK: delete_threshold={}, scan.single_slot={}, scan.credibility={}",
        s.delete_threshold, s.scan.single_slot, s.scan.credibility
    );
}

/// Settings from `file`, or the embedded defaults when no file is given.
pub fn load_settings(file: Option<&str>) -> DictSettings {
    let Some(file) = file else {
        return DictSettings::default();
    };
    let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
    die!(settings::parse_settings_toml(&content), "Error: {}")
}
