use std::path::Path;
use std::process;

use sylime_core::db::Db;
use sylime_core::entry::DictEntry;
use sylime_core::settings::DictSettings;
use sylime_core::user_dict::codec::{self, UserDbValue};
use sylime_core::user_dict::UserDictEntryIterator;
use unicode_width::UnicodeWidthStr;

use super::store_ops::{open_store, save_store};

/// Normalize a typed code to its stored form, one trailing space per
/// syllable.
fn normalize_code(code: &str) -> String {
    let mut result = String::new();
    for syllable in code.split_whitespace() {
        result.push_str(syllable);
        result.push(' ');
    }
    result
}

pub fn add(path: &Path, code: &str, text: &str, commits: i32) {
    let code = normalize_code(code);
    if code.is_empty() {
        eprintln!("Error: empty code");
        process::exit(1);
    }
    let (db, mut dict) = open_store(path, false, &DictSettings::default());
    let entry = DictEntry {
        text: text.to_string(),
        custom_code: code.clone(),
        ..Default::default()
    };
    if dict.update_entry(&entry, commits) {
        save_store(&db);
        println!("Added: {} → {}", code.trim_end(), text);
    } else {
        eprintln!("Error: store refused the update");
        process::exit(1);
    }
}

pub fn remove(path: &Path, code: &str, text: &str) {
    let code = normalize_code(code);
    let (db, mut dict) = open_store(path, false, &DictSettings::default());
    let key = codec::build_key(&code, text);
    let live = db
        .fetch(&key)
        .and_then(|value| UserDbValue::unpack(&value))
        .is_some_and(|v| v.commits >= 0);
    if !live {
        println!("Not found: {} → {}", code.trim_end(), text);
        return;
    }
    let entry = DictEntry {
        text: text.to_string(),
        custom_code: code.clone(),
        ..Default::default()
    };
    dict.update_entry(&entry, -1);
    save_store(&db);
    println!("Removed: {} → {}", code.trim_end(), text);
}

pub fn scan(
    path: &Path,
    settings: &DictSettings,
    input: &str,
    predictive: bool,
    limit: usize,
    json: bool,
) {
    let (_db, dict) = open_store(path, true, settings);
    let mut result = UserDictEntryIterator::default();
    dict.lookup_words(&mut result, input, predictive, limit, None);
    let entries = result.release();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).expect("JSON serialization failed")
        );
        return;
    }
    if entries.is_empty() {
        println!("(empty)");
        return;
    }
    for (i, entry) in entries.iter().enumerate() {
        let label = if entry.comment.is_empty() {
            entry.text.clone()
        } else {
            format!("{} {}", entry.text, entry.comment)
        };
        let pad_width = 16;
        let display_width = UnicodeWidthStr::width(label.as_str());
        let padded = if display_width < pad_width {
            format!("{}{}", label, " ".repeat(pad_width - display_width))
        } else {
            label
        };
        println!(
            "{:>3}. {}  {}  weight={:.3} commits={}",
            i + 1,
            padded,
            entry.custom_code.trim_end(),
            entry.weight,
            entry.commit_count,
        );
    }
    println!("---");
    println!("{} entries", entries.len());
}
