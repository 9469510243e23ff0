pub mod db;
pub mod entry;
pub mod graph;
pub mod maintenance;
pub mod settings;
pub mod syllabary;
pub mod user_dict;
