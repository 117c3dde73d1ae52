use serde::{Deserialize, Serialize};

/// Configuration from goalkeeper.toml. Every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Goal records, relative to the working directory
    #[serde(default = "default_data_file")]
    pub data_file: String,
    /// Persisted user options
    #[serde(default = "default_options_file")]
    pub options_file: String,
    /// Copy the previous data file to `<data_file>.bak` before saving
    #[serde(default = "default_true")]
    pub backup: bool,
    /// Rows per page when paging is on
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            data_file: default_data_file(),
            options_file: default_options_file(),
            backup: true,
            page_size: default_page_size(),
        }
    }
}

fn default_data_file() -> String {
    "goals.xml".to_string()
}

fn default_options_file() -> String {
    "options.xml".to_string()
}

fn default_true() -> bool {
    true
}

fn default_page_size() -> usize {
    20
}
