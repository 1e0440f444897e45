//! Configuration loading.
//!
//! Settings live in `config.toml` inside the app home directory. The home
//! directory is `$TASKDECK_HOME`, falling back to the legacy
//! `$TERMTASK_HOME`, then `~/.taskdeck` — unless only the legacy
//! `~/.termtask` directory exists, which is kept so older installs keep
//! working after the rename. Every missing or malformed value falls back to
//! a built-in default; configuration can never fail the process.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use log::warn;

pub const PRIMARY_HOME_ENV: &str = "TASKDECK_HOME";
pub const LEGACY_HOME_ENV: &str = "TERMTASK_HOME";

const NEW_HOME_DIR: &str = ".taskdeck";
const LEGACY_HOME_DIR: &str = ".termtask";

/// The views the app can open at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum View {
    List,
    Board,
    Calendar,
    Details,
}

impl View {
    pub fn from_name(name: &str) -> Option<View> {
        match name.trim().to_lowercase().as_str() {
            "list" => Some(View::List),
            "board" | "kanban" => Some(View::Board),
            "calendar" => Some(View::Calendar),
            "details" | "detail" => Some(View::Details),
            _ => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            View::List => "List",
            View::Board => "Board",
            View::Calendar => "Calendar",
            View::Details => "Details",
        }
    }

    pub fn next(self) -> View {
        match self {
            View::List => View::Board,
            View::Board => View::Calendar,
            View::Calendar => View::Details,
            View::Details => View::List,
        }
    }

    pub fn prev(self) -> View {
        match self {
            View::List => View::Details,
            View::Board => View::List,
            View::Calendar => View::Board,
            View::Details => View::Calendar,
        }
    }
}

/// Appearance settings, as hex color strings from `[appearance]`.
#[derive(Debug, Clone)]
pub struct ThemeConfig {
    pub name: String,
    pub background: String,
    pub primary: String,
    pub accent: String,
    pub muted: String,
    pub text: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        ThemeConfig {
            name: "slate".into(),
            background: "#101418".into(),
            primary: "#569cd6".into(),
            accent: "#e5925e".into(),
            muted: "#2a2f36".into(),
            text: "#d4d8de".into(),
        }
    }
}

/// Application configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_path: PathBuf,
    pub default_view: View,
    pub board_columns: Vec<String>,
    pub status_labels: BTreeMap<String, String>,
    pub timer_presets: Vec<u64>,
    pub default_timer_minutes: u64,
    pub theme: ThemeConfig,
}

impl AppConfig {
    /// Built-in defaults, with data stored under the given home directory.
    pub fn defaults(home: &Path) -> Self {
        let status_labels = [
            ("backlog", "Backlog"),
            ("in_progress", "In Progress"),
            ("done", "Done"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        AppConfig {
            data_path: home.join("tasks.json"),
            default_view: View::Board,
            board_columns: vec!["backlog".into(), "in_progress".into(), "done".into()],
            status_labels,
            timer_presets: vec![5, 15, 25, 50],
            default_timer_minutes: 25,
            theme: ThemeConfig::default(),
        }
    }

    /// Display label for a column id, falling back to a title-cased id.
    pub fn label_for(&self, column: &str) -> String {
        match self.status_labels.get(column) {
            Some(label) => label.clone(),
            None => column
                .split('_')
                .filter(|part| !part.is_empty())
                .map(|part| {
                    let mut chars = part.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                        None => String::new(),
                    }
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// Resolve the app home directory from the environment.
pub fn home_dir() -> PathBuf {
    let user_home = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()));
    resolve_home_dir(
        std::env::var_os(PRIMARY_HOME_ENV).map(PathBuf::from),
        std::env::var_os(LEGACY_HOME_ENV).map(PathBuf::from),
        &user_home,
    )
}

/// Pure resolution rule, split out so tests need not touch process env.
fn resolve_home_dir(primary: Option<PathBuf>, legacy: Option<PathBuf>, user_home: &Path) -> PathBuf {
    if let Some(dir) = primary {
        return dir;
    }
    if let Some(dir) = legacy {
        return dir;
    }
    let new_default = user_home.join(NEW_HOME_DIR);
    let legacy_default = user_home.join(LEGACY_HOME_DIR);
    // Prefer the new location, but keep a pre-rename directory if it is the
    // only one present.
    if !new_default.exists() && legacy_default.exists() {
        legacy_default
    } else {
        new_default
    }
}

/// Write a commented starter config if none exists.
pub fn ensure_config_file(path: &Path, home: &Path) -> std::io::Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let starter = format!(
        r##"# taskdeck configuration
[app]
default_view = "board"  # options: board, list, calendar, details
data_path = "{data}"
board_columns = ["backlog", "in_progress", "done"]
status_labels = {{ backlog = "Backlog", in_progress = "In Progress", done = "Done" }}
timer_presets = [5, 15, 25, 50]  # minutes
default_timer_minutes = 25

[appearance]
theme = "slate"
background = "#101418"
primary = "#569cd6"
accent = "#e5925e"
muted = "#2a2f36"
text = "#d4d8de"
"##,
        data = home.join("tasks.json").display()
    );
    fs::write(path, starter)
}

/// Load configuration, applying defaults for anything missing or invalid.
pub fn load_config(path: &Path, home: &Path) -> AppConfig {
    if let Err(e) = ensure_config_file(path, home) {
        warn!("could not write starter config {}: {e}", path.display());
    }
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("could not read config {}: {e}; using defaults", path.display());
            return AppConfig::defaults(home);
        }
    };
    match raw.parse::<toml::Value>() {
        Ok(value) => config_from_value(&value, home),
        Err(e) => {
            warn!("config {} is not valid TOML: {e}; using defaults", path.display());
            AppConfig::defaults(home)
        }
    }
}

fn config_from_value(value: &toml::Value, home: &Path) -> AppConfig {
    let mut cfg = AppConfig::defaults(home);
    let app = value.get("app");
    let appearance = value.get("appearance");
    let field = |key: &str| app.and_then(|section| section.get(key));

    if let Some(s) = field("data_path").and_then(toml::Value::as_str) {
        cfg.data_path = expand_tilde(s);
    }
    if let Some(view) = field("default_view")
        .and_then(toml::Value::as_str)
        .and_then(View::from_name)
    {
        cfg.default_view = view;
    }
    if let Some(items) = field("board_columns").and_then(toml::Value::as_array) {
        let columns: Vec<String> = items
            .iter()
            .filter_map(|item| item.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if !columns.is_empty() {
            cfg.board_columns = columns;
        }
    }
    if let Some(table) = field("status_labels").and_then(toml::Value::as_table) {
        let labels: BTreeMap<String, String> = table
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|label| (k.clone(), label.to_string())))
            .collect();
        // Merge over the defaults so unlabelled columns keep a fallback.
        for (k, v) in labels {
            cfg.status_labels.insert(k, v);
        }
    }
    if let Some(items) = field("timer_presets").and_then(toml::Value::as_array) {
        let presets: Vec<u64> = items
            .iter()
            .filter_map(|item| item.as_integer())
            .filter(|&minutes| minutes > 0)
            .map(|minutes| minutes as u64)
            .collect();
        if !presets.is_empty() {
            cfg.timer_presets = presets;
        }
    }
    if let Some(minutes) = field("default_timer_minutes").and_then(toml::Value::as_integer) {
        if minutes > 0 {
            cfg.default_timer_minutes = minutes as u64;
        }
    }

    if let Some(section) = appearance {
        let mut theme = cfg.theme.clone();
        let text_field = |key: &str, target: &mut String| {
            if let Some(s) = section.get(key).and_then(toml::Value::as_str) {
                *target = s.to_string();
            }
        };
        text_field("theme", &mut theme.name);
        text_field("background", &mut theme.background);
        text_field("primary", &mut theme.primary);
        text_field("accent", &mut theme.accent);
        text_field("muted", &mut theme.muted);
        text_field("text", &mut theme.text);
        cfg.theme = theme;
    }

    cfg
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        let user_home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        return PathBuf::from(user_home).join(rest);
    }
    PathBuf::from(path)
}
