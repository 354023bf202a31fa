use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const WIDGET_JSON: &str = "widget.json";

const DEFAULT_SNAPSHOT_FILE: &str = "widget-todos.json";
const DEFAULT_RELOAD_MARKER_FILE: &str = "widget-reload";

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigBundle {
    pub app: serde_json::Value,
    pub widget: serde_json::Value,
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "Clearday",
                "timezone": "UTC"
            }),
        ),
        (
            WIDGET_JSON,
            serde_json::json!({
                "schema": 1,
                "snapshotFile": DEFAULT_SNAPSHOT_FILE,
                "reloadMarkerFile": DEFAULT_RELOAD_MARKER_FILE
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_configs(config_dir: &Path) -> Result<ConfigBundle, InfraError> {
    Ok(ConfigBundle {
        app: read_config(&config_dir.join(APP_JSON))?,
        widget: read_config(&config_dir.join(WIDGET_JSON))?,
    })
}

/// IANA timezone name used for day bucketing; `None` when unset.
pub fn read_timezone(config_dir: &Path) -> Result<Option<String>, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    Ok(app
        .get("timezone")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned))
}

fn read_widget_file_name(config_dir: &Path, key: &str, default: &str) -> String {
    let Ok(widget) = read_config(&config_dir.join(WIDGET_JSON)) else {
        return default.to_string();
    };
    widget
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Name of the shared snapshot document, relative to the shared directory.
/// A broken widget config degrades to the default name rather than failing,
/// since the widget surface must keep finding the document at a stable path.
pub fn read_widget_snapshot_file(config_dir: &Path) -> String {
    read_widget_file_name(config_dir, "snapshotFile", DEFAULT_SNAPSHOT_FILE)
}

pub fn read_widget_reload_marker_file(config_dir: &Path) -> String {
    read_widget_file_name(config_dir, "reloadMarkerFile", DEFAULT_RELOAD_MARKER_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_CONFIG_DIR: AtomicUsize = AtomicUsize::new(0);

    struct TempConfigDir {
        path: std::path::PathBuf,
    }

    impl TempConfigDir {
        fn new() -> Self {
            let sequence = NEXT_CONFIG_DIR.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "clearday-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp config dir");
            Self { path }
        }
    }

    impl Drop for TempConfigDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn ensure_default_configs_creates_and_preserves_files() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("create defaults");

        let app_path = dir.path.join(APP_JSON);
        fs::write(
            &app_path,
            "{\"schema\": 1, \"appName\": \"Clearday\", \"timezone\": \"Asia/Tokyo\"}\n",
        )
        .expect("overwrite app config");

        ensure_default_configs(&dir.path).expect("re-run defaults");
        let timezone = read_timezone(&dir.path).expect("read timezone");
        assert_eq!(timezone.as_deref(), Some("Asia/Tokyo"));
    }

    #[test]
    fn load_configs_rejects_unsupported_schema() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("create defaults");
        fs::write(dir.path.join(WIDGET_JSON), "{\"schema\": 2}\n").expect("write bad schema");
        assert!(load_configs(&dir.path).is_err());
    }

    #[test]
    fn widget_file_names_fall_back_to_defaults() {
        let dir = TempConfigDir::new();
        assert_eq!(
            read_widget_snapshot_file(&dir.path),
            DEFAULT_SNAPSHOT_FILE.to_string()
        );

        ensure_default_configs(&dir.path).expect("create defaults");
        fs::write(
            dir.path.join(WIDGET_JSON),
            "{\"schema\": 1, \"snapshotFile\": \"todos.json\"}\n",
        )
        .expect("write custom widget config");
        assert_eq!(read_widget_snapshot_file(&dir.path), "todos.json");
        assert_eq!(
            read_widget_reload_marker_file(&dir.path),
            DEFAULT_RELOAD_MARKER_FILE.to_string()
        );
    }
}
