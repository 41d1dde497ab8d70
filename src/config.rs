use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use crate::CompositorError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Gap kept around every tiled window, in pixels.
    pub border_width: i32,
    /// Workspaces created on every output; the first one starts out current.
    pub workspaces: Vec<String>,
    pub focus_on_map: bool,
    /// Announce already existing views to management clients that bind late.
    pub sync_existing_views: bool,
    pub cursor_theme: String,
    pub cursor_size: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            border_width: 12,
            workspaces: vec!["1".to_owned()],
            focus_on_map: true,
            sync_existing_views: true,
            cursor_theme: "default".to_owned(),
            cursor_size: 24,
        }
    }
}

pub struct LoadedConfig {
    pub path: PathBuf,
    pub config: RuntimeConfig,
}

pub fn load_or_create_default() -> Result<LoadedConfig, CompositorError> {
    let path = config_path()?;
    if !path.exists() {
        write_default_config(&path)?;
    }

    let config = load_from_path(&path)?;
    Ok(LoadedConfig { path, config })
}

pub fn write_default_config(path: &Path) -> Result<(), CompositorError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            CompositorError::Config(format!(
                "failed to create config directory {}: {err}",
                parent.display()
            ))
        })?;
    }
    fs::write(path, default_config_template()).map_err(|err| {
        CompositorError::Config(format!(
            "failed to write default config {}: {err}",
            path.display()
        ))
    })?;
    tracing::info!(path = %path.display(), "created default config.lua");
    Ok(())
}

pub fn load_from_path(path: &Path) -> Result<RuntimeConfig, CompositorError> {
    if !path.exists() {
        return Err(CompositorError::Config(format!(
            "config file not found: {}",
            path.display()
        )));
    }

    let content = fs::read_to_string(path).map_err(|err| {
        CompositorError::Config(format!("failed to read config {}: {err}", path.display()))
    })?;
    if content.trim().is_empty() {
        write_default_config(path)?;
        tracing::info!(path = %path.display(), "config.lua was empty; wrote default config");
    }

    let values = load_lua_values(path)?;
    config_from_values(&values)
}

/// Builds a config from the flattened `key=value` pairs the loader prints.
pub fn config_from_values(
    values: &HashMap<String, String>,
) -> Result<RuntimeConfig, CompositorError> {
    let mut config = RuntimeConfig::default();

    config.border_width = parse_i32(values, "border_width", config.border_width)?;
    if config.border_width < 0 {
        return Err(CompositorError::Config(format!(
            "border_width must not be negative, got {}",
            config.border_width
        )));
    }

    config.focus_on_map = parse_bool_flexible(values, "focus_on_map", config.focus_on_map)?;
    config.sync_existing_views =
        parse_bool_flexible(values, "sync_existing_views", config.sync_existing_views)?;

    if let Some(value) = values.get("cursor_theme") {
        config.cursor_theme = value.clone();
    }
    config.cursor_size = parse_u32(values, "cursor_size", config.cursor_size)?;
    if config.cursor_size == 0 {
        return Err(CompositorError::Config(
            "cursor_size must be positive".to_owned(),
        ));
    }

    let workspaces = collect_indexed_values(values, "workspace.")?;
    if !workspaces.is_empty() {
        for (index, name) in workspaces.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(CompositorError::Config(format!(
                    "workspace {} has an empty name",
                    index + 1
                )));
            }
            if workspaces[..index].contains(name) {
                return Err(CompositorError::Config(format!(
                    "duplicate workspace name `{name}`"
                )));
            }
        }
        config.workspaces = workspaces;
    }

    Ok(config)
}

pub fn apply_environment(config: &RuntimeConfig) {
    // SAFETY: the environment is only mutated from the event loop thread.
    unsafe {
        std::env::set_var("XCURSOR_THEME", &config.cursor_theme);
        std::env::set_var("XCURSOR_SIZE", config.cursor_size.to_string());
        std::env::set_var("XDG_CURRENT_DESKTOP", "nora");
        std::env::set_var("XDG_SESSION_DESKTOP", "nora");
    }
}

fn config_path() -> Result<PathBuf, CompositorError> {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME")
        && !xdg.is_empty()
    {
        return Ok(PathBuf::from(xdg).join("nora").join("config.lua"));
    }

    if let Some(home) = std::env::var_os("HOME")
        && !home.is_empty()
    {
        return Ok(PathBuf::from(home)
            .join(".config")
            .join("nora")
            .join("config.lua"));
    }

    Err(CompositorError::Config(
        "unable to resolve config path: HOME and XDG_CONFIG_HOME are unset".to_owned(),
    ))
}

fn load_lua_values(path: &Path) -> Result<HashMap<String, String>, CompositorError> {
    let output = Command::new("lua")
        .arg("-e")
        .arg(lua_loader_script())
        .env("NORA_CONFIG_PATH", path)
        .output()
        .map_err(|err| CompositorError::Config(format!("failed to execute lua: {err}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        let reason = if stderr.is_empty() {
            "lua exited with non-zero status".to_owned()
        } else {
            stderr
        };
        return Err(CompositorError::Config(format!(
            "failed to load {}: {reason}",
            path.display()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_key_value_stdout(&stdout)
}

fn parse_key_value_stdout(stdout: &str) -> Result<HashMap<String, String>, CompositorError> {
    let mut values = HashMap::new();
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(CompositorError::Config(format!(
                "invalid lua output line: {line}"
            )));
        };
        values.insert(key.to_owned(), value.to_owned());
    }
    Ok(values)
}

fn collect_indexed_values(
    values: &HashMap<String, String>,
    prefix: &str,
) -> Result<Vec<String>, CompositorError> {
    let mut indexed = Vec::<(usize, String)>::new();

    for (key, value) in values {
        let Some(index_str) = key.strip_prefix(prefix) else {
            continue;
        };

        let index = index_str.parse::<usize>().map_err(|err| {
            CompositorError::Config(format!(
                "invalid indexed key `{key}`: index is not a number ({err})"
            ))
        })?;
        indexed.push((index, value.clone()));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, value)| value).collect())
}

fn parse_u32(
    values: &HashMap<String, String>,
    key: &str,
    default: u32,
) -> Result<u32, CompositorError> {
    match values.get(key) {
        Some(raw) => raw.parse::<u32>().map_err(|err| {
            CompositorError::Config(format!("invalid value for {key}: {raw} ({err})"))
        }),
        None => Ok(default),
    }
}

fn parse_i32(
    values: &HashMap<String, String>,
    key: &str,
    default: i32,
) -> Result<i32, CompositorError> {
    match values.get(key) {
        Some(raw) => raw.parse::<i32>().map_err(|err| {
            CompositorError::Config(format!("invalid value for {key}: {raw} ({err})"))
        }),
        None => Ok(default),
    }
}

fn parse_bool_flexible(
    values: &HashMap<String, String>,
    key: &str,
    default: bool,
) -> Result<bool, CompositorError> {
    let Some(raw) = values.get(key) else {
        return Ok(default);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(CompositorError::Config(format!(
            "invalid value for {key}: {raw} (expected bool or 0/1)"
        ))),
    }
}

fn default_config_template() -> &'static str {
    r#"-- nora config
-- File: ~/.config/nora/config.lua (or $XDG_CONFIG_HOME/nora/config.lua)
return {
  general = {
    border_width = 12,
    focus_on_map = true,
  },
  workspaces = { "1", "2", "3", "4" },
  protocols = {
    -- Announce existing windows to desktop management clients binding late.
    sync_existing_views = true,
  },
  cursor = {
    theme = "default",
    size = 24,
  },
}
"#
}

fn lua_loader_script() -> &'static str {
    r#"
local path = os.getenv("NORA_CONFIG_PATH")
if type(path) ~= "string" or path == "" then
  io.stderr:write("NORA_CONFIG_PATH is not set\n")
  os.exit(1)
end

local chunk, load_err = loadfile(path)
if not chunk then
  io.stderr:write(load_err .. "\n")
  os.exit(1)
end

local ok, result = pcall(chunk)
if not ok then
  io.stderr:write(result .. "\n")
  os.exit(1)
end

local cfg = nil
if type(result) == "table" then
  cfg = result
elseif type(_G.config) == "table" then
  cfg = _G.config
else
  cfg = {}
end

local function emit(key, value)
  io.write(key)
  io.write("=")
  io.write(tostring(value))
  io.write("\n")
end

local function expect_table(name, value)
  if value ~= nil and type(value) ~= "table" then
    io.stderr:write(name .. " must be a table\n")
    os.exit(1)
  end
end

local function emit_string(name, value)
  if value == nil then
    return
  end
  if type(value) ~= "string" then
    io.stderr:write(name .. " must be a string\n")
    os.exit(1)
  end
  emit(name, value)
end

local function emit_integer(name, value)
  if value == nil then
    return
  end
  if type(value) ~= "number" or value ~= math.floor(value) then
    io.stderr:write(name .. " must be an integer\n")
    os.exit(1)
  end
  emit(name, string.format("%d", value))
end

local function emit_bool_like(name, value)
  if value == nil then
    return
  end
  if type(value) == "boolean" or type(value) == "number" or type(value) == "string" then
    emit(name, value)
    return
  end
  io.stderr:write(name .. " must be a boolean\n")
  os.exit(1)
end

local function pick(tbl, key)
  if type(tbl) == "table" then
    return tbl[key]
  end
  return nil
end

local general = cfg.general
local protocols = cfg.protocols
local cursor = cfg.cursor
expect_table("general", general)
expect_table("protocols", protocols)
expect_table("cursor", cursor)

emit_integer("border_width", pick(general, "border_width") or cfg.border_width)
emit_bool_like("focus_on_map", pick(general, "focus_on_map"))
emit_bool_like("sync_existing_views", pick(protocols, "sync_existing_views"))
emit_string("cursor_theme", pick(cursor, "theme"))
emit_integer("cursor_size", pick(cursor, "size"))

if cfg.workspaces ~= nil then
  expect_table("workspaces", cfg.workspaces)
  for index, name in ipairs(cfg.workspaces) do
    emit_string("workspace." .. index, name)
  end
end
"#
}
