//! Configuration file handling.
//!
//! The config lives at `$HOME/.config/infinidesk/infinidesk.toml` and is
//! created with defaults on first launch. Recognised options are the HiDPI
//! output `scale`, a `startup` command list, and a `[keybinds]` table
//! mapping chords like `"super + t"` to actions.

use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
    process::Stdio,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use xkbcommon::xkb;

use crate::Action;

const CONFIG_DIR: &str = ".config/infinidesk";
const CONFIG_FILE: &str = "infinidesk.toml";

const DEFAULT_CONFIG: &str = r#"# Infinidesk configuration file

# Output scale factor for HiDPI displays (e.g., 1.0, 1.5, 2.0)
scale = 1.0

# Startup commands are executed when the compositor starts.
# Each command runs in its own shell process.
startup = [
]

[keybinds]
"super + t" = "exec:kitty"
"super + q" = "close_window"
"super + escape" = "exit"
"super + d" = "toggle_drawing"
"super + c" = "clear_drawings"
"super + u" = "undo_stroke"
"super + r" = "redo_stroke"
"super + g" = "gather_windows"
"alt + tab" = "window_switcher"
"#;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct KeyModifiers: u8 {
        const SUPER = 0b0001;
        const ALT   = 0b0010;
        const CTRL  = 0b0100;
        const SHIFT = 0b1000;
    }
}

/// A parsed keybind chord: a modifier bitmask plus an XKB keysym.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Chord {
    pub modifiers: KeyModifiers,
    pub keysym: u32,
}

/// The on-disk representation; chords and actions are parsed separately so
/// a single bad entry is skipped rather than failing the whole file.
#[derive(Debug, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default = "default_scale")]
    scale: f32,
    #[serde(default)]
    startup: Vec<String>,
    #[serde(default)]
    keybinds: BTreeMap<String, String>,
}

fn default_scale() -> f32 {
    1.0
}

#[derive(Debug, Clone)]
pub struct Config {
    pub scale: f32,
    pub startup: Vec<String>,
    pub keybinds: HashMap<Chord, Action>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scale: 1.0,
            startup: Vec::new(),
            keybinds: default_keybinds(),
        }
    }
}

impl Config {
    /// Load the config file, creating it with defaults if missing.
    pub fn load() -> Result<Self> {
        let path = config_path()?;

        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(&path, DEFAULT_CONFIG)
                .with_context(|| format!("failed to create {}", path.display()))?;
            info!("created default config file: {}", path.display());
        }

        info!("loading config from {}", path.display());
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Self::parse(&contents))
    }

    /// Parse config file contents. Invalid keybind entries are skipped with
    /// a log message; an unparsable file falls back to defaults entirely.
    pub fn parse(contents: &str) -> Self {
        let file: ConfigFile = match toml::from_str(contents) {
            Ok(file) => file,
            Err(err) => {
                error!("failed to parse config, using defaults: {err}");
                return Self::default();
            }
        };

        let scale = if file.scale > 0.0 {
            file.scale
        } else {
            warn!("config: scale must be positive, using 1.0");
            1.0
        };

        let keybinds = if file.keybinds.is_empty() {
            info!("config: no keybinds, using defaults");
            default_keybinds()
        } else {
            let mut keybinds = HashMap::new();
            for (chord_str, action_str) in &file.keybinds {
                let Some(chord) = parse_chord(chord_str) else {
                    error!("config: failed to parse keybind '{chord_str}'");
                    continue;
                };
                let Some(action) = parse_action(action_str) else {
                    error!("config: unknown action '{action_str}'");
                    continue;
                };
                debug!("config: keybind '{chord_str}' = '{action_str}'");
                keybinds.insert(chord, action);
            }
            keybinds
        };

        info!(
            "loaded {} startup command(s), {} keybind(s) from config",
            file.startup.len(),
            keybinds.len()
        );

        Self {
            scale,
            startup: file.startup,
            keybinds,
        }
    }

    /// Run all configured startup commands, each in its own shell. Failures
    /// are logged and do not terminate the compositor.
    pub fn run_startup_commands(&self) {
        for cmd in &self.startup {
            info!("running startup command: {cmd}");
            spawn_command(cmd);
        }
    }
}

pub fn spawn_command(cmd: &str) {
    if let Err(err) = std::process::Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .spawn()
    {
        error!("failed to run command '{cmd}': {err}");
    }
}

fn config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Parse a chord like `"super + Return"` or `"ctrl + alt + Delete"`. All
/// tokens but the last are modifiers; the last names an XKB keysym.
pub fn parse_chord(input: &str) -> Option<Chord> {
    let tokens: Vec<&str> = input.split('+').map(str::trim).filter(|t| !t.is_empty()).collect();
    let (&key_name, modifier_names) = tokens.split_last()?;

    let mut modifiers = KeyModifiers::empty();
    for name in modifier_names {
        match name.to_ascii_lowercase().as_str() {
            "super" => modifiers |= KeyModifiers::SUPER,
            "alt" => modifiers |= KeyModifiers::ALT,
            "ctrl" => modifiers |= KeyModifiers::CTRL,
            "shift" => modifiers |= KeyModifiers::SHIFT,
            _ => {
                error!("config: unknown modifier '{name}'");
                return None;
            }
        }
    }

    // Exact lookup first so "q" and "Q" stay distinct, then a
    // case-insensitive fallback to be forgiving of "return" vs "Return".
    let mut sym = xkb::keysym_from_name(key_name, xkb::KEYSYM_NO_FLAGS);
    if sym.raw() == xkb::keysyms::KEY_NoSymbol {
        sym = xkb::keysym_from_name(key_name, xkb::KEYSYM_CASE_INSENSITIVE);
    }
    if sym.raw() == xkb::keysyms::KEY_NoSymbol {
        error!("config: unknown key name '{key_name}'");
        return None;
    }

    Some(Chord {
        modifiers,
        keysym: sym.raw(),
    })
}

/// `exec:<cmd>` spawns a command; any other string must name a built-in.
pub fn parse_action(input: &str) -> Option<Action> {
    if let Some(cmd) = input.strip_prefix("exec:") {
        return Some(Action::Exec(cmd.to_string()));
    }

    match input {
        "close_window" => Some(Action::CloseWindow),
        "exit" => Some(Action::Exit),
        "toggle_drawing" => Some(Action::ToggleDrawing),
        "clear_drawings" => Some(Action::ClearDrawings),
        "undo_stroke" => Some(Action::Undo),
        "redo_stroke" => Some(Action::Redo),
        "gather_windows" => Some(Action::Gather),
        "window_switcher" => Some(Action::Switcher),
        _ => None,
    }
}

fn default_keybinds() -> HashMap<Chord, Action> {
    let defaults = [
        ("super + Return", "exec:kitty"),
        ("super + q", "close_window"),
        ("super + Escape", "exit"),
        ("super + d", "toggle_drawing"),
        ("super + c", "clear_drawings"),
        ("super + u", "undo_stroke"),
        ("super + r", "redo_stroke"),
        ("super + g", "gather_windows"),
        ("alt + Tab", "window_switcher"),
    ];

    let mut keybinds = HashMap::new();
    for (chord_str, action_str) in defaults {
        let (Some(chord), Some(action)) = (parse_chord(chord_str), parse_action(action_str))
        else {
            continue;
        };
        keybinds.insert(chord, action);
    }
    keybinds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_modifier_chord() {
        let chord = parse_chord("super + t").unwrap();
        assert_eq!(chord.modifiers, KeyModifiers::SUPER);
        assert_eq!(chord.keysym, xkb::keysyms::KEY_t);
    }

    #[test]
    fn parses_multi_modifier_chord() {
        let chord = parse_chord("ctrl + alt + Delete").unwrap();
        assert_eq!(chord.modifiers, KeyModifiers::CTRL | KeyModifiers::ALT);
        assert_eq!(chord.keysym, xkb::keysyms::KEY_Delete);
    }

    #[test]
    fn modifier_names_are_case_insensitive() {
        let chord = parse_chord("Super + SHIFT + x").unwrap();
        assert_eq!(chord.modifiers, KeyModifiers::SUPER | KeyModifiers::SHIFT);
    }

    #[test]
    fn key_name_falls_back_to_case_insensitive() {
        let chord = parse_chord("super + escape").unwrap();
        assert_eq!(chord.keysym, xkb::keysyms::KEY_Escape);
    }

    #[test]
    fn rejects_unknown_modifier_and_key() {
        assert!(parse_chord("hyper + t").is_none());
        assert!(parse_chord("super + NotAKeyName").is_none());
        assert!(parse_chord("").is_none());
    }

    #[test]
    fn parses_actions() {
        assert_eq!(
            parse_action("exec:kitty -e htop"),
            Some(Action::Exec("kitty -e htop".into()))
        );
        assert_eq!(parse_action("gather_windows"), Some(Action::Gather));
        assert_eq!(parse_action("window_switcher"), Some(Action::Switcher));
        assert_eq!(parse_action("frobnicate"), None);
    }

    #[test]
    fn default_config_round_trips() {
        let config = Config::parse(DEFAULT_CONFIG);
        assert_eq!(config.scale, 1.0);
        assert!(config.startup.is_empty());
        assert_eq!(config.keybinds.len(), 9);

        let exit_chord = parse_chord("super + escape").unwrap();
        assert_eq!(config.keybinds.get(&exit_chord), Some(&Action::Exit));
    }

    #[test]
    fn bad_entries_are_skipped() {
        let config = Config::parse(
            r#"
scale = 2.0
startup = ["swaybg -i wall.png"]

[keybinds]
"super + t" = "exec:kitty"
"bogus + t" = "exit"
"super + x" = "not_an_action"
"#,
        );
        assert_eq!(config.scale, 2.0);
        assert_eq!(config.startup.len(), 1);
        assert_eq!(config.keybinds.len(), 1);
    }

    #[test]
    fn empty_keybinds_get_defaults() {
        let config = Config::parse("scale = 1.5\n");
        assert_eq!(config.scale, 1.5);
        assert_eq!(config.keybinds.len(), 9);
    }

    #[test]
    fn non_positive_scale_is_rejected() {
        let config = Config::parse("scale = -1.0\n");
        assert_eq!(config.scale, 1.0);
    }

    #[test]
    fn load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        // Config path is derived from HOME.
        std::env::set_var("HOME", dir.path());

        let config = Config::load().unwrap();
        assert!(dir
            .path()
            .join(".config/infinidesk/infinidesk.toml")
            .exists());
        assert_eq!(config.keybinds.len(), 9);

        // Loading again reads the created file.
        let config = Config::load().unwrap();
        assert_eq!(config.scale, 1.0);
    }
}
