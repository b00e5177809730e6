//! Build script for reflex-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates panel.toml at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Keys accepted in each section, with their inclusive range
const SCHEMA: &[(&str, &[(&str, Kind)])] = &[
    ("clock", &[("sys_clock_hz", Kind::Int(1_000_000, 300_000_000))]),
    (
        "panel",
        &[
            ("width", Kind::Int(8, 1024)),
            ("lines", Kind::Int(1, 1024)),
        ],
    ),
    (
        "protocol",
        &[
            ("gck_half_period_cycles", Kind::Int(32, 1_000_000)),
            ("settle_pulses", Kind::Int(1, 64)),
        ],
    ),
    (
        "partial",
        &[
            ("half_line_width", Kind::Int(1, 4096)),
            ("lead_with_skip", Kind::Int(0, 4096)),
            ("lead_with_change", Kind::Int(0, 4096)),
        ],
    ),
    (
        "power",
        &[
            ("supply_rise_us", Kind::Int(1_000, 1_000_000)),
            ("dark_frame_ms", Kind::Int(1, 10_000)),
            ("bias_lead_us", Kind::Int(30, 1_000_000)),
            ("bias_hz", Kind::Int(1, 1_000)),
            ("bias_settle_half_cycles", Kind::Int(3, 1_000)),
            ("shutdown_settle_us", Kind::Int(0, 1_000_000)),
        ],
    ),
    (
        "policy",
        &[
            ("partial_updates", Kind::Bool),
            ("max_partial_lines", Kind::Int(0, 1024)),
        ],
    ),
    ("link", &[("baud_rate", Kind::Int(9_600, 15_000_000))]),
];

/// Sections that must be present
const REQUIRED: &[&str] = &["panel", "protocol"];

#[derive(Clone, Copy)]
enum Kind {
    Int(i64, i64),
    Bool,
}

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");

    // Re-run if memory.x changes
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate panel.toml configuration at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=panel.toml");

    let config_path = Path::new("panel.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: panel.toml not found!                                    ║\n\
            ║                                                                  ║\n\
            ║  The firmware embeds panel.toml as its configuration.            ║\n\
            ║  Please create one in the reflex-firmware directory.             ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read panel.toml                                ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in panel.toml                        ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let mut errors = Vec::new();
    validate_sections(&config, &mut errors);
    validate_cross_fields(&config, &mut errors);
    report("Invalid panel configuration", &errors);

    println!("cargo:warning=panel.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Panic with a boxed list of errors, if there are any
fn report(title: &str, errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        errors
            .iter()
            .map(|e| format!("║  • {:<62} ║", e))
            .collect::<Vec<_>>()
            .join("\n")
    );
}

/// Check every section and key against the schema
fn validate_sections(config: &toml::Value, errors: &mut Vec<String>) {
    let root = match config.as_table() {
        Some(t) => t,
        None => return,
    };

    for name in REQUIRED {
        if !root.contains_key(*name) {
            errors.push(format!("Missing [{}] section", name));
        }
    }

    for (name, section) in root {
        let keys = match SCHEMA.iter().find(|(s, _)| *s == name.as_str()) {
            Some((_, keys)) => keys,
            None => {
                errors.push(format!("Unknown section [{}]", name));
                continue;
            }
        };
        let section = match section.as_table() {
            Some(t) => t,
            None => {
                errors.push(format!("[{}] must be a table", name));
                continue;
            }
        };

        for (key, value) in section {
            let kind = match keys.iter().find(|(k, _)| *k == key.as_str()) {
                Some((_, kind)) => *kind,
                None => {
                    errors.push(format!("[{}] unknown key '{}'", name, key));
                    continue;
                }
            };
            match (kind, value) {
                (Kind::Int(min, max), toml::Value::Integer(v)) => {
                    if *v < min || *v > max {
                        errors.push(format!("[{}] {} must be {}-{}", name, key, min, max));
                    }
                }
                (Kind::Int(..), _) => {
                    errors.push(format!("[{}] {} must be an integer", name, key));
                }
                (Kind::Bool, toml::Value::Boolean(_)) => {}
                (Kind::Bool, _) => {
                    errors.push(format!("[{}] {} must be true or false", name, key));
                }
            }
        }
    }
}

fn int(config: &toml::Value, section: &str, key: &str) -> Option<i64> {
    config.get(section)?.get(key)?.as_integer()
}

/// Constraints spanning more than one key
fn validate_cross_fields(config: &toml::Value, errors: &mut Vec<String>) {
    if let Some(width) = int(config, "panel", "width") {
        if width % 8 != 0 {
            errors.push("[panel] width must be a multiple of 8".to_string());
        }
    }

    if let (Some(limit), Some(lines)) = (
        int(config, "policy", "max_partial_lines"),
        int(config, "panel", "lines"),
    ) {
        if limit > lines {
            errors.push("[policy] max_partial_lines exceeds [panel] lines".to_string());
        }
    }

    if let (Some(width), Some(lines)) = (int(config, "panel", "width"), int(config, "panel", "lines")) {
        // Must fit the statically allocated frame buffers
        if width * lines > 240 * 320 {
            errors.push("[panel] width * lines exceeds the 76800-byte frame buffer".to_string());
        }
    }
}
