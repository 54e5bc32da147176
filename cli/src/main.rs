use serde::Deserialize;
use std::env;
use std::os::unix::process::CommandExt;
use std::process;

const DEFAULT_PLUGIN: &str = "file:~/.config/zellij/plugins/zellij-tab-picker.wasm";
const PIPE_PREFIX: &str = "tab-picker:";

struct Binding {
    key: &'static str,
    pipe: &'static str,
}

const DEFAULT_BINDINGS: &[Binding] = &[
    Binding { key: "Alt p", pipe: "pick" },
    Binding { key: "Alt x", pipe: "delete" },
];

#[derive(Debug, Deserialize)]
struct StatusTab {
    group: usize,
    label: String,
    key: char,
}

#[derive(Debug, Deserialize)]
struct StatusReport {
    active: bool,
    mode: Option<String>,
    #[serde(default)]
    tabs: Vec<StatusTab>,
}

fn print_help() {
    eprintln!("tab-picker - CLI companion for the zellij-tab-picker plugin");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  tab-picker pick               Show the picker to open a pane");
    eprintln!("  tab-picker delete             Show the picker to close a pane");
    eprintln!("  tab-picker cancel             Dismiss the picker");
    eprintln!("  tab-picker key <letter>       Send a keystroke to the active picker");
    eprintln!("  tab-picker cleanup            Restore pane titles after a crash");
    eprintln!("  tab-picker status [--json]    Show the picker state");
    eprintln!("  tab-picker keybindings        Print a KDL keybinding snippet");
    eprintln!("  tab-picker --help             Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  TAB_PICKER_PLUGIN   plugin location (default {})", DEFAULT_PLUGIN);
}

fn plugin_location() -> String {
    env::var("TAB_PICKER_PLUGIN")
        .ok()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| DEFAULT_PLUGIN.to_string())
}

fn pipe_args(plugin: &str, command: &str, args: Option<&str>) -> Vec<String> {
    let mut out = vec![
        "pipe".to_string(),
        "--plugin".to_string(),
        plugin.to_string(),
        "--name".to_string(),
        format!("{}{}", PIPE_PREFIX, command),
    ];
    if let Some(args) = args {
        out.push("--args".to_string());
        out.push(args.to_string());
    }
    out
}

fn require_zellij() {
    if env::var("ZELLIJ").is_err() {
        eprintln!("tab-picker: not running inside a zellij session");
        process::exit(1);
    }
}

fn exec_pipe(command: &str, args: Option<&str>) -> ! {
    require_zellij();
    let err = process::Command::new("zellij")
        .args(pipe_args(&plugin_location(), command, args))
        .exec();
    eprintln!("tab-picker: failed to exec zellij: {}", err);
    process::exit(1);
}

fn validate_key(args: &[String]) -> Result<char, String> {
    let [key] = args else {
        return Err("Usage: tab-picker key <letter>".to_string());
    };
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Ok(c),
        _ => Err(format!("tab-picker: '{}' is not a single letter", key)),
    }
}

fn do_key(args: &[String]) {
    match validate_key(args) {
        Ok(key) => exec_pipe("key", Some(&format!("key={}", key))),
        Err(msg) => {
            eprintln!("{}", msg);
            process::exit(1);
        }
    }
}

fn format_status(report: &StatusReport) -> String {
    if !report.active {
        return "inactive\n".to_string();
    }
    let mut out = format!("active ({})\n", report.mode.as_deref().unwrap_or("?"));
    for tab in &report.tabs {
        out.push_str(&format!(
            "  [{}] {} (tab {})\n",
            tab.key.to_ascii_uppercase(),
            tab.label,
            tab.group
        ));
    }
    out
}

fn do_status(args: &[String]) {
    let json = match args {
        [] => false,
        [flag] if flag == "--json" => true,
        _ => {
            eprintln!("Usage: tab-picker status [--json]");
            process::exit(1);
        }
    };
    if json {
        exec_pipe("status", None);
    }

    require_zellij();
    let output = process::Command::new("zellij")
        .args(pipe_args(&plugin_location(), "status", None))
        .output()
        .unwrap_or_else(|e| {
            eprintln!("tab-picker: failed to run zellij: {}", e);
            process::exit(1);
        });
    if !output.status.success() {
        eprintln!("tab-picker: zellij pipe exited with {}", output.status);
        process::exit(1);
    }

    let reply = String::from_utf8_lossy(&output.stdout);
    if let Some(msg) = reply.trim().strip_prefix("error: ") {
        eprintln!("tab-picker: {}", msg);
        process::exit(1);
    }
    let report: StatusReport = serde_json::from_str(reply.trim()).unwrap_or_else(|e| {
        eprintln!("tab-picker: unexpected status reply: {}", e);
        process::exit(1);
    });
    print!("{}", format_status(&report));
}

fn keybindings_snippet(plugin: &str) -> String {
    let mut out = String::from("keybinds {\n    shared_except \"locked\" {\n");
    for binding in DEFAULT_BINDINGS {
        out.push_str(&format!(
            "        bind \"{}\" {{\n            MessagePlugin \"{}\" {{\n                name \"{}{}\"\n            }}\n        }}\n",
            binding.key, plugin, PIPE_PREFIX, binding.pipe
        ));
    }
    out.push_str("    }\n}\n");
    out
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.is_empty() {
        print_help();
        process::exit(1);
    }

    match args[0].as_str() {
        "--help" | "-h" => print_help(),
        "pick" | "delete" | "cancel" | "cleanup" => exec_pipe(&args[0], None),
        "key" => do_key(&args[1..]),
        "status" => do_status(&args[1..]),
        "keybindings" => print!("{}", keybindings_snippet(&plugin_location())),
        other => {
            eprintln!("tab-picker: unknown command '{}'", other);
            eprintln!("Run with --help for usage");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_pipe_args() {
        assert_eq!(
            pipe_args("file:/p.wasm", "pick", None),
            strings(&["pipe", "--plugin", "file:/p.wasm", "--name", "tab-picker:pick"])
        );
        assert_eq!(
            pipe_args("file:/p.wasm", "key", Some("key=a")),
            strings(&[
                "pipe", "--plugin", "file:/p.wasm", "--name", "tab-picker:key", "--args", "key=a",
            ])
        );
    }

    #[test]
    fn test_validate_key() {
        assert_eq!(validate_key(&strings(&["r"])), Ok('r'));
        assert_eq!(validate_key(&strings(&["R"])), Ok('R'));
        assert!(validate_key(&strings(&["rr"])).is_err());
        assert!(validate_key(&strings(&["1"])).is_err());
        assert!(validate_key(&[]).is_err());
        assert!(validate_key(&strings(&["a", "b"])).is_err());
    }

    #[test]
    fn test_format_status() {
        let report: StatusReport = serde_json::from_str(
            r#"{"active":true,"mode":"navigate","tabs":[
                {"group":1,"index":0,"identity":"/src/main.rs","label":"main.rs","key":"m"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(format_status(&report), "active (navigate)\n  [M] main.rs (tab 1)\n");

        let idle: StatusReport =
            serde_json::from_str(r#"{"active":false,"mode":null,"tabs":[]}"#).unwrap();
        assert_eq!(format_status(&idle), "inactive\n");
    }

    #[test]
    fn test_keybindings_snippet() {
        let snippet = keybindings_snippet("file:/p.wasm");
        assert!(snippet.contains("bind \"Alt p\""));
        assert!(snippet.contains("MessagePlugin \"file:/p.wasm\""));
        assert!(snippet.contains("name \"tab-picker:delete\""));
        assert!(snippet.ends_with("}\n"));
    }
}
