//! Whitelisted local command execution
//!
//! Only the commands in `ALLOWED_COMMANDS` can run. Each one is spawned
//! directly as a program with an argument list, never through a shell, so
//! user-supplied parameters are passed as plain arguments.

use crate::tools::registry::Tool;
use crate::tools::types::{
    PropertySchema, ToolContext, ToolDefinition, ToolGroup, ToolInputSchema, ToolResult,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Component, Path};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const COMMAND_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Params {
    None,
    Path,
    OldNew,
    SourceDest,
}

struct AllowedCommand {
    key: &'static str,
    program: &'static str,
    args: &'static [&'static str],
    params: Params,
    desc: &'static str,
}

const ALLOWED_COMMANDS: &[AllowedCommand] = &[
    AllowedCommand { key: "pwd", program: "pwd", args: &[], params: Params::None, desc: "Show current directory" },
    AllowedCommand { key: "ls", program: "ls", args: &[], params: Params::None, desc: "List files in current directory" },
    AllowedCommand { key: "list_files", program: "ls", args: &["-la"], params: Params::None, desc: "List files with details" },
    AllowedCommand { key: "mkdir", program: "mkdir", args: &[], params: Params::Path, desc: "Create a new directory (usage: mkdir foldername)" },
    AllowedCommand { key: "touch", program: "touch", args: &[], params: Params::Path, desc: "Create a new empty file (usage: touch filename.txt)" },
    AllowedCommand { key: "create_file", program: "touch", args: &[], params: Params::Path, desc: "Create a new empty file" },
    AllowedCommand { key: "rename", program: "mv", args: &[], params: Params::OldNew, desc: "Rename a file or directory (usage: rename oldname newname)" },
    AllowedCommand { key: "copy", program: "cp", args: &[], params: Params::SourceDest, desc: "Copy a file (usage: copy source.txt destination.txt)" },
    AllowedCommand { key: "move", program: "mv", args: &[], params: Params::SourceDest, desc: "Move a file (usage: move file.txt newfolder/)" },
    AllowedCommand { key: "whoami", program: "whoami", args: &[], params: Params::None, desc: "Show current user" },
    AllowedCommand { key: "hostname", program: "hostname", args: &[], params: Params::None, desc: "Show computer name" },
    AllowedCommand { key: "os_info", program: "uname", args: &["-a"], params: Params::None, desc: "Show OS information" },
    AllowedCommand { key: "disk_space", program: "df", args: &["-h"], params: Params::None, desc: "Show disk space" },
    AllowedCommand { key: "ip_address", program: "ifconfig", args: &[], params: Params::None, desc: "Show network configuration" },
    AllowedCommand { key: "python_version", program: "python3", args: &["--version"], params: Params::None, desc: "Show Python version" },
    AllowedCommand { key: "pip_version", program: "pip3", args: &["--version"], params: Params::None, desc: "Show pip version" },
];

const ALIASES: &[(&str, &str)] = &[
    ("where am i", "pwd"),
    ("current directory", "pwd"),
    ("show files", "ls"),
    ("list directory", "ls"),
    ("my username", "whoami"),
    ("computer name", "hostname"),
    ("system info", "os_info"),
    ("check disk space", "disk_space"),
    ("my ip", "ip_address"),
];

fn lookup(key: &str) -> Option<&'static AllowedCommand> {
    ALLOWED_COMMANDS.iter().find(|c| c.key == key)
}

/// A resolved program invocation
#[derive(Debug, Clone, PartialEq)]
struct Invocation {
    program: String,
    args: Vec<String>,
}

impl Invocation {
    fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(|a| a.as_str()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn refusal(command: &str) -> String {
    let available = ALLOWED_COMMANDS
        .iter()
        .map(|c| format!("- {}: {}", c.key, c.desc))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "❌ Command '{}' is not allowed for security reasons.\n\n\
         Available commands:\n{}\n\n\
         Example: 'list files', 'create folder test', 'rename old.txt new.txt'",
        command, available
    )
}

/// Picks the program for platform-dependent entries
fn program_for(entry: &AllowedCommand) -> String {
    match entry.key {
        "ip_address" if which::which("ifconfig").is_err() && which::which("ip").is_ok() => "ip".to_string(),
        "python_version" if which::which("python3").is_err() => "python".to_string(),
        "pip_version" if which::which("pip3").is_err() => "pip".to_string(),
        _ => entry.program.to_string(),
    }
}

/// User paths stay relative to the workspace directory
fn check_path(entry: &AllowedCommand, path: &str) -> Result<(), String> {
    let escapes = Path::new(path).components().any(|c| {
        matches!(c, Component::RootDir | Component::Prefix(_) | Component::ParentDir)
    });
    if escapes || path.starts_with('~') {
        return Err(format!(
            "❌ Command '{}' only works inside the workspace directory. '{}' is not allowed: use a relative path without '..'.",
            entry.key, path
        ));
    }
    Ok(())
}

/// Map the requested command text to a whitelisted invocation, or the
/// message to return to the model
fn resolve(command: &str) -> Result<Invocation, String> {
    let normalized = command.trim().to_lowercase();
    let key = ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, key)| *key)
        .unwrap_or(normalized.as_str());

    let parts: Vec<&str> = command.split_whitespace().collect();
    let entry = match lookup(key) {
        Some(entry) => entry,
        None => {
            // Parameterized commands carry their arguments after the first word
            let first = parts.first().map(|w| w.to_lowercase()).unwrap_or_default();
            match lookup(&first) {
                Some(entry) if entry.params != Params::None => entry,
                _ => return Err(refusal(command)),
            }
        }
    };

    let program = program_for(entry);
    let mut args: Vec<String> = if program == "ip" {
        vec!["addr".to_string()]
    } else {
        entry.args.iter().map(|a| a.to_string()).collect()
    };

    match entry.params {
        Params::None => {}
        Params::Path => {
            if parts.len() < 2 {
                return Err(format!("❌ Command '{}' requires parameters. {}", entry.key, entry.desc));
            }
            let path = parts[1..].join(" ");
            check_path(entry, &path)?;
            args.push("--".to_string());
            args.push(path);
        }
        Params::OldNew | Params::SourceDest => {
            if parts.len() < 2 {
                return Err(format!("❌ Command '{}' requires parameters. {}", entry.key, entry.desc));
            }
            if parts.len() < 3 {
                let what = if entry.params == Params::OldNew {
                    "two parameters"
                } else {
                    "source and destination"
                };
                return Err(format!("❌ Command '{}' requires {}. {}", entry.key, what, entry.desc));
            }
            let (from, to) = (parts[1].to_string(), parts[2..].join(" "));
            check_path(entry, &from)?;
            check_path(entry, &to)?;
            // Everything after `--` is an operand, never an option
            args.push("--".to_string());
            args.push(from);
            args.push(to);
        }
    }

    Ok(Invocation { program, args })
}

pub struct ExecuteCommandTool {
    definition: ToolDefinition,
}

impl ExecuteCommandTool {
    pub fn new() -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "command".to_string(),
            PropertySchema::string("The system command to execute (must be from allowed list)"),
        );

        ExecuteCommandTool {
            definition: ToolDefinition {
                name: "execute_command".to_string(),
                description: "Execute LOCAL system commands for file/directory operations on THIS computer. \
                    Can: list files, create directories, create/rename/copy/move files, check disk space. \
                    ONLY use for local file system operations. NOT for time, weather, or web information. \
                    Examples: 'create folder test', 'rename file.txt newfile.txt', 'list files'. \
                    Only safe, whitelisted commands are allowed."
                    .to_string(),
                input_schema: ToolInputSchema {
                    schema_type: "object".to_string(),
                    properties,
                    required: vec!["command".to_string()],
                },
                group: ToolGroup::System,
            },
        }
    }
}

impl Default for ExecuteCommandTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct ExecuteCommandParams {
    command: String,
}

#[async_trait]
impl Tool for ExecuteCommandTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, context: &ToolContext) -> ToolResult {
        let params: ExecuteCommandParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
        };
        log::info!("[COMMAND] Command execution requested: {}", params.command);

        let invocation = match resolve(&params.command) {
            Ok(invocation) => invocation,
            Err(message) => return ToolResult::error(message),
        };
        log::info!("[COMMAND] Executing whitelisted command: {}", invocation.display());

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &context.workspace_dir {
            cmd.current_dir(dir);
        }

        let output = match tokio::time::timeout(Duration::from_secs(COMMAND_TIMEOUT_SECS), cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                log::error!("[COMMAND] Error executing command: {}", e);
                return ToolResult::error(format!("❌ Error executing command: {}", e));
            }
            Err(_) => {
                log::error!("[COMMAND] Command '{}' timed out", params.command);
                return ToolResult::error(format!(
                    "❌ Command '{}' timed out after {} seconds",
                    params.command, COMMAND_TIMEOUT_SECS
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let exit_code = output.status.code().unwrap_or(-1);

        if output.status.success() {
            let content = if stdout.is_empty() {
                "✓ Command completed (no output)".to_string()
            } else {
                format!("✓ Command executed successfully:\n\n{}", stdout)
            };
            ToolResult::success(content).with_metadata(json!({
                "command": invocation.display(),
                "exit_code": exit_code,
            }))
        } else if stderr.is_empty() {
            ToolResult::error("Command failed with no error message")
        } else {
            ToolResult::error(format!("⚠️ Command failed (exit code {}):\n{}", exit_code, stderr))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_execute_command_definition() {
        let def = ExecuteCommandTool::new().definition();
        assert_eq!(def.name, "execute_command");
        assert_eq!(def.group, ToolGroup::System);
        assert_eq!(def.input_schema.required, vec!["command"]);
    }

    #[test]
    fn test_resolve_aliases_and_parameters() {
        assert_eq!(resolve("Where am I").unwrap().program, "pwd");
        assert_eq!(
            resolve("list_files").unwrap(),
            Invocation { program: "ls".to_string(), args: vec!["-la".to_string()] }
        );
        assert_eq!(resolve("mkdir my folder").unwrap().args, vec!["--", "my folder"]);
        assert_eq!(
            resolve("rename old.txt new name.txt").unwrap(),
            Invocation {
                program: "mv".to_string(),
                args: vec!["--".to_string(), "old.txt".to_string(), "new name.txt".to_string()]
            }
        );
        assert_eq!(resolve("copy a.txt b.txt").unwrap().program, "cp");
    }

    #[test]
    fn test_resolve_rejects_unknown_and_incomplete() {
        let refused = resolve("rm -rf /").unwrap_err();
        assert!(refused.starts_with("❌ Command 'rm -rf /' is not allowed for security reasons."));
        assert!(refused.contains("- pwd: Show current directory"));
        assert!(refused.ends_with("'rename old.txt new.txt'"));

        // Argument-free commands do not accept trailing words
        assert!(resolve("ls /etc").is_err());

        assert_eq!(
            resolve("mkdir").unwrap_err(),
            "❌ Command 'mkdir' requires parameters. Create a new directory (usage: mkdir foldername)"
        );
        assert!(resolve("rename onlyone").unwrap_err().contains("requires two parameters"));
        assert!(resolve("move onlyone").unwrap_err().contains("requires source and destination"));
    }

    #[test]
    fn test_user_arguments_are_operands() {
        assert_eq!(
            resolve("move --target-directory=/etc notes.txt").unwrap(),
            Invocation {
                program: "mv".to_string(),
                args: vec![
                    "--".to_string(),
                    "--target-directory=/etc".to_string(),
                    "notes.txt".to_string()
                ]
            }
        );
        assert_eq!(resolve("touch -r").unwrap().args, vec!["--", "-r"]);
    }

    #[test]
    fn test_paths_outside_workspace_rejected() {
        for command in [
            "mkdir ../../escape",
            "touch /etc/passwd",
            "copy notes.txt ../backup.txt",
            "rename a/../../b.txt c.txt",
            "mkdir ~/outside",
        ] {
            let err = resolve(command).unwrap_err();
            assert!(
                err.contains("only works inside the workspace directory"),
                "{} -> {}",
                command,
                err
            );
        }
        assert_eq!(resolve("mkdir reports/2024").unwrap().args, vec!["--", "reports/2024"]);
    }

    #[tokio::test]
    async fn test_runs_in_workspace_dir() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new().with_workspace_dir(dir.path().to_path_buf());
        let tool = ExecuteCommandTool::new();

        let made = tool.execute(json!({"command": "mkdir reports"}), &ctx).await;
        assert!(made.success);
        assert_eq!(made.content, "✓ Command completed (no output)");
        assert!(dir.path().join("reports").is_dir());

        let listed = tool.execute(json!({"command": "ls"}), &ctx).await;
        assert!(listed.content.starts_with("✓ Command executed successfully:\n\n"));
        assert!(listed.content.contains("reports"));
    }

    #[tokio::test]
    async fn test_failed_command_reports_exit_code() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new().with_workspace_dir(dir.path().to_path_buf());
        let result = ExecuteCommandTool::new()
            .execute(json!({"command": "copy missing.txt other.txt"}), &ctx)
            .await;
        assert!(!result.success);
        assert!(result.content.starts_with("⚠️ Command failed (exit code 1):"));
    }
}
