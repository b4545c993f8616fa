use crate::tools::registry::Tool;
use crate::tools::types::{
    PropertySchema, ToolContext, ToolDefinition, ToolGroup, ToolInputSchema, ToolResult,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::process::Command;

/// Reports facts about the host without running arbitrary commands
pub struct SystemInfoTool {
    definition: ToolDefinition,
}

impl SystemInfoTool {
    pub fn new() -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "command".to_string(),
            PropertySchema::string(
                "Type of information wanted, e.g. 'os', 'python', 'directory', 'user'",
            ),
        );

        SystemInfoTool {
            definition: ToolDefinition {
                name: "get_system_info".to_string(),
                description: "Get LOCAL system information like OS, platform, Python version, or current working directory. \
                    ONLY use for queries about THIS computer's configuration. NOT for time, date, or web information. \
                    Use this for quick system queries without executing shell commands."
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

impl Default for SystemInfoTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct SystemInfoParams {
    #[serde(default)]
    command: String,
}

/// First line of a version command, or `None` if the program is missing
async fn version_line(program: &str, args: &[&str]) -> Option<String> {
    let output = tokio::time::timeout(
        Duration::from_secs(3),
        Command::new(program).args(args).kill_on_drop(true).output(),
    )
    .await
    .ok()?
    .ok()?;
    if !output.status.success() {
        return None;
    }
    // Older pythons print the version on stderr
    let text = if output.stdout.is_empty() { output.stderr } else { output.stdout };
    String::from_utf8_lossy(&text).lines().next().map(|l| l.trim().to_string())
}

async fn os_version() -> String {
    version_line("uname", &["-r"]).await.unwrap_or_else(|| "Unknown".to_string())
}

async fn python_version() -> String {
    match version_line("python3", &["--version"]).await {
        Some(v) => v,
        None => version_line("python", &["--version"])
            .await
            .unwrap_or_else(|| "Not installed".to_string()),
    }
}

fn current_dir() -> String {
    std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "Unknown".to_string())
}

async fn collect_info(request: &str) -> Vec<(&'static str, String)> {
    let request = request.trim().to_lowercase();
    let mut info = Vec::new();

    if request.contains("os") || request.contains("platform") || request.contains("system") {
        info.push(("Operating System", std::env::consts::OS.to_string()));
        info.push(("OS Version", os_version().await));
        info.push((
            "Platform",
            format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
        ));
        info.push(("Architecture", std::env::consts::ARCH.to_string()));
    }

    if request.contains("python") || request.contains("rust") || request.contains("runtime") {
        info.push(("Python Version", python_version().await));
        info.push((
            "Assistant Runtime",
            format!("Rust ({} v{})", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        ));
    }

    if request.contains("directory") || request.contains("folder") || request.contains("location") {
        info.push(("Current Directory", current_dir()));
        info.push((
            "Home Directory",
            std::env::var("HOME").unwrap_or_else(|_| "Unknown".to_string()),
        ));
    }

    if request.contains("user") {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "Unknown".to_string());
        info.push(("Username", user));
    }

    if info.is_empty() {
        info.push(("Operating System", std::env::consts::OS.to_string()));
        info.push(("OS Version", os_version().await));
        info.push(("Python Version", python_version().await));
        info.push(("Current Directory", current_dir()));
    }

    info
}

#[async_trait]
impl Tool for SystemInfoTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> ToolResult {
        let params: SystemInfoParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
        };
        log::info!("[COMMAND] System info requested: {}", params.command);

        let mut lines = vec!["System Information:".to_string()];
        for (key, value) in collect_info(&params.command).await {
            lines.push(format!("  {}: {}", key, value));
        }
        ToolResult::success(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_system_info_definition() {
        let def = SystemInfoTool::new().definition();
        assert_eq!(def.name, "get_system_info");
        assert_eq!(def.group, ToolGroup::System);
    }

    #[tokio::test]
    async fn test_keyword_sections() {
        let info = collect_info("what platform am I on").await;
        let keys: Vec<_> = info.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["Operating System", "OS Version", "Platform", "Architecture"]);

        let info = collect_info("current folder").await;
        assert_eq!(info[0].0, "Current Directory");
        assert_eq!(info[1].0, "Home Directory");
    }

    #[tokio::test]
    async fn test_defaults_when_no_keyword_matches() {
        let result = SystemInfoTool::new()
            .execute(json!({"command": "anything"}), &ToolContext::new())
            .await;
        assert!(result.success);
        assert!(result.content.starts_with("System Information:\n  Operating System: "));
        assert!(result.content.contains("  Current Directory: "));
    }
}
