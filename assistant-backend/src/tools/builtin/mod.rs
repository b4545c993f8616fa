mod document_info;
mod exec;
mod notes;
mod rag_search;
mod system_info;
mod weather;
mod web_search;

pub use document_info::DocumentInfoTool;
pub use exec::ExecuteCommandTool;
pub use notes::{EditNoteTool, ListNotesTool, RetrieveNoteTool, SaveNoteTool};
pub use rag_search::RagSearchTool;
pub use system_info::SystemInfoTool;
pub use weather::WeatherTool;
pub use web_search::WebSearchTool;
