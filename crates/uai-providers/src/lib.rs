pub mod api;
mod claude;
mod gemini;
mod locate;
mod output;
mod search;
mod spawner;
mod traits;

pub use claude::ClaudeCodeProvider;
pub use gemini::{classify_cli_result, CliVerdict, GeminiProvider};
pub use locate::locate_binary;
pub use output::{ExecutionPath, ProcessOutput, ProviderOutput};
pub use search::{render_search_result, SearchFormat, SearchProvider};
pub use spawner::ProcessSpawner;
pub use traits::{Provider, ProviderConfig, ProviderError, ProviderKind};
