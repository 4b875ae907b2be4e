//! Skills: prompt functions loaded from `<skills>/<Skill>/<Function>/skprompt.txt`.
//!
//! Each function may carry a `config.json` with completion settings and input parameter
//! defaults (see prompt_config). Templates use `{{$name}}` variables (see template).

mod loader;
mod prompt_config;
pub mod template;

pub use loader::{import_skill_from_directory, list_skills, Skill, SkillFunction, SkillSummary};
pub use prompt_config::{CompletionSettings, InputConfig, InputParameter, PromptConfig};
pub use template::{render, Variables, INPUT_VAR};
