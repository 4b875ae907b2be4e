//! Load skills from disk. A skill is a directory of functions; each function is a subdirectory
//! holding `skprompt.txt` (the template) and optionally `config.json` (see prompt_config).
//!
//! ```text
//! skills/
//!   FunSkill/
//!     Joke/
//!       skprompt.txt
//!       config.json
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::prompt_config::PromptConfig;
use super::template::{self, Variables};

const PROMPT_FILE: &str = "skprompt.txt";
const CONFIG_FILE: &str = "config.json";

/// One prompt function inside a skill.
#[derive(Debug, Clone)]
pub struct SkillFunction {
    pub skill_name: String,
    pub name: String,
    pub path: PathBuf,
    /// Raw skprompt.txt content.
    pub template: String,
    pub config: PromptConfig,
}

impl SkillFunction {
    pub fn description(&self) -> &str {
        &self.config.description
    }

    /// Render the template with `vars`, falling back to the declared parameter defaults.
    pub fn render_prompt(&self, vars: &Variables) -> String {
        template::render(&self.template, vars, &self.config.parameter_defaults())
    }
}

/// A loaded skill: its name and functions (sorted by name).
#[derive(Debug, Clone)]
pub struct Skill {
    pub name: String,
    pub path: PathBuf,
    functions: Vec<SkillFunction>,
}

impl Skill {
    /// Function by name (case-insensitive).
    pub fn function(&self, name: &str) -> Option<&SkillFunction> {
        self.functions
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn functions(&self) -> &[SkillFunction] {
        &self.functions
    }
}

/// Skill name and function names, for listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillSummary {
    pub name: String,
    pub functions: Vec<String>,
}

/// Load `skills_dir/skill_name` and all of its functions.
/// Fails when the directory is missing, the name is invalid, a config.json is malformed, or no
/// function was found.
pub fn import_skill_from_directory(skills_dir: &Path, skill_name: &str) -> Result<Skill> {
    if !is_valid_name(skill_name) {
        anyhow::bail!(
            "invalid skill name {:?}: use only ASCII letters, digits and underscores",
            skill_name
        );
    }
    let dir = skills_dir.join(skill_name);
    if !dir.is_dir() {
        anyhow::bail!("skill directory not found: {}", dir.display());
    }
    let mut functions = Vec::new();
    for path in sorted_subdirs(&dir)? {
        if let Some(f) = load_function(skill_name, &path)? {
            functions.push(f);
        }
    }
    if functions.is_empty() {
        anyhow::bail!(
            "skill {} has no functions (expected */{} under {})",
            skill_name,
            PROMPT_FILE,
            dir.display()
        );
    }
    log::debug!(
        "imported skill {} with {} function(s) from {}",
        skill_name,
        functions.len(),
        dir.display()
    );
    Ok(Skill {
        name: skill_name.to_string(),
        path: dir,
        functions,
    })
}

/// List skills under `skills_dir` with their function names. Missing dir => empty list.
/// Directories without any function are left out.
pub fn list_skills(skills_dir: &Path) -> Result<Vec<SkillSummary>> {
    if !skills_dir.is_dir() {
        log::debug!("skills directory not found: {}", skills_dir.display());
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for skill_dir in sorted_subdirs(skills_dir)? {
        let Some(name) = dir_name(&skill_dir) else {
            continue;
        };
        let functions: Vec<String> = sorted_subdirs(&skill_dir)?
            .iter()
            .filter(|p| p.join(PROMPT_FILE).is_file())
            .filter_map(|p| dir_name(p))
            .collect();
        if !functions.is_empty() {
            out.push(SkillSummary { name, functions });
        }
    }
    Ok(out)
}

/// `Ok(None)` when the directory is not a function (no skprompt.txt, or an invalid name).
fn load_function(skill_name: &str, dir: &Path) -> Result<Option<SkillFunction>> {
    let prompt_path = dir.join(PROMPT_FILE);
    if !prompt_path.is_file() {
        return Ok(None);
    }
    let Some(name) = dir_name(dir) else {
        return Ok(None);
    };
    if !is_valid_name(&name) {
        log::warn!("skipping function with invalid name: {}", dir.display());
        return Ok(None);
    }
    let template = std::fs::read_to_string(&prompt_path)
        .with_context(|| format!("reading {}", prompt_path.display()))?;
    let config_path = dir.join(CONFIG_FILE);
    let config = if config_path.is_file() {
        let s = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        serde_json::from_str::<PromptConfig>(&s)
            .with_context(|| format!("parsing {}", config_path.display()))?
    } else {
        PromptConfig::default()
    };
    if config.typ != "completion" {
        log::warn!(
            "function {}.{} has type {:?}; it will be run as a completion",
            skill_name,
            name,
            config.typ
        );
    }
    Ok(Some(SkillFunction {
        skill_name: skill_name.to_string(),
        name,
        path: dir.to_path_buf(),
        template,
        config,
    }))
}

fn sorted_subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let read_dir =
        std::fs::read_dir(dir).with_context(|| format!("reading directory {}", dir.display()))?;
    let mut dirs: Vec<PathBuf> = read_dir
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn dir_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.to_string())
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_skills_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("meek-skills-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_function(root: &Path, skill: &str, func: &str, prompt: &str, config: Option<&str>) {
        let dir = root.join(skill).join(func);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(PROMPT_FILE), prompt).unwrap();
        if let Some(c) = config {
            std::fs::write(dir.join(CONFIG_FILE), c).unwrap();
        }
    }

    #[test]
    fn imports_functions_and_renders() {
        let root = temp_skills_dir();
        write_function(
            &root,
            "FunSkill",
            "Joke",
            "Tell a {{$style}} joke about {{$input}}",
            Some(r#"{"description":"joke","input":{"parameters":[{"name":"style","defaultValue":"short"}]}}"#),
        );
        write_function(&root, "FunSkill", "Limerick", "Limerick: {{$input}}", None);
        std::fs::create_dir_all(root.join("FunSkill").join("notes")).unwrap();

        let skill = import_skill_from_directory(&root, "FunSkill").unwrap();
        let names: Vec<&str> = skill.functions().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Joke", "Limerick"]);

        let joke = skill.function("joke").unwrap();
        assert_eq!(joke.description(), "joke");
        let mut vars = Variables::new();
        vars.insert("input".to_string(), "ducks".to_string());
        assert_eq!(joke.render_prompt(&vars), "Tell a short joke about ducks");
        assert!(skill.function("Missing").is_none());
    }

    #[test]
    fn missing_skill_dir_is_an_error() {
        let root = temp_skills_dir();
        let err = import_skill_from_directory(&root, "Nope").unwrap_err();
        assert!(err.to_string().contains("skill directory not found"));
    }

    #[test]
    fn invalid_skill_name_is_an_error() {
        let root = temp_skills_dir();
        assert!(import_skill_from_directory(&root, "../etc").is_err());
    }

    #[test]
    fn skill_without_functions_is_an_error() {
        let root = temp_skills_dir();
        std::fs::create_dir_all(root.join("Empty").join("NotAFunction")).unwrap();
        let err = import_skill_from_directory(&root, "Empty").unwrap_err();
        assert!(err.to_string().contains("has no functions"));
    }

    #[test]
    fn malformed_config_fails_import() {
        let root = temp_skills_dir();
        write_function(&root, "Bad", "Broken", "x", Some("{ not json"));
        let err = import_skill_from_directory(&root, "Bad").unwrap_err();
        assert!(format!("{:#}", err).contains("parsing"));
    }

    #[test]
    fn lists_skills_sorted() {
        let root = temp_skills_dir();
        write_function(&root, "WriterSkill", "Brainstorm", "b", None);
        write_function(&root, "FunSkill", "Joke", "j", None);
        write_function(&root, "FunSkill", "Excuses", "e", None);
        std::fs::create_dir_all(root.join("Empty")).unwrap();
        let list = list_skills(&root).unwrap();
        assert_eq!(
            list,
            vec![
                SkillSummary {
                    name: "FunSkill".to_string(),
                    functions: vec!["Excuses".to_string(), "Joke".to_string()],
                },
                SkillSummary {
                    name: "WriterSkill".to_string(),
                    functions: vec!["Brainstorm".to_string()],
                },
            ]
        );
    }

    #[test]
    fn list_of_missing_dir_is_empty() {
        let root = temp_skills_dir().join("absent");
        assert!(list_skills(&root).unwrap().is_empty());
    }

    #[test]
    fn bundled_fun_skill_loads() {
        let _lock = crate::paths::lock_app_root();
        let skills_dir = crate::paths::append_path("skills");
        let skill = import_skill_from_directory(&skills_dir, "FunSkill").unwrap();
        let joke = skill.function("Joke").expect("bundled Joke function");
        let mut vars = Variables::new();
        vars.insert("input".to_string(), "a corporate meeting".to_string());
        assert!(joke.render_prompt(&vars).contains("a corporate meeting"));
    }
}
