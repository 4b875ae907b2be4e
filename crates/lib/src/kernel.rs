//! Kernel: registered chat services plus imported skills.
//! Invoking a function renders its template with the input bound to `$input`, sends it as one
//! user message to the default chat service, and returns the trimmed completion.

use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;

use crate::llm::{ChatBackend, ChatMessage, LlmError};
use crate::skills::{self, Skill, SkillFunction, Variables, INPUT_VAR};

#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("skill not imported: {0}")]
    UnknownSkill(String),
    #[error("skill {skill} has no function {function}")]
    UnknownFunction { skill: String, function: String },
    #[error("no chat service registered")]
    NoChatService,
    #[error(transparent)]
    Llm(#[from] LlmError),
}

struct ChatService {
    id: String,
    model: String,
    backend: Box<dyn ChatBackend>,
}

/// Chat services by id (first registered is the default) and skills by name.
#[derive(Default)]
pub struct Kernel {
    services: Vec<ChatService>,
    default_service: Option<usize>,
    /// Keyed by lowercased skill name.
    skills: HashMap<String, Skill>,
}

impl Kernel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a chat backend under `id` using `model`. Re-registering an id replaces it.
    /// The first service registered becomes the default.
    pub fn add_chat_service(
        &mut self,
        id: impl Into<String>,
        backend: impl ChatBackend + 'static,
        model: impl Into<String>,
    ) -> &mut Self {
        let service = ChatService {
            id: id.into(),
            model: model.into(),
            backend: Box::new(backend),
        };
        log::debug!("kernel: chat service {} (model {})", service.id, service.model);
        match self.services.iter().position(|s| s.id == service.id) {
            Some(i) => self.services[i] = service,
            None => {
                self.services.push(service);
                if self.default_service.is_none() {
                    self.default_service = Some(self.services.len() - 1);
                }
            }
        }
        self
    }

    /// Load `skills_dir/name` and register it, replacing any skill with the same name.
    pub fn import_skill_from_directory(&mut self, skills_dir: &Path, name: &str) -> Result<&Skill> {
        let skill = skills::import_skill_from_directory(skills_dir, name)?;
        Ok(self.register_skill(skill))
    }

    pub fn register_skill(&mut self, skill: Skill) -> &Skill {
        let key = skill.name.to_lowercase();
        self.skills.insert(key.clone(), skill);
        &self.skills[&key]
    }

    pub fn skill(&self, name: &str) -> Option<&Skill> {
        self.skills.get(&name.to_lowercase())
    }

    pub fn function(&self, skill: &str, function: &str) -> Result<&SkillFunction, KernelError> {
        self.skill(skill)
            .ok_or_else(|| KernelError::UnknownSkill(skill.to_string()))?
            .function(function)
            .ok_or_else(|| KernelError::UnknownFunction {
                skill: skill.to_string(),
                function: function.to_string(),
            })
    }

    /// Run `skill.function` with `input` bound to `$input`.
    pub async fn invoke(&self, skill: &str, function: &str, input: &str) -> Result<String, KernelError> {
        self.invoke_with(skill, function, input_vars(input), None).await
    }

    /// Like `invoke`, streaming content deltas to `on_chunk` as they arrive.
    pub async fn invoke_stream(
        &self,
        skill: &str,
        function: &str,
        input: &str,
        on_chunk: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String, KernelError> {
        self.invoke_with(skill, function, input_vars(input), Some(on_chunk))
            .await
    }

    /// Run `skill.function` with explicit template variables.
    pub async fn invoke_with(
        &self,
        skill: &str,
        function: &str,
        vars: Variables,
        on_chunk: Option<&mut (dyn FnMut(&str) + Send)>,
    ) -> Result<String, KernelError> {
        let func = self.function(skill, function)?;
        let service = self
            .default_service
            .map(|i| &self.services[i])
            .ok_or(KernelError::NoChatService)?;
        let prompt = func.render_prompt(&vars);
        log::info!(
            "kernel: invoking {}.{} on service {} (model {})",
            func.skill_name,
            func.name,
            service.id,
            service.model
        );
        let messages = vec![ChatMessage::user(prompt)];
        let settings = &func.config.completion;
        let res = match on_chunk {
            Some(cb) => {
                let mut delta_cb = |s: &str| cb(s);
                service
                    .backend
                    .chat_stream(&service.model, messages, settings, &mut delta_cb)
                    .await?
            }
            None => service.backend.chat(&service.model, messages, settings).await?,
        };
        if let Some(reason) = res.finish_reason.as_deref() {
            if reason != "stop" {
                log::warn!("kernel: completion finished with reason {}", reason);
            }
        }
        Ok(res.content().trim().to_string())
    }
}

fn input_vars(input: &str) -> Variables {
    let mut vars = Variables::new();
    vars.insert(INPUT_VAR.to_string(), input.to_string());
    vars
}
