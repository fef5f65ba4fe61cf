//! Narrative responses for actions and chat turns.

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use std::time::Duration;

use crate::llm::{GenerateRequest, LlmManager};
use crate::types::{ActionResult, PetState};

/// Action identifier used for free-form chat turns
pub const TALK: &str = "talk";

#[derive(Debug, thiserror::Error)]
pub enum ResponderError {
    #[error("Response generation failed: {0}")]
    Generation(String),
}

#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Produce the pet's reaction to `action` (an action name or `"talk"`)
    async fn respond(
        &self,
        state: Option<&PetState>,
        action: &str,
        action_result: Option<&ActionResult>,
        user_message: Option<&str>,
    ) -> Result<String, ResponderError>;

    /// Whether an external model is backing the responses
    fn is_model_backed(&self) -> bool {
        false
    }
}

const PERSONA: &str = "You are a small virtual pet with a dark sense of humor. \
    You speak in the first person, in one or two short sentences, never more. \
    Your mood and wording reflect your stats: hunger close to 100 means starving, \
    happiness and energy close to 0 mean miserable and exhausted. \
    If you are dead, speak as a slightly bitter ghost.";

const NO_PET_LINE: &str = "There is no pet here yet. Just an empty, echoing egg.";

/// Responder backed by LLM providers, with canned lines when none answer
pub struct LlmResponder {
    llm: Option<LlmManager>,
    timeout: Duration,
    max_tokens: u32,
}

impl LlmResponder {
    pub fn new(llm: Option<LlmManager>, timeout: Duration, max_tokens: u32) -> Self {
        Self {
            llm,
            timeout,
            max_tokens,
        }
    }

    /// Responder that never calls out to a model
    pub fn offline() -> Self {
        Self::new(None, Duration::from_secs(10), 150)
    }
}

/// Describe the situation for the model
fn build_prompt(
    state: &PetState,
    action: &str,
    action_result: Option<&ActionResult>,
    user_message: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Your name is {}. Stats: hunger {}/100, happiness {}/100, energy {}/100. \
         You are {} and your mood is {}. You have died {} times.\n",
        state.name,
        state.hunger,
        state.happiness,
        state.energy,
        if state.is_alive { "alive" } else { "dead" },
        state.current_mood,
        state.deaths,
    );

    if let Some(result) = action_result {
        prompt.push_str(&format!(
            "Your owner just tried to {}. It {}: {}\n",
            action,
            if result.success { "worked" } else { "failed" },
            result.message
        ));
    } else if action != TALK {
        prompt.push_str(&format!("Your owner just did: {}\n", action));
    }

    match user_message.filter(|m| !m.trim().is_empty()) {
        Some(message) => prompt.push_str(&format!("Your owner says: \"{}\"\n", message.trim())),
        None if action == TALK => prompt.push_str("Your owner is looking at you silently.\n"),
        None => {}
    }

    prompt.push_str("React in character.");
    prompt
}

fn fallback_lines(action: &str, state: &PetState) -> &'static [&'static str] {
    if !state.is_alive && action != "revive" {
        return &[
            "I'm dead. Thanks for asking.",
            "Ghosts don't eat, play or nap. Try reviving me.",
        ];
    }

    match action {
        "feed" => &[
            "Finally, food. I was drafting my will.",
            "Nom. Don't expect gratitude.",
        ],
        "play" => &[
            "Fine, that was almost fun.",
            "Wheee. Now I'm tired and it's your fault.",
        ],
        "sleep" => &["Zzz... don't wake me unless there's food.", "Nap acquired."],
        "pet" => &[
            "Acceptable. You may continue.",
            "I suppose I'll allow this.",
        ],
        "revive" => &[
            "I'm back. The afterlife had better snacks.",
            "Death was boring anyway.",
        ],
        "create" => &[
            "Hello, world. Please feed me before you get attached.",
            "I'm new here. Try not to kill me this time.",
        ],
        TALK => &[
            "Mhm. Fascinating. Is that food?",
            "I hear you. I'm choosing not to listen.",
        ],
        _ => &["..."],
    }
}

fn fallback_response(state: &PetState, action: &str) -> String {
    fallback_lines(action, state)
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or("...")
        .to_string()
}

#[async_trait]
impl ResponseGenerator for LlmResponder {
    async fn respond(
        &self,
        state: Option<&PetState>,
        action: &str,
        action_result: Option<&ActionResult>,
        user_message: Option<&str>,
    ) -> Result<String, ResponderError> {
        let Some(state) = state else {
            return Ok(NO_PET_LINE.to_string());
        };

        if let Some(llm) = &self.llm {
            let request = GenerateRequest {
                system: PERSONA.to_string(),
                prompt: build_prompt(state, action, action_result, user_message),
                max_tokens: Some(self.max_tokens),
                timeout: self.timeout,
            };

            match llm.generate_first(request).await {
                Ok(response) => return Ok(response.text),
                Err(e) => tracing::warn!("No LLM answer for {}, using fallback: {}", action, e),
            }
        }

        Ok(fallback_response(state, action))
    }

    fn is_model_backed(&self) -> bool {
        self.llm.is_some()
    }
}
