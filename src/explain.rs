//! Explanation provider
//!
//! Feedback text comes from a hosted language model behind the
//! [`ExplanationProvider`] trait. Callers never see provider failures:
//! [`explain_answer`] and [`tutor_chat`] substitute a fixed message instead.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{Config, LlmProvider};
use crate::dto::GeneratedQuestionDto;
use crate::models::{Question, QuestionDraft};

mod gemini;
mod openai;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

/// Returned when an explanation cannot be generated
pub const EXPLANATION_FALLBACK: &str = "No se pudo generar la explicación en este momento.";

/// Returned when the tutor cannot answer
pub const CHAT_FALLBACK: &str = "Lo siento, hubo un error. ¿Puedes intentar de nuevo?";

const TUTOR_SYSTEM_PROMPT: &str = "Eres un tutor educativo amigable y motivador para estudiantes que preparan exámenes de estado en Colombia.
Tu rol es explicar conceptos de forma clara, usar un tono positivo y motivador, e incluir emojis de forma moderada.
Responde siempre en español colombiano.";

const CHAT_SYSTEM_PROMPT: &str = "Eres MeritBot, un tutor virtual amigable especializado en preparación para exámenes de estado colombianos (DIAN, CAR, Acueducto).

Tus características:
- Explicas conceptos de derecho administrativo, tributario y ambiental de forma simple
- Usas ejemplos prácticos de Colombia
- Eres motivador y paciente
- Respondes de forma concisa pero completa
- Usas emojis moderadamente para hacer la conversación amigable

Siempre responde en español colombiano.";

const QUESTION_SYSTEM_PROMPT: &str = "Eres un experto generador de preguntas para exámenes de estado en Colombia (DIAN, CAR, Acueducto, CNSC).
Tu tarea es crear una pregunta de opción múltiple realista, desafiante y educativa.
La salida DEBE ser un JSON válido con esta estructura:
{
    \"text\": \"Texto de la pregunta\",
    \"option_a\": \"Opción A\",
    \"option_b\": \"Opción B\",
    \"option_c\": \"Opción C\",
    \"option_d\": \"Opción D\",
    \"correct_answer\": \"A, B, C o D\",
    \"explanation\": \"Explicación detallada de por qué es la correcta\",
    \"topic\": \"Tema específico\",
    \"difficulty\": 1-3
}";

/// Entity used when a generated question is requested without one
pub const DEFAULT_QUESTION_ENTITY: &str = "General";

/// Failure talking to a text-generation backend
#[derive(Debug, Error)]
pub enum ExplainError {
    #[error("no explanation provider is configured")]
    Disabled,
    #[error("request timed out")]
    Timeout,
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider returned an empty response")]
    EmptyResponse,
    #[error("unusable generated question: {0}")]
    BadQuestion(String),
}

impl From<reqwest::Error> for ExplainError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExplainError::Timeout
        } else {
            ExplainError::Http(err)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// A provider-neutral chat prompt
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A text-generation backend
#[async_trait]
pub trait ExplanationProvider: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Generates a completion for the prompt
    async fn generate(&self, prompt: &Prompt) -> Result<String, ExplainError>;
}

/// Provider used when no backend is configured; always fails
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledProvider;

#[async_trait]
impl ExplanationProvider for DisabledProvider {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn generate(&self, _prompt: &Prompt) -> Result<String, ExplainError> {
        Err(ExplainError::Disabled)
    }
}

/// Everything the tutor needs to explain one answer
#[derive(Debug, Clone, PartialEq)]
pub struct ExplanationRequest {
    pub question_text: String,
    pub correct_answer: String,
    pub user_answer: String,
    pub topic: Option<String>,
    pub is_correct: bool,
}

/// Builds the tutoring prompt for one graded answer
pub fn explanation_prompt(request: &ExplanationRequest) -> Prompt {
    let (opening, first, third) = if request.is_correct {
        (
            "¡El estudiante respondió correctamente! 🎉",
            "Felicite al estudiante y refuerce por qué es correcta",
            "Sugiera cómo aplicar este conocimiento",
        )
    } else {
        (
            "El estudiante se equivocó, pero es una oportunidad de aprendizaje.",
            "Explique amablemente por qué la respuesta correcta es la mejor opción",
            "Ofrezca consejos para recordar este concepto",
        )
    };
    let topic = request
        .topic
        .as_deref()
        .map(|t| format!("Tema: {t}"))
        .unwrap_or_default();

    let user = format!(
        "{opening}\n\nPregunta: {}\nRespuesta correcta: Opción {}\nRespuesta del estudiante: Opción {}\n{topic}\n\n\
         Genera una explicación educativa breve (máximo 3 párrafos) que:\n\
         1. {first}\n\
         2. Proporcione contexto relevante sobre el tema\n\
         3. {third}",
        request.question_text, request.correct_answer, request.user_answer,
    );

    Prompt {
        messages: vec![
            Message::new(Role::System, TUTOR_SYSTEM_PROMPT),
            Message::new(Role::User, user),
        ],
        max_tokens: 500,
        temperature: 0.7,
    }
}

/// Builds the MeritBot conversation prompt
pub fn tutor_prompt(message: &str, context: Option<&str>) -> Prompt {
    let mut messages = vec![Message::new(Role::System, CHAT_SYSTEM_PROMPT)];
    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        messages.push(Message::new(Role::User, format!("Contexto actual: {context}")));
        messages.push(Message::new(Role::Assistant, "Entendido, tengo ese contexto en cuenta."));
    }
    messages.push(Message::new(Role::User, message));

    Prompt {
        messages,
        max_tokens: 600,
        temperature: 0.8,
    }
}

/// Builds the prompt asking for one new exam question
pub fn question_prompt(entity: &str, topic: Option<&str>, profile: Option<&str>) -> Prompt {
    let profile = profile
        .filter(|p| !p.trim().is_empty())
        .map(|p| format!("Perfil/Cargo: {p}"))
        .unwrap_or_default();
    let topic = match topic.filter(|t| !t.trim().is_empty()) {
        Some(t) => format!("Tema específico: {t}"),
        None => "Tema: Cualquier tema relevante para un examen de esta entidad (Derecho, Administración, Técnica, etc).".to_string(),
    };

    let user = format!(
        "Genera una pregunta tipo examen para la entidad: {entity}.\n{profile}\n{topic}\n\n\
         Asegúrate de que la pregunta sea técnica y específica del contexto colombiano.\n\
         NO inventes leyes inexistentes. Usa normativa real."
    );

    Prompt {
        messages: vec![
            Message::new(Role::System, QUESTION_SYSTEM_PROMPT),
            Message::new(Role::User, user),
        ],
        max_tokens: 600,
        temperature: 0.8,
    }
}

/// Parses a model reply into a question that passes [`Question::new`]
///
/// The JSON object may be wrapped in prose or a code fence. The correct
/// answer comes back normalized to an upper-case letter.
pub fn parse_generated_question(reply: &str) -> Result<GeneratedQuestionDto, ExplainError> {
    let (Some(start), Some(end)) = (reply.find('{'), reply.rfind('}')) else {
        return Err(ExplainError::BadQuestion("no JSON object in reply".to_string()));
    };
    if end < start {
        return Err(ExplainError::BadQuestion("no JSON object in reply".to_string()));
    }

    let mut generated: GeneratedQuestionDto = serde_json::from_str(&reply[start..=end])
        .map_err(|e| ExplainError::BadQuestion(e.to_string()))?;
    generated.error = None;

    let question = Question::new(QuestionDraft {
        entity_id: None,
        profile_id: None,
        topic_id: None,
        material_id: None,
        text: generated.text.clone(),
        option_a: generated.option_a.clone(),
        option_b: generated.option_b.clone(),
        option_c: generated.option_c.clone(),
        option_d: generated.option_d.clone(),
        correct_answer: generated.correct_answer.clone(),
        explanation: generated.explanation.clone(),
        page_reference: None,
        difficulty: generated.difficulty,
        xp_reward: generated.difficulty * 10,
    })
    .map_err(|e| ExplainError::BadQuestion(e.to_string()))?;

    generated.correct_answer = question.get_correct_answer();
    Ok(generated)
}

/// The fixed question returned when generation fails
pub fn fallback_question(error: &str) -> GeneratedQuestionDto {
    GeneratedQuestionDto {
        error: Some(error.to_string()),
        text: "Error al generar pregunta con IA. Intenta de nuevo.".to_string(),
        option_a: "Error".to_string(),
        option_b: "Error".to_string(),
        option_c: "Error".to_string(),
        option_d: "Error".to_string(),
        correct_answer: "A".to_string(),
        explanation: Some("Hubo un problema de conexión con la IA.".to_string()),
        topic: None,
        difficulty: 1,
    }
}

/// Asks the provider for a new question, falling back to [`fallback_question`]
pub async fn generate_question(
    provider: &dyn ExplanationProvider,
    entity: &str,
    topic: Option<&str>,
    profile: Option<&str>,
) -> GeneratedQuestionDto {
    let reply = match provider.generate(&question_prompt(entity, topic, profile)).await {
        Ok(reply) => reply,
        Err(ExplainError::Disabled) => {
            debug!("question generation requested but no provider is configured");
            return fallback_question("AI provider not configured");
        }
        Err(e) => {
            warn!(provider = provider.name(), error = %e, "question generation failed, using fallback");
            return fallback_question("Failed to generate question");
        }
    };

    parse_generated_question(&reply).unwrap_or_else(|e| {
        warn!(provider = provider.name(), error = %e, "generated question rejected, using fallback");
        fallback_question("Failed to generate question")
    })
}

/// Explains a graded answer, falling back to a fixed message on any failure
pub async fn explain_answer(provider: &dyn ExplanationProvider, request: &ExplanationRequest) -> String {
    match provider.generate(&explanation_prompt(request)).await {
        Ok(text) => text,
        Err(ExplainError::Disabled) => {
            debug!("explanation requested but no provider is configured");
            EXPLANATION_FALLBACK.to_string()
        }
        Err(e) => {
            warn!(provider = provider.name(), error = %e, "explanation provider failed, using fallback");
            EXPLANATION_FALLBACK.to_string()
        }
    }
}

/// Answers a tutor chat message, falling back to a fixed message on any failure
pub async fn tutor_chat(provider: &dyn ExplanationProvider, message: &str, context: Option<&str>) -> String {
    match provider.generate(&tutor_prompt(message, context)).await {
        Ok(text) => text,
        Err(e) => {
            warn!(provider = provider.name(), error = %e, "tutor chat failed, using fallback");
            CHAT_FALLBACK.to_string()
        }
    }
}

/// Builds the provider selected by the configuration
///
/// A selected provider without an API key degrades to [`DisabledProvider`].
pub fn provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn ExplanationProvider>> {
    let client = || {
        reqwest::Client::builder()
            .timeout(config.llm_timeout())
            .build()
    };

    let provider: Arc<dyn ExplanationProvider> = match config.llm_provider {
        LlmProvider::None => Arc::new(DisabledProvider),
        LlmProvider::Openai => match &config.openai_api_key {
            Some(key) => Arc::new(OpenAiProvider::new(client()?, key.clone(), config.openai_model.clone())),
            None => {
                warn!("llm_provider is openai but OPENAI_API_KEY is not set; explanations disabled");
                Arc::new(DisabledProvider)
            }
        },
        LlmProvider::Gemini => match &config.gemini_api_key {
            Some(key) => Arc::new(GeminiProvider::new(client()?, key.clone(), config.gemini_model.clone())),
            None => {
                warn!("llm_provider is gemini but GEMINI_API_KEY is not set; explanations disabled");
                Arc::new(DisabledProvider)
            }
        },
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{base_config, ConfigUpdate};
    use crate::test_utils::ScriptedProvider;

    fn request(is_correct: bool) -> ExplanationRequest {
        ExplanationRequest {
            question_text: "¿Qué es el IVA?".to_string(),
            correct_answer: "A".to_string(),
            user_answer: "C".to_string(),
            topic: Some("Derecho Tributario".to_string()),
            is_correct,
        }
    }

    #[test]
    fn test_explanation_prompt_mentions_answers_and_topic() {
        let prompt = explanation_prompt(&request(false));

        assert_eq!(prompt.messages.len(), 2);
        assert_eq!(prompt.messages[0].role, Role::System);
        let user = &prompt.messages[1].content;
        assert!(user.contains("Respuesta correcta: Opción A"));
        assert!(user.contains("Respuesta del estudiante: Opción C"));
        assert!(user.contains("Tema: Derecho Tributario"));
        assert!(user.contains("se equivocó"));
        assert_eq!(prompt.max_tokens, 500);
    }

    #[test]
    fn test_tutor_prompt_includes_context_exchange() {
        let prompt = tutor_prompt("¿Qué es el RUT?", Some("Estudiando DIAN"));
        let roles: Vec<Role> = prompt.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);

        let prompt = tutor_prompt("Hola", None);
        assert_eq!(prompt.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_explain_answer_passes_through_success() {
        let provider = ScriptedProvider::replying("Muy bien.");
        assert_eq!(explain_answer(&provider, &request(true)).await, "Muy bien.");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_explain_answer_falls_back_on_failure() {
        assert_eq!(explain_answer(&ScriptedProvider::failing(), &request(true)).await, EXPLANATION_FALLBACK);
        assert_eq!(explain_answer(&DisabledProvider, &request(true)).await, EXPLANATION_FALLBACK);
    }

    #[tokio::test]
    async fn test_tutor_chat_falls_back_on_failure() {
        assert_eq!(tutor_chat(&DisabledProvider, "Hola", None).await, CHAT_FALLBACK);
    }

    #[test]
    fn test_question_prompt_scopes_entity_topic_and_profile() {
        let prompt = question_prompt("DIAN", Some("Aduanas"), Some("Gestor I"));
        assert_eq!(prompt.messages[0].role, Role::System);
        let user = &prompt.messages[1].content;
        assert!(user.contains("para la entidad: DIAN."));
        assert!(user.contains("Perfil/Cargo: Gestor I"));
        assert!(user.contains("Tema específico: Aduanas"));

        let open = question_prompt(DEFAULT_QUESTION_ENTITY, None, None);
        assert!(!open.messages[1].content.contains("Perfil/Cargo"));
        assert!(open.messages[1].content.contains("Cualquier tema relevante"));
    }

    #[test]
    fn test_parse_generated_question_accepts_fenced_json() {
        let reply = "```json\n{\"text\": \"¿Qué grava el IVA?\", \"option_a\": \"Rentas\", \"option_b\": \"Bienes y servicios\",\
            \"option_c\": \"Patrimonio\", \"option_d\": \"Herencias\", \"correct_answer\": \"b\",\
            \"explanation\": \"El IVA grava el consumo.\", \"topic\": \"Tributario\", \"difficulty\": 2}\n```";

        let question = parse_generated_question(reply).unwrap();
        assert_eq!(question.correct_answer, "B");
        assert_eq!(question.difficulty, 2);
        assert_eq!(question.topic.as_deref(), Some("Tributario"));
        assert!(question.error.is_none());
    }

    #[test]
    fn test_parse_generated_question_rejects_invalid_questions() {
        assert!(matches!(parse_generated_question("Lo siento, no puedo."), Err(ExplainError::BadQuestion(_))));

        let bad_answer = r#"{"text": "t", "option_a": "a", "option_b": "b", "option_c": "c", "option_d": "d", "correct_answer": "E"}"#;
        assert!(matches!(parse_generated_question(bad_answer), Err(ExplainError::BadQuestion(_))));

        let blank_option = r#"{"text": "t", "option_a": "a", "option_b": " ", "option_c": "c", "option_d": "d", "correct_answer": "A"}"#;
        assert!(matches!(parse_generated_question(blank_option), Err(ExplainError::BadQuestion(_))));
    }

    #[tokio::test]
    async fn test_generate_question_falls_back() {
        let failing = ScriptedProvider::failing();
        let question = generate_question(&failing, "DIAN", None, None).await;
        assert_eq!(question, fallback_question("Failed to generate question"));
        assert_eq!(failing.calls(), 1);

        let garbled = ScriptedProvider::replying("{\"text\": \"sin opciones\"}");
        let question = generate_question(&garbled, "DIAN", None, None).await;
        assert_eq!(question.error.as_deref(), Some("Failed to generate question"));
        assert_eq!(question.correct_answer, "A");

        let question = generate_question(&DisabledProvider, "DIAN", None, None).await;
        assert_eq!(question.error.as_deref(), Some("AI provider not configured"));
    }

    #[test]
    fn test_missing_key_disables_provider() {
        let config = base_config(None).apply_update(ConfigUpdate {
            llm_provider: Some(LlmProvider::Openai),
            ..Default::default()
        });
        assert_eq!(provider_from_config(&config).unwrap().name(), "disabled");

        let config = base_config(None).apply_update(ConfigUpdate {
            llm_provider: Some(LlmProvider::Gemini),
            gemini_api_key: Some("key".to_string()),
            ..Default::default()
        });
        assert_eq!(provider_from_config(&config).unwrap().name(), "gemini");
    }
}
