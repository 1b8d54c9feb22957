use std::sync::Arc;

use anyhow::Result;

use crate::llm::{ChatMessage, CompletionRequest, GenerationSettings, LlmClient};

const SUMMARY_SETTINGS: GenerationSettings = GenerationSettings::new(0.0, 220);

const SUMMARY_SYSTEM: &str = "Ты модуль памяти туристического бота. \
Обнови короткое резюме контекста поездки в 1-3 предложениях. \
Сохраняй факты: направление, даты, интересы, бюджет, стиль, ограничения. \
Если новых данных нет, верни старое резюме без изменений.";

/// Compacts recent turns into the rolling session summary.
pub struct Summarizer {
    llm: Arc<dyn LlmClient>,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn refresh(&self, old_summary: &str, recent: &str) -> Result<String> {
        let human = format!("СТАРОЕ РЕЗЮМЕ:\n{old_summary}\n\nПОСЛЕДНИЕ СООБЩЕНИЯ:\n{recent}\n\nНовое резюме:");
        let request = CompletionRequest::new(
            vec![ChatMessage::system(SUMMARY_SYSTEM), ChatMessage::user(human)],
            SUMMARY_SETTINGS,
        );
        let reply = self.llm.complete(&request).await?;
        Ok(reply.trim().to_owned())
    }
}
