use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use wayfarer_core::domain::decision::join_place;
use wayfarer_core::{EvidenceError, LegalResult};

use crate::llm::{GenerationSettings, LlmClient};
use crate::ports::{LegalProvider, LegalQuery, RetrievalFilter, Retriever};
use crate::structured::{call_structured, OutputSchema, PromptTemplate, PromptVars, StructuredRequest};

const LEGAL_SETTINGS: GenerationSettings = GenerationSettings::new(0.0, 1400);
const RETRIEVAL_K: usize = 10;
const SECOND_PASS_RETRIES: u32 = 1;
const UNSPECIFIED: &str = "не указано";

pub const EMPTY_BASE_NOTE: &str =
    "В локальной базе нет документов по этой стране. Добавьте материалы в каталог правовой базы.";
const SECOND_PASS_QUESTION: &str =
    "Собери из контекста максимально подробные пункты по визе/въезду/штрафам.";

const LEGAL_SYSTEM: &str = "Ты юридический помощник для путешественников.\n\
Отвечай только на основе КОНТЕКСТА ниже и не добавляй фактов, которых в нём нет.\n\
- visa_required: true, false или null, если в контексте нет ответа\n\
- visa: требования к визе, тип, сроки, документы\n\
- entry_and_registration: правила въезда, сроки пребывания, регистрация\n\
- prohibitions_and_fines: запреты, ограничения, штрафы, риски\n\
- recommendations: практические советы, что взять, куда обратиться\n\
- sources: имена файлов из контекста\n\
- missing_info: заполняй, если в базе нет нужного (тогда visa_required = null)\n\
Если в контексте есть информация, не оставляй соответствующие списки пустыми. \
Переноси формулировки близко к оригиналу. Верни только JSON-объект LegalResult, не JSON Schema.\n\
{format_instructions}";

const LEGAL_HUMAN: &str = "Страна/город: {country}, {city}\n\
Вопрос: {question}\n\n\
КОНТЕКСТ:\n{context}\n\n\
Верни только JSON LegalResult.";

const LEGAL_REPAIR: &str = "Ты исправляешь формат. Верни только JSON-объект LegalResult с данными. \
Строго опирайся на контекст. Не возвращай JSON Schema.";

const SECOND_PASS_REPAIR: &str = "Верни только JSON LegalResult. Заполни списки пунктами из контекста. \
Не добавляй факты вне контекста.";

impl OutputSchema for LegalResult {
    const NAME: &'static str = "LegalResult";

    fn field_guide() -> &'static str {
        "- visa_required: true | false | null\n\
         - visa: список строк\n\
         - entry_and_registration: список строк\n\
         - prohibitions_and_fines: список строк\n\
         - recommendations: список строк\n\
         - sources: список имён файлов\n\
         - missing_info: строка или null"
    }
}

/// Legal evidence grounded in retrieved documents only.
pub struct LegalAgent {
    llm: Arc<dyn LlmClient>,
    retriever: Arc<dyn Retriever>,
    max_retries: u32,
}

impl LegalAgent {
    pub fn new(llm: Arc<dyn LlmClient>, retriever: Arc<dyn Retriever>, max_retries: u32) -> Self {
        Self { llm, retriever, max_retries }
    }

    async fn extract(
        &self,
        vars: PromptVars,
        human_hint: String,
        repair_system: &str,
        max_retries: u32,
    ) -> LegalResult {
        let template = PromptTemplate::new(LEGAL_SYSTEM, LEGAL_HUMAN);
        let request = StructuredRequest {
            template: &template,
            vars,
            repair_system,
            human_hint: Some(human_hint),
            max_retries,
            settings: LEGAL_SETTINGS,
        };
        call_structured(self.llm.as_ref(), &request).await
    }
}

#[async_trait]
impl LegalProvider for LegalAgent {
    async fn legal(&self, query: &LegalQuery) -> Result<LegalResult, EvidenceError> {
        let place = join_place(query.city.as_deref(), query.country.as_deref()).unwrap_or_default();
        let search = format!("{place} визы законы правила въезда штрафы {}", query.question);
        let filter = RetrievalFilter { country: query.country.clone() };
        let chunks = self.retriever.retrieve(search.trim(), RETRIEVAL_K, &filter).await?;

        if chunks.is_empty() {
            warn!(event_name = "legal.no_context", country = ?query.country, "no legal documents");
            return Ok(LegalResult {
                missing_info: Some(EMPTY_BASE_NOTE.to_owned()),
                ..LegalResult::default()
            });
        }

        let context = chunks
            .iter()
            .map(|chunk| format!("[{}]\n{}", chunk.source, chunk.text))
            .collect::<Vec<_>>()
            .join("\n\n");
        let sources: Vec<String> = chunks
            .iter()
            .map(|chunk| chunk.source.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut vars = PromptVars::new();
        vars.insert("country", query.country.clone().unwrap_or_else(|| UNSPECIFIED.to_owned()));
        vars.insert("city", query.city.clone().unwrap_or_else(|| UNSPECIFIED.to_owned()));
        vars.insert("question", query.question.clone());
        vars.insert("context", context);
        let hint = format!(
            "Источники: {}. Верни только JSON LegalResult. Не оставляй поля пустыми, если в контексте есть информация.",
            sources.join(", ")
        );

        let mut result =
            self.extract(vars.clone(), hint.clone(), LEGAL_REPAIR, self.max_retries).await;

        if result.visa_required.is_some() && !result.has_details() && result.missing_info.is_none()
        {
            info!(event_name = "legal.second_pass", "verdict without details; asking again");
            vars.insert("question", SECOND_PASS_QUESTION.to_owned());
            result = self.extract(vars, hint, SECOND_PASS_REPAIR, SECOND_PASS_RETRIES).await;
        }

        if result.sources.is_empty() {
            result.sources = sources;
        }

        info!(
            event_name = "legal.generated",
            chunks = chunks.len(),
            visa_required = ?result.visa_required,
            has_details = result.has_details(),
            "legal evidence generated"
        );
        Ok(result)
    }
}
