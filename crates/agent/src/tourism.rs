use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use wayfarer_core::domain::decision::join_place;
use wayfarer_core::{EvidenceError, TourismResult};

use crate::llm::{GenerationSettings, LlmClient};
use crate::ports::{TourismProvider, TourismQuery};
use crate::structured::{call_structured, OutputSchema, PromptTemplate, PromptVars, StructuredRequest};

const TOURISM_SETTINGS: GenerationSettings = GenerationSettings::new(0.7, 1800);
const UNSPECIFIED: &str = "не указано";
pub const FALLBACK_TITLE: &str = "Путешествие";

const TOURISM_SYSTEM: &str = "Ты туристический гид. Сформируй структурированный результат для чат-бота.\n\
Верни только JSON-объект TourismResult с данными, без текста вокруг; не возвращай JSON Schema.\n\
- destination_title: \"Город, Страна\".\n\
- overview: 3-6 предложений о городе, атмосфере и чем он знаменит.\n\
- history: 3-6 коротких и понятных предложений.\n\
- highlights: 7-10 мест, у каждого query в формате \"Название, Город, Страна\".\n\
- food_spots: 4-6 вариантов (рынки, улицы, районы, типы заведений) без точных адресов, у каждого query.\n\
- plan_1_day: 5-7 пунктов (утро, день, вечер) с местами из highlights в формате \"Утро: Название\".\n\
- Пиши по делу. Не выдумывай точные цены и расписания.\n\
{format_instructions}";

const TOURISM_HUMAN: &str = "Направление: {country}, {city}. Даты: {dates}\n\
Память и предпочтения (может быть пусто): {summary}\n\
Запрос: {question}\n\
Верни только JSON TourismResult.";

const TOURISM_REPAIR: &str = "Ты исправляешь формат вывода. Верни только JSON-объект TourismResult с данными. \
Не возвращай JSON Schema и не используй $defs, properties, required.";

impl OutputSchema for TourismResult {
    const NAME: &'static str = "TourismResult";

    fn field_guide() -> &'static str {
        "- destination_title: строка\n\
         - overview: строка\n\
         - history: строка\n\
         - highlights: список объектов {name, why, time_needed, query}\n\
         - etiquette: список строк\n\
         - food_spots: список объектов {name, why, query}\n\
         - areas: список строк\n\
         - plan_1_day: список строк\n\
         - tips: список строк\n\
         - questions_to_clarify: список строк"
    }
}

/// Tourism evidence from the text-generation backend.
pub struct TouristAgent {
    llm: Arc<dyn LlmClient>,
    max_retries: u32,
}

impl TouristAgent {
    pub fn new(llm: Arc<dyn LlmClient>, max_retries: u32) -> Self {
        Self { llm, max_retries }
    }
}

#[async_trait]
impl TourismProvider for TouristAgent {
    async fn tourism(&self, query: &TourismQuery) -> Result<TourismResult, EvidenceError> {
        let template = PromptTemplate::new(TOURISM_SYSTEM, TOURISM_HUMAN);
        let mut vars = PromptVars::new();
        vars.insert("country", query.country.clone().unwrap_or_else(|| UNSPECIFIED.to_owned()));
        vars.insert("city", query.city.clone().unwrap_or_else(|| UNSPECIFIED.to_owned()));
        vars.insert("dates", query.dates.clone().unwrap_or_else(|| UNSPECIFIED.to_owned()));
        vars.insert("question", query.question.clone());
        vars.insert("summary", query.summary.clone());

        let request = StructuredRequest {
            template: &template,
            vars,
            repair_system: TOURISM_REPAIR,
            human_hint: Some(format!(
                "Направление: {}, {}. Даты: {}. Запрос: {}. Верни только JSON TourismResult.",
                query.country.as_deref().unwrap_or(UNSPECIFIED),
                query.city.as_deref().unwrap_or(UNSPECIFIED),
                query.dates.as_deref().unwrap_or(UNSPECIFIED),
                query.question
            )),
            max_retries: self.max_retries,
            settings: TOURISM_SETTINGS,
        };

        let mut result: TourismResult = call_structured(self.llm.as_ref(), &request).await;
        if result.destination_title.trim().is_empty() {
            result.destination_title = join_place(query.city.as_deref(), query.country.as_deref())
                .unwrap_or_else(|| FALLBACK_TITLE.to_owned());
        }

        info!(
            event_name = "tourism.generated",
            highlights = result.highlights.len(),
            food_spots = result.food_spots.len(),
            plan_items = result.plan_1_day.len(),
            "tourism evidence generated"
        );
        Ok(result)
    }
}
