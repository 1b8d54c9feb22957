//! Evidence bundle to chat messages: one HTML body split at the transport
//! limit, capability buttons under the last part, then one card per photo.

use wayfarer_agent::TurnOutcome;
use wayfarer_core::{
    Capability, EvidenceBundle, LegalResult, MediaCard, RouteResult, TourismResult, TurnArtifacts,
    WeatherResult,
};

use crate::blocks::{escape_html, ButtonElement, MessageBuilder, MessageTemplate, TextObject};
use crate::events::CAPABILITY_ACTION_ID;

pub const MESSAGE_LIMIT: usize = 3800;
pub const EMPTY_ANSWER_TEXT: &str = "Извините, я не могу ответить на ваш запрос.";
const NO_DATA: &str = "• (нет данных)";
const MAX_HIGHLIGHTS: usize = 10;
const MAX_FOOD: usize = 8;
const MAX_QUESTIONS: usize = 4;
const MAX_STEPS: usize = 12;
const MAX_POINTS: usize = 10;

pub fn capability_label(capability: Capability) -> &'static str {
    match capability {
        Capability::Tourism => "🏛️ Что посмотреть",
        Capability::Legal => "⚖️ Визы и законы",
        Capability::Weather => "🌦️ Погода",
        Capability::Route => "🗺️ Маршрут",
    }
}

pub fn render_turn(outcome: &TurnOutcome, artifacts: &TurnArtifacts) -> Vec<MessageTemplate> {
    match outcome {
        TurnOutcome::Question(question) => vec![MessageBuilder::new(question.clone())
            .section("answer.question.v1", |section| {
                section.plain(question.clone());
            })
            .build()],
        TurnOutcome::Bundle(bundle) => render_bundle(bundle, artifacts),
    }
}

fn render_bundle(bundle: &EvidenceBundle, artifacts: &TurnArtifacts) -> Vec<MessageTemplate> {
    let body = if bundle.is_empty() { escape_html(EMPTY_ANSWER_TEXT) } else { bundle_html(bundle) };
    let parts = split_message(&body, MESSAGE_LIMIT);
    let last = parts.len().saturating_sub(1);

    let mut messages: Vec<MessageTemplate> = parts
        .into_iter()
        .enumerate()
        .map(|(index, part)| {
            let builder = MessageBuilder::new(bundle.destination_title.clone())
                .section(format!("answer.body.{index}.v1"), |section| {
                    section.html(part);
                });
            if index == last {
                with_buttons(builder, bundle, artifacts).build()
            } else {
                builder.build()
            }
        })
        .collect();

    messages.extend(artifacts.media_queue.iter().map(media_card));
    messages
}

fn with_buttons(
    builder: MessageBuilder,
    bundle: &EvidenceBundle,
    artifacts: &TurnArtifacts,
) -> MessageBuilder {
    let builder = Capability::ALL.chunks(2).enumerate().fold(builder, |builder, (row, pair)| {
        builder.actions(format!("answer.capabilities.{row}.v1"), |actions| {
            for capability in pair {
                actions.button(
                    ButtonElement::new(CAPABILITY_ACTION_ID, capability_label(*capability))
                        .value(capability.as_str()),
                );
            }
        })
    });

    let route_url = bundle
        .route
        .as_ref()
        .and_then(|route| route.maps_url.clone())
        .or_else(|| artifacts.last_route_url.clone());
    builder.actions("answer.links.v1", |actions| {
        if let Some(url) = route_url {
            actions.button(ButtonElement::link("🧭 Открыть маршрут на карте", url));
        }
    })
}

fn media_card(card: &MediaCard) -> MessageTemplate {
    MessageBuilder::new(card.caption.clone())
        .image("media.card.v1", card.image_url.clone(), TextObject::plain(card.caption.clone()))
        .actions("media.card.links.v1", |actions| {
            if let (Some(label), Some(url)) = (&card.link_label, &card.link_url) {
                actions.button(ButtonElement::link(label.clone(), url.clone()));
            }
        })
        .build()
}

pub fn bundle_html(bundle: &EvidenceBundle) -> String {
    let mut parts: Vec<String> = vec![title(&bundle.destination_title), "────────".to_owned()];

    if let Some(tourism) = &bundle.tourism {
        parts.push("<b>🧭 Коротко о месте</b>".to_owned());
        parts.push(overview(tourism));
        parts.push("<b>🏛️ Что посмотреть</b>".to_owned());
        parts.push(highlights(tourism));
        parts.push("<b>🍜 Где поесть</b>".to_owned());
        parts.push(food(tourism));
        if !tourism.plan_1_day.is_empty() {
            parts.push("<b>🗓️ План на день</b>".to_owned());
            parts.push(bullets(&tourism.plan_1_day));
        }
        parts.push(tourism_extras(tourism));
    }
    if let Some(weather) = &bundle.weather {
        parts.push("<b>🌦️ Погода</b>".to_owned());
        parts.push(weather_html(weather));
    }
    if let Some(route) = &bundle.route {
        parts.push("<b>🗺️ Маршрут</b>".to_owned());
        parts.push(route_html(route));
    }
    if let Some(legal) = &bundle.legal {
        parts.push("<b>⚖️ Визы и законы</b>".to_owned());
        parts.push(legal_html(legal));
    }
    if let Some(advisory) = &bundle.advisory {
        parts.push(escape_html(advisory));
    }

    parts.retain(|part| !part.trim().is_empty());
    parts.join("\n").trim().to_owned()
}

fn title(text: &str) -> String {
    format!("<b>{}</b>", escape_html(text))
}

fn bullets<S: AsRef<str>>(items: &[S]) -> String {
    let mut lines = Vec::new();
    for item in items {
        let item = AsRef::<str>::as_ref(item);
        if !item.trim().is_empty() {
            lines.push(format!("• {}", escape_html(item)));
        }
    }
    lines.join("\n")
}

fn or_no_data(lines: Vec<String>) -> String {
    if lines.is_empty() {
        NO_DATA.to_owned()
    } else {
        lines.join("\n")
    }
}

fn overview(tourism: &TourismResult) -> String {
    let mut lines = Vec::new();
    if !tourism.overview.trim().is_empty() {
        lines.push(escape_html(&tourism.overview));
    }
    if !tourism.history.trim().is_empty() {
        lines.push("\n<b>Коротко об истории</b>".to_owned());
        lines.push(escape_html(&tourism.history));
    }
    or_no_data(lines)
}

fn highlights(tourism: &TourismResult) -> String {
    let lines = tourism
        .highlights
        .iter()
        .take(MAX_HIGHLIGHTS)
        .filter(|place| !place.name.trim().is_empty())
        .map(|place| {
            let mut line = format!("• <b>{}</b>", escape_html(&place.name));
            if !place.why.trim().is_empty() {
                line.push_str(&format!(" — {}", escape_html(&place.why)));
            }
            if let Some(time) = place.time_needed.as_deref().filter(|t| !t.trim().is_empty()) {
                line.push_str(&format!(" <i>({})</i>", escape_html(time)));
            }
            line
        })
        .collect();
    or_no_data(lines)
}

fn food(tourism: &TourismResult) -> String {
    let lines = tourism
        .food_spots
        .iter()
        .take(MAX_FOOD)
        .filter(|spot| !spot.name.trim().is_empty())
        .map(|spot| {
            if spot.why.trim().is_empty() {
                format!("• <b>{}</b>", escape_html(&spot.name))
            } else {
                format!("• <b>{}</b> — {}", escape_html(&spot.name), escape_html(&spot.why))
            }
        })
        .collect();
    or_no_data(lines)
}

fn tourism_extras(tourism: &TourismResult) -> String {
    let questions: Vec<&String> = tourism.questions_to_clarify.iter().take(MAX_QUESTIONS).collect();
    [
        ("<b>📍 Районы</b>", bullets(&tourism.areas)),
        ("<b>🤝 Этикет</b>", bullets(&tourism.etiquette)),
        ("<b>💡 Советы</b>", bullets(&tourism.tips)),
        ("<b>❓ Что уточнить</b>", bullets(&questions)),
    ]
    .into_iter()
    .filter(|(_, body)| !body.is_empty())
    .map(|(heading, body)| format!("{heading}\n{body}"))
    .collect::<Vec<_>>()
    .join("\n\n")
}

fn weather_html(weather: &WeatherResult) -> String {
    let mut lines = Vec::new();
    if !weather.place.trim().is_empty() {
        lines.push(title(&weather.place));
    }
    lines.push(escape_html(&weather.summary));

    let mut details = Vec::new();
    if let Some(temp) = weather.now_temp_c {
        details.push(format!("Температура: {temp:.1}°C"));
    }
    if let Some(feels) = weather.feels_like_c {
        details.push(format!("Ощущается как: {feels:.1}°C"));
    }
    if let Some(wind) = weather.wind_ms {
        details.push(format!("Ветер: {wind:.1} м/с"));
    }
    if !details.is_empty() {
        lines.push(escape_html(&details.join(" | ")));
    }
    lines.push(bullets(&weather.advice));

    lines.retain(|line| !line.trim().is_empty());
    lines.join("\n")
}

fn route_html(route: &RouteResult) -> String {
    let mut lines = Vec::new();
    if route.points.is_empty() {
        lines.push(format!("{} → {}", title(&route.start), title(&route.end)));
    } else {
        lines.push("<b>Маршрут по точкам</b>".to_owned());
        let points: Vec<&String> = route.points.iter().take(MAX_POINTS).collect();
        lines.push(bullets(&points));
    }

    let mut figures = Vec::new();
    if let Some(km) = route.distance_km {
        figures.push(format!("{km:.1} км"));
    }
    if let Some(minutes) = route.duration_min {
        figures.push(format!("{minutes:.0} мин"));
    }
    if !figures.is_empty() {
        lines.push(figures.join(" · "));
    }

    if !route.steps.is_empty() {
        lines.push("\n<b>Шаги</b>".to_owned());
        let steps: Vec<&str> =
            route.steps.iter().take(MAX_STEPS).map(|step| step.instruction.as_str()).collect();
        lines.push(bullets(&steps));
    }
    if let Some(url) = &route.maps_url {
        lines.push(format!("\n<b>Google Maps:</b> {}", escape_html(url)));
    }
    if !route.notes.is_empty() {
        lines.push("\n<b>Заметки</b>".to_owned());
        lines.push(bullets(&route.notes));
    }
    lines.retain(|line| !line.trim().is_empty());
    lines.join("\n")
}

fn legal_html(legal: &LegalResult) -> String {
    let mut lines = Vec::new();
    if let Some(missing) = legal.missing_info.as_deref().filter(|m| !m.trim().is_empty()) {
        lines.push(format!("⚠️ {}", escape_html(missing)));
    }
    lines.push(
        match legal.visa_required {
            Some(true) => "Виза: <b>требуется</b>",
            Some(false) => "Виза: <b>не требуется</b>",
            None => "Виза: <b>нет точных данных в базе</b>",
        }
        .to_owned(),
    );
    for (heading, items) in [
        ("Визы", &legal.visa),
        ("Въезд / регистрация", &legal.entry_and_registration),
        ("Запреты / штрафы", &legal.prohibitions_and_fines),
        ("Рекомендации", &legal.recommendations),
        ("Источники (локальная база)", &legal.sources),
    ] {
        if !items.is_empty() {
            lines.push(format!("\n<b>{heading}</b>\n{}", bullets(items)));
        }
    }
    lines.join("\n")
}

/// Splits on line boundaries so each part stays within `limit` chars. A
/// single line longer than the limit is cut hard.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let text = text.trim();
    let limit = limit.max(1);
    if text.chars().count() <= limit {
        return vec![text.to_owned()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for line in text.split('\n') {
        for piece in hard_wrap(line, limit) {
            let piece_len = piece.chars().count();
            let joined_len = if current.is_empty() { piece_len } else { current_len + 1 + piece_len };
            if joined_len > limit && !current.is_empty() {
                parts.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if !current.is_empty() {
                current.push('\n');
                current_len += 1;
            }
            current.push_str(&piece);
            current_len += piece_len;
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn hard_wrap(line: &str, limit: usize) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    if chars.len() <= limit {
        return vec![line.to_owned()];
    }
    chars.chunks(limit).map(|chunk| chunk.iter().collect()).collect()
}
