use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    Plain { text: String },
    /// Inline HTML subset the chat transport understands (`<b>`, `<i>`).
    Html { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self::Html { text: text.into() }
    }

    /// The text as HTML, escaping plain content.
    pub fn to_html(&self) -> String {
        match self {
            Self::Plain { text } => escape_html(text),
            Self::Html { text } => text.clone(),
        }
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// A button either posts an action back (`value`) or opens a link (`url`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self { action_id: action_id.into(), text: TextObject::plain(label), value: None, url: None }
    }

    pub fn link(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self { action_id: "link.v1".to_owned(), text: TextObject::plain(label), value: None, url: Some(url.into()) }
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn label(&self) -> &str {
        match &self.text {
            TextObject::Plain { text } | TextObject::Html { text } => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    /// One row of buttons.
    Actions { block_id: String, elements: Vec<ButtonElement> },
    Context { block_id: String, elements: Vec<TextObject> },
    Image { block_id: String, image_url: String, caption: TextObject },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

impl MessageTemplate {
    /// Section and context text joined as HTML, in block order.
    pub fn html_body(&self) -> String {
        let parts: Vec<String> = self
            .blocks
            .iter()
            .filter_map(|block| match block {
                Block::Section { text, .. } => Some(text.to_html()),
                Block::Context { elements, .. } => Some(
                    elements.iter().map(TextObject::to_html).collect::<Vec<_>>().join(" "),
                ),
                Block::Actions { .. } | Block::Image { .. } => None,
            })
            .filter(|part| !part.trim().is_empty())
            .collect();
        if parts.is_empty() {
            escape_html(&self.fallback_text)
        } else {
            parts.join("\n\n")
        }
    }

    pub fn button_rows(&self) -> Vec<&[ButtonElement]> {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                Block::Actions { elements, .. } if !elements.is_empty() => Some(elements.as_slice()),
                _ => None,
            })
            .collect()
    }

    pub fn image(&self) -> Option<(&str, &TextObject)> {
        self.blocks.iter().find_map(|block| match block {
            Block::Image { image_url, caption, .. } => Some((image_url.as_str(), caption)),
            _ => None,
        })
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        let elements = builder.build();
        if !elements.is_empty() {
            self.blocks.push(Block::Actions { block_id: block_id.into(), elements });
        }
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn image(
        mut self,
        block_id: impl Into<String>,
        image_url: impl Into<String>,
        caption: TextObject,
    ) -> Self {
        self.blocks.push(Block::Image {
            block_id: block_id.into(),
            image_url: image_url.into(),
            caption,
        });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn html(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::html(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ButtonElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(button);
        self
    }

    fn build(self) -> Vec<ButtonElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

pub fn plain_message(text: &str) -> MessageTemplate {
    MessageBuilder::new(text.to_owned())
        .section("reply.text.v1", |section| {
            section.plain(text);
        })
        .build()
}

pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .section("reply.error.summary.v1", |section| {
            section.plain(format!("⚠️ {summary}"));
        })
        .context("reply.error.context.v1", |context| {
            context.plain(format!("Код запроса: {correlation_id}"));
        })
        .build()
}

pub const WELCOME_TEXT: &str = "Привет! Я ваш ассистент по путешествиям. \
Спросите меня о законах, культуре, достопримечательностях или маршрутах для любой страны. \
Примеры запросов:\n\
- Нужна ли виза в Японию?\n\
- Какие традиции во Франции?\n\
- Как добраться из Милана в Венецию?";

pub fn welcome_message() -> MessageTemplate {
    plain_message(WELCOME_TEXT)
}

pub fn help_message() -> MessageTemplate {
    MessageBuilder::new("Команды")
        .section("reply.help.summary.v1", |section| {
            section.html(
                "<b>Команды</b>\n• /start — приветствие\n• /help — эта подсказка\n\
                 • /reset — забыть контекст разговора\n\n\
                 Кнопки под ответом показывают погоду, маршрут, визы и места.",
            );
        })
        .build()
}
