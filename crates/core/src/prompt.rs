use crate::domain::ImagePayload;
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq)]
pub enum PromptPart {
    Text(String),
    Image(ImagePayload),
}

/// Rendered instruction for the model: text interleaved with inline images, in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Prompt {
    pub parts: Vec<PromptPart>,
}

impl Prompt {
    pub fn images(&self) -> impl Iterator<Item = &ImagePayload> {
        self.parts.iter().filter_map(|p| match p {
            PromptPart::Image(img) => Some(img),
            PromptPart::Text(_) => None,
        })
    }

    /// Text with images summarized; what we show in dry runs.
    pub fn to_display_text(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                PromptPart::Text(t) => out.push_str(t),
                PromptPart::Image(img) => out.push_str(&format!(
                    "[image {}, ~{} bytes]",
                    img.mime_type,
                    img.approx_decoded_len()
                )),
            }
        }
        out
    }
}

/// Appends template lines; optional fields are emitted only when present.
#[derive(Debug, Default)]
pub struct PromptBuilder {
    parts: Vec<PromptPart>,
    text: String,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(mut self, line: &str) -> Self {
        self.text.push_str(line);
        self.text.push('\n');
        self
    }

    pub fn blank(self) -> Self {
        self.line("")
    }

    pub fn field(self, label: &str, value: impl Display) -> Self {
        self.line(&format!("{label}: {value}"))
    }

    pub fn optional_field<T: Display>(self, label: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.field(label, v),
            None => self,
        }
    }

    /// Emits `label:` followed by the image as its own part.
    pub fn image(mut self, label: &str, image: &ImagePayload) -> Self {
        self.text.push_str(label);
        self.text.push_str(": ");
        self.flush();
        self.parts.push(PromptPart::Image(image.clone()));
        self.text.push('\n');
        self
    }

    pub fn optional_image(self, label: &str, image: Option<&ImagePayload>) -> Self {
        match image {
            Some(img) => self.image(label, img),
            None => self,
        }
    }

    /// Applies `f` only when `cond` holds; for whole optional sections.
    pub fn section_if(self, cond: bool, f: impl FnOnce(Self) -> Self) -> Self {
        if cond {
            f(self)
        } else {
            self
        }
    }

    fn flush(&mut self) {
        if !self.text.is_empty() {
            self.parts
                .push(PromptPart::Text(std::mem::take(&mut self.text)));
        }
    }

    pub fn build(mut self) -> Prompt {
        let trimmed = self.text.trim_end().len();
        self.text.truncate(trimmed);
        self.flush();
        Prompt { parts: self.parts }
    }
}
