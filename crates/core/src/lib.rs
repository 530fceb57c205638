//! Core domain types for the book catalog.

use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_LOOKUP_BASE_URL: &str = "https://api.itbook.store/1.0/search";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    #[serde(deserialize_with = "string_or_number")]
    pub isbn13: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub title: String,
    #[serde(
        default,
        deserialize_with = "optional_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub author: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub image: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub publisher: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub publication_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Pages>,
    #[serde(
        default,
        deserialize_with = "optional_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub language: Option<String>,
}

/// Stored records may carry numbers where the form writes text.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
}

impl From<Scalar> for String {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Text(text) => text,
            Scalar::Number(number) => number.to_string(),
            Scalar::Flag(flag) => flag.to_string(),
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Scalar::deserialize(deserializer).map(String::from)
}

fn optional_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(String::from))
}

impl Book {
    pub fn new(isbn13: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            isbn13: isbn13.into(),
            title: title.into(),
            author: None,
            image: None,
            publisher: None,
            publication_year: None,
            pages: None,
            language: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Author if present and non-blank.
    pub fn author_name(&self) -> Option<&str> {
        self.author
            .as_deref()
            .map(str::trim)
            .filter(|author| !author.is_empty())
    }

    /// Trims every field and drops blank optional values.
    pub fn normalize(&mut self) {
        self.isbn13 = self.isbn13.trim().to_string();
        self.title = self.title.trim().to_string();
        for field in [
            &mut self.author,
            &mut self.image,
            &mut self.publisher,
            &mut self.publication_year,
            &mut self.language,
        ] {
            *field = normalize_optional(field.take());
        }
        if let Some(Pages::Text(text)) = &self.pages {
            let text = text.trim();
            self.pages = if text.is_empty() {
                None
            } else {
                Some(Pages::parse(text))
            };
        }
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Page count as stored: older records carry any JSON number, form input carries text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Pages {
    Count(serde_json::Number),
    Text(String),
}

impl Pages {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        value
            .parse::<u64>()
            .map(|count| Pages::Count(count.into()))
            .unwrap_or_else(|_| Pages::Text(value.to_string()))
    }
}

impl std::fmt::Display for Pages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pages::Count(count) => write!(f, "{count}"),
            Pages::Text(text) => f.write_str(text),
        }
    }
}

/// A book lent out. Unknown fields from stored records survive a round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    #[serde(deserialize_with = "string_or_number")]
    pub isbn13: String,
    #[serde(
        default,
        deserialize_with = "optional_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub borrower: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Loan {
    pub fn new(isbn13: impl Into<String>) -> Self {
        Self {
            isbn13: isbn13.into(),
            borrower: None,
            due_date: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_borrower(mut self, borrower: impl Into<String>) -> Self {
        self.borrower = Some(borrower.into());
        self
    }

    pub fn with_due_date(mut self, due_date: impl Into<String>) -> Self {
        self.due_date = Some(due_date.into());
        self
    }

    pub fn normalize(&mut self) {
        self.isbn13 = self.isbn13.trim().to_string();
        self.borrower = normalize_optional(self.borrower.take());
        self.due_date = normalize_optional(self.due_date.take());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveView {
    #[default]
    Catalog,
    Loans,
}

impl ActiveView {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActiveView::Catalog => "catalog",
            ActiveView::Loans => "loans",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ActiveView::Catalog => ActiveView::Loans,
            ActiveView::Loans => ActiveView::Catalog,
        }
    }
}

impl std::fmt::Display for ActiveView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActiveView {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "catalog" => Ok(ActiveView::Catalog),
            "loans" => Ok(ActiveView::Loans),
            _ => Err("unknown view"),
        }
    }
}

/// Summary returned by the external book search.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarBook {
    pub title: String,
    pub subtitle: String,
    pub isbn13: String,
    pub price: String,
    pub image: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub similar_books_enabled: bool,
    pub lookup_base_url: String,
    pub lookup_timeout_secs: u64,
    pub similar_books_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            similar_books_enabled: true,
            lookup_base_url: DEFAULT_LOOKUP_BASE_URL.to_string(),
            lookup_timeout_secs: 10,
            similar_books_limit: 4,
        }
    }
}

impl Settings {
    pub fn normalize(&mut self) {
        self.lookup_timeout_secs = self.lookup_timeout_secs.clamp(1, 60);
        self.similar_books_limit = self.similar_books_limit.clamp(1, 20);
        let base_url = self.lookup_base_url.trim().trim_end_matches('/');
        self.lookup_base_url = if base_url.is_empty() {
            DEFAULT_LOOKUP_BASE_URL.to_string()
        } else {
            base_url.to_string()
        };
    }
}

/// Where dirty collections are written after a mutation.
pub trait CollectionSink {
    fn save_books(&self, books: &[Book]) -> anyhow::Result<()>;
    fn save_loans(&self, loans: &[Loan]) -> anyhow::Result<()>;
}
