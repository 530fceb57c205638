use catalog_core::SimilarBook;

pub const LOOKUP_FAILED_MESSAGE: &str = "Could not load similar books.";

pub type LookupTicket = u64;

/// State of the "similar books" panel shown in the details view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SimilarBooks {
    #[default]
    Idle,
    Disabled,
    Loading {
        ticket: LookupTicket,
    },
    Loaded {
        ticket: LookupTicket,
        books: Vec<SimilarBook>,
    },
    Failed {
        ticket: LookupTicket,
        message: String,
    },
}

impl SimilarBooks {
    pub fn books(&self) -> &[SimilarBook] {
        match self {
            SimilarBooks::Loaded { books, .. } => books,
            _ => &[],
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SimilarBooks::Loading { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimilarPanel {
    state: SimilarBooks,
    issued: LookupTicket,
}

impl SimilarPanel {
    pub fn state(&self) -> &SimilarBooks {
        &self.state
    }

    /// Starts a new lookup; replies for earlier tickets are ignored from now on.
    pub fn begin(&mut self) -> LookupTicket {
        self.issued += 1;
        self.state = SimilarBooks::Loading {
            ticket: self.issued,
        };
        self.issued
    }

    pub fn disable(&mut self) {
        self.state = SimilarBooks::Disabled;
    }

    pub fn reset(&mut self) {
        self.state = SimilarBooks::Idle;
    }

    /// Applies a lookup reply. Returns false for stale tickets.
    pub fn apply(
        &mut self,
        ticket: LookupTicket,
        result: Result<Vec<SimilarBook>, String>,
    ) -> bool {
        if self.state != (SimilarBooks::Loading { ticket }) {
            tracing::debug!(ticket, "dropping stale similar-books reply");
            return false;
        }
        self.state = match result {
            Ok(books) => SimilarBooks::Loaded { ticket, books },
            Err(detail) => {
                tracing::warn!(ticket, "similar books lookup failed: {detail}");
                SimilarBooks::Failed {
                    ticket,
                    message: LOOKUP_FAILED_MESSAGE.to_string(),
                }
            }
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn similar(isbn: &str) -> SimilarBook {
        SimilarBook {
            isbn13: isbn.to_string(),
            title: format!("Book {isbn}"),
            ..SimilarBook::default()
        }
    }

    #[test]
    fn latest_ticket_wins() {
        let mut panel = SimilarPanel::default();
        let first = panel.begin();
        let second = panel.begin();
        assert_ne!(first, second);

        assert!(!panel.apply(first, Ok(vec![similar("1")])));
        assert!(panel.state().is_loading());

        assert!(panel.apply(second, Ok(vec![similar("2")])));
        assert_eq!(panel.state().books(), &[similar("2")]);

        assert!(!panel.apply(second, Ok(vec![similar("3")])));
        assert_eq!(panel.state().books(), &[similar("2")]);
    }

    #[test]
    fn failure_shows_message_and_no_books() {
        let mut panel = SimilarPanel::default();
        let ticket = panel.begin();
        assert!(panel.apply(ticket, Err("HTTP 503".to_string())));
        assert_eq!(
            panel.state(),
            &SimilarBooks::Failed {
                ticket,
                message: LOOKUP_FAILED_MESSAGE.to_string()
            }
        );
        assert!(panel.state().books().is_empty());
    }

    #[test]
    fn reply_after_reset_dropped() {
        let mut panel = SimilarPanel::default();
        let ticket = panel.begin();
        panel.reset();
        assert!(!panel.apply(ticket, Ok(vec![similar("1")])));
        assert_eq!(panel.state(), &SimilarBooks::Idle);
    }
}
