//! Application orchestration layer for the book catalog.

mod catalog;
mod error;
mod loans;
mod similar;
mod view;

use catalog_core::{ActiveView, Book, CollectionSink, Loan, Settings, SimilarBook};
use tracing::{debug, info, warn};

pub use catalog::CatalogStore;
pub use error::CommandError;
pub use loans::{LoanStore, LoanedIndex};
pub use similar::{LOOKUP_FAILED_MESSAGE, LookupTicket, SimilarBooks, SimilarPanel};
pub use view::{ChromeNotice, Focus, ViewState};

/// Result of opening the details view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailsOpened {
    pub notice: ChromeNotice,
    /// Ticket for the similar-books request to issue, if lookups are enabled.
    pub lookup: Option<LookupTicket>,
}

/// Owns both collections and the view state. All mutation goes through here.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub settings: Settings,
    catalog: CatalogStore,
    loans: LoanStore,
    view: ViewState,
    similar: SimilarPanel,
    dirty_books: bool,
    dirty_loans: bool,
}

impl AppContext {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            catalog: CatalogStore::default(),
            loans: LoanStore::default(),
            view: ViewState::default(),
            similar: SimilarPanel::default(),
            dirty_books: false,
            dirty_loans: false,
        }
    }

    pub fn with_books(mut self, books: Vec<Book>) -> Self {
        self.catalog = CatalogStore::new(books);
        self
    }

    pub fn with_loans(mut self, loans: Vec<Loan>) -> Self {
        self.loans = LoanStore::new(loans);
        self
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn loans(&self) -> &LoanStore {
        &self.loans
    }

    pub fn focus(&self) -> &Focus {
        self.view.focus()
    }

    pub fn active_view(&self) -> ActiveView {
        self.view.active_view()
    }

    pub fn author_filter(&self) -> Option<&str> {
        self.view.author_filter()
    }

    pub fn navigation_visible(&self) -> bool {
        self.view.navigation_visible()
    }

    pub fn similar_books(&self) -> &SimilarBooks {
        self.similar.state()
    }

    pub fn is_loaned(&self, isbn13: &str) -> bool {
        self.loans.is_loaned(isbn13)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_books || self.dirty_loans
    }

    pub fn visible_books(&self) -> Vec<&Book> {
        self.catalog.list(self.view.author_filter())
    }

    pub fn unique_authors(&self) -> Vec<String> {
        self.catalog.unique_authors()
    }

    /// Books that can be lent out right now.
    pub fn available_books(&self) -> Vec<&Book> {
        let loaned = self.loans.loaned_index();
        self.catalog
            .books()
            .iter()
            .filter(|book| !loaned.contains(&book.isbn13))
            .collect()
    }

    pub fn selected_book(&self) -> Option<&Book> {
        self.focus()
            .selected_isbn()
            .and_then(|isbn| self.catalog.get(isbn))
    }

    pub fn detailed_book(&self) -> Option<&Book> {
        self.focus()
            .details_isbn()
            .and_then(|isbn| self.catalog.get(isbn))
    }

    pub fn selected_is_loaned(&self) -> bool {
        self.focus()
            .selected_isbn()
            .is_some_and(|isbn| self.loans.is_loaned(isbn))
    }

    pub fn add_book(&mut self, mut book: Book) -> Result<(), CommandError> {
        book.normalize();
        if book.isbn13.is_empty() {
            return Err(CommandError::MissingIsbn);
        }
        if book.title.is_empty() {
            return Err(CommandError::MissingTitle);
        }
        if self.catalog.contains(&book.isbn13) {
            return Err(CommandError::DuplicateIsbn(book.isbn13));
        }
        info!(isbn13 = %book.isbn13, "add book");
        self.catalog.add(book);
        self.dirty_books = true;
        Ok(())
    }

    /// Deletes the book and every loan referencing it.
    pub fn delete_book(&mut self, isbn13: &str) -> bool {
        if !self.catalog.delete(isbn13) {
            return false;
        }
        let removed_loans = self.loans.delete_by_isbn(isbn13);
        info!(isbn13, removed_loans, "delete book");
        if self.view.forget(isbn13).is_some() {
            self.similar.reset();
        }
        self.dirty_books = true;
        if removed_loans > 0 {
            self.dirty_loans = true;
        }
        true
    }

    pub fn loan_book(&mut self, mut loan: Loan) -> Result<(), CommandError> {
        loan.normalize();
        if loan.isbn13.is_empty() {
            return Err(CommandError::MissingIsbn);
        }
        if !self.catalog.contains(&loan.isbn13) {
            return Err(CommandError::UnknownBook(loan.isbn13));
        }
        if self.loans.is_loaned(&loan.isbn13) {
            return Err(CommandError::AlreadyLoaned(loan.isbn13));
        }
        info!(isbn13 = %loan.isbn13, "loan book");
        self.loans.add(loan);
        self.dirty_loans = true;
        Ok(())
    }

    pub fn select(&mut self, isbn13: &str) {
        self.view.select(isbn13);
    }

    /// Enters the details view for `isbn13`. Returns None for unknown books.
    pub fn open_details(&mut self, isbn13: &str) -> Option<DetailsOpened> {
        if !self.catalog.contains(isbn13) {
            return None;
        }
        let notice = self.view.open_details(isbn13);
        let lookup = if self.settings.similar_books_enabled {
            Some(self.similar.begin())
        } else {
            self.similar.disable();
            None
        };
        debug!(isbn13, ?lookup, "open details");
        Some(DetailsOpened { notice, lookup })
    }

    pub fn close_details(&mut self) -> Option<ChromeNotice> {
        let notice = self.view.close_details()?;
        self.similar.reset();
        Some(notice)
    }

    pub fn apply_lookup(
        &mut self,
        ticket: LookupTicket,
        result: Result<Vec<SimilarBook>, String>,
    ) -> bool {
        self.similar.apply(ticket, result)
    }

    /// Opens the edit form. Rejected without state change when the book is on loan.
    pub fn request_edit(&mut self) -> bool {
        let on_loan = self.selected_is_loaned();
        let opened = self.view.begin_edit(on_loan);
        if !opened && on_loan {
            debug!("edit rejected: selected book is on loan");
        }
        opened
    }

    pub fn cancel_edit(&mut self) {
        self.view.cancel_edit();
    }

    /// Saves the edit form. The ISBN of the selection wins over the form's.
    pub fn submit_edit(&mut self, mut book: Book) -> Result<(), CommandError> {
        let isbn13 = match self.focus() {
            Focus::Selected {
                isbn13,
                editing: true,
            } => isbn13.clone(),
            _ => return Err(CommandError::NotEditing),
        };
        if self.loans.is_loaned(&isbn13) {
            return Err(CommandError::BookOnLoan(isbn13));
        }
        book.isbn13 = isbn13.clone();
        book.normalize();
        if book.title.is_empty() {
            return Err(CommandError::MissingTitle);
        }
        if !self.catalog.update(book) {
            self.view.clear_selection();
            return Err(CommandError::UnknownBook(isbn13));
        }
        info!(isbn13 = %isbn13, "update book");
        self.view.clear_selection();
        self.dirty_books = true;
        Ok(())
    }

    /// Deletes the selected book unless it is on loan.
    pub fn request_delete(&mut self) -> bool {
        let Some(isbn13) = self.focus().selected_isbn().map(str::to_string) else {
            return false;
        };
        if self.loans.is_loaned(&isbn13) {
            debug!(isbn13 = %isbn13, "delete rejected: book is on loan");
            return false;
        }
        self.delete_book(&isbn13);
        self.view.clear_selection();
        true
    }

    pub fn set_author_filter(&mut self, filter: Option<String>) -> bool {
        self.view.set_author_filter(filter)
    }

    /// Steps the author filter through "all" and each known author.
    pub fn cycle_author_filter(&mut self, forward: bool) {
        let authors = self.unique_authors();
        if authors.is_empty() {
            self.set_author_filter(None);
            return;
        }
        let current = self
            .author_filter()
            .and_then(|filter| authors.iter().position(|a| a == filter));
        let slots = authors.len() + 1;
        let current_slot = current.map(|idx| idx + 1).unwrap_or(0);
        let next_slot = if forward {
            (current_slot + 1) % slots
        } else {
            (current_slot + slots - 1) % slots
        };
        let next = next_slot.checked_sub(1).map(|idx| authors[idx].clone());
        self.set_author_filter(next);
    }

    pub fn toggle_view(&mut self) -> Option<ActiveView> {
        let view = self.view.toggle_view()?;
        debug!(view = %view, "switch view");
        Some(view)
    }

    /// Writes dirty collections. Failures are logged and not retried.
    pub fn flush(&mut self, sink: &dyn CollectionSink) {
        if std::mem::take(&mut self.dirty_books) {
            if let Err(err) = sink.save_books(self.catalog.books()) {
                warn!("failed to save books: {err:#}");
            }
        }
        if std::mem::take(&mut self.dirty_loans) {
            if let Err(err) = sink.save_loans(self.loans.loans()) {
                warn!("failed to save loans: {err:#}");
            }
        }
    }
}
