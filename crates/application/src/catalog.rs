use catalog_core::Book;

/// Ordered in-memory book list keyed by ISBN-13.
///
/// The store does not reject duplicate ISBNs; `AppContext::add_book` does.
#[derive(Debug, Clone, Default)]
pub struct CatalogStore {
    books: Vec<Book>,
}

impl CatalogStore {
    pub fn new(books: Vec<Book>) -> Self {
        Self { books }
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn get(&self, isbn13: &str) -> Option<&Book> {
        self.books.iter().find(|book| book.isbn13 == isbn13)
    }

    pub fn contains(&self, isbn13: &str) -> bool {
        self.get(isbn13).is_some()
    }

    pub fn add(&mut self, book: Book) {
        self.books.push(book);
    }

    /// Replaces the record with the same ISBN. Returns false when nothing matched.
    pub fn update(&mut self, book: Book) -> bool {
        let mut matched = false;
        for existing in self
            .books
            .iter_mut()
            .filter(|existing| existing.isbn13 == book.isbn13)
        {
            *existing = book.clone();
            matched = true;
        }
        matched
    }

    pub fn delete(&mut self, isbn13: &str) -> bool {
        let before = self.books.len();
        self.books.retain(|book| book.isbn13 != isbn13);
        self.books.len() != before
    }

    /// Books by `author_filter` in insertion order; a blank filter lists everything.
    ///
    /// Authors are compared trimmed, the same normalization `unique_authors`
    /// applies, so every filter it offers matches its books.
    pub fn list(&self, author_filter: Option<&str>) -> Vec<&Book> {
        let filter = author_filter.map(str::trim).filter(|f| !f.is_empty());
        self.books
            .iter()
            .filter(|book| filter.is_none_or(|wanted| book.author_name() == Some(wanted)))
            .collect()
    }

    pub fn unique_authors(&self) -> Vec<String> {
        let mut authors: Vec<String> = self
            .books
            .iter()
            .filter_map(|book| book.author_name())
            .map(str::to_string)
            .collect();
        authors.sort();
        authors.dedup();
        authors
    }
}
