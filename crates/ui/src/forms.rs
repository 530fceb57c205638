use catalog_core::{Book, Loan, Pages};

const BOOK_LABELS: [&str; 8] = [
    "ISBN-13",
    "Title",
    "Author",
    "Cover image",
    "Publisher",
    "Publication year",
    "Pages",
    "Language",
];

const ISBN: usize = 0;
const TITLE: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum FormMode {
    #[default]
    Add,
    Edit,
}

#[derive(Debug, Default)]
pub(crate) struct BookForm {
    pub(crate) open: bool,
    pub(crate) mode: FormMode,
    values: [String; 8],
    pub(crate) field: usize,
    pub(crate) error: Option<String>,
}

impl BookForm {
    pub(crate) fn open_add(&mut self) {
        *self = Self {
            open: true,
            ..Self::default()
        };
    }

    pub(crate) fn open_edit(&mut self, book: &Book) {
        let opt = |value: &Option<String>| value.clone().unwrap_or_default();
        *self = Self {
            open: true,
            mode: FormMode::Edit,
            values: [
                book.isbn13.clone(),
                book.title.clone(),
                opt(&book.author),
                opt(&book.image),
                opt(&book.publisher),
                opt(&book.publication_year),
                book.pages.as_ref().map(|p| p.to_string()).unwrap_or_default(),
                opt(&book.language),
            ],
            field: TITLE,
            error: None,
        };
    }

    pub(crate) fn close(&mut self) {
        *self = Self::default();
    }

    fn editable(&self, field: usize) -> bool {
        !(self.mode == FormMode::Edit && field == ISBN)
    }

    pub(crate) fn next_field(&mut self) {
        let len = self.values.len();
        self.field = (self.field + 1) % len;
        if !self.editable(self.field) {
            self.field = (self.field + 1) % len;
        }
    }

    pub(crate) fn prev_field(&mut self) {
        let len = self.values.len();
        self.field = (self.field + len - 1) % len;
        if !self.editable(self.field) {
            self.field = (self.field + len - 1) % len;
        }
    }

    pub(crate) fn push_char(&mut self, ch: char) {
        if self.editable(self.field) {
            self.values[self.field].push(ch);
            self.error = None;
        }
    }

    pub(crate) fn pop_char(&mut self) {
        if self.editable(self.field) {
            self.values[self.field].pop();
        }
    }

    pub(crate) fn clear_field(&mut self) {
        if self.editable(self.field) {
            self.values[self.field].clear();
        }
    }

    /// Raw form values; the command layer trims and drops blanks.
    pub(crate) fn to_book(&self) -> Book {
        let some = |idx: usize| Some(self.values[idx].clone());
        Book {
            isbn13: self.values[ISBN].clone(),
            title: self.values[TITLE].clone(),
            author: some(2),
            image: some(3),
            publisher: some(4),
            publication_year: some(5),
            pages: Some(Pages::Text(self.values[6].clone())),
            language: some(7),
        }
    }

    pub(crate) fn rows(&self) -> Vec<(&'static str, String, bool)> {
        BOOK_LABELS
            .iter()
            .zip(self.values.iter())
            .enumerate()
            .map(|(idx, (label, value))| (*label, value.clone(), self.editable(idx)))
            .collect()
    }
}

#[derive(Debug, Default)]
pub(crate) struct LoanForm {
    pub(crate) open: bool,
    isbn13: String,
    pub(crate) title: String,
    values: [String; 2],
    pub(crate) field: usize,
    pub(crate) error: Option<String>,
}

impl LoanForm {
    pub(crate) fn open_for(&mut self, book: &Book) {
        *self = Self {
            open: true,
            isbn13: book.isbn13.clone(),
            title: book.title.clone(),
            ..Self::default()
        };
    }

    pub(crate) fn close(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn next_field(&mut self) {
        self.field = (self.field + 1) % self.values.len();
    }

    pub(crate) fn prev_field(&mut self) {
        self.field = (self.field + self.values.len() - 1) % self.values.len();
    }

    pub(crate) fn push_char(&mut self, ch: char) {
        self.values[self.field].push(ch);
        self.error = None;
    }

    pub(crate) fn pop_char(&mut self) {
        self.values[self.field].pop();
    }

    pub(crate) fn clear_field(&mut self) {
        self.values[self.field].clear();
    }

    pub(crate) fn to_loan(&self) -> Loan {
        let mut loan = Loan::new(self.isbn13.clone());
        loan.borrower = Some(self.values[0].clone());
        loan.due_date = Some(self.values[1].clone());
        loan
    }

    pub(crate) fn rows(&self) -> Vec<(&'static str, String, bool)> {
        vec![
            ("Borrower", self.values[0].clone(), true),
            ("Due date", self.values[1].clone(), true),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_mode_skips_isbn_field() {
        let mut form = BookForm::default();
        form.open_edit(&Book::new("1", "One"));
        assert_eq!(form.field, TITLE);

        form.prev_field();
        assert_eq!(form.field, BOOK_LABELS.len() - 1);
        form.next_field();
        assert_eq!(form.field, TITLE);

        form.field = ISBN;
        form.push_char('9');
        assert_eq!(form.to_book().isbn13, "1");
    }

    #[test]
    fn blank_optional_fields_normalize_away() {
        let mut form = BookForm::default();
        form.open_add();
        for ch in "42".chars() {
            form.push_char(ch);
        }
        form.next_field();
        form.push_char('T');
        let mut book = form.to_book();
        book.normalize();
        assert_eq!(book, Book::new("42", "T"));
    }

    #[test]
    fn loan_form_targets_book() {
        let mut form = LoanForm::default();
        form.open_for(&Book::new("7", "Seven"));
        form.next_field();
        form.push_char('x');
        let mut loan = form.to_loan();
        loan.normalize();
        assert_eq!(loan.isbn13, "7");
        assert_eq!(loan.borrower, None);
        assert_eq!(loan.due_date.as_deref(), Some("x"));
    }
}
