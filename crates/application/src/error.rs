use thiserror::Error;

/// Rejections from catalog and loan commands. State is unchanged when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("ISBN-13 is required")]
    MissingIsbn,

    #[error("title is required")]
    MissingTitle,

    #[error("a book with ISBN-13 {0} is already in the catalog")]
    DuplicateIsbn(String),

    #[error("no book with ISBN-13 {0} in the catalog")]
    UnknownBook(String),

    #[error("book {0} is already on loan")]
    AlreadyLoaned(String),

    #[error("book {0} is on loan and cannot be changed")]
    BookOnLoan(String),

    #[error("no book is being edited")]
    NotEditing,
}
