//! Test helpers and fixtures.

use catalog_core::{Book, Loan, Settings};

pub fn make_book(isbn13: &str, title: &str, author: &str) -> Book {
    Book::new(isbn13, title).with_author(author)
}

pub fn make_loan(isbn13: &str) -> Loan {
    Loan::new(isbn13).with_borrower("Sam").with_due_date("2025-12-01")
}

pub fn offline_settings() -> Settings {
    Settings {
        similar_books_enabled: false,
        ..Settings::default()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use catalog_application::{AppContext, CommandError, Focus, SimilarBooks};
    use catalog_lookup::search_query;
    use catalog_storage::{BOOKS_KEY, LOANS_KEY, Storage};

    use super::*;

    fn reload(storage: &Storage) -> AppContext {
        AppContext::new(offline_settings())
            .with_books(storage.load_books())
            .with_loans(storage.load_loans())
    }

    #[test]
    fn delete_removes_book_and_its_loans_end_to_end() -> anyhow::Result<()> {
        let storage = Storage::open_in_memory()?;
        let mut ctx = AppContext::new(offline_settings());

        ctx.add_book(make_book("978-0-13-468599-1", "Design", "A. Author"))?;
        ctx.loan_book(make_loan("978-0-13-468599-1"))?;
        ctx.flush(&storage);
        assert!(ctx.is_loaned("978-0-13-468599-1"));

        let mut ctx = reload(&storage);
        assert!(ctx.is_loaned("978-0-13-468599-1"));
        assert!(ctx.delete_book("978-0-13-468599-1"));
        ctx.flush(&storage);

        assert!(storage.load_books().is_empty());
        assert!(storage.load_loans().is_empty());
        assert!(!reload(&storage).is_loaned("978-0-13-468599-1"));
        Ok(())
    }

    #[test]
    fn catalog_survives_restart_in_insertion_order() -> anyhow::Result<()> {
        let storage = Storage::open_in_memory()?;
        let mut ctx = AppContext::new(offline_settings());
        for (isbn, title, author) in [("3", "C", "Cy"), ("1", "A", "Ann"), ("2", "B", "Ann")] {
            ctx.add_book(make_book(isbn, title, author))?;
        }
        ctx.flush(&storage);

        let ctx = reload(&storage);
        let isbns: Vec<&str> = ctx.catalog().books().iter().map(|b| b.isbn13.as_str()).collect();
        assert_eq!(isbns, vec!["3", "1", "2"]);
        assert_eq!(ctx.unique_authors(), vec!["Ann".to_string(), "Cy".to_string()]);
        Ok(())
    }

    #[test]
    fn isbns_stay_unique_across_add_and_delete() -> anyhow::Result<()> {
        let mut ctx = AppContext::new(offline_settings());
        let steps = [
            ("add", "1"),
            ("add", "2"),
            ("add", "1"),
            ("delete", "1"),
            ("add", "1"),
            ("add", "2"),
            ("delete", "3"),
        ];
        for (op, isbn) in steps {
            match op {
                "add" => {
                    let result = ctx.add_book(make_book(isbn, "Title", "Ann"));
                    if let Err(err) = result {
                        assert_eq!(err, CommandError::DuplicateIsbn(isbn.to_string()));
                    }
                }
                _ => {
                    ctx.delete_book(isbn);
                }
            }
            let isbns: HashSet<&str> =
                ctx.catalog().books().iter().map(|b| b.isbn13.as_str()).collect();
            assert_eq!(isbns.len(), ctx.catalog().len());
        }
        assert_eq!(ctx.catalog().len(), 2);
        Ok(())
    }

    #[test]
    fn malformed_storage_starts_empty_and_recovers() -> anyhow::Result<()> {
        let storage = Storage::open_in_memory()?;
        storage.set_item(BOOKS_KEY, "[{\"isbn13\":")?;
        storage.set_item(LOANS_KEY, "42")?;

        let mut ctx = reload(&storage);
        assert!(ctx.catalog().is_empty());
        assert!(ctx.loans().is_empty());

        ctx.add_book(make_book("1", "Fresh", "Ann"))?;
        ctx.flush(&storage);
        assert_eq!(storage.load_books().len(), 1);
        Ok(())
    }

    #[test]
    fn loaned_book_is_locked_until_its_loan_goes_away() -> anyhow::Result<()> {
        let mut ctx = AppContext::new(offline_settings())
            .with_books(vec![make_book("1", "One", "Ann"), make_book("2", "Two", "Ben")])
            .with_loans(vec![make_loan("1")]);

        ctx.select("1");
        assert!(!ctx.request_edit());
        assert!(!ctx.request_delete());
        assert_eq!(ctx.available_books().len(), 1);

        ctx.select("1");
        ctx.select("2");
        assert!(ctx.request_edit());
        ctx.submit_edit(make_book("ignored", "Two, 2nd ed.", "Ben"))?;
        assert_eq!(ctx.focus(), &Focus::Browsing);
        assert_eq!(
            ctx.catalog().get("2").map(|b| b.title.as_str()),
            Some("Two, 2nd ed.")
        );
        Ok(())
    }

    #[test]
    fn details_lookup_uses_title_words() -> anyhow::Result<()> {
        let mut ctx = AppContext::new(Settings::default())
            .with_books(vec![make_book("1", "Clean Code in Practice", "Ann")]);
        let opened = ctx.open_details("1").ok_or_else(|| anyhow::anyhow!("no details"))?;
        let ticket = opened.lookup.ok_or_else(|| anyhow::anyhow!("no ticket"))?;

        let book = ctx.detailed_book().ok_or_else(|| anyhow::anyhow!("no book"))?;
        assert_eq!(search_query(book), "Clean Code in");

        assert!(ctx.apply_lookup(ticket, Err("offline".to_string())));
        assert!(matches!(ctx.similar_books(), SimilarBooks::Failed { .. }));
        Ok(())
    }

    #[test]
    fn stored_loans_keep_unknown_fields() -> anyhow::Result<()> {
        let storage = Storage::open_in_memory()?;
        storage.set_item(
            LOANS_KEY,
            r#"[{"isbn13":"1","borrower":"Sam","note":"signed copy"}]"#,
        )?;
        storage.set_item(BOOKS_KEY, r#"[{"isbn13":"1","title":"One"},{"isbn13":"2","title":"Two"}]"#)?;

        let mut ctx = reload(&storage);
        ctx.loan_book(Loan::new("2"))?;
        ctx.flush(&storage);

        let raw = storage.get_item(LOANS_KEY)?.unwrap_or_default();
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        assert_eq!(value[0]["note"], "signed copy");
        assert_eq!(value[1]["isbn13"], "2");
        Ok(())
    }
}
