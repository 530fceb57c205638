use std::cell::OnceCell;
use std::collections::HashSet;

use catalog_core::Loan;

/// Set of ISBNs with at least one loan, built for one version of the loan list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoanedIndex {
    isbns: HashSet<String>,
    version: u64,
}

impl LoanedIndex {
    fn build(loans: &[Loan], version: u64) -> Self {
        Self {
            isbns: loans.iter().map(|loan| loan.isbn13.clone()).collect(),
            version,
        }
    }

    pub fn contains(&self, isbn13: &str) -> bool {
        self.isbns.contains(isbn13)
    }

    pub fn len(&self) -> usize {
        self.isbns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.isbns.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoanStore {
    loans: Vec<Loan>,
    version: u64,
    index: OnceCell<LoanedIndex>,
}

impl LoanStore {
    pub fn new(loans: Vec<Loan>) -> Self {
        Self {
            loans,
            version: 0,
            index: OnceCell::new(),
        }
    }

    pub fn loans(&self) -> &[Loan] {
        &self.loans
    }

    pub fn len(&self) -> usize {
        self.loans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loans.is_empty()
    }

    /// Bumped on every mutation; the loaned index is rebuilt lazily after a bump.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn add(&mut self, loan: Loan) {
        self.loans.push(loan);
        self.bump();
    }

    /// Removes every loan for `isbn13` and returns how many went away.
    pub fn delete_by_isbn(&mut self, isbn13: &str) -> usize {
        let before = self.loans.len();
        self.loans.retain(|loan| loan.isbn13 != isbn13);
        let removed = before - self.loans.len();
        if removed > 0 {
            self.bump();
        }
        removed
    }

    pub fn loaned_index(&self) -> &LoanedIndex {
        self.index
            .get_or_init(|| LoanedIndex::build(&self.loans, self.version))
    }

    pub fn is_loaned(&self, isbn13: &str) -> bool {
        self.loaned_index().contains(isbn13)
    }

    pub fn for_isbn<'a>(&'a self, isbn13: &'a str) -> impl Iterator<Item = &'a Loan> + 'a {
        self.loans.iter().filter(move |loan| loan.isbn13 == isbn13)
    }

    fn bump(&mut self) {
        self.version += 1;
        self.index.take();
    }
}
