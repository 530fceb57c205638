use catalog_core::ActiveView;

/// What the catalog list is focused on. Selection and details are exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Browsing,
    Selected {
        isbn13: String,
        editing: bool,
    },
    Details(String),
}

impl Focus {
    pub fn selected_isbn(&self) -> Option<&str> {
        match self {
            Focus::Selected { isbn13, .. } => Some(isbn13),
            _ => None,
        }
    }

    pub fn details_isbn(&self) -> Option<&str> {
        match self {
            Focus::Details(isbn13) => Some(isbn13),
            _ => None,
        }
    }

    pub fn is_editing(&self) -> bool {
        matches!(self, Focus::Selected { editing: true, .. })
    }

    pub fn references(&self, isbn: &str) -> bool {
        match self {
            Focus::Browsing => false,
            Focus::Selected { isbn13, .. } | Focus::Details(isbn13) => isbn13 == isbn,
        }
    }
}

/// Sent to the surrounding chrome when the details view opens or closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromeNotice {
    HideNavigation,
    ShowNavigation,
}

#[derive(Debug, Clone, Default)]
pub struct ViewState {
    focus: Focus,
    active_view: ActiveView,
    author_filter: Option<String>,
}

impl ViewState {
    pub fn focus(&self) -> &Focus {
        &self.focus
    }

    pub fn active_view(&self) -> ActiveView {
        self.active_view
    }

    pub fn author_filter(&self) -> Option<&str> {
        self.author_filter.as_deref()
    }

    pub fn navigation_visible(&self) -> bool {
        !matches!(self.focus, Focus::Details(_))
    }

    /// Toggles selection of `isbn13`. Ignored while the details view is open.
    pub fn select(&mut self, isbn13: &str) {
        self.focus = match &self.focus {
            Focus::Details(_) => return,
            Focus::Selected { isbn13: current, .. } if current == isbn13 => Focus::Browsing,
            Focus::Browsing | Focus::Selected { .. } => Focus::Selected {
                isbn13: isbn13.to_string(),
                editing: false,
            },
        };
    }

    pub fn open_details(&mut self, isbn13: &str) -> ChromeNotice {
        self.focus = Focus::Details(isbn13.to_string());
        ChromeNotice::HideNavigation
    }

    pub fn close_details(&mut self) -> Option<ChromeNotice> {
        match self.focus {
            Focus::Details(_) => {
                self.focus = Focus::Browsing;
                Some(ChromeNotice::ShowNavigation)
            }
            _ => None,
        }
    }

    /// Opens the edit form for the selection unless the book is on loan.
    pub fn begin_edit(&mut self, on_loan: bool) -> bool {
        match &mut self.focus {
            Focus::Selected { editing, .. } if !on_loan => {
                *editing = true;
                true
            }
            _ => false,
        }
    }

    pub fn cancel_edit(&mut self) {
        if let Focus::Selected { editing, .. } = &mut self.focus {
            *editing = false;
        }
    }

    pub fn clear_selection(&mut self) {
        if matches!(self.focus, Focus::Selected { .. }) {
            self.focus = Focus::Browsing;
        }
    }

    /// Drops any focus on `isbn13`, e.g. after the book was deleted.
    pub fn forget(&mut self, isbn13: &str) -> Option<ChromeNotice> {
        if !self.focus.references(isbn13) {
            return None;
        }
        let was_details = matches!(self.focus, Focus::Details(_));
        self.focus = Focus::Browsing;
        was_details.then_some(ChromeNotice::ShowNavigation)
    }

    /// Returns true when the filter actually changed.
    pub fn set_author_filter(&mut self, filter: Option<String>) -> bool {
        let filter = filter
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());
        if filter == self.author_filter {
            return false;
        }
        self.author_filter = filter;
        self.clear_selection();
        true
    }

    /// Switches between catalog and loans. Suppressed while details are open.
    pub fn toggle_view(&mut self) -> Option<ActiveView> {
        if !self.navigation_visible() {
            return None;
        }
        self.active_view = self.active_view.toggled();
        self.focus = Focus::Browsing;
        self.author_filter = None;
        Some(self.active_view)
    }
}
