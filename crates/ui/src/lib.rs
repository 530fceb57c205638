//! ratatui-based UI.

use std::io::{self, Stdout};
use std::time::Duration;

use anyhow::Context as _;
use catalog_application::{AppContext, ChromeNotice, Focus, SimilarBooks};
use catalog_core::{ActiveView, CollectionSink};
use catalog_lookup::LookupWorker;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{event, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Clear, HighlightSpacing, List, ListItem, ListState, Paragraph, Wrap,
};

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

mod forms;

use forms::{BookForm, FormMode, LoanForm};

pub struct Ui {
    ctx: AppContext,
    sink: Box<dyn CollectionSink>,
    lookup: Option<LookupWorker>,
    navigation_hidden: bool,
    catalog_cursor: usize,
    loans_cursor: usize,
    book_form: BookForm,
    loan_form: LoanForm,
    status: Option<String>,
}

impl Ui {
    pub fn new(
        ctx: AppContext,
        sink: Box<dyn CollectionSink>,
        lookup: Option<LookupWorker>,
    ) -> Self {
        Self {
            ctx,
            sink,
            lookup,
            navigation_hidden: false,
            catalog_cursor: 0,
            loans_cursor: 0,
            book_form: BookForm::default(),
            loan_form: LoanForm::default(),
            status: None,
        }
    }

    /// Runs until the user quits and hands the final context back.
    pub fn run(mut self) -> anyhow::Result<AppContext> {
        let mut terminal = setup_terminal()?;
        terminal.clear().ok();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.event_loop(&mut terminal)
        }));
        let restore_result = restore_terminal(&mut terminal);
        self.ctx.flush(self.sink.as_ref());

        match (result, restore_result) {
            (Ok(Ok(())), Ok(())) => Ok(self.ctx),
            (Ok(Ok(())), Err(err)) => Err(err),
            (Ok(Err(err)), _) => Err(err),
            (Err(panic), Ok(())) => Err(anyhow::anyhow!(panic_to_string(panic))),
            (Err(panic), Err(err)) => Err(anyhow::anyhow!(
                "{}\n(additionally failed to restore terminal: {err})",
                panic_to_string(panic)
            )),
        }
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ) -> anyhow::Result<()> {
        let tick_rate = Duration::from_millis(250);
        let mut needs_redraw = true;

        loop {
            if self.poll_lookup() {
                needs_redraw = true;
            }

            if needs_redraw {
                terminal.draw(|frame| self.draw(frame.area(), frame))?;
                needs_redraw = false;
            }

            if !event::poll(tick_rate)? {
                continue;
            }

            match event::read()? {
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Release {
                        continue;
                    }

                    needs_redraw = true;
                    let quit = self.handle_key(key);
                    self.ctx.flush(self.sink.as_ref());
                    if quit {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
    }

    fn poll_lookup(&mut self) -> bool {
        let Some(worker) = self.lookup.as_ref() else {
            return false;
        };
        let mut applied = false;
        while let Some(reply) = worker.try_recv() {
            let result = reply.result.map_err(|err| err.to_string());
            applied |= self.ctx.apply_lookup(reply.ticket, result);
        }
        applied
    }

    /// Returns true when the user asked to quit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return true;
        }

        let quit = if self.book_form.open {
            self.handle_book_form_key(key);
            false
        } else if self.loan_form.open {
            self.handle_loan_form_key(key);
            false
        } else if matches!(self.ctx.focus(), Focus::Details(_)) {
            self.handle_details_key(key)
        } else {
            match self.ctx.active_view() {
                ActiveView::Catalog => self.handle_catalog_key(key),
                ActiveView::Loans => self.handle_loans_key(key),
            }
        };
        self.clamp_cursors();
        quit
    }

    fn handle_catalog_key(&mut self, key: KeyEvent) -> bool {
        self.status = None;
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return true,
            KeyCode::Down => {
                self.catalog_cursor = self.catalog_cursor.saturating_add(1);
            }
            KeyCode::Up => {
                self.catalog_cursor = self.catalog_cursor.saturating_sub(1);
            }
            KeyCode::Char(' ') => {
                if let Some(isbn) = self.cursor_isbn() {
                    self.ctx.select(&isbn);
                }
            }
            KeyCode::Enter => self.open_details_at_cursor(),
            KeyCode::Char('a') => self.book_form.open_add(),
            KeyCode::Char('e') => self.request_edit(),
            KeyCode::Char('d') => self.request_delete(),
            KeyCode::Char('f') => {
                self.ctx.cycle_author_filter(true);
                self.catalog_cursor = 0;
            }
            KeyCode::Char('F') => {
                self.ctx.cycle_author_filter(false);
                self.catalog_cursor = 0;
            }
            KeyCode::Tab => self.toggle_view(),
            _ => {}
        }
        false
    }

    fn handle_loans_key(&mut self, key: KeyEvent) -> bool {
        self.status = None;
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return true,
            KeyCode::Down => {
                self.loans_cursor = self.loans_cursor.saturating_add(1);
            }
            KeyCode::Up => {
                self.loans_cursor = self.loans_cursor.saturating_sub(1);
            }
            KeyCode::Enter | KeyCode::Char('l') => {
                let Some(book) = self.ctx.catalog().books().get(self.loans_cursor) else {
                    return false;
                };
                if self.ctx.is_loaned(&book.isbn13) {
                    self.status = Some(format!("\"{}\" is already on loan.", book.title));
                } else {
                    self.loan_form.open_for(book);
                }
            }
            KeyCode::Tab => self.toggle_view(),
            _ => {}
        }
        false
    }

    fn handle_details_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('b') => self.close_details(),
            _ => {}
        }
        false
    }

    fn handle_book_form_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                if self.book_form.mode == FormMode::Edit {
                    self.ctx.cancel_edit();
                }
                self.book_form.close();
            }
            KeyCode::Enter => self.submit_book_form(),
            KeyCode::Tab | KeyCode::Down => self.book_form.next_field(),
            KeyCode::BackTab | KeyCode::Up => self.book_form.prev_field(),
            KeyCode::Backspace => self.book_form.pop_char(),
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.book_form.clear_field();
            }
            KeyCode::Char(ch) => {
                if !ch.is_control() {
                    self.book_form.push_char(ch);
                }
            }
            _ => {}
        }
    }

    fn handle_loan_form_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.loan_form.close(),
            KeyCode::Enter => self.submit_loan_form(),
            KeyCode::Tab | KeyCode::Down => self.loan_form.next_field(),
            KeyCode::BackTab | KeyCode::Up => self.loan_form.prev_field(),
            KeyCode::Backspace => self.loan_form.pop_char(),
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.loan_form.clear_field();
            }
            KeyCode::Char(ch) => {
                if !ch.is_control() {
                    self.loan_form.push_char(ch);
                }
            }
            _ => {}
        }
    }

    fn submit_book_form(&mut self) {
        let book = self.book_form.to_book();
        let mode = self.book_form.mode;
        let result = match mode {
            FormMode::Add => self.ctx.add_book(book),
            FormMode::Edit => self.ctx.submit_edit(book),
        };
        match result {
            Ok(()) => {
                self.status = Some(match mode {
                    FormMode::Add => "Book added.".to_string(),
                    FormMode::Edit => "Book updated.".to_string(),
                });
                self.book_form.close();
            }
            Err(err) => {
                if mode == FormMode::Edit && !self.ctx.focus().is_editing() {
                    self.status = Some(err.to_string());
                    self.book_form.close();
                } else {
                    self.book_form.error = Some(err.to_string());
                }
            }
        }
    }

    fn submit_loan_form(&mut self) {
        let loan = self.loan_form.to_loan();
        match self.ctx.loan_book(loan) {
            Ok(()) => {
                self.status = Some(format!("Loaned \"{}\".", self.loan_form.title));
                self.loan_form.close();
            }
            Err(err) => {
                self.loan_form.error = Some(err.to_string());
            }
        }
    }

    fn cursor_isbn(&self) -> Option<String> {
        self.ctx
            .visible_books()
            .get(self.catalog_cursor)
            .map(|book| book.isbn13.clone())
    }

    fn open_details_at_cursor(&mut self) {
        let Some(isbn) = self.cursor_isbn() else {
            return;
        };
        let Some(opened) = self.ctx.open_details(&isbn) else {
            return;
        };
        self.apply_chrome(opened.notice);

        let Some(ticket) = opened.lookup else {
            return;
        };
        let Some(book) = self.ctx.detailed_book().cloned() else {
            return;
        };
        match self.lookup.as_mut() {
            Some(worker) => worker.submit(ticket, book),
            None => {
                self.ctx
                    .apply_lookup(ticket, Err("lookup worker unavailable".to_string()));
            }
        }
    }

    fn close_details(&mut self) {
        if let Some(worker) = self.lookup.as_mut() {
            worker.cancel();
        }
        if let Some(notice) = self.ctx.close_details() {
            self.apply_chrome(notice);
        }
    }

    fn apply_chrome(&mut self, notice: ChromeNotice) {
        tracing::debug!(?notice, "chrome notice");
        self.navigation_hidden = notice == ChromeNotice::HideNavigation;
    }

    fn request_edit(&mut self) {
        if self.ctx.focus().selected_isbn().is_none() {
            self.status = Some("Select a book first (Space).".to_string());
            return;
        }
        if !self.ctx.request_edit() {
            self.status = Some("Cannot edit a book that is on loan.".to_string());
            return;
        }
        if let Some(book) = self.ctx.selected_book() {
            self.book_form.open_edit(book);
        }
    }

    fn request_delete(&mut self) {
        let Some(title) = self.ctx.selected_book().map(|book| book.title.clone()) else {
            self.status = Some("Select a book first (Space).".to_string());
            return;
        };
        if self.ctx.request_delete() {
            self.status = Some(format!("Deleted \"{title}\"."));
        } else {
            self.status = Some("Cannot delete a book that is on loan.".to_string());
        }
    }

    fn toggle_view(&mut self) {
        if self.navigation_hidden || self.ctx.toggle_view().is_none() {
            return;
        }
        self.catalog_cursor = 0;
        self.loans_cursor = 0;
    }

    fn clamp_cursors(&mut self) {
        let visible = self.ctx.visible_books().len();
        self.catalog_cursor = self.catalog_cursor.min(visible.saturating_sub(1));
        let total = self.ctx.catalog().len();
        self.loans_cursor = self.loans_cursor.min(total.saturating_sub(1));
    }

    fn accent_color(&self) -> Color {
        match self.ctx.active_view() {
            ActiveView::Catalog => Color::Yellow,
            ActiveView::Loans => Color::Cyan,
        }
    }

    fn main_header_lines(&self) -> Vec<Line<'static>> {
        let section = match (self.ctx.focus(), self.ctx.active_view()) {
            (Focus::Details(_), _) => "book details",
            (_, ActiveView::Catalog) => "catalog",
            (_, ActiveView::Loans) => "loan management",
        };
        let mut title = vec![
            Span::styled("Book Catalog", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!(" — {section}")),
        ];
        if !self.navigation_hidden {
            let target = match self.ctx.active_view() {
                ActiveView::Catalog => "Go to Loan Management",
                ActiveView::Loans => "Go to Book Catalog",
            };
            title.push(Span::raw("   "));
            title.push(Span::styled("Tab", Style::default().add_modifier(Modifier::BOLD)));
            title.push(Span::raw(format!(" {target}")));
        }

        let mut lines = vec![Line::from(title)];
        if let Some(status) = &self.status {
            lines.push(Line::from(Span::styled(
                status.clone(),
                Style::default().fg(self.accent_color()),
            )));
        } else if let Some(filter) = self.ctx.author_filter() {
            lines.push(Line::raw(format!("Author: {filter}")));
        }
        lines
    }

    fn main_footer_lines(&self) -> Vec<Line<'static>> {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        if self.book_form.open || self.loan_form.open {
            return vec![Line::from(vec![
                Span::styled("Esc", bold),
                Span::raw(" cancel  "),
                Span::styled("Tab/↑/↓", bold),
                Span::raw(" field  "),
                Span::styled("Enter", bold),
                Span::raw(" save  "),
                Span::styled("Ctrl+u", bold),
                Span::raw(" clear"),
            ])];
        }

        if matches!(self.ctx.focus(), Focus::Details(_)) {
            return vec![Line::from(vec![
                Span::styled("Esc", bold),
                Span::raw(" back to catalog  "),
                Span::styled("q", bold),
                Span::raw(" quit"),
            ])];
        }

        match self.ctx.active_view() {
            ActiveView::Catalog => {
                let locked = self.ctx.selected_is_loaned();
                let guarded = if locked {
                    Style::default().fg(Color::DarkGray)
                } else {
                    bold
                };
                vec![
                    Line::from(vec![
                        Span::styled("q", bold),
                        Span::raw(" quit  "),
                        Span::styled("↑/↓", bold),
                        Span::raw(" move  "),
                        Span::styled("Space", bold),
                        Span::raw(" select  "),
                        Span::styled("Enter", bold),
                        Span::raw(" details"),
                    ]),
                    Line::from(vec![
                        Span::styled("a", bold),
                        Span::raw(" add  "),
                        Span::styled("e", guarded),
                        Span::raw(" edit  "),
                        Span::styled("d", guarded),
                        Span::raw(" delete  "),
                        Span::styled("f/F", bold),
                        Span::raw(" author filter"),
                    ]),
                ]
            }
            ActiveView::Loans => vec![Line::from(vec![
                Span::styled("q", bold),
                Span::raw(" quit  "),
                Span::styled("↑/↓", bold),
                Span::raw(" move  "),
                Span::styled("Enter", bold),
                Span::raw(" loan book"),
            ])],
        }
    }

    fn draw(&mut self, area: Rect, frame: &mut ratatui::Frame) {
        frame.render_widget(Clear, area);
        self.clamp_cursors();

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ])
            .split(area);

        let title = Paragraph::new(Text::from(self.main_header_lines()))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::BOTTOM));
        frame.render_widget(title, layout[0]);

        if matches!(self.ctx.focus(), Focus::Details(_)) {
            self.draw_details_view(frame, layout[1]);
        } else {
            match self.ctx.active_view() {
                ActiveView::Catalog => self.draw_catalog(frame, layout[1]),
                ActiveView::Loans => self.draw_loans(frame, layout[1]),
            }
        }

        let footer = Paragraph::new(Text::from(self.main_footer_lines()))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::TOP));
        frame.render_widget(footer, layout[2]);

        if self.book_form.open {
            self.draw_book_form(area, frame);
        }

        if self.loan_form.open {
            self.draw_loan_form(area, frame);
        }
    }

    fn draw_catalog(&self, frame: &mut ratatui::Frame, area: Rect) {
        let body_layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(area);

        let visible = self.ctx.visible_books();
        let title = match self.ctx.author_filter() {
            Some(author) => format!(
                "Books by {author} — {}/{}",
                visible.len(),
                self.ctx.catalog().len()
            ),
            None => format!("Books — {}", self.ctx.catalog().len()),
        };
        let block = Block::default().borders(Borders::ALL).title(title);

        if visible.is_empty() {
            let message = if self.ctx.catalog().is_empty() {
                "The catalog is empty. Press a to add a book."
            } else {
                "No books match the author filter."
            };
            let paragraph = Paragraph::new(message)
                .block(block)
                .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, body_layout[0]);
        } else {
            let loaned = self.ctx.loans().loaned_index();
            let selected = self.ctx.focus().selected_isbn();
            let max_width = body_layout[0].width.saturating_sub(6) as usize;
            let items: Vec<ListItem> = visible
                .iter()
                .map(|book| {
                    let marker = if selected == Some(book.isbn13.as_str()) {
                        "●"
                    } else {
                        " "
                    };
                    let by = book
                        .author_name()
                        .map(|author| format!(" — {author}"))
                        .unwrap_or_default();
                    let label = truncate_to_width(
                        &format!("{marker} {}{by}", book.title),
                        max_width.saturating_sub(10).max(8),
                    );
                    let mut spans = vec![Span::raw(label)];
                    if loaned.contains(&book.isbn13) {
                        spans.push(Span::styled(
                            " ON LOAN",
                            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                        ));
                    }
                    ListItem::new(Line::from(spans))
                })
                .collect();

            let highlight_style = Style::default()
                .fg(Color::Black)
                .bg(self.accent_color())
                .add_modifier(Modifier::BOLD);

            let list = List::new(items)
                .block(block)
                .highlight_style(highlight_style)
                .highlight_symbol("> ")
                .highlight_spacing(HighlightSpacing::Always);

            let mut state = ListState::default();
            state.select(Some(self.catalog_cursor));
            frame.render_stateful_widget(list, body_layout[0], &mut state);
        }

        frame.render_widget(self.draw_selection_panel(), body_layout[1]);
    }

    fn draw_selection_panel(&self) -> Paragraph<'static> {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let mut lines = Vec::new();
        let authors = self.ctx.unique_authors();
        let filter = self.ctx.author_filter().unwrap_or("all");
        lines.push(Line::from(vec![
            Span::styled("Author filter: ", bold),
            Span::raw(format!("{filter} ({} authors)", authors.len())),
        ]));
        lines.push(Line::raw(""));

        match self.ctx.selected_book() {
            Some(book) => {
                lines.push(Line::from(vec![
                    Span::styled("Selected: ", bold),
                    Span::raw(book.title.clone()),
                ]));
                lines.push(Line::raw(format!("ISBN-13: {}", book.isbn13)));
                lines.push(Line::raw(format!(
                    "Author: {}",
                    book.author_name().unwrap_or("-")
                )));
                lines.push(Line::raw(""));
                if self.ctx.is_loaned(&book.isbn13) {
                    lines.push(Line::from(Span::styled(
                        "On loan: editing and deleting are disabled.",
                        Style::default().fg(Color::Red),
                    )));
                    lines.extend(self.describe_loans(&book.isbn13).into_iter().map(Line::raw));
                } else {
                    lines.push(Line::raw("Available: e to edit, d to delete."));
                }
            }
            None => lines.push(Line::raw("No selection.")),
        }

        Paragraph::new(Text::from(lines))
            .block(Block::default().borders(Borders::ALL).title("Selection"))
            .wrap(Wrap { trim: true })
    }

    fn describe_loans(&self, isbn13: &str) -> Vec<String> {
        self.ctx
            .loans()
            .for_isbn(isbn13)
            .map(|loan| {
                let borrower = loan.borrower.as_deref().unwrap_or("unknown borrower");
                match &loan.due_date {
                    Some(due) => format!("Lent to {borrower}, due {due}"),
                    None => format!("Lent to {borrower}"),
                }
            })
            .collect()
    }

    fn draw_details_view(&self, frame: &mut ratatui::Frame, area: Rect) {
        let Some(book) = self.ctx.detailed_book() else {
            return;
        };
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(11), Constraint::Min(0)])
            .split(area);

        let bold = Style::default().add_modifier(Modifier::BOLD);
        let field = |label: &str, value: Option<String>| {
            Line::from(vec![
                Span::styled(format!("{label}: "), bold),
                Span::raw(value.unwrap_or_else(|| "N/A".to_string())),
            ])
        };
        let mut lines = vec![
            Line::from(Span::styled(book.title.clone(), bold)),
            Line::raw(""),
            field("Author", book.author_name().map(str::to_string)),
            field("Publisher", book.publisher.clone()),
            field("Publication Year", book.publication_year.clone()),
            field("Page Count", book.pages.as_ref().map(|p| p.to_string())),
            field("Language", book.language.clone()),
            field("ISBN-13", Some(book.isbn13.clone())),
        ];
        if let Some(image) = &book.image {
            lines.push(field("Cover", Some(image.clone())));
        }
        let info = Paragraph::new(Text::from(lines))
            .block(Block::default().borders(Borders::ALL).title("Details"))
            .wrap(Wrap { trim: true });
        frame.render_widget(info, sections[0]);

        let block = Block::default().borders(Borders::ALL).title("Similar Books");
        let message = match self.ctx.similar_books() {
            SimilarBooks::Idle | SimilarBooks::Loading { .. } => {
                Some(Line::raw("Loading similar books..."))
            }
            SimilarBooks::Disabled => Some(Line::raw("Similar book suggestions are turned off.")),
            SimilarBooks::Failed { message, .. } => Some(Line::from(Span::styled(
                message.clone(),
                Style::default().fg(Color::Red),
            ))),
            SimilarBooks::Loaded { books, .. } if books.is_empty() => Some(Line::raw(
                "No similar books found matching the search query.",
            )),
            SimilarBooks::Loaded { .. } => None,
        };

        if let Some(message) = message {
            let paragraph = Paragraph::new(message)
                .block(block)
                .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, sections[1]);
            return;
        }

        let max_width = sections[1].width.saturating_sub(4) as usize;
        let items: Vec<ListItem> = self
            .ctx
            .similar_books()
            .books()
            .iter()
            .map(|similar| {
                let mut lines = vec![Line::from(vec![
                    Span::styled(truncate_to_width(&similar.title, max_width), bold),
                    Span::raw(format!("  {}", similar.price)),
                ])];
                if !similar.url.is_empty() {
                    lines.push(Line::raw(truncate_to_width(&similar.url, max_width)));
                }
                ListItem::new(Text::from(lines))
            })
            .collect();
        frame.render_widget(List::new(items).block(block), sections[1]);
    }

    fn draw_loans(&self, frame: &mut ratatui::Frame, area: Rect) {
        let body_layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);

        let loaned = self.ctx.loans().loaned_index();
        let books = self.ctx.catalog().books();
        let available = self.ctx.available_books().len();
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("Books — {available} available"));

        if books.is_empty() {
            let paragraph = Paragraph::new("No books in the catalog yet.")
                .block(block)
                .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, body_layout[0]);
        } else {
            let max_width = body_layout[0].width.saturating_sub(16) as usize;
            let items: Vec<ListItem> = books
                .iter()
                .map(|book| {
                    let status = if loaned.contains(&book.isbn13) {
                        Span::styled("on loan  ", Style::default().fg(Color::Red))
                    } else {
                        Span::styled("available", Style::default().fg(Color::Green))
                    };
                    ListItem::new(Line::from(vec![
                        status,
                        Span::raw(" "),
                        Span::raw(truncate_to_width(&book.title, max_width.max(8))),
                    ]))
                })
                .collect();
            let list = List::new(items)
                .block(block)
                .highlight_style(
                    Style::default()
                        .fg(Color::Black)
                        .bg(self.accent_color())
                        .add_modifier(Modifier::BOLD),
                )
                .highlight_symbol("> ")
                .highlight_spacing(HighlightSpacing::Always);
            let mut state = ListState::default();
            state.select(Some(self.loans_cursor));
            frame.render_stateful_widget(list, body_layout[0], &mut state);
        }

        let loans = self.ctx.loans().loans();
        let mut lines = Vec::new();
        if loans.is_empty() {
            lines.push(Line::raw("No active loans."));
        }
        for loan in loans {
            let title = self
                .ctx
                .catalog()
                .get(&loan.isbn13)
                .map(|book| book.title.clone())
                .unwrap_or_else(|| loan.isbn13.clone());
            let mut spans = vec![Span::styled(
                title,
                Style::default().add_modifier(Modifier::BOLD),
            )];
            if let Some(borrower) = &loan.borrower {
                spans.push(Span::raw(format!(" → {borrower}")));
            }
            if let Some(due) = &loan.due_date {
                spans.push(Span::raw(format!(" (due {due})")));
            }
            lines.push(Line::from(spans));
        }
        let paragraph = Paragraph::new(Text::from(lines))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Loans — {}", loans.len())),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, body_layout[1]);
    }

    fn draw_book_form(&self, area: Rect, frame: &mut ratatui::Frame) {
        let popup_area = centered_rect(70, 60, area);
        frame.render_widget(Clear, popup_area);

        let title = match self.book_form.mode {
            FormMode::Add => "Add Book",
            FormMode::Edit => "Edit Book",
        };
        let lines = form_lines(
            self.book_form.rows(),
            self.book_form.field,
            self.book_form.error.as_deref(),
        );
        let paragraph = Paragraph::new(Text::from(lines))
            .block(Block::default().borders(Borders::ALL).title(Span::styled(
                title,
                Style::default().add_modifier(Modifier::BOLD),
            )))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, popup_area);
    }

    fn draw_loan_form(&self, area: Rect, frame: &mut ratatui::Frame) {
        let popup_area = centered_rect(60, 40, area);
        frame.render_widget(Clear, popup_area);

        let mut lines = vec![
            Line::raw(format!("Book: {}", self.loan_form.title)),
            Line::raw(""),
        ];
        lines.extend(form_lines(
            self.loan_form.rows(),
            self.loan_form.field,
            self.loan_form.error.as_deref(),
        ));
        let paragraph = Paragraph::new(Text::from(lines))
            .block(Block::default().borders(Borders::ALL).title(Span::styled(
                "Loan Book",
                Style::default().add_modifier(Modifier::BOLD),
            )))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, popup_area);
    }
}

fn form_lines(
    rows: Vec<(&'static str, String, bool)>,
    current: usize,
    error: Option<&str>,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (idx, (label, value, editable)) in rows.into_iter().enumerate() {
        let focused = idx == current;
        let label_style = if focused {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        };
        let value_style = if editable {
            Style::default()
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let mut spans = vec![
            Span::styled(format!("{label:>16}"), label_style),
            Span::raw(": "),
            Span::styled(value, value_style),
        ];
        if focused && editable {
            spans.push(Span::styled("▏", Style::default().fg(Color::Cyan)));
        }
        lines.push(Line::from(spans));
    }
    if let Some(error) = error {
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(Color::Red),
        )));
    }
    lines
}

fn setup_terminal() -> anyhow::Result<Terminal<CrosstermBackend<Stdout>>> {
    terminal::enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen).context("enter alt screen")?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("create terminal")
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    terminal::disable_raw_mode().context("disable raw mode")?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("leave alt screen")?;
    Ok(())
}

fn panic_to_string(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic: (unknown payload)".to_string()
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn truncate_to_width(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    if max_width == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > max_width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}
