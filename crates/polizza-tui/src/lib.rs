// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use polizza_app::{
    AppCommand, AppMode, AppState, Claim, ColumnSort, EditHandle, EditScope, FieldError, FormKind,
    FormPayload, Invoice, InvoiceTabPrefs, NavDecision, PageEvent, PageParams, PageQuery, Policy,
    Product, SearchBody, SortDirection, SortEvent, SortFilterParams, TabKind, ValidationErrors,
    physical_sort_field,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::Date;
use time::macros::format_description;

const STATUS_CLEAR_SECS: u64 = 4;
const SEARCH_DEBOUNCE_MS: u64 = 300;
const MAIN_TAB_GROUP: &str = "main-tabs";
const DETAIL_TAB_GROUP: &str = "detail-tabs";
const FILTER_MARK: &str = "▼";

const TYPE_FILTER_CYCLE: [&str; 5] = ["all", "medical", "life", "accident", "property"];
const DETAIL_TABS: [&str; 2] = ["overview", "audit"];

/// Pagination metadata echoed by every search response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageInfo {
    pub current_page: i64,
    pub per_page: i64,
    pub total: i64,
}

impl PageInfo {
    pub fn total_pages(&self) -> i64 {
        if self.per_page <= 0 {
            return 0;
        }
        (self.total + self.per_page - 1) / self.per_page
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TabRows {
    Policies(Vec<Policy>),
    Claims(Vec<Claim>),
    Invoices(Vec<Invoice>),
    Products(Vec<Product>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TabPage {
    pub rows: TabRows,
    pub info: PageInfo,
}

impl TabPage {
    pub fn row_count(&self) -> usize {
        match &self.rows {
            TabRows::Policies(rows) => rows.len(),
            TabRows::Claims(rows) => rows.len(),
            TabRows::Invoices(rows) => rows.len(),
            TabRows::Products(rows) => rows.len(),
        }
    }

    pub fn row_id(&self, index: usize) -> Option<i64> {
        match &self.rows {
            TabRows::Policies(rows) => rows.get(index).map(|row| row.id.get()),
            TabRows::Claims(rows) => rows.get(index).map(|row| row.id.get()),
            TabRows::Invoices(rows) => rows.get(index).map(|row| row.id.get()),
            TabRows::Products(rows) => rows.get(index).map(|row| row.id.get()),
        }
    }
}

/// Everything the UI needs from the backend. One blocking call at a time;
/// in-flight requests are not sequenced or cancelled.
pub trait AppRuntime {
    fn search_tab(&mut self, tab: TabKind, page: &PageQuery, body: &SearchBody) -> Result<TabPage>;
    fn submit_create(&mut self, payload: &FormPayload) -> Result<()>;
    fn submit_update(&mut self, tab: TabKind, row_id: i64, payload: &FormPayload) -> Result<()>;
}

const POLICY_COLUMNS: [&str; 9] = [
    "id", "number", "customer", "product", "status", "effective", "expiry", "premium", "insured",
];
const POLICY_FIELDS: [&str; 9] = [
    "id",
    "policy_number",
    "customer_name",
    "product_name",
    "status",
    "effective_date",
    "expiry_date",
    "premium_cents",
    "insured_amount_cents",
];
const CLAIM_COLUMNS: [&str; 9] = [
    "id",
    "number",
    "policy",
    "status",
    "incident",
    "filed",
    "claimed",
    "approved",
    "description",
];
const CLAIM_FIELDS: [&str; 9] = [
    "id",
    "claim_number",
    "policy_number",
    "status",
    "incident_date",
    "filed_date",
    "claimed_cents",
    "approved_cents",
    "description",
];
const INVOICE_COLUMNS: [&str; 8] = [
    "id", "number", "policy", "status", "issued", "due", "amount", "paid",
];
const INVOICE_FIELDS: [&str; 8] = [
    "id",
    "invoice_number",
    "policy_number",
    "status",
    "issued_date",
    "due_date",
    "amount_cents",
    "paid_date",
];
const PRODUCT_COLUMNS: [&str; 9] = [
    "id", "name", "code", "type", "scopes", "min days", "max days", "premium", "active",
];
const PRODUCT_FIELDS: [&str; 9] = [
    "id",
    "name",
    "code",
    "type",
    "scopes",
    "min_days",
    "max_days",
    "premium_cents",
    "active",
];

fn tab_columns(rows: &TabRows) -> (&'static [&'static str], &'static [&'static str]) {
    match rows {
        TabRows::Policies(_) => (&POLICY_COLUMNS, &POLICY_FIELDS),
        TabRows::Claims(_) => (&CLAIM_COLUMNS, &CLAIM_FIELDS),
        TabRows::Invoices(_) => (&INVOICE_COLUMNS, &INVOICE_FIELDS),
        TabRows::Products(_) => (&PRODUCT_COLUMNS, &PRODUCT_FIELDS),
    }
}

fn project_rows(page: &TabPage) -> Vec<Vec<String>> {
    match &page.rows {
        TabRows::Policies(rows) => rows
            .iter()
            .map(|row| {
                vec![
                    row.id.get().to_string(),
                    row.policy_number.clone(),
                    row.customer_name.clone(),
                    row.product_name.clone(),
                    row.status.as_str().to_owned(),
                    row.effective_date.to_string(),
                    format_optional_date(row.expiry_date),
                    format_cents(row.premium_cents),
                    format_cents(row.insured_amount_cents),
                ]
            })
            .collect(),
        TabRows::Claims(rows) => rows
            .iter()
            .map(|row| {
                vec![
                    row.id.get().to_string(),
                    row.claim_number.clone(),
                    row.policy_number.clone(),
                    row.status.as_str().to_owned(),
                    row.incident_date.to_string(),
                    row.filed_date.to_string(),
                    format_cents(row.claimed_cents),
                    row.approved_cents.map(format_cents).unwrap_or_default(),
                    row.description.clone(),
                ]
            })
            .collect(),
        TabRows::Invoices(rows) => rows
            .iter()
            .map(|row| {
                vec![
                    row.id.get().to_string(),
                    row.invoice_number.clone(),
                    row.policy_number.clone(),
                    row.status.as_str().to_owned(),
                    row.issued_date.to_string(),
                    row.due_date.to_string(),
                    format_cents(row.amount_cents),
                    format_optional_date(row.paid_date),
                ]
            })
            .collect(),
        TabRows::Products(rows) => rows
            .iter()
            .map(|row| {
                vec![
                    row.id.get().to_string(),
                    row.name.clone(),
                    row.code.clone(),
                    row.product_type.as_str().to_owned(),
                    row.scopes.join(", "),
                    row.min_days.map(|days| days.to_string()).unwrap_or_default(),
                    row.max_days.map(|days| days.to_string()).unwrap_or_default(),
                    format_cents(row.premium_cents),
                    if row.active { "yes" } else { "no" }.to_owned(),
                ]
            })
            .collect(),
    }
}

fn format_optional_date(date: Option<Date>) -> String {
    date.map(|value| value.to_string()).unwrap_or_default()
}

fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let dollars = cents / 100;
    let remainder = cents % 100;
    format!("{sign}${}.{remainder:02}", comma_format(dollars))
}

fn comma_format(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Default)]
struct TableUiState {
    tab: Option<TabKind>,
    selected_row: usize,
    selected_col: usize,
    hidden_columns: BTreeSet<usize>,
    page: PageParams,
    sort_filters: SortFilterParams,
    // Ordered multi-sort accumulation: (logical field, ascending).
    multi_sort: Vec<(&'static str, bool)>,
    type_filter_index: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct SearchUiState {
    visible: bool,
    input: String,
    token: u64,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct DetailUiState {
    visible: bool,
    row_id: Option<i64>,
    editor_id: String,
    editing: bool,
    nested_tab: usize,
    draft_status: Option<String>,
    field_errors: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FormFieldSpec {
    label: &'static str,
    key: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
struct FormUiState {
    kind: FormKind,
    inputs: Vec<String>,
    cursor: usize,
    field_errors: BTreeMap<String, String>,
}

impl FormUiState {
    fn blank(kind: FormKind) -> Self {
        Self {
            kind,
            inputs: vec![String::new(); form_field_specs(kind).len()],
            cursor: 0,
            field_errors: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NavIntent {
    Rotate(isize),
    GoTo(TabKind),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
    SearchDebounce { token: u64 },
    CancelEditRequested { skip: bool },
    EditDiscarded,
    RequestQuit,
}

#[derive(Default)]
struct ViewData {
    table: TableUiState,
    page_data: Option<TabPage>,
    search: SearchUiState,
    detail: DetailUiState,
    form: Option<FormUiState>,
    invoice_memory: InvoiceTabPrefs,
    loading: bool,
    help_visible: bool,
    status_token: u64,
    pending_nav: Option<NavIntent>,
    should_quit: bool,
}

pub fn run_app<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    invoice_prefs: &mut InvoiceTabPrefs,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let scope = EditScope::provide();
    let edit = scope.handle();
    edit.register_nested_group(DETAIL_TAB_GROUP)?;

    let mut view_data = ViewData {
        invoice_memory: invoice_prefs.clone(),
        ..ViewData::default()
    };
    let (internal_tx, internal_rx) = mpsc::channel();

    refresh_for_tab(state, runtime, &mut view_data, &internal_tx);

    let mut result = Ok(());
    loop {
        if let Err(error) = process_internal_events(
            state,
            runtime,
            &mut view_data,
            &edit,
            &internal_tx,
            &internal_rx,
        ) {
            result = Err(error);
            break;
        }
        if view_data.should_quit {
            break;
        }

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data, &edit)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    match handle_key_event(state, runtime, &mut view_data, &edit, &internal_tx, key)
                    {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(error) => {
                            result = Err(error);
                            break;
                        }
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    capture_invoice_memory(&mut view_data);
    *invoice_prefs = view_data.invoice_memory.clone();

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    edit: &EditHandle,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) -> Result<()> {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::SearchDebounce { token } => {
                if token == view_data.search.token {
                    apply_search(state, runtime, view_data, tx);
                }
            }
            InternalEvent::CancelEditRequested { skip } => {
                if skip {
                    finish_edit_cleanup(state, runtime, view_data, edit, tx)?;
                } else {
                    let sender = tx.clone();
                    edit.handle_unsaved_changes(move || {
                        let _ = sender.send(InternalEvent::EditDiscarded);
                    })?;
                }
            }
            InternalEvent::EditDiscarded => {
                finish_edit_cleanup(state, runtime, view_data, edit, tx)?;
            }
            InternalEvent::RequestQuit => {
                view_data.should_quit = true;
            }
        }
    }
    Ok(())
}

/// Leaves edit mode, releases the edit slot, and replays any tab switch
/// that was parked behind the discard prompt.
fn finish_edit_cleanup<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    edit: &EditHandle,
    tx: &Sender<InternalEvent>,
) -> Result<()> {
    view_data.detail.editing = false;
    view_data.detail.draft_status = None;
    view_data.detail.field_errors.clear();
    edit.clear_active()?;
    if state.mode == AppMode::Edit {
        state.dispatch(AppCommand::ExitToNav);
    }

    if let Some(intent) = view_data.pending_nav.take() {
        close_detail(view_data, edit)?;
        apply_nav(state, runtime, view_data, tx, intent);
    }
    Ok(())
}

fn apply_nav<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    intent: NavIntent,
) {
    match intent {
        NavIntent::Rotate(delta) if delta > 0 => {
            state.dispatch(AppCommand::NextTab);
        }
        NavIntent::Rotate(_) => {
            state.dispatch(AppCommand::PrevTab);
        }
        NavIntent::GoTo(tab) => {
            state.dispatch(AppCommand::GoToTab(tab));
        }
    }
    refresh_for_tab(state, runtime, view_data, tx);
}

fn capture_invoice_memory(view_data: &mut ViewData) {
    if view_data.table.tab == Some(TabKind::Invoices) {
        view_data.invoice_memory = InvoiceTabPrefs {
            limit: view_data.table.page.limit,
            sort_filters: view_data.table.sort_filters.clone(),
        };
    }
}

/// Rebuilds per-tab view state after the active tab changed. Invoice view
/// preferences survive the round trip; every other tab starts fresh.
fn refresh_for_tab<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) {
    let tab = state.active_tab;
    if view_data.table.tab != Some(tab) {
        capture_invoice_memory(view_data);
        view_data.table = TableUiState {
            tab: Some(tab),
            ..TableUiState::default()
        };
        if tab == TabKind::Invoices {
            view_data.table.page.limit = view_data.invoice_memory.limit;
            view_data.table.sort_filters = view_data.invoice_memory.sort_filters.clone();
        }
        view_data.search = SearchUiState {
            visible: false,
            input: view_data.table.sort_filters.search.clone(),
            token: view_data.search.token,
        };
    }
    fetch_active_tab(state, runtime, view_data, tx);
}

/// The loading/error wrapper every list fetch goes through: set loading,
/// run the request, clear loading, surface the error as a status toast.
fn fetch_active_tab<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) {
    let tab = state.active_tab;
    if tab.entity_path().is_none() {
        view_data.page_data = None;
        return;
    }

    let query = view_data.table.page.page_query();
    let body = view_data.table.sort_filters.search_body();

    view_data.loading = true;
    let result = runtime.search_tab(tab, &query, &body);
    view_data.loading = false;

    match result {
        Ok(page) => {
            view_data.table.selected_row = view_data
                .table
                .selected_row
                .min(page.row_count().saturating_sub(1));
            view_data.page_data = Some(page);
        }
        Err(error) => {
            view_data.page_data = None;
            emit_status(state, view_data, tx, format!("load failed: {error}"));
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(STATUS_CLEAR_SECS));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn schedule_search_debounce(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(SEARCH_DEBOUNCE_MS));
        let _ = sender.send(InternalEvent::SearchDebounce { token });
    });
}

/// A search-text change invalidates the current page before refetching.
fn apply_search<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) {
    let text = view_data.search.input.clone();
    if view_data.table.sort_filters.search == text {
        return;
    }
    view_data.table.page.reset_page();
    view_data.table.sort_filters.update_search(text);
    fetch_active_tab(state, runtime, view_data, tx);
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    edit: &EditHandle,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> Result<bool> {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Ok(true);
    }

    if view_data.help_visible {
        if key.code == KeyCode::Esc || key.code == KeyCode::Char('?') {
            view_data.help_visible = false;
        }
        return Ok(false);
    }

    if edit.discard_dialog_visible()? {
        handle_discard_dialog_key(view_data, edit, key)?;
        return Ok(false);
    }

    if view_data.search.visible {
        handle_search_key(state, runtime, view_data, internal_tx, key);
        return Ok(false);
    }

    if view_data.form.is_some() {
        handle_form_key(state, runtime, view_data, internal_tx, key);
        return Ok(false);
    }

    if view_data.detail.visible {
        return handle_detail_key(state, runtime, view_data, edit, internal_tx, key);
    }

    handle_table_key(state, runtime, view_data, edit, internal_tx, key)
}

fn handle_discard_dialog_key(
    view_data: &mut ViewData,
    edit: &EditHandle,
    key: KeyEvent,
) -> Result<()> {
    match key.code {
        KeyCode::Char('y') | KeyCode::Enter => edit.confirm_discard()?,
        KeyCode::Char('n') | KeyCode::Esc => {
            view_data.pending_nav = None;
            edit.cancel_discard()?;
        }
        _ => {}
    }
    Ok(())
}

fn handle_search_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => {
            view_data.search.visible = false;
        }
        KeyCode::Enter => {
            view_data.search.visible = false;
            view_data.search.token = view_data.search.token.wrapping_add(1);
            apply_search(state, runtime, view_data, internal_tx);
        }
        KeyCode::Backspace => {
            view_data.search.input.pop();
            bump_search_debounce(view_data, internal_tx);
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            view_data.search.input.push(ch);
            bump_search_debounce(view_data, internal_tx);
        }
        _ => {}
    }
}

/// Every keystroke restarts the debounce window; only the newest token is
/// honored when its timer fires.
fn bump_search_debounce(view_data: &mut ViewData, internal_tx: &Sender<InternalEvent>) {
    view_data.search.token = view_data.search.token.wrapping_add(1);
    schedule_search_debounce(internal_tx, view_data.search.token);
}

fn handle_form_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(form) = view_data.form.as_mut() else {
        return;
    };
    let field_count = form_field_specs(form.kind).len();

    match key.code {
        KeyCode::Esc => {
            view_data.form = None;
            state.dispatch(AppCommand::ExitToNav);
        }
        KeyCode::Down | KeyCode::Tab => {
            form.cursor = (form.cursor + 1) % field_count;
        }
        KeyCode::Up => {
            form.cursor = form.cursor.checked_sub(1).unwrap_or(field_count - 1);
        }
        KeyCode::Backspace => {
            form.inputs[form.cursor].pop();
        }
        KeyCode::Enter => submit_form(state, runtime, view_data, internal_tx),
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            form.inputs[form.cursor].push(ch);
        }
        _ => {}
    }
}

fn submit_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let (kind, inputs) = match view_data.form.as_mut() {
        Some(form) => {
            form.field_errors.clear();
            (form.kind, form.inputs.clone())
        }
        None => return,
    };

    let parsed = payload_from_inputs(kind, &inputs).and_then(|payload| {
        payload.validate()?;
        Ok(payload)
    });
    let payload = match parsed {
        Ok(payload) => payload,
        Err(error) => {
            if let Some(form) = view_data.form.as_mut() {
                form.field_errors
                    .insert(error.field.to_owned(), error.message);
            }
            return;
        }
    };

    view_data.loading = true;
    let result = runtime.submit_create(&payload);
    view_data.loading = false;

    match result {
        Ok(()) => {
            view_data.form = None;
            state.dispatch(AppCommand::ExitToNav);
            emit_status(state, view_data, internal_tx, "created");
            fetch_active_tab(state, runtime, view_data, internal_tx);
        }
        Err(error) => {
            let mut mapped = BTreeMap::new();
            if apply_submit_error(&mut mapped, &error) {
                if let Some(form) = view_data.form.as_mut() {
                    form.field_errors = mapped;
                }
            } else {
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    format!("create failed: {error}"),
                );
            }
        }
    }
}

/// Maps a failed submit onto per-field messages when the error is one of
/// the two validation shapes; anything else stays a generic toast.
fn apply_submit_error(errors: &mut BTreeMap<String, String>, error: &anyhow::Error) -> bool {
    if let Some(validation) = error.downcast_ref::<ValidationErrors>() {
        for (field, messages) in &validation.errors {
            if let Some(message) = messages.first() {
                errors.insert(field.clone(), message.clone());
            }
        }
        return true;
    }
    if let Some(field_error) = error.downcast_ref::<FieldError>() {
        errors.insert(field_error.field.to_owned(), field_error.message.clone());
        return true;
    }
    false
}

fn handle_detail_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    edit: &EditHandle,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> Result<bool> {
    match key.code {
        KeyCode::Char('[') | KeyCode::Char(']') => {
            // Nested tab strips stay navigable during an edit.
            if edit.guard_navigation(DETAIL_TAB_GROUP)? == NavDecision::Proceed {
                let delta = if key.code == KeyCode::Char(']') {
                    1
                } else {
                    DETAIL_TABS.len() - 1
                };
                view_data.detail.nested_tab =
                    (view_data.detail.nested_tab + delta) % DETAIL_TABS.len();
            }
        }
        KeyCode::Char('f') => {
            request_tab_nav(
                state,
                runtime,
                view_data,
                edit,
                internal_tx,
                NavIntent::Rotate(1),
            )?;
        }
        KeyCode::Char('b') => {
            request_tab_nav(
                state,
                runtime,
                view_data,
                edit,
                internal_tx,
                NavIntent::Rotate(-1),
            )?;
        }
        KeyCode::Char(ch @ '1'..='5') => {
            let tab = TabKind::ALL[(ch as usize) - ('1' as usize)];
            request_tab_nav(
                state,
                runtime,
                view_data,
                edit,
                internal_tx,
                NavIntent::GoTo(tab),
            )?;
        }
        KeyCode::Char('e') => {
            if view_data.detail.editing {
                return Ok(false);
            }
            if edit.is_any_editing()? {
                emit_status(state, view_data, internal_tx, "finish the active edit first");
                return Ok(false);
            }
            let editor_id = view_data.detail.editor_id.clone();
            edit.set_active(&editor_id)?;
            let sender = internal_tx.clone();
            edit.register_cancel(&editor_id, move |skip| {
                let _ = sender.send(InternalEvent::CancelEditRequested { skip });
            })?;
            view_data.detail.editing = true;
            state.dispatch(AppCommand::EnterEditMode);
        }
        KeyCode::Char('c') if view_data.detail.editing => {
            cycle_draft_status(state, view_data);
        }
        KeyCode::Char('s') if view_data.detail.editing => {
            save_detail_edit(state, runtime, view_data, edit, internal_tx)?;
        }
        KeyCode::Esc => {
            if view_data.detail.editing {
                // Route through the registered cancel handler so unsaved
                // changes get the discard prompt.
                if !edit.trigger_cancel_edit(false)? {
                    finish_edit_cleanup(state, runtime, view_data, edit, internal_tx)?;
                }
            } else {
                close_detail(view_data, edit)?;
            }
        }
        KeyCode::Char('q') => return request_quit(edit, internal_tx),
        _ => {}
    }
    Ok(false)
}

fn cycle_draft_status(state: &AppState, view_data: &mut ViewData) {
    let cycle = status_cycle(state.active_tab);
    if cycle.is_empty() {
        return;
    }
    let current = view_data
        .detail
        .draft_status
        .clone()
        .or_else(|| current_row_status(view_data))
        .unwrap_or_else(|| cycle[0].to_owned());
    let index = cycle.iter().position(|status| *status == current);
    let next = cycle[index.map_or(0, |value| value + 1) % cycle.len()];
    view_data.detail.draft_status = Some(next.to_owned());
}

fn status_cycle(tab: TabKind) -> &'static [&'static str] {
    match tab {
        TabKind::Policies => &["draft", "active", "lapsed", "cancelled", "expired"],
        TabKind::Claims => &["open", "under_review", "approved", "rejected", "paid"],
        TabKind::Invoices => &["issued", "paid", "overdue", "void"],
        TabKind::Products => &["medical", "life", "accident", "property"],
        TabKind::Settings => &[],
    }
}

fn current_row_status(view_data: &ViewData) -> Option<String> {
    let page = view_data.page_data.as_ref()?;
    let row_id = view_data.detail.row_id?;
    match &page.rows {
        TabRows::Policies(rows) => rows
            .iter()
            .find(|row| row.id.get() == row_id)
            .map(|row| row.status.as_str().to_owned()),
        TabRows::Claims(rows) => rows
            .iter()
            .find(|row| row.id.get() == row_id)
            .map(|row| row.status.as_str().to_owned()),
        TabRows::Invoices(rows) => rows
            .iter()
            .find(|row| row.id.get() == row_id)
            .map(|row| row.status.as_str().to_owned()),
        TabRows::Products(rows) => rows
            .iter()
            .find(|row| row.id.get() == row_id)
            .map(|row| row.product_type.as_str().to_owned()),
    }
}

fn save_detail_edit<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    edit: &EditHandle,
    internal_tx: &Sender<InternalEvent>,
) -> Result<()> {
    let Some(row_id) = view_data.detail.row_id else {
        return Ok(());
    };
    view_data.detail.field_errors.clear();

    let payload = match build_update_payload(state.active_tab, view_data) {
        Some(payload) => payload,
        None => {
            emit_status(state, view_data, internal_tx, "row no longer loaded");
            return Ok(());
        }
    };
    if let Err(error) = payload.validate() {
        view_data
            .detail
            .field_errors
            .insert(error.field.to_owned(), error.message);
        return Ok(());
    }

    view_data.loading = true;
    let result = runtime.submit_update(state.active_tab, row_id, &payload);
    view_data.loading = false;

    match result {
        Ok(()) => {
            emit_status(state, view_data, internal_tx, "saved");
            // A saved edit needs no discard prompt on the way out.
            if !edit.trigger_cancel_edit(true)? {
                finish_edit_cleanup(state, runtime, view_data, edit, internal_tx)?;
            }
            fetch_active_tab(state, runtime, view_data, internal_tx);
        }
        Err(error) => {
            if !apply_submit_error(&mut view_data.detail.field_errors, &error) {
                emit_status(state, view_data, internal_tx, format!("save failed: {error}"));
            }
        }
    }
    Ok(())
}

fn build_update_payload(tab: TabKind, view_data: &ViewData) -> Option<FormPayload> {
    let page = view_data.page_data.as_ref()?;
    let row_id = view_data.detail.row_id?;
    let draft_status = view_data.detail.draft_status.as_deref();
    let _ = tab;

    match &page.rows {
        TabRows::Policies(rows) => {
            let row = rows.iter().find(|row| row.id.get() == row_id)?;
            let status = draft_status
                .and_then(polizza_app::PolicyStatus::parse)
                .unwrap_or(row.status);
            Some(FormPayload::Policy(polizza_app::PolicyFormInput {
                policy_number: row.policy_number.clone(),
                customer_id: row.customer_id,
                product_id: row.product_id,
                status,
                effective_date: row.effective_date,
                expiry_date: row.expiry_date,
                premium_cents: row.premium_cents,
                insured_amount_cents: row.insured_amount_cents,
            }))
        }
        TabRows::Claims(rows) => {
            let row = rows.iter().find(|row| row.id.get() == row_id)?;
            let status = draft_status
                .and_then(polizza_app::ClaimStatus::parse)
                .unwrap_or(row.status);
            Some(FormPayload::Claim(polizza_app::ClaimFormInput {
                policy_id: row.policy_id,
                status,
                incident_date: row.incident_date,
                filed_date: row.filed_date,
                claimed_cents: row.claimed_cents,
                description: row.description.clone(),
            }))
        }
        TabRows::Invoices(rows) => {
            let row = rows.iter().find(|row| row.id.get() == row_id)?;
            let status = draft_status
                .and_then(polizza_app::InvoiceStatus::parse)
                .unwrap_or(row.status);
            Some(FormPayload::Invoice(polizza_app::InvoiceFormInput {
                policy_id: row.policy_id,
                status,
                issued_date: row.issued_date,
                due_date: row.due_date,
                amount_cents: row.amount_cents,
            }))
        }
        TabRows::Products(rows) => {
            let row = rows.iter().find(|row| row.id.get() == row_id)?;
            let product_type = draft_status
                .and_then(polizza_app::ProductType::parse)
                .unwrap_or(row.product_type);
            Some(FormPayload::Product(polizza_app::ProductFormInput {
                name: row.name.clone(),
                code: row.code.clone(),
                product_type,
                scopes: row.scopes.clone(),
                min_days: row.min_days,
                max_days: row.max_days,
                premium_cents: row.premium_cents,
            }))
        }
    }
}

fn close_detail(view_data: &mut ViewData, edit: &EditHandle) -> Result<()> {
    if !view_data.detail.editor_id.is_empty() {
        edit.unregister_cancel(&view_data.detail.editor_id)?;
    }
    view_data.detail = DetailUiState::default();
    Ok(())
}

fn request_quit(edit: &EditHandle, internal_tx: &Sender<InternalEvent>) -> Result<bool> {
    if !edit.is_any_editing()? {
        return Ok(true);
    }
    // Quitting mid-edit goes through the unsaved-changes flow; with the
    // skip flag armed the prompt is bypassed once.
    let sender = internal_tx.clone();
    edit.handle_unsaved_changes(move || {
        let _ = sender.send(InternalEvent::RequestQuit);
    })?;
    Ok(false)
}

fn handle_table_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    edit: &EditHandle,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> Result<bool> {
    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), KeyModifiers::NONE) => {
            return request_quit(edit, internal_tx);
        }
        (KeyCode::Char('Q'), _) => {
            edit.skip_next_confirmation()?;
            return request_quit(edit, internal_tx);
        }
        (KeyCode::Char('?'), _) => {
            view_data.help_visible = true;
        }
        (KeyCode::Char('f'), KeyModifiers::NONE) => {
            request_tab_nav(
                state,
                runtime,
                view_data,
                edit,
                internal_tx,
                NavIntent::Rotate(1),
            )?;
        }
        (KeyCode::Char('b'), KeyModifiers::NONE) => {
            request_tab_nav(
                state,
                runtime,
                view_data,
                edit,
                internal_tx,
                NavIntent::Rotate(-1),
            )?;
        }
        (KeyCode::Char(ch @ '1'..='5'), KeyModifiers::NONE) => {
            let tab = TabKind::ALL[(ch as usize) - ('1' as usize)];
            request_tab_nav(
                state,
                runtime,
                view_data,
                edit,
                internal_tx,
                NavIntent::GoTo(tab),
            )?;
        }
        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => move_row(view_data, 1),
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => move_row(view_data, -1),
        (KeyCode::Char('h'), _) | (KeyCode::Left, _) => move_col(view_data, -1),
        (KeyCode::Char('l'), _) | (KeyCode::Right, _) => move_col(view_data, 1),
        (KeyCode::Char('n'), KeyModifiers::NONE) => {
            next_page(state, runtime, view_data, internal_tx);
        }
        (KeyCode::Char('p'), KeyModifiers::NONE) => {
            prev_page(state, runtime, view_data, internal_tx);
        }
        (KeyCode::Char('r'), KeyModifiers::NONE) => {
            cycle_page_size(state, runtime, view_data, internal_tx);
        }
        (KeyCode::Char('/'), _) => {
            view_data.search.visible = true;
            view_data.search.input = view_data.table.sort_filters.search.clone();
        }
        (KeyCode::Char('s'), KeyModifiers::NONE) => {
            cycle_sort(state, runtime, view_data, internal_tx);
        }
        (KeyCode::Char('m'), KeyModifiers::NONE) => {
            toggle_multi_sort(state, runtime, view_data, internal_tx);
        }
        (KeyCode::Char('S'), _) => {
            view_data.table.multi_sort.clear();
            view_data
                .table
                .sort_filters
                .update_sort(&SortEvent::default());
            view_data.table.page.reset_page();
            fetch_active_tab(state, runtime, view_data, internal_tx);
            emit_status(state, view_data, internal_tx, "sort cleared");
        }
        (KeyCode::Char('t'), KeyModifiers::NONE) => {
            cycle_type_filter(state, runtime, view_data, internal_tx);
        }
        (KeyCode::Char('c'), KeyModifiers::NONE) => {
            hide_selected_column(state, view_data, internal_tx);
        }
        (KeyCode::Char('C'), _) => {
            view_data.table.hidden_columns.clear();
            emit_status(state, view_data, internal_tx, "all columns shown");
        }
        (KeyCode::Char('a'), KeyModifiers::NONE) => {
            if let Some(kind) = form_kind_for_tab(state.active_tab) {
                view_data.form = Some(FormUiState::blank(kind));
                state.dispatch(AppCommand::OpenForm(kind));
            }
        }
        (KeyCode::Enter, _) => open_detail(state, view_data),
        _ => {}
    }
    Ok(false)
}

fn request_tab_nav<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    edit: &EditHandle,
    internal_tx: &Sender<InternalEvent>,
    intent: NavIntent,
) -> Result<()> {
    match edit.guard_navigation(MAIN_TAB_GROUP)? {
        NavDecision::Proceed => {
            if view_data.detail.visible {
                close_detail(view_data, edit)?;
            }
            apply_nav(state, runtime, view_data, internal_tx, intent);
        }
        NavDecision::Intercept => {
            // The switch is parked until the editing panel resolves its
            // unsaved changes.
            view_data.pending_nav = Some(intent);
            if !edit.trigger_cancel_edit(false)? {
                let sender = internal_tx.clone();
                edit.handle_unsaved_changes(move || {
                    let _ = sender.send(InternalEvent::EditDiscarded);
                })?;
            }
        }
    }
    Ok(())
}

fn move_row(view_data: &mut ViewData, delta: isize) {
    let Some(page) = &view_data.page_data else {
        return;
    };
    let count = page.row_count();
    if count == 0 {
        return;
    }
    let current = view_data.table.selected_row as isize;
    view_data.table.selected_row = (current + delta).clamp(0, count as isize - 1) as usize;
}

fn move_col(view_data: &mut ViewData, delta: isize) {
    let Some(page) = &view_data.page_data else {
        return;
    };
    let (columns, _) = tab_columns(&page.rows);
    let visible = visible_columns(columns.len(), &view_data.table.hidden_columns);
    if visible.is_empty() {
        return;
    }
    let current = view_data.table.selected_col.min(visible.len() - 1) as isize;
    view_data.table.selected_col =
        (current + delta).clamp(0, visible.len() as isize - 1) as usize;
}

fn visible_columns(column_count: usize, hidden: &BTreeSet<usize>) -> Vec<usize> {
    (0..column_count)
        .filter(|index| !hidden.contains(index))
        .collect()
}

fn next_page<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(page) = &view_data.page_data else {
        return;
    };
    if view_data.table.page.page >= page.info.total_pages() {
        emit_status(state, view_data, internal_tx, "already on last page");
        return;
    }
    // Widget events are zero-based: the current one-based page number IS
    // the zero-based index of the next page.
    let event = PageEvent {
        page: view_data.table.page.page,
        rows: view_data.table.page.limit,
    };
    view_data.table.page.update_page(&event);
    fetch_active_tab(state, runtime, view_data, internal_tx);
}

fn prev_page<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if view_data.table.page.page <= 1 {
        emit_status(state, view_data, internal_tx, "already on first page");
        return;
    }
    let event = PageEvent {
        page: view_data.table.page.page - 2,
        rows: view_data.table.page.limit,
    };
    view_data.table.page.update_page(&event);
    fetch_active_tab(state, runtime, view_data, internal_tx);
}

fn cycle_page_size<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let options = view_data.table.page.rows_per_page_options.clone();
    if options.is_empty() {
        return;
    }
    let current = view_data.table.page.limit;
    let index = options.iter().position(|option| *option == current);
    let next = options[index.map_or(0, |value| value + 1) % options.len()];
    view_data
        .table
        .page
        .update_page(&PageEvent { page: 0, rows: next });
    fetch_active_tab(state, runtime, view_data, internal_tx);
    emit_status(state, view_data, internal_tx, format!("{next} rows per page"));
}

fn selected_field(view_data: &ViewData) -> Option<&'static str> {
    let page = view_data.page_data.as_ref()?;
    let (columns, fields) = tab_columns(&page.rows);
    let visible = visible_columns(columns.len(), &view_data.table.hidden_columns);
    if visible.is_empty() {
        return None;
    }
    let slot = view_data.table.selected_col.min(visible.len() - 1);
    fields.get(visible[slot]).copied()
}

fn cycle_sort<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(field) = selected_field(view_data) else {
        emit_status(state, view_data, internal_tx, "sort unavailable");
        return;
    };

    let physical = physical_sort_field(field);
    let current = match view_data.table.sort_filters.sort.as_slice() {
        [entry] if entry.field == physical => Some(entry.direction),
        _ => None,
    };

    let event = match current {
        None => SortEvent {
            sort_field: Some(field.to_owned()),
            sort_order: Some(1),
            ..SortEvent::default()
        },
        Some(SortDirection::Asc) => SortEvent {
            sort_field: Some(field.to_owned()),
            sort_order: Some(-1),
            ..SortEvent::default()
        },
        // Third press clears: a falsy sort field is the clear-sort path.
        Some(SortDirection::Desc) => SortEvent::default(),
    };
    view_data.table.multi_sort.clear();
    view_data.table.sort_filters.update_sort(&event);
    view_data.table.page.reset_page();
    fetch_active_tab(state, runtime, view_data, internal_tx);

    let status = match view_data.table.sort_filters.sort.first() {
        Some(entry) if entry.direction == SortDirection::Asc => format!("sort {field} asc"),
        Some(_) => format!("sort {field} desc"),
        None => "sort cleared".to_owned(),
    };
    emit_status(state, view_data, internal_tx, status);
}

fn toggle_multi_sort<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(field) = selected_field(view_data) else {
        emit_status(state, view_data, internal_tx, "sort unavailable");
        return;
    };

    let existing = view_data
        .table
        .multi_sort
        .iter()
        .position(|(entry, _)| *entry == field);
    match existing {
        None => view_data.table.multi_sort.push((field, true)),
        Some(index) if view_data.table.multi_sort[index].1 => {
            view_data.table.multi_sort[index].1 = false;
        }
        Some(index) => {
            view_data.table.multi_sort.remove(index);
        }
    }

    let meta: Vec<ColumnSort> = view_data
        .table
        .multi_sort
        .iter()
        .map(|(entry, ascending)| ColumnSort {
            field: (*entry).to_owned(),
            order: if *ascending { 1 } else { -1 },
        })
        .collect();
    let event = if meta.is_empty() {
        SortEvent::default()
    } else {
        SortEvent {
            multi_sort_meta: Some(meta),
            ..SortEvent::default()
        }
    };
    view_data.table.sort_filters.update_sort(&event);
    view_data.table.page.reset_page();
    fetch_active_tab(state, runtime, view_data, internal_tx);
    emit_status(
        state,
        view_data,
        internal_tx,
        format!(
            "multi-sort on {} columns",
            view_data.table.sort_filters.sort.len()
        ),
    );
}

fn cycle_type_filter<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if state.active_tab != TabKind::Products {
        emit_status(state, view_data, internal_tx, "type filter only on products");
        return;
    }
    view_data.table.type_filter_index =
        (view_data.table.type_filter_index + 1) % TYPE_FILTER_CYCLE.len();
    let value = TYPE_FILTER_CYCLE[view_data.table.type_filter_index];
    view_data.table.sort_filters.update_type_filter(value);
    view_data.table.page.reset_page();
    fetch_active_tab(state, runtime, view_data, internal_tx);

    let status = if value == "all" {
        "type filter cleared".to_owned()
    } else {
        format!("type filter: {value}")
    };
    emit_status(state, view_data, internal_tx, status);
}

fn hide_selected_column(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(page) = &view_data.page_data else {
        return;
    };
    let (columns, _) = tab_columns(&page.rows);
    let visible = visible_columns(columns.len(), &view_data.table.hidden_columns);
    if visible.len() <= 1 {
        emit_status(state, view_data, internal_tx, "keep one column visible");
        return;
    }
    let slot = view_data.table.selected_col.min(visible.len() - 1);
    let column = visible[slot];
    view_data.table.hidden_columns.insert(column);
    emit_status(
        state,
        view_data,
        internal_tx,
        format!("column hidden: {}", columns[column]),
    );
}

fn form_kind_for_tab(tab: TabKind) -> Option<FormKind> {
    match tab {
        TabKind::Policies => Some(FormKind::Policy),
        TabKind::Claims => Some(FormKind::Claim),
        TabKind::Invoices => Some(FormKind::Invoice),
        TabKind::Products => Some(FormKind::Product),
        TabKind::Settings => None,
    }
}

fn open_detail(state: &AppState, view_data: &mut ViewData) {
    let Some(page) = &view_data.page_data else {
        return;
    };
    let Some(row_id) = page.row_id(view_data.table.selected_row) else {
        return;
    };
    view_data.detail = DetailUiState {
        visible: true,
        row_id: Some(row_id),
        editor_id: format!("{}-{row_id}", state.active_tab.label()),
        ..DetailUiState::default()
    };
}

// ---- form field parsing ----

const POLICY_FORM_FIELDS: [FormFieldSpec; 8] = [
    FormFieldSpec { label: "policy number", key: "policy_number" },
    FormFieldSpec { label: "customer id", key: "customer_id" },
    FormFieldSpec { label: "product id", key: "product_id" },
    FormFieldSpec { label: "status", key: "status" },
    FormFieldSpec { label: "effective date", key: "effective_date" },
    FormFieldSpec { label: "expiry date", key: "expiry_date" },
    FormFieldSpec { label: "premium", key: "premium_cents" },
    FormFieldSpec { label: "insured amount", key: "insured_amount_cents" },
];
const CLAIM_FORM_FIELDS: [FormFieldSpec; 6] = [
    FormFieldSpec { label: "policy id", key: "policy_id" },
    FormFieldSpec { label: "status", key: "status" },
    FormFieldSpec { label: "incident date", key: "incident_date" },
    FormFieldSpec { label: "filed date", key: "filed_date" },
    FormFieldSpec { label: "claimed", key: "claimed_cents" },
    FormFieldSpec { label: "description", key: "description" },
];
const INVOICE_FORM_FIELDS: [FormFieldSpec; 5] = [
    FormFieldSpec { label: "policy id", key: "policy_id" },
    FormFieldSpec { label: "status", key: "status" },
    FormFieldSpec { label: "issued date", key: "issued_date" },
    FormFieldSpec { label: "due date", key: "due_date" },
    FormFieldSpec { label: "amount", key: "amount_cents" },
];
const PRODUCT_FORM_FIELDS: [FormFieldSpec; 7] = [
    FormFieldSpec { label: "name", key: "name" },
    FormFieldSpec { label: "code", key: "code" },
    FormFieldSpec { label: "type", key: "type" },
    FormFieldSpec { label: "scopes (comma separated)", key: "scopes" },
    FormFieldSpec { label: "min days", key: "min_days" },
    FormFieldSpec { label: "max days", key: "max_days" },
    FormFieldSpec { label: "premium", key: "premium_cents" },
];

fn form_field_specs(kind: FormKind) -> &'static [FormFieldSpec] {
    match kind {
        FormKind::Policy => &POLICY_FORM_FIELDS,
        FormKind::Claim => &CLAIM_FORM_FIELDS,
        FormKind::Invoice => &INVOICE_FORM_FIELDS,
        FormKind::Product => &PRODUCT_FORM_FIELDS,
    }
}

fn payload_from_inputs(kind: FormKind, inputs: &[String]) -> Result<FormPayload, FieldError> {
    match kind {
        FormKind::Policy => Ok(FormPayload::Policy(polizza_app::PolicyFormInput {
            policy_number: inputs[0].trim().to_owned(),
            customer_id: polizza_app::CustomerId::new(parse_id("customer_id", &inputs[1])?),
            product_id: polizza_app::ProductId::new(parse_id("product_id", &inputs[2])?),
            status: parse_status("status", &inputs[3], polizza_app::PolicyStatus::parse)?,
            effective_date: parse_date("effective_date", &inputs[4])?,
            expiry_date: parse_optional_date("expiry_date", &inputs[5])?,
            premium_cents: parse_cents("premium_cents", &inputs[6])?,
            insured_amount_cents: parse_cents("insured_amount_cents", &inputs[7])?,
        })),
        FormKind::Claim => Ok(FormPayload::Claim(polizza_app::ClaimFormInput {
            policy_id: polizza_app::PolicyId::new(parse_id("policy_id", &inputs[0])?),
            status: parse_status("status", &inputs[1], polizza_app::ClaimStatus::parse)?,
            incident_date: parse_date("incident_date", &inputs[2])?,
            filed_date: parse_date("filed_date", &inputs[3])?,
            claimed_cents: parse_cents("claimed_cents", &inputs[4])?,
            description: inputs[5].trim().to_owned(),
        })),
        FormKind::Invoice => Ok(FormPayload::Invoice(polizza_app::InvoiceFormInput {
            policy_id: polizza_app::PolicyId::new(parse_id("policy_id", &inputs[0])?),
            status: parse_status("status", &inputs[1], polizza_app::InvoiceStatus::parse)?,
            issued_date: parse_date("issued_date", &inputs[2])?,
            due_date: parse_date("due_date", &inputs[3])?,
            amount_cents: parse_cents("amount_cents", &inputs[4])?,
        })),
        FormKind::Product => Ok(FormPayload::Product(polizza_app::ProductFormInput {
            name: inputs[0].trim().to_owned(),
            code: inputs[1].trim().to_owned(),
            product_type: parse_status("type", &inputs[2], polizza_app::ProductType::parse)?,
            scopes: inputs[3]
                .split(',')
                .map(str::trim)
                .filter(|scope| !scope.is_empty())
                .map(str::to_owned)
                .collect(),
            min_days: parse_optional_days("min_days", &inputs[4])?,
            max_days: parse_optional_days("max_days", &inputs[5])?,
            premium_cents: parse_cents("premium_cents", &inputs[6])?,
        })),
    }
}

fn field_error(field: &'static str, message: impl Into<String>) -> FieldError {
    FieldError {
        field,
        message: message.into(),
    }
}

fn parse_id(field: &'static str, input: &str) -> Result<i64, FieldError> {
    input
        .trim()
        .parse::<i64>()
        .map_err(|_| field_error(field, "enter a numeric id"))
}

fn parse_status<T>(
    field: &'static str,
    input: &str,
    parse: fn(&str) -> Option<T>,
) -> Result<T, FieldError> {
    parse(input.trim())
        .ok_or_else(|| field_error(field, format!("unknown value {:?}", input.trim())))
}

fn parse_date(field: &'static str, input: &str) -> Result<Date, FieldError> {
    Date::parse(input.trim(), &format_description!("[year]-[month]-[day]"))
        .map_err(|_| field_error(field, "enter a date as YYYY-MM-DD"))
}

fn parse_optional_date(field: &'static str, input: &str) -> Result<Option<Date>, FieldError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    parse_date(field, trimmed).map(Some)
}

fn parse_optional_days(field: &'static str, input: &str) -> Result<Option<i32>, FieldError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<i32>()
        .map(Some)
        .map_err(|_| field_error(field, "enter a whole number of days"))
}

/// Money input in dollars, optional cents: "1200", "1,200.50", "$99.90".
fn parse_cents(field: &'static str, input: &str) -> Result<i64, FieldError> {
    let cleaned = input.trim().trim_start_matches('$').replace(',', "");
    if cleaned.is_empty() {
        return Err(field_error(field, "enter an amount"));
    }
    let (dollars, cents) = match cleaned.split_once('.') {
        None => (cleaned.as_str(), 0_i64),
        Some((dollars, fraction)) => {
            if fraction.len() > 2 || fraction.is_empty() {
                return Err(field_error(field, "use at most two decimal places"));
            }
            let mut fraction = fraction.to_owned();
            while fraction.len() < 2 {
                fraction.push('0');
            }
            let cents = fraction
                .parse::<i64>()
                .map_err(|_| field_error(field, "enter a money amount"))?;
            (dollars, cents)
        }
    };
    let dollars: i64 = dollars
        .parse()
        .map_err(|_| field_error(field, "enter a money amount"))?;
    if dollars < 0 {
        Ok(dollars * 100 - cents)
    } else {
        Ok(dollars * 100 + cents)
    }
}

// ---- rendering ----

fn render(
    frame: &mut ratatui::Frame<'_>,
    state: &AppState,
    view_data: &ViewData,
    edit: &EditHandle,
) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let selected = TabKind::ALL
        .iter()
        .position(|tab| *tab == state.active_tab)
        .unwrap_or(0);
    let tab_titles = TabKind::ALL
        .iter()
        .map(|tab| tab_title(*tab, state, view_data))
        .collect::<Vec<String>>();
    let tabs = Tabs::new(tab_titles)
        .block(Block::default().title("polizza").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, layout[0]);

    if state.active_tab == TabKind::Settings {
        let body = Paragraph::new(settings_text())
            .block(Block::default().borders(Borders::ALL).title("settings"));
        frame.render_widget(body, layout[1]);
    } else {
        render_table(frame, layout[1], view_data);
    }

    let status = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[2]);

    if view_data.detail.visible {
        let area = centered_rect(70, 60, frame.area());
        frame.render_widget(Clear, area);
        let detail = Paragraph::new(render_detail_text(state, view_data)).block(
            Block::default()
                .title("detail")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Cyan)),
        );
        frame.render_widget(detail, area);
    }

    if let Some(form) = &view_data.form {
        let area = centered_rect(64, 62, frame.area());
        frame.render_widget(Clear, area);
        let body = Paragraph::new(render_form_text(form))
            .block(Block::default().title("new record").borders(Borders::ALL));
        frame.render_widget(body, area);
    }

    if view_data.search.visible {
        let area = centered_rect(50, 18, frame.area());
        frame.render_widget(Clear, area);
        let body = Paragraph::new(format!(
            "search: {}_\n\nEnter apply · Esc close",
            view_data.search.input
        ))
        .block(Block::default().title("search").borders(Borders::ALL));
        frame.render_widget(body, area);
    }

    if edit.discard_dialog_visible().unwrap_or(false) {
        let area = centered_rect(44, 18, frame.area());
        frame.render_widget(Clear, area);
        let body = Paragraph::new("Discard unsaved changes?\n\ny discard · n keep editing").block(
            Block::default()
                .title("unsaved changes")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Red)),
        );
        frame.render_widget(body, area);
    }

    if view_data.help_visible {
        let area = centered_rect(70, 70, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn tab_title(tab: TabKind, state: &AppState, view_data: &ViewData) -> String {
    if state.active_tab == tab && has_active_filters(&view_data.table.sort_filters) {
        format!(" {} {FILTER_MARK} ", tab.label())
    } else {
        format!(" {} ", tab.label())
    }
}

fn has_active_filters(sort_filters: &SortFilterParams) -> bool {
    !sort_filters.search.is_empty()
        || !sort_filters.sort.is_empty()
        || !sort_filters.filters.is_empty()
}

fn render_table(frame: &mut ratatui::Frame<'_>, area: Rect, view_data: &ViewData) {
    let Some(page) = &view_data.page_data else {
        let empty = Paragraph::new(if view_data.loading { "loading..." } else { "no data" })
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(empty, area);
        return;
    };

    let (columns, _) = tab_columns(&page.rows);
    let projected = project_rows(page);
    let visible = visible_columns(columns.len(), &view_data.table.hidden_columns);

    let header = Row::new(
        visible
            .iter()
            .map(|index| Cell::from(columns[*index]))
            .collect::<Vec<Cell>>(),
    )
    .style(Style::default().add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = projected
        .iter()
        .enumerate()
        .map(|(row_index, cells)| {
            let row = Row::new(
                visible
                    .iter()
                    .map(|index| Cell::from(cells[*index].clone()))
                    .collect::<Vec<Cell>>(),
            );
            if row_index == view_data.table.selected_row {
                row.style(Style::default().bg(Color::DarkGray))
            } else {
                row
            }
        })
        .collect();

    let widths: Vec<Constraint> = visible.iter().map(|_| Constraint::Min(8)).collect();
    let title = format!(
        "page {}/{} · {} rows · limit {}",
        page.info.current_page,
        page.info.total_pages(),
        page.info.total,
        view_data.table.page.limit,
    );
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(table, area);
}

fn render_detail_text(state: &AppState, view_data: &ViewData) -> String {
    let mut lines = Vec::new();

    let strip = DETAIL_TABS
        .iter()
        .enumerate()
        .map(|(index, name)| {
            if index == view_data.detail.nested_tab {
                format!("[{name}]")
            } else {
                format!(" {name} ")
            }
        })
        .collect::<Vec<String>>()
        .join(" ");
    lines.push(strip);
    lines.push(String::new());

    if view_data.detail.nested_tab == 0 {
        if let Some(page) = &view_data.page_data {
            let (columns, _) = tab_columns(&page.rows);
            let projected = project_rows(page);
            let row = projected
                .iter()
                .enumerate()
                .find(|(index, _)| page.row_id(*index) == view_data.detail.row_id)
                .map(|(_, cells)| cells);
            if let Some(cells) = row {
                for (column, value) in columns.iter().zip(cells) {
                    lines.push(format!("{column}: {value}"));
                }
            }
        }
    } else {
        lines.push("created/updated timestamps come from the backend audit trail".to_owned());
    }

    lines.push(String::new());
    if view_data.detail.editing {
        let draft = view_data
            .detail
            .draft_status
            .clone()
            .or_else(|| current_row_status(view_data))
            .unwrap_or_default();
        lines.push(format!(
            "editing — {}: {draft}",
            edit_field_label(state.active_tab)
        ));
        for (field, message) in &view_data.detail.field_errors {
            lines.push(format!("! {field}: {message}"));
        }
        lines.push("c cycle · s save · Esc discard · [ ] tabs".to_owned());
    } else {
        lines.push("e edit · Esc close · [ ] tabs".to_owned());
    }
    lines.join("\n")
}

fn edit_field_label(tab: TabKind) -> &'static str {
    match tab {
        TabKind::Products => "type",
        _ => "status",
    }
}

fn render_form_text(form: &FormUiState) -> String {
    let specs = form_field_specs(form.kind);
    let mut lines = Vec::new();
    for (index, spec) in specs.iter().enumerate() {
        let marker = if index == form.cursor { "> " } else { "  " };
        lines.push(format!("{marker}{}: {}", spec.label, form.inputs[index]));
        if let Some(message) = form.field_errors.get(spec.key) {
            lines.push(format!("    ! {message}"));
        }
    }
    lines.push(String::new());
    lines.push("Enter submit · Tab next field · Esc cancel".to_owned());
    lines.join("\n")
}

fn settings_text() -> String {
    [
        "configuration lives in the polizza config file",
        "run `polizza --print-config-path` to locate it",
        "run `polizza --print-example-config` for a template",
    ]
    .join("\n")
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    let badge = match state.mode {
        AppMode::Nav => "NAV",
        AppMode::Edit => "EDIT",
        AppMode::Form(_) => "FORM",
    };
    let mut parts = vec![badge.to_owned()];
    if view_data.loading {
        parts.push("loading".to_owned());
    }
    if let Some(status) = &state.status_line {
        parts.push(status.clone());
    } else {
        parts.push("? help · / search · f/b tabs · q quit".to_owned());
    }
    parts.join(" | ")
}

fn help_overlay_text() -> String {
    [
        "f/b or 1-5   switch tab",
        "j/k h/l      move row / column",
        "Enter        open detail",
        "e            edit panel (one at a time)",
        "s            sort selected column (asc/desc/clear)",
        "m            add column to multi-sort",
        "S            clear sort",
        "t            cycle product type filter",
        "/            search (debounced)",
        "n/p          next/previous page",
        "r            cycle rows per page",
        "c/C          hide column / show all",
        "a            new record form",
        "q            quit (prompts during edit)",
        "Q            quit, skip prompt once",
    ]
    .join("\n")
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, InternalEvent, PageInfo, TabPage, TabRows, ViewData, apply_submit_error,
        comma_format, fetch_active_tab, format_cents, handle_key_event, help_overlay_text,
        parse_cents, payload_from_inputs, process_internal_events, refresh_for_tab, status_text,
    };
    use anyhow::{Result, anyhow};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use polizza_app::{
        AppMode, AppState, EditScope, FormKind, FormPayload, InvoiceTabPrefs, PageQuery,
        SearchBody, TabKind, ValidationErrors,
    };
    use std::collections::BTreeMap;
    use std::sync::mpsc::{self, Receiver, Sender};
    use time::macros::datetime;

    #[derive(Default)]
    struct TestRuntime {
        last_tab: Option<TabKind>,
        last_query: Option<PageQuery>,
        last_body: Option<SearchBody>,
        create_count: usize,
        update_count: usize,
        last_update: Option<(TabKind, i64)>,
        create_error: Option<ValidationErrors>,
        total: i64,
    }

    impl TestRuntime {
        fn with_products() -> Self {
            Self {
                total: 41,
                ..Self::default()
            }
        }

        fn sample_product(id: i64) -> polizza_app::Product {
            polizza_app::Product {
                id: polizza_app::ProductId::new(id),
                name: format!("Product {id}"),
                code: format!("P{id}"),
                product_type: polizza_app::ProductType::Medical,
                scopes: vec!["hospitalization".to_owned()],
                min_days: Some(1),
                max_days: Some(30),
                premium_cents: 900,
                active: true,
                created_at: datetime!(2026-01-09 0:00 UTC),
                updated_at: datetime!(2026-01-09 0:00 UTC),
            }
        }

        fn sample_claim(id: i64) -> polizza_app::Claim {
            polizza_app::Claim {
                id: polizza_app::ClaimId::new(id),
                claim_number: format!("CLM-{id:04}"),
                policy_id: polizza_app::PolicyId::new(11),
                policy_number: "POL-1001".to_owned(),
                status: polizza_app::ClaimStatus::Open,
                incident_date: time::macros::date!(2026 - 02 - 01),
                filed_date: time::macros::date!(2026 - 02 - 03),
                claimed_cents: 80_000,
                approved_cents: None,
                description: "Water damage".to_owned(),
                created_at: datetime!(2026-02-03 0:00 UTC),
                updated_at: datetime!(2026-02-03 0:00 UTC),
            }
        }
    }

    impl AppRuntime for TestRuntime {
        fn search_tab(
            &mut self,
            tab: TabKind,
            page: &PageQuery,
            body: &SearchBody,
        ) -> Result<TabPage> {
            self.last_tab = Some(tab);
            self.last_query = Some(*page);
            self.last_body = Some(body.clone());

            let info = PageInfo {
                current_page: page.page,
                per_page: page.limit,
                total: self.total,
            };
            let rows = match tab {
                TabKind::Products => {
                    TabRows::Products((1..=3).map(Self::sample_product).collect())
                }
                TabKind::Claims => TabRows::Claims((1..=3).map(Self::sample_claim).collect()),
                TabKind::Policies => TabRows::Policies(Vec::new()),
                TabKind::Invoices => TabRows::Invoices(Vec::new()),
                TabKind::Settings => unreachable!("settings tab has no search endpoint"),
            };
            Ok(TabPage { rows, info })
        }

        fn submit_create(&mut self, _payload: &FormPayload) -> Result<()> {
            self.create_count += 1;
            match self.create_error.take() {
                Some(errors) => Err(errors.into()),
                None => Ok(()),
            }
        }

        fn submit_update(&mut self, tab: TabKind, row_id: i64, _payload: &FormPayload) -> Result<()> {
            self.update_count += 1;
            self.last_update = Some((tab, row_id));
            Ok(())
        }
    }

    fn channel() -> (Sender<InternalEvent>, Receiver<InternalEvent>) {
        mpsc::channel()
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn press(
        state: &mut AppState,
        runtime: &mut TestRuntime,
        view_data: &mut ViewData,
        edit: &polizza_app::EditHandle,
        tx: &Sender<InternalEvent>,
        code: KeyCode,
    ) -> bool {
        handle_key_event(state, runtime, view_data, edit, tx, key(code))
            .expect("key handling should not fail inside a live scope")
    }

    fn drain(
        state: &mut AppState,
        runtime: &mut TestRuntime,
        view_data: &mut ViewData,
        edit: &polizza_app::EditHandle,
        tx: &Sender<InternalEvent>,
        rx: &Receiver<InternalEvent>,
    ) {
        process_internal_events(state, runtime, view_data, edit, tx, rx)
            .expect("event processing should not fail inside a live scope");
    }

    fn setup(tab: TabKind) -> (AppState, TestRuntime, ViewData) {
        let mut state = AppState {
            active_tab: tab,
            ..AppState::default()
        };
        let mut runtime = TestRuntime::with_products();
        let mut view_data = ViewData::default();
        let (tx, _rx) = channel();
        refresh_for_tab(&mut state, &mut runtime, &mut view_data, &tx);
        (state, runtime, view_data)
    }

    #[test]
    fn initial_fetch_requests_page_one_with_empty_body() {
        let (_state, runtime, view_data) = setup(TabKind::Products);

        let query = runtime.last_query.expect("fetch should run");
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 10);

        let body = runtime.last_body.expect("fetch should carry a body");
        assert_eq!(body.search.value, "");
        assert!(body.sort.is_empty());
        assert!(body.filters.is_empty());
        assert!(view_data.page_data.is_some());
    }

    #[test]
    fn sort_cycle_applies_term_alias_then_clears() {
        let (mut state, mut runtime, mut view_data) = setup(TabKind::Products);
        let scope = EditScope::provide();
        let edit = scope.handle();
        let (tx, _rx) = channel();

        // Move the column cursor to "min days" (index 5).
        for _ in 0..5 {
            press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('l'));
        }

        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('s'));
        let body = runtime.last_body.clone().expect("sort should refetch");
        assert_eq!(body.sort.len(), 1);
        assert_eq!(body.sort[0].field, "min_days_by_unit_term");
        assert_eq!(body.sort[0].direction, polizza_app::SortDirection::Asc);

        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('s'));
        let body = runtime.last_body.clone().expect("second sort should refetch");
        assert_eq!(body.sort[0].direction, polizza_app::SortDirection::Desc);

        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('s'));
        let body = runtime.last_body.clone().expect("third sort should refetch");
        assert!(body.sort.is_empty());
    }

    #[test]
    fn multi_sort_accumulates_columns_in_order() {
        let (mut state, mut runtime, mut view_data) = setup(TabKind::Products);
        let scope = EditScope::provide();
        let edit = scope.handle();
        let (tx, _rx) = channel();

        // "name" column, ascending.
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('l'));
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('m'));
        // "code" column, ascending.
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('l'));
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('m'));

        let body = runtime.last_body.clone().expect("multi-sort should refetch");
        assert_eq!(body.sort.len(), 2);
        assert_eq!(body.sort[0].field, "name");
        assert_eq!(body.sort[1].field, "code");
    }

    #[test]
    fn pagination_keys_move_one_based_page() {
        let (mut state, mut runtime, mut view_data) = setup(TabKind::Products);
        let scope = EditScope::provide();
        let edit = scope.handle();
        let (tx, _rx) = channel();

        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('n'));
        assert_eq!(runtime.last_query.expect("refetch").page, 2);

        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('n'));
        assert_eq!(runtime.last_query.expect("refetch").page, 3);

        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('p'));
        assert_eq!(runtime.last_query.expect("refetch").page, 2);
    }

    #[test]
    fn page_size_cycle_returns_to_first_page() {
        let (mut state, mut runtime, mut view_data) = setup(TabKind::Products);
        let scope = EditScope::provide();
        let edit = scope.handle();
        let (tx, _rx) = channel();

        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('n'));
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('r'));

        let query = runtime.last_query.expect("refetch");
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 20);
    }

    #[test]
    fn type_filter_cycles_through_sentinel() {
        let (mut state, mut runtime, mut view_data) = setup(TabKind::Products);
        let scope = EditScope::provide();
        let edit = scope.handle();
        let (tx, _rx) = channel();

        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('t'));
        let body = runtime.last_body.clone().expect("refetch");
        assert_eq!(body.filters.len(), 1);
        assert_eq!(body.filters[0].field, "type");
        assert_eq!(body.filters[0].value, serde_json::json!("medical"));

        // Cycle the remaining values back around to "all".
        for _ in 0..4 {
            press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('t'));
        }
        let body = runtime.last_body.clone().expect("refetch");
        assert!(body.filters.is_empty());
    }

    #[test]
    fn search_debounce_honors_only_latest_token() {
        let (mut state, mut runtime, mut view_data) = setup(TabKind::Products);
        let scope = EditScope::provide();
        let edit = scope.handle();
        let (tx, rx) = channel();

        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('/'));
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('f'));
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('l'));
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('u'));
        // Let every debounce timer fire, then drain, so the injected
        // stale/current tokens below are the only events in flight.
        std::thread::sleep(std::time::Duration::from_millis(400));
        while rx.try_recv().is_ok() {}

        let stale = view_data.search.token - 1;
        tx.send(InternalEvent::SearchDebounce { token: stale })
            .expect("send stale token");
        drain(&mut state, &mut runtime, &mut view_data, &edit, &tx, &rx);
        let body = runtime.last_body.clone().expect("initial body");
        assert_eq!(body.search.value, "");

        let current = view_data.search.token;
        tx.send(InternalEvent::SearchDebounce { token: current })
            .expect("send current token");
        drain(&mut state, &mut runtime, &mut view_data, &edit, &tx, &rx);
        let body = runtime.last_body.clone().expect("debounced body");
        assert_eq!(body.search.value, "flu");
        assert_eq!(runtime.last_query.expect("refetch").page, 1);
    }

    #[test]
    fn search_change_resets_to_first_page() {
        let (mut state, mut runtime, mut view_data) = setup(TabKind::Products);
        let scope = EditScope::provide();
        let edit = scope.handle();
        let (tx, _rx) = channel();

        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('n'));
        assert_eq!(runtime.last_query.expect("refetch").page, 2);

        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('/'));
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('x'));
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Enter);

        let query = runtime.last_query.expect("refetch");
        assert_eq!(query.page, 1);
        let body = runtime.last_body.clone().expect("refetch body");
        assert_eq!(body.search.value, "x");
    }

    #[test]
    fn intercepted_tab_switch_waits_for_discard_confirmation() {
        let (mut state, mut runtime, mut view_data) = setup(TabKind::Claims);
        let scope = EditScope::provide();
        let edit = scope.handle();
        edit.register_nested_group(super::DETAIL_TAB_GROUP)
            .expect("register nested group");
        let (tx, rx) = channel();

        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Enter);
        assert!(view_data.detail.visible);
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('e'));
        assert!(view_data.detail.editing);
        assert!(edit.is_any_editing().expect("scope alive"));

        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('f'));
        drain(&mut state, &mut runtime, &mut view_data, &edit, &tx, &rx);
        assert!(edit.discard_dialog_visible().expect("scope alive"));
        assert_eq!(state.active_tab, TabKind::Claims);

        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('y'));
        drain(&mut state, &mut runtime, &mut view_data, &edit, &tx, &rx);
        assert_eq!(state.active_tab, TabKind::Invoices);
        assert!(!view_data.detail.visible);
        assert!(!edit.is_any_editing().expect("scope alive"));
    }

    #[test]
    fn cancelling_discard_keeps_editor_and_tab() {
        let (mut state, mut runtime, mut view_data) = setup(TabKind::Claims);
        let scope = EditScope::provide();
        let edit = scope.handle();
        edit.register_nested_group(super::DETAIL_TAB_GROUP)
            .expect("register nested group");
        let (tx, rx) = channel();

        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Enter);
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('e'));
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('f'));
        drain(&mut state, &mut runtime, &mut view_data, &edit, &tx, &rx);

        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('n'));
        drain(&mut state, &mut runtime, &mut view_data, &edit, &tx, &rx);
        assert_eq!(state.active_tab, TabKind::Claims);
        assert!(view_data.detail.editing);
        assert!(edit.is_any_editing().expect("scope alive"));
        assert!(!edit.discard_dialog_visible().expect("scope alive"));
    }

    #[test]
    fn nested_detail_tabs_switch_freely_during_edit() {
        let (mut state, mut runtime, mut view_data) = setup(TabKind::Claims);
        let scope = EditScope::provide();
        let edit = scope.handle();
        edit.register_nested_group(super::DETAIL_TAB_GROUP)
            .expect("register nested group");
        let (tx, rx) = channel();

        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Enter);
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('e'));
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char(']'));
        drain(&mut state, &mut runtime, &mut view_data, &edit, &tx, &rx);

        assert_eq!(view_data.detail.nested_tab, 1);
        assert!(!edit.discard_dialog_visible().expect("scope alive"));
        assert!(view_data.detail.editing);
    }

    #[test]
    fn save_exits_edit_without_prompt() {
        let (mut state, mut runtime, mut view_data) = setup(TabKind::Claims);
        let scope = EditScope::provide();
        let edit = scope.handle();
        let (tx, rx) = channel();

        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Enter);
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('e'));
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('c'));
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('s'));
        drain(&mut state, &mut runtime, &mut view_data, &edit, &tx, &rx);

        assert_eq!(runtime.update_count, 1);
        assert_eq!(runtime.last_update, Some((TabKind::Claims, 1)));
        assert!(!view_data.detail.editing);
        assert!(!edit.is_any_editing().expect("scope alive"));
        assert!(!edit.discard_dialog_visible().expect("scope alive"));
        assert_eq!(state.mode, AppMode::Nav);
    }

    #[test]
    fn second_panel_cannot_start_editing() {
        let (mut state, mut runtime, mut view_data) = setup(TabKind::Claims);
        let scope = EditScope::provide();
        let edit = scope.handle();
        let (tx, _rx) = channel();

        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Enter);
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('e'));
        let first_editor = edit.active().expect("scope alive").expect("editor set");

        // Another panel claims to be active elsewhere: opening a second
        // detail and pressing 'e' must be refused while the slot is taken.
        view_data.detail.editing = false;
        view_data.detail.editor_id = "claims-2".to_owned();
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('e'));

        assert!(!view_data.detail.editing);
        assert_eq!(edit.active().expect("scope alive"), Some(first_editor));
    }

    #[test]
    fn esc_during_edit_prompts_before_discarding() {
        let (mut state, mut runtime, mut view_data) = setup(TabKind::Claims);
        let scope = EditScope::provide();
        let edit = scope.handle();
        let (tx, rx) = channel();

        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Enter);
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('e'));
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Esc);
        drain(&mut state, &mut runtime, &mut view_data, &edit, &tx, &rx);
        assert!(edit.discard_dialog_visible().expect("scope alive"));

        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('y'));
        drain(&mut state, &mut runtime, &mut view_data, &edit, &tx, &rx);
        assert!(!view_data.detail.editing);
        assert!(view_data.detail.visible);
        assert!(!edit.is_any_editing().expect("scope alive"));
    }

    #[test]
    fn quit_during_edit_prompts_and_skip_flag_bypasses_once() {
        let (mut state, mut runtime, mut view_data) = setup(TabKind::Claims);
        let scope = EditScope::provide();
        let edit = scope.handle();
        let (tx, rx) = channel();

        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Enter);
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('e'));

        let quit = press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('q'));
        assert!(!quit);
        assert!(edit.discard_dialog_visible().expect("scope alive"));
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('n'));

        edit.skip_next_confirmation().expect("scope alive");
        let quit = press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('q'));
        assert!(!quit);
        drain(&mut state, &mut runtime, &mut view_data, &edit, &tx, &rx);
        assert!(view_data.should_quit);
        assert!(!edit.discard_dialog_visible().expect("scope alive"));
    }

    #[test]
    fn create_form_maps_server_validation_errors() {
        let (mut state, mut runtime, mut view_data) = setup(TabKind::Products);
        let scope = EditScope::provide();
        let edit = scope.handle();
        let (tx, _rx) = channel();
        runtime.create_error = Some(ValidationErrors {
            errors: BTreeMap::from([(
                "code".to_owned(),
                vec!["has already been taken".to_owned()],
            )]),
        });

        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('a'));
        let form = view_data.form.as_mut().expect("form open");
        form.inputs = vec![
            "Travel 30".to_owned(),
            "TRV30".to_owned(),
            "accident".to_owned(),
            "medical_expense".to_owned(),
            "1".to_owned(),
            "30".to_owned(),
            "9.00".to_owned(),
        ];
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Enter);

        assert_eq!(runtime.create_count, 1);
        let form = view_data.form.as_ref().expect("form stays open on 422");
        assert_eq!(
            form.field_errors.get("code").map(String::as_str),
            Some("has already been taken"),
        );
    }

    #[test]
    fn create_form_blocks_client_side_invalid_payload() {
        let (mut state, mut runtime, mut view_data) = setup(TabKind::Products);
        let scope = EditScope::provide();
        let edit = scope.handle();
        let (tx, _rx) = channel();

        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('a'));
        let form = view_data.form.as_mut().expect("form open");
        form.inputs = vec![
            "Travel 30".to_owned(),
            "TRV30".to_owned(),
            "accident".to_owned(),
            String::new(),
            String::new(),
            String::new(),
            "9.00".to_owned(),
        ];
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Enter);

        // The scope rule fails client-side; the request never goes out.
        assert_eq!(runtime.create_count, 0);
        let form = view_data.form.as_ref().expect("form stays open");
        assert!(form.field_errors.contains_key("scopes"));
    }

    #[test]
    fn invoice_prefs_survive_tab_round_trip() {
        let mut state = AppState {
            active_tab: TabKind::Invoices,
            ..AppState::default()
        };
        let mut runtime = TestRuntime::with_products();
        let mut view_data = ViewData {
            invoice_memory: InvoiceTabPrefs {
                limit: 50,
                sort_filters: {
                    let mut params = polizza_app::SortFilterParams::default();
                    params.update_filter("status", "overdue");
                    params
                },
            },
            ..ViewData::default()
        };
        let (tx, _rx) = channel();

        refresh_for_tab(&mut state, &mut runtime, &mut view_data, &tx);
        let query = runtime.last_query.expect("invoice fetch");
        assert_eq!(query.limit, 50);
        let body = runtime.last_body.clone().expect("invoice body");
        assert_eq!(body.filters.len(), 1);

        // Leave for another tab and come back: the preferences persist.
        state.dispatch(polizza_app::AppCommand::GoToTab(TabKind::Claims));
        refresh_for_tab(&mut state, &mut runtime, &mut view_data, &tx);
        assert_eq!(runtime.last_query.expect("claims fetch").limit, 10);

        state.dispatch(polizza_app::AppCommand::GoToTab(TabKind::Invoices));
        refresh_for_tab(&mut state, &mut runtime, &mut view_data, &tx);
        assert_eq!(runtime.last_query.expect("invoice refetch").limit, 50);
    }

    #[test]
    fn load_failure_surfaces_error_status() {
        struct FailingRuntime;
        impl AppRuntime for FailingRuntime {
            fn search_tab(
                &mut self,
                _tab: TabKind,
                _page: &PageQuery,
                _body: &SearchBody,
            ) -> Result<TabPage> {
                Err(anyhow!("cannot reach backend"))
            }
            fn submit_create(&mut self, _payload: &FormPayload) -> Result<()> {
                Ok(())
            }
            fn submit_update(
                &mut self,
                _tab: TabKind,
                _row_id: i64,
                _payload: &FormPayload,
            ) -> Result<()> {
                Ok(())
            }
        }

        let mut state = AppState::default();
        let mut view_data = ViewData::default();
        let (tx, _rx) = channel();
        fetch_active_tab(&mut state, &mut FailingRuntime, &mut view_data, &tx);

        assert!(view_data.page_data.is_none());
        let status = state.status_line.expect("error status set");
        assert!(status.contains("load failed"));
        assert!(status.contains("cannot reach backend"));
    }

    #[test]
    fn submit_error_mapping_recognizes_both_validation_shapes() {
        let mut errors = BTreeMap::new();
        let validation: anyhow::Error = ValidationErrors {
            errors: BTreeMap::from([("name".to_owned(), vec!["is required".to_owned()])]),
        }
        .into();
        assert!(apply_submit_error(&mut errors, &validation));
        assert_eq!(errors.get("name").map(String::as_str), Some("is required"));

        let field: anyhow::Error = polizza_app::FieldError {
            field: "scopes",
            message: "at least one scope is required".to_owned(),
        }
        .into();
        assert!(apply_submit_error(&mut errors, &field));
        assert!(errors.contains_key("scopes"));

        let other = anyhow!("boom");
        assert!(!apply_submit_error(&mut errors, &other));
    }

    #[test]
    fn payload_parsing_reports_field_keyed_errors() {
        let inputs = vec![
            "POL-1".to_owned(),
            "not-a-number".to_owned(),
            "2".to_owned(),
            "active".to_owned(),
            "2026-01-01".to_owned(),
            String::new(),
            "1200".to_owned(),
            "500000".to_owned(),
        ];
        let error = payload_from_inputs(FormKind::Policy, &inputs)
            .expect_err("bad customer id should fail");
        assert_eq!(error.field, "customer_id");

        let inputs = vec![
            "11".to_owned(),
            "open".to_owned(),
            "02/01/2026".to_owned(),
            "2026-02-03".to_owned(),
            "800".to_owned(),
            "Water damage".to_owned(),
        ];
        let error =
            payload_from_inputs(FormKind::Claim, &inputs).expect_err("bad date should fail");
        assert_eq!(error.field, "incident_date");
    }

    #[test]
    fn money_parsing_accepts_common_shapes() {
        assert_eq!(parse_cents("amount", "1200").expect("whole"), 120_000);
        assert_eq!(parse_cents("amount", "1,200.50").expect("comma"), 120_050);
        assert_eq!(parse_cents("amount", "$99.9").expect("dollar"), 9_990);
        assert!(parse_cents("amount", "12.345").is_err());
        assert!(parse_cents("amount", "").is_err());
    }

    #[test]
    fn money_formatting_groups_thousands() {
        assert_eq!(format_cents(120_050), "$1,200.50");
        assert_eq!(format_cents(-9_990), "-$99.90");
        assert_eq!(comma_format(1_234_567), "1,234,567");
    }

    #[test]
    fn status_text_shows_mode_badge() {
        let state = AppState::default();
        let view_data = ViewData::default();
        assert!(status_text(&state, &view_data).starts_with("NAV"));

        let state = AppState {
            mode: AppMode::Edit,
            ..AppState::default()
        };
        assert!(status_text(&state, &view_data).starts_with("EDIT"));
    }

    #[test]
    fn help_overlay_documents_edit_and_search_keys() {
        let help = help_overlay_text();
        assert!(help.contains("search (debounced)"));
        assert!(help.contains("edit panel"));
        assert!(help.contains("multi-sort"));
    }

    #[test]
    fn end_to_end_search_scenario_matches_backend_contract() {
        let (mut state, mut runtime, mut view_data) = setup(TabKind::Products);
        let scope = EditScope::provide();
        let edit = scope.handle();
        let (tx, _rx) = channel();

        // Page 1, limit 10 on load.
        let query = runtime.last_query.expect("initial fetch");
        assert_eq!((query.page, query.limit), (1, 10));

        // User types a search; the fetch carries the normalized shapes.
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char('/'));
        for ch in "storm".chars() {
            press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Char(ch));
        }
        press(&mut state, &mut runtime, &mut view_data, &edit, &tx, KeyCode::Enter);

        let query = runtime.last_query.expect("search fetch");
        assert_eq!((query.page, query.limit), (1, 10));
        let body = serde_json::to_value(runtime.last_body.clone().expect("search body"))
            .expect("serialize body");
        assert_eq!(
            body,
            serde_json::json!({
                "search": {"value": "storm"},
                "sort": [],
                "filters": [],
            }),
        );
    }
}
