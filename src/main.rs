use anyhow::{anyhow, bail, Context, Result};
use crossterm::style::Stylize;
use record_explorer::config::Config;
use record_explorer::data::record_set::RecordSet;
use record_explorer::data::record_sort::SortSpec;
use record_explorer::data::value::Value;
use record_explorer::search::{Filter, FilterOperator};
use record_explorer::utils::app_paths::AppPaths;
use record_explorer::utils::logging::{init_tracing, LogRingBuffer};
use record_explorer::views::{FileStore, ViewStore};
use record_explorer::{ExplorerSession, SessionOptions};
use reedline::{
    default_emacs_keybindings, ColumnarMenu, Emacs, FileBackedHistory, KeyCode, KeyModifiers,
    MenuBuilder, Prompt, PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus, Reedline,
    ReedlineEvent, ReedlineMenu, Signal,
};
use std::borrow::Cow;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

mod completer;
mod table_display;

use completer::ExplorerCompleter;
use table_display::{display_inspection, display_results, export_to_csv};

type Session = ExplorerSession<FileStore>;

struct ExplorerPrompt {
    label: String,
}

impl Prompt for ExplorerPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.label)
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, edit_mode: PromptEditMode) -> Cow<'_, str> {
        match edit_mode {
            PromptEditMode::Default | PromptEditMode::Emacs => "> ".into(),
            PromptEditMode::Vi(vi_mode) => match vi_mode {
                reedline::PromptViMode::Normal => "N> ".into(),
                reedline::PromptViMode::Insert => "I> ".into(),
            },
            PromptEditMode::Custom(str) => format!("{str}> ").into(),
        }
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("... ")
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<'_, str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };
        Cow::Owned(format!(
            "({}reverse search: {})",
            prefix, history_search.term
        ))
    }
}

fn print_usage() {
    println!("{}", "Record Explorer - filter, search and inspect JSON records".blue().bold());
    println!();
    println!("{}", "Usage:".yellow());
    println!("  record-explorer [OPTIONS] [FILE.json]");
    println!();
    println!("{}", "Options:".yellow());
    println!("  {}      - Initialize configuration with wizard", "--init-config".green());
    println!("  {}  - Generate config file with defaults", "--generate-config".green());
    println!("  {}             - Show this help", "--help".green());
    println!();
}

fn print_help() {
    println!("{}", "Data:".yellow());
    println!("  {}            - Load a JSON array of records", "\\load <file>".green());
    println!("  {}                 - List every field path", "\\fields".green());
    println!("  {}          - Show page n of the results", "\\page [n]".green());
    println!("  {}                 - Records shown / total", "\\status".green());
    println!();
    println!("{}", "Search and filters:".yellow());
    println!("  {}      - Set the search query (empty clears)", "\\search <query>".green());
    println!("      status:active  score>500  user.name=\"John Doe\"  free text");
    println!("  {} - Add a filter", "\\filter <field> <op> <value>".green());
    println!("      ops: equals, contains, gt, lt, between <min> <max>");
    println!("  {}         - Filter on the selected record's value", "\\pick <field>".green());
    println!("  {}            - Remove filter by number", "\\unfilter <n>".green());
    println!("  {}    - Clear filters, or everything", "\\clear [filters|all]".green());
    println!();
    println!("{}", "Columns:".yellow());
    println!("  {}               - List columns", "\\columns".green());
    println!("  {}     - Show or hide a column", "\\show|\\hide <path>".green());
    println!("  {}    - Move a column", "\\left|\\right <key>".green());
    println!("  {}     - Reorder visible columns", "\\reorder <keys...>".green());
    println!("  {}  - Sort (\\sort off to clear)", "\\sort <key> [asc|desc]".green());
    println!();
    println!("{}", "Views:".yellow());
    println!("  {}         - List or search saved views", "\\views [query]".green());
    println!("  {} - Save the current state", "\\save <name> [| description]".green());
    println!("  {}  - Apply, delete, make default, toggle favorite",
        "\\apply|\\delete|\\default|\\fav <view>".green());
    println!();
    println!("{}", "Records:".yellow());
    println!("  {}  - Select a record / step through results", "\\select <id>, \\next, \\prev".green());
    println!("  {}  - Inspect the selection (/text searches it)", "\\inspect [field] [/text]".green());
    println!();
    println!("{}", "Other:".yellow());
    println!("  {}        - Export visible rows to CSV", "\\export <file>".green());
    println!("  {}             - Show recent log entries", "\\logs [n]".green());
    println!("  {}  - Help / exit", "\\help, \\quit".green());
    println!();
}

/// Literal typed in the shell: number, boolean, or text
fn parse_literal(text: &str) -> Value {
    let text = text.trim().trim_matches('"');
    if let Ok(n) = text.parse::<f64>() {
        return Value::Number(n);
    }
    match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::from(text),
    }
}

struct Shell {
    session: Session,
    config: Config,
    logs: LogRingBuffer,
    field_paths: Arc<Mutex<Vec<String>>>,
    page: usize,
}

impl Shell {
    fn refresh_field_paths(&self) {
        let paths = self.session.field_paths();
        *self.field_paths.lock().unwrap_or_else(|e| e.into_inner()) = paths;
    }

    fn load(&mut self, path: &str) -> Result<()> {
        let records = RecordSet::load_json_file(path)?;
        self.session.set_records(Arc::new(records));
        self.page = 0;
        self.refresh_field_paths();
        self.show_page()
    }

    fn show_page(&mut self) -> Result<()> {
        let page_size = self.config.display.page_size.max(1);
        let columns = self.session.visible_columns();
        let selected = self.session.selected_id().map(str::to_string);
        let records = self.session.visible_records();

        let pages = records.len().div_ceil(page_size).max(1);
        let page = self.page.min(pages - 1);
        let start = page * page_size;
        let end = (start + page_size).min(records.len());

        display_results(
            &records[start..end],
            &columns,
            start,
            self.config.display.cell_truncate_length,
            self.config.display.show_row_numbers,
            selected.as_deref(),
        );
        self.page = page;
        println!(
            "{}",
            format!("{} | page {} of {}", self.session.status_summary(), page + 1, pages).green()
        );
        Ok(())
    }

    fn resolve_view(&self, key: &str) -> Result<String> {
        self.session
            .views()
            .find(|v| v.id == key || v.name.eq_ignore_ascii_case(key))
            .map(|v| v.id.clone())
            .ok_or_else(|| anyhow!("No saved view named '{}'", key))
    }

    fn add_filter(&mut self, args: &str) -> Result<()> {
        let parts: Vec<&str> = args.split_whitespace().collect();
        let [field, op, rest @ ..] = parts.as_slice() else {
            bail!("Usage: \\filter <field> <op> <value>");
        };
        let operator: FilterOperator = op.parse()?;
        let filter = match operator {
            FilterOperator::Range => match rest {
                [min, max] => Filter::range(*field, parse_literal(min), parse_literal(max)),
                _ => bail!("Usage: \\filter <field> between <min> <max>"),
            },
            _ if rest.is_empty() => bail!("Usage: \\filter <field> <op> <value>"),
            _ => Filter::new(*field, operator, parse_literal(&rest.join(" "))),
        };
        let label = filter.label();
        self.session.add_filter(filter)?;
        println!("{}", format!("Filter added: {}", label).green());
        self.page = 0;
        self.show_page()
    }

    fn pick_filter(&mut self, field: &str) -> Result<()> {
        let value = self
            .session
            .selected_record()
            .and_then(|r| record_explorer::data::path::resolve(r, field))
            .cloned()
            .ok_or_else(|| anyhow!("Select a record with a value at '{}' first", field))?;
        let label = self.session.add_filter_for_value(field, &value)?;
        println!("{}", format!("Filter added: {}", label).green());
        self.page = 0;
        self.show_page()
    }

    fn list_filters(&self) {
        if self.session.filters().is_empty() {
            println!("{}", "No filters applied.".yellow());
            return;
        }
        for (i, filter) in self.session.filters().iter().enumerate() {
            println!("  {} {}", format!("{}.", i + 1).cyan(), filter.label());
        }
    }

    fn list_columns(&self) {
        for (column, visible) in self.session.columns().all_columns() {
            let marker = if visible { "[x]" } else { "[ ]" };
            let pin = if column.fixed { " (pinned)" } else { "" };
            println!("  {} {} ({}){}", marker, column.title, column.key, pin);
        }
    }

    fn list_views(&self, query: &str) {
        let views = self.session.views();
        if views.is_empty() {
            println!("{}", "No saved views.".yellow());
            return;
        }
        let active = self.session.active_view().map(|v| v.id.as_str());
        let mut listed = views.search(query);
        if listed.is_empty() && !query.trim().is_empty() {
            // Fall back to fuzzy ranking when no substring hit
            let ranked = views.fuzzy_search(query.trim());
            listed = ranked
                .iter()
                .filter_map(|m| views.get(&m.view.id))
                .collect();
        }
        for view in listed {
            let mut flags = String::new();
            if view.is_default {
                flags.push_str(" [default]");
            }
            if view.is_favorite {
                flags.push_str(" *");
            }
            if Some(view.id.as_str()) == active {
                flags.push_str(" (active)");
            }
            println!(
                "  {}{} - {} filters, {} columns{}",
                view.name.as_str().cyan(),
                flags,
                view.filters.len(),
                view.columns.len(),
                view.description
                    .as_deref()
                    .map(|d| format!(" - {}", d))
                    .unwrap_or_default()
            );
        }
    }

    fn inspect(&mut self, args: &str) -> Result<()> {
        let (field, query) = match args.split_once('/') {
            Some((field, query)) => (field.trim(), Some(query.trim())),
            None => (args.trim(), None),
        };
        let flat = if field.is_empty() {
            self.session.inspect_selected()
        } else {
            self.session.inspect_value(field)
        };
        match flat {
            Some(flat) => display_inspection(&flat, query.filter(|q| !q.is_empty())),
            None => bail!("Nothing to inspect, select a record first"),
        }
        Ok(())
    }

    fn step(&mut self, forward: bool) -> Result<()> {
        let moved = if forward {
            self.session.select_next()
        } else {
            self.session.select_previous()
        };
        if !moved {
            println!("{}", "No more records in that direction.".yellow());
        }
        self.announce_selection();
        Ok(())
    }

    fn announce_selection(&mut self) {
        let total = self.session.visible_count();
        if let (Some(id), Some(pos)) = (
            self.session.selected_id().map(str::to_string),
            self.session.selected_position(),
        ) {
            println!("{}", format!("Selected {} ({} of {})", id, pos + 1, total).cyan());
        }
    }

    fn export(&mut self, filename: &str) -> Result<()> {
        let columns = self.session.visible_columns();
        let records = self.session.visible_records();
        let written = export_to_csv(&records, &columns, filename)?;
        println!("{}", format!("Exported {} rows to {}", written, filename).green());
        Ok(())
    }

    fn show_logs(&self, count: usize) {
        for entry in self.logs.get_recent(count) {
            println!("{}", entry.format_for_display());
        }
    }

    /// Run one command line. Returns false when the shell should exit.
    fn execute(&mut self, line: &str) -> Result<bool> {
        let (command, args) = match line.split_once(char::is_whitespace) {
            Some((command, args)) => (command, args.trim()),
            None => (line, ""),
        };

        match command {
            "\\quit" | "\\exit" => return Ok(false),
            "\\help" => print_help(),
            "\\load" if !args.is_empty() => self.load(args)?,
            "\\fields" => {
                for path in self.session.field_paths() {
                    println!("  {}", path);
                }
            }
            "\\page" => {
                self.page = match args {
                    "" => self.page,
                    n => n.parse::<usize>().context("Page must be a number")?.saturating_sub(1),
                };
                self.show_page()?;
            }
            "\\status" => println!("{}", self.session.status_summary()),
            "\\search" => {
                self.session.set_search_query(args);
                self.page = 0;
                self.show_page()?;
            }
            "\\filter" if args.is_empty() => self.list_filters(),
            "\\filter" => self.add_filter(args)?,
            "\\pick" if !args.is_empty() => self.pick_filter(args)?,
            "\\unfilter" => {
                let n: usize = args.parse().context("Usage: \\unfilter <n>")?;
                let removed = self.session.remove_filter_at(n.saturating_sub(1))?;
                println!("{}", format!("Removed filter: {}", removed.label()).green());
                self.show_page()?;
            }
            "\\clear" => {
                if args == "all" {
                    self.session.clear_all();
                } else {
                    let n = self.session.clear_filters();
                    println!("{}", format!("Cleared {} filters", n).green());
                }
                self.page = 0;
                self.show_page()?;
            }
            "\\columns" => self.list_columns(),
            "\\show" if !args.is_empty() => {
                self.session.add_column(args)?;
                self.show_page()?;
            }
            "\\hide" if !args.is_empty() => {
                self.session.remove_column(args)?;
                self.show_page()?;
            }
            "\\left" | "\\right" if !args.is_empty() => {
                let moved = if command == "\\left" {
                    self.session.move_column_left(args)
                } else {
                    self.session.move_column_right(args)
                };
                if !moved {
                    bail!("Column '{}' is not shown", args);
                }
                self.show_page()?;
            }
            "\\reorder" if !args.is_empty() => {
                let order: Vec<String> = args.split_whitespace().map(str::to_string).collect();
                if !self.session.reorder_columns(&order) {
                    println!("{}", "Column order unchanged.".yellow());
                }
                self.show_page()?;
            }
            "\\sort" if !args.is_empty() => {
                let mut parts = args.split_whitespace();
                let sort = match (parts.next(), parts.next()) {
                    (Some("off"), None) => None,
                    (Some(key), None | Some("asc")) => Some(SortSpec::ascending(key)),
                    (Some(key), Some("desc")) => Some(SortSpec::descending(key)),
                    _ => bail!("Usage: \\sort <key> [asc|desc]"),
                };
                self.session.set_sort(sort);
                self.show_page()?;
            }
            "\\views" => self.list_views(args),
            "\\save" if !args.is_empty() => {
                let (name, description) = match args.split_once('|') {
                    Some((name, desc)) => (name.trim(), Some(desc.trim()).filter(|d| !d.is_empty())),
                    None => (args, None),
                };
                self.session.save_view(name, description)?;
                println!("{}", format!("View '{}' saved", name).green());
            }
            "\\apply" if !args.is_empty() => {
                let id = self.resolve_view(args)?;
                self.session.apply_view(&id)?;
                self.page = 0;
                self.show_page()?;
            }
            "\\delete" if !args.is_empty() => {
                let id = self.resolve_view(args)?;
                self.session.delete_view(&id)?;
                println!("{}", "View deleted".green());
            }
            "\\default" if !args.is_empty() => {
                let id = self.resolve_view(args)?;
                self.session.set_default_view(&id)?;
                println!("{}", "Default view updated".green());
            }
            "\\fav" if !args.is_empty() => {
                let id = self.resolve_view(args)?;
                let favorite = self.session.toggle_favorite_view(&id)?;
                println!("{}", if favorite { "Marked favorite" } else { "Unmarked favorite" }.green());
            }
            "\\select" if !args.is_empty() => {
                self.session.select(args)?;
                self.announce_selection();
            }
            "\\next" => self.step(true)?,
            "\\prev" => self.step(false)?,
            "\\inspect" => self.inspect(args)?,
            "\\export" if !args.is_empty() => self.export(args)?,
            "\\logs" => {
                let count = if args.is_empty() { 20 } else { args.parse().unwrap_or(20) };
                self.show_logs(count);
            }
            _ if !line.starts_with('\\') => {
                // Bare text is a search query
                self.session.set_search_query(line);
                self.page = 0;
                self.show_page()?;
            }
            _ => bail!("Unknown command or missing argument: {} (try \\help)", command),
        }
        Ok(true)
    }
}

fn build_session(config: &Config) -> Result<Session> {
    let dir = match &config.behavior.storage_dir {
        Some(dir) => dir.clone(),
        None => AppPaths::views_dir()?,
    };
    let views = ViewStore::open(FileStore::new(dir), config.behavior.views_slot.clone());
    Ok(ExplorerSession::new(
        Arc::new(RecordSet::empty()),
        views,
        SessionOptions::from(config),
    ))
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        print_help();
        return Ok(());
    }

    if args.contains(&"--init-config".to_string()) {
        Config::init_wizard()?;
        println!("\nConfiguration initialized successfully!");
        return Ok(());
    }

    if args.contains(&"--generate-config".to_string()) {
        let path = Config::get_config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Error creating config directory {:?}", parent))?;
        }
        std::fs::write(&path, Config::create_default_with_comments())
            .with_context(|| format!("Error writing config file {:?}", path))?;
        println!("Configuration file created at: {:?}", path);
        return Ok(());
    }

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Config not loaded ({}), using defaults", e);
        Config::default()
    });
    let logs = init_tracing(&config.logging)?;

    let data_file = args
        .iter()
        .skip(1)
        .find(|arg| !arg.starts_with("--"))
        .cloned();

    let mut shell = Shell {
        session: build_session(&config)?,
        config,
        logs,
        field_paths: Arc::new(Mutex::new(Vec::new())),
        page: 0,
    };

    if let Some(default) = shell.session.views().default_view() {
        info!(target: "session", "Started with default view '{}'", default.name);
    }

    print_usage();
    match &data_file {
        Some(path) => {
            if let Err(e) = shell.load(path) {
                eprintln!("{}", format!("Error: {:#}", e).red());
            }
        }
        None => println!("{}", "No file given, use \\load <file.json>".yellow()),
    }

    let history_file = AppPaths::shell_history_file()?;
    let history = Box::new(
        FileBackedHistory::with_file(100, history_file).context("Error configuring history")?,
    );

    let completer = Box::new(ExplorerCompleter::new(Arc::clone(&shell.field_paths)));
    let completion_menu = Box::new(
        ColumnarMenu::default()
            .with_name("explorer_completion")
            .with_columns(1)
            .with_column_width(None)
            .with_column_padding(2),
    );

    let mut keybindings = default_emacs_keybindings();
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Tab,
        ReedlineEvent::Menu("explorer_completion".to_string()),
    );

    let mut line_editor = Reedline::create()
        .with_completer(completer)
        .with_menu(ReedlineMenu::EngineCompleter(completion_menu))
        .with_history(history)
        .with_edit_mode(Box::new(Emacs::new(keybindings)));

    let prompt = ExplorerPrompt {
        label: "explore".to_string(),
    };

    loop {
        let sig = line_editor.read_line(&prompt)?;
        match sig {
            Signal::Success(buffer) => {
                let trimmed = buffer.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match shell.execute(trimmed) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => {
                        warn!(target: "session", "Command failed: {:#}", e);
                        eprintln!("{}", format!("{:#}", e).red());
                    }
                }
            }
            Signal::CtrlD | Signal::CtrlC => break,
        }
    }

    println!("\nGoodbye!");
    Ok(())
}
