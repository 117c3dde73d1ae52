use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::store_io::{GoalFile, PersistError, SaveOutcome};
use crate::io::{config_io, options_io, recovery};
use crate::model::config::AppConfig;
use crate::model::goal::Goal;
use crate::model::options::UserOptions;
use crate::model::store::GoalStore;
use crate::ops::check;
use crate::ops::search::SearchCriteria;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Entries shown by `gk recovery` without --limit
const DEFAULT_RECOVERY_LIMIT: usize = 10;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let dir = resolve_dir(cli.project_dir.as_deref())?;

    match cli.command {
        // Read commands
        Commands::List(args) => cmd_list(&dir, args, json),
        Commands::Check => cmd_check(&dir, json),
        Commands::Recovery(args) => cmd_recovery(&dir, args, json),

        // Write commands
        Commands::Add(args) => cmd_add(&dir, args, json),
        Commands::Edit(args) => cmd_edit(&dir, args, json),
        Commands::Delete(args) => cmd_delete(&dir, args, json),

        // Options
        Commands::Sort(args) => cmd_sort(&dir, args, json),
        Commands::Set(args) => cmd_set(&dir, args, json),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn resolve_dir(project_dir: Option<&str>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match project_dir {
        Some(dir) => Ok(fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?),
        None => Ok(std::env::current_dir()?),
    }
}

/// Everything a command needs: configuration, user options and the goals.
struct Session {
    config: AppConfig,
    options: UserOptions,
    file: GoalFile,
    store: GoalStore,
    /// Why the goal file only loaded in part
    partial: Option<PersistError>,
}

impl Session {
    /// Load config, options and goals. A goal file that cannot be read at
    /// all is an error; a malformed one loads in part.
    fn open(dir: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let config = config_io::read_config(dir)?;
        let options = load_user_options(dir, &config)?;
        let file = GoalFile::new(dir.join(&config.data_file)).with_backup(config.backup);
        let mut store = GoalStore::new();
        let partial = match file.load(&mut store).error {
            Some(e @ PersistError::ReadError { .. }) => return Err(e.into()),
            other => other,
        };
        Ok(Session {
            config,
            options,
            file,
            store,
            partial,
        })
    }

    /// Refuse to rewrite a goal file that only loaded in part, unless
    /// `force` is set. The unread part is in the recovery log either way.
    fn ensure_writable(&self, force: bool) -> CmdResult {
        match &self.partial {
            Some(e) if !force => Err(format!(
                "{}\nrefusing to rewrite a goal file that only loaded in part; \
                 fix it (see `gk check`) or pass --force to drop the unread part",
                e
            )
            .into()),
            Some(e) => {
                tracing::warn!(error = %e, "rewriting partially loaded goal file");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Apply this run's filters and ordering, then bring the views up to
    /// date. Nothing here is persisted.
    fn select(&mut self, view: &ViewArgs) -> CmdResult {
        if let Some(ref prefs) = view.sort {
            self.options.set_sort_prefs(prefs)?;
        }
        self.options.set_search_criteria(view_criteria(view));
        self.store.refresh(&self.options);
        Ok(())
    }

    /// Resolve a 1-based position in the current view
    fn resolve(&self, slot: usize) -> Result<(usize, Goal), Box<dyn std::error::Error>> {
        slot.checked_sub(1)
            .and_then(|i| self.store.get(i).map(|(_, g)| (i, g.clone())))
            .ok_or_else(|| {
                format!(
                    "no goal at position {}; {} shown",
                    slot,
                    self.store.sorted_indices().len()
                )
                .into()
            })
    }

    fn save(&mut self) -> CmdResult {
        if let SaveOutcome::Written { records } = self.file.save(&mut self.store)? {
            tracing::debug!(records, "goal file updated");
        }
        Ok(())
    }
}

fn view_criteria(view: &ViewArgs) -> SearchCriteria {
    SearchCriteria {
        name: view.name.clone().unwrap_or_default(),
        priority: view.priority,
        completion: view.completion,
        unit_cost: view.cost,
    }
}

fn options_path(dir: &Path, config: &AppConfig) -> PathBuf {
    dir.join(&config.options_file)
}

fn load_user_options(
    dir: &Path,
    config: &AppConfig,
) -> Result<UserOptions, Box<dyn std::error::Error>> {
    let mut options = UserOptions::default();
    options_io::load_options(&options_path(dir, config), &mut options)?;
    Ok(options)
}

/// Directory that holds the goal file and its recovery log
fn data_dir(dir: &Path, config: &AppConfig) -> PathBuf {
    let data_path = dir.join(&config.data_file);
    match data_path.parent() {
        Some(parent) => parent.to_path_buf(),
        None => dir.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_list(dir: &Path, args: ListArgs, json: bool) -> CmdResult {
    let mut session = Session::open(dir)?;
    session.select(&args.view)?;
    let store = &session.store;
    let options = &session.options;

    if json {
        let list = GoalListJson {
            sort: options.sort_prefs().to_string(),
            total: store.active_count(),
            matched: store.search_count(),
            goals: store
                .visible()
                .enumerate()
                .map(|(i, g)| goal_to_json(i + 1, g))
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    let numbered = options.show_numbers;
    let paged = options.paging && !args.all;
    let (start, count) = if paged {
        let size = session.config.page_size.max(1);
        (args.page.saturating_sub(1).saturating_mul(size), size)
    } else {
        (0, usize::MAX)
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if options.verbose {
        writeln!(out, "{}", table_header(numbered))?;
        writeln!(out, "{}", table_ruler(numbered))?;
    }
    let next = store.print_range(&mut out, start, count, numbered)?;
    if options.verbose {
        writeln!(out, "{}", table_ruler(numbered))?;
        writeln!(
            out,
            "{} of {} goals shown, {}",
            store.search_count(),
            store.active_count(),
            describe_sort(options)
        )?;
    }
    if paged && next != 0 {
        writeln!(out, "-- more: gk list --page {} --", args.page.max(1) + 1)?;
    }
    Ok(())
}

fn cmd_check(dir: &Path, json: bool) -> CmdResult {
    let config = config_io::read_config(dir)?;
    let path = dir.join(&config.data_file);
    let source = match fs::read(&path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            println!("no goal file at {}", path.display());
            return Ok(());
        }
        Err(e) => return Err(format!("could not read {}: {}", path.display(), e).into()),
    };
    let result = check::check_goals(&source);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if !result.errors.is_empty() {
        println!("Errors:");
        for err in &result.errors {
            match err {
                check::CheckError::Malformed {
                    message, before, ..
                } => {
                    println!("  {} ({} goals before it)", message, before);
                }
            }
        }
    }
    if !result.warnings.is_empty() {
        if !result.errors.is_empty() {
            println!();
        }
        println!("Warnings:");
        for warn in &result.warnings {
            match warn {
                check::CheckWarning::DuplicateName { name, position } => {
                    println!("  goal {} repeats the name \"{}\"", position, name);
                }
                check::CheckWarning::EmptyName { position } => {
                    println!("  goal {} has no name", position);
                }
            }
        }
    }
    if result.valid {
        println!("✓ goal file is valid ({} goals)", result.records);
    } else {
        println!("✗ goal file has errors");
    }
    Ok(())
}

fn cmd_recovery(dir: &Path, args: RecoveryCmd, json: bool) -> CmdResult {
    let config = config_io::read_config(dir)?;
    let log_dir = data_dir(dir, &config);

    if let Some(RecoveryAction::Path) = args.action {
        println!("{}", recovery::recovery_log_path(&log_dir).display());
        return Ok(());
    }

    let limit = args.limit.unwrap_or(DEFAULT_RECOVERY_LIMIT);
    let entries = recovery::read_recovery_entries(&log_dir, Some(limit));

    if json {
        let out: Vec<RecoveryEntryJson> = entries.iter().map(recovery_entry_to_json).collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("recovery log is empty");
        return Ok(());
    }
    for entry in &entries {
        println!(
            "{}  {}: {}",
            entry
                .timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            entry.category,
            entry.description
        );
        for (key, value) in &entry.fields {
            println!("  {}: {}", key, value);
        }
        for line in entry.body.lines() {
            println!("    | {}", line);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_add(dir: &Path, args: AddArgs, json: bool) -> CmdResult {
    let mut session = Session::open(dir)?;
    session.ensure_writable(args.force)?;
    session.select(&ViewArgs::default())?;

    let goal = Goal::new(args.name, args.priority, args.completion, args.cost);
    let idx = session.store.insert(goal)?;
    session.save()?;

    session.store.refresh(&session.options);
    let slot = session
        .store
        .sorted_indices()
        .iter()
        .position(|&i| i == idx)
        .map_or(0, |p| p + 1);
    let Some(goal) = session.store.raw(idx) else {
        return Ok(());
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&goal_to_json(slot, goal))?);
    } else {
        println!("{}", slot);
    }
    Ok(())
}

fn cmd_edit(dir: &Path, args: EditArgs, json: bool) -> CmdResult {
    let mut session = Session::open(dir)?;
    session.ensure_writable(args.force)?;
    session.select(&args.view)?;

    let (slot, mut goal) = session.resolve(args.slot)?;
    if let Some(name) = args.new_name {
        goal.name = name;
    }
    if let Some(priority) = args.new_priority {
        goal.priority = priority;
    }
    if let Some(completion) = args.new_completion {
        goal.completion = completion;
    }
    if let Some(cost) = args.new_cost {
        goal.unit_cost = cost;
    }

    session.store.modify(slot, goal.clone())?;
    session.save()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&goal_to_json(args.slot, &goal))?);
    } else {
        println!("{}", goal);
    }
    Ok(())
}

fn cmd_delete(dir: &Path, args: DeleteArgs, json: bool) -> CmdResult {
    let mut session = Session::open(dir)?;
    session.ensure_writable(args.force)?;
    session.select(&args.view)?;

    let (slot, _) = session.resolve(args.slot)?;
    let removed = session.store.delete(slot)?;
    session.save()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&goal_to_json(args.slot, &removed))?);
    } else {
        println!("deleted \"{}\"", removed.name);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

fn cmd_sort(dir: &Path, args: SortArgs, json: bool) -> CmdResult {
    let config = config_io::read_config(dir)?;
    let mut options = load_user_options(dir, &config)?;

    if let Some(prefs) = args.prefs {
        let prefs = if prefs == "-" { "" } else { prefs.as_str() };
        let before = options.sort_version();
        options.set_sort_prefs(prefs)?;
        if options.sort_version() != before {
            options_io::save_options(&options_path(dir, &config), &options)?;
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&options_to_json(&options))?);
    } else {
        println!("{}", describe_sort(&options));
    }
    Ok(())
}

fn cmd_set(dir: &Path, args: SetArgs, json: bool) -> CmdResult {
    let config = config_io::read_config(dir)?;
    let mut options = load_user_options(dir, &config)?;

    let mut changed = false;
    for (value, slot) in [
        (args.verbose, &mut options.verbose),
        (args.paging, &mut options.paging),
        (args.numbers, &mut options.show_numbers),
    ] {
        if let Some(v) = value
            && *slot != v
        {
            *slot = v;
            changed = true;
        }
    }
    if changed {
        options_io::save_options(&options_path(dir, &config), &options)?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&options_to_json(&options))?);
    } else {
        println!("verbose: {}", options.verbose);
        println!("paging: {}", options.paging);
        println!("numbers: {}", options.show_numbers);
        println!("sort: {}", options.sort_prefs());
    }
    Ok(())
}
