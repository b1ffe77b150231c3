mod editor;

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use editor::ImageEditor;
use projectpages_core::{default_log_level, flush_logs, init_logging, normalize_path};
use projectpages_project::{validate, ExportOptions, ImportSkip, SyncEngine, Validation};
use projectpages_settings::{RecentProjectsStore, SettingsStore, DEFAULT_RECENT_CAPACITY};

const SETTINGS_DIR: &str = ".projectpages";
const RECENT_FILE: &str = "recent.db";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Parser)]
#[command(
    name = "projectpages-cli",
    about = "Command-line tools for Project Pages archives",
    author,
    version
)]
struct Cli {
    /// 設定資料夾所在的工作區；預設為目前目錄。 / Workspace holding `.projectpages/` (defaults to current directory).
    #[arg(long, global = true, value_name = "PATH")]
    workspace: Option<PathBuf>,

    /// 啟用檔案日誌並寫入此資料夾。 / Enable file logging into this directory.
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// 日誌等級。 / Log level (trace|debug|info|warn|error).
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    /// 關閉時保留工作資料夾。 / Keep the unpacked working directory after the command.
    #[arg(long, global = true)]
    keep_working_dir: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 建立新專案。 / Create a new project archive.
    New(NewArgs),
    /// 檢查壓縮檔是否為有效專案。 / Check whether an archive is a valid project.
    Validate(ArchiveArg),
    /// 列出專案頁面與設定。 / Show pages and control settings of a project.
    Info(ArchiveArg),
    /// 匯入圖片為新頁面。 / Import image files as new pages.
    Import(ImportArgs),
    /// 將頁面移入垃圾桶。 / Move a page into the project trash.
    Delete(RowArgs),
    /// 讀取或寫入頁面筆記。 / Print or replace the note of a page.
    Note(NoteArgs),
    /// 依序重新命名所有頁面。 / Renumber every page under a new base name.
    Rename(RenameArgs),
    /// 將所有頁面匯出為圖片。 / Flatten every page into image files.
    Export(ExportArgs),
    /// 管理最近使用的專案清單。 / Manage the recent projects list.
    #[command(subcommand)]
    Recent(RecentCommand),
}

#[derive(Args)]
struct NewArgs {
    /// 專案所在資料夾。 / Directory that will hold the project.
    #[arg(value_name = "DIR")]
    dir: PathBuf,
    /// 專案名稱。 / Project name.
    #[arg(value_name = "NAME")]
    name: String,
}

#[derive(Args)]
struct ArchiveArg {
    #[arg(value_name = "ARCHIVE")]
    archive: PathBuf,
}

#[derive(Args)]
struct ImportArgs {
    #[arg(value_name = "ARCHIVE")]
    archive: PathBuf,
    /// 要匯入的圖片。 / Image files to import.
    #[arg(value_name = "FILES", required = true)]
    files: Vec<PathBuf>,
}

#[derive(Args)]
struct RowArgs {
    #[arg(value_name = "ARCHIVE")]
    archive: PathBuf,
    /// 頁面編號（從 1 開始）。 / Page number as listed by `info` (1-based).
    #[arg(value_name = "ROW")]
    row: usize,
}

#[derive(Args)]
struct NoteArgs {
    #[arg(value_name = "ARCHIVE")]
    archive: PathBuf,
    #[arg(value_name = "ROW")]
    row: usize,
    /// 以此文字取代筆記。 / Replace the note with this text.
    #[arg(long, value_name = "TEXT")]
    set: Option<String>,
}

#[derive(Args)]
struct RenameArgs {
    #[arg(value_name = "ARCHIVE")]
    archive: PathBuf,
    /// 新的基本名稱；預設為上次使用的範本。 / New base name; defaults to the last template used.
    #[arg(value_name = "BASE")]
    base: Option<String>,
}

#[derive(Args)]
struct ExportArgs {
    #[arg(value_name = "ARCHIVE")]
    archive: PathBuf,
    /// 輸出資料夾。 / Destination directory.
    #[arg(value_name = "DIR")]
    dir: PathBuf,
    /// 輸出格式副檔名。 / Output file extension (defaults to the saved preference).
    #[arg(long, value_name = "EXT")]
    extension: Option<String>,
    /// 最長邊像素上限。 / Longest-edge cap in pixels.
    #[arg(long, value_name = "PIXELS")]
    max_edge: Option<u32>,
}

#[derive(Subcommand)]
enum RecentCommand {
    /// 列出最近使用的專案。 / List recently used archives.
    List,
    /// 從清單移除指定專案。 / Remove an archive from the list.
    Remove(ArchiveArg),
    /// 清除清單。 / Clear the list.
    Clear,
}

/// Settings directory plus close behaviour shared by every command.
struct Workspace {
    settings_dir: PathBuf,
    keep_working_dir: bool,
}

impl Workspace {
    fn recent_store(&self) -> Result<RecentProjectsStore> {
        let path = self.settings_dir.join(RECENT_FILE);
        RecentProjectsStore::load(&path, DEFAULT_RECENT_CAPACITY)
            .with_context(|| format!("load recent projects from {}", path.display()))
    }

    fn settings_store(&self) -> Result<SettingsStore> {
        Ok(SettingsStore::load(self.settings_dir.join(SETTINGS_FILE))?)
    }

    fn engine(&self) -> Result<SyncEngine<ImageEditor>> {
        Ok(SyncEngine::new(ImageEditor::new(), self.recent_store()?))
    }

    /// Opens `archive`, runs `op`, saves when `mutating`, then always closes.
    fn with_project<T, F>(&self, archive: &Path, mutating: bool, op: F) -> Result<T>
    where
        F: FnOnce(&mut SyncEngine<ImageEditor>, &mut SettingsStore) -> Result<T>,
    {
        let mut settings = self.settings_store()?;
        let mut engine = self.engine()?;
        let archive = resolve_input_path(archive)?;
        engine
            .open(&archive)
            .with_context(|| format!("open {}", archive.display()))?;

        let outcome = op(&mut engine, &mut settings).and_then(|value| {
            if mutating {
                engine.save().context("save project")?;
            }
            Ok(value)
        });
        self.finish(&mut engine, &settings)?;
        outcome
    }

    fn finish(&self, engine: &mut SyncEngine<ImageEditor>, settings: &SettingsStore) -> Result<()> {
        let delete = !self.keep_working_dir && settings.settings().close.delete_working_dir;
        let report = engine.close(delete).context("close project")?;
        if let Some(err) = report.delete_error {
            eprintln!(
                "warning: could not remove {}: {err}",
                report.working_dir.display()
            );
        }
        Ok(())
    }
}

fn main() {
    let result = run();
    flush_logs();
    if let Err(err) = result {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, resolve_input_path(log_dir)?).context("initialize logging")?;
    }
    let workspace = Workspace {
        settings_dir: resolve_workspace(cli.workspace)?.join(SETTINGS_DIR),
        keep_working_dir: cli.keep_working_dir,
    };

    match cli.command {
        Commands::New(args) => create_project(&workspace, args),
        Commands::Validate(args) => validate_archive(&args.archive),
        Commands::Info(args) => show_info(&workspace, &args.archive),
        Commands::Import(args) => import_pages(&workspace, args),
        Commands::Delete(args) => delete_page(&workspace, args),
        Commands::Note(args) => edit_note(&workspace, args),
        Commands::Rename(args) => rename_pages(&workspace, args),
        Commands::Export(args) => export_pages(&workspace, args),
        Commands::Recent(command) => execute_recent_command(&workspace, command),
    }
}

fn create_project(workspace: &Workspace, args: NewArgs) -> Result<()> {
    let settings = workspace.settings_store()?;
    let mut engine = workspace.engine()?;
    let dir = resolve_input_path(&args.dir)?;
    let archive = engine
        .new_project(&dir, &args.name)
        .with_context(|| format!("create project '{}'", args.name))?
        .archive_path()
        .to_path_buf();
    workspace.finish(&mut engine, &settings)?;
    println!("Created {}", archive.display());
    Ok(())
}

fn validate_archive(archive: &Path) -> Result<()> {
    let archive = resolve_input_path(archive)?;
    match validate(&archive) {
        Validation::Valid => {
            println!("{}: valid project archive", archive.display());
            Ok(())
        }
        Validation::Invalid(reason) => bail!("{}: {reason}", archive.display()),
    }
}

fn show_info(workspace: &Workspace, archive: &Path) -> Result<()> {
    workspace.with_project(archive, false, |engine, _| {
        let trash = engine.trash_entries()?.len();
        let Some(project) = engine.project() else {
            bail!("no active project");
        };
        let control = project.control();
        println!("Archive: {}", project.archive_path().display());
        println!(
            "Template: {} {}x{} {} {} {}dpi",
            control.basename,
            control.width,
            control.height,
            control.colorspace,
            control.bitdepth,
            control.dpi
        );
        let index = project.index();
        println!("Pages: {}", index.images().len());
        for (row, image) in index.images().iter().enumerate() {
            let base = projectpages_project::base_name(image).unwrap_or_default();
            let note = index
                .texts()
                .iter()
                .find(|text| projectpages_project::base_name(text).as_deref() == Some(base.as_str()))
                .and_then(|text| text.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "-".to_string());
            println!("{:>4}  {}  {}", row + 1, file_name(image), note);
        }
        println!("Trash: {trash}");
        Ok(())
    })
}

fn import_pages(workspace: &Workspace, args: ImportArgs) -> Result<()> {
    let files = args
        .files
        .iter()
        .map(|file| resolve_input_path(file))
        .collect::<Result<Vec<_>>>()?;
    workspace.with_project(&args.archive, true, |engine, _| {
        let report = engine.import_pages(&files)?;
        for image in &report.imported {
            println!("Imported {}", file_name(image));
        }
        for (source, reason) in &report.skipped {
            let reason = match reason {
                ImportSkip::Unsupported => "unsupported file".to_string(),
                ImportSkip::ImageExists(path) => format!("{} already exists", file_name(path)),
                ImportSkip::NoteExists(path) => format!("{} already exists", file_name(path)),
                ImportSkip::Failed(err) => err.clone(),
            };
            eprintln!("warning: skipped {}: {reason}", source.display());
        }
        Ok(())
    })
}

fn delete_page(workspace: &Workspace, args: RowArgs) -> Result<()> {
    let row = page_row(args.row)?;
    workspace.with_project(&args.archive, true, |engine, _| {
        let report = engine.delete_page(row)?;
        for (_, trashed) in &report.moved {
            println!("Trashed {}", file_name(trashed));
        }
        for (path, err) in &report.failed {
            eprintln!("warning: could not trash {}: {err}", path.display());
        }
        Ok(())
    })
}

fn edit_note(workspace: &Workspace, args: NoteArgs) -> Result<()> {
    let row = page_row(args.row)?;
    let mutating = args.set.is_some();
    workspace.with_project(&args.archive, mutating, |engine, _| {
        engine.select_page(row)?;
        match &args.set {
            Some(text) => engine.write_note(text)?,
            None => println!("{}", engine.read_note()?),
        }
        Ok(())
    })
}

fn rename_pages(workspace: &Workspace, args: RenameArgs) -> Result<()> {
    workspace.with_project(&args.archive, true, |engine, settings| {
        let base = match &args.base {
            Some(base) => base.clone(),
            None => settings.settings().rename.last_template().to_string(),
        };
        let report = engine.rename_all(&base)?;
        settings.remember_rename_template(&base)?;
        println!(
            "Renamed {} file(s) to {}_NNNN",
            report.renamed.len(),
            base.trim()
        );
        for (from, to) in &report.skipped {
            eprintln!(
                "warning: skipped {}: {} already exists",
                file_name(from),
                file_name(to)
            );
        }
        for (path, err) in &report.failed {
            eprintln!("warning: could not rename {}: {err}", path.display());
        }
        Ok(())
    })
}

fn export_pages(workspace: &Workspace, args: ExportArgs) -> Result<()> {
    let destination = resolve_input_path(&args.dir)?;
    workspace.with_project(&args.archive, false, |engine, settings| {
        let saved = &settings.settings().export;
        let options = ExportOptions {
            extension: args
                .extension
                .clone()
                .unwrap_or_else(|| saved.extension.clone()),
            max_edge: args.max_edge.or(saved.max_edge).filter(|edge| *edge > 0),
        };
        let report = engine.export_all(&destination, &options, |step| {
            println!("[{}/{}] {}", step.done + 1, step.total, file_name(step.page));
            ControlFlow::Continue(())
        })?;
        for (path, err) in &report.failed {
            eprintln!("warning: could not export {}: {err}", path.display());
        }
        println!(
            "Exported {} file(s) to {}",
            report.exported.len(),
            destination.display()
        );
        Ok(())
    })
}

fn execute_recent_command(workspace: &Workspace, command: RecentCommand) -> Result<()> {
    let mut recent = workspace.recent_store()?;
    match command {
        RecentCommand::List => {
            for path in recent.iter() {
                println!("{}", path.display());
            }
        }
        RecentCommand::Remove(args) => {
            let archive = resolve_input_path(&args.archive)?;
            if recent.remove(&archive).context("update recent projects")? {
                println!("Removed {}", archive.display());
            } else {
                bail!("{} is not in the recent list", archive.display());
            }
        }
        RecentCommand::Clear => {
            recent.clear().context("update recent projects")?;
            println!("Cleared recent projects");
        }
    }
    Ok(())
}

fn page_row(row: usize) -> Result<usize> {
    match row.checked_sub(1) {
        Some(row) => Ok(row),
        None => bail!("page numbers start at 1"),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn resolve_workspace(workspace: Option<PathBuf>) -> Result<PathBuf> {
    match workspace {
        Some(path) => resolve_input_path(&path),
        None => std::env::current_dir().context("determine current directory"),
    }
}

fn resolve_input_path(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("determine current directory")?
            .join(path)
    };
    Ok(normalize_path(&absolute))
}
