use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dbrun_cache::AppCache;
use dbrun_pages::{
    DropPosition, Page, PageDraft, PageStoreConfig, PageType, PageUpdate, SessionController,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "dbrun-cli",
    about = "Manage dbrun pages, open tabs, and the application cache",
    author,
    version
)]
struct Cli {
    /// 指定工作區根目錄；預設為目前目錄。 / Workspace root (defaults to current directory).
    #[arg(long, global = true, value_name = "PATH")]
    workspace: Option<PathBuf>,
    /// 快取資料夾；預設為 <workspace>/.dbrun/data。 / Cache directory (defaults to <workspace>/.dbrun/data).
    #[arg(long, global = true, value_name = "PATH")]
    cache_dir: Option<PathBuf>,
    /// 輸出除錯記錄。 / Emit debug logs to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 管理頁面與群組。 / Manage pages and groups.
    #[command(subcommand)]
    Pages(PagesCommand),
    /// 管理已開啟的分頁。 / Manage open tabs.
    #[command(subcommand)]
    Tabs(TabsCommand),
    /// 檢視或清除應用快取。 / Inspect or clear the application cache.
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Subcommand)]
enum PagesCommand {
    /// 列出頁面樹。 / Print the page tree.
    List,
    /// 新增頁面或群組。 / Add a page or group.
    Add(AddArgs),
    /// 重新命名節點。 / Rename a node.
    Rename {
        key: String,
        label: String,
    },
    /// 設定節點圖示。 / Set a node's icon.
    Icon {
        key: String,
        icon: String,
    },
    /// 移動節點。 / Move a node relative to another.
    Move(MoveArgs),
    /// 刪除節點與其子節點。 / Delete a node and everything below it.
    Delete {
        key: String,
    },
    /// 切換群組展開狀態。 / Expand or collapse a group.
    Toggle {
        key: String,
    },
}

#[derive(Args)]
struct AddArgs {
    /// 顯示名稱。 / Display label.
    label: String,

    /// 建立群組而非頁面。 / Create a group instead of a page.
    #[arg(long)]
    group: bool,

    /// 父群組鍵值。 / Key of the parent group.
    #[arg(long, value_name = "KEY")]
    parent: Option<String>,

    /// 自訂圖示。 / Custom icon.
    #[arg(long)]
    icon: Option<String>,
}

#[derive(Args)]
struct MoveArgs {
    /// 要移動的節點。 / Node to move.
    source: String,

    /// 目標節點。 / Node to drop on.
    target: String,

    /// 相對於目標的位置。 / Placement relative to the target.
    #[arg(long, value_enum, default_value_t = PositionChoice::Before)]
    position: PositionChoice,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PositionChoice {
    Before,
    After,
    Inside,
}

impl From<PositionChoice> for DropPosition {
    fn from(choice: PositionChoice) -> Self {
        match choice {
            PositionChoice::Before => DropPosition::Before,
            PositionChoice::After => DropPosition::After,
            PositionChoice::Inside => DropPosition::Inside,
        }
    }
}

#[derive(Subcommand)]
enum TabsCommand {
    /// 列出已開啟分頁。 / List open tabs.
    List,
    /// 開啟或切換分頁。 / Open or focus a page's tab.
    Open { key: String },
    /// 關閉分頁。 / Close a tab.
    Close { key: String },
}

#[derive(Subcommand)]
enum CacheCommand {
    /// 列出快取鍵值。 / List cache keys.
    Keys,
    /// 清除所有快取。 / Remove every cache entry.
    Clear,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = run(cli) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: Cli) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;
    runtime.block_on(execute(cli))
}

async fn execute(cli: Cli) -> Result<()> {
    let Cli {
        workspace,
        cache_dir,
        command,
        ..
    } = cli;
    let workspace_root = resolve_workspace(workspace)?;
    let cache_dir = match cache_dir {
        Some(dir) => resolve_path(&workspace_root, dir),
        None => default_cache_dir(&workspace_root),
    };
    debug!(workspace = %workspace_root.display(), cache = %cache_dir.display(), "resolved paths");
    let cache = AppCache::open(&cache_dir)
        .with_context(|| format!("open app cache in {}", cache_dir.display()))?;

    match command {
        Commands::Cache(subcommand) => execute_cache_command(subcommand, &cache),
        Commands::Pages(subcommand) => {
            let mut controller = load_controller(&workspace_root, cache).await?;
            let result = execute_pages_command(subcommand, &mut controller);
            controller.shutdown().await;
            result
        }
        Commands::Tabs(subcommand) => {
            let mut controller = load_controller(&workspace_root, cache).await?;
            let result = execute_tabs_command(subcommand, &mut controller);
            controller.shutdown().await;
            result
        }
    }
}

async fn load_controller(workspace_root: &Path, cache: AppCache) -> Result<SessionController> {
    let config_path = config_path(workspace_root);
    let config = PageStoreConfig::load(&config_path)
        .with_context(|| format!("load page store config {}", config_path.display()))?;
    Ok(SessionController::load(Arc::new(cache), config).await)
}

fn execute_pages_command(command: PagesCommand, controller: &mut SessionController) -> Result<()> {
    match command {
        PagesCommand::List => {
            print_pages(controller, controller.pages(), 0);
            Ok(())
        }
        PagesCommand::Add(args) => {
            let page_type = if args.group {
                PageType::Group
            } else {
                PageType::Page
            };
            let mut draft = PageDraft::new(args.label, page_type);
            if let Some(icon) = args.icon {
                draft = draft.with_icon(icon);
            }
            if let Some(parent) = args.parent.as_deref() {
                draft = draft.under(parent);
            }
            let Some(page) = controller.add_item(draft) else {
                bail!(
                    "parent {} is missing or not a group",
                    args.parent.unwrap_or_default()
                );
            };
            println!("{}", page.key());
            Ok(())
        }
        PagesCommand::Rename { key, label } => {
            if !controller.update_page(&key, PageUpdate::label(label)) {
                bail!("page {key} not found");
            }
            Ok(())
        }
        PagesCommand::Icon { key, icon } => {
            if !controller.update_page(&key, PageUpdate::icon(icon)) {
                bail!("page {key} not found");
            }
            Ok(())
        }
        PagesCommand::Move(args) => {
            let position = DropPosition::from(args.position);
            if !controller.move_item(&args.source, &args.target, position) {
                bail!(
                    "cannot move {} {} {}",
                    args.source,
                    position,
                    args.target
                );
            }
            Ok(())
        }
        PagesCommand::Delete { key } => {
            if !controller.delete_page(&key) {
                bail!("page {key} not found");
            }
            Ok(())
        }
        PagesCommand::Toggle { key } => {
            if !controller.toggle_group(&key) {
                bail!("{key} is not a group");
            }
            Ok(())
        }
    }
}

fn execute_tabs_command(command: TabsCommand, controller: &mut SessionController) -> Result<()> {
    match command {
        TabsCommand::List => {
            for tab in controller.open_tabs() {
                let marker = if tab.active { '>' } else { ' ' };
                println!("{marker} {} ({})", tab.label, tab.key);
            }
            Ok(())
        }
        TabsCommand::Open { key } => {
            if !controller.open_tab(&key) {
                bail!("{key} is not a page");
            }
            Ok(())
        }
        TabsCommand::Close { key } => {
            if !controller.close_tab(&key) {
                bail!("no open tab for {key}");
            }
            Ok(())
        }
    }
}

fn execute_cache_command(command: CacheCommand, cache: &AppCache) -> Result<()> {
    match command {
        CacheCommand::Keys => {
            for key in cache.keys() {
                println!("{key}");
            }
            Ok(())
        }
        CacheCommand::Clear => {
            cache.clear().context("clear app cache")?;
            Ok(())
        }
    }
}

fn print_pages(controller: &SessionController, pages: &[Page], depth: usize) {
    for page in pages {
        let symbol = match page.expanded() {
            Some(true) => '-',
            Some(false) => '+',
            None => '*',
        };
        let tab = match controller.tabs().get(page.key().as_str()) {
            Some(tab) if tab.active => " [active]",
            Some(_) => " [open]",
            None => "",
        };
        println!(
            "{}{symbol} {} ({}){tab}",
            "  ".repeat(depth),
            page.label(),
            page.key()
        );
        print_pages(controller, page.children(), depth + 1);
    }
}

fn config_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".dbrun").join("pages.json")
}

fn default_cache_dir(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".dbrun").join("data")
}

fn resolve_path(workspace_root: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        workspace_root.join(path)
    }
}

fn resolve_workspace(workspace: Option<PathBuf>) -> Result<PathBuf> {
    match workspace {
        Some(path) => {
            if path.is_absolute() {
                Ok(path)
            } else {
                Ok(std::env::current_dir()
                    .context("determine current directory")?
                    .join(path))
            }
        }
        None => std::env::current_dir().context("determine current directory"),
    }
}
