use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "mokuro-reader",
    version,
    about = "Read mokuro-processed manga volumes from the terminal"
)]
struct Cli {
    /// Volume folder containing a .mokuro file and its page images
    #[arg(short = 'd', long = "folder")]
    folder: Option<String>,

    /// List the volume's pages in reading order and exit
    #[arg(long = "list-pages")]
    list_pages: bool,

    /// Jump to the first page whose image path contains NAME
    #[arg(long = "page", value_name = "NAME")]
    page: Option<String>,

    /// Advance one page from the resumed position
    #[arg(long = "next", conflicts_with = "prev")]
    next: bool,

    /// Go back one page from the resumed position
    #[arg(long = "prev")]
    prev: bool,

    /// Tap the page at X,Y (view coordinates) and print the text under it
    #[arg(long = "tap", value_name = "X,Y")]
    tap: Option<String>,

    /// View size used for --tap (default: settings [reader] view_width/view_height)
    #[arg(long = "view", value_name = "WxH", requires = "tap")]
    view: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Directory for settings and reading state (default: ~/.mokuro-reader)
    #[arg(long = "base-dir")]
    base_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    mokuro_reader::logging::init(cli.verbose)?;

    let output = mokuro_reader::run(mokuro_reader::Config {
        folder: cli.folder,
        list_pages: cli.list_pages,
        page: cli.page,
        next: cli.next,
        prev: cli.prev,
        tap: cli.tap,
        view: cli.view,
        settings_path: cli.read_settings,
        base_dir: cli.base_dir,
    })
    .await?;

    println!("{}", output);
    Ok(())
}
