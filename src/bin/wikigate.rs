use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use std::path::PathBuf;
use std::time::Duration;
use wikigate::{Configuration, Wiki};

#[derive(Parser, Debug)]
#[command(name = "wikigate")]
#[command(about = "Read and edit pages through the MediaWiki API")]
struct Args {
    /// Config file (JSON/TOML); WIKIGATE_* environment variables are used if omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// API URL, e.g. https://en.wikipedia.org/w/api.php; overrides the config
    #[arg(short, long)]
    api: Option<String>,

    /// Minimum seconds between edits; overrides the config
    #[arg(long)]
    edit_interval: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the readable text of one or more pages
    Text { titles: Vec<String> },
    /// Print the wikitext of a page
    Wikitext { title: String },
    /// Print the intro of a page
    Summary { title: String },
    /// Print page info as JSON, and the redirect target if there is one
    Info { title: String },
    /// Print view and edit URL of a page
    Urls { title: String },
    /// Print the URLs of all files used on a page
    Media { title: String },
    /// Search page titles
    Search {
        query: String,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
        #[arg(short, long, default_value_t = 0)]
        namespace: i64,
    },
    /// List random pages
    Random {
        #[arg(short = 'c', long, default_value_t = 5)]
        num: usize,
        #[arg(short, long, default_value_t = 0)]
        namespace: i64,
    },
    /// Replace the content of a page with the content of a file
    Edit {
        title: String,
        file: PathBuf,
        #[arg(short, long, default_value = "")]
        summary: String,
    },
    /// Move a page
    Move {
        from: String,
        to: String,
        #[arg(short, long, default_value = "")]
        reason: String,
        #[arg(long)]
        no_redirect: bool,
    },
}

fn load_configuration(args: &Args) -> Result<Configuration> {
    let mut config = match (&args.config, &args.api) {
        (Some(path), _) => Configuration::new_from_file(path)?,
        (None, Some(api)) => Configuration::new(api)?,
        (None, None) => Configuration::new_from_env().map_err(|e| {
            anyhow!("No --config or --api given, and environment is incomplete: {e}")
        })?,
    };
    if let (Some(_), Some(api)) = (&args.config, &args.api) {
        config.set_api_url(api)?;
    }
    if let Some(seconds) = args.edit_interval {
        let interval = Duration::try_from_secs_f64(seconds)
            .map_err(|e| anyhow!("--edit-interval {seconds} is not a usable interval: {e}"))?;
        config.set_edit_interval(interval);
    }
    Ok(config)
}

async fn run(args: Args) -> Result<()> {
    let config = load_configuration(&args)?;
    let wiki = Wiki::from_configuration(&config).await?;
    match args.command {
        Command::Text { titles } => {
            let pages: Vec<_> = titles.iter().map(|t| wiki.get_page(t)).collect();
            let texts = join_all(pages.iter().map(|p| p.text())).await;
            for (page, text) in pages.iter().zip(texts) {
                match text {
                    Ok(text) => println!("== {page} ==\n{text}"),
                    Err(e) => eprintln!("{page}: {e}"),
                }
            }
        }
        Command::Wikitext { title } => println!("{}", wiki.http().get_markdown(&title).await?),
        Command::Summary { title } => println!("{}", wiki.http().get_summary(&title).await?),
        Command::Info { title } => {
            let page = wiki.get_page(&title);
            println!("{}", serde_json::to_string_pretty(page.info().await?)?);
            if let Some(target) = page.redirect_target().await? {
                println!("Redirects to {target}");
            }
        }
        Command::Urls { title } => {
            let urls = wiki.http().get_urls(&title).await?;
            println!("view: {}\nedit: {}", urls.view, urls.edit);
        }
        Command::Media { title } => {
            for url in wiki.http().get_media(&title).await? {
                println!("{url}");
            }
        }
        Command::Search {
            query,
            limit,
            namespace,
        } => {
            for page in wiki.opensearch(&query, limit, namespace).await? {
                println!("{page}");
            }
        }
        Command::Random { num, namespace } => {
            for page in wiki.get_random_pages(num, namespace).await? {
                println!("{page}");
            }
        }
        Command::Edit {
            title,
            file,
            summary,
        } => {
            let content = tokio::fs::read_to_string(&file).await?;
            wiki.get_page(&title).edit(&content, &summary).await?;
            println!("{title} edited");
        }
        Command::Move {
            from,
            to,
            reason,
            no_redirect,
        } => {
            wiki.get_page(&from).move_to(&to, &reason, !no_redirect).await?;
            println!("{from} moved to {to}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    run(Args::parse()).await
}
