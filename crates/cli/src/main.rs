use anyhow::Context;
use base64::Engine as _;
use buywise_core::domain::{AlternativesQuery, FinancialProfile, Frequency, ImagePayload, PurchaseQuery};
use buywise_core::flow::{self, FindAlternatives, Flow, ImageAnalysis, PersonaAnalysis};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "buywise", about = "Ask a rational investor whether to buy something")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print the rendered prompt instead of calling the model.
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Buy/don't-buy advice; the photo is optional.
    Persona(PurchaseArgs),
    /// Advice that starts by identifying the item in a photo.
    Image(PurchaseArgs),
    /// Cheaper substitutes for a photographed item.
    Alternatives(AlternativesArgs),
}

#[derive(Debug, Args)]
struct PurchaseArgs {
    #[arg(long)]
    item: String,

    #[arg(long)]
    cost: f64,

    #[arg(long)]
    purpose: Option<String>,

    /// Daily, Weekly, Monthly, Rarely or One-time.
    #[arg(long)]
    frequency: Option<Frequency>,

    #[arg(long)]
    photo: Option<PathBuf>,

    /// Monthly income.
    #[arg(long)]
    income: Option<f64>,

    /// Monthly expenses.
    #[arg(long)]
    expenses: Option<f64>,

    #[arg(long)]
    savings: Option<f64>,

    #[arg(long)]
    risk_tolerance: Option<String>,
}

#[derive(Debug, Args)]
struct AlternativesArgs {
    #[arg(long)]
    item: String,

    #[arg(long)]
    photo: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = buywise_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Persona(args) => {
            let query = args.into_query()?;
            execute::<PersonaAnalysis>(&settings, &query, cli.dry_run).await
        }
        Command::Image(args) => {
            let query = args.into_query()?;
            execute::<ImageAnalysis>(&settings, &query, cli.dry_run).await
        }
        Command::Alternatives(args) => {
            let query = AlternativesQuery {
                item_name: args.item,
                photo: Some(read_photo(&args.photo)?),
            };
            execute::<FindAlternatives>(&settings, &query, cli.dry_run).await
        }
    };

    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
    }
    result
}

async fn execute<F>(
    settings: &buywise_core::config::Settings,
    input: &F::Input,
    dry_run: bool,
) -> anyhow::Result<()>
where
    F: Flow,
    F::Reply: serde::Serialize,
{
    if dry_run {
        let prompt = flow::render::<F>(input)?;
        tracing::info!(operation = F::NAME, dry_run = true, "rendered prompt");
        println!("{}", prompt.to_display_text());
        return Ok(());
    }

    if settings.model_api_key().is_none() {
        tracing::warn!(
            provider = %settings.provider,
            var = settings.model_api_key_var(),
            "model API key missing; the request will fail"
        );
    }

    let llm = buywise_core::llm::client_from_settings(settings)?;
    let reply = flow::run::<F>(llm.as_ref(), input).await?;
    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}

impl PurchaseArgs {
    fn into_query(self) -> anyhow::Result<PurchaseQuery> {
        let photo = self.photo.as_deref().map(read_photo).transpose()?;
        Ok(PurchaseQuery {
            item_name: self.item,
            cost: self.cost,
            purpose: self.purpose,
            frequency: self.frequency,
            photo,
            profile: FinancialProfile {
                income: self.income,
                expenses: self.expenses,
                savings: self.savings,
                risk_tolerance: self.risk_tolerance,
            },
        })
    }
}

fn read_photo(path: &Path) -> anyhow::Result<ImagePayload> {
    let bytes = std::fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    let mime_type = mime_for_path(path)
        .with_context(|| format!("unsupported image type: {}", path.display()))?;
    Ok(ImagePayload {
        mime_type: mime_type.to_string(),
        data: base64::engine::general_purpose::STANDARD.encode(bytes),
    })
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

fn init_sentry(settings: &buywise_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
