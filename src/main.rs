use clap::{Arg, ArgAction, ArgMatches, Command};
use slangshift::engine::{
    ChannelUnknownTermSink, DisabledEmbeddings, EmbeddingProvider, HttpEmbeddingProvider,
    MockEmbedder, MockMode, decode_input, spawn_jsonl_writer,
};
use slangshift::lexicon::source::{
    FileLexiconSource, HttpLexiconSource, LexiconSource, StaticLexiconSource,
};
use slangshift::{
    AgeRating, ContentFlag, EngineConfig, LexiconStore, RenderMode, SlangConfig, SlangEngine,
    TranslationResult,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::info;

/// Dimensionality of the bundled lexicon's sense vectors
const MOCK_DIMENSIONS: usize = 4;

fn cli() -> Command {
    Command::new("slangshift")
        .about("Translate slang to plain language and back")
        .arg(
            Arg::new("text")
                .help("Text to translate, or '-' to read standard input")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("reverse")
                .long("reverse")
                .short('r')
                .help("Translate plain language to slang")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("annotated")
                .long("annotated")
                .short('a')
                .help("Show per-span annotations")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the full result as JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("density")
                .long("density")
                .short('d')
                .help("Slang density for --reverse: light, medium or heavy"),
        )
        .arg(
            Arg::new("age-ceiling")
                .long("age-ceiling")
                .help("Most restricted rating allowed for --reverse: E, T13, T16 or M18"),
        )
        .arg(
            Arg::new("exclude")
                .long("exclude")
                .short('x')
                .help("Content flag to exclude for --reverse (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("lexicon")
                .long("lexicon")
                .short('l')
                .help("Lexicon JSON file, or a directory of <version>.json files"),
        )
        .arg(
            Arg::new("lexicon-url")
                .long("lexicon-url")
                .help("Base URL serving <version>.json lexicon documents"),
        )
        .arg(
            Arg::new("lexicon-version")
                .long("version")
                .value_name("VERSION")
                .help("Pin a lexicon version (default: latest)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Engine configuration TOML file"),
        )
        .arg(
            Arg::new("mock")
                .long("mock")
                .short('m')
                .help("Use deterministic mock embeddings instead of SLANG_EMBEDDING_URL")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("unknown-log")
                .long("unknown-log")
                .help("Append unmatched words to this JSON-lines file"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Log pipeline details")
                .action(ArgAction::SetTrue),
        )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = cli().get_matches();

    let level = if matches.get_flag("verbose") { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?),
        )
        .init();

    let config = load_config(&matches)?;
    let text = read_text(&matches).await?;

    let store = lexicon_store(&config)?;
    let provider = embedding_provider(matches.get_flag("mock"));
    let mut engine = SlangEngine::start(config.clone(), store, provider).await?;

    let writer = match &config.unknown_terms_log {
        Some(path) => {
            let (sink, receiver) = ChannelUnknownTermSink::new();
            engine = engine.with_unknown_sink(Arc::new(sink));
            Some(spawn_jsonl_writer(receiver, path.clone()))
        }
        None => None,
    };

    let result = if matches.get_flag("reverse") {
        let slang = slang_config(&matches, &config)?;
        engine.translate_to_slang(&text, &slang).await?
    } else {
        let mode = if matches.get_flag("annotated") {
            RenderMode::Annotated
        } else {
            RenderMode::Clean
        };
        engine.translate_to_plain(&text, mode).await?
    };

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    // the engine holds the last sender; dropping it lets the writer finish
    drop(engine);
    if let Some(writer) = writer {
        let written = writer.await??;
        info!(written, "unknown terms logged");
    }
    Ok(())
}

fn load_config(matches: &ArgMatches) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => EngineConfig::from_file(Path::new(path))?,
        None => EngineConfig::default(),
    };

    if let Some(path) = matches.get_one::<String>("lexicon") {
        config.lexicon.local_path = Some(PathBuf::from(path));
    }
    if let Some(url) = matches.get_one::<String>("lexicon-url") {
        config.lexicon.remote_url = Some(url.clone());
    }
    if let Some(version) = matches.get_one::<String>("lexicon-version") {
        config.lexicon.version = Some(version.clone());
    }
    if let Some(path) = matches.get_one::<String>("unknown-log") {
        config.unknown_terms_log = Some(PathBuf::from(path));
    }
    Ok(config)
}

async fn read_text(matches: &ArgMatches) -> Result<String, Box<dyn std::error::Error>> {
    let text = matches
        .get_one::<String>("text")
        .ok_or("missing text argument")?;
    if text != "-" {
        return Ok(text.clone());
    }

    let mut bytes = Vec::new();
    tokio::io::stdin().read_to_end(&mut bytes).await?;
    Ok(decode_input(&bytes)?.to_string())
}

/// Remote source first, then the local file, then the bundled lexicon
fn lexicon_store(config: &EngineConfig) -> Result<LexiconStore, Box<dyn std::error::Error>> {
    let settings = &config.lexicon;
    let local = settings
        .local_path
        .as_ref()
        .map(|path| Arc::new(FileLexiconSource::new(path.clone())) as Arc<dyn LexiconSource>);
    let bundled: Arc<dyn LexiconSource> = Arc::new(StaticLexiconSource::bundled());

    let store = match (&settings.remote_url, local) {
        (Some(url), local) => {
            let remote: Arc<dyn LexiconSource> = Arc::new(HttpLexiconSource::new(url.clone())?);
            LexiconStore::new(remote).with_fallback(local.unwrap_or(bundled))
        }
        (None, Some(local)) => LexiconStore::new(local).with_fallback(bundled),
        (None, None) => LexiconStore::new(bundled),
    };
    Ok(store)
}

fn embedding_provider(mock: bool) -> Arc<dyn EmbeddingProvider> {
    if mock {
        return Arc::new(MockEmbedder::new(MockMode::Hashed {
            dims: MOCK_DIMENSIONS,
        }));
    }
    match HttpEmbeddingProvider::from_env() {
        Ok(provider) => Arc::new(provider),
        Err(err) => {
            info!(reason = %err, "embeddings disabled, ambiguous terms use static confidence");
            Arc::new(DisabledEmbeddings)
        }
    }
}

fn slang_config(
    matches: &ArgMatches,
    config: &EngineConfig,
) -> Result<SlangConfig, Box<dyn std::error::Error>> {
    let mut slang = config.slang.clone();
    if let Some(density) = matches.get_one::<String>("density") {
        slang.density = density.parse()?;
    }
    if let Some(rating) = matches.get_one::<String>("age-ceiling") {
        slang.age_ceiling = rating.parse::<AgeRating>()?;
    }
    if let Some(flags) = matches.get_many::<String>("exclude") {
        for flag in flags {
            slang.excluded_flags.insert(flag.parse::<ContentFlag>()?);
        }
    }
    Ok(slang)
}

fn print_result(result: &TranslationResult) {
    println!("{}", result.translated);

    if let Some(annotations) = &result.annotations {
        for a in annotations {
            println!(
                "  [{}..{}] {:?} -> {:?} ({}, sense {}, {:.2})",
                a.start, a.end, a.surface, a.gloss, a.term, a.sense_index, a.confidence
            );
        }
    }

    let quality = &result.quality;
    eprintln!(
        "coverage {:.2}, grammar {:.2}, fluency {:.2}, similarity {}",
        result.coverage,
        quality.grammar_score,
        quality.fluency_score,
        quality
            .similarity
            .map(|s| format!("{:.2}", s))
            .unwrap_or_else(|| "n/a".to_string())
    );
    for degradation in &quality.degradations {
        eprintln!("degraded: {:?}", degradation);
    }
    if result.polish_recommended {
        eprintln!("polish recommended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_reverse_options() {
        let matches = cli()
            .try_get_matches_from([
                "slangshift", "that was excellent", "--reverse", "--density", "heavy",
                "--exclude", "profanity", "-x", "sexual", "--version", "2024.06",
            ])
            .unwrap();
        let config = load_config(&matches).unwrap();
        assert_eq!(config.lexicon.version.as_deref(), Some("2024.06"));

        let slang = slang_config(&matches, &config).unwrap();
        assert_eq!(slang.density, slangshift::engine::Density::Heavy);
        assert!(slang.excluded_flags.contains(&ContentFlag::Profanity));
        assert!(slang.excluded_flags.contains(&ContentFlag::Sexual));
    }

    #[test]
    fn test_cli_rejects_unknown_density() {
        let matches = cli()
            .try_get_matches_from(["slangshift", "x", "--density", "extreme"])
            .unwrap();
        let config = load_config(&matches).unwrap();
        assert!(slang_config(&matches, &config).is_err());
    }

    #[test]
    fn test_store_without_sources_uses_bundled() {
        let store = lexicon_store(&EngineConfig::default());
        assert!(store.is_ok());
    }
}
