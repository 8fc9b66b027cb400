//! `storymap` command line front end
//!
//! Loads a fixture document into the in-memory backend and runs one service
//! operation against it, printing the result as JSON.

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use storymap_compose::{FeatureRegistry, QueryParams, RequestInfo};
use storymap_core::{Backends, MemoryBackend, ServiceConfig, StoryMapService};
use storymap_model::{InstanceId, StoryId};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let fixture = Arg::new("fixture")
        .long("fixture")
        .short('f')
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("JSON fixture document with layers, instances, stories and settings");

    Command::new("storymap")
        .version(storymap_core::VERSION)
        .about("Compose story map configurations from fixture documents")
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Service configuration (.toml, .yaml or .yml)"),
        )
        .arg(
            Arg::new("compact")
                .long("compact")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print compact instead of pretty JSON"),
        )
        .subcommand(
            Command::new("compose")
                .about("Compose the map configuration for a request")
                .arg(fixture.clone())
                .arg(
                    Arg::new("instance")
                        .long("instance")
                        .short('i')
                        .default_value("main")
                        .help("Map instance id"),
                )
                .arg(
                    Arg::new("query")
                        .long("query")
                        .short('q')
                        .default_value("")
                        .help("Request query string, e.g. 'story=42&step=7'"),
                )
                .arg(
                    Arg::new("host")
                        .long("host")
                        .default_value("localhost")
                        .help("Request host"),
                )
                .arg(
                    Arg::new("scheme")
                        .long("scheme")
                        .default_value("https")
                        .help("Request scheme"),
                )
                .arg(
                    Arg::new("script")
                        .long("script")
                        .action(ArgAction::SetTrue)
                        .help("Print the rendered script statement instead of JSON"),
                ),
        )
        .subcommand(
            Command::new("layers")
                .about("Resolve layer ids to catalog definitions")
                .arg(fixture.clone())
                .arg(
                    Arg::new("ids")
                        .required(true)
                        .num_args(1..)
                        .help("Layer ids"),
                )
                .arg(
                    Arg::new("query")
                        .long("query")
                        .short('q')
                        .default_value("")
                        .help("Query parameters forwarded to layer source URLs"),
                ),
        )
        .subcommand(
            Command::new("story")
                .about("Build the public structure of a story")
                .arg(fixture)
                .arg(
                    Arg::new("story")
                        .required(true)
                        .value_parser(value_parser!(StoryId))
                        .help("Story id"),
                )
                .arg(
                    Arg::new("tags")
                        .long("tags")
                        .action(ArgAction::SetTrue)
                        .help("Print the cache tags of the structure instead"),
                ),
        )
}

fn main() -> Result<()> {
    let matches = cli().get_matches();

    let config = ServiceConfig::load_or_default(
        matches.get_one::<PathBuf>("config").map(PathBuf::as_path),
    )
    .context("loading service configuration")?;
    init_tracing(&config.log_level);

    let compact = matches.get_flag("compact");
    match matches.subcommand() {
        Some(("compose", args)) => compose(config, args, compact),
        Some(("layers", args)) => layers(config, args, compact),
        Some(("story", args)) => story(config, args, compact),
        Some((other, _)) => bail!("unknown command '{other}'"),
        None => bail!("no command given"),
    }
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn service(config: ServiceConfig, args: &ArgMatches) -> Result<StoryMapService> {
    let path = args
        .get_one::<PathBuf>("fixture")
        .context("missing --fixture")?;
    let backend = MemoryBackend::from_fixture_file(path)
        .with_context(|| format!("loading fixture {}", path.display()))?;
    tracing::debug!(fixture = %path.display(), "loaded fixture document");
    Ok(StoryMapService::new(
        config,
        Backends::shared(Arc::new(backend)),
        FeatureRegistry::new(),
    ))
}

fn string_arg<'a>(args: &'a ArgMatches, name: &str) -> &'a str {
    args.get_one::<String>(name).map_or("", String::as_str)
}

fn print_json(value: &impl serde::Serialize, compact: bool) -> Result<()> {
    let rendered = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{rendered}");
    Ok(())
}

fn compose(config: ServiceConfig, args: &ArgMatches, compact: bool) -> Result<()> {
    let service = service(config, args)?;
    let instance = InstanceId::new(string_arg(args, "instance"));
    let request = RequestInfo::new(
        string_arg(args, "scheme"),
        string_arg(args, "host"),
        QueryParams::parse(string_arg(args, "query")),
    );

    let composed = service
        .compose_map_configuration(&instance, &request)
        .with_context(|| format!("composing configuration for instance '{instance}'"))?;

    if args.get_flag("script") {
        println!("{}", composed.script_augmentation.render());
        return Ok(());
    }
    print_json(composed.as_ref(), compact)
}

fn layers(config: ServiceConfig, args: &ArgMatches, compact: bool) -> Result<()> {
    let service = service(config, args)?;
    let ids = args.get_many::<String>("ids").unwrap_or_default();
    let definitions = service
        .resolve_layer_definitions(ids, &QueryParams::parse(string_arg(args, "query")))
        .context("resolving layer definitions")?;
    print_json(&definitions, compact)
}

fn story(config: ServiceConfig, args: &ArgMatches, compact: bool) -> Result<()> {
    let service = service(config, args)?;
    let story_id = *args.get_one::<StoryId>("story").context("missing story id")?;

    let structure = service
        .build_story_structure(story_id, false)
        .with_context(|| format!("building structure of story {story_id}"))?;

    if args.get_flag("tags") {
        return print_json(&structure.cache_tags(), compact);
    }
    print_json(structure.as_ref(), compact)
}
