use arrrg::CommandLine;
use arrrg_derive::CommandLine;
use serde_json::Value;
use tracing::info;

use sensorthings::{EntityKind, EntityService, InMemoryDataStore, cli_utils};

#[derive(CommandLine, Default, PartialEq, Eq)]
struct Options {
    #[arrrg(optional, "YAML service configuration (default: built-in defaults)")]
    config: String,
    #[arrrg(optional, "JSON file of creation documents keyed by collection name")]
    seed: String,
    #[arrrg(optional, "Service root used for self links, overriding the config")]
    service_root: String,
    #[arrrg(flag, "Log every created and rejected entity")]
    verbose: bool,
}

const USAGE: &str = r#"Usage: sensorthings-load [options] <data-array.json>...

Options:
  --config <file.yaml>    Service configuration
  --seed <file.json>      Creation documents to load first, e.g.
                          {"Things": [...], "Sensors": [...], "Datastreams": [...]}
  --service-root <url>    Service root used for self links
  --verbose               Log every created and rejected entity

Every data-array file holds one dataArray batch. The outcome of each row,
a self link or "error", is printed as a JSON array in input order."#;

fn seed(service: &EntityService<InMemoryDataStore>, seed: &Value) {
    let Value::Object(collections) = seed else {
        cli_utils::exit_with_error("seed file must hold an object keyed by collection name");
    };
    for name in collections.keys() {
        if name.parse::<EntityKind>().is_err() {
            cli_utils::exit_with_error(&format!("unknown collection {:?} in seed file", name));
        }
    }
    for kind in EntityKind::ALL {
        let Some(documents) = collections.get(kind.collection()) else {
            continue;
        };
        let Value::Array(documents) = documents else {
            cli_utils::exit_with_error(&format!("{} must be an array", kind.collection()));
        };
        for document in documents {
            match service.create_kind(kind, document) {
                Ok(entity) => info!(link = %service.self_link(&entity), "seeded"),
                Err(e) => cli_utils::exit_with_error(&format!(
                    "Failed to create {}: {}",
                    kind, e
                )),
            }
        }
    }
}

fn main() {
    let (options, free) = Options::from_command_line(
        "USAGE: sensorthings-load [--config FILE] [--seed FILE] [--service-root URL] [--verbose] <data-array.json>...",
    );

    if free.is_empty() && options.seed.is_empty() {
        cli_utils::exit_with_usage_error("No input specified", USAGE);
    }

    cli_utils::init_logging(options.verbose);

    let mut config = cli_utils::load_config_or_exit(&options.config);
    if !options.service_root.is_empty() {
        config.service_root = options.service_root.clone();
    }
    if let Err(e) = config.validate() {
        cli_utils::exit_with_error(&e);
    }

    let service = EntityService::new(InMemoryDataStore::new(), &config);
    if !options.seed.is_empty() {
        let documents = cli_utils::read_json_or_exit(&options.seed, "seed");
        seed(&service, &documents);
    }

    let mut outcomes = Vec::new();
    for path in &free {
        let batch = cli_utils::read_json_or_exit(path, "dataArray");
        match service.ingest_data_array(&batch) {
            Ok(rows) => outcomes.extend(rows),
            Err(e) => cli_utils::exit_with_error(&format!("{}: {}", path, e)),
        }
    }
    cli_utils::print_json_or_exit(&outcomes, "outcomes");
}
