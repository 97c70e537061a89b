use anyhow::Result;
use clap::{App, Arg};
use connect_discovery_core::collaborators::local::LocalCollaborators;
use connect_discovery_core::config::DiscoveryConfigProperties;
use connect_discovery_core::inventory::Inventory;
use connect_discovery_core::service::kafka_connect;
use tracing::Level;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

fn main() {
    match main_processor() {
        Ok(()) => info!("Exiting successfully."),
        Err(err) => {
            error!("Exiting with error: {:?}", err);
            std::process::exit(1);
        },
    }
}

fn main_processor() -> Result<()> {
    let matches = App::new("connect-discovery")
        .version("0.1")
        .about("Translates a Kafka Connect worker configuration into inventory properties")
        .arg(
            Arg::new("INPUT")
                .help("Sets the discovery settings file to use")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("verbosity_level")
                .short('v')
                .default_value("info")
                .help("Sets the level of verbosity"),
        )
        .arg(
            Arg::new("override")
                .short('o')
                .multiple_occurrences(true)
                .help("Override settings defined in the settings file"),
        )
        .get_matches();
    let verbosity = matches.value_of("verbosity_level").unwrap_or("info");
    let subscriber = FmtSubscriber::builder()
        .with_max_level(verbosity.parse::<Level>()?)
        // Logs go to stderr, stdout only carries the inventory.
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let settings_file = matches.value_of("INPUT").unwrap_or_default();
    info!("Using settings file: {}", settings_file);
    let mut discovery_config = match DiscoveryConfigProperties::read_config_file(settings_file) {
        Ok(config) => config,
        Err(err) => {
            error!("Unable to use settings file {}: {:?}", settings_file, err);
            std::process::exit(1);
        },
    };
    if let Some(property_overrides) = matches.values_of("override") {
        for override_property in property_overrides {
            if let Some((property_name, property_value)) = override_property.split_once('=') {
                discovery_config.try_set_property(property_name, property_value)?;
            }
        }
    }
    let discovery_config = discovery_config.build()?;
    let local = LocalCollaborators::from_config(&discovery_config)?;
    let inventory = Inventory::new();
    kafka_connect::build_properties(
        local.collaborators(),
        discovery_config.service_version.as_deref(),
        &inventory,
    )?;
    println!("{}", inventory.to_json_pretty()?);
    Ok(())
}
