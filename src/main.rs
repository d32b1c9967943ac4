use dicom_lookup::cache::{CacheStore, InMemoryCacheStore};
use dicom_lookup::config::{self, AppConfig};
use dicom_lookup::entity::{Attributes, PatientAttributes, SeriesAttributes, StudyAttributes};
use dicom_lookup::protocol::dimse::{DimseProtocolHandler, DimseSettings};
use dicom_lookup::protocol::{MoveRequest, ProtocolHandler};
use dicom_lookup::query::{CacheExecution, Execution, NetworkExecution};
use dicom_lookup::registry::InfoRegistry;
use dicom_lookup::settings::{ConfigSettings, NetworkSettings};
use dicom_lookup::types::QueryRetrieveLevel;
use dicom_lookup::Query;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn init_logger(level: tracing::Level) {
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::fmt::layer()
				.compact()
				.with_ansi(true)
				.with_file(false)
				.with_line_number(false)
				.with_target(false),
		)
		.with(
			EnvFilter::builder()
				.with_default_directive(LevelFilter::from_level(level).into())
				.from_env_lossy(),
		)
		.with(sentry::integrations::tracing::layer())
		.init();
}

fn init_sentry(config: &AppConfig) -> sentry::ClientInitGuard {
	let guard = sentry::init((
		// An empty string will disable Sentry
		config.telemetry.sentry.as_deref().unwrap_or_default(),
		sentry::ClientOptions {
			release: sentry::release_name!(),
			traces_sample_rate: 1.0,
			..Default::default()
		},
	));

	if let Some(dsn) = &config.telemetry.sentry {
		info!(dsn, "Enabled Sentry for tracing and error tracking");
	};

	guard
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
	let raw = config::layered()?;
	let config = AppConfig::try_from(&raw)?;
	init_logger(config.telemetry.level);

	// The Sentry client has to exist before the Tokio runtime, which rules out #[tokio::main].
	// See https://docs.sentry.io/platforms/rust/#async-main-function
	let _sentry = init_sentry(&config);

	let succeeded = tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()?
		.block_on(async move {
			match run(config, ConfigSettings::new(raw)).await {
				Ok(()) => true,
				Err(error) => {
					error!("Lookup failed: {error:#}");
					false
				}
			}
		});

	if !succeeded {
		std::process::exit(1);
	}
	Ok(())
}

async fn run(config: AppConfig, settings: ConfigSettings) -> anyhow::Result<()> {
	let network = NetworkSettings::resolve(&settings)?;
	let handler = DimseProtocolHandler::new(DimseSettings::from_network(
		&network,
		config.lookup.timeout(),
	));
	info!(
		remote = %network.remote_aet,
		host = %network.remote_host,
		port = network.remote_port,
		level = %config.lookup.level,
		"Looking up entities"
	);

	let registry = InfoRegistry::global();
	match config.lookup.level {
		QueryRetrieveLevel::Patient => {
			lookup::<PatientAttributes>(&config, &network, &handler, registry).await
		}
		QueryRetrieveLevel::Study => {
			lookup::<StudyAttributes>(&config, &network, &handler, registry).await
		}
		QueryRetrieveLevel::Series => {
			lookup::<SeriesAttributes>(&config, &network, &handler, registry).await
		}
	}
}

/// Runs the configured lookup against the archive, caches the matches and runs
/// the same query again against the cache.
async fn lookup<A: Attributes>(
	config: &AppConfig,
	network: &NetworkSettings,
	handler: &dyn ProtocolHandler,
	registry: &InfoRegistry,
) -> anyhow::Result<()> {
	let mut query = Query::<A>::new(registry)?;
	for filter in &config.lookup.filters {
		query = query.constrain(filter.tag, filter.operator, filter.to_value())?;
	}

	let remote = Execution::Network(
		NetworkExecution::new(handler, config.lookup.timeout()).with_options(config.matching),
	);
	let found = query.execute_with(&remote).await?;
	info!(kind = A::NAME, matches = found.len(), "Archive lookup completed");

	if config.lookup.retrieve {
		for entity in &found {
			let request =
				MoveRequest::for_entity(query.info().mapping(), entity, network.destination_aet.clone());
			handler.move_to(request).await?;
		}
		info!(
			destination = %network.destination_aet,
			count = found.len(),
			"Retrieved matches"
		);
	}

	let store = InMemoryCacheStore::<A>::new();
	let persisted = store.persist(found);
	let snapshot = store.snapshot();

	let cached = query
		.execute_with(&Execution::Cache(
			CacheExecution::new(&*snapshot).with_options(config.matching),
		))
		.await?;
	info!(
		kind = A::NAME,
		persisted,
		matches = cached.len(),
		"Cache lookup completed"
	);
	Ok(())
}
