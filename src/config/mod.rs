use crate::constraint::Operator;
use crate::query::MatchOptions;
use crate::tag::FieldTag;
use crate::types::QueryRetrieveLevel;
use dicom::core::PrimitiveValue;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Loads the layered configuration: embedded defaults, then an optional
/// `config.toml`, then `DICOM_LOOKUP_*` environment variables
/// (e.g. `DICOM_LOOKUP_NETWORK__REMOTE__PORT=4242`).
pub fn layered() -> Result<config::Config, config::ConfigError> {
	config::Config::builder()
		.add_source(config::File::from_str(
			include_str!("defaults.toml"),
			config::FileFormat::Toml,
		))
		.add_source(config::File::with_name("config.toml").required(false))
		.add_source(
			config::Environment::with_prefix("DICOM_LOOKUP")
				.prefix_separator("_")
				.separator("__")
				.try_parsing(true),
		)
		.build()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
	pub telemetry: TelemetryConfig,
	#[serde(default)]
	pub matching: MatchOptions,
	pub lookup: LookupConfig,
}

impl AppConfig {
	pub fn new() -> Result<Self, config::ConfigError> {
		Self::try_from(&layered()?)
	}
}

impl TryFrom<&config::Config> for AppConfig {
	type Error = config::ConfigError;

	fn try_from(config: &config::Config) -> Result<Self, Self::Error> {
		config.clone().try_deserialize()
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
	/// Default level when `RUST_LOG` is not set.
	#[serde(deserialize_with = "deserialize_level")]
	pub level: Level,
	/// Sentry DSN. Tracing to Sentry stays off without one.
	pub sentry: Option<String>,
}

fn deserialize_level<'de, D>(deserializer: D) -> Result<Level, D::Error>
where
	D: Deserializer<'de>,
{
	let value = String::deserialize(deserializer)?;
	Level::from_str(&value).map_err(serde::de::Error::custom)
}

/// The lookup the binary runs.
#[derive(Debug, Clone, Deserialize)]
pub struct LookupConfig {
	pub level: QueryRetrieveLevel,
	/// Upper bound for one lookup, in milliseconds.
	pub timeout: u64,
	/// Move every match to `network.destination.aet` after the lookup.
	#[serde(default)]
	pub retrieve: bool,
	#[serde(default)]
	pub filters: Vec<FilterConfig>,
}

impl LookupConfig {
	pub const fn timeout(&self) -> Duration {
		Duration::from_millis(self.timeout)
	}
}

/// One constraint, e.g. `{ tag = "PatientID", operator = "like", value = "910" }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FilterConfig {
	pub tag: FieldTag,
	pub operator: Operator,
	pub value: String,
}

impl FilterConfig {
	/// The filter value. Backslashes separate the values of a list.
	pub fn to_value(&self) -> PrimitiveValue {
		if self.value.contains('\\') {
			PrimitiveValue::Strs(self.value.split('\\').map(str::to_owned).collect())
		} else {
			PrimitiveValue::from(self.value.as_str())
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::query::LikeMode;

	#[test]
	fn defaults_deserialize() {
		let config = AppConfig::try_from(&layered().unwrap()).unwrap();
		assert_eq!(config.telemetry.level, Level::INFO);
		assert_eq!(config.matching, MatchOptions::default());
		assert_eq!(config.lookup.level, QueryRetrieveLevel::Study);
		assert_eq!(config.lookup.timeout(), Duration::from_secs(30));
		assert!(!config.lookup.retrieve);
	}

	#[test]
	fn filters_and_matching_from_toml() {
		let raw = config::Config::builder()
			.add_source(config::File::from_str(
				r#"
				[telemetry]
				level = "debug"

				[matching]
				like = "prefix"

				[lookup]
				level = "patient"
				timeout = 500
				filters = [
					{ tag = "PatientID", operator = "like", value = "910" },
					{ tag = "patientname", operator = "equals", value = "Muster^Max" },
				]
				"#,
				config::FileFormat::Toml,
			))
			.build()
			.unwrap();

		let config = AppConfig::try_from(&raw).unwrap();
		assert_eq!(config.telemetry.level, Level::DEBUG);
		assert_eq!(config.matching.like, LikeMode::Prefix);
		assert!(!config.matching.case_sensitive);
		assert_eq!(config.lookup.level, QueryRetrieveLevel::Patient);
		assert_eq!(
			config.lookup.filters,
			vec![
				FilterConfig {
					tag: FieldTag::PatientId,
					operator: Operator::Like,
					value: String::from("910"),
				},
				FilterConfig {
					tag: FieldTag::PatientName,
					operator: Operator::Equals,
					value: String::from("Muster^Max"),
				},
			]
		);
	}

	#[test]
	fn backslashes_separate_filter_values() {
		let filter = FilterConfig {
			tag: FieldTag::Modality,
			operator: Operator::Equals,
			value: String::from("CT\\MR"),
		};
		assert_eq!(filter.to_value().to_multi_str().len(), 2);

		let filter = FilterConfig {
			value: String::from("CT"),
			..filter
		};
		assert_eq!(filter.to_value(), PrimitiveValue::from("CT"));
	}

	#[test]
	fn unknown_tag_keyword_is_rejected() {
		let raw = config::Config::builder()
			.add_source(config::File::from_str(
				r#"
				[telemetry]
				level = "info"

				[lookup]
				level = "study"
				timeout = 500
				filters = [{ tag = "NoSuchKeyword", operator = "equals", value = "x" }]
				"#,
				config::FileFormat::Toml,
			))
			.build()
			.unwrap();

		assert!(AppConfig::try_from(&raw).is_err());
	}
}
