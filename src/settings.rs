//! Read-only access to addressing settings by string key.

use crate::types::AE;
use std::num::ParseIntError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
	#[error("Setting '{0}' is not configured")]
	Missing(String),
	#[error("Setting '{key}' has invalid value '{value}': {reason}")]
	Invalid {
		key: String,
		value: String,
		reason: String,
	},
}

/// Looks up settings by key. Numeric lookups fail on values that do not parse,
/// they never fall back to zero.
pub trait SettingsProvider: Send + Sync {
	fn string(&self, key: &str) -> Result<String, SettingsError>;

	fn integer(&self, key: &str) -> Result<i64, SettingsError> {
		parse(key, self.string(key)?)
	}

	fn port(&self, key: &str) -> Result<u16, SettingsError> {
		parse(key, self.string(key)?)
	}
}

fn parse<T>(key: &str, value: String) -> Result<T, SettingsError>
where
	T: std::str::FromStr<Err = ParseIntError>,
{
	value.trim().parse().map_err(|err: ParseIntError| SettingsError::Invalid {
		key: key.to_owned(),
		reason: err.to_string(),
		value,
	})
}

/// [`SettingsProvider`] over a layered `config` source.
#[derive(Debug, Clone)]
pub struct ConfigSettings(config::Config);

impl ConfigSettings {
	pub const fn new(config: config::Config) -> Self {
		Self(config)
	}
}

impl SettingsProvider for ConfigSettings {
	fn string(&self, key: &str) -> Result<String, SettingsError> {
		match self.0.get_string(key) {
			Ok(value) => Ok(value),
			Err(config::ConfigError::NotFound(_)) => Err(SettingsError::Missing(key.to_owned())),
			Err(err) => Err(SettingsError::Invalid {
				key: key.to_owned(),
				value: String::new(),
				reason: err.to_string(),
			}),
		}
	}
}

pub const LOCAL_AET: &str = "network.local.aet";
pub const LOCAL_PORT: &str = "network.local.port";
pub const REMOTE_AET: &str = "network.remote.aet";
pub const REMOTE_HOST: &str = "network.remote.host";
pub const REMOTE_PORT: &str = "network.remote.port";
pub const DESTINATION_AET: &str = "network.destination.aet";

/// Where this node and the archive live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
	pub local_aet: AE,
	/// Port of the storage provider that receives moved instances.
	pub local_port: u16,
	pub remote_aet: AE,
	pub remote_host: String,
	pub remote_port: u16,
	/// Default destination of retrieves.
	pub destination_aet: AE,
}

impl NetworkSettings {
	pub fn resolve(provider: &dyn SettingsProvider) -> Result<Self, SettingsError> {
		Ok(Self {
			local_aet: provider.string(LOCAL_AET)?,
			local_port: provider.port(LOCAL_PORT)?,
			remote_aet: provider.string(REMOTE_AET)?,
			remote_host: provider.string(REMOTE_HOST)?,
			remote_port: provider.port(REMOTE_PORT)?,
			destination_aet: provider.string(DESTINATION_AET)?,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	struct MapSettings(HashMap<&'static str, &'static str>);

	impl SettingsProvider for MapSettings {
		fn string(&self, key: &str) -> Result<String, SettingsError> {
			self.0
				.get(key)
				.map(|value| (*value).to_owned())
				.ok_or_else(|| SettingsError::Missing(key.to_owned()))
		}
	}

	fn complete() -> HashMap<&'static str, &'static str> {
		HashMap::from([
			(LOCAL_AET, "LOOKUP"),
			(LOCAL_PORT, "11112"),
			(REMOTE_AET, "ORTHANC"),
			(REMOTE_HOST, "localhost"),
			(REMOTE_PORT, "4242"),
			(DESTINATION_AET, "LOOKUP"),
		])
	}

	#[test]
	fn resolve_network_settings() {
		let settings = NetworkSettings::resolve(&MapSettings(complete())).unwrap();
		assert_eq!(settings.remote_port, 4242);
		assert_eq!(settings.local_aet, "LOOKUP");
	}

	#[test]
	fn missing_key_fails() {
		let mut values = complete();
		values.remove(REMOTE_HOST);
		assert_eq!(
			NetworkSettings::resolve(&MapSettings(values)),
			Err(SettingsError::Missing(String::from(REMOTE_HOST)))
		);
	}

	#[test]
	fn unparsable_port_fails_instead_of_defaulting_to_zero() {
		let mut values = complete();
		values.insert(REMOTE_PORT, "forty-two");
		let err = NetworkSettings::resolve(&MapSettings(values)).unwrap_err();
		assert!(matches!(
			err,
			SettingsError::Invalid { ref key, ref value, .. } if key == REMOTE_PORT && value == "forty-two"
		));

		let mut values = complete();
		values.insert(LOCAL_PORT, "70000");
		assert!(NetworkSettings::resolve(&MapSettings(values)).is_err());
	}

	#[test]
	fn config_backed_settings() {
		let config = config::Config::builder()
			.set_override(REMOTE_AET, "ORTHANC")
			.unwrap()
			.set_override(REMOTE_PORT, "abc")
			.unwrap()
			.build()
			.unwrap();
		let settings = ConfigSettings::new(config);

		assert_eq!(settings.string(REMOTE_AET).unwrap(), "ORTHANC");
		assert_eq!(
			settings.string(REMOTE_HOST),
			Err(SettingsError::Missing(String::from(REMOTE_HOST)))
		);
		assert!(matches!(
			settings.integer(REMOTE_PORT),
			Err(SettingsError::Invalid { .. })
		));
	}
}
