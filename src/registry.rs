use crate::entity::Attributes;
use crate::mapping::{AttributeMapping, MappingError};
use crate::types::QueryRetrieveLevel;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// A stateless value that is built once per type and then shared.
pub trait Descriptor: Send + Sync + 'static {
	fn construct() -> Result<Self, MappingError>
	where
		Self: Sized;
}

/// Per-kind metadata: the validated attribute mapping of `A`.
#[derive(Debug)]
pub struct EntityInfo<A> {
	mapping: AttributeMapping<A>,
}

impl<A: Attributes> EntityInfo<A> {
	#[inline]
	pub const fn mapping(&self) -> &AttributeMapping<A> {
		&self.mapping
	}

	#[inline]
	pub const fn level(&self) -> QueryRetrieveLevel {
		A::LEVEL
	}

	#[inline]
	pub const fn name(&self) -> &'static str {
		A::NAME
	}
}

impl<A: Attributes> Descriptor for EntityInfo<A> {
	fn construct() -> Result<Self, MappingError> {
		let mapping = AttributeMapping::build()?;
		debug!(kind = A::NAME, fields = mapping.len(), "Built attribute mapping");
		Ok(Self { mapping })
	}
}

/// Hands out one shared instance per descriptor type.
///
/// Construction happens under the map's entry lock, so concurrent first requests
/// for one type observe the same instance. Failed constructions are not cached
/// and are retried by the next request.
#[derive(Default)]
pub struct InfoRegistry {
	instances: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl InfoRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// The registry shared by the whole process.
	pub fn global() -> &'static Self {
		static REGISTRY: OnceLock<InfoRegistry> = OnceLock::new();
		REGISTRY.get_or_init(Self::new)
	}

	pub fn instance_for<D: Descriptor>(&self) -> Result<Arc<D>, MappingError> {
		let key = TypeId::of::<D>();
		if let Some(instance) = self.instances.get(&key) {
			return Ok(downcast(Arc::clone(instance.value())));
		}

		let instance = match self.instances.entry(key) {
			Entry::Occupied(entry) => Arc::clone(entry.get()),
			Entry::Vacant(entry) => {
				let instance: Arc<dyn Any + Send + Sync> = Arc::new(D::construct()?);
				entry.insert(Arc::clone(&instance));
				instance
			}
		};
		Ok(downcast(instance))
	}

	pub fn mapping_for<A: Attributes>(&self) -> Result<Arc<EntityInfo<A>>, MappingError> {
		self.instance_for::<EntityInfo<A>>()
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.instances.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.instances.is_empty()
	}
}

fn downcast<D: Descriptor>(instance: Arc<dyn Any + Send + Sync>) -> Arc<D> {
	instance
		.downcast::<D>()
		.unwrap_or_else(|_| unreachable!("registry entries are keyed by their own TypeId"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::entity::{PatientAttributes, StudyAttributes};
	use crate::tag::FieldTag;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Barrier;
	use std::thread;

	static CONSTRUCTIONS: AtomicUsize = AtomicUsize::new(0);

	struct Counted;

	impl Descriptor for Counted {
		fn construct() -> Result<Self, MappingError> {
			CONSTRUCTIONS.fetch_add(1, Ordering::SeqCst);
			thread::sleep(std::time::Duration::from_millis(5));
			Ok(Self)
		}
	}

	struct Broken;

	impl Descriptor for Broken {
		fn construct() -> Result<Self, MappingError> {
			Err(MappingError::NoMappedFields("Broken"))
		}
	}

	#[test]
	fn repeated_requests_return_the_same_instance() {
		let registry = InfoRegistry::new();
		for repetitions in [2, 50] {
			let first = registry.mapping_for::<StudyAttributes>().unwrap();
			for _ in 1..repetitions {
				let next = registry.mapping_for::<StudyAttributes>().unwrap();
				assert!(Arc::ptr_eq(&first, &next));
			}
		}
		assert_eq!(registry.len(), 1);
	}

	#[test]
	fn kinds_get_distinct_instances() {
		let registry = InfoRegistry::new();
		let study = registry.mapping_for::<StudyAttributes>().unwrap();
		let patient = registry.mapping_for::<PatientAttributes>().unwrap();

		assert_eq!(study.mapping().identity_tag(), FieldTag::StudyInstanceUid);
		assert_eq!(patient.mapping().identity_tag(), FieldTag::PatientId);
		assert_eq!(patient.level(), QueryRetrieveLevel::Patient);
		assert_eq!(registry.len(), 2);
	}

	#[test]
	fn concurrent_first_use_constructs_once() {
		let registry = Arc::new(InfoRegistry::new());
		let barrier = Arc::new(Barrier::new(8));

		let handles: Vec<_> = (0..8)
			.map(|_| {
				let registry = Arc::clone(&registry);
				let barrier = Arc::clone(&barrier);
				thread::spawn(move || {
					barrier.wait();
					registry.instance_for::<Counted>().unwrap()
				})
			})
			.collect();

		let instances: Vec<Arc<Counted>> = handles
			.into_iter()
			.map(|handle| handle.join().unwrap())
			.collect();

		assert_eq!(CONSTRUCTIONS.load(Ordering::SeqCst), 1);
		assert!(instances
			.windows(2)
			.all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
	}

	#[test]
	fn failed_construction_is_reported_and_not_cached() {
		let registry = InfoRegistry::new();
		assert_eq!(
			registry.instance_for::<Broken>().err(),
			Some(MappingError::NoMappedFields("Broken"))
		);
		assert!(registry.is_empty());
	}

	proptest::proptest! {
		#[test]
		fn any_number_of_requests_share_one_instance(requests in 1usize..64) {
			let registry = InfoRegistry::new();
			let first = registry.mapping_for::<StudyAttributes>().unwrap();
			for _ in 1..requests {
				let next = registry.mapping_for::<StudyAttributes>().unwrap();
				proptest::prop_assert!(Arc::ptr_eq(&first, &next));
			}
			proptest::prop_assert_eq!(registry.len(), 1);
		}
	}

	#[test]
	fn global_registry_is_shared() {
		let first = InfoRegistry::global()
			.mapping_for::<PatientAttributes>()
			.unwrap();
		let second = InfoRegistry::global()
			.mapping_for::<PatientAttributes>()
			.unwrap();
		assert!(Arc::ptr_eq(&first, &second));
	}
}
