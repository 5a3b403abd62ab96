//! Generator registry and its read-only directory
//!
//! The registry owns the generators and is held by the scheduler. The
//! directory is a cheap clonable view of id <-> name that the receive
//! path consults without touching any generator.

use std::sync::{Arc, RwLock};

use ahash::AHashMap;

use crate::core::error::{Result, TickwireError};
use crate::core::types::GeneratorId;
use crate::generator::traits::Generator;

/// Shared id <-> name lookup
#[derive(Debug, Clone, Default)]
pub struct RegistryDirectory {
    names: Arc<RwLock<AHashMap<GeneratorId, String>>>,
}

impl RegistryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: GeneratorId) -> bool {
        self.read().contains_key(&id)
    }

    pub fn name_of(&self, id: GeneratorId) -> Option<String> {
        self.read().get(&id).cloned()
    }

    pub fn id_for_name(&self, name: &str) -> Option<GeneratorId> {
        self.read()
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn insert(&self, id: GeneratorId, name: String) {
        self.names
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, name);
    }

    fn remove(&self, id: GeneratorId) {
        self.names
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, AHashMap<GeneratorId, String>> {
        self.names.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Ordered collection of generators
///
/// Iteration order is insertion order; it fixes per-tick processing and
/// emission order.
#[derive(Default)]
pub struct GeneratorRegistry {
    generators: Vec<Box<dyn Generator>>,
    directory: RegistryDirectory,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a generator; ids must be unique
    pub fn add(&mut self, generator: Box<dyn Generator>) -> Result<GeneratorId> {
        let id = generator.id();
        if self.contains(id) {
            return Err(TickwireError::DuplicateGenerator(id));
        }
        self.directory.insert(id, generator.name().to_string());
        self.generators.push(generator);
        Ok(id)
    }

    pub fn remove(&mut self, id: GeneratorId) -> Option<Box<dyn Generator>> {
        let index = self.index_of(id)?;
        self.directory.remove(id);
        Some(self.generators.remove(index))
    }

    /// Change a generator's name; its id stays the same
    pub fn rename(&mut self, id: GeneratorId, name: String) -> Result<()> {
        let generator = self
            .get_mut(id)
            .ok_or_else(|| TickwireError::UnknownGenerator(id.to_string()))?;
        generator.set_name(name.clone());
        self.directory.insert(id, name);
        Ok(())
    }

    pub fn contains(&self, id: GeneratorId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn get(&self, id: GeneratorId) -> Option<&dyn Generator> {
        let index = self.index_of(id)?;
        Some(&*self.generators[index])
    }

    pub fn get_mut(&mut self, id: GeneratorId) -> Option<&mut (dyn Generator + 'static)> {
        let index = self.index_of(id)?;
        Some(&mut *self.generators[index])
    }

    pub fn ids(&self) -> Vec<GeneratorId> {
        self.generators.iter().map(|g| g.id()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Generator> {
        self.generators.iter().map(|g| &**g)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Generator>> {
        self.generators.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    pub fn directory(&self) -> RegistryDirectory {
        self.directory.clone()
    }

    fn index_of(&self, id: GeneratorId) -> Option<usize> {
        self.generators.iter().position(|g| g.id() == id)
    }
}
