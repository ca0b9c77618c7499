//! Name-based selection of backends.
//!
//! A [`Registry`] maps names to [`Loader`]s. Loading a plugin resolves its
//! loader once into a [`Plugin`] (a factory plus documentation); creating an
//! instance runs the factory and checks the result against the
//! [`Family`]'s structural contract before handing it out.

use std::{collections::BTreeMap, fmt};

use crate::{Error, Options, SolverInterface};

/// A family of interchangeable backends.
///
/// Each family fixes the problem structure its factories accept and the
/// interface their instances implement.
pub trait Family: 'static {
    /// Human-readable family name, used in errors and logs.
    const NAME: &'static str;

    /// The problem structure passed to factories.
    type Structure: ?Sized;

    /// The interface of produced instances.
    type Instance: ?Sized + SolverInterface;

    /// Checks a freshly created instance against the structure it was built
    /// from.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] if the instance's declared schema
    /// does not match `structure`.
    fn validate(instance: &Self::Instance, structure: &Self::Structure) -> Result<(), Error>;
}

/// Builds an uninitialized backend instance.
pub type Factory<F> = fn(
    &<F as Family>::Structure,
    &Options,
) -> Result<Box<<F as Family>::Instance>, Error>;

/// Resolves a registered name into a [`Plugin`].
///
/// An `Err` carries the reason resolution failed.
pub type Loader<F> = fn() -> Result<Plugin<F>, String>;

/// A resolved backend.
pub struct Plugin<F: Family> {
    pub factory: Factory<F>,
    pub doc: &'static str,
}

impl<F: Family> Clone for Plugin<F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F: Family> Copy for Plugin<F> {}

struct Descriptor<F: Family> {
    loader: Loader<F>,
    plugin: Option<Plugin<F>>,
}

/// A table of named backends for one [`Family`].
///
/// The key set is fixed by explicit [`Registry::register`] calls; afterwards
/// only the loaded state of each entry changes.
pub struct Registry<F: Family> {
    plugins: BTreeMap<String, Descriptor<F>>,
}

impl<F: Family> Registry<F> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            plugins: BTreeMap::new(),
        }
    }

    /// Registers `loader` under `name`.
    ///
    /// Returns `false` and keeps the existing entry if `name` is taken.
    pub fn register(&mut self, name: impl Into<String>, loader: Loader<F>) -> bool {
        let name = name.into();
        if self.plugins.contains_key(&name) {
            tracing::warn!(family = F::NAME, plugin = %name, "plugin already registered");
            return false;
        }
        self.plugins.insert(
            name,
            Descriptor {
                loader,
                plugin: None,
            },
        );
        true
    }

    /// Returns `true` if `name` is registered, loaded or not.
    #[must_use]
    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    #[must_use]
    pub fn is_loaded(&self, name: &str) -> bool {
        self.plugins
            .get(name)
            .is_some_and(|descriptor| descriptor.plugin.is_some())
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    /// Resolves the plugin registered under `name`.
    ///
    /// Loading an already-loaded plugin does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PluginNotFound`] for an unregistered name and
    /// [`Error::PluginLoad`] if the loader fails.
    pub fn load_plugin(&mut self, name: &str) -> Result<(), Error> {
        self.resolve(name).map(|_| ())
    }

    /// Returns the documentation of a plugin, loading it if needed.
    ///
    /// # Errors
    ///
    /// As [`Registry::load_plugin`].
    pub fn doc(&mut self, name: &str) -> Result<&'static str, Error> {
        self.resolve(name).map(|plugin| plugin.doc)
    }

    /// Creates an uninitialized instance of the plugin registered under
    /// `name`, loading it if needed.
    ///
    /// # Errors
    ///
    /// Fails as [`Registry::load_plugin`], with the factory's own error, with
    /// [`Error::PluginLoad`] if the factory returns an initialized instance,
    /// and with [`Error::SchemaMismatch`] if the instance does not match
    /// `structure`.
    pub fn create(
        &mut self,
        name: &str,
        structure: &F::Structure,
        options: &Options,
    ) -> Result<Box<F::Instance>, Error> {
        let plugin = self.resolve(name)?;
        let instance = (plugin.factory)(structure, options)?;

        if instance.is_initialized() {
            return Err(Error::PluginLoad {
                family: F::NAME,
                name: name.to_string(),
                reason: "factory returned an initialized instance".into(),
            });
        }
        F::validate(&instance, structure)?;

        tracing::debug!(family = F::NAME, plugin = name, "created instance");
        Ok(instance)
    }

    fn resolve(&mut self, name: &str) -> Result<Plugin<F>, Error> {
        let descriptor = self
            .plugins
            .get_mut(name)
            .ok_or_else(|| Error::PluginNotFound {
                family: F::NAME,
                name: name.to_string(),
            })?;

        if let Some(plugin) = descriptor.plugin {
            return Ok(plugin);
        }

        match (descriptor.loader)() {
            Ok(plugin) => {
                tracing::debug!(family = F::NAME, plugin = name, "loaded plugin");
                descriptor.plugin = Some(plugin);
                Ok(plugin)
            }
            Err(reason) => {
                tracing::warn!(family = F::NAME, plugin = name, %reason, "plugin failed to load");
                Err(Error::PluginLoad {
                    family: F::NAME,
                    name: name.to_string(),
                    reason,
                })
            }
        }
    }
}

impl<F: Family> Default for Registry<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Family> fmt::Debug for Registry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, descriptor) in &self.plugins {
            map.entry(name, &descriptor.plugin.is_some());
        }
        map.finish()
    }
}
