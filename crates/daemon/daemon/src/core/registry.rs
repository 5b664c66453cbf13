//! Procedure registry and startup gate.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::procedure::Procedure;

/// Registry construction and lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
	/// Two procedures share a name.
	#[error("procedure \"{0}\" is registered more than once")]
	Duplicate(String),
	/// No procedure has this name.
	#[error("method \"{0}\" not found")]
	UnknownMethod(String),
	/// The procedure exists but the daemon is still starting.
	#[error("{0} is unavailable until the daemon is fully started")]
	NotReady(String),
}

/// Collects procedures before freezing them into a [`MethodRegistry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
	procedures: Vec<Procedure>,
}

impl RegistryBuilder {
	/// Adds a procedure.
	#[must_use]
	pub fn register(mut self, procedure: Procedure) -> Self {
		self.procedures.push(procedure);
		self
	}

	/// Freezes the registry.
	///
	/// # Errors
	///
	/// Returns [`RegistryError::Duplicate`] if two procedures share a name.
	pub fn build(self) -> Result<MethodRegistry, RegistryError> {
		let mut procedures = BTreeMap::new();
		for procedure in self.procedures {
			let name = procedure.name().to_owned();
			if procedures.insert(name.clone(), procedure).is_some() {
				return Err(RegistryError::Duplicate(name));
			}
		}
		Ok(MethodRegistry {
			procedures,
			started: AtomicBool::new(false),
		})
	}
}

/// Read-only name to procedure map.
#[derive(Debug)]
pub struct MethodRegistry {
	procedures: BTreeMap<String, Procedure>,
	started: AtomicBool,
}

impl MethodRegistry {
	/// Starts building a registry.
	pub fn builder() -> RegistryBuilder {
		RegistryBuilder::default()
	}

	/// Looks up a procedure for execution, applying the startup gate.
	///
	/// # Errors
	///
	/// Returns [`RegistryError::UnknownMethod`] for an unregistered name and
	/// [`RegistryError::NotReady`] for a procedure that is not available
	/// before startup completes.
	pub fn resolve(&self, name: &str) -> Result<&Procedure, RegistryError> {
		let procedure = self
			.procedures
			.get(name)
			.ok_or_else(|| RegistryError::UnknownMethod(name.to_owned()))?;
		if !self.is_started() && !procedure.is_available_during_startup() {
			return Err(RegistryError::NotReady(name.to_owned()));
		}
		Ok(procedure)
	}

	/// Looks up a procedure regardless of the startup gate.
	pub fn get(&self, name: &str) -> Option<&Procedure> {
		self.procedures.get(name)
	}

	/// Opens the startup gate. Subsequent calls are no-ops.
	pub fn mark_started(&self) {
		if !self.started.swap(true, Ordering::AcqRel) {
			tracing::info!(procedures = self.procedures.len(), "startup complete");
		}
	}

	/// Returns `true` once the startup gate is open.
	pub fn is_started(&self) -> bool {
		self.started.load(Ordering::Acquire)
	}

	/// Registered procedures in name order.
	pub fn procedures(&self) -> impl Iterator<Item = &Procedure> {
		self.procedures.values()
	}

	/// Registered names in order.
	pub fn names(&self) -> Vec<&str> {
		self.procedures.keys().map(String::as_str).collect()
	}
}
