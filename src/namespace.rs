//! The name the library is published under, and whatever it replaced.
//!
//! When the library is installed under a name that is already bound, the
//! earlier binding is kept so it can be put back with
//! [`Namespace::restore_conflicting_global`].

pub const DEFAULT_NAMESPACE: &str = "fmbridge";

#[derive(Debug, Clone)]
pub struct Namespace<T> {
    name: String,
    library: T,
    previous: Option<T>,
    bound: Option<T>,
}

impl<T: Clone> Namespace<T> {
    /// Binds `library` under `name`, remembering `existing` as the previous
    /// binding.
    pub fn install(name: impl Into<String>, existing: Option<T>, library: T) -> Self {
        Self {
            name: name.into(),
            bound: Some(library.clone()),
            library,
            previous: existing,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// What the name currently resolves to.
    pub fn current(&self) -> Option<&T> {
        self.bound.as_ref()
    }

    pub fn previous(&self) -> Option<&T> {
        self.previous.as_ref()
    }

    /// Rebinds the name to the previous binding and hands the library back
    /// so the caller can keep it under another name. Returns `None` when the
    /// name is already unbound.
    pub fn restore_conflicting_global(&mut self) -> Option<T> {
        self.bound.as_ref()?;
        self.bound = self.previous.clone();
        Some(self.library.clone())
    }
}
