//! Service discovery for a runlevel.

use crate::error::{Error, ParseError, Result};
use crate::runlevel::Runlevel;
use crate::service::{ParseOutcome, ServiceEntry};
use std::path::Path;
use tracing::{debug, info, warn};

/// Directory entry that did not follow the naming convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidEntry {
    /// Entry name, lossily converted for display
    pub filename: String,
    /// Why it was rejected
    pub reason: ParseError,
}

/// Ordered services to run for one runlevel.
#[derive(Debug, Clone)]
pub struct ServiceCatalog {
    runlevel: Runlevel,
    services: Vec<ServiceEntry>,
    invalid: Vec<InvalidEntry>,
}

impl ServiceCatalog {
    /// Scan `services_dir` for scripts belonging to `runlevel`.
    ///
    /// Only a directory that cannot be listed fails discovery. Bad names
    /// are logged and skipped, scripts for other runlevels are ignored.
    pub fn discover(services_dir: &Path, runlevel: Runlevel) -> Result<Self> {
        let discovery_error = |source| Error::Discovery {
            path: services_dir.to_path_buf(),
            source,
        };

        let entries = std::fs::read_dir(services_dir).map_err(discovery_error)?;

        let mut services = Vec::new();
        let mut invalid = Vec::new();

        for entry in entries {
            let entry = entry.map_err(discovery_error)?;
            let os_name = entry.file_name();

            // read_dir never yields these, but other listings might.
            if os_name == "." || os_name == ".." {
                continue;
            }

            let outcome = match os_name.to_str() {
                Some(filename) => ServiceEntry::parse(filename, runlevel, services_dir),
                None => ParseOutcome::Invalid(ParseError::NotUtf8),
            };

            match outcome {
                ParseOutcome::Matched(service) => {
                    info!(
                        service = %service.name,
                        ordering = %service.ordering,
                        "Discovered service"
                    );
                    services.push(service);
                }
                ParseOutcome::NotMatched => {
                    debug!(filename = ?os_name, runlevel = %runlevel, "Skipping service for other runlevels");
                }
                ParseOutcome::Invalid(reason) => {
                    let filename = os_name.to_string_lossy().into_owned();
                    let err = Error::InvalidServiceName {
                        filename: filename.clone(),
                        reason: reason.clone(),
                    };
                    warn!(error = %err, "Ignoring service");
                    invalid.push(InvalidEntry { filename, reason });
                }
            }
        }

        let catalog = Self::from_entries(runlevel, services).with_invalid(invalid);

        info!(
            runlevel = %runlevel,
            count = catalog.len(),
            "Discovered {} service(s)",
            catalog.len()
        );

        Ok(catalog)
    }

    /// Build a catalog from already parsed entries, sorting them.
    pub fn from_entries(runlevel: Runlevel, services: Vec<ServiceEntry>) -> Self {
        let mut catalog = Self {
            runlevel,
            services,
            invalid: Vec::new(),
        };
        catalog.sort();
        catalog
    }

    fn with_invalid(mut self, invalid: Vec<InvalidEntry>) -> Self {
        self.invalid = invalid;
        self
    }

    /// Stable sort by ordering key, byte-wise. Ties keep discovery order.
    fn sort(&mut self) {
        self.services.sort_by(|a, b| a.ordering.cmp(&b.ordering));
    }

    /// Runlevel the catalog was built for.
    pub fn runlevel(&self) -> Runlevel {
        self.runlevel
    }

    /// Services in execution order.
    pub fn services(&self) -> &[ServiceEntry] {
        &self.services
    }

    /// Entries rejected during discovery.
    pub fn invalid(&self) -> &[InvalidEntry] {
        &self.invalid
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ServiceEntry> {
        self.services.iter()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl<'a> IntoIterator for &'a ServiceCatalog {
    type Item = &'a ServiceEntry;
    type IntoIter = std::slice::Iter<'a, ServiceEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
