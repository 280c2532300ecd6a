use super::connection::Connection;
use super::options::{ConnectOptions, EnvironmentConfig};
use crate::error::{codes, MimerError, Result};
use crate::native::{DispatchTable, MimerApi, MimerLibrary, NativeLayer};
use crate::observability::StructuredLogger;
use crate::versioning::ApiVersion;
use std::sync::Arc;

/// A loaded native library plus the dispatch table and logger every
/// connection created from it shares.
#[derive(Clone)]
pub struct MimerEnvironment {
    native: Arc<NativeLayer>,
    version: ApiVersion,
}

impl MimerEnvironment {
    /// Loads the shared library described by `config`.
    pub fn new(config: &EnvironmentConfig) -> Result<Self> {
        let library = MimerLibrary::discover(config.library_path.as_deref())?;
        log::debug!("Loaded Mimer API from {}", library.path().display());
        Self::build(Arc::new(library), StructuredLogger::from_env(config.trace_api))
    }

    /// Binds to an already constructed implementation of the library.
    pub fn with_api(api: Arc<dyn MimerApi>) -> Result<Self> {
        Self::build(api, StructuredLogger::from_env(false))
    }

    pub fn with_api_and_config(api: Arc<dyn MimerApi>, config: &EnvironmentConfig) -> Result<Self> {
        Self::build(api, StructuredLogger::from_env(config.trace_api))
    }

    fn build(api: Arc<dyn MimerApi>, logger: StructuredLogger) -> Result<Self> {
        let reported = api.api_version();
        let version = ApiVersion::parse(&reported)
            .filter(ApiVersion::is_supported)
            .ok_or_else(|| {
                log::warn!("Rejecting Mimer API version {:?}", reported);
                MimerError::local(codes::API_VERSION_TOO_OLD)
            })?;

        Ok(Self {
            native: Arc::new(NativeLayer::new(api, DispatchTable::standard(), logger)),
            version,
        })
    }

    pub fn api_version(&self) -> ApiVersion {
        self.version
    }

    pub fn native(&self) -> Arc<NativeLayer> {
        self.native.clone()
    }

    pub fn connect(&self, options: &ConnectOptions) -> Result<Connection> {
        Connection::connect(self, options)
    }
}
