//! The composition root shared by both RPC directions: one [`Rpc`] value
//! carries the collaborators (auth, tracer, keepalive, retry) that every
//! server and client of a service needs, so the two sides cannot drift
//! apart in configuration.

use crate::auth::AuthConfig;
use crate::client::{Client, resolve_target_url};
use crate::keepalive::KeepaliveConfig;
use crate::registry::{ServiceDefinition, service_definition};
use crate::retry::RetryPolicy;
use crate::server::Server;
use fleet_error::FleetError;
use fleet_tracer::Tracer;

/// Shared RPC collaborators for one service identity.
#[derive(Debug)]
pub struct Rpc {
    service_id: String,
    definition: &'static ServiceDefinition,
    auth: AuthConfig,
    tracer: Tracer,
    keepalive: KeepaliveConfig,
    retry: RetryPolicy,
}

impl Rpc {
    /// Resolve `config_name` against the compiled registry and bundle the
    /// collaborators both directions share. Fails loudly when the name has
    /// no compiled definition.
    pub fn new(config_name: &str, auth: AuthConfig, tracer: Tracer) -> Result<Self, FleetError> {
        Ok(Self {
            service_id: config_name.to_string(),
            definition: service_definition(config_name)?,
            auth,
            tracer,
            keepalive: KeepaliveConfig::default(),
            retry: RetryPolicy::default(),
        })
    }

    /// Override the default keepalive parameters for both directions.
    #[must_use]
    pub fn with_keepalive(mut self, keepalive: KeepaliveConfig) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Override the default retry policy handed to clients.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// This service's compiled definition.
    #[must_use]
    pub fn definition(&self) -> &'static ServiceDefinition {
        self.definition
    }

    /// The tracer shared by this service's server and clients.
    #[must_use]
    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// A server for this service's surface, carrying the shared auth and
    /// keepalive. Routes are registered by the caller via
    /// [`Server::merge`], one `/<Service>.<Method>` route per method in
    /// [`Rpc::definition`].
    #[must_use]
    pub fn server(&self) -> Server {
        Server::new(self.auth.clone()).with_keepalive(self.keepalive)
    }

    /// A client dialing `target`'s surface, resolved against `config`
    /// (substituting the in-mesh DNS name when the configured host is the
    /// unspecified address), signed as this service, observed by the
    /// shared tracer.
    pub fn client_for(&self, target: &str, config: &fleet_config::Config) -> Result<Client, FleetError> {
        let definition = service_definition(target)?;
        let base_url = resolve_target_url(definition.name, config);
        Ok(Client::with_keepalive(
            self.service_id.clone(),
            base_url,
            self.auth.clone(),
            self.tracer.clone(),
            self.keepalive,
        )?
        .with_retry(self.retry))
    }
}
