//! The compiled service registry: every RPC surface in the fleet, keyed by
//! capitalized service name.

use fleet_error::FleetError;

/// One service's compiled definition: its name and method set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDefinition {
    /// Capitalized service name, e.g. `"Agent"`.
    pub name: &'static str,
    /// Method names exposed by this service.
    pub methods: &'static [&'static str],
}

impl ServiceDefinition {
    /// Whether `method` is part of this service's surface.
    #[must_use]
    pub fn has_method(&self, method: &str) -> bool {
        self.methods.contains(&method)
    }

    /// The `"<Service>.<Method>"` route for `method`, as registered on the
    /// server and dialed by clients.
    pub fn route(&self, method: &str) -> Result<String, FleetError> {
        if !self.has_method(method) {
            return Err(FleetError::invalid_argument(format!(
                "service {} has no method {method}",
                self.name
            )));
        }
        Ok(format!("{}.{method}", self.name))
    }
}

const SERVICES: &[ServiceDefinition] = &[
    ServiceDefinition {
        name: "Agent",
        methods: &[
            "ProcessUnary",
            "ProcessStream",
            "ListSubAgents",
            "RunSubAgent",
            "ListHandoffs",
            "RunHandoff",
        ],
    },
    ServiceDefinition {
        name: "Memory",
        methods: &["AppendMemory", "GetWindow"],
    },
    ServiceDefinition {
        name: "Trace",
        methods: &["RecordSpan", "QuerySpans"],
    },
    ServiceDefinition {
        name: "Vector",
        methods: &["QueryItems"],
    },
    ServiceDefinition {
        name: "Graph",
        methods: &["QueryByPattern"],
    },
    ServiceDefinition {
        name: "Llm",
        methods: &["CreateCompletions", "CreateEmbeddings"],
    },
];

/// Look up the compiled definition for a config-supplied service name
/// (lowercase in config, capitalized in the registry). Fails loudly when
/// the name matches nothing: a typo in a service name must never silently
/// produce an empty surface.
pub fn service_definition(config_name: &str) -> Result<&'static ServiceDefinition, FleetError> {
    let capitalized = capitalize(config_name);
    SERVICES
        .iter()
        .find(|s| s.name == capitalized)
        .ok_or_else(|| {
            FleetError::invalid_argument(format!(
                "no compiled service definition for {config_name:?} (looked up {capitalized:?})"
            ))
        })
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_names_are_capitalized_for_lookup() {
        let def = service_definition("memory").unwrap();
        assert_eq!(def.name, "Memory");
        assert!(def.has_method("GetWindow"));
    }

    #[test]
    fn unknown_service_fails_loudly() {
        let err = service_definition("telemetry").unwrap_err();
        assert_eq!(err.code, fleet_error::ErrorCode::InvalidArgument);
    }

    #[test]
    fn route_rejects_unknown_methods() {
        let def = service_definition("trace").unwrap();
        assert_eq!(def.route("RecordSpan").unwrap(), "Trace.RecordSpan");
        assert!(def.route("DropSpan").is_err());
    }
}
