//! # API Dumps
//!
//! The plain-text artifact compared across builds to catch breaking changes.
//!
//! ## Format
//!
//! ```text
//! app.cash.EchoService
//!   fun echo(app.cash.EchoRequest): app.cash.EchoResponse
//! app.cash.MathService
//!   fun add(kotlin.Int, kotlin.Int): kotlin.Int
//! ```
//!
//! Services are sorted by name, signatures lexicographically, every line ends
//! with `\n`. The runtime registry and the offline extractor produce this text
//! byte-for-byte identically for the same declarations.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::error::Error;
use crate::error::Result;
use crate::member::MemberKind;
use crate::member::Signature;
use crate::service_type::ServiceType;

const INDENT: &str = "  ";

/// A set of service types in canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApiDump {
    services: Vec<ServiceType>,
}

impl ApiDump {
    /// Builds a dump, sorting services by name. Rejects duplicate names.
    pub fn new(services: impl IntoIterator<Item = ServiceType>) -> Result<Self> {
        let mut by_name: BTreeMap<String, ServiceType> = BTreeMap::new();
        for service in services {
            let name = service.name().to_string();
            if by_name.insert(name.clone(), service).is_some() {
                return Err(Error::DuplicateService(name));
            }
        }
        Ok(Self { services: by_name.into_values().collect() })
    }

    pub fn services(&self) -> &[ServiceType] {
        &self.services
    }

    pub fn get(&self, name: &str) -> Option<&ServiceType> {
        self.services
            .binary_search_by(|s| s.name().cmp(name))
            .ok()
            .map(|i| &self.services[i])
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for service in &self.services {
            out.push_str(service.name());
            out.push('\n');
            for signature in service.signatures() {
                out.push_str(INDENT);
                out.push_str(signature.as_str());
                out.push('\n');
            }
        }
        out
    }

    /// Reads the text produced by `to_text`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut services = Vec::new();
        let mut current: Option<ServiceType> = None;

        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;
            if line.trim().is_empty() {
                continue;
            }

            if let Some(signature) = line.strip_prefix(INDENT) {
                let service = current.as_mut().ok_or_else(|| Error::Parse {
                    line: line_no,
                    message: "signature before any service name".into(),
                })?;
                let kind = MemberKind::of_signature(signature).ok_or_else(|| Error::Parse {
                    line: line_no,
                    message: format!("unrecognized member '{}'", signature),
                })?;
                service.insert(Signature::from_canonical(signature.to_string()), kind)?;
            } else if line.starts_with(char::is_whitespace) {
                return Err(Error::Parse {
                    line: line_no,
                    message: "signatures must be indented by exactly two spaces".into(),
                });
            } else {
                services.extend(current.take());
                current = Some(ServiceType::new(line.trim_end()));
            }
        }
        services.extend(current);

        Self::new(services)
    }
}

/// Differences between an expected (published) dump and an actual (built) one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApiDiff {
    pub removed_services: Vec<String>,
    pub added_services: Vec<String>,
    /// `(service, signature)` pairs published but no longer provided.
    pub removed_functions: Vec<(String, String)>,
    /// `(service, signature)` pairs provided but not yet published.
    pub added_functions: Vec<(String, String)>,
}

impl ApiDiff {
    /// Peers built against the expected dump would call members that no longer exist.
    pub fn is_breaking(&self) -> bool {
        !self.removed_services.is_empty() || !self.removed_functions.is_empty()
    }

    /// The published dump is stale and should be regenerated.
    pub fn requires_update(&self) -> bool {
        !self.added_services.is_empty() || !self.added_functions.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.is_breaking() && !self.requires_update()
    }
}

/// Compares two dumps service by service and signature by signature.
pub fn compare(expected: &ApiDump, actual: &ApiDump) -> ApiDiff {
    let mut diff = ApiDiff::default();

    let names: BTreeSet<&str> = expected
        .services
        .iter()
        .chain(actual.services.iter())
        .map(|s| s.name())
        .collect();

    for name in names {
        match (expected.get(name), actual.get(name)) {
            (Some(_), None) => diff.removed_services.push(name.to_string()),
            (None, Some(_)) => diff.added_services.push(name.to_string()),
            (Some(e), Some(a)) => {
                for sig in e.signatures().filter(|s| !a.contains(s.as_str())) {
                    diff.removed_functions.push((name.to_string(), sig.to_string()));
                }
                for sig in a.signatures().filter(|s| !e.contains(s.as_str())) {
                    diff.added_functions.push((name.to_string(), sig.to_string()));
                }
            }
            (None, None) => {}
        }
    }

    diff
}
