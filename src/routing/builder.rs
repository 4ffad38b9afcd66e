//! Route table construction.
//!
//! # Responsibilities
//! - Turn the single-URI mount and the mount mapping into ordered bindings
//! - Apply per-mount middleware flags (default on, explicit `false` opts out)
//! - Mark which bindings get a format probe
//!
//! # Design Decisions
//! - The single-URI mount is always first, with every middleware on and a
//!   format probe
//! - Mapping entries follow file order and only probe when `inspect = true`
//! - Overlap is not deduplicated; the router resolves it by order

use crate::config::validation::normalize_prefix;
use crate::config::{MountTableConfig, ServerConfig, SourceSpec};
use crate::routing::binding::{MountFlags, RouteBinding};

#[derive(Debug, Default)]
pub struct RouteTableBuilder {
    single: Option<SourceSpec>,
    mounts: Option<MountTableConfig>,
}

impl RouteTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ServerConfig, mounts: Option<MountTableConfig>) -> Self {
        Self {
            single: config.uri.clone(),
            mounts,
        }
    }

    pub fn with_uri(mut self, source: SourceSpec) -> Self {
        self.single = Some(source);
        self
    }

    pub fn with_mounts(mut self, mounts: MountTableConfig) -> Self {
        self.mounts = Some(mounts);
        self
    }

    pub fn build(self) -> Vec<RouteBinding> {
        let mut bindings = Vec::new();

        if let Some(source) = self.single {
            bindings.push(RouteBinding::primary("", source, MountFlags::default()).with_format_probe(true));
        }

        if let Some(mounts) = self.mounts {
            for (prefix, spec) in mounts.iter() {
                bindings.push(
                    RouteBinding::primary(normalize_prefix(prefix), spec.source().clone(), spec.flags())
                        .with_format_probe(spec.inspect()),
                );
            }
        }

        if bindings.is_empty() {
            tracing::warn!("No tile sources configured; only static assets will be served");
        }
        bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::MountKind;

    fn mapping(json: &str) -> MountTableConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn empty_builder_yields_no_bindings() {
        assert!(RouteTableBuilder::new().build().is_empty());
    }

    #[test]
    fn single_uri_is_root_with_everything_on() {
        let bindings = RouteTableBuilder::new().with_uri("file:///srv/a".into()).build();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].prefix, "");
        assert_eq!(bindings[0].flags, MountFlags { timing: true, cors: true });
        assert_eq!(bindings[0].kind, MountKind::Primary);
        assert!(bindings[0].probe_format);
    }

    #[test]
    fn mapping_order_is_registration_order() {
        let bindings = RouteTableBuilder::new()
            .with_mounts(mapping(
                r#"{"/zeta": "file:///z", "/alpha/": "file:///a", "/": "file:///r", "/mid": "file:///m"}"#,
            ))
            .build();
        let prefixes: Vec<&str> = bindings.iter().map(|b| b.prefix.as_str()).collect();
        assert_eq!(prefixes, vec!["/zeta", "/alpha", "", "/mid"]);
    }

    #[test]
    fn flags_default_on_and_opt_out() {
        let bindings = RouteTableBuilder::new()
            .with_mounts(mapping(
                r#"{
                    "/a": {"source": "file:///a"},
                    "/b": {"source": "file:///b", "timing": false},
                    "/c": {"source": "file:///c", "cors": false, "timing": true}
                }"#,
            ))
            .build();
        assert_eq!(bindings[0].flags, MountFlags { timing: true, cors: true });
        assert_eq!(bindings[1].flags, MountFlags { timing: false, cors: true });
        assert_eq!(bindings[2].flags, MountFlags { timing: true, cors: false });
    }

    #[test]
    fn mapping_mounts_probe_only_on_opt_in() {
        let bindings = RouteTableBuilder::new()
            .with_mounts(mapping(
                r#"{"/a": "file:///a", "/b": {"source": "file:///b", "inspect": true}}"#,
            ))
            .build();
        assert!(!bindings[0].probe_format);
        assert!(bindings[1].probe_format);
    }

    #[test]
    fn both_modes_single_uri_first() {
        let config = ServerConfig {
            uri: Some("file:///root".into()),
            ..ServerConfig::default()
        };
        let bindings = RouteTableBuilder::from_config(&config, Some(mapping(r#"{"/": "file:///other"}"#))).build();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].source, SourceSpec::from("file:///root"));
        assert_eq!(bindings[1].prefix, "");
        assert!(!bindings[1].probe_format);
    }
}
