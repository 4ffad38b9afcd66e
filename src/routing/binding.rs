//! Route bindings: a prefix, a source, and the middleware chain around it.

use url::Url;

use crate::config::SourceSpec;
use crate::source::xray::inspection_uri;
use crate::source::SourceError;

/// Sub-path of a mount where the inspection view lives.
pub const INSPECT_SUBPATH: &str = "/_";

/// Per-mount middleware switches. Both default to on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountFlags {
    /// Attach `X-Response-Time`.
    pub timing: bool,
    /// Attach CORS headers.
    pub cors: bool,
}

impl Default for MountFlags {
    fn default() -> Self {
        Self {
            timing: true,
            cors: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    /// Configured directly (single URI or mapping entry).
    Primary,
    /// Derived at `<prefix>/_` after a successful format probe.
    Inspection,
}

/// One registered mount.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteBinding {
    /// Normalized prefix; empty string is the root.
    pub prefix: String,
    pub source: SourceSpec,
    pub flags: MountFlags,
    pub kind: MountKind,
    /// Probe the source after registration and derive an inspection mount
    /// when it is vector.
    pub probe_format: bool,
}

impl RouteBinding {
    pub fn primary(prefix: impl Into<String>, source: SourceSpec, flags: MountFlags) -> Self {
        Self {
            prefix: prefix.into(),
            source,
            flags,
            kind: MountKind::Primary,
            probe_format: false,
        }
    }

    pub fn with_format_probe(mut self, probe: bool) -> Self {
        self.probe_format = probe;
        self
    }

    pub fn url(&self) -> Result<Url, SourceError> {
        self.source.to_url()
    }

    /// The auxiliary binding at `<prefix>/_`: same data behind the
    /// inspection transform, same middleware flags.
    pub fn inspection(&self) -> Result<RouteBinding, SourceError> {
        let uri = inspection_uri(&self.url()?)?;
        Ok(RouteBinding {
            prefix: format!("{}{INSPECT_SUBPATH}", self.prefix),
            source: SourceSpec::Uri(uri.to_string()),
            flags: self.flags,
            kind: MountKind::Inspection,
            probe_format: false,
        })
    }

    /// Prefix as shown in logs and metric labels (`/` for the root).
    pub fn display_prefix(&self) -> &str {
        if self.prefix.is_empty() {
            "/"
        } else {
            &self.prefix
        }
    }
}
