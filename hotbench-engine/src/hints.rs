//! Compiler Hints
//!
//! Per-benchmark call directives. The engine keeps one process-wide default
//! list and exports it to every fork it launches through [`HINTS_ENV`]; the
//! harness uses it to decide how each benchmark body is invoked.
//!
//! On-disk format is one `<directive> <benchmark-id>` pair per line, with
//! blank lines and `#` comments ignored.
//!
//! [`HINTS_ENV`]: crate::HINTS_ENV

use crate::COMPILER_HINTS;
use crate::error::RegistryError;
use crate::registry::default_resource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

static DEFAULT_LIST: RwLock<Option<Arc<CompilerHints>>> = RwLock::new(None);

/// How the harness should call a benchmark body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HintDirective {
    /// Call the body directly so it may be inlined into the measurement loop
    Inline,
    /// Call the body through an opaque function pointer
    DontInline,
}

impl fmt::Display for HintDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HintDirective::Inline => f.write_str("inline"),
            HintDirective::DontInline => f.write_str("dontinline"),
        }
    }
}

impl FromStr for HintDirective {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inline" => Ok(HintDirective::Inline),
            "dontinline" => Ok(HintDirective::DontInline),
            other => Err(format!("unknown directive `{other}`")),
        }
    }
}

/// A directive bound to one benchmark
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerHint {
    /// The directive
    pub directive: HintDirective,
    /// Benchmark id the directive applies to
    pub target: String,
}

/// Ordered list of compiler hints
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerHints {
    hints: Vec<CompilerHint>,
}

impl CompilerHints {
    /// Build a hint list
    pub fn new(hints: Vec<CompilerHint>) -> Self {
        Self { hints }
    }

    /// Load the hint list stored at `path`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse hint list text
    pub fn parse(content: &str) -> Result<Self, RegistryError> {
        let mut hints = Vec::new();
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let malformed = |reason: String| RegistryError::MalformedHint {
                line: index + 1,
                reason,
            };
            let (directive, target) = line
                .split_once(char::is_whitespace)
                .ok_or_else(|| malformed("expected `<directive> <benchmark>`".to_string()))?;
            let target = target.trim();
            if target.is_empty() || target.contains(char::is_whitespace) {
                return Err(malformed(format!("invalid target `{target}`")));
            }
            hints.push(CompilerHint {
                directive: directive.parse().map_err(malformed)?,
                target: target.to_string(),
            });
        }
        Ok(Self { hints })
    }

    /// Render the hint list in its on-disk format
    pub fn to_text(&self) -> String {
        self.hints
            .iter()
            .map(|h| format!("{} {}\n", h.directive, h.target))
            .collect()
    }

    /// Write the hint list to `path`, creating parent directories
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), RegistryError> {
        let path = path.as_ref();
        let write_err = |source| RegistryError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, self.to_text()).map_err(write_err)
    }

    /// Compact single-line form passed to forks: `directive=target;...`
    pub fn to_env_value(&self) -> String {
        self.hints
            .iter()
            .map(|h| format!("{}={}", h.directive, h.target))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Directive for `benchmark`, if one was declared. The last one wins.
    pub fn directive_for(&self, benchmark: &str) -> Option<HintDirective> {
        self.hints
            .iter()
            .rev()
            .find(|h| h.target == benchmark)
            .map(|h| h.directive)
    }

    /// All hints, in declaration order
    pub fn hints(&self) -> &[CompilerHint] {
        &self.hints
    }

    /// Number of hints
    pub fn len(&self) -> usize {
        self.hints.len()
    }

    /// Whether the list holds no hints
    pub fn is_empty(&self) -> bool {
        self.hints.is_empty()
    }

    /// The process-wide default hint list.
    ///
    /// Loaded on first use from `<exe dir>/hotbench/CompilerHints`; a missing
    /// or unreadable resource yields an empty list.
    pub fn default_list() -> Arc<CompilerHints> {
        if let Some(list) = read_default().as_ref() {
            return Arc::clone(list);
        }

        let loaded = default_resource(COMPILER_HINTS)
            .and_then(CompilerHints::from_file)
            .unwrap_or_else(|e| {
                tracing::debug!(error = %e, "no bundled compiler hints, using an empty list");
                CompilerHints::default()
            });

        let mut slot = DEFAULT_LIST.write().unwrap_or_else(|p| p.into_inner());
        Arc::clone(slot.get_or_insert_with(|| Arc::new(loaded)))
    }

    /// Replace the process-wide default hint list.
    ///
    /// Escape hatch for drivers that produce hints at run time instead of
    /// bundling them with the executable. Every subsequent fork launched in
    /// this process receives `hints`.
    #[doc(hidden)]
    pub fn replace_default_list(hints: CompilerHints) {
        let mut slot = DEFAULT_LIST.write().unwrap_or_else(|p| p.into_inner());
        *slot = Some(Arc::new(hints));
    }
}

fn read_default() -> std::sync::RwLockReadGuard<'static, Option<Arc<CompilerHints>>> {
    DEFAULT_LIST.read().unwrap_or_else(|p| p.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_directives() {
        let hints = CompilerHints::parse("# hints\ninline a::fast\n\ndontinline a::slow\n").unwrap();
        assert_eq!(hints.len(), 2);
        assert_eq!(hints.directive_for("a::fast"), Some(HintDirective::Inline));
        assert_eq!(hints.directive_for("a::slow"), Some(HintDirective::DontInline));
        assert_eq!(hints.directive_for("a::other"), None);
    }

    #[test]
    fn test_parse_rejects_unknown_directive() {
        let err = CompilerHints::parse("inline a::b\nexclude a::c\n").unwrap_err();
        match err {
            RegistryError::MalformedHint { line, reason } => {
                assert_eq!(line, 2);
                assert!(reason.contains("exclude"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_missing_target() {
        assert!(CompilerHints::parse("inline\n").is_err());
    }

    #[test]
    fn test_text_and_env_forms() {
        let hints = CompilerHints::new(vec![
            CompilerHint {
                directive: HintDirective::DontInline,
                target: "m::a".to_string(),
            },
            CompilerHint {
                directive: HintDirective::Inline,
                target: "m::b".to_string(),
            },
        ]);
        assert_eq!(hints.to_text(), "dontinline m::a\ninline m::b\n");
        assert_eq!(hints.to_env_value(), "dontinline=m::a;inline=m::b");
        assert_eq!(CompilerHints::parse(&hints.to_text()).unwrap(), hints);
    }

    #[test]
    #[serial(compiler_hints)]
    fn test_replace_default_list() {
        let hints = CompilerHints::parse("dontinline x::y\n").unwrap();
        CompilerHints::replace_default_list(hints.clone());
        assert_eq!(*CompilerHints::default_list(), hints);

        CompilerHints::replace_default_list(CompilerHints::default());
        assert!(CompilerHints::default_list().is_empty());
    }
}
