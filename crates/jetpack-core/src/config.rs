use bitflags::bitflags;
use jetpack_parser::{CodegenOptions, ParserOptions};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

bitflags! {
    /// Feature switches for a bundling session. Bit values are stable and
    /// may be passed around as a plain `u32`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct BundleFlags: u32 {
        /// Parse JSX and lower it to `React.createElement` calls.
        const JSX = 0x1;
        const CONSTANT_FOLDING = 0x2;
        /// Rename inner scopes and root symbols to short names, compact output.
        const MINIFY = 0x100;
        /// Write a Chrome trace of the session phases next to the output.
        const TRACE_FILE = 0x1_0000;
        const SOURCEMAP = 0x2_0000;
        /// Keep the entry module's exports in the bundle.
        const LIBRARY = 0x4_0000;
    }
}

/// What a session does when a module reachable from the entry fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop on the first failed module. Nothing is written.
    #[default]
    Abort,
    /// Report failed modules and keep their imports verbatim.
    Continue,
}

impl FailurePolicy {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::Continue => "continue",
        }
    }
}

/// Configuration of one bundling session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Directory every module must live under. Module paths are relative to it.
    pub base_path: PathBuf,

    pub flags: BundleFlags,

    pub failure_policy: FailurePolicy,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            base_path: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            flags: BundleFlags::empty(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl BundleConfig {
    /// Create a config rooted at `base_path`.
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_flags(mut self, flags: BundleFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    #[must_use]
    pub fn minify(&self) -> bool {
        self.flags.contains(BundleFlags::MINIFY)
    }

    #[must_use]
    pub fn library(&self) -> bool {
        self.flags.contains(BundleFlags::LIBRARY)
    }

    /// Parser settings implied by the flags.
    #[must_use]
    pub fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            jsx: self.flags.contains(BundleFlags::JSX),
        }
    }

    /// Code generator settings implied by the flags.
    #[must_use]
    pub fn codegen_options(&self) -> CodegenOptions {
        CodegenOptions {
            minify: self.minify(),
            source_map: self.flags.contains(BundleFlags::SOURCEMAP),
            indent: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_bits() {
        assert_eq!(BundleFlags::JSX.bits(), 0x1);
        assert_eq!(BundleFlags::MINIFY.bits(), 0x100);
        assert_eq!(BundleFlags::LIBRARY.bits(), 0x40000);
        let flags = BundleFlags::from_bits_truncate(0x20101);
        assert!(flags.contains(BundleFlags::JSX | BundleFlags::MINIFY | BundleFlags::SOURCEMAP));
    }

    #[test]
    fn test_derived_options() {
        let config =
            BundleConfig::new("/tmp/app").with_flags(BundleFlags::JSX | BundleFlags::MINIFY);
        assert!(config.parser_options().jsx);
        assert!(config.codegen_options().minify);
        assert!(!config.codegen_options().source_map);
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = BundleConfig::new("/tmp/app")
            .with_flags(BundleFlags::MINIFY)
            .with_failure_policy(FailurePolicy::Continue);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"continue\""));
        let back: BundleConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.flags, BundleFlags::MINIFY);
        assert_eq!(back.failure_policy, FailurePolicy::Continue);
    }
}
