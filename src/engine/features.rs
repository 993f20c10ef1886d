//! Runtime feature toggles scripts can flip through `options(name)`

use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Set of enabled [`FeatureFlag`]s
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FeatureSet: u8 {
        const STRICT = 1 << 0;
        const WERROR = 1 << 1;
        const XML = 1 << 2;
    }
}

/// A feature toggle, addressed by scripts through its stable name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureFlag {
    /// Strict-mode semantics
    Strict,
    /// Warnings are reported as errors
    WError,
    /// E4X support; always on
    Xml,
}

impl FeatureFlag {
    /// Every flag, in declaration order
    pub const ALL: [FeatureFlag; 3] = [FeatureFlag::Strict, FeatureFlag::WError, FeatureFlag::Xml];

    /// Name used by `options()`
    pub fn name(self) -> &'static str {
        match self {
            FeatureFlag::Strict => "strict",
            FeatureFlag::WError => "werror",
            FeatureFlag::Xml => "xml",
        }
    }

    pub fn for_name(name: &str) -> Option<FeatureFlag> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    fn bit(self) -> FeatureSet {
        match self {
            FeatureFlag::Strict => FeatureSet::STRICT,
            FeatureFlag::WError => FeatureSet::WERROR,
            FeatureFlag::Xml => FeatureSet::XML,
        }
    }
}

/// Feature keys an engine asks about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineFeature {
    ReservedKeywordAsIdentifier,
    E4x,
    StrictVars,
    StrictEval,
    StrictMode,
    WarningAsError,
    /// Any key the harness has no opinion on
    Other(i32),
}

impl EngineFeature {
    /// Map an engine's numeric feature key
    pub fn from_code(code: i32) -> EngineFeature {
        match code {
            3 => EngineFeature::ReservedKeywordAsIdentifier,
            6 => EngineFeature::E4x,
            8 => EngineFeature::StrictVars,
            9 => EngineFeature::StrictEval,
            11 => EngineFeature::StrictMode,
            12 => EngineFeature::WarningAsError,
            other => EngineFeature::Other(other),
        }
    }
}

impl FeatureSet {
    /// Features enabled in a fresh environment
    pub fn initial() -> FeatureSet {
        FeatureSet::XML
    }

    pub fn has(self, flag: FeatureFlag) -> bool {
        self.contains(flag.bit())
    }

    /// Flip `flag`. `Xml` cannot be switched off; attempts return the set
    /// unchanged.
    pub fn toggled(self, flag: FeatureFlag) -> FeatureSet {
        if flag == FeatureFlag::Xml {
            return self;
        }
        self ^ flag.bit()
    }

    /// Answer an engine feature query; `None` leaves the decision to the
    /// engine's own default
    pub fn query(self, feature: EngineFeature) -> Option<bool> {
        match feature {
            EngineFeature::E4x => Some(self.has(FeatureFlag::Xml)),
            EngineFeature::StrictEval | EngineFeature::StrictMode | EngineFeature::StrictVars => {
                Some(self.has(FeatureFlag::Strict))
            }
            EngineFeature::ReservedKeywordAsIdentifier => Some(!self.has(FeatureFlag::Strict)),
            EngineFeature::WarningAsError => Some(self.has(FeatureFlag::WError)),
            EngineFeature::Other(_) => None,
        }
    }

    /// Enabled feature names joined with `,`
    pub fn names(self) -> String {
        FeatureFlag::ALL
            .into_iter()
            .filter(|f| self.has(*f))
            .map(FeatureFlag::name)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names())
    }
}
