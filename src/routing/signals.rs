//! Stateless signal estimators feeding the routing policies.
//!
//! Each estimator produces a score in [0, 1] where higher means "better suited
//! to the economy provider":
//!
//! - **capability**: static category table lookup on the command identifier
//! - **complexity**: argument count, input length and analysis-type intents
//! - **context**: size of the caller-supplied context payload
//! - **cost**: structural cost advantage of the economy provider

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::providers::Provider;
use crate::routing::ParsedCommand;

/// Category of a command in the capability table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandCategory {
    Basic,
    Code,
    File,
    Project,
    Git,
    Advanced,
    /// Commands known to work poorly on the economy provider.
    PremiumDependent,
    Unknown,
}

impl CommandCategory {
    /// Economy-provider capability score for this category.
    pub fn capability(self) -> f64 {
        match self {
            Self::Basic => 0.95,
            Self::Code => 0.90,
            Self::File | Self::Project | Self::Git => 0.85,
            Self::Advanced => 0.70,
            Self::PremiumDependent => 0.30,
            Self::Unknown => 0.50,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Code => "code",
            Self::File => "file",
            Self::Project => "project",
            Self::Git => "git",
            Self::Advanced => "advanced",
            Self::PremiumDependent => "premium_dependent",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for CommandCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CommandCategory {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "basic" => Ok(Self::Basic),
            "code" => Ok(Self::Code),
            "file" => Ok(Self::File),
            "project" => Ok(Self::Project),
            "git" => Ok(Self::Git),
            "advanced" => Ok(Self::Advanced),
            "premium_dependent" | "premium" => Ok(Self::PremiumDependent),
            _ => Err(ConfigError::InvalidValue {
                key: "capability.category".to_string(),
                message: format!(
                    "unknown category '{s}', expected one of: basic, code, file, project, git, advanced, premium_dependent"
                ),
            }),
        }
    }
}

const BASIC_COMMANDS: &[&str] = &[
    "/help", "/status", "/config", "/version", "/clear", "/history", "/models", "/model", "/tools",
    "/api", "/debug", "/export", "/import", "/memory", "/usage", "/cost", "/doctor", "/compact",
    "/theme", "/lang", "/reset", "/exit", "/quit",
];

const CODE_COMMANDS: &[&str] = &[
    "/review", "/analyze", "/refactor", "/optimize", "/test", "/debug", "/format", "/lint", "/docs",
];

const FILE_COMMANDS: &[&str] = &[
    "/read", "/write", "/edit", "/create", "/delete", "/list", "/find", "/grep", "/diff", "/merge",
];

const PROJECT_COMMANDS: &[&str] = &[
    "/init", "/build", "/run", "/deploy", "/package", "/install", "/update", "/clean", "/backup",
];

const GIT_COMMANDS: &[&str] = &[
    "/commit", "/push", "/pull", "/branch", "/merge", "/rebase", "/tag", "/log", "/diff", "/status",
];

const ADVANCED_COMMANDS: &[&str] = &[
    "/ai", "/generate", "/translate", "/summarize", "/explain", "/suggest", "/improve", "/convert",
];

const PREMIUM_DEPENDENT_COMMANDS: &[&str] = &[
    "/add-dir", "/remove-dir", "/list-dirs", "/chat", "/ask", "/context", "/session",
    "/workspace", "/legacy",
];

/// Immutable mapping from command category to the commands it contains.
///
/// Lookup order matters: a command listed in several categories takes the
/// first one (e.g. `/debug` is basic, not code). Exact matches win over
/// hyphenated family matches (`/review-pr` belongs to `/review`'s category).
#[derive(Debug, Clone)]
pub struct CapabilityTable {
    categories: Vec<(CommandCategory, Vec<String>)>,
}

impl Default for CapabilityTable {
    fn default() -> Self {
        let to_vec = |cmds: &[&str]| cmds.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        Self {
            categories: vec![
                (CommandCategory::Basic, to_vec(BASIC_COMMANDS)),
                (CommandCategory::Code, to_vec(CODE_COMMANDS)),
                (CommandCategory::File, to_vec(FILE_COMMANDS)),
                (CommandCategory::Project, to_vec(PROJECT_COMMANDS)),
                (CommandCategory::Git, to_vec(GIT_COMMANDS)),
                (CommandCategory::Advanced, to_vec(ADVANCED_COMMANDS)),
                (
                    CommandCategory::PremiumDependent,
                    to_vec(PREMIUM_DEPENDENT_COMMANDS),
                ),
            ],
        }
    }
}

impl CapabilityTable {
    /// Category of `command`, or [`CommandCategory::Unknown`].
    pub fn category_of(&self, command: &str) -> CommandCategory {
        let exact = self
            .categories
            .iter()
            .find(|(_, cmds)| cmds.iter().any(|c| c == command));
        if let Some((category, _)) = exact {
            return *category;
        }

        self.categories
            .iter()
            .find(|(_, cmds)| cmds.iter().any(|c| is_family_member(command, c)))
            .map(|(category, _)| *category)
            .unwrap_or(CommandCategory::Unknown)
    }

    /// Economy-provider capability score for `command`.
    pub fn score(&self, command: &str) -> f64 {
        self.category_of(command).capability()
    }

    /// Capability score on an arbitrary provider. Premium supports everything.
    pub fn score_for(&self, command: &str, provider: Provider) -> f64 {
        match provider {
            Provider::Economy => self.score(command),
            Provider::Premium => 1.0,
        }
    }

    /// A copy of this table with `commands` added to `category`.
    pub fn with_commands<I, S>(&self, category: CommandCategory, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = self.clone();
        let idx = match table.categories.iter().position(|(c, _)| *c == category) {
            Some(idx) => idx,
            None => {
                table.categories.push((category, Vec::new()));
                table.categories.len() - 1
            }
        };
        let entry = &mut table.categories[idx].1;
        for command in commands {
            let command = command.into();
            if !entry.contains(&command) {
                entry.push(command);
            }
        }
        table
    }

    /// Number of distinct commands the economy provider is rated for,
    /// excluding premium-dependent ones.
    pub fn command_count(&self) -> usize {
        let mut all: Vec<&str> = self
            .categories
            .iter()
            .filter(|(c, _)| *c != CommandCategory::PremiumDependent)
            .flat_map(|(_, cmds)| cmds.iter().map(String::as_str))
            .collect();
        all.sort_unstable();
        all.dedup();
        all.len()
    }

    pub fn premium_dependent_count(&self) -> usize {
        self.categories
            .iter()
            .filter(|(c, _)| *c == CommandCategory::PremiumDependent)
            .map(|(_, cmds)| cmds.len())
            .sum()
    }
}

fn is_family_member(command: &str, entry: &str) -> bool {
    command
        .strip_prefix(entry)
        .is_some_and(|rest| rest.starts_with('-') && rest.len() > 1)
}

/// Opaque caller context. Only its size is used, as a routing signal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingContext {
    /// Caller identity, if known. Never inspected by the router.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller: Option<String>,
    /// Arbitrary context payload.
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl RoutingContext {
    pub fn new(payload: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            caller: None,
            payload,
        }
    }

    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = Some(caller.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Serialized payload length in bytes.
    pub fn size(&self) -> usize {
        if self.payload.is_empty() {
            return 0;
        }
        serde_json::to_string(&self.payload)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

/// Tunable signal constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Constant cost-efficiency score of the economy provider.
    pub cost_efficiency: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            cost_efficiency: 0.95,
        }
    }
}

impl SignalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.cost_efficiency) {
            return Err(ConfigError::InvalidValue {
                key: "signal.cost_efficiency".to_string(),
                message: format!("must be within [0, 1], got {}", self.cost_efficiency),
            });
        }
        Ok(())
    }
}

// One pattern per analysis-type intent, matched anywhere in the input; each
// matching intent adds to complexity.
static COMPLEX_INTENTS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)analy[sz]",
        r"(?i)generat",
        r"(?i)translat",
        r"(?i)summari[sz]",
        r"(?i)explain",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static intent pattern"))
    .collect()
});

/// Bundles the estimators with the table and constants they read.
#[derive(Debug, Clone, Default)]
pub struct SignalEstimators {
    capabilities: Arc<CapabilityTable>,
    config: SignalConfig,
}

impl SignalEstimators {
    pub fn new(capabilities: Arc<CapabilityTable>, config: SignalConfig) -> Self {
        Self {
            capabilities,
            config,
        }
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    pub fn capability(&self, command_id: &str) -> f64 {
        self.capabilities.score(command_id)
    }

    pub fn complexity(&self, command: &ParsedCommand) -> f64 {
        complexity_score(command)
    }

    pub fn context(&self, context: Option<&RoutingContext>) -> f64 {
        context_score(context)
    }

    pub fn cost(&self) -> f64 {
        self.config.cost_efficiency
    }
}

/// Complexity in [0, 1]; higher means harder for the economy provider.
pub fn complexity_score(command: &ParsedCommand) -> f64 {
    let arg_complexity = (command.token_count() as f64 / 10.0).min(1.0);
    let length_complexity = (command.raw.chars().count() as f64 / 200.0).min(1.0);
    let intents = COMPLEX_INTENTS
        .iter()
        .filter(|re| re.is_match(&command.raw))
        .count();
    let keyword_complexity = 0.2 * intents as f64;

    (arg_complexity + length_complexity + keyword_complexity).min(1.0)
}

/// Context suitability in [0, 1]; large payloads favor the premium provider.
pub fn context_score(context: Option<&RoutingContext>) -> f64 {
    let Some(context) = context.filter(|c| !c.is_empty()) else {
        return 0.8;
    };
    match context.size() {
        0..500 => 0.9,
        500..=1000 => 0.6,
        _ => 0.4,
    }
}
