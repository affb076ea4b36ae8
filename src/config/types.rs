//! Configuration Types
//!
//! All configuration structures with defaults that describe a working setup
//! against a local Ollama host. Every section is read-only once loaded; the
//! same immutable [`Config`] is handed to every component constructor.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::ai::validation::Signal;
use crate::constants::{layout, network, ranking, retry};
use crate::router::{Classifier, DecodingOptions, ModelRegistry};
use crate::types::{ErrorCategory, EscalatorError, Result, TaskFamily};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Inference gateway settings (endpoint, timeout, retry policy)
    pub gateway: GatewayConfig,

    /// Classification rules, escalation chains and escalation signals
    pub routing: RoutingConfig,

    /// Model table and aliases
    pub models: ModelsConfig,

    /// Decoding defaults, named profiles and per-task overrides
    pub decoding: DecodingConfig,

    /// Candidate generation settings
    pub ranking: RankingConfig,

    /// Schema, prompt and run-log locations
    pub paths: PathsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            gateway: GatewayConfig::default(),
            routing: RoutingConfig::default(),
            models: ModelsConfig::default(),
            decoding: DecodingConfig::default(),
            ranking: RankingConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns a configuration error on the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.timeout_secs == 0 {
            return Err(EscalatorError::Config(
                "gateway.timeout_secs must be greater than 0".to_string(),
            ));
        }

        for (key, secs) in [
            ("gateway.backoff_secs", self.gateway.backoff_secs),
            ("gateway.backoff_cap_secs", self.gateway.backoff_cap_secs),
        ] {
            if !secs.is_finite() || secs <= 0.0 || secs > retry::MAX_CONFIGURED_DELAY_SECS {
                return Err(EscalatorError::Config(format!(
                    "{} must be greater than 0 and at most {}, got {}",
                    key,
                    retry::MAX_CONFIGURED_DELAY_SECS,
                    secs
                )));
            }
        }

        if self.gateway.backoff_cap_secs < self.gateway.backoff_secs {
            return Err(EscalatorError::Config(format!(
                "gateway.backoff_cap_secs ({}) must not be below gateway.backoff_secs ({})",
                self.gateway.backoff_cap_secs, self.gateway.backoff_secs
            )));
        }

        if !(1..=ranking::MAX_CANDIDATES).contains(&self.ranking.candidates) {
            return Err(EscalatorError::Config(format!(
                "ranking.candidates must be between 1 and {}, got {}",
                ranking::MAX_CANDIDATES,
                self.ranking.candidates
            )));
        }

        self.decoding.validate()?;

        // Rules must compile
        Classifier::from_config(&self.routing)?;

        // Every route must resolve to registered models
        let registry = ModelRegistry::new(&self.models);
        for (family, route) in &self.routing.task_map {
            if route.chain.is_empty() {
                return Err(EscalatorError::Config(format!(
                    "routing.task_map.{}.chain must name at least one model",
                    family
                )));
            }
            registry.resolve(&route.initial)?;
            for model in &route.chain {
                registry.resolve(model)?;
            }
        }

        Ok(())
    }
}

// =============================================================================
// Gateway Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Backend endpoint
    pub base_url: String,

    /// Per-call timeout in seconds
    pub timeout_secs: u64,

    /// Additional attempts after the first failed call
    pub retries: u32,

    /// Base delay of the exponential backoff, in seconds
    pub backoff_secs: f64,

    /// Cap on a single backoff delay before jitter, in seconds
    pub backoff_cap_secs: f64,

    /// Failure categories that may be retried. Empty disables retries.
    pub retry_on: Vec<ErrorCategory>,

    /// Log full prompt bodies at debug level
    pub log_prompts: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: network::DEFAULT_OLLAMA_BASE.to_string(),
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
            retries: retry::DEFAULT_RETRIES,
            backoff_secs: retry::BASE_DELAY_SECS,
            backoff_cap_secs: retry::MAX_DELAY_SECS,
            retry_on: vec![ErrorCategory::Network, ErrorCategory::Timeout],
            log_prompts: false,
        }
    }
}

// =============================================================================
// Routing Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Family returned when no rule matches
    pub default_family: TaskFamily,

    /// Ordered classifier rules; the first matching rule wins
    pub rules: Vec<ClassifierRuleConfig>,

    /// Signals that force escalation even when the output validated
    pub escalate_on: Vec<Signal>,

    /// Starting model and escalation chain per task family
    pub task_map: BTreeMap<String, RouteConfig>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        let rule = |family: &str, patterns: &[&str]| ClassifierRuleConfig {
            family: TaskFamily::new(family),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        };

        let route = |initial: &str, chain: &[&str]| RouteConfig {
            initial: initial.to_string(),
            chain: chain.iter().map(|m| m.to_string()).collect(),
        };

        let mut task_map = BTreeMap::new();
        for family in TaskFamily::BUILTIN {
            let entry = if family == TaskFamily::CREATIVE {
                route("medium", &["medium", "large"])
            } else {
                route("small", &["small", "medium", "large"])
            };
            task_map.insert(family.to_string(), entry);
        }

        Self {
            default_family: TaskFamily::new(TaskFamily::ANALYTICAL),
            rules: vec![
                rule(
                    TaskFamily::BUG_TRIAGE,
                    &["bug", "stack trace", "traceback", "exception"],
                ),
                rule(
                    TaskFamily::CODE_ASSIST,
                    &["diff", "implement", "code", "function", "class "],
                ),
                rule(
                    TaskFamily::DESIGN_RFC,
                    &["design", "rfc", "architecture", "trade-off", "tradeoff"],
                ),
                rule(
                    TaskFamily::EXTRACTION,
                    &["extract", "fields", "json only", "key:"],
                ),
                rule(TaskFamily::CREATIVE, &["story", "blog", "creative"]),
            ],
            escalate_on: vec![Signal::RefusalDetected],
            task_map,
        }
    }
}

/// One classifier rule: any pattern matching selects `family`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierRuleConfig {
    pub family: TaskFamily,
    /// Regular expressions, matched case-insensitively
    pub patterns: Vec<String>,
}

/// Route for one task family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Model key (or alias) used when the caller asks for `auto`
    pub initial: String,
    /// Model keys from weakest to strongest
    pub chain: Vec<String>,
}

// =============================================================================
// Model Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Registered models by key
    pub models: BTreeMap<String, ModelConfig>,
    /// Alternate names resolving to a model key
    pub aliases: BTreeMap<String, String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        let model = |backend_name: &str, context_max: u32| ModelConfig {
            backend_name: backend_name.to_string(),
            context_max,
            family: "qwen".to_string(),
        };

        let mut models = BTreeMap::new();
        models.insert("small".to_string(), model("qwen2.5:3b-instruct", 32_768));
        models.insert("medium".to_string(), model("qwen2.5:14b-instruct", 32_768));
        models.insert("large".to_string(), model("qwen2.5:32b-instruct", 32_768));

        let mut aliases = BTreeMap::new();
        aliases.insert("fast".to_string(), "small".to_string());
        aliases.insert("strong".to_string(), "large".to_string());

        Self { models, aliases }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Name the backend knows the model by
    pub backend_name: String,
    /// Context window in tokens
    pub context_max: u32,
    /// Model family, informational
    pub family: String,
}

// =============================================================================
// Decoding Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodingConfig {
    /// Base layer applied to every task family
    pub defaults: DecodingOptions,
    /// Named parameter sets
    pub profiles: BTreeMap<String, DecodingOptions>,
    /// Profile selection and scalar overrides per task family
    pub per_task: BTreeMap<String, TaskDecoding>,
}

impl Default for DecodingConfig {
    fn default() -> Self {
        let opts = |temperature: f32, top_p: f32, max_new_tokens: Option<u32>| DecodingOptions {
            temperature: Some(temperature),
            top_p: Some(top_p),
            max_new_tokens,
            ..Default::default()
        };
        let task = |profile: &str| TaskDecoding {
            profile: Some(profile.to_string()),
            ..Default::default()
        };

        let mut profiles = BTreeMap::new();
        profiles.insert("deterministic".to_string(), opts(0.0, 1.0, None));
        profiles.insert("balanced".to_string(), opts(0.3, 0.9, None));
        profiles.insert("creative".to_string(), opts(0.8, 0.95, Some(2048)));

        let mut per_task = BTreeMap::new();
        per_task.insert(TaskFamily::BUG_TRIAGE.to_string(), task("deterministic"));
        per_task.insert(
            TaskFamily::CODE_ASSIST.to_string(),
            TaskDecoding {
                max_new_tokens: Some(2048),
                ..task("deterministic")
            },
        );
        per_task.insert(TaskFamily::DESIGN_RFC.to_string(), task("balanced"));
        per_task.insert(TaskFamily::EXTRACTION.to_string(), task("deterministic"));
        per_task.insert(TaskFamily::CREATIVE.to_string(), task("creative"));
        per_task.insert(TaskFamily::ANALYTICAL.to_string(), task("balanced"));

        Self {
            defaults: opts(0.2, 0.9, Some(1024)),
            profiles,
            per_task,
        }
    }
}

impl DecodingConfig {
    fn validate(&self) -> Result<()> {
        let layers = std::iter::once(("decoding.defaults".to_string(), &self.defaults)).chain(
            self.profiles
                .iter()
                .map(|(name, p)| (format!("decoding.profiles.{}", name), p)),
        );
        for (location, options) in layers {
            check_ranges(&location, options.temperature, options.top_p)?;
        }
        for (family, node) in &self.per_task {
            check_ranges(
                &format!("decoding.per_task.{}", family),
                node.temperature,
                node.top_p,
            )?;
        }
        Ok(())
    }
}

fn check_ranges(location: &str, temperature: Option<f32>, top_p: Option<f32>) -> Result<()> {
    if let Some(t) = temperature
        && !(0.0..=2.0).contains(&t)
    {
        return Err(EscalatorError::Config(format!(
            "{}.temperature must be between 0.0 and 2.0, got {}",
            location, t
        )));
    }
    if let Some(p) = top_p
        && !(0.0..=1.0).contains(&p)
    {
        return Err(EscalatorError::Config(format!(
            "{}.top_p must be between 0.0 and 1.0, got {}",
            location, p
        )));
    }
    Ok(())
}

/// Per-family decoding entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskDecoding {
    /// Name of a profile in `decoding.profiles`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_new_tokens: Option<u32>,
}

// =============================================================================
// Ranking Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Prompt variants generated per escalation step
    pub candidates: usize,
    /// Generate the variants of one step concurrently
    pub parallel: bool,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            candidates: ranking::DEFAULT_CANDIDATES,
            parallel: false,
        }
    }
}

// =============================================================================
// Paths Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding `<family>.schema.json` files
    pub schema_dir: PathBuf,
    /// Directory holding `<family>_v1.yml` prompt templates
    pub prompt_dir: PathBuf,
    /// Root of the run log
    pub run_dir: PathBuf,
    /// Golden task set for offline evaluation
    pub golden_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let root = PathBuf::from(layout::PROJECT_DIR);
        Self {
            schema_dir: root.join("schemas"),
            prompt_dir: root.join("prompts"),
            run_dir: root.join("runs"),
            golden_file: root.join("golden").join("tasks.jsonl"),
        }
    }
}
