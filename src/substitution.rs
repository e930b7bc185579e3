//! Replacing leaf nodes while a tree is built, to test a tree without the
//! real actions behind it.
//!
//! A rule maps a glob pattern to a [`Substitute`]. The pattern is matched
//! against the instance name and the full path of every leaf node; the first
//! matching rule wins and the real constructor of the node is never called.
//!
//! Rules can be read from a file:
//!
//! ```json
//! {
//!     "TestNodeConfigs": {
//!         "QuickSuccess": { "return_status": "SUCCESS", "async_ticks": 2 }
//!     },
//!     "SubstitutionRules": {
//!         "PickLock": "QuickSuccess",
//!         "DoorClosed/Smash*": "AlwaysFailure"
//!     }
//! }
//! ```
//!
//! The target of a rule is either a test node config or a registered node
//! kind.

use std::{collections::HashMap, fmt, time::Duration};

use globset::{GlobBuilder, GlobMatcher};
use serde::{
    de::{MapAccess, Visitor},
    Deserialize, Deserializer,
};

use crate::{
    error::{ScriptError, SubstitutionError},
    script::{Script, ScriptEnums},
    BehaviorCallback, BehaviorResult, Context, StatefulAction, TickResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum MockStatus {
    #[default]
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILURE")]
    Failure,
}

/// Behavior of a mock node.
///
/// With `async_ticks` the mock is `Running` for that many ticks after the one
/// it started on. Otherwise with `async_delay` it is `Running` until that many
/// milliseconds of the tree clock have passed. Without either it completes on
/// the first tick.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    pub return_status: MockStatus,
    pub async_delay: u64,
    pub async_ticks: u32,
    /// Run when the mock completes with `SUCCESS`
    pub success_script: Option<String>,
    /// Run when the mock completes with `FAILURE`
    pub failure_script: Option<String>,
    /// Run after either of the above
    pub post_script: Option<String>,
}

impl MockConfig {
    pub fn returning(return_status: MockStatus) -> Self {
        Self {
            return_status,
            ..Self::default()
        }
    }

    pub fn with_async_ticks(mut self, ticks: u32) -> Self {
        self.async_ticks = ticks;
        self
    }

    pub fn with_async_delay(mut self, msec: u64) -> Self {
        self.async_delay = msec;
        self
    }

    pub fn with_post_script(mut self, script: impl Into<String>) -> Self {
        self.post_script = Some(script.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Substitute {
    /// Build a node of another registered kind instead
    NodeKind(String),
    Mock(MockConfig),
}

#[derive(Clone)]
struct Rule {
    pattern: String,
    matcher: GlobMatcher,
    substitute: Substitute,
}

/// Ordered list of substitution rules.
#[derive(Clone, Default)]
pub struct SubstitutionRules {
    rules: Vec<Rule>,
}

impl SubstitutionRules {
    pub fn add(&mut self, pattern: &str, substitute: Substitute) -> Result<(), SubstitutionError> {
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(false)
            .build()
            .map_err(|err| SubstitutionError::Pattern {
                pattern: pattern.to_owned(),
                message: err.to_string(),
            })?
            .compile_matcher();
        self.rules.push(Rule {
            pattern: pattern.to_owned(),
            matcher,
            substitute,
        });
        Ok(())
    }

    /// The first rule matching either the instance name or the full path of
    /// a node, with its pattern.
    pub fn find(&self, name: &str, path: &str) -> Option<(&str, &Substitute)> {
        self.rules
            .iter()
            .find(|rule| rule.matcher.is_match(name) || rule.matcher.is_match(path))
            .map(|rule| (rule.pattern.as_str(), &rule.substitute))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }
}

/// Layout of a substitution rules file.
#[derive(Deserialize)]
pub(crate) struct RuleFile {
    #[serde(rename = "TestNodeConfigs", default)]
    configs: HashMap<String, MockConfig>,
    #[serde(rename = "SubstitutionRules", default, deserialize_with = "ordered_entries")]
    rules: Vec<(String, String)>,
}

/// Keeps the entries of a map in document order, which is the order rules
/// are tried in.
fn ordered_entries<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<(String, String)>, D::Error> {
    struct EntriesVisitor;

    impl<'de> Visitor<'de> for EntriesVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map from patterns to node names")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = vec![];
            while let Some(entry) = map.next_entry::<String, String>()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(EntriesVisitor)
}

impl RuleFile {
    pub(crate) fn from_json(text: &str) -> Result<Self, SubstitutionError> {
        Ok(serde_json::from_str(text)?)
    }

    pub(crate) fn from_yaml(text: &str) -> Result<Self, SubstitutionError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Resolves the target of every rule to a test node config or to a node
    /// kind accepted by `is_kind`.
    pub(crate) fn resolve(
        self,
        is_kind: impl Fn(&str) -> bool,
    ) -> Result<Vec<(String, Substitute)>, SubstitutionError> {
        let configs = self.configs;
        self.rules
            .into_iter()
            .map(|(pattern, target)| {
                let substitute = match (configs.get(&target), is_kind(&target)) {
                    (Some(_), true) => return Err(SubstitutionError::Ambiguous(target)),
                    (Some(config), false) => Substitute::Mock(config.clone()),
                    (None, true) => Substitute::NodeKind(target),
                    (None, false) => return Err(SubstitutionError::UnknownReplacement(target)),
                };
                Ok((pattern, substitute))
            })
            .collect()
    }
}

/// The node built from a [`MockConfig`].
pub struct TestNode {
    config: MockConfig,
    success_script: Option<Script>,
    failure_script: Option<Script>,
    post_script: Option<Script>,
    ticks: u32,
    deadline: Duration,
}

impl TestNode {
    pub fn new(config: &MockConfig, enums: &ScriptEnums) -> Result<Self, ScriptError> {
        let parse = |code: &Option<String>| {
            code.as_deref()
                .map(|code| Script::parse(code, enums))
                .transpose()
        };
        Ok(Self {
            success_script: parse(&config.success_script)?,
            failure_script: parse(&config.failure_script)?,
            post_script: parse(&config.post_script)?,
            config: config.clone(),
            ticks: 0,
            deadline: Duration::ZERO,
        })
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    fn complete(&self, ctx: &mut Context) -> TickResult {
        let (result, script) = match self.config.return_status {
            MockStatus::Success => (BehaviorResult::Success, &self.success_script),
            MockStatus::Failure => (BehaviorResult::Fail, &self.failure_script),
        };
        for script in [script, &self.post_script].into_iter().flatten() {
            script.eval(ctx.blackboard())?;
        }
        Ok(result)
    }
}

impl StatefulAction for TestNode {
    fn on_start(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        self.ticks = 0;
        if self.config.async_ticks > 0 {
            return Ok(BehaviorResult::Running);
        }
        if self.config.async_delay > 0 {
            self.deadline = ctx.now() + Duration::from_millis(self.config.async_delay);
            return Ok(BehaviorResult::Running);
        }
        self.complete(ctx)
    }

    fn on_running(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let done = if self.config.async_ticks > 0 {
            self.ticks += 1;
            self.ticks >= self.config.async_ticks
        } else {
            ctx.now() >= self.deadline
        };
        if done {
            self.complete(ctx)
        } else {
            Ok(BehaviorResult::Running)
        }
    }
}

#[cfg(test)]
mod test;
