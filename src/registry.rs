use std::{
    collections::{BTreeSet, HashMap},
    rc::Rc,
};

use tracing::debug;

use crate::{
    error::{LoadError, SubstitutionError},
    nodes::{
        AlwaysFailureNode, AlwaysSuccessNode, FallbackNode, ForceFailureNode, ForceSuccessNode,
        IfNode, InverterNode, IsTrueNode, KeepRunningUntilFailureNode, ParallelNode,
        ReactiveFallbackNode, ReactiveSequenceNode, RepeatNode, RetryNode, ScriptConditionNode,
        ScriptNode, SequenceNode, SequenceWithMemoryNode, SetBoolNode, SimpleActionNode,
        SimpleConditionNode, SleepNode, TimeoutNode,
    },
    parser::{load_tree, parse_file, TreeSource},
    script::ScriptEnums,
    substitution::{RuleFile, Substitute, SubstitutionRules},
    BehaviorCallback, BehaviorNode, Clock, Context, Converters, PortSpec, PortValue, SystemClock,
    TickEnv, TickResult, Tree,
};

pub trait Constructor: Fn() -> Box<dyn BehaviorNode> {}

impl<F: Fn() -> Box<dyn BehaviorNode>> Constructor for F {}

pub fn boxify<T>(cons: impl (Fn() -> T) + 'static) -> Box<dyn Fn() -> Box<dyn BehaviorNode>>
where
    T: BehaviorNode + 'static,
{
    Box::new(move || Box::new(cons()))
}

/// Everything a tree is built from: node kinds, tree definitions, type
/// converters, scripting enums, substitution rules and the clock.
pub struct Registry {
    node_types: HashMap<String, Box<dyn Fn() -> Box<dyn BehaviorNode>>>,
    /// Sources given to `register_tree_from_text`, parsed again by `create_tree`
    tree_texts: Vec<String>,
    tree_ids: BTreeSet<String>,
    pub(crate) converters: Converters,
    pub(crate) enums: ScriptEnums,
    pub(crate) substitutions: SubstitutionRules,
    clock: Rc<dyn Clock>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut ret = Self {
            node_types: HashMap::new(),
            tree_texts: vec![],
            tree_ids: BTreeSet::new(),
            converters: Converters::default(),
            enums: ScriptEnums::default(),
            substitutions: SubstitutionRules::default(),
            clock: Rc::new(SystemClock::default()),
        };
        ret.register("Sequence", boxify(SequenceNode::default));
        ret.register("SequenceWithMemory", boxify(SequenceWithMemoryNode::default));
        ret.register("ReactiveSequence", boxify(|| ReactiveSequenceNode));
        ret.register("Fallback", boxify(FallbackNode::default));
        ret.register("ReactiveFallback", boxify(|| ReactiveFallbackNode));
        ret.register("Parallel", boxify(|| ParallelNode));
        ret.register("ForceSuccess", boxify(|| ForceSuccessNode));
        ret.register("ForceFailure", boxify(|| ForceFailureNode));
        ret.register("Inverter", boxify(|| InverterNode));
        ret.register("Repeat", boxify(RepeatNode::default));
        ret.register("Retry", boxify(RetryNode::default));
        ret.register(
            "RetryUntilSuccessful",
            boxify(|| RetryNode::with_port("num_attempts")),
        );
        ret.register("Timeout", boxify(TimeoutNode::default));
        ret.register("KeepRunningUntilFailure", boxify(|| KeepRunningUntilFailureNode));
        ret.register("IsTrue", boxify(|| IsTrueNode));
        ret.register("if", boxify(IfNode::default));
        ret.register("SetBool", boxify(|| SetBoolNode));
        ret.register("AlwaysSuccess", boxify(|| AlwaysSuccessNode));
        ret.register("AlwaysFailure", boxify(|| AlwaysFailureNode));
        ret.register("Script", boxify(ScriptNode::default));
        ret.register("ScriptCondition", boxify(ScriptConditionNode::default));
        ret.register("Sleep", boxify(SleepNode::default));
        ret
    }
}

impl Registry {
    pub fn register(
        &mut self,
        type_name: impl ToString,
        constructor: Box<dyn Fn() -> Box<dyn BehaviorNode>>,
    ) {
        self.node_types.insert(type_name.to_string(), constructor);
    }

    pub fn build(&self, type_name: &str) -> Option<Box<dyn BehaviorNode>> {
        self.node_types
            .get(type_name)
            .map(|constructor| constructor())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.node_types.contains_key(type_name)
    }

    /// Registers an action defined by a closure.
    pub fn register_simple_action(
        &mut self,
        type_name: impl ToString,
        ports: Vec<PortSpec>,
        f: impl Fn(BehaviorCallback, &mut Context) -> TickResult + 'static,
    ) {
        let f: Rc<dyn Fn(BehaviorCallback, &mut Context) -> TickResult> = Rc::new(f);
        self.register(
            type_name,
            Box::new(move || Box::new(SimpleActionNode::from_shared(ports.clone(), f.clone()))),
        );
    }

    /// Registers a condition defined by a closure.
    pub fn register_simple_condition(
        &mut self,
        type_name: impl ToString,
        ports: Vec<PortSpec>,
        f: impl Fn(BehaviorCallback, &mut Context) -> TickResult + 'static,
    ) {
        let f: Rc<dyn Fn(BehaviorCallback, &mut Context) -> TickResult> = Rc::new(f);
        self.register(
            type_name,
            Box::new(move || Box::new(SimpleConditionNode::from_shared(ports.clone(), f.clone()))),
        );
    }

    /// Registers the parser of a user type for literals, string blackboard
    /// entries and subtree port declarations (`in pose: Pose2D`).
    pub fn register_converter<T: PortValue>(
        &mut self,
        type_name: &str,
        parse: impl Fn(&str) -> Result<T, String> + 'static,
    ) {
        self.converters.register(type_name, parse);
    }

    pub fn converters(&self) -> &Converters {
        &self.converters
    }

    pub fn register_enum(&mut self, name: impl Into<String>, value: i64) {
        self.enums.register(name, value);
    }

    pub fn register_enums<S: Into<String>>(&mut self, values: impl IntoIterator<Item = (S, i64)>) {
        for (name, value) in values {
            self.enums.register(name, value);
        }
    }

    pub fn add_substitution_rule(
        &mut self,
        pattern: &str,
        substitute: Substitute,
    ) -> Result<(), SubstitutionError> {
        self.substitutions.add(pattern, substitute)
    }

    pub fn clear_substitution_rules(&mut self) {
        self.substitutions.clear();
    }

    pub fn substitution_rules(&self) -> &SubstitutionRules {
        &self.substitutions
    }

    /// Adds the rules of a JSON rules file, see [`crate::substitution`].
    /// No rule is added if any of them is invalid.
    pub fn load_substitution_rules_json(&mut self, text: &str) -> Result<(), SubstitutionError> {
        self.add_rule_file(RuleFile::from_json(text)?)
    }

    /// Same as [`Self::load_substitution_rules_json`], for YAML.
    pub fn load_substitution_rules_yaml(&mut self, text: &str) -> Result<(), SubstitutionError> {
        self.add_rule_file(RuleFile::from_yaml(text)?)
    }

    fn add_rule_file(&mut self, file: RuleFile) -> Result<(), SubstitutionError> {
        let rules = file.resolve(|name| self.contains(name))?;
        let mut substitutions = self.substitutions.clone();
        for (pattern, substitute) in rules {
            substitutions.add(&pattern, substitute)?;
        }
        debug!("{} substitution rules", substitutions.len());
        self.substitutions = substitutions;
        Ok(())
    }

    pub fn set_clock(&mut self, clock: impl Clock + 'static) {
        self.clock = Rc::new(clock);
    }

    /// A fresh environment for a tree built from this registry.
    pub fn tick_env(&self) -> TickEnv {
        TickEnv::new(self.converters.clone(), self.enums.clone(), self.clock.clone())
    }

    /// Registers every tree defined in `text`, to be built later with
    /// [`Self::create_tree`] or referenced as a subtree by other sources.
    ///
    /// Nothing is registered if `text` does not parse or defines a tree that
    /// is already registered.
    pub fn register_tree_from_text(&mut self, text: impl Into<String>) -> Result<(), LoadError> {
        let text = text.into();
        let source = parse_source(&text)?;
        if let Some(duplicate) = source.duplicate_tree() {
            return Err(LoadError::DuplicateTree(duplicate.to_owned()));
        }
        if let Some(tree) = source
            .tree_defs
            .iter()
            .find(|tree| self.tree_ids.contains(tree.name))
        {
            return Err(LoadError::DuplicateTree(tree.name.to_owned()));
        }
        let names: Vec<_> = source.tree_defs.iter().map(|tree| tree.name.to_owned()).collect();
        debug!("registered trees {names:?}");
        self.tree_ids.extend(names);
        self.tree_texts.push(text);
        Ok(())
    }

    /// Names of the registered trees, sorted.
    pub fn registered_trees(&self) -> impl Iterator<Item = &str> + '_ {
        self.tree_ids.iter().map(String::as_str)
    }

    pub fn clear_registered_trees(&mut self) {
        self.tree_texts.clear();
        self.tree_ids.clear();
    }

    /// Builds the registered tree named `name`.
    pub fn create_tree(&self, name: &str) -> Result<Tree, LoadError> {
        let source = self.registered_source()?;
        load_tree(&source, self, name, true)
    }

    /// Parses `text` and builds the tree named `name`. Trees of `text` may use
    /// registered trees as subtrees, but not redefine them.
    pub fn create_tree_from_text(&self, text: &str, name: &str) -> Result<Tree, LoadError> {
        let mut source = self.registered_source()?;
        source.tree_defs.extend(parse_source(text)?.tree_defs);
        load_tree(&source, self, name, true)
    }

    fn registered_source(&self) -> Result<TreeSource<'_>, LoadError> {
        let mut tree_defs = vec![];
        for text in &self.tree_texts {
            tree_defs.extend(parse_source(text)?.tree_defs);
        }
        Ok(TreeSource { tree_defs })
    }
}

/// Parses a whole tree source, rejecting anything left unparsed.
fn parse_source(text: &str) -> Result<TreeSource<'_>, LoadError> {
    let (rest, source) = parse_file(text).map_err(|err| LoadError::Parse(err.to_string()))?;
    if !rest.is_empty() {
        let line = text[..text.len() - rest.len()].matches('\n').count() + 1;
        return Err(LoadError::Parse(format!(
            "unexpected input at line {line}: {:?}",
            rest.lines().next().unwrap_or_default()
        )));
    }
    Ok(source)
}
