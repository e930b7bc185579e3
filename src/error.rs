use thiserror::Error;

/// Failure to turn text into a typed value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("no converter registered for type {type_name} (text {text:?})")]
    Unregistered { type_name: String, text: String },
    #[error("cannot convert {text:?} to {type_name}: {reason}")]
    Invalid {
        type_name: String,
        text: String,
        reason: String,
    },
}

/// Errors raised while reading or writing ports and blackboard entries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PortError {
    #[error("blackboard key {0:?} not found")]
    NotFound(String),
    #[error("type mismatch on {key:?}: bound to {expected}, got {found}")]
    TypeMismatch {
        key: String,
        expected: String,
        found: String,
    },
    #[error("port {0:?} is bound to a literal and cannot be written")]
    WriteToLiteral(String),
    #[error("port {0:?} is an input port and cannot be written")]
    WriteToInput(String),
    #[error("port {0:?} is an output port and cannot be read")]
    ReadFromOutput(String),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl PortError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Errors from parsing or evaluating a script.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScriptError {
    #[error("cannot parse script {script:?}: {message}")]
    Parse { script: String, message: String },
    #[error("unknown identifier {0:?}")]
    UnknownIdentifier(String),
    #[error("operator {op} is not applicable to {lhs} and {rhs}")]
    TypeMismatch {
        op: &'static str,
        lhs: String,
        rhs: String,
    },
    #[error("expected a boolean, got {0}")]
    NotBoolean(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("{0:?} is a scripting enum and cannot be assigned")]
    AssignToEnum(String),
    #[error("{0:?} must be created with := before it can be assigned")]
    AssignToMissing(String),
    #[error(transparent)]
    Port(#[from] PortError),
}

/// Cause attached to a tick that ended in failure because of an error rather
/// than a regular `Fail` result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TickError {
    #[error(transparent)]
    Port(#[from] PortError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error("condition node {0:?} returned Running")]
    ConditionRunning(String),
    #[error("{0}")]
    Node(String),
}

impl From<ConversionError> for TickError {
    fn from(err: ConversionError) -> Self {
        Self::Port(PortError::Conversion(err))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AddChildError {
    #[error("Attempted to add too many nodes")]
    TooManyNodes,
}

pub type AddChildResult = Result<(), AddChildError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubstitutionError {
    #[error("invalid substitution pattern {pattern:?}: {message}")]
    Pattern { pattern: String, message: String },
    #[error("substitution target {0:?} is neither a test node config nor a registered node kind")]
    UnknownReplacement(String),
    #[error("substitution target {0:?} is both a test node config and a registered node kind")]
    Ambiguous(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("cannot parse tree source: {0}")]
    Parse(String),
    #[error("The tree {0:?} does not exist")]
    MissingTree(String),
    #[error("The tree {0:?} is defined more than once")]
    DuplicateTree(String),
    #[error("Node type or subtree name not found {0:?}")]
    MissingNode(String),
    #[error("{0} to {1}")]
    AddChildError(AddChildError, String),
    #[error("node {node} requires {expected} children, got {got}")]
    ChildCount {
        node: String,
        expected: &'static str,
        got: usize,
    },
    #[error("port {port} is not provided by node {node}")]
    PortUnmatch { node: String, port: String },
    #[error("port direction of {port} in node {node} does not match its declaration")]
    PortIOUnmatch { node: String, port: String },
    #[error("mandatory input port {port} of node {node} is not mapped")]
    MissingPort { node: String, port: String },
    #[error("blackboard key {key:?} is bound to {first} and {second}")]
    PortTypeConflict {
        key: String,
        first: String,
        second: String,
    },
    #[error("unknown port type {ty:?} in tree {tree}")]
    UnknownPortType { tree: String, ty: String },
    #[error("unknown attribute {attribute} on node {node}")]
    UnknownAttribute { node: String, attribute: String },
    #[error("invalid literal for port {port} of node {node}: {source}")]
    Conversion {
        node: String,
        port: String,
        source: ConversionError,
    },
    #[error("script in node {node}: {source}")]
    Script { node: String, source: ScriptError },
    #[error("Infinite recursion detected in subtree {node}")]
    InfiniteRecursion { node: String },
    #[error(transparent)]
    Substitution(#[from] SubstitutionError),
}
