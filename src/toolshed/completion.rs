//! Auto-complete requests left behind by the parser
//!
//! The parser only records *what* could come next. Turning that into a list of
//! options happens in [`CompletionRequest::resolve`], when someone asks.

use nucleo_matcher::pattern::{AtomKind, CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Matcher, Utf32Str};
use serde::Serialize;

use super::command::{ArgKind, ArgSpec, BlockInput, Toolshed};
use super::value::ValueType;

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionRequest {
    /// Commands that take the piped type
    Commands {
        piped: Option<ValueType>,
        partial: String,
    },
    Subcommands {
        command: String,
        piped: Option<ValueType>,
        partial: String,
    },
    /// A value argument; `options` are concrete suggestions known while parsing
    Argument { hint: String, options: Vec<String> },
    /// A block argument: an opening brace or a command taking `piped`
    Block {
        hint: String,
        piped: Option<ValueType>,
    },
    Types {
        partial: String,
    },
    Variables {
        partial: String,
        candidates: Vec<String>,
    },
}

impl CompletionRequest {
    /// Request for the argument described by `spec`, given the command's piped
    /// type and the known variables
    pub fn for_argument<'v>(
        spec: &ArgSpec,
        piped: Option<&ValueType>,
        variables: impl Iterator<Item = (&'v str, &'v ValueType)>,
    ) -> Self {
        let mut options = Vec::new();
        match &spec.kind {
            ArgKind::Value(ty) => {
                if *ty == ValueType::Bool {
                    options.extend(["false".to_string(), "true".to_string()]);
                }
                options.extend(
                    variables
                        .filter(|(_, t)| t.is_assignable_to(ty))
                        .map(|(name, _)| format!("${}", name)),
                );
            }
            ArgKind::Variable => {
                options.extend(variables.map(|(name, _)| format!("${}", name)));
            }
            ArgKind::Assign => {}
            ArgKind::Block { input, .. } => {
                let piped = match input {
                    BlockInput::Nothing => None,
                    BlockInput::Piped => piped.cloned(),
                    BlockInput::Element => Some(
                        piped
                            .and_then(ValueType::element)
                            .cloned()
                            .unwrap_or(ValueType::Any),
                    ),
                };
                return CompletionRequest::Block {
                    hint: spec.hint(),
                    piped,
                };
            }
        }
        CompletionRequest::Argument {
            hint: spec.hint(),
            options,
        }
    }

    /// Build the option list
    pub fn resolve(&self, shed: &Toolshed) -> CompletionResult {
        match self {
            CompletionRequest::Commands { piped, partial } => {
                let options = command_options(shed, piped.as_ref());
                CompletionResult::new(rank(partial, options), Some("<command>".to_string()))
            }
            CompletionRequest::Subcommands {
                command,
                piped,
                partial,
            } => {
                let options = shed
                    .get(command)
                    .map(|def| {
                        def.subcommands()
                            .into_iter()
                            .filter(|sub| {
                                def.signatures().iter().any(|s| {
                                    s.subcommand_name() == Some(*sub) && s.accepts(piped.as_ref())
                                })
                            })
                            .map(|sub| CompletionOption::new(sub, Some(def.describe())))
                            .collect()
                    })
                    .unwrap_or_default();
                CompletionResult::new(rank(partial, options), Some("<subcommand>".to_string()))
            }
            CompletionRequest::Argument { hint, options } => {
                let options = options
                    .iter()
                    .map(|o| CompletionOption::new(o, None))
                    .collect();
                CompletionResult::new(options, Some(hint.clone()))
            }
            CompletionRequest::Block { hint, piped } => {
                let mut options = vec![CompletionOption::new("{", Some("start a block"))];
                options.extend(rank("", command_options(shed, piped.as_ref())));
                CompletionResult::new(options, Some(hint.clone()))
            }
            CompletionRequest::Types { partial } => {
                let mut options: Vec<CompletionOption> = ValueType::NAMES
                    .iter()
                    .map(|n| CompletionOption::new(*n, None))
                    .collect();
                options.push(CompletionOption::new("list<", None));
                CompletionResult::new(rank(partial, options), Some("<type>".to_string()))
            }
            CompletionRequest::Variables {
                partial,
                candidates,
            } => {
                let options = candidates
                    .iter()
                    .map(|c| CompletionOption::new(c, None))
                    .collect();
                CompletionResult::new(rank(partial, options), Some("<variable>".to_string()))
            }
        }
    }
}

/// Every `name` or `name:sub` that takes `piped`
fn command_options(shed: &Toolshed, piped: Option<&ValueType>) -> Vec<CompletionOption> {
    let mut options = Vec::new();
    for def in shed.commands() {
        for signature in def.signatures() {
            if !signature.accepts(piped) {
                continue;
            }
            let value = match signature.subcommand_name() {
                Some(sub) => format!("{}:{}", def.name(), sub),
                None => def.name().to_string(),
            };
            if !options.iter().any(|o: &CompletionOption| o.value == value) {
                options.push(CompletionOption::new(value, Some(def.describe())));
            }
        }
    }
    options
}

/// Fuzzy-rank `options` against `partial`; an empty partial keeps everything sorted by name
fn rank(partial: &str, mut options: Vec<CompletionOption>) -> Vec<CompletionOption> {
    if partial.is_empty() {
        options.sort_by(|a, b| a.value.cmp(&b.value));
        return options;
    }

    // Plain fuzzy atoms: `$` and `!` are literal in variable and command names
    let pattern = Pattern::new(
        partial,
        CaseMatching::Ignore,
        Normalization::Smart,
        AtomKind::Fuzzy,
    );
    let mut matcher = Matcher::new(nucleo_matcher::Config::DEFAULT);
    let mut buf = Vec::new();

    let mut scored: Vec<(u32, CompletionOption)> = options
        .into_iter()
        .filter_map(|option| {
            buf.clear();
            let haystack = Utf32Str::new(&option.value, &mut buf);
            let score = pattern.score(haystack, &mut matcher)?;
            // Prefix matches first, regardless of fuzzy score
            let bonus = if option.value.starts_with(partial) {
                u32::MAX / 2
            } else {
                0
            };
            Some((score.saturating_add(bonus), option))
        })
        .collect();
    scored.sort_by(|(sa, a), (sb, b)| sb.cmp(sa).then_with(|| a.value.cmp(&b.value)));
    scored.into_iter().map(|(_, option)| option).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionOption {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CompletionOption {
    pub fn new(value: impl Into<String>, description: Option<&str>) -> Self {
        Self {
            value: value.into(),
            description: description.filter(|d| !d.is_empty()).map(str::to_string),
        }
    }
}

/// Resolved completions
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CompletionResult {
    pub options: Vec<CompletionOption>,
    /// What is expected, e.g. `<y: int>`
    pub hint: Option<String>,
}

impl CompletionResult {
    pub fn new(options: Vec<CompletionOption>, hint: Option<String>) -> Self {
        Self { options, hint }
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|o| o.value.as_str())
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values().any(|v| v == value)
    }

    /// Keep only the first `max` options
    pub fn truncate(&mut self, max: usize) {
        self.options.truncate(max);
    }
}
