use std::sync::Arc;

use chrono::Utc;

use crate::settings::FlagMode;
use crate::spicedb::types::{RelationshipFilter, SubjectFilter, UpdateOperation};
use crate::terminal::command::{Command, ObjectRef, SubjectRef, GLOBAL_FLAGS};
use crate::terminal::result::ExecutionResult;
use crate::terminal::tokenizer;
use crate::terminal::{CommandError, CommandExecutor};

/// A registered `(subcommand, action)` pair.
#[derive(Debug)]
pub struct CommandSpec {
    pub subcommand: &'static str,
    pub action: &'static str,
    /// Names of the required positional arguments, in order
    pub positionals: &'static [&'static str],
    pub flags: &'static [&'static str],
    pub usage: &'static str,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        subcommand: "schema",
        action: "read",
        positionals: &[],
        flags: &[],
        usage: "zed schema read",
    },
    CommandSpec {
        subcommand: "relationship",
        action: "read",
        positionals: &[],
        flags: &[
            "resource-type",
            "resource-id",
            "relation",
            "subject-type",
            "subject-id",
        ],
        usage: "zed relationship read --resource-type <type> [--resource-id <id>] [--relation <relation>] [--subject-type <type> [--subject-id <id>]]",
    },
    CommandSpec {
        subcommand: "relationship",
        action: "create",
        positionals: &["resource", "relation", "subject"],
        flags: &[],
        usage: "zed relationship create <resource-type>:<resource-id> <relation> <subject-type>:<subject-id>[#<relation>]",
    },
    CommandSpec {
        subcommand: "relationship",
        action: "touch",
        positionals: &["resource", "relation", "subject"],
        flags: &[],
        usage: "zed relationship touch <resource-type>:<resource-id> <relation> <subject-type>:<subject-id>[#<relation>]",
    },
    CommandSpec {
        subcommand: "relationship",
        action: "delete",
        positionals: &["resource", "relation", "subject"],
        flags: &[],
        usage: "zed relationship delete <resource-type>:<resource-id> <relation> <subject-type>:<subject-id>[#<relation>]",
    },
    CommandSpec {
        subcommand: "permission",
        action: "check",
        positionals: &["resource", "permission", "subject"],
        flags: &[],
        usage: "zed permission check <resource-type>:<resource-id> <permission> <subject-type>:<subject-id>",
    },
    CommandSpec {
        subcommand: "permission",
        action: "expand",
        positionals: &["resource", "permission"],
        flags: &[],
        usage: "zed permission expand <resource-type>:<resource-id> <permission>",
    },
    CommandSpec {
        subcommand: "permission",
        action: "lookup-subjects",
        positionals: &["resource", "permission", "subject_type"],
        flags: &[],
        usage: "zed permission lookup-subjects <resource-type>:<resource-id> <permission> <subject-type>",
    },
];

/// Supported subcommands in registration order.
pub fn subcommands() -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::new();
    for spec in COMMANDS {
        if !out.contains(&spec.subcommand) {
            out.push(spec.subcommand);
        }
    }
    out
}

pub fn actions(subcommand: &str) -> Vec<&'static str> {
    COMMANDS
        .iter()
        .filter(|s| s.subcommand == subcommand)
        .map(|s| s.action)
        .collect()
}

pub fn lookup(subcommand: &str, action: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|s| s.subcommand == subcommand && s.action == action)
}

/// A validated backend operation, ready for an executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    SchemaRead,
    RelationshipRead(RelationshipFilter),
    RelationshipWrite {
        operation: UpdateOperation,
        resource: ObjectRef,
        relation: String,
        subject: SubjectRef,
    },
    PermissionCheck {
        resource: ObjectRef,
        permission: String,
        subject: SubjectRef,
    },
    PermissionExpand {
        resource: ObjectRef,
        permission: String,
    },
    LookupSubjects {
        resource: ObjectRef,
        permission: String,
        subject_type: String,
    },
}

/// What an executor receives: the raw command and its resolved operation.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub command: Command,
    pub operation: Operation,
}

fn or_none(s: &str) -> &str {
    if s.is_empty() {
        "(none)"
    } else {
        s
    }
}

/// Route a parsed command to its operation, or explain why it can't run.
/// The `Err` text becomes the command's stderr.
pub fn resolve(cmd: &Command, flag_mode: FlagMode) -> Result<Operation, String> {
    let supported = subcommands();
    if !supported.contains(&cmd.subcommand.as_str()) {
        return Err(format!(
            "Unsupported command: {}. Supported: {}",
            or_none(&cmd.subcommand),
            supported.join(", ")
        ));
    }

    let Some(spec) = lookup(&cmd.subcommand, &cmd.action) else {
        let actions = actions(&cmd.subcommand);
        let hint = lookup(&cmd.subcommand, actions[0]).map(|s| s.usage).unwrap_or_default();
        return Err(format!(
            "Unsupported {} action: {}. Supported: {}. Try: {}",
            cmd.subcommand,
            or_none(&cmd.action),
            actions.join(", "),
            hint
        ));
    };

    if flag_mode == FlagMode::Strict {
        check_strict(cmd, spec)?;
    }

    if cmd.positional.len() < spec.positionals.len() {
        return Err(format!("Usage: {}", spec.usage));
    }
    let args = &cmd.positional;

    let op = match (spec.subcommand, spec.action) {
        ("schema", "read") => Operation::SchemaRead,
        ("relationship", "read") => Operation::RelationshipRead(relationship_filter(cmd, spec)?),
        ("relationship", action) => {
            let operation = match action {
                "create" => UpdateOperation::Create,
                "touch" => UpdateOperation::Touch,
                _ => UpdateOperation::Delete,
            };
            Operation::RelationshipWrite {
                operation,
                resource: object_arg(&args[0])?,
                relation: args[1].clone(),
                subject: subject_arg(&args[2])?,
            }
        }
        ("permission", "check") => Operation::PermissionCheck {
            resource: object_arg(&args[0])?,
            permission: args[1].clone(),
            subject: subject_arg(&args[2])?,
        },
        ("permission", "expand") => Operation::PermissionExpand {
            resource: object_arg(&args[0])?,
            permission: args[1].clone(),
        },
        ("permission", "lookup-subjects") => Operation::LookupSubjects {
            resource: object_arg(&args[0])?,
            permission: args[1].clone(),
            subject_type: args[2].clone(),
        },
        (sub, action) => {
            return Err(format!("Unsupported {sub} action: {action}"));
        }
    };
    Ok(op)
}

fn check_strict(cmd: &Command, spec: &CommandSpec) -> Result<(), String> {
    for name in cmd.flags.keys() {
        if !spec.flags.contains(&name.as_str()) && !GLOBAL_FLAGS.contains(&name.as_str()) {
            let mut known: Vec<String> = spec.flags.iter().map(|f| format!("--{f}")).collect();
            known.extend(GLOBAL_FLAGS.iter().map(|f| format!("--{f}")));
            return Err(format!(
                "Unknown flag --{name} for zed {} {}. Supported: {}",
                spec.subcommand,
                spec.action,
                known.join(", ")
            ));
        }
    }
    if cmd.positional.len() > spec.positionals.len() {
        return Err(format!(
            "Unexpected argument `{}`. Usage: {}",
            cmd.positional[spec.positionals.len()],
            spec.usage
        ));
    }
    Ok(())
}

fn object_arg(s: &str) -> Result<ObjectRef, String> {
    ObjectRef::parse(s).ok_or_else(|| {
        format!("Invalid format `{s}`. Use type:id for resource and subject")
    })
}

fn subject_arg(s: &str) -> Result<SubjectRef, String> {
    SubjectRef::parse(s).ok_or_else(|| {
        format!("Invalid format `{s}`. Use type:id for resource and subject")
    })
}

fn relationship_filter(cmd: &Command, spec: &CommandSpec) -> Result<RelationshipFilter, String> {
    let Some(resource_type) = cmd.flag("resource-type") else {
        return Err(format!("Usage: {}", spec.usage));
    };
    let subject_filter = match (cmd.flag("subject-type"), cmd.flag("subject-id")) {
        (Some(subject_type), id) => Some(SubjectFilter {
            subject_type: subject_type.to_string(),
            optional_subject_id: id.map(str::to_string),
        }),
        (None, Some(_)) => return Err("--subject-id requires --subject-type".to_string()),
        (None, None) => None,
    };
    Ok(RelationshipFilter {
        resource_type: Some(resource_type.to_string()),
        optional_resource_id: cmd.flag("resource-id").map(str::to_string),
        optional_relation: cmd.flag("relation").map(str::to_string),
        optional_subject_filter: subject_filter,
    })
}

/// Routes command lines to the configured executor.
#[derive(Clone)]
pub struct Dispatcher {
    executor: Arc<dyn CommandExecutor>,
    flag_mode: FlagMode,
}

impl Dispatcher {
    pub fn new(executor: Arc<dyn CommandExecutor>, flag_mode: FlagMode) -> Self {
        Self {
            executor,
            flag_mode,
        }
    }

    /// Tokenize and parse a line. Lines bound for a process executor are
    /// screened for shell metacharacters first.
    pub fn parse(&self, line: &str) -> Result<Command, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CommandError::Empty);
        }
        let tokens = if self.executor.spawns_process() {
            tokenizer::split_hardened(line)?
        } else {
            tokenizer::split(line)
        };
        Command::parse(tokens)
    }

    /// Run one command line. `Err` only for malformed input; everything
    /// after parsing is reported inside the result.
    pub async fn run(&self, line: &str) -> Result<ExecutionResult, CommandError> {
        let command = match self.parse(line) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(error = %e, "rejected command");
                return Err(e);
            }
        };

        let result = match resolve(&command, self.flag_mode) {
            Ok(operation) => {
                let invocation = Invocation {
                    command: command.clone(),
                    operation,
                };
                self.executor.execute(&invocation).await
            }
            Err(message) => ExecutionResult::failure(Utc::now(), message),
        };

        tracing::info!(
            subcommand = %command.subcommand,
            action = %command.action,
            ok = result.ok,
            code = ?result.code,
            duration_ms = result.duration_ms,
            "executed command"
        );
        Ok(result)
    }
}
