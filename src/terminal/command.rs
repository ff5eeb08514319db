use std::collections::BTreeMap;

use crate::spicedb::types::{ObjectReference, SubjectReference};
use crate::terminal::CommandError;

/// Keyword every accepted command line must start with.
pub const ROOT_KEYWORD: &str = "zed";

/// Connection flags accepted on every command.
pub const GLOBAL_FLAGS: &[&str] = &["endpoint", "token", "insecure"];

/// Flags that never consume a value token.
const SWITCHES: &[&str] = &["insecure"];

/// A parsed `zed` invocation: `[root, subcommand, action, ...rest]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub root: String,
    /// Empty when the line stops after the root keyword
    pub subcommand: String,
    pub action: String,
    pub positional: Vec<String>,
    /// `--name value` pairs, keyed without the leading dashes
    pub flags: BTreeMap<String, String>,
    tokens: Vec<String>,
}

impl Command {
    pub fn parse(tokens: Vec<String>) -> Result<Self, CommandError> {
        let Some(root) = tokens.first() else {
            return Err(CommandError::Empty);
        };
        if root != ROOT_KEYWORD {
            return Err(CommandError::WrongRoot(root.clone()));
        }

        let subcommand = tokens.get(1).cloned().unwrap_or_default();
        let action = tokens.get(2).cloned().unwrap_or_default();

        let mut positional = Vec::new();
        let mut flags = BTreeMap::new();
        let mut i = 3;
        while i < tokens.len() {
            let tok = &tokens[i];
            match tok.strip_prefix("--").filter(|name| !name.is_empty()) {
                Some(flag) => {
                    if let Some((name, value)) = flag.split_once('=') {
                        flags.insert(name.to_string(), value.to_string());
                    } else if SWITCHES.contains(&flag) {
                        flags.insert(flag.to_string(), "true".to_string());
                    } else {
                        i += 1;
                        let value = tokens.get(i).cloned().unwrap_or_default();
                        flags.insert(flag.to_string(), value);
                    }
                }
                None => positional.push(tok.clone()),
            }
            i += 1;
        }

        Ok(Self {
            root: root.clone(),
            subcommand,
            action,
            positional,
            flags,
            tokens,
        })
    }

    /// Value of `--name`, treating an empty value as absent.
    pub fn flag(&self, name: &str) -> Option<&str> {
        self.flags
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }

    /// Tokens after the root keyword, in their original order.
    pub fn args(&self) -> &[String] {
        &self.tokens[1..]
    }
}

/// `type:id`, e.g. `document:readme`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub object_type: String,
    pub object_id: String,
}

impl ObjectRef {
    /// Splits at the first `:`; the id keeps any further colons.
    pub fn parse(s: &str) -> Option<Self> {
        let (t, id) = s.split_once(':')?;
        if t.is_empty() || id.is_empty() {
            return None;
        }
        Some(Self {
            object_type: t.to_string(),
            object_id: id.to_string(),
        })
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.object_type, self.object_id)
    }
}

impl From<ObjectRef> for ObjectReference {
    fn from(r: ObjectRef) -> Self {
        ObjectReference {
            object_type: r.object_type,
            object_id: r.object_id,
        }
    }
}

/// `type:id` or `type:id#relation` for subject sets
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubjectRef {
    pub object: ObjectRef,
    pub relation: Option<String>,
}

impl SubjectRef {
    pub fn parse(s: &str) -> Option<Self> {
        if let Some((object, relation)) = s.split_once('#') {
            if relation.is_empty() {
                return None;
            }
            Some(Self {
                object: ObjectRef::parse(object)?,
                relation: Some(relation.to_string()),
            })
        } else {
            Some(Self {
                object: ObjectRef::parse(s)?,
                relation: None,
            })
        }
    }
}

impl std::fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.object)?;
        if let Some(rel) = &self.relation {
            write!(f, "#{}", rel)?;
        }
        Ok(())
    }
}

impl From<SubjectRef> for SubjectReference {
    fn from(s: SubjectRef) -> Self {
        SubjectReference {
            object: s.object.into(),
            optional_relation: s.relation,
        }
    }
}
