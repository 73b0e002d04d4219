//! Static tool knowledge table.
//!
//! Built once at startup (built-in entries plus an optional JSON file) and
//! shared read-only afterwards.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Documentation for a single command-line flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagDoc {
    pub flag: String,
    pub meaning: String,
}

/// What a tool is and what its flags mean. Flags keep their declared order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolKnowledge {
    pub name: String,
    pub description: String,
    pub flags: Vec<FlagDoc>,
}

impl ToolKnowledge {
    fn new(name: &str, description: &str, flags: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            flags: flags
                .iter()
                .map(|(flag, meaning)| FlagDoc {
                    flag: flag.to_string(),
                    meaning: meaning.to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("failed to read knowledge file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse knowledge file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// On-disk entry. `flags` is a JSON object; its key order is the declared order.
#[derive(Debug, Deserialize)]
struct ToolKnowledgeFile {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    flags: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct KnowledgeFile {
    #[serde(default)]
    tools: serde_json::Map<String, serde_json::Value>,
}

/// Tool name to knowledge lookup.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    tools: HashMap<String, ToolKnowledge>,
}

impl KnowledgeBase {
    /// The built-in table
    pub fn builtin() -> Self {
        let mut tools = HashMap::new();
        tools.insert(
            "kali_sqlmap".to_string(),
            ToolKnowledge::new(
                "SQLMap (Automated SQL Injection)",
                "An open source penetration testing tool that automates the process of detecting and exploiting SQL injection flaws.",
                &[
                    ("-u", "Target URL to scan."),
                    ("--batch", "Never ask for user input, use the default behavior."),
                    ("--dbs", "Enumerate DBMS databases."),
                    ("--tables", "Enumerate DBMS database tables."),
                    ("--dump", "Dump DBMS database table entries."),
                    ("-D", "DBMS database to enumerate."),
                    ("-T", "DBMS database table to enumerate."),
                ],
            ),
        );
        tools.insert(
            "kali_nmap".to_string(),
            ToolKnowledge::new(
                "Nmap (Network Mapper)",
                "A free and open source utility for network discovery and security auditing.",
                &[
                    ("-p", "Only scan specified ports."),
                    ("-sV", "Probe open ports to determine service/version info."),
                    ("-sC", "Equivalent to --script=default. Runs default NSE scripts."),
                    ("-T4", "Set timing template (higher is faster)."),
                    ("-Pn", "Treat all hosts as online -- skip host discovery."),
                ],
            ),
        );
        tools.insert(
            "kali_exec".to_string(),
            ToolKnowledge::new(
                "General Shell Execution",
                "Executes a raw bash command directly in the Kali Linux VM. Used for standard Linux utilities.",
                &[],
            ),
        );
        Self { tools }
    }

    /// Built-in table with entries from `path` layered on top.
    pub fn load_with_overrides(path: &Path) -> Result<Self, KnowledgeError> {
        let display = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|source| KnowledgeError::Read {
            path: display.clone(),
            source,
        })?;
        let overrides = Self::from_json(&content).map_err(|source| KnowledgeError::Parse {
            path: display,
            source,
        })?;

        let mut base = Self::builtin();
        let count = overrides.tools.len();
        base.tools.extend(overrides.tools);
        tracing::debug!(path = %path.display(), tools = count, "Loaded tool knowledge overrides");
        Ok(base)
    }

    /// Parse a `{ "tools": { "<tool>": { name, description, flags } } }` document.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let file: KnowledgeFile = serde_json::from_str(content)?;
        let mut tools = HashMap::new();
        for (tool, entry) in file.tools {
            let entry: ToolKnowledgeFile = serde_json::from_value(entry)?;
            let flags = entry
                .flags
                .into_iter()
                .map(|(flag, meaning)| FlagDoc {
                    flag,
                    meaning: match meaning {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    },
                })
                .collect();
            tools.insert(
                tool,
                ToolKnowledge {
                    name: entry.name,
                    description: entry.description,
                    flags,
                },
            );
        }
        Ok(Self { tools })
    }

    pub fn get(&self, tool_name: &str) -> Option<&ToolKnowledge> {
        self.tools.get(tool_name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
