//! # Content Types & Extraction Schemas
//! Closed set of six threat-intel content types, each mapped to exactly one
//! static extraction schema. The registry is a `match` over the enum, so a
//! new type without a schema is a compile error, not a runtime surprise.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of intelligence a fetched item contains. Wire labels are the
/// snake_case strings the report renderer branches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    IocBased,
    TechniqueResearch,
    ToolAnalysis,
    ThreatActorProfile,
    VulnerabilityAnalysis,
    DetectionEngineering,
}

impl ContentType {
    /// The full closed set, in prompt order.
    pub const ALL: [ContentType; 6] = [
        ContentType::IocBased,
        ContentType::TechniqueResearch,
        ContentType::ToolAnalysis,
        ContentType::ThreatActorProfile,
        ContentType::VulnerabilityAnalysis,
        ContentType::DetectionEngineering,
    ];

    /// Wire label (`ioc_based`, ...).
    pub fn label(self) -> &'static str {
        match self {
            ContentType::IocBased => "ioc_based",
            ContentType::TechniqueResearch => "technique_research",
            ContentType::ToolAnalysis => "tool_analysis",
            ContentType::ThreatActorProfile => "threat_actor_profile",
            ContentType::VulnerabilityAnalysis => "vulnerability_analysis",
            ContentType::DetectionEngineering => "detection_engineering",
        }
    }

    /// One-sentence definition embedded in the classification prompt.
    pub fn definition(self) -> &'static str {
        match self {
            ContentType::IocBased => {
                "concrete indicators of compromise: hashes, IPs, domains, C2 infrastructure"
            }
            ContentType::TechniqueResearch => {
                "research into an attack technique, bypass, or tradecraft and how to detect it"
            }
            ContentType::ToolAnalysis => {
                "analysis of a security or offensive tool and its capabilities"
            }
            ContentType::ThreatActorProfile => {
                "profile of a threat actor or group: targeting, motivation, TTP changes"
            }
            ContentType::VulnerabilityAnalysis => {
                "a specific vulnerability or CVE, its severity and exploitation status"
            }
            ContentType::DetectionEngineering => {
                "detection rules, queries, or engineering guidance for defenders"
            }
        }
    }

    /// Default classification when the model's answer matches no label.
    /// Never blocks the pipeline on an ambiguous classification.
    pub fn fallback() -> ContentType {
        ContentType::TechniqueResearch
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Expected value shape of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// Scalar string.
    Text,
    /// List of strings.
    TextList,
    /// Boolean.
    Flag,
    /// Closed severity enum: critical/high/medium/low/unknown.
    Severity,
    /// Nested IOC mapping: ips, domains, hashes{md5, sha1, sha256} -> [string].
    IocSet,
}

impl FieldShape {
    /// Prompt fragment describing the shape to the model.
    pub fn prompt_hint(self) -> &'static str {
        match self {
            FieldShape::Text => "a string",
            FieldShape::TextList => "a JSON array of strings",
            FieldShape::Flag => "true or false",
            FieldShape::Severity => "one of: critical, high, medium, low, unknown",
            FieldShape::IocSet => {
                "an object {\"ips\": [], \"domains\": [], \"hashes\": {\"md5\": [], \"sha1\": [], \"sha256\": []}}"
            }
        }
    }

    /// Type-appropriate empty default used when a field is missing or
    /// cannot be coerced.
    pub fn empty_default(self) -> serde_json::Value {
        use serde_json::json;
        match self {
            FieldShape::Text => json!(""),
            FieldShape::TextList => json!([]),
            FieldShape::Flag => json!(false),
            FieldShape::Severity => json!("unknown"),
            FieldShape::IocSet => json!({
                "ips": [],
                "domains": [],
                "hashes": { "md5": [], "sha1": [], "sha256": [] },
            }),
        }
    }
}

/// One required field of an extraction schema.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub shape: FieldShape,
    /// Natural-language instruction fragment for the extraction prompt.
    pub hint: &'static str,
}

/// Static, per-content-type extraction definition. Process-wide config,
/// never mutated at runtime.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub content_type: ContentType,
    /// Leading instruction for the extraction prompt.
    pub instruction: &'static str,
    pub fields: &'static [Field],
}

impl Schema {
    pub fn required_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

const IOC_BASED: Schema = Schema {
    content_type: ContentType::IocBased,
    instruction: "Extract technical threat intelligence. You're analyzing for a security analyst - skip basics, give actionable details.",
    fields: &[
        Field {
            name: "threat_name",
            shape: FieldShape::Text,
            hint: "name of the threat or malware family",
        },
        Field {
            name: "iocs",
            shape: FieldShape::IocSet,
            hint: "every indicator mentioned, grouped by kind",
        },
        Field {
            name: "detection_queries",
            shape: FieldShape::TextList,
            hint: "KQL queries for MDO/Defender/Sentinel or specific EDR detection logic",
        },
        Field {
            name: "key_findings",
            shape: FieldShape::Text,
            hint: "what's new or interesting about this threat",
        },
    ],
};

const TECHNIQUE_RESEARCH: Schema = Schema {
    content_type: ContentType::TechniqueResearch,
    instruction: "Extract details about this attack technique or research. Focus on what matters for detection.",
    fields: &[
        Field {
            name: "technique_name",
            shape: FieldShape::Text,
            hint: "name of the technique",
        },
        Field {
            name: "detection_gap",
            shape: FieldShape::Text,
            hint: "why current tools miss it",
        },
        Field {
            name: "detection_ideas",
            shape: FieldShape::TextList,
            hint: "specific ways to detect this, telemetry to monitor, behavioral indicators",
        },
        Field {
            name: "key_takeaway",
            shape: FieldShape::Text,
            hint: "why this matters and what to do about it",
        },
    ],
};

const TOOL_ANALYSIS: Schema = Schema {
    content_type: ContentType::ToolAnalysis,
    instruction: "Analyze this security tool from a detection perspective.",
    fields: &[
        Field {
            name: "tool_name",
            shape: FieldShape::Text,
            hint: "name of the tool",
        },
        Field {
            name: "capabilities",
            shape: FieldShape::TextList,
            hint: "key features",
        },
        Field {
            name: "detection_methods",
            shape: FieldShape::TextList,
            hint: "how to detect usage in your environment, specific IOCs or behaviors",
        },
        Field {
            name: "use_cases",
            shape: FieldShape::Text,
            hint: "when it's benign and how attackers use it",
        },
    ],
};

const THREAT_ACTOR_PROFILE: Schema = Schema {
    content_type: ContentType::ThreatActorProfile,
    instruction: "Extract threat actor intelligence.",
    fields: &[
        Field {
            name: "actor_name",
            shape: FieldShape::Text,
            hint: "name of the actor or group",
        },
        Field {
            name: "targeting",
            shape: FieldShape::Text,
            hint: "industries, geographies, and motivation",
        },
        Field {
            name: "ttp_changes",
            shape: FieldShape::Text,
            hint: "what's new in their playbook",
        },
        Field {
            name: "monitoring_recommendations",
            shape: FieldShape::TextList,
            hint: "specific things to monitor if you match their targeting",
        },
    ],
};

const VULNERABILITY_ANALYSIS: Schema = Schema {
    content_type: ContentType::VulnerabilityAnalysis,
    instruction: "Extract vulnerability details.",
    fields: &[
        Field {
            name: "cve_id",
            shape: FieldShape::Text,
            hint: "CVE identifier, or \"unknown\" if none given",
        },
        Field {
            name: "severity",
            shape: FieldShape::Severity,
            hint: "severity rating",
        },
        Field {
            name: "exploit_available",
            shape: FieldShape::Flag,
            hint: "whether a public exploit exists",
        },
        Field {
            name: "affected_products",
            shape: FieldShape::TextList,
            hint: "affected products and versions",
        },
        Field {
            name: "mitigation",
            shape: FieldShape::Text,
            hint: "patching info or workarounds",
        },
    ],
};

const DETECTION_ENGINEERING: Schema = Schema {
    content_type: ContentType::DetectionEngineering,
    instruction: "Extract detection engineering intelligence.",
    fields: &[
        Field {
            name: "detection_logic",
            shape: FieldShape::Text,
            hint: "the actual query or rule",
        },
        Field {
            name: "data_sources",
            shape: FieldShape::TextList,
            hint: "telemetry needed",
        },
        Field {
            name: "false_positive_notes",
            shape: FieldShape::Text,
            hint: "false positive potential and tuning recommendations",
        },
    ],
};

/// Pure, total lookup. Every `ContentType` has exactly one schema; absence
/// would be a programming error and cannot compile.
pub fn schema_for(content_type: ContentType) -> &'static Schema {
    match content_type {
        ContentType::IocBased => &IOC_BASED,
        ContentType::TechniqueResearch => &TECHNIQUE_RESEARCH,
        ContentType::ToolAnalysis => &TOOL_ANALYSIS,
        ContentType::ThreatActorProfile => &THREAT_ACTOR_PROFILE,
        ContentType::VulnerabilityAnalysis => &VULNERABILITY_ANALYSIS,
        ContentType::DetectionEngineering => &DETECTION_ENGINEERING,
    }
}

/// Allowed severity values, lowercase.
pub const SEVERITY_VALUES: [&str; 5] = ["critical", "high", "medium", "low", "unknown"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_total_and_non_empty() {
        for ct in ContentType::ALL {
            let schema = schema_for(ct);
            assert_eq!(schema.content_type, ct);
            assert!(!schema.fields.is_empty(), "{ct} has no required fields");
        }
    }

    #[test]
    fn field_names_are_unique_per_schema() {
        for ct in ContentType::ALL {
            let schema = schema_for(ct);
            let mut names: Vec<_> = schema.fields.iter().map(|f| f.name).collect();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), schema.fields.len(), "{ct} has duplicate fields");
        }
    }

    #[test]
    fn wire_labels_round_trip_through_serde() {
        for ct in ContentType::ALL {
            let json = serde_json::to_string(&ct).unwrap();
            assert_eq!(json, format!("\"{}\"", ct.label()));
            let back: ContentType = serde_json::from_str(&json).unwrap();
            assert_eq!(back, ct);
        }
    }

    #[test]
    fn empty_defaults_match_shapes() {
        assert_eq!(FieldShape::Text.empty_default(), serde_json::json!(""));
        assert_eq!(FieldShape::Flag.empty_default(), serde_json::json!(false));
        let iocs = FieldShape::IocSet.empty_default();
        assert!(iocs["hashes"]["sha256"].as_array().unwrap().is_empty());
    }
}
