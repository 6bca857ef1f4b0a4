//! The diligence subagent roster.
//!
//! Each subagent is described to the lead agent by a one-paragraph
//! description, restricted to a tool list, given its own prompt and pinned to
//! a model: fast models for the analysts, the strongest model for risk
//! synthesis and a writing model for the final report.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::{load_prompt, ConfigError};

const ANALYST_TOOLS: &[&str] = &["Glob", "Read", "Bash", "Write"];
const WRITER_TOOLS: &[&str] = &["Skill", "Write", "Glob", "Read", "Bash"];

struct Blueprint {
    name: &'static str,
    description: &'static str,
    tools: &'static [&'static str],
    model: &'static str,
}

const BLUEPRINTS: &[Blueprint] = &[
    Blueprint {
        name: "document-analyzer",
        description: "Use this agent to analyze corporate documents, organizational records, \
            and operational materials. Reviews documents in files/uploads/ for governance \
            issues, organizational concerns, and operational red flags. Writes analysis \
            to files/analysis_notes/. Ideal for bylaws, board minutes, org charts, \
            policies, and general business documents.",
        tools: ANALYST_TOOLS,
        model: "haiku",
    },
    Blueprint {
        name: "financial-analyst",
        description: "Use this agent to analyze financial documents for M&A due diligence. \
            Reviews financial statements, projections, and supporting schedules in files/uploads/. \
            Identifies financial red flags including revenue quality issues, profitability concerns, \
            balance sheet risks, and cash flow problems. Calculates key ratios and trends. \
            Writes analysis to files/analysis_notes/financial_analysis.md.",
        tools: ANALYST_TOOLS,
        model: "haiku",
    },
    Blueprint {
        name: "legal-analyst",
        description: "Use this agent to analyze legal documents and contracts for M&A due diligence. \
            Reviews contracts, agreements, and legal documents in files/uploads/. \
            Identifies change of control provisions, consent requirements, termination rights, \
            litigation risks, and compliance issues. Writes analysis to \
            files/analysis_notes/legal_analysis.md.",
        tools: ANALYST_TOOLS,
        model: "haiku",
    },
    Blueprint {
        name: "risk-assessor",
        description: "Use this agent AFTER all analyzers have completed their work to synthesize \
            findings into a comprehensive risk assessment. Reads all analysis from \
            files/analysis_notes/, categorizes risks by severity and likelihood, \
            quantifies impacts, and provides deal recommendations. Writes assessment to \
            files/risk_assessment/risk_summary.md. Use before report-writer.",
        tools: ANALYST_TOOLS,
        model: "opus",
    },
    Blueprint {
        name: "report-writer",
        description: "Use this agent to create the final due diligence report. Reads analysis from \
            files/analysis_notes/ and risk assessment from files/risk_assessment/, then \
            synthesizes into a professional PDF report with executive summary, risk matrix, \
            findings by category, and recommendations. Saves to files/reports/ using reportlab. \
            Does NOT conduct analysis - only reads existing findings and creates reports.",
        tools: WRITER_TOOLS,
        model: "sonnet",
    },
];

/// A subagent as the `--agents` flag expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentDefinition {
    pub description: String,
    pub tools: Vec<String>,
    pub prompt: String,
    pub model: String,
}

/// All subagent definitions, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentRoster {
    agents: BTreeMap<String, AgentDefinition>,
}

impl AgentRoster {
    /// Build the roster, reading `<name>.txt` (dashes as underscores) for each
    /// subagent's prompt.
    pub fn load(prompts_dir: &Path) -> Result<Self, ConfigError> {
        let mut agents = BTreeMap::new();
        for blueprint in BLUEPRINTS {
            let prompt = load_prompt(prompts_dir, &prompt_file(blueprint.name))?;
            agents.insert(
                blueprint.name.to_string(),
                AgentDefinition {
                    description: blueprint.description.to_string(),
                    tools: blueprint.tools.iter().map(ToString::to_string).collect(),
                    prompt,
                    model: blueprint.model.to_string(),
                },
            );
        }
        Ok(Self { agents })
    }

    /// Subagents by name, alphabetically.
    pub fn agents(&self) -> impl Iterator<Item = (&str, &AgentDefinition)> {
        self.agents.iter().map(|(name, agent)| (name.as_str(), agent))
    }

    /// JSON object mapping each name to its definition.
    pub fn agents_json(&self) -> Result<String> {
        serde_json::to_string(&self.agents).context("Failed to serialize agent definitions")
    }
}

fn prompt_file(name: &str) -> String {
    format!("{}.txt", name.replace('-', "_"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Write a `<name> prompt` file for every subagent into `dir`.
    pub(crate) fn write_prompts(dir: &Path) {
        for blueprint in BLUEPRINTS {
            let name = blueprint.name;
            std::fs::write(dir.join(prompt_file(name)), format!("\n{name} prompt\n")).unwrap();
        }
    }

    fn prompts() -> TempDir {
        let dir = TempDir::new().unwrap();
        write_prompts(dir.path());
        dir
    }

    #[test]
    fn blueprints_follow_the_workflow_order() {
        let names: Vec<_> = BLUEPRINTS.iter().map(|b| b.name).collect();
        assert_eq!(
            names,
            [
                "document-analyzer",
                "financial-analyst",
                "legal-analyst",
                "risk-assessor",
                "report-writer",
            ]
        );
    }

    #[test]
    fn loads_all_five_agents_with_models() {
        let dir = prompts();
        let roster = AgentRoster::load(dir.path()).unwrap();

        let models: Vec<_> = roster
            .agents()
            .map(|(name, agent)| (name, agent.model.as_str()))
            .collect();
        assert_eq!(
            models,
            [
                ("document-analyzer", "haiku"),
                ("financial-analyst", "haiku"),
                ("legal-analyst", "haiku"),
                ("report-writer", "sonnet"),
                ("risk-assessor", "opus"),
            ]
        );

        let writer = &roster.agents["report-writer"];
        assert!(writer.tools.contains(&"Skill".to_string()));
        assert_eq!(writer.prompt, "report-writer prompt");
    }

    #[test]
    fn missing_prompt_names_the_file() {
        let dir = prompts();
        std::fs::remove_file(dir.path().join("legal_analyst.txt")).unwrap();

        let err = AgentRoster::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("legal_analyst.txt"));
    }

    #[test]
    fn serializes_to_agents_flag_shape() {
        let dir = prompts();
        let json = AgentRoster::load(dir.path()).unwrap().agents_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let analyzer = &value["document-analyzer"];
        assert_eq!(analyzer["tools"], serde_json::json!(["Glob", "Read", "Bash", "Write"]));
        assert_eq!(analyzer["prompt"], "document-analyzer prompt");
        assert!(analyzer["description"]
            .as_str()
            .unwrap()
            .starts_with("Use this agent to analyze corporate documents"));
    }
}
