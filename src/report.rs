//! Markdown report assembly for a finished pipeline run

use crate::models::{CallResult, PipelineOutput, VerificationReport};

pub fn format_report(output: &PipelineOutput) -> String {
    let mut out = String::new();

    out.push_str("# Research Report\n\n");
    out.push_str(&format!("**Query:** {}\n\n", output.query));
    out.push_str(&format!(
        "*Run {} • {} • {:.1}s*\n\n",
        output.run_id,
        output.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        output.execution_time_ms as f64 / 1000.0
    ));

    out.push_str("## Final Report\n\n");
    out.push_str(output.synthesis.text.trim());
    out.push_str("\n\n## Research\n\n");
    out.push_str(output.research.text.trim());
    out.push_str("\n\n## Critical Analysis\n\n");
    out.push_str(output.critique.text.trim());
    out.push_str("\n\n");

    out.push_str(&verification_table(&output.verification));
    out.push_str(&process_details(&output.stages()));

    out
}

fn verification_table(report: &VerificationReport) -> String {
    let mut out = String::from("## Claim Verification\n\n");
    out.push_str("| Status | Claims |\n");
    out.push_str("|--------|--------|\n");

    for (status, count) in report.iter() {
        out.push_str(&format!("| {} | {} |\n", status, count));
    }
    out.push_str(&format!("| **Total** | **{}** |\n\n", report.total()));

    out
}

fn process_details(stages: &[&CallResult]) -> String {
    let mut out = String::from("## Process Details\n\n");
    out.push_str("| Stage | Outcome | Attempts |\n");
    out.push_str("|-------|---------|----------|\n");

    for stage in stages {
        out.push_str(&format!(
            "| {} | {} | {} |\n",
            stage.role,
            stage.outcome,
            stage.attempts.len()
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentRole, AttemptOutcome, CallAttempt, ClaimStatus, StageOutcome};
    use chrono::Utc;
    use uuid::Uuid;

    fn stage(role: AgentRole, text: &str, outcome: StageOutcome, attempts: usize) -> CallResult {
        CallResult {
            role,
            text: text.to_string(),
            outcome,
            attempts: (0..attempts as u32)
                .map(|index| CallAttempt {
                    index,
                    backoff_ms: 0,
                    error: None,
                    outcome: AttemptOutcome::Success,
                })
                .collect(),
        }
    }

    #[test]
    fn test_format_report_sections() {
        let output = PipelineOutput {
            run_id: Uuid::new_v4(),
            query: "Next.js vs SvelteKit".to_string(),
            research: stage(AgentRole::Researcher, "- Next.js supports SSR.", StageOutcome::Success, 1),
            critique: stage(AgentRole::Critic, "- Needs sources", StageOutcome::Degraded, 3),
            synthesis: stage(AgentRole::Synthesizer, "| A | B |", StageOutcome::Success, 1),
            verification: VerificationReport::from_counts([
                (ClaimStatus::Unverified, 4),
                (ClaimStatus::Verified, 1),
            ]),
            created_at: Utc::now(),
            execution_time_ms: 1500,
        };

        let report = format_report(&output);

        assert!(report.starts_with("# Research Report"));
        assert!(report.contains("**Query:** Next.js vs SvelteKit"));
        assert!(report.contains("1.5s"));

        let final_at = report.find("## Final Report").unwrap();
        let research_at = report.find("## Research\n").unwrap();
        let critique_at = report.find("## Critical Analysis").unwrap();
        assert!(final_at < research_at && research_at < critique_at);

        assert!(report.contains("| unverified | 4 |"));
        assert!(report.contains("| verified | 1 |"));
        assert!(report.contains("| **Total** | **5** |"));
        assert!(report.contains("| critic | Degraded (fallback) | 3 |"));
    }
}
